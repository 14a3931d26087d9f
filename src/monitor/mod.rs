//! Process activity monitoring and playtime aggregation.
//!
//! The [`Monitor`] polls a [`ProcessSource`], feeds snapshots to an
//! [`ActivityTracker`] and periodically persists accrued minutes through an
//! [`AggregationSink`].

mod controller;
mod error;
mod events;
mod resolver;
mod sink;
mod snapshot;
mod tracker;

pub use controller::{Monitor, MonitorSummary};
pub use error::MonitorError;
pub use events::{LifecycleState, MonitorEvent};
pub use resolver::{resolve_watch_set, WatchSet, WatchedExecutable};
pub use sink::{AggregationSink, FlushReport};
pub use snapshot::{
    ProcessSnapshot, ProcessSource, SysinfoSource, DEFAULT_ENUMERATION_TIMEOUT, SHORT_NAME_LEN,
};
pub use tracker::{whole_minutes, ActivityState, ActivityTracker, Transition};
