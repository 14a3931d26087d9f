//! Persisted record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregated playtime for one executable.
///
/// `game_id` is `None` until the executable is linked to a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutableDetails {
    pub executable_name: String,
    pub game_id: Option<i64>,
    pub minutes_played: u64,
    pub updated_at: DateTime<Utc>,
}

impl ExecutableDetails {
    /// Whether the executable has been associated with a game yet.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.game_id.is_some()
    }
}
