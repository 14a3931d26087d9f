//! Database schema for playtime storage.

/// Current schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;

/// SQL schema for the playtime database.
pub const SCHEMA: &str = r"
PRAGMA journal_mode = WAL;

-- Aggregated playtime per executable. game_id is assigned outside the monitor.
CREATE TABLE IF NOT EXISTS executable_details (
    executable_name TEXT PRIMARY KEY NOT NULL,
    game_id INTEGER,
    minutes_played INTEGER NOT NULL DEFAULT 0 CHECK (minutes_played >= 0),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Single-row monitor settings.
CREATE TABLE IF NOT EXISTS user_settings (
    id INTEGER PRIMARY KEY NOT NULL CHECK (id = 1),
    executable_paths TEXT NOT NULL DEFAULT '',
    process_monitoring_enabled INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

INSERT OR IGNORE INTO schema_version (version) VALUES (1);

CREATE INDEX IF NOT EXISTS idx_executable_details_game_id ON executable_details(game_id);
";
