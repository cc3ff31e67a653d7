/// Schema for the local record store and persisted table state.
pub const SCHEMA: &str = r#"
-- Records fetched for tables (serialized JSON), upserted by id
CREATE TABLE IF NOT EXISTS records (
    namespace TEXT NOT NULL,
    record_id TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (namespace, record_id)
);

-- Persisted key-value state (table query parameters)
CREATE TABLE IF NOT EXISTS kv_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
