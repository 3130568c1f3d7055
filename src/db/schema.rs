/// Document store schema.
///
/// Uses CREATE TABLE/INDEX IF NOT EXISTS for idempotent execution.
/// Each row holds one entity serialized as JSON; `(source, source_id)` is
/// the identity and rowid order is insertion order.
pub const INITIAL_SCHEMA: &str = r#"
-- Tags table: one normalized tag per source record
CREATE TABLE IF NOT EXISTS tags (
    source TEXT NOT NULL,
    source_id TEXT NOT NULL,
    preferred_name TEXT NOT NULL,
    document TEXT NOT NULL,
    updated_at INTEGER,
    PRIMARY KEY (source, source_id)
);

-- Posts table: one imported post per source record
CREATE TABLE IF NOT EXISTS posts (
    source TEXT NOT NULL,
    source_id TEXT NOT NULL,
    document TEXT NOT NULL,
    updated_at INTEGER,
    PRIMARY KEY (source, source_id)
);

-- Index for resolving preferred names back to tags
CREATE INDEX IF NOT EXISTS idx_tags_preferred ON tags(preferred_name);
"#;
