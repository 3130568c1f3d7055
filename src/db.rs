mod schema;

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::models::{PostEntity, Source, TagEntity};

use schema::INITIAL_SCHEMA;

/// Stored tag name a lookup can match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagNameField {
    Preferred,
    V1,
    V2,
}

impl TagNameField {
    fn column(self) -> &'static str {
        match self {
            Self::Preferred => "preferred_name",
            Self::V1 => "json_extract(document, '$.v1_name')",
            Self::V2 => "json_extract(document, '$.v2_name')",
        }
    }
}

/// Tag criteria for [`Database::select_posts`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PostFilter<'a> {
    /// A post must carry at least one of these.
    pub include: &'a [String],
    /// A post must carry none of these.
    pub exclude: &'a [String],
    /// Accepted `origin_format` values.
    pub formats: &'a [String],
    pub limit: Option<usize>,
}

/// Database wrapper providing connection management and document storage
/// for normalized tags and imported posts.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens an in-memory SQLite database.
    ///
    /// Automatically initializes the schema on connection open.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Opens a file-based SQLite database at the given path.
    ///
    /// Creates the database file if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Self { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(INITIAL_SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(())
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Inserts or replaces one tag document.
    pub fn upsert_tag(&self, tag: &TagEntity) -> Result<()> {
        let document = serde_json::to_string(tag).context("Failed to serialize tag")?;
        self.conn
            .execute(
                "INSERT INTO tags (source, source_id, preferred_name, document, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (source, source_id) DO UPDATE SET
                     preferred_name = excluded.preferred_name,
                     document = excluded.document,
                     updated_at = excluded.updated_at",
                rusqlite::params![
                    tag.source.as_str(),
                    tag.source_id,
                    tag.preferred_name,
                    document,
                    OffsetDateTime::now_utc().unix_timestamp(),
                ],
            )
            .with_context(|| format!("Failed to store tag {}", tag.key()))?;
        Ok(())
    }

    /// Stores every tag in one transaction.
    ///
    /// A tag that fails to store is logged and counted; the rest are kept.
    /// Returns `(saved, errors)`.
    pub fn save_tags<'a>(
        &self,
        tags: impl IntoIterator<Item = &'a TagEntity>,
    ) -> Result<(usize, usize)> {
        self.conn.execute("BEGIN TRANSACTION", [])?;

        let mut saved = 0;
        let mut errors = 0;
        for tag in tags {
            match self.upsert_tag(tag) {
                Ok(()) => saved += 1,
                Err(e) => {
                    warn!(tag = %tag.key(), error = %e, "Failed to save tag");
                    errors += 1;
                }
            }
        }

        self.conn
            .execute("COMMIT", [])
            .context("Failed to commit tag batch")?;
        debug!(saved, errors, "Saved tag batch");
        Ok((saved, errors))
    }

    /// Returns the stored tag for a source record, if any.
    pub fn get_tag(&self, source: Source, source_id: &str) -> Result<Option<TagEntity>> {
        let document: Option<String> = self
            .conn
            .query_row(
                "SELECT document FROM tags WHERE source = ?1 AND source_id = ?2",
                (source.as_str(), source_id),
                |row| row.get(0),
            )
            .optional()?;

        document
            .map(|doc| {
                serde_json::from_str(&doc)
                    .with_context(|| format!("Malformed tag document for {source}___{source_id}"))
            })
            .transpose()
    }

    /// Returns every stored tag in insertion order.
    ///
    /// # Errors
    ///
    /// Fails on the first document that does not decode to a [`TagEntity`].
    pub fn load_tags(&self) -> Result<Vec<TagEntity>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source, source_id, document FROM tags ORDER BY rowid")?;
        let rows = stmt.query_map([], document_row)?;
        decode_tags(rows)
    }

    /// Returns the stored tags whose name in any of `fields` equals `name`,
    /// in insertion order.
    pub fn find_tags(&self, fields: &[TagNameField], name: &str) -> Result<Vec<TagEntity>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }

        let matcher = fields
            .iter()
            .map(|field| format!("{} = ?1", field.column()))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "SELECT source, source_id, document FROM tags WHERE {matcher} ORDER BY rowid"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([name], document_row)?;
        decode_tags(rows)
    }

    /// Inserts or replaces one post document.
    pub fn upsert_post(&self, post: &PostEntity) -> Result<()> {
        let document = serde_json::to_string(post).context("Failed to serialize post")?;
        self.conn
            .execute(
                "INSERT INTO posts (source, source_id, document, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (source, source_id) DO UPDATE SET
                     document = excluded.document,
                     updated_at = excluded.updated_at",
                rusqlite::params![
                    post.source.as_str(),
                    post.source_id,
                    document,
                    OffsetDateTime::now_utc().unix_timestamp(),
                ],
            )
            .with_context(|| format!("Failed to store post {}___{}", post.source, post.source_id))?;
        Ok(())
    }

    /// Returns the stored post for a source record, if any.
    pub fn get_post(&self, source: Source, source_id: &str) -> Result<Option<PostEntity>> {
        let document: Option<String> = self
            .conn
            .query_row(
                "SELECT document FROM posts WHERE source = ?1 AND source_id = ?2",
                (source.as_str(), source_id),
                |row| row.get(0),
            )
            .optional()?;

        document
            .map(|doc| {
                serde_json::from_str(&doc)
                    .with_context(|| format!("Malformed post document for {source}___{source_id}"))
            })
            .transpose()
    }

    /// Returns stored posts matching `filter` in insertion order.
    ///
    /// Posts without an image URL are never selected.
    pub fn select_posts(&self, filter: &PostFilter<'_>) -> Result<Vec<PostEntity>> {
        let include = serde_json::to_string(filter.include)?;
        let exclude = serde_json::to_string(filter.exclude)?;
        let formats = serde_json::to_string(filter.formats)?;
        let limit = filter
            .limit
            .and_then(|limit| i64::try_from(limit).ok())
            .unwrap_or(-1);

        let mut stmt = self.conn.prepare(
            "SELECT p.source, p.source_id, p.document FROM posts p
             WHERE json_extract(p.document, '$.origin_format') IN (SELECT value FROM json_each(?3))
               AND COALESCE(json_extract(p.document, '$.image_url'), '') != ''
               AND EXISTS (
                   SELECT 1 FROM json_each(p.document, '$.tags') t
                   WHERE t.value IN (SELECT value FROM json_each(?1)))
               AND NOT EXISTS (
                   SELECT 1 FROM json_each(p.document, '$.tags') t
                   WHERE t.value IN (SELECT value FROM json_each(?2)))
             ORDER BY p.rowid
             LIMIT ?4",
        )?;
        let rows = stmt.query_map(rusqlite::params![include, exclude, formats, limit], document_row)?;

        let mut posts = Vec::new();
        for row in rows {
            let (source, source_id, document) = row.context("Failed to read post row")?;
            let post = serde_json::from_str(&document)
                .with_context(|| format!("Malformed post document for {source}___{source_id}"))?;
            posts.push(post);
        }
        debug!(selected = posts.len(), "Selected posts");
        Ok(posts)
    }

    pub fn tag_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub fn post_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Deletes every stored tag and post.
    pub fn reset(&self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM posts; DELETE FROM tags;")
            .context("Failed to clear database")?;
        Ok(())
    }
}

type DocumentRow = (String, String, String);

fn document_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn decode_tags(
    rows: impl Iterator<Item = rusqlite::Result<DocumentRow>>,
) -> Result<Vec<TagEntity>> {
    let mut tags = Vec::new();
    for row in rows {
        let (source, source_id, document) = row.context("Failed to read tag row")?;
        let tag = serde_json::from_str(&document)
            .with_context(|| format!("Malformed tag document for {source}___{source_id}"))?;
        tags.push(tag);
    }
    Ok(tags)
}
