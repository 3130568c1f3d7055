//! JSONL ingestion of source dumps.
//!
//! Dumps hold one JSON record per line. Malformed lines are logged with
//! their file and line number, counted, and skipped; they never abort an
//! import.

use std::io::{BufRead, ErrorKind};
use std::ops::AddAssign;
use std::path::Path;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::models::{PostEntity, ProtoTag, Source};
use crate::normalizer::TagNormalizer;
use crate::translator::{
    AliasDictionary, AliasTranslator, PostTranslator, TagTranslator, post_translator,
};
use crate::utils::open_reader;

/// Iterator over the JSON records of a line-delimited reader.
pub struct JsonLines<R> {
    reader: R,
    label: String,
    buf: String,
    line: usize,
    errors: usize,
}

impl<R: BufRead> JsonLines<R> {
    /// Wraps `reader`; `label` names the input in warnings.
    pub fn new(reader: R, label: impl Into<String>) -> Self {
        Self {
            reader,
            label: label.into(),
            buf: String::new(),
            line: 0,
            errors: 0,
        }
    }

    /// Lines consumed so far, blank and malformed ones included.
    pub fn lines_read(&self) -> usize {
        self.line
    }

    /// Lines skipped because they did not parse.
    pub fn errors(&self) -> usize {
        self.errors
    }
}

impl<R: BufRead> Iterator for JsonLines<R> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line += 1;
                    let text = self.buf.trim();
                    if text.is_empty() {
                        continue;
                    }
                    match serde_json::from_str(text) {
                        Ok(value) => return Some(value),
                        Err(e) => {
                            warn!(file = %self.label, line = self.line, error = %e, "Skipping malformed JSON line");
                            self.errors += 1;
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    self.line += 1;
                    warn!(file = %self.label, line = self.line, "Skipping line that is not valid UTF-8");
                    self.errors += 1;
                }
                Err(e) => {
                    warn!(file = %self.label, line = self.line, error = %e, "Stopped reading");
                    self.errors += 1;
                    return None;
                }
            }
        }
    }
}

/// Translates raw tag records lazily, dropping the ones the translator rejects.
pub fn read_tags<'a, I>(
    records: I,
    translator: &'a dyn TagTranslator,
) -> impl Iterator<Item = ProtoTag> + 'a
where
    I: IntoIterator<Item = Value>,
    I::IntoIter: 'a,
{
    records
        .into_iter()
        .filter_map(move |record| translator.translate(&record))
}

/// Builds a `tag name -> [alias, ...]` dictionary from alias records.
pub fn load_aliases(
    records: impl IntoIterator<Item = Value>,
    translator: &dyn AliasTranslator,
) -> AliasDictionary {
    let mut aliases = AliasDictionary::new();
    for record in records {
        if let Some(alias) = translator.translate(&record) {
            aliases
                .entry(alias.tag_name)
                .or_default()
                .push(alias.alias_name);
        }
    }
    debug!(tags = aliases.len(), "Alias dictionary loaded");
    aliases
}

/// Counters for one post import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub lines: usize,
    pub imported: usize,
    /// Records the translator rejected.
    pub skipped: usize,
    pub json_errors: usize,
    pub store_errors: usize,
}

impl AddAssign for ImportStats {
    fn add_assign(&mut self, other: Self) {
        self.lines += other.lines;
        self.imported += other.imported;
        self.skipped += other.skipped;
        self.json_errors += other.json_errors;
        self.store_errors += other.store_errors;
    }
}

/// Translates raw posts, adds pseudo-tags and stores them.
pub struct PostImporter<'a> {
    db: &'a Database,
    normalizer: &'a TagNormalizer,
    translator: Box<dyn PostTranslator>,
}

impl<'a> PostImporter<'a> {
    /// # Errors
    ///
    /// Returns an error if `source` has no post translator.
    pub fn new(db: &'a Database, normalizer: &'a TagNormalizer, source: Source) -> Result<Self> {
        Ok(Self {
            db,
            normalizer,
            translator: post_translator(source)?,
        })
    }

    /// Builds the stored form of one raw post, or `None` if it is unusable.
    pub fn prepare(&self, record: &Value) -> Option<PostEntity> {
        let mut post = self.translator.translate(record, self.normalizer)?;
        post.extend_tags(self.normalizer.get_pseudo_tags(&post));
        post.dedup_tags();
        Some(post)
    }

    /// Imports every record, counting outcomes.
    pub fn import_records(&self, records: impl IntoIterator<Item = Value>) -> ImportStats {
        let mut stats = ImportStats::default();

        for record in records {
            let Some(post) = self.prepare(&record) else {
                stats.skipped += 1;
                continue;
            };
            match self.db.upsert_post(&post) {
                Ok(()) => stats.imported += 1,
                Err(e) => {
                    warn!(source = %post.source, id = %post.source_id, error = %e, "Failed to store post");
                    stats.store_errors += 1;
                }
            }
        }

        stats
    }

    /// Imports a JSONL post dump.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file cannot be opened.
    pub fn import_jsonl(&self, path: &Path) -> Result<ImportStats> {
        let mut lines = JsonLines::new(open_reader(path)?, path.display().to_string());

        let mut stats = self.import_records(&mut lines);
        stats.lines = lines.lines_read();
        stats.json_errors = lines.errors();

        info!(
            file = %path.display(),
            imported = stats.imported,
            skipped = stats.skipped,
            json_errors = stats.json_errors,
            store_errors = stats.store_errors,
            "Imported posts"
        );
        Ok(stats)
    }
}
