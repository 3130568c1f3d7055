use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rising::translator::{alias_translator, tag_translator};
use rising::utils::{ensure_database_directory, get_database_path, open_reader};
use rising::{
    ConfigPaths, Database, ImportStats, JsonLines, NormalizerConfig, PostImporter, SelectedPost,
    Selector, Source, TagNormalizer, TagVersion, load_aliases, read_tags,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// rising - imageboard tag normalization and post import
#[derive(Parser)]
#[command(name = "rising")]
#[command(about = "Normalizes imageboard tags into one namespace and imports posts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Load and normalize tag dumps, save them, then import posts
    Import(ImportCommand),
    /// Import more posts against previously saved tags
    Append(AppendCommand),
    /// Write stored posts matching a selector file as JSONL
    Select(SelectCommand),
}

#[derive(Args)]
struct ImportCommand {
    /// Tag dump files (JSONL)
    #[arg(long, value_name = "FILE", num_args = 1.., required = true)]
    tags: Vec<PathBuf>,

    /// Post dump files (JSONL)
    #[arg(long, value_name = "FILE", num_args = 1..)]
    posts: Vec<PathBuf>,

    /// Source the dumps come from (e621, e926, danbooru, gelbooru, rule34)
    #[arg(long)]
    source: Source,

    /// Alias dump file (JSONL)
    #[arg(long, value_name = "FILE")]
    aliases: Option<PathBuf>,

    /// Naming tier used for preferred names
    #[arg(long, value_parser = parse_tag_version, default_value = "v2")]
    tag_version: TagVersion,

    #[command(flatten)]
    rules: RuleFiles,

    /// Database file (defaults to the user data directory)
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Do not write normalized tags to the database
    #[arg(long)]
    skip_save_tags: bool,

    /// Delete stored tags and posts before importing
    #[arg(long)]
    remove_old: bool,
}

#[derive(Args)]
struct RuleFiles {
    /// YAML list of tag names to drop
    #[arg(long, value_name = "FILE")]
    prefilter: Option<PathBuf>,

    /// YAML list of tag renames
    #[arg(long, value_name = "FILE")]
    rewrites: Option<PathBuf>,

    /// YAML list of symbol tags
    #[arg(long, value_name = "FILE")]
    symbols: Option<PathBuf>,

    /// YAML list of aspect ratio tags
    #[arg(long, value_name = "FILE")]
    aspect_ratios: Option<PathBuf>,

    /// YAML map of category naming weights
    #[arg(long, value_name = "FILE")]
    category_weights: Option<PathBuf>,
}

impl RuleFiles {
    fn to_paths(&self) -> ConfigPaths {
        ConfigPaths {
            prefilter: self.prefilter.clone(),
            symbols: self.symbols.clone(),
            aspect_ratios: self.aspect_ratios.clone(),
            rewrites: self.rewrites.clone(),
            category_weights: self.category_weights.clone(),
        }
    }
}

#[derive(Args)]
struct AppendCommand {
    /// Post dump files (JSONL)
    #[arg(long, value_name = "FILE", num_args = 1.., required = true)]
    posts: Vec<PathBuf>,

    /// Source the dumps come from
    #[arg(long)]
    source: Source,

    /// Database file (defaults to the user data directory)
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,
}

#[derive(Args)]
struct SelectCommand {
    /// Selector YAML file (include/exclude tag lists)
    #[arg(short, long, value_name = "FILE")]
    selector: PathBuf,

    /// Output file (JSONL)
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Maximum number of posts to write
    #[arg(short, long, value_name = "COUNT")]
    limit: Option<usize>,

    /// Image formats to select from (default: jpg, png)
    #[arg(short = 'i', long = "image-format", value_name = "FORMAT")]
    image_formats: Vec<String>,

    /// Database file (defaults to the user data directory)
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Import(cmd) => handle_import(cmd),
        Commands::Append(cmd) => handle_append(cmd),
        Commands::Select(cmd) => handle_select(cmd),
    };

    if let Err(e) = result {
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are missing input files and unsupported sources.
fn is_user_error(error: &anyhow::Error) -> bool {
    let missing_file = error.chain().any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
    });
    missing_file || error.to_string().contains("Unsupported source")
}

fn parse_tag_version(value: &str) -> Result<TagVersion, String> {
    match value.trim().to_lowercase().as_str() {
        "v0" | "0" => Ok(TagVersion::V0),
        "v1" | "1" => Ok(TagVersion::V1),
        "v2" | "2" => Ok(TagVersion::V2),
        other => Err(format!("unknown tag version '{other}' (expected v0, v1 or v2)")),
    }
}

fn open_database(path: Option<&Path>) -> Result<Database> {
    let db_path = match path {
        Some(path) => path.to_path_buf(),
        None => get_database_path()?,
    };
    ensure_database_directory(&db_path)?;
    Database::open(&db_path).context("Failed to open database")
}

/// Handles the import command: load, normalize, save, import.
fn handle_import(cmd: &ImportCommand) -> Result<()> {
    let config = NormalizerConfig::load(&cmd.rules.to_paths())?;

    let aliases = match &cmd.aliases {
        Some(path) => {
            let translator = alias_translator(cmd.source)?;
            let mut lines = JsonLines::new(open_reader(path)?, path.display().to_string());
            Some(load_aliases(&mut lines, translator.as_ref()))
        }
        None => None,
    };

    let translator = tag_translator(cmd.source, aliases)?;
    let mut normalizer = TagNormalizer::new(config);
    for path in &cmd.tags {
        let mut lines = JsonLines::new(open_reader(path)?, path.display().to_string());
        normalizer
            .load(read_tags(&mut lines, translator.as_ref()))
            .with_context(|| format!("Failed to load tags from {}", path.display()))?;
        if lines.errors() > 0 {
            info!(file = %path.display(), errors = lines.errors(), "Skipped malformed tag lines");
        }
    }

    let report = normalizer
        .normalize(cmd.tag_version)
        .context("Failed to normalize tags")?;
    info!(
        "{} tags normalized; {} merged, {} kept apart, {} short names promoted",
        report.normalized,
        report.merges(),
        report.rebinds(),
        report.promotions
    );

    let db = open_database(cmd.database.as_deref())?;
    if cmd.remove_old {
        db.reset()?;
        info!("Removed previously stored tags and posts");
    }
    if !cmd.skip_save_tags {
        let (saved, errors) = db.save_tags(normalizer.get_tags())?;
        println!("Saved {saved} tags ({errors} errors)");
    }

    let stats = import_posts(&db, &normalizer, cmd.source, &cmd.posts)?;
    print_stats(&stats);
    Ok(())
}

/// Handles the append command: rebuild from stored tags, then import.
fn handle_append(cmd: &AppendCommand) -> Result<()> {
    let db = open_database(cmd.database.as_deref())?;
    let tags = db.load_tags().context("Failed to load stored tags")?;
    if tags.is_empty() {
        anyhow::bail!("No stored tags; run `rising import` first");
    }

    let normalizer =
        TagNormalizer::from_entities(NormalizerConfig::default(), tags, TagVersion::V2);
    info!(tags = normalizer.len(), "Rebuilt normalizer from database");

    let stats = import_posts(&db, &normalizer, cmd.source, &cmd.posts)?;
    print_stats(&stats);
    Ok(())
}

/// Handles the select command: resolve the selector, then write matches.
fn handle_select(cmd: &SelectCommand) -> Result<()> {
    let db = open_database(cmd.database.as_deref())?;
    let mut selector = Selector::load(&db, &cmd.selector)?;
    let selected = selector.select(&cmd.image_formats, cmd.limit)?;

    write_selection(&cmd.output, &selected)?;
    println!(
        "Selected {} posts into {}",
        selected.len(),
        cmd.output.display()
    );
    Ok(())
}

fn write_selection(path: &Path, selected: &[SelectedPost]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for sample in selected {
        serde_json::to_writer(&mut writer, sample)?;
        writer.write_all(b"\n")?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn import_posts(
    db: &Database,
    normalizer: &TagNormalizer,
    source: Source,
    paths: &[PathBuf],
) -> Result<ImportStats> {
    let importer = PostImporter::new(db, normalizer, source)?;
    let mut total = ImportStats::default();
    for path in paths {
        total += importer.import_jsonl(path)?;
    }
    Ok(total)
}

fn print_stats(stats: &ImportStats) {
    println!(
        "Imported {} posts from {} lines ({} skipped, {} malformed, {} store errors)",
        stats.imported, stats.lines, stats.skipped, stats.json_errors, stats.store_errors
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tag_version_accepts_prefixed_and_bare() {
        assert_eq!(parse_tag_version("v1"), Ok(TagVersion::V1));
        assert_eq!(parse_tag_version("2"), Ok(TagVersion::V2));
        assert!(parse_tag_version("v3").is_err());
    }

    #[test]
    fn cli_parses_import_arguments() {
        let cli = Cli::try_parse_from([
            "rising", "import", "--tags", "a.jsonl", "b.jsonl", "--posts", "p.jsonl",
            "--source", "e926", "--remove-old",
        ])
        .unwrap();

        let Commands::Import(cmd) = cli.command else {
            panic!("expected import command");
        };
        assert_eq!(cmd.tags.len(), 2);
        assert_eq!(cmd.source, Source::E621);
        assert_eq!(cmd.tag_version, TagVersion::V2);
        assert!(cmd.remove_old);
        assert!(!cmd.skip_save_tags);
    }

    #[test]
    fn cli_rejects_unknown_source() {
        assert!(
            Cli::try_parse_from(["rising", "append", "--posts", "p.jsonl", "--source", "pixiv"])
                .is_err()
        );
    }

    #[test]
    fn missing_files_are_user_errors() {
        let err = open_reader(Path::new("/nonexistent/tags.jsonl")).unwrap_err();
        assert!(is_user_error(&err));
        assert!(!is_user_error(&anyhow::anyhow!("disk full")));
    }

    #[test]
    fn cli_parses_select_arguments() {
        let cli = Cli::try_parse_from([
            "rising", "select", "-s", "sel.yaml", "-o", "out.jsonl", "-i", "jpg", "-i", "webm",
            "--limit", "5",
        ])
        .unwrap();

        let Commands::Select(cmd) = cli.command else {
            panic!("expected select command");
        };
        assert_eq!(cmd.image_formats, vec!["jpg", "webm"]);
        assert_eq!(cmd.limit, Some(5));
    }

    #[test]
    fn select_writes_matching_posts() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("rising.db");
        let selector = dir.path().join("selector.yaml");
        let output = dir.path().join("out").join("selected.jsonl");
        fs::write(&selector, "- fox\n- dragon\n").unwrap();

        {
            let mut normalizer = TagNormalizer::new(NormalizerConfig::default());
            normalizer
                .load(vec![rising::ProtoTag::new(
                    Source::E621,
                    "1",
                    "fox",
                    rising::Category::Species,
                    3,
                )])
                .unwrap();
            normalizer.normalize(TagVersion::V2).unwrap();
            let db = Database::open(&db_path).unwrap();
            db.save_tags(normalizer.get_tags()).unwrap();
        }

        let cmd = SelectCommand {
            selector,
            output: output.clone(),
            limit: None,
            image_formats: Vec::new(),
            database: Some(db_path),
        };
        handle_select(&cmd).unwrap();

        assert!(fs::read_to_string(&output).unwrap().is_empty());
    }

    #[test]
    fn append_requires_stored_tags() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = AppendCommand {
            posts: vec![dir.path().join("posts.jsonl")],
            source: Source::E621,
            database: Some(dir.path().join("rising.db")),
        };
        let err = handle_append(&cmd).unwrap_err();
        assert!(err.to_string().contains("No stored tags"));
    }
}
