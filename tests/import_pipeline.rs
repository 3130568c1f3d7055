use std::fs;
use std::path::{Path, PathBuf};

use rising::translator::{alias_translator, tag_translator};
use rising::utils::open_reader;
use rising::{
    Database, JsonLines, NormalizerConfig, PostImporter, Selector, SelectorLists, Source,
    TagNormalizer, TagVersion, load_aliases, read_tags,
};
use serde_json::{Value, json};
use tempfile::tempdir;

fn write_jsonl(dir: &Path, name: &str, records: &[Value]) -> PathBuf {
    let path = dir.join(name);
    let body: Vec<String> = records.iter().map(Value::to_string).collect();
    fs::write(&path, body.join("\n")).unwrap();
    path
}

fn e621_tags() -> Vec<Value> {
    vec![
        json!({"id": 1, "name": "fox", "post_count": 1000, "category": 5}),
        json!({"id": 2, "name": "fox_(artist)", "post_count": 5, "category": 1}),
        json!({"id": 3, "name": "wolf", "post_count": 800, "category": 5}),
        json!({"id": 4, "name": "blue_eyes", "post_count": 300, "category": 0}),
        json!({"id": 5, "name": "broken", "post_count": 1, "category": 6}),
    ]
}

fn e621_post(id: u64, tags: Value, score: i64, favorites: i64) -> Value {
    json!({
        "id": id,
        "created_at": "2024-03-01T08:30:00.000-05:00",
        "file": {
            "width": 1600, "height": 900, "ext": "jpg", "size": 4096,
            "md5": format!("md5-{id}"), "url": format!("https://static1.e621.net/data/{id}.jpg")
        },
        "sample": {"has": true, "width": 850, "height": 478, "url": format!("https://static1.e621.net/sample/{id}.jpg")},
        "score": {"up": score, "down": 0, "total": score},
        "tags": tags,
        "rating": "q",
        "fav_count": favorites,
        "sources": [],
        "description": "",
        "comment_count": 0
    })
}

fn load_normalizer(dir: &Path) -> TagNormalizer {
    let aliases_path = write_jsonl(
        dir,
        "aliases.jsonl",
        &[
            json!({"id": 1, "antecedent_name": "wolves", "consequent_name": "wolf"}),
            json!({"id": 2, "antecedent_name": "kitsune", "consequent_name": "fox"}),
        ],
    );
    let tags_path = write_jsonl(dir, "tags.jsonl", &e621_tags());

    let alias_reader = alias_translator(Source::E621).unwrap();
    let mut alias_lines = JsonLines::new(open_reader(&aliases_path).unwrap(), "aliases");
    let aliases = load_aliases(&mut alias_lines, alias_reader.as_ref());

    let translator = tag_translator(Source::E621, Some(aliases)).unwrap();
    let mut lines = JsonLines::new(open_reader(&tags_path).unwrap(), "tags");

    let mut normalizer = TagNormalizer::new(NormalizerConfig::default());
    let stats = normalizer
        .load(read_tags(&mut lines, translator.as_ref()))
        .unwrap();
    assert_eq!(stats.tags, 5);
    assert_eq!(stats.invalid, 1);

    normalizer.normalize(TagVersion::V2).unwrap();
    normalizer
}

#[test]
fn tags_and_posts_flow_into_the_database() {
    let dir = tempdir().unwrap();
    let mut normalizer = load_normalizer(dir.path());

    assert_eq!(normalizer.normalize_tag("fox"), Some("fox"));
    assert_eq!(normalizer.normalize_tag("fox_(artist)"), Some("fox_artist"));
    assert_eq!(
        normalizer.get_by_deep_search("wolves").map(|t| t.source_id.as_str()),
        Some("3")
    );

    let db = Database::in_memory().unwrap();
    let (saved, errors) = db.save_tags(normalizer.get_tags()).unwrap();
    assert_eq!(errors, 0);
    assert_eq!(saved, normalizer.len());

    let posts_path = write_jsonl(
        dir.path(),
        "posts.jsonl",
        &[
            e621_post(
                100,
                json!({"species": ["fox", "wolf"], "artist": ["fox_(artist)"], "general": ["blue_eyes", "unheard_of"]}),
                700,
                20,
            ),
            json!({"id": 101, "file": {"url": null}}),
        ],
    );

    let importer = PostImporter::new(&db, &normalizer, Source::E621).unwrap();
    let stats = importer.import_jsonl(&posts_path).unwrap();
    assert_eq!(stats.imported, 1);
    assert_eq!(stats.skipped, 1);

    let post = db.get_post(Source::E621, "100").unwrap().unwrap();
    for expected in [
        "fox",
        "wolf",
        "fox_artist",
        "blue_eyes",
        "score_above_500",
        "rating_questionable",
        "rising_masterpiece",
    ] {
        assert!(post.tags.contains(&expected.to_string()), "missing {expected}");
    }
    assert!(!post.tags.contains(&"unheard_of".to_string()));
    assert!(!post.tags.contains(&"rising_unpopular".to_string()));
    assert_eq!(post.image_ratio, 1.78);
    assert_eq!(post.medium.as_ref().unwrap().width, 850);
}

#[test]
fn appended_posts_resolve_against_stored_tags() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("rising.db");

    {
        let normalizer = load_normalizer(dir.path());
        let db = Database::open(&db_path).unwrap();
        db.save_tags(normalizer.get_tags()).unwrap();
    }

    let db = Database::open(&db_path).unwrap();
    let stored = db.load_tags().unwrap();
    let normalizer =
        TagNormalizer::from_entities(NormalizerConfig::default(), stored, TagVersion::V2);

    assert_eq!(normalizer.normalize_tag("fox_(artist)"), Some("fox_artist"));
    assert_eq!(normalizer.get("fox").unwrap().source_id, "1");

    let posts_path = write_jsonl(
        dir.path(),
        "more_posts.jsonl",
        &[e621_post(200, json!({"artist": ["fox_(artist)"], "species": ["wolf"]}), 2, 0)],
    );
    let importer = PostImporter::new(&db, &normalizer, Source::E621).unwrap();
    let stats = importer.import_jsonl(&posts_path).unwrap();
    assert_eq!(stats.imported, 1);

    let post = db.get_post(Source::E621, "200").unwrap().unwrap();
    assert_eq!(&post.tags[..2], ["fox_artist", "wolf"]);
    assert!(post.tags.contains(&"rising_unpopular".to_string()));
}

#[test]
fn reset_then_reimport_replaces_content() {
    let dir = tempdir().unwrap();
    let normalizer = load_normalizer(dir.path());
    let db = Database::in_memory().unwrap();

    db.save_tags(normalizer.get_tags()).unwrap();
    db.reset().unwrap();
    assert_eq!(db.tag_count().unwrap(), 0);

    db.save_tags(normalizer.get_tags()).unwrap();
    let fox = db.get_tag(Source::E621, "2").unwrap().unwrap();
    assert_eq!(fox.preferred_name, "fox_artist");
    assert_eq!(fox.v1_name, "artist:fox");
}

#[test]
fn selector_picks_imported_posts_by_stored_names() {
    let dir = tempdir().unwrap();
    let normalizer = load_normalizer(dir.path());
    let db = Database::in_memory().unwrap();
    db.save_tags(normalizer.get_tags()).unwrap();

    let posts_path = write_jsonl(
        dir.path(),
        "posts.jsonl",
        &[
            e621_post(300, json!({"species": ["wolf"], "artist": ["fox_(artist)"]}), 5, 1),
            e621_post(301, json!({"species": ["wolf"], "general": ["blue_eyes"]}), 5, 1),
            e621_post(302, json!({"species": ["fox"]}), 5, 1),
        ],
    );
    PostImporter::new(&db, &normalizer, Source::E621)
        .unwrap()
        .import_jsonl(&posts_path)
        .unwrap();

    let lists = SelectorLists {
        include: vec!["wolf".to_string(), "missing_tag".to_string()],
        exclude: vec!["v1:artist:fox".to_string()],
    };
    let mut selector = Selector::from_lists(&db, "pipeline", &lists).unwrap();
    assert_eq!(selector.includes(), ["wolf"]);
    assert_eq!(selector.excludes(), ["fox_artist"]);

    let selected = selector.select(&[], None).unwrap();
    let ids: Vec<&str> = selected.iter().map(|s| s.post.source_id.as_str()).collect();
    assert_eq!(ids, ["301"]);
    assert_eq!(selected[0].matches, ["wolf"]);
    assert!(selected[0].post.tags.contains(&"blue_eyes".to_string()));
}
