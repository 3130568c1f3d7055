use std::fs;

use rising::{
    Category, ConfigPaths, NormalizerConfig, PostEntity, ProtoTag, Rating, Source, TagNormalizer,
    TagVersion, get_pseudo_tags,
};
use tempfile::tempdir;
use time::OffsetDateTime;

fn tag(id: &str, name: &str, category: Category, count: i64) -> ProtoTag {
    ProtoTag::new(Source::E621, id, name, category, count)
}

fn normalized(config: NormalizerConfig, tags: Vec<ProtoTag>) -> TagNormalizer {
    let mut normalizer = TagNormalizer::new(config);
    normalizer.load(tags).expect("load failed");
    normalizer.normalize(TagVersion::V2).expect("normalize failed");
    normalizer
}

fn post(score: i64, favorites: i64, rating: Rating) -> PostEntity {
    PostEntity {
        source: Source::E621,
        source_id: "1".to_string(),
        rating,
        tags: Vec::new(),
        description: None,
        origin_urls: Vec::new(),
        origin_md5: None,
        origin_format: "png".to_string(),
        origin_size: None,
        image_url: "https://static.example/1.png".to_string(),
        image_width: 10,
        image_height: 10,
        image_ratio: 1.0,
        small: None,
        medium: None,
        score: Some(score),
        favorites_count: Some(favorites),
        comment_count: None,
        view_count: None,
        created_at: None,
        timestamp: OffsetDateTime::UNIX_EPOCH,
    }
}

#[test]
fn basic_general_tag_keeps_its_name() {
    let normalizer = normalized(
        NormalizerConfig::default(),
        vec![tag("1", "blue_eyes", Category::General, 500)],
    );

    let entity = normalizer.get_by_original_name("blue_eyes").unwrap();
    assert_eq!(entity.v1_name, "blue_eyes");
    assert_eq!(entity.v2_name, "blue_eyes");
    assert_eq!(entity.preferred_name, "blue_eyes");
}

#[test]
fn artist_tag_gets_suffixed_long_name() {
    let normalizer = normalized(
        NormalizerConfig::default(),
        vec![tag("2", "john_doe", Category::Artist, 10)],
    );

    let entity = normalizer.get_by_original_name("john_doe").unwrap();
    assert_eq!(entity.v1_name, "artist:john_doe");
    assert_eq!(entity.v2_name, "john_doe_artist");
    assert_eq!(entity.v2_short, "john_doe");
}

#[test]
fn species_wins_short_name_over_artist() {
    let normalizer = normalized(
        NormalizerConfig::default(),
        vec![
            tag("3", "fox", Category::Species, 1000),
            tag("4", "fox_(artist)", Category::Artist, 5),
        ],
    );

    assert_eq!(normalizer.normalize_tag("fox"), Some("fox"));
    assert_eq!(normalizer.normalize_tag("fox_(artist)"), Some("fox_artist"));
    assert_eq!(normalizer.get("fox_artist").unwrap().source_id, "4");
    assert_eq!(normalizer.get("artist:fox").unwrap().source_id, "4");
}

#[test]
fn identical_tags_merge_into_the_more_used_one() {
    let normalizer = normalized(
        NormalizerConfig::default(),
        vec![
            tag("10", "Wolf", Category::General, 5),
            tag("11", "wolf", Category::General, 50),
        ],
    );

    let wolves: Vec<_> = normalizer
        .get_tags()
        .filter(|t| t.v2_name == "wolf")
        .collect();
    assert_eq!(wolves.len(), 1);
    assert_eq!(wolves[0].source_id, "11");
    assert_eq!(normalizer.get("wolf").unwrap().source_id, "11");
    assert_eq!(normalizer.normalize_tag("Wolf"), Some("wolf"));
}

#[test]
fn pseudo_tags_for_a_popular_safe_post() {
    let labels = get_pseudo_tags(&post(700, 100, Rating::Safe));

    assert!(labels.contains(&"score_above_500".to_string()));
    assert!(labels.contains(&"rating_safe".to_string()));
    assert!(labels.contains(&"rising_masterpiece".to_string()));
    assert!(!labels.contains(&"rising_unpopular".to_string()));
}

#[test]
fn pseudo_tags_resolve_through_the_normalizer() {
    let normalizer = normalized(NormalizerConfig::default(), Vec::new());

    for label in get_pseudo_tags(&post(3, 2000, Rating::Explicit)) {
        let entity = normalizer.get(&label).expect("pseudo tag not registered");
        assert_eq!(entity.source, Source::Rising);
        assert_eq!(entity.preferred_name, label);
    }
}

#[test]
fn yaml_rule_files_drive_loading() {
    let dir = tempdir().unwrap();
    let write = |name: &str, body: &str| {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        Some(path)
    };

    let paths = ConfigPaths {
        prefilter: write("prefilter.yaml", "tags:\n  - conditional_dnp\n"),
        symbols: write("symbols.yaml", "tags:\n  - \"<3\"\n"),
        aspect_ratios: write("aspect_ratios.yaml", "tags:\n  - \"16:9\"\n"),
        rewrites: write(
            "rewrites.yaml",
            "tags:\n  - from: colour\n    to: color\n",
        ),
        category_weights: write("weights.yaml", "categories:\n  artist: -1\n"),
    };
    let config = NormalizerConfig::load(&paths).unwrap();

    let normalizer = normalized(
        config,
        vec![
            tag("1", "conditional_dnp", Category::Meta, 10),
            tag("2", "<3", Category::General, 10),
            tag("3", "16:9", Category::Meta, 10),
            tag("4", "colour", Category::General, 10),
            tag("5", "fox", Category::Species, 1000),
            tag("6", "fox_(artist)", Category::Artist, 5),
        ],
    );

    assert!(normalizer.get_by_original_name("conditional_dnp").is_none());
    assert_eq!(normalizer.normalize_tag("<3"), Some("<3"));
    assert_eq!(normalizer.get("<3").unwrap().category, Category::Symbol);
    assert_eq!(normalizer.normalize_tag("16:9"), Some("16_9"));
    assert_eq!(normalizer.get("16_9").unwrap().category, Category::AspectRatio);
    assert_eq!(normalizer.normalize_tag("colour"), Some("color"));

    // artists outrank species under these weights
    assert_eq!(normalizer.normalize_tag("fox_(artist)"), Some("fox"));
    assert_eq!(normalizer.normalize_tag("fox"), Some("fox_species"));
}

#[test]
fn invalid_rule_file_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("weights.yaml");
    fs::write(&path, "categories:\n  not_a_category: 3\n").unwrap();

    let paths = ConfigPaths {
        category_weights: Some(path),
        ..Default::default()
    };
    let err = NormalizerConfig::load(&paths).unwrap_err();
    assert!(format!("{err:#}").contains("weights.yaml"));
}

#[test]
fn same_input_same_names() {
    let input = || {
        vec![
            tag("1", "fox", Category::Species, 10),
            tag("2", "fox_(artist)", Category::Artist, 10),
            tag("3", "fox_(character)", Category::Character, 10),
            tag("4", "foo", Category::Meta, 3),
            tag("5", "foo_meta", Category::General, 3),
        ]
    };

    let names = |n: TagNormalizer| -> Vec<String> {
        n.get_tags().map(|t| t.preferred_name.clone()).collect()
    };

    let first = names(normalized(NormalizerConfig::default(), input()));
    let second = names(normalized(NormalizerConfig::default(), input()));
    assert_eq!(first, second);
}
