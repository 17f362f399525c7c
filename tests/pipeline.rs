use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fc_screen_stats::cache::CachedExtractor;
use fc_screen_stats::config::Config;
use fc_screen_stats::error::{ExtractError, RunError};
use fc_screen_stats::gemini::{Extraction, ImageExtractor};
use fc_screen_stats::pipeline::{build_extractor, list_images, run};
use fc_screen_stats::workbook::read_tables;

/// Replies keyed by image file name.
struct ScriptedExtractor {
    replies: HashMap<String, String>,
    seen: Vec<String>,
}

impl ScriptedExtractor {
    fn new(replies: &[(&str, &str)]) -> Self {
        Self {
            replies: replies
                .iter()
                .map(|(name, reply)| (name.to_string(), reply.to_string()))
                .collect(),
            seen: Vec::new(),
        }
    }
}

impl ImageExtractor for ScriptedExtractor {
    fn extract(&mut self, image: &Path) -> Result<Extraction, ExtractError> {
        let name = image
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        self.seen.push(name.clone());
        match self.replies.get(&name) {
            Some(text) => Ok(Extraction {
                text: text.clone(),
                usage: None,
                cached: false,
            }),
            None => Err(ExtractError::ImageNotFound(image.to_path_buf())),
        }
    }
}

fn shooting_reply(stats: &str) -> String {
    format!(
        "```json\n{{\"team_name\": \"Spurs\", \"featured_player\": {{\"name\": \"Hleb\", \"overall_rating\": 84, \"match_rating\": 8.4}}, \
         \"player_list\": [{{\"position\": \"CAM\", \"name\": \"Hleb\", \"match_rating\": 8.4, \"goals\": 0, \"assists\": 2}}], \
         \"detailed_stats_category\": \"Shooting\", \
         \"selected_player_detailed_stats\": {{\"player_name\": \"Hleb\", \"stats\": {stats}}}}}\n```"
    )
}

struct Workspace {
    _root: tempfile::TempDir,
    config: Config,
}

fn workspace(images: &[&str]) -> Workspace {
    let root = tempfile::tempdir().expect("tempdir");
    let input = root.path().join("Data");
    fs::create_dir_all(&input).expect("input dir");
    for name in images {
        fs::write(input.join(name), b"png").expect("write image");
    }
    let config = Config {
        api_key: None,
        input_dir: input,
        temp_dir: root.path().join("Data/Temp"),
        output_dir: root.path().join("Data/Final_Output"),
        pacing: Duration::ZERO,
        cache_dir: None,
        ..Config::default()
    };
    Workspace {
        _root: root,
        config,
    }
}

fn final_path(config: &Config, name: &str) -> PathBuf {
    config.output_dir.join(name)
}

#[test]
fn run_exports_every_image_and_merges() {
    let ws = workspace(&["a.png", "b.PNG", "notes.txt"]);
    let a = shooting_reply("{\"Shots\": 3}");
    let b = shooting_reply("{\"Shots\": 3, \"On Target\": 1}");
    let mut extractor = ScriptedExtractor::new(&[("a.png", a.as_str()), ("b.PNG", b.as_str())]);

    let summary = run(&ws.config, &mut extractor).expect("run should succeed");
    assert_eq!(extractor.seen, vec!["a.png", "b.PNG"]);
    assert_eq!(summary.images, 2);
    assert_eq!(summary.exported.len(), 2);
    assert!(summary.skipped.is_empty());
    assert!(ws.config.temp_dir.join("Stats_Shooting_0.xlsx").exists());
    assert!(ws.config.temp_dir.join("Stats_Shooting_1.xlsx").exists());

    let merged = final_path(&ws.config, "Stats_Shooting_Final.xlsx");
    assert_eq!(summary.final_outputs(), vec![merged.as_path()]);
    let tables = read_tables(&merged).expect("read merged");
    let stats: Vec<String> = tables[2].values("Stat").iter().map(|c| c.to_string()).collect();
    assert_eq!(stats, vec!["Shots", "On Target"]);
}

#[test]
fn run_wipes_stale_outputs() {
    let ws = workspace(&["a.png"]);
    fs::create_dir_all(&ws.config.temp_dir).expect("temp dir");
    fs::create_dir_all(&ws.config.output_dir).expect("out dir");
    fs::write(ws.config.temp_dir.join("Stats_Shooting_9.xlsx"), b"stale").expect("stale temp");
    fs::write(ws.config.output_dir.join("old.xlsx"), b"stale").expect("stale out");

    let reply = shooting_reply("{\"Shots\": 1}");
    let mut extractor = ScriptedExtractor::new(&[("a.png", reply.as_str())]);
    let summary = run(&ws.config, &mut extractor).expect("run should succeed");

    assert!(!ws.config.temp_dir.join("Stats_Shooting_9.xlsx").exists());
    assert!(!ws.config.output_dir.join("old.xlsx").exists());
    let shooting = summary
        .merged
        .iter()
        .find(|(c, _)| c.label() == "Shooting")
        .and_then(|(_, r)| r.as_ref().ok())
        .and_then(|r| r.as_ref())
        .expect("shooting merged");
    assert!(shooting.skipped.is_empty());
}

#[test]
fn invalid_record_is_skipped_unless_strict() {
    let ws = workspace(&["a.png", "b.png"]);
    let good = shooting_reply("{\"Shots\": 1}");
    let bad = "{\"team_name\": \"Spurs\"}";
    let mut extractor = ScriptedExtractor::new(&[("a.png", bad), ("b.png", good.as_str())]);
    let summary = run(&ws.config, &mut extractor).expect("lenient run continues");
    assert_eq!(summary.exported.len(), 1);
    assert_eq!(summary.skipped.len(), 1);
    assert!(matches!(summary.skipped[0].error, RunError::Validation { .. }));

    let mut strict = ws.config.clone();
    strict.strict = true;
    let mut extractor = ScriptedExtractor::new(&[("a.png", bad), ("b.png", good.as_str())]);
    let err = run(&strict, &mut extractor).unwrap_err();
    assert!(matches!(err, RunError::Validation { .. }));
    assert_eq!(extractor.seen, vec!["a.png"]);
}

#[test]
fn unparseable_reply_ends_the_run_with_raw_text() {
    let ws = workspace(&["a.png", "b.png"]);
    let good = shooting_reply("{\"Shots\": 1}");
    let mut extractor = ScriptedExtractor::new(&[
        ("a.png", "Sorry, I can't read this screenshot."),
        ("b.png", good.as_str()),
    ]);
    match run(&ws.config, &mut extractor) {
        Err(RunError::ResponseParse { raw, image, .. }) => {
            assert!(raw.contains("Sorry"));
            assert!(image.ends_with("a.png"));
        }
        other => panic!("expected parse error, got {other:?}"),
    }
    assert_eq!(extractor.seen, vec!["a.png"]);
    assert_eq!(
        fs::read_dir(&ws.config.output_dir).expect("out dir").count(),
        0
    );
}

#[test]
fn missing_image_is_input_not_found() {
    let ws = workspace(&["a.png"]);
    let mut extractor = ScriptedExtractor::new(&[]);
    let err = run(&ws.config, &mut extractor).unwrap_err();
    assert!(matches!(err, RunError::InputNotFound(_)));
}

#[test]
fn empty_input_dir_produces_no_outputs() {
    let ws = workspace(&[]);
    let mut extractor = ScriptedExtractor::new(&[]);
    let summary = run(&ws.config, &mut extractor).expect("run");
    assert_eq!(summary.images, 0);
    assert!(summary.final_outputs().is_empty());
    assert!(summary.merged.iter().all(|(_, r)| matches!(r, Ok(None))));
}

#[test]
fn list_images_filters_by_extension() {
    let ws = workspace(&["b.png", "a.png", "c.jpg", "d.png.txt"]);
    let images = list_images(&ws.config.input_dir, "png").expect("list");
    let names: Vec<String> = images
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.png", "b.png"]);
}

#[test]
fn missing_api_key_is_a_configuration_error() {
    let ws = workspace(&[]);
    match build_extractor(&ws.config) {
        Err(RunError::Configuration(msg)) => assert!(msg.contains("GEMINI_API_KEY")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("extractor built without a key"),
    }
}

#[test]
fn repeated_stat_in_reply_keeps_first_value() {
    let ws = workspace(&["a.png"]);
    let reply = shooting_reply("{\"Shots\": 3, \"Goals\": 1, \"Shots\": 5}");
    let mut extractor = ScriptedExtractor::new(&[("a.png", reply.as_str())]);
    run(&ws.config, &mut extractor).expect("run should succeed");

    let tables = read_tables(&ws.config.temp_dir.join("Stats_Shooting_0.xlsx")).expect("read export");
    let stats: Vec<(String, Option<f64>)> = tables[2]
        .rows
        .iter()
        .map(|row| (row[0].to_string(), row[1].as_f64()))
        .collect();
    assert_eq!(
        stats,
        vec![("Shots".to_string(), Some(3.0)), ("Goals".to_string(), Some(1.0))]
    );
}

#[test]
fn cached_replies_are_counted() {
    let ws = workspace(&["a.png"]);
    let cache_dir = tempfile::tempdir().expect("cache dir");
    let reply = shooting_reply("{\"Shots\": 1}");

    let mut first = CachedExtractor::new(
        Box::new(ScriptedExtractor::new(&[("a.png", reply.as_str())])),
        cache_dir.path(),
        "model",
        "prompt",
    );
    let summary = run(&ws.config, &mut first).expect("first run");
    assert_eq!(summary.cache_hits, 0);

    // Nothing scripted: a second model call would fail the run.
    let mut second = CachedExtractor::new(
        Box::new(ScriptedExtractor::new(&[])),
        cache_dir.path(),
        "model",
        "prompt",
    );
    let summary = run(&ws.config, &mut second).expect("second run");
    assert_eq!(summary.cache_hits, 1);
    assert_eq!(summary.exported.len(), 1);
}

#[test]
fn overlapping_directories_are_refused_before_wiping() {
    let ws = workspace(&["a.png"]);
    let image = ws.config.input_dir.join("a.png");
    let reply = shooting_reply("{\"Shots\": 1}");

    let mut same = ws.config.clone();
    same.temp_dir = same.input_dir.clone();
    let mut extractor = ScriptedExtractor::new(&[("a.png", reply.as_str())]);
    match run(&same, &mut extractor) {
        Err(RunError::Configuration(msg)) => assert!(msg.contains("TEMP_DIR")),
        other => panic!("expected configuration error, got {other:?}"),
    }
    assert!(extractor.seen.is_empty());
    assert!(image.exists());

    let mut parent = ws.config.clone();
    parent.output_dir = ws._root.path().to_path_buf();
    let err = run(&parent, &mut extractor).unwrap_err();
    assert!(matches!(err, RunError::Configuration(msg) if msg.contains("OUTPUT_DIR")));
    assert!(image.exists());
}
