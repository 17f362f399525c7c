use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::CachedExtractor;
use crate::category::Category;
use crate::config::Config;
use crate::error::{ExtractError, MergeError, RunError};
use crate::export::{ExportReport, Exporter};
use crate::gemini::{GeminiClient, ImageExtractor};
use crate::merge::{MergeReport, Merger};
use crate::record::ExtractionRecord;
use crate::response::parse_reply;

/// Why an image produced no workbook in a lenient run.
#[derive(Debug)]
pub struct SkippedImage {
    pub image: PathBuf,
    pub error: RunError,
}

/// One exported screenshot.
#[derive(Debug)]
pub struct ProcessedImage {
    pub report: ExportReport,
    /// The reply came from the response cache.
    pub cached: bool,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub images: usize,
    pub exported: Vec<ExportReport>,
    pub cache_hits: usize,
    pub skipped: Vec<SkippedImage>,
    pub merged: Vec<(Category, Result<Option<MergeReport>, MergeError>)>,
}

impl RunSummary {
    pub fn final_outputs(&self) -> Vec<&Path> {
        self.merged
            .iter()
            .filter_map(|(_, result)| result.as_ref().ok().and_then(|r| r.as_ref()))
            .map(|report| report.path.as_path())
            .collect()
    }
}

/// Builds the Gemini extractor described by `config`, wrapped in the
/// response cache when one is configured.
pub fn build_extractor(config: &Config) -> Result<Box<dyn ImageExtractor>, RunError> {
    let Some(api_key) = config.api_key.as_deref() else {
        return Err(RunError::Configuration(
            "GEMINI_API_KEY is not set (environment or .env)".to_string(),
        ));
    };
    let client = GeminiClient::new(api_key, &config.model, &config.prompt, config.pacing)
        .map_err(|err| RunError::Configuration(format!("failed to build http client: {err}")))?;
    log::info!("using model {}", client.model());

    let extractor: Box<dyn ImageExtractor> = match &config.cache_dir {
        Some(dir) => Box::new(CachedExtractor::new(
            Box::new(client),
            dir,
            &config.model,
            &config.prompt,
        )),
        None => Box::new(client),
    };
    Ok(extractor)
}

pub fn create_fresh_directory(path: &Path) -> Result<(), RunError> {
    let io_err = |source| RunError::Io {
        path: path.to_path_buf(),
        source,
    };
    if path.exists() {
        fs::remove_dir_all(path).map_err(io_err)?;
    }
    fs::create_dir_all(path).map_err(io_err)
}

/// Files in `dir` with extension `ext` (case-insensitive), in name order.
pub fn list_images(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, RunError> {
    let entries = fs::read_dir(dir).map_err(|source| RunError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut images: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        })
        .collect();
    images.sort();
    Ok(images)
}

/// Extracts, validates and exports one screenshot.
pub fn process_image(
    extractor: &mut dyn ImageExtractor,
    exporter: &Exporter,
    image: &Path,
    index: usize,
) -> Result<ProcessedImage, RunError> {
    log::info!("processing {}", image.display());
    let extraction = extractor.extract(image).map_err(|err| match err {
        ExtractError::ImageNotFound(path) => RunError::InputNotFound(path),
        source => RunError::Extraction {
            image: image.to_path_buf(),
            source,
        },
    })?;

    let reply = parse_reply(&extraction.text).map_err(|source| RunError::ResponseParse {
        image: image.to_path_buf(),
        raw: extraction.text.clone(),
        source,
    })?;
    let record = ExtractionRecord::from_reply(&reply).map_err(|source| RunError::Validation {
        image: image.to_path_buf(),
        source,
    })?;

    let report = exporter
        .export(&record, index)
        .map_err(|source| RunError::Export {
            image: image.to_path_buf(),
            source,
        })?;
    Ok(ProcessedImage {
        report,
        cached: extraction.cached,
    })
}

/// Refuses a scratch or output directory that is, or contains, the input
/// directory. Both are wiped at the start of a run.
pub fn check_directories(config: &Config) -> Result<(), RunError> {
    // Directories that do not exist yet cannot hold the input.
    let Ok(input) = fs::canonicalize(&config.input_dir) else {
        return Ok(());
    };
    for (name, dir) in [("TEMP_DIR", &config.temp_dir), ("OUTPUT_DIR", &config.output_dir)] {
        let Ok(dir) = fs::canonicalize(dir) else {
            continue;
        };
        if input.starts_with(&dir) {
            return Err(RunError::Configuration(format!(
                "{name} {} would wipe the input directory {}",
                dir.display(),
                input.display()
            )));
        }
    }
    Ok(())
}

/// Runs the whole batch: fresh output directories, one export per image, then
/// one merge per category.
///
/// Missing images, failed model calls and unparseable replies end the run.
/// Invalid records and failed exports skip the image unless `config.strict`.
pub fn run(config: &Config, extractor: &mut dyn ImageExtractor) -> Result<RunSummary, RunError> {
    check_directories(config)?;
    create_fresh_directory(&config.temp_dir)?;
    create_fresh_directory(&config.output_dir)?;

    let images = list_images(&config.input_dir, &config.image_extension)?;
    log::info!(
        "found {} .{} images in {}",
        images.len(),
        config.image_extension,
        config.input_dir.display()
    );

    let exporter = Exporter::new(&config.temp_dir);
    let mut summary = RunSummary {
        images: images.len(),
        ..RunSummary::default()
    };

    for (index, image) in images.iter().enumerate() {
        match process_image(extractor, &exporter, image, index) {
            Ok(processed) => {
                if processed.cached {
                    summary.cache_hits += 1;
                }
                summary.exported.push(processed.report);
            }
            Err(err @ (RunError::Validation { .. } | RunError::Export { .. })) if !config.strict => {
                log::error!("{err}");
                summary.skipped.push(SkippedImage {
                    image: image.clone(),
                    error: err,
                });
            }
            Err(err) => return Err(err),
        }
    }

    let merger = Merger::new(&config.temp_dir, &config.output_dir);
    summary.merged = merger.merge_all(&config.categories);
    Ok(summary)
}
