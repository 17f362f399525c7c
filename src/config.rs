use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::category::Category;
use crate::prompt::EXTRACTION_PROMPT;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_INPUT_DIR: &str = "Data";
pub const DEFAULT_TEMP_DIR: &str = "Data/Temp";
pub const DEFAULT_OUTPUT_DIR: &str = "Data/Final_Output";
pub const DEFAULT_IMAGE_EXTENSION: &str = "png";
const DEFAULT_PACING_SECS: u64 = 3;
const MAX_PACING_SECS: u64 = 60;
const CACHE_DIR: &str = "fc_screen_stats";

/// Run settings. `from_env` reads the environment (after `.env`) and falls
/// back to the defaults above.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub prompt: String,
    pub input_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
    pub image_extension: String,
    /// Sleep before each model call.
    pub pacing: Duration,
    /// Abort the run on an invalid record or failed export instead of
    /// skipping the image.
    pub strict: bool,
    pub categories: Vec<Category>,
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            prompt: EXTRACTION_PROMPT.to_string(),
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            image_extension: DEFAULT_IMAGE_EXTENSION.to_string(),
            pacing: Duration::from_secs(DEFAULT_PACING_SECS),
            strict: false,
            categories: Category::KNOWN.to_vec(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let model = env_string("GEMINI_MODEL").unwrap_or(defaults.model);
        let pacing_secs = env::var("PACING_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_PACING_SECS)
            .min(MAX_PACING_SECS);
        let image_extension = env_string("IMAGE_EXTENSION")
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .unwrap_or(defaults.image_extension);
        let cache_dir = if env_bool("RESPONSE_CACHE", true) {
            env_string("RESPONSE_CACHE_DIR")
                .map(PathBuf::from)
                .or(defaults.cache_dir)
        } else {
            None
        };

        Self {
            api_key,
            model,
            prompt: defaults.prompt,
            input_dir: env_path("INPUT_DIR").unwrap_or(defaults.input_dir),
            temp_dir: env_path("TEMP_DIR").unwrap_or(defaults.temp_dir),
            output_dir: env_path("OUTPUT_DIR").unwrap_or(defaults.output_dir),
            image_extension,
            pacing: Duration::from_secs(pacing_secs),
            strict: env_bool("STRICT", false),
            categories: defaults.categories,
            cache_dir,
        }
    }

    /// Applies the `--input`, `--temp`, `--output` and `--model` overrides
    /// (`--flag=value` or `--flag value`) plus the `--strict` and `--no-cache`
    /// switches. Unknown arguments are returned.
    pub fn apply_args<I>(&mut self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut unknown = Vec::new();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
                None => (arg.clone(), None),
            };
            if flag == "--strict" {
                self.strict = true;
                continue;
            }
            if flag == "--no-cache" {
                self.cache_dir = None;
                continue;
            }
            if !matches!(flag.as_str(), "--input" | "--temp" | "--output" | "--model") {
                unknown.push(arg);
                continue;
            }
            let Some(value) = inline.or_else(|| args.next()) else {
                unknown.push(arg);
                continue;
            };
            let value = value.trim().to_string();
            if value.is_empty() {
                continue;
            }
            match flag.as_str() {
                "--input" => self.input_dir = PathBuf::from(value),
                "--temp" => self.temp_dir = PathBuf::from(value),
                "--output" => self.output_dir = PathBuf::from(value),
                _ => self.model = value,
            }
        }
        unknown
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_path(name: &str) -> Option<PathBuf> {
    env_string(name).map(PathBuf::from)
}

fn env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(val) => matches!(
            val.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

fn default_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}
