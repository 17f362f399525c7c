use std::process::ExitCode;

use log::{error, info, warn};

use fc_screen_stats::config::Config;
use fc_screen_stats::pipeline;

fn main() -> ExitCode {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = Config::from_env();
    for arg in config.apply_args(std::env::args().skip(1)) {
        warn!("ignoring unknown argument {arg}");
    }

    let mut extractor = match pipeline::build_extractor(&config) {
        Ok(extractor) => extractor,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let summary = match pipeline::run(&config, extractor.as_mut()) {
        Ok(summary) => summary,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "exported {}/{} images ({} replies from cache)",
        summary.exported.len(),
        summary.images,
        summary.cache_hits
    );
    for skipped in &summary.skipped {
        warn!("skipped {}: {}", skipped.image.display(), skipped.error);
    }
    for path in summary.final_outputs() {
        info!("final workbook: {}", path.display());
    }
    ExitCode::SUCCESS
}
