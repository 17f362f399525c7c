use anyhow::{Context, Result};

use fc_screen_stats::category::Category;
use fc_screen_stats::config::Config;
use fc_screen_stats::merge::Merger;

// Re-runs the merge step over an existing scratch directory without calling
// the model again.
fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = Config::from_env();
    let rest = config.apply_args(std::env::args().skip(1));
    let categories = if rest.is_empty() {
        config.categories.clone()
    } else {
        rest.iter().map(|label| Category::from_label(label)).collect()
    };

    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("create {}", config.output_dir.display()))?;
    let merger = Merger::new(&config.temp_dir, &config.output_dir);

    let mut failures = 0usize;
    for (category, result) in merger.merge_all(&categories) {
        match result {
            Ok(Some(report)) => {
                println!(
                    "{category}: {} inputs, {} stats -> {}",
                    report.inputs,
                    report.merged_rows,
                    report.path.display()
                );
                for skipped in &report.skipped {
                    println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
                }
            }
            Ok(None) => println!("{category}: no workbooks"),
            Err(err) => {
                failures += 1;
                println!("{category}: {err}");
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} categories failed to merge");
    }
    Ok(())
}
