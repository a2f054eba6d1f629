use std::path::PathBuf;

use anyhow::Context;
use log::{error, info, LevelFilter};
use pneumonia_classifier::config::PipelineConfig;
use pneumonia_classifier::pipeline;
use pneumonia_classifier::session::Session;

#[cfg(debug_assertions)]
const LOG_LEVEL: LevelFilter = LevelFilter::Debug;
#[cfg(not(debug_assertions))]
const LOG_LEVEL: LevelFilter = LevelFilter::Info;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .filter_level(LOG_LEVEL)
        .parse_default_env()
        .init();

    // A single optional argument: a JSON file overriding any of the defaults.
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => {
            info!("Reading configuration from {:?}", path);
            PipelineConfig::from_json_file(&path)
                .with_context(|| format!("Failed to read configuration from {:?}", path))?
        },
        None => PipelineConfig::default(),
    };
    config.validate()?;
    info!("{:?}", config);

    let session = Session::builder()
        .app_name(&config.app_name)
        .num_threads(config.num_threads)
        .build()
        .context("Failed to start the session")?;

    let report = match pipeline::run(&session, &config) {
        Ok(report) => report,
        Err(e) => {
            error!("Pipeline failed: {}", e);
            return Err(e).context("Pipeline failed");
        }
    };

    info!(
        "{} records ({} unlabeled, {} undecodable), {} train / {} test, labels {:?}",
        report.record_count,
        report.unlabeled_count,
        report.degraded_count,
        report.train_count,
        report.test_count,
        report.labels);
    info!("Accuracy {} - model saved to {:?}", report.accuracy, report.model_path);

    session.stop();
    Ok(())
}
