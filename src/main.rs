use std::env;
use anyhow::{Context, Result};
use chrono::Utc;
use log::{error, info};
use crate::config::load_config;
use crate::initialization::init;
use crate::logging::setup_logger;
use crate::pipeline::score_location;
use crate::report::save_report;

mod config;
mod errors;
mod initialization;
mod logging;
mod manager_elevation;
mod manager_forecast;
mod models;
mod pipeline;
mod rate_limit;
mod report;
mod terrain;
mod thermal;

fn main() -> Result<()> {
    let config_path = env::args().nth(1)
        .or_else(|| env::var("CONFIG_PATH").ok())
        .context("no config file given, pass it as first argument or set CONFIG_PATH")?;

    let config = load_config(&config_path)
        .with_context(|| format!("loading config from {}", config_path))?;
    setup_logger(&config.general).context("setting up logging")?;

    info!("thermalcast version: {}", env!("CARGO_PKG_VERSION"));

    let mut mgr = init(&config);
    let report = match score_location(&config, &mut mgr.forecast, &mut mgr.terrain, &mut mgr.cache, Utc::now().date_naive()) {
        Ok(report) => report,
        Err(e) => {
            error!("no scores produced: {}", e);
            return Err(e.into());
        }
    };

    if let Some(best) = report.best() {
        info!("best hour {} with score {:.2} (w* {:.2} m/s)", best.time, best.score, best.wstar);
    }

    save_report(&config.files.output, &report)
        .with_context(|| format!("saving report to {}", config.files.output))?;
    info!("report saved to {}", config.files.output);

    Ok(())
}
