//! Calibration runner.
//!
//! Reads a JSON run spec from the path in `HYDROTUNE_CONFIG`, assembles the
//! agent and calibration target, and runs a DDS search to completion.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use ht_agent::{CommandAgent, JsonConfigWriter};
use ht_data::{read_series_csv, CsvOutputReader};
use ht_optimizer::{
    dds, Adjustable, CalibrationTarget, DdsConfig, ObjectiveDirection, SumSquaredError,
    DEFAULT_NEIGHBORHOOD_SIZE,
};
use ht_types::{CalibrationTable, Parameter};

#[derive(Debug, Deserialize)]
struct RunSpec {
    /// Calibration target identifier, used in checkpoint and archive names.
    id: String,
    /// Shell command that runs the model.
    command: String,
    /// Job working directory shared with the model.
    workdir: PathBuf,
    /// Target model section in the native config.
    model: String,
    parameters: Vec<Parameter>,
    /// The model's JSON configuration file.
    config_file: PathBuf,
    /// Observed series, `timestamp,value` CSV.
    observed_file: PathBuf,
    /// Where the model writes its simulated series.
    output_file: PathBuf,
    iterations: u32,
    #[serde(default)]
    start_iteration: u32,
    #[serde(default = "default_neighborhood_size")]
    neighborhood_size: f64,
    #[serde(default)]
    seed: u64,
    #[serde(default)]
    direction: ObjectiveDirection,
    #[serde(default)]
    log_file: Option<PathBuf>,
}

fn default_neighborhood_size() -> f64 {
    DEFAULT_NEIGHBORHOOD_SIZE
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let spec_path = std::env::var("HYDROTUNE_CONFIG")
        .context("HYDROTUNE_CONFIG must point to a run spec file")?;
    let spec: RunSpec = serde_json::from_str(&fs::read_to_string(&spec_path)?)
        .with_context(|| format!("cannot parse run spec {spec_path}"))?;

    // Re-validate deserialized parameters so bad bounds fail up front.
    let parameters = spec
        .parameters
        .iter()
        .map(|p| Parameter::new(p.name.clone(), p.min, p.max, p.init))
        .collect::<Result<Vec<_>, _>>()?;

    let observed = read_series_csv(&spec.observed_file)?;
    let table = CalibrationTable::new(&spec.model, &parameters)?;

    let writer = JsonConfigWriter::new(&spec.config_file);
    let mut agent = CommandAgent::new(&spec.command, &spec.workdir, Box::new(writer));
    if let Some(log_file) = &spec.log_file {
        agent = agent.with_log_file(log_file);
    }

    let mut target = CalibrationTarget::new(
        &spec.id,
        table,
        observed,
        Box::new(CsvOutputReader::new(&spec.output_file)),
        Box::new(SumSquaredError),
    )
    .with_direction(spec.direction);

    let config = DdsConfig::new(spec.iterations)
        .with_start_iteration(spec.start_iteration)
        .with_neighborhood_size(spec.neighborhood_size)
        .with_seed(spec.seed);

    let report = dds(&config, &mut target, &mut agent)?;

    match report.best_score {
        Some(score) => println!("best score: {score} (iteration {})", report.best_iteration),
        None => println!("no finite score was produced"),
    }
    for update in target.table().slice(report.best_iteration)? {
        println!("  {} = {}", update.name, update.value);
    }
    Ok(())
}
