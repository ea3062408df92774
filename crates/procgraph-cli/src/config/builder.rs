use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::AppConfig;
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use procgraph::core::data::CoreData;
use procgraph::engine::config::GenerateConfigBuilder;
use std::path::Path;
use tracing::info;

pub fn build_config(args: &RunArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let core_data = build_core_data(&file_config)?;
    let run_file = file_config.run.take().unwrap_or_default();

    let seed = args.seed.or(run_file.seed).unwrap_or(defaults.seed);
    let processes = args
        .processes
        .or(run_file.processes)
        .unwrap_or(defaults.processes);
    let configuration_name = args
        .name
        .clone()
        .or(run_file.configuration_name)
        .unwrap_or(defaults.configuration_name);
    let force = run_file.force.unwrap_or(defaults.force);

    let mut builder = GenerateConfigBuilder::new()
        .configuration_name(&configuration_name)
        .seed(seed)
        .processes(processes)
        .force(force);
    if let Some(cell) = &run_file.cell {
        let cell = cell
            .to_cell()
            .map_err(|e| CliError::Config(format!("[run] cell: {}", e)))?;
        builder = builder.initial_cell(cell);
    }
    let generate = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AppConfig {
        procedure_path: args.procedure.clone(),
        core_data,
        generate,
    })
}

/// Species data from a run configuration file, or none without one.
pub fn load_core_data(config: Option<&Path>) -> Result<CoreData> {
    match config {
        Some(path) => build_core_data(&FileConfig::from_file(path)?),
        None => Ok(CoreData::new()),
    }
}

fn build_core_data(file_config: &FileConfig) -> Result<CoreData> {
    let mut data = CoreData::new();
    for entry in &file_config.species {
        let species = entry
            .to_species()
            .map_err(|e| CliError::Config(format!("species '{}': {}", entry.name, e)))?;
        data.add_species(species)
            .map_err(|e| CliError::Config(e.to_string()))?;
    }
    info!("Registered {} species.", data.n_species());
    Ok(data)
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let run = config.run.get_or_insert_with(Default::default);

        match key {
            "run.seed" => {
                run.seed = Some(value_str.parse().map_err(|_| {
                    CliError::Config(format!("Invalid integer value for {}: {}", key, value_str))
                })?);
            }
            "run.processes" => {
                run.processes = Some(value_str.parse().map_err(|_| {
                    CliError::Config(format!("Invalid integer value for {}: {}", key, value_str))
                })?);
            }
            "run.configuration-name" => {
                run.configuration_name = Some(value_str.to_string());
            }
            "run.force" => {
                run.force = Some(value_str.parse().map_err(|_| {
                    CliError::Config(format!("Invalid boolean value for {}: {}", key, value_str))
                })?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
