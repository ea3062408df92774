use crate::core::models::cell::Cell;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },
}

/// Settings for running a procedure against a fresh configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateConfig {
    pub configuration_name: String,
    pub seed: u64,
    pub processes: usize,
    /// Cell the configuration starts with before any node runs.
    pub initial_cell: Option<Cell>,
    /// Run even if the configuration is unchanged since the last successful run.
    pub force: bool,
}

#[derive(Default)]
pub struct GenerateConfigBuilder {
    configuration_name: Option<String>,
    seed: Option<u64>,
    processes: Option<usize>,
    initial_cell: Option<Cell>,
    force: bool,
}

impl GenerateConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configuration_name(mut self, name: &str) -> Self {
        self.configuration_name = Some(name.to_string());
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn processes(mut self, processes: usize) -> Self {
        self.processes = Some(processes);
        self
    }
    pub fn initial_cell(mut self, cell: Cell) -> Self {
        self.initial_cell = Some(cell);
        self
    }
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn build(self) -> Result<GenerateConfig, ConfigError> {
        let configuration_name = self
            .configuration_name
            .ok_or(ConfigError::MissingParameter("configuration_name"))?;
        if configuration_name.trim().is_empty() {
            return Err(ConfigError::InvalidParameter {
                name: "configuration_name",
                message: "must not be empty".to_string(),
            });
        }
        let processes = self.processes.unwrap_or(1);
        if processes == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "processes",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(GenerateConfig {
            configuration_name,
            seed: self.seed.ok_or(ConfigError::MissingParameter("seed"))?,
            processes,
            initial_cell: self.initial_cell,
            force: self.force,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_name_and_seed() {
        assert_eq!(
            GenerateConfigBuilder::new().seed(1).build().unwrap_err(),
            ConfigError::MissingParameter("configuration_name")
        );
        assert_eq!(
            GenerateConfigBuilder::new()
                .configuration_name("Bulk")
                .build()
                .unwrap_err(),
            ConfigError::MissingParameter("seed")
        );
    }

    #[test]
    fn builder_fills_defaults() {
        let config = GenerateConfigBuilder::new()
            .configuration_name("Bulk")
            .seed(42)
            .build()
            .unwrap();
        assert_eq!(config.processes, 1);
        assert!(config.initial_cell.is_none());
        assert!(!config.force);
    }

    #[test]
    fn zero_processes_is_rejected() {
        let err = GenerateConfigBuilder::new()
            .configuration_name("Bulk")
            .seed(42)
            .processes(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { name: "processes", .. }));
    }
}
