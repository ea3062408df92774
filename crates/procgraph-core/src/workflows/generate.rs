use crate::core::data::CoreData;
use crate::core::io::DocumentError;
use crate::core::models::configuration::Configuration;
use crate::core::pool::ProcessPool;
use crate::engine::config::GenerateConfig;
use crate::engine::context::ProcedureContext;
use crate::engine::error::ProcedureError;
use crate::engine::node::NodeContext;
use crate::engine::procedure::Procedure;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::registry::NodeRegistry;
use crate::engine::sequence::ScopeViolation;
use std::path::Path;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Procedure(#[from] ProcedureError),
    #[error("Procedure failed its scope check: {}", summarise(.0))]
    Violations(Vec<ScopeViolation>),
}

fn summarise(violations: &[ScopeViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// The state of the configuration after a generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateSummary {
    /// Whether the procedure actually ran; `false` if the configuration was unchanged.
    pub executed: bool,
    pub n_molecules: usize,
    pub n_atoms: usize,
    pub volume: f64,
    pub atomic_density: f64,
    pub chemical_density: f64,
    pub temperature: f64,
    pub n_global_potentials: usize,
    pub n_restraints: usize,
}

impl GenerateSummary {
    fn of(configuration: &Configuration, executed: bool) -> Self {
        Self {
            executed,
            n_molecules: configuration.n_molecules(),
            n_atoms: configuration.n_atoms(),
            volume: configuration.cell().volume(),
            atomic_density: configuration.atomic_density(),
            chemical_density: configuration.chemical_density(),
            temperature: configuration.temperature(),
            n_global_potentials: configuration.global_potentials().len(),
            n_restraints: configuration.restraints().len(),
        }
    }
}

/// Loads a generation procedure and refuses it if its scope check reports anything.
///
/// Species names are checked against `core_data` while the document is read.
#[instrument(skip_all, name = "generate_load", fields(path = %path.display()))]
pub fn load_procedure(
    path: &Path,
    registry: &NodeRegistry,
    core_data: &CoreData,
) -> Result<Procedure, GenerateError> {
    let procedure = Procedure::load(path, registry, Some(core_data), NodeContext::Generation)?;
    check_procedure(&procedure)?;
    Ok(procedure)
}

/// Turns the violations reported by [`Procedure::check`] into an error.
pub fn check_procedure(procedure: &Procedure) -> Result<(), GenerateError> {
    let violations = procedure.check();
    if violations.is_empty() {
        return Ok(());
    }
    for violation in &violations {
        warn!("{}", violation);
    }
    Err(GenerateError::Violations(violations))
}

/// An empty configuration set up from the run settings.
pub fn new_configuration(config: &GenerateConfig) -> Configuration {
    let mut configuration = Configuration::new(&config.configuration_name);
    if let Some(cell) = &config.initial_cell {
        configuration.set_cell(cell.clone());
    }
    configuration
}

/// Runs `procedure` against `configuration`.
///
/// Unless `config.force` is set, the run is skipped when the configuration has not
/// changed since this procedure last ran on it successfully.
#[instrument(skip_all, name = "generate_workflow", fields(configuration = %configuration.name()))]
pub fn run(
    procedure: &mut Procedure,
    configuration: &mut Configuration,
    core_data: &CoreData,
    config: &GenerateConfig,
    reporter: &ProgressReporter,
) -> Result<GenerateSummary, GenerateError> {
    check_procedure(procedure)?;

    let pool = ProcessPool::new(config.processes, config.seed);
    info!(
        seed = config.seed,
        processes = config.processes,
        force = config.force,
        "Starting generation run."
    );

    let executed = {
        let mut ctx = ProcedureContext::new(configuration, core_data, &pool).with_reporter(reporter);
        if config.force {
            procedure.invalidate_cache();
        }
        procedure.execute_if_changed(&mut ctx)?
    };
    if !executed {
        reporter.report(Progress::Message(
            "Configuration is up to date; nothing to do.".to_string(),
        ));
    }

    let summary = GenerateSummary::of(configuration, executed);
    info!(
        executed,
        molecules = summary.n_molecules,
        atoms = summary.n_atoms,
        "Generation workflow complete."
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::cell::Cell;
    use crate::core::models::species::{Species, SpeciesAtom};
    use crate::engine::config::GenerateConfigBuilder;
    use nalgebra::Point3;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PROCEDURE: &str = r#"
version = "1.0.0"

[procedure.Gas]
type = "Add"
Species = "Ar"
Population = 20
Density = 0.01
"#;

    fn argon() -> CoreData {
        let mut data = CoreData::new();
        data.add_species(
            Species::new("Ar").with_atom(SpeciesAtom::new("Ar", 39.948, Point3::origin())),
        )
        .unwrap();
        data
    }

    fn write_procedure(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    fn config(force: bool) -> GenerateConfig {
        GenerateConfigBuilder::new()
            .configuration_name("Gas")
            .seed(7)
            .force(force)
            .build()
            .unwrap()
    }

    #[test]
    fn second_run_on_an_unchanged_configuration_is_skipped() {
        let data = argon();
        let file = write_procedure(PROCEDURE);
        let mut procedure = load_procedure(file.path(), &NodeRegistry::with_defaults(), &data).unwrap();
        let config = config(false);
        let mut configuration = new_configuration(&config);

        let first = run(&mut procedure, &mut configuration, &data, &config, &ProgressReporter::new()).unwrap();
        assert!(first.executed);
        assert_eq!(first.n_molecules, 20);

        let second = run(&mut procedure, &mut configuration, &data, &config, &ProgressReporter::new()).unwrap();
        assert!(!second.executed);
        assert_eq!(second.n_molecules, 20);
    }

    #[test]
    fn forced_runs_always_execute() {
        let data = argon();
        let file = write_procedure(PROCEDURE);
        let mut procedure = load_procedure(file.path(), &NodeRegistry::with_defaults(), &data).unwrap();
        let config = config(true);
        let mut configuration = new_configuration(&config);

        run(&mut procedure, &mut configuration, &data, &config, &ProgressReporter::new()).unwrap();
        let again = run(&mut procedure, &mut configuration, &data, &config, &ProgressReporter::new()).unwrap();
        assert!(again.executed);
        assert_eq!(again.n_molecules, 40);
    }

    #[test]
    fn initial_cell_is_applied() {
        let config = GenerateConfigBuilder::new()
            .configuration_name("Boxed")
            .seed(1)
            .initial_cell(Cell::cubic(12.0).unwrap())
            .build()
            .unwrap();
        let configuration = new_configuration(&config);
        assert!((configuration.cell().volume() - 1728.0).abs() < 1.0e-9);
    }

    #[test]
    fn unknown_species_are_rejected_while_loading() {
        let file = write_procedure(PROCEDURE);
        let err = load_procedure(file.path(), &NodeRegistry::with_defaults(), &CoreData::new())
            .unwrap_err();
        assert!(matches!(err, GenerateError::Document(DocumentError::Keyword { .. })));
    }
}
