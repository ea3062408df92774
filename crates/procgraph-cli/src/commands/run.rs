use crate::cli::RunArgs;
use crate::config::builder::build_config;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use procgraph::engine::progress::ProgressReporter;
use procgraph::engine::registry::NodeRegistry;
use procgraph::workflows::generate::{self, GenerateSummary};
use tracing::{debug, info};

pub fn run(args: RunArgs) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let app = build_config(&args)?;

    let registry = NodeRegistry::with_defaults();
    info!("Loading procedure from {:?}", &app.procedure_path);
    let mut procedure = generate::load_procedure(&app.procedure_path, &registry, &app.core_data)?;
    let mut configuration = generate::new_configuration(&app.generate);

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Running procedure '{}' ({} node(s)) on configuration '{}'...",
        app.procedure_path.display(),
        procedure.n_nodes(),
        configuration.name()
    );
    let summary = generate::run(
        &mut procedure,
        &mut configuration,
        &app.core_data,
        &app.generate,
        &reporter,
    )?;
    debug!(phases = ?progress_handler.completed_phases(), "Run phases completed.");

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &GenerateSummary) {
    if !summary.executed {
        println!("Configuration was already up to date.");
    }
    println!("✓ Configuration complete:");
    println!("  Molecules          {}", summary.n_molecules);
    println!("  Atoms              {}", summary.n_atoms);
    println!("  Volume             {:.4} A^3", summary.volume);
    println!("  Atomic density     {:.6} atoms/A^3", summary.atomic_density);
    println!("  Chemical density   {:.6} g/cm^3", summary.chemical_density);
    println!("  Temperature        {} K", summary.temperature);
    if summary.n_global_potentials > 0 {
        println!("  Global potentials  {}", summary.n_global_potentials);
    }
    if summary.n_restraints > 0 {
        println!("  Restraints         {}", summary.n_restraints);
    }
}
