use crate::cli::CheckArgs;
use crate::config::builder::load_core_data;
use crate::error::{CliError, Result};
use procgraph::engine::procedure::Procedure;
use procgraph::engine::registry::NodeRegistry;
use tracing::info;

pub fn run(args: CheckArgs) -> Result<()> {
    let core_data = load_core_data(args.config.as_deref())?;
    let species = (core_data.n_species() > 0).then_some(&core_data);
    let registry = NodeRegistry::with_defaults();

    let procedure = Procedure::load(&args.procedure, &registry, species, args.context.into())?;
    info!("Checking {} node(s).", procedure.n_nodes());

    let violations = procedure.check();
    if violations.is_empty() {
        println!(
            "✓ {}: {} node(s), no problems found.",
            args.procedure.display(),
            procedure.n_nodes()
        );
        return Ok(());
    }
    for violation in &violations {
        println!("  {}", violation);
    }
    Err(CliError::Violations(violations.len()))
}
