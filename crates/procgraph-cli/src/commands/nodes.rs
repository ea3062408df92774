use crate::cli::NodesArgs;
use crate::error::{CliError, Result};
use procgraph::engine::registry::NodeRegistry;

pub fn run(args: NodesArgs) -> Result<()> {
    let registry = NodeRegistry::with_defaults();
    let categories = registry.categories();
    let selected: Vec<_> = categories
        .iter()
        .filter(|(category, _)| {
            args.category
                .as_deref()
                .is_none_or(|wanted| category.eq_ignore_ascii_case(wanted))
        })
        .collect();
    if selected.is_empty() {
        return Err(CliError::Argument(format!(
            "Unknown node category '{}'",
            args.category.unwrap_or_default()
        )));
    }

    for (category, members) in selected {
        println!("{}:", category);
        for (tag, description) in members {
            println!("  {:<28} {}", tag, description);
        }
    }
    Ok(())
}
