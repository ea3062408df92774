use crate::cli::ConvertArgs;
use crate::error::Result;
use procgraph::core::io::CURRENT_VERSION;
use procgraph::engine::procedure::Procedure;
use procgraph::engine::registry::NodeRegistry;
use tracing::info;

pub fn run(args: ConvertArgs) -> Result<()> {
    let registry = NodeRegistry::with_defaults();
    let procedure = Procedure::load(&args.input, &registry, None, args.context.into())?;
    procedure.save(&args.output)?;
    info!(
        "Converted {:?} to {:?} at version {}.",
        &args.input, &args.output, CURRENT_VERSION
    );
    println!(
        "✓ Wrote {} node(s) to {} (version {}).",
        procedure.n_nodes(),
        args.output.display(),
        CURRENT_VERSION
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ContextArg;
    use procgraph::core::io::ProcedureDocument;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn legacy_files_are_rewritten_as_documents() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("old.txt");
        let output = dir.path().join("new.toml");
        fs::write(
            &input,
            "Procedure\n  Temperature 'Heat'\n    Temperature 320.0\n  EndTemperature\nEndProcedure\n",
        )
        .unwrap();

        run(ConvertArgs {
            input,
            output: output.clone(),
            context: ContextArg::Generation,
        })
        .unwrap();

        let document = ProcedureDocument::read(&output).unwrap();
        assert_eq!(document.original_version, CURRENT_VERSION);
        let heat = document.procedure["Heat"].as_table().unwrap();
        assert_eq!(heat["type"].as_str(), Some("Temperature"));
        assert_eq!(heat["Temperature"].as_float(), Some(320.0));
    }
}
