//! Conversion between a [`Procedure`] and its persisted forms.
//!
//! Only explicitly set keywords are written. Nodes are keyed by name in execution order,
//! and a branch is written as a nested table under its block keyword.

use super::error::ProcedureError;
use super::graph::{NodeId, SequenceId};
use super::node::NodeContext;
use super::procedure::Procedure;
use super::registry::NodeRegistry;
use super::sequence::Scope;
use crate::core::data::CoreData;
use crate::core::io::document::is_legacy;
use crate::core::io::legacy::{LegacyNode, parse_legacy};
use crate::core::io::{DocumentError, ProcedureDocument};
use std::path::Path;
use toml::{Table, Value};
use tracing::{debug, info, instrument};

const TYPE_KEY: &str = "type";

fn procedure_error(path: &str, error: ProcedureError) -> DocumentError {
    match error {
        ProcedureError::Keyword {
            keyword, source, ..
        } => DocumentError::Keyword {
            path: path.to_string(),
            keyword,
            source: Box::new(source),
        },
        other => DocumentError::Procedure {
            path: path.to_string(),
            source: Box::new(other),
        },
    }
}

impl Procedure {
    /// Builds the keyed document form of the procedure.
    pub fn to_document(&self) -> Result<ProcedureDocument, DocumentError> {
        Ok(ProcedureDocument::new(
            self.sequence_table(self.root(), "procedure")?,
        ))
    }

    fn sequence_table(&self, seq: SequenceId, path: &str) -> Result<Table, DocumentError> {
        let mut table = Table::new();
        for &id in self.sequence(seq) {
            let name = self.name(id).unwrap_or_default().to_string();
            let node_path = format!("{}.{}", path, name);
            table.insert(name, Value::Table(self.node_table(id, &node_path)?));
        }
        Ok(table)
    }

    fn node_table(&self, id: NodeId, path: &str) -> Result<Table, DocumentError> {
        let mut table = Table::new();
        if let Some(node_type) = self.node_type(id) {
            table.insert(TYPE_KEY.to_string(), Value::String(node_type.tag().to_string()));
        }
        let scope = Scope::of_node(&self.graph, id, None);
        if let Some(body) = self.node(id) {
            for kw in body.keywords() {
                let value = kw.serialise(&scope).map_err(|e| DocumentError::Keyword {
                    path: path.to_string(),
                    keyword: kw.name().to_string(),
                    source: Box::new(e),
                })?;
                if let Some(value) = value {
                    table.insert(kw.name().to_string(), value);
                }
            }
        }
        if let Some(branch) = self.branch_of(id) {
            let keyword = self.graph.sequences[branch].block_keyword;
            let branch_path = format!("{}.{}", path, keyword);
            table.insert(
                keyword.to_string(),
                Value::Table(self.sequence_table(branch, &branch_path)?),
            );
        }
        Ok(table)
    }

    /// Builds a procedure from a parsed document.
    ///
    /// With `core_data`, species names are checked while reading. Without it they are
    /// taken as written and resolved when the procedure runs.
    ///
    /// # Errors
    ///
    /// Any structural problem, unknown node type or rejected keyword value is reported
    /// with the dotted path of the offending node.
    pub fn from_document(
        document: &ProcedureDocument,
        registry: &NodeRegistry,
        core_data: Option<&CoreData>,
        context: NodeContext,
    ) -> Result<Self, DocumentError> {
        let mut procedure = Procedure::new(context);
        let root = procedure.root();
        procedure.read_sequence(&document.procedure, root, "procedure", registry, core_data)?;
        debug!(nodes = procedure.n_nodes(), "Read procedure document.");
        Ok(procedure)
    }

    fn read_sequence(
        &mut self,
        table: &Table,
        seq: SequenceId,
        path: &str,
        registry: &NodeRegistry,
        core_data: Option<&CoreData>,
    ) -> Result<(), DocumentError> {
        for (name, value) in table {
            let node_path = format!("{}.{}", path, name);
            let Value::Table(node_table) = value else {
                return Err(DocumentError::Structure {
                    path: node_path,
                    message: "expected a node table".to_string(),
                });
            };
            let tag = match node_table.get(TYPE_KEY) {
                Some(Value::String(tag)) => tag,
                _ => {
                    return Err(DocumentError::Structure {
                        path: node_path,
                        message: "missing string field 'type'".to_string(),
                    });
                }
            };
            let registration = registry
                .registration(tag)
                .ok_or_else(|| DocumentError::UnknownNodeType {
                    path: node_path.clone(),
                    tag: tag.clone(),
                })?;
            let branch_keyword = registration.branch_keyword;

            let id = self
                .create_node(registry, tag, Some(name), seq, None)
                .map_err(|e| procedure_error(&node_path, e))?;

            for (key, value) in node_table {
                if key == TYPE_KEY || branch_keyword.is_some_and(|b| b.eq_ignore_ascii_case(key)) {
                    continue;
                }
                self.set_keyword(id, key, value, core_data)
                    .map_err(|e| procedure_error(&node_path, e))?;
            }

            if let (Some(keyword), Some(branch)) = (branch_keyword, self.branch_of(id)) {
                let entry = node_table
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(keyword));
                match entry {
                    None => {}
                    Some((_, Value::Table(children))) => {
                        let branch_path = format!("{}.{}", node_path, keyword);
                        self.read_sequence(children, branch, &branch_path, registry, core_data)?;
                    }
                    Some(_) => {
                        return Err(DocumentError::Structure {
                            path: format!("{}.{}", node_path, keyword),
                            message: "expected a table of named nodes".to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Builds a procedure from the legacy block format.
    ///
    /// Errors carry the line number of the offending node or keyword.
    pub fn from_legacy(
        text: &str,
        registry: &NodeRegistry,
        core_data: Option<&CoreData>,
        context: NodeContext,
    ) -> Result<Self, DocumentError> {
        let nodes = parse_legacy(text, registry)?;
        let mut procedure = Procedure::new(context);
        let root = procedure.root();
        procedure.read_legacy_sequence(&nodes, root, registry, core_data)?;
        debug!(nodes = procedure.n_nodes(), "Read legacy procedure.");
        Ok(procedure)
    }

    fn read_legacy_sequence(
        &mut self,
        nodes: &[LegacyNode],
        seq: SequenceId,
        registry: &NodeRegistry,
        core_data: Option<&CoreData>,
    ) -> Result<(), DocumentError> {
        for node in nodes {
            let label = node.name.as_deref().unwrap_or(&node.tag);
            let id = self
                .create_node(registry, &node.tag, node.name.as_deref(), seq, None)
                .map_err(|e| procedure_error(label, e).at_line(node.line))?;
            for kw in &node.keywords {
                self.parse_keyword(id, &kw.name, &kw.args, core_data)
                    .map_err(|e| DocumentError::Legacy {
                        line: kw.line,
                        message: e.to_string(),
                    })?;
            }
            if !node.branch.is_empty() {
                let branch = self.branch_of(id).ok_or_else(|| DocumentError::Legacy {
                    line: node.line,
                    message: ProcedureError::NoBranch(label.to_string()).to_string(),
                })?;
                self.read_legacy_sequence(&node.branch, branch, registry, core_data)?;
            }
        }
        Ok(())
    }

    /// Reads a procedure file in either the TOML document or the legacy format.
    #[instrument(skip_all, name = "procedure_load", fields(path = %path.display()))]
    pub fn load(
        path: &Path,
        registry: &NodeRegistry,
        core_data: Option<&CoreData>,
        context: NodeContext,
    ) -> Result<Self, DocumentError> {
        let text = std::fs::read_to_string(path).map_err(|e| DocumentError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let procedure = if is_legacy(&text) {
            info!("Reading legacy procedure format.");
            Self::from_legacy(&text, registry, core_data, context)?
        } else {
            let document = ProcedureDocument::parse(&text, &path.to_string_lossy())?;
            if document.upgrades_applied > 0 {
                info!(
                    from = %document.original_version,
                    steps = document.upgrades_applied,
                    "Procedure document was upgraded while reading."
                );
            }
            Self::from_document(&document, registry, core_data, context)?
        };
        info!(nodes = procedure.n_nodes(), "Procedure loaded.");
        Ok(procedure)
    }

    /// Writes the procedure as a current-version TOML document.
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        self.to_document()?.write(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
version = "1.0.0"

[procedure.Params]
type = "Parameters"
Parameter = { n = 2 }

[procedure.Loop]
type = "Repeat"
Count = "n*2"

[procedure.Loop.ForEach.Size]
type = "SizeFactor"
SizeFactor = 1.5
"#;

    #[test]
    fn documents_round_trip() {
        let registry = NodeRegistry::with_defaults();
        let doc = ProcedureDocument::parse(DOCUMENT, "test").unwrap();
        let procedure =
            Procedure::from_document(&doc, &registry, None, NodeContext::Generation).unwrap();
        assert_eq!(procedure.n_nodes(), 3);

        let written = procedure.to_document().unwrap();
        assert_eq!(written.procedure, doc.procedure);
        let loop_table = written.procedure["Loop"].as_table().unwrap();
        assert_eq!(loop_table["Count"].as_str(), Some("n*2"));
    }

    #[test]
    fn unknown_types_report_their_path() {
        let registry = NodeRegistry::with_defaults();
        let doc = ProcedureDocument::parse(
            "[procedure.Outer]\ntype = \"Repeat\"\n[procedure.Outer.ForEach.X]\ntype = \"Teleport\"\n",
            "test",
        )
        .unwrap();
        let err = Procedure::from_document(&doc, &registry, None, NodeContext::Generation)
            .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::UnknownNodeType { ref path, ref tag }
                if path == "procedure.Outer.ForEach.X" && tag == "Teleport"
        ));
    }

    #[test]
    fn bad_keyword_values_name_the_keyword() {
        let registry = NodeRegistry::with_defaults();
        let doc = ProcedureDocument::parse(
            "[procedure.Heat]\ntype = \"Temperature\"\nTemperature = -5.0\n",
            "test",
        )
        .unwrap();
        let err = Procedure::from_document(&doc, &registry, None, NodeContext::Generation)
            .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Keyword { ref path, ref keyword, .. }
                if path == "procedure.Heat" && keyword == "Temperature"
        ));
    }

    #[test]
    fn legacy_errors_carry_keyword_lines() {
        let registry = NodeRegistry::with_defaults();
        let text = "Procedure\n  Temperature\n    Temperature -1\n  EndTemperature\nEndProcedure\n";
        let err = Procedure::from_legacy(text, &registry, None, NodeContext::Generation)
            .unwrap_err();
        assert!(matches!(err, DocumentError::Legacy { line: 3, .. }));
    }
}
