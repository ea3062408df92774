//! Upgrades applied to documents written by older versions.
//!
//! Each entry brings a document up to the version it is keyed by. Entries run in order,
//! and only those newer than the version the document was written with are applied.

use super::document::{CURRENT_VERSION, DocumentVersion};
use super::error::DocumentError;
use std::collections::HashSet;
use toml::{Table, Value};

pub type UpgradeFn = fn(&mut Table) -> Result<(), DocumentError>;

pub struct Upgrade {
    pub version: DocumentVersion,
    pub description: &'static str,
    pub apply: UpgradeFn,
}

pub const UPGRADES: &[Upgrade] = &[Upgrade {
    version: DocumentVersion::new(1, 0, 0),
    description: "convert node arrays into tables keyed by node name",
    apply: keyed_sequences,
}];

/// Applies every upgrade newer than `from` to the document root and stamps it with
/// [`CURRENT_VERSION`].
///
/// # Return
///
/// The number of upgrade steps applied.
pub fn upgrade(root: &mut Table, from: DocumentVersion) -> Result<usize, DocumentError> {
    let mut applied = 0;
    for step in UPGRADES.iter().filter(|u| u.version > from) {
        (step.apply)(root)?;
        applied += 1;
    }
    root.insert(
        "version".to_string(),
        Value::String(CURRENT_VERSION.to_string()),
    );
    Ok(applied)
}

fn keyed_sequences(root: &mut Table) -> Result<(), DocumentError> {
    let Some(Value::Array(_)) = root.get("procedure") else {
        return Ok(());
    };
    let mut taken = HashSet::new();
    if let Some(procedure) = root.get("procedure") {
        collect_explicit_names(procedure, &mut taken);
    }
    if let Some(Value::Array(nodes)) = root.remove("procedure") {
        let keyed = convert_sequence(nodes, "procedure", &mut taken)?;
        root.insert("procedure".to_string(), Value::Table(keyed));
    }
    Ok(())
}

fn is_node_array(value: &Value) -> bool {
    match value {
        Value::Array(items) => {
            !items.is_empty()
                && items
                    .iter()
                    .all(|i| i.as_table().is_some_and(|t| t.contains_key("type")))
        }
        _ => false,
    }
}

/// Block keywords in use while sequences were written as node arrays.
const ARRAY_BRANCH_KEYWORDS: &[&str] = &["ForEach"];

/// Whether `key` holds a branch, including a branch written as an empty array.
fn is_branch(key: &str, value: &Value) -> bool {
    match value {
        Value::Array(items) if items.is_empty() => ARRAY_BRANCH_KEYWORDS
            .iter()
            .any(|b| b.eq_ignore_ascii_case(key)),
        _ => is_node_array(value),
    }
}

fn collect_explicit_names(value: &Value, taken: &mut HashSet<String>) {
    let Value::Array(items) = value else {
        return;
    };
    for table in items.iter().filter_map(Value::as_table) {
        if let Some(name) = table.get("name").and_then(Value::as_str) {
            taken.insert(name.to_ascii_lowercase());
        }
        for child in table.values().filter(|v| is_node_array(v)) {
            collect_explicit_names(child, taken);
        }
    }
}

fn generate_name(tag: &str, taken: &mut HashSet<String>) -> String {
    let mut n = 1;
    loop {
        let candidate = format!("{}{:02}", tag, n);
        if taken.insert(candidate.to_ascii_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

fn convert_sequence(
    nodes: Vec<Value>,
    path: &str,
    taken: &mut HashSet<String>,
) -> Result<Table, DocumentError> {
    let mut keyed = Table::new();
    for (index, node) in nodes.into_iter().enumerate() {
        let Value::Table(mut table) = node else {
            return Err(DocumentError::Structure {
                path: format!("{}[{}]", path, index),
                message: "expected a node table".to_string(),
            });
        };
        let tag = table
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DocumentError::Structure {
                path: format!("{}[{}]", path, index),
                message: "node has no 'type'".to_string(),
            })?;
        let name = match table.remove("name") {
            Some(Value::String(name)) => name,
            Some(_) => {
                return Err(DocumentError::Structure {
                    path: format!("{}[{}]", path, index),
                    message: "'name' must be a string".to_string(),
                });
            }
            None => generate_name(&tag, taken),
        };
        let node_path = format!("{}.{}", path, name);

        let branch_keys: Vec<String> = table
            .iter()
            .filter(|(k, v)| is_branch(k, v))
            .map(|(k, _)| k.clone())
            .collect();
        for key in branch_keys {
            if let Some(Value::Array(children)) = table.remove(&key) {
                let converted = convert_sequence(children, &format!("{}.{}", node_path, key), taken)?;
                table.insert(key, Value::Table(converted));
            }
        }

        if keyed.contains_key(&name) {
            return Err(DocumentError::Structure {
                path: node_path,
                message: "duplicate node name".to_string(),
            });
        }
        keyed.insert(name, Value::Table(table));
    }
    Ok(keyed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_documents_become_keyed_tables() {
        let text = r#"
[[procedure]]
type = "Parameters"
name = "Params"
Parameter = { rho = 0.1 }

[[procedure]]
type = "Repeat"
Count = 2

[[procedure.ForEach]]
type = "Add"
Species = "Water"

[[procedure]]
type = "Add"
Species = "Argon"
"#;
        let mut root: Table = toml::from_str(text).unwrap();
        let applied = upgrade(&mut root, DocumentVersion::default()).unwrap();
        assert_eq!(applied, 1);
        assert_eq!(root["version"].as_str(), Some("1.0.0"));

        let procedure = root["procedure"].as_table().unwrap();
        let names: Vec<&str> = procedure.keys().map(String::as_str).collect();
        assert_eq!(names, ["Params", "Repeat01", "Add02"]);
        let repeat = procedure["Repeat01"].as_table().unwrap();
        let branch = repeat["ForEach"].as_table().unwrap();
        assert!(branch.contains_key("Add01"));
        assert!(!procedure["Params"].as_table().unwrap().contains_key("name"));
    }

    #[test]
    fn empty_branches_become_empty_tables() {
        let text = r#"
[[procedure]]
type = "Repeat"
name = "Loop"
Count = 2
ForEach = []

[[procedure]]
type = "Remove"
Species = []
"#;
        let mut root: Table = toml::from_str(text).unwrap();
        upgrade(&mut root, DocumentVersion::default()).unwrap();

        let procedure = root["procedure"].as_table().unwrap();
        let repeat = procedure["Loop"].as_table().unwrap();
        assert_eq!(repeat["ForEach"], Value::Table(Table::new()));
        let remove = procedure["Remove01"].as_table().unwrap();
        assert_eq!(remove["Species"], Value::Array(Vec::new()));
    }

    #[test]
    fn keyed_documents_are_left_alone() {
        let text = r#"
[procedure.Sel]
type = "Pick"
"#;
        let mut root: Table = toml::from_str(text).unwrap();
        let before = root["procedure"].clone();
        upgrade(&mut root, DocumentVersion::default()).unwrap();
        assert_eq!(root["procedure"], before);
    }

    #[test]
    fn current_documents_skip_every_step() {
        let mut root = Table::new();
        assert_eq!(upgrade(&mut root, CURRENT_VERSION).unwrap(), 0);
    }
}
