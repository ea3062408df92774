use super::error::DocumentError;
use super::upgrade;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use toml::{Table, Value};
use tracing::{debug, instrument};

/// `major.minor.patch` version stamped into every procedure document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DocumentVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl DocumentVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

/// The version written by this library.
pub const CURRENT_VERSION: DocumentVersion = DocumentVersion::new(1, 0, 0);

impl fmt::Display for DocumentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for DocumentVersion {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DocumentError::InvalidVersion(s.to_string());
        let parts = s
            .trim()
            .split('.')
            .map(|p| p.parse::<u32>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;
        match parts.as_slice() {
            [major, minor, patch] => Ok(Self::new(*major, *minor, *patch)),
            _ => Err(invalid()),
        }
    }
}

/// A parsed procedure document, already upgraded to [`CURRENT_VERSION`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureDocument {
    /// The version the document was written with, before any upgrade.
    pub original_version: DocumentVersion,
    /// Number of upgrade steps that were applied while reading.
    pub upgrades_applied: usize,
    /// The keyed node table: `{ <nodeName> = { type = <tag>, ... } }`.
    pub procedure: Table,
}

impl ProcedureDocument {
    /// Parses a TOML procedure document from a string.
    ///
    /// # Arguments
    ///
    /// * `text` - The document text.
    /// * `origin` - A label for error messages (usually the file path).
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentError`] if the text is not valid TOML, the version string is
    /// malformed or newer than [`CURRENT_VERSION`], or the procedure section is not a table.
    pub fn parse(text: &str, origin: &str) -> Result<Self, DocumentError> {
        let mut root: Table = toml::from_str(text).map_err(|e| DocumentError::Toml {
            path: origin.to_string(),
            source: e,
        })?;

        let original_version = match root.get("version") {
            None => DocumentVersion::default(),
            Some(Value::String(s)) => s.parse()?,
            Some(other) => return Err(DocumentError::InvalidVersion(other.to_string())),
        };
        if original_version > CURRENT_VERSION {
            return Err(DocumentError::UnsupportedVersion {
                found: original_version.to_string(),
                supported: CURRENT_VERSION.to_string(),
            });
        }

        let upgrades_applied = upgrade::upgrade(&mut root, original_version)?;
        if upgrades_applied > 0 {
            debug!(
                from = %original_version,
                steps = upgrades_applied,
                "Upgraded procedure document."
            );
        }

        let procedure = match root.remove("procedure") {
            None => Table::new(),
            Some(Value::Table(table)) => table,
            Some(_) => {
                return Err(DocumentError::Structure {
                    path: "procedure".to_string(),
                    message: "expected a table of named nodes".to_string(),
                });
            }
        };

        Ok(Self {
            original_version,
            upgrades_applied,
            procedure,
        })
    }

    /// Reads and parses a procedure document from disk.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn read(path: &Path) -> Result<Self, DocumentError> {
        let text = std::fs::read_to_string(path).map_err(|e| DocumentError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::parse(&text, &path.to_string_lossy())
    }

    pub fn new(procedure: Table) -> Self {
        Self {
            original_version: CURRENT_VERSION,
            upgrades_applied: 0,
            procedure,
        }
    }

    /// Renders the document at [`CURRENT_VERSION`].
    pub fn to_toml_string(&self) -> Result<String, DocumentError> {
        let mut root = Table::new();
        root.insert(
            "version".to_string(),
            Value::String(CURRENT_VERSION.to_string()),
        );
        root.insert(
            "procedure".to_string(),
            Value::Table(self.procedure.clone()),
        );
        Ok(toml::to_string(&root)?)
    }

    pub fn write(&self, path: &Path) -> Result<(), DocumentError> {
        let text = self.to_toml_string()?;
        std::fs::write(path, text).map_err(|e| DocumentError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }
}

/// Whether `text` looks like the legacy block format rather than TOML.
///
/// The legacy format opens with a bare `Procedure` line, which is never valid TOML.
pub fn is_legacy(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .and_then(|line| line.split_whitespace().next())
        .is_some_and(|word| word.eq_ignore_ascii_case("Procedure"))
}
