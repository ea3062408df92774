use super::{Keyword, KeywordInfo, KeywordScope, expect_args, kind_name};
use crate::core::data::CoreData;
use crate::core::models::ids::SpeciesId;
use crate::engine::error::{KeywordError, NodeError};
use toml::Value;

fn lookup(data: &CoreData, name: &str) -> Result<SpeciesId, NodeError> {
    data.find_species(name)
        .ok_or_else(|| NodeError::UnknownSpecies(name.to_string()))
}

/// A single species, stored by name and resolved against [`CoreData`] when a node runs.
#[derive(Debug, Clone)]
pub struct SpeciesKeyword {
    info: KeywordInfo,
    species: Option<String>,
}

impl SpeciesKeyword {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            info: KeywordInfo::new(name, description),
            species: None,
        }
    }

    pub fn get(&self) -> Option<&str> {
        self.species.as_deref()
    }

    pub fn set_by_name(&mut self, name: &str, scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        self.species = if name.is_empty() {
            None
        } else {
            Some(scope.find_species(name)?)
        };
        self.info.set = true;
        Ok(())
    }

    /// The species the keyword names, or `None` if it is unset.
    pub fn resolve(&self, data: &CoreData) -> Result<Option<SpeciesId>, NodeError> {
        self.species
            .as_deref()
            .map(|name| lookup(data, name))
            .transpose()
    }
}

impl Keyword for SpeciesKeyword {
    fn name(&self) -> &'static str {
        self.info.name
    }

    fn description(&self) -> &'static str {
        self.info.description
    }

    fn is_set(&self) -> bool {
        self.info.set
    }

    fn is_default(&self) -> bool {
        self.species.is_none()
    }

    fn serialise(&self, _scope: &dyn KeywordScope) -> Result<Option<Value>, KeywordError> {
        Ok(self.species.clone().map(Value::String))
    }

    fn deserialise(&mut self, value: &Value, scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        match value {
            Value::String(name) => self.set_by_name(name, scope),
            other => Err(KeywordError::WrongKind {
                expected: "a species name",
                found: kind_name(other),
            }),
        }
    }

    fn parse_args(&mut self, args: &[String], scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        expect_args(args, "1", |n| n == 1)?;
        self.set_by_name(&args[0], scope)
    }

    fn display_value(&self, _scope: &dyn KeywordScope) -> String {
        self.species.clone().unwrap_or_else(|| "<none>".to_string())
    }
}

/// An ordered list of distinct species names.
#[derive(Debug, Clone)]
pub struct SpeciesVectorKeyword {
    info: KeywordInfo,
    species: Vec<String>,
}

impl SpeciesVectorKeyword {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            info: KeywordInfo::new(name, description),
            species: Vec::new(),
        }
    }

    pub fn get(&self) -> &[String] {
        &self.species
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn set_by_names<S: AsRef<str>>(
        &mut self,
        names: &[S],
        scope: &dyn KeywordScope,
    ) -> Result<(), KeywordError> {
        let mut resolved: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let found = scope.find_species(name.as_ref())?;
            if resolved.iter().any(|s| s.eq_ignore_ascii_case(&found)) {
                return Err(KeywordError::DuplicateEntry(name.as_ref().to_string()));
            }
            resolved.push(found);
        }
        self.species = resolved;
        self.info.set = true;
        Ok(())
    }

    pub fn resolve(&self, data: &CoreData) -> Result<Vec<SpeciesId>, NodeError> {
        self.species.iter().map(|name| lookup(data, name)).collect()
    }
}

impl Keyword for SpeciesVectorKeyword {
    fn name(&self) -> &'static str {
        self.info.name
    }

    fn description(&self) -> &'static str {
        self.info.description
    }

    fn is_set(&self) -> bool {
        self.info.set
    }

    fn is_default(&self) -> bool {
        self.species.is_empty()
    }

    fn serialise(&self, _scope: &dyn KeywordScope) -> Result<Option<Value>, KeywordError> {
        Ok(self.info.set.then(|| {
            Value::Array(self.species.iter().cloned().map(Value::String).collect())
        }))
    }

    fn deserialise(&mut self, value: &Value, scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        match value {
            Value::String(name) => self.set_by_names(&[name.as_str()], scope),
            Value::Array(items) => {
                let names = items
                    .iter()
                    .map(|item| {
                        item.as_str().ok_or_else(|| KeywordError::WrongKind {
                            expected: "a species name",
                            found: kind_name(item),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                self.set_by_names(names.as_slice(), scope)
            }
            other => Err(KeywordError::WrongKind {
                expected: "a list of species names",
                found: kind_name(other),
            }),
        }
    }

    fn parse_args(&mut self, args: &[String], scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        self.set_by_names(args, scope)
    }

    fn display_value(&self, _scope: &dyn KeywordScope) -> String {
        self.species.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::species::{Species, SpeciesAtom};
    use crate::engine::keywords::testing::FixedScope;
    use nalgebra::Point3;

    fn scope() -> FixedScope {
        FixedScope {
            species: Some(vec!["Water".to_string(), "Argon".to_string()]),
            ..Default::default()
        }
    }

    #[test]
    fn names_take_the_registered_spelling() {
        let scope = scope();
        let mut kw = SpeciesKeyword::new("Species", "");
        kw.deserialise(&Value::String("water".into()), &scope).unwrap();
        assert_eq!(kw.get(), Some("Water"));
        assert!(matches!(
            kw.set_by_name("Methane", &scope),
            Err(KeywordError::UnknownSpecies(_))
        ));
        assert_eq!(kw.get(), Some("Water"));
    }

    #[test]
    fn resolution_happens_against_core_data() {
        let mut data = CoreData::new();
        let water = data
            .add_species(Species::new("Water").with_atom(SpeciesAtom::new(
                "O",
                16.0,
                Point3::origin(),
            )))
            .unwrap();

        let scope = FixedScope::default();
        let mut kw = SpeciesVectorKeyword::new("Species", "");
        kw.parse_args(&["Water".into(), "Argon".into()], &scope).unwrap();
        assert_eq!(
            kw.resolve(&data).unwrap_err(),
            NodeError::UnknownSpecies("Argon".into())
        );
        kw.parse_args(&["Water".into()], &scope).unwrap();
        assert_eq!(kw.resolve(&data).unwrap(), vec![water]);
    }

    #[test]
    fn vector_rejects_repeats() {
        let scope = scope();
        let mut kw = SpeciesVectorKeyword::new("Species", "");
        let value = Value::Array(vec!["Water".into(), "WATER".into()]);
        assert!(matches!(
            kw.deserialise(&value, &scope),
            Err(KeywordError::DuplicateEntry(_))
        ));
        assert!(!kw.is_set());
    }
}
