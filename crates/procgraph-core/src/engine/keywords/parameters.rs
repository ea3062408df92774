use super::{Keyword, KeywordInfo, KeywordScope, expect_args, kind_name};
use crate::core::expression::{ExpressionValue, ExpressionVariable, find_variable};
use crate::engine::error::KeywordError;
use crate::engine::value::NodeValue;
use std::rc::Rc;
use toml::{Table, Value};

fn valid_parameter_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A set of named scalar parameters exposed to expressions later in scope.
///
/// Parameters are shared cells. Changing the value of an existing parameter updates the
/// cell in place, so every expression already compiled against it sees the new value.
#[derive(Debug, Clone)]
pub struct ParametersKeyword {
    info: KeywordInfo,
    parameters: Vec<Rc<ExpressionVariable>>,
}

impl ParametersKeyword {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            info: KeywordInfo::new(name, description),
            parameters: Vec::new(),
        }
    }

    pub fn get(&self) -> &[Rc<ExpressionVariable>] {
        &self.parameters
    }

    /// Defines `name`, or updates it if it already exists.
    ///
    /// `text` may be a literal or an expression over the parameters visible in `scope`;
    /// it is evaluated once, here.
    pub fn set_parameter(
        &mut self,
        name: &str,
        text: &str,
        scope: &dyn KeywordScope,
    ) -> Result<(), KeywordError> {
        let value = NodeValue::from_text(text, &scope.parameters())?.evaluate();
        self.set_value(name, value)
    }

    pub fn set_value(&mut self, name: &str, value: ExpressionValue) -> Result<(), KeywordError> {
        if !valid_parameter_name(name) {
            return Err(KeywordError::InvalidParameterName(name.to_string()));
        }
        match find_variable(&self.parameters, name) {
            Some(existing) => existing.set_value(value),
            None => self.parameters.push(ExpressionVariable::new(name, value)),
        }
        self.info.set = true;
        Ok(())
    }

    /// Removes `name`. Returns `false` if there was no such parameter.
    pub fn remove_parameter(&mut self, name: &str) -> bool {
        let before = self.parameters.len();
        self.parameters.retain(|p| !p.has_name(name));
        before != self.parameters.len()
    }

    fn value_of(entry: &Value, scope: &dyn KeywordScope) -> Result<ExpressionValue, KeywordError> {
        match entry {
            Value::Integer(i) => Ok(ExpressionValue::Integer(*i)),
            Value::Float(f) => Ok(ExpressionValue::Double(*f)),
            Value::String(text) => Ok(NodeValue::from_text(text, &scope.parameters())?.evaluate()),
            other => Err(KeywordError::WrongKind {
                expected: "a number or expression",
                found: kind_name(other),
            }),
        }
    }
}

impl Keyword for ParametersKeyword {
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
        self.parameters.is_empty()
    }

    fn serialise(&self, _scope: &dyn KeywordScope) -> Result<Option<Value>, KeywordError> {
        if !self.info.set {
            return Ok(None);
        }
        let table: Table = self
            .parameters
            .iter()
            .map(|p| {
                let value = match p.value() {
                    ExpressionValue::Integer(i) => Value::Integer(i),
                    ExpressionValue::Double(d) => Value::Float(d),
                };
                (p.name(), value)
            })
            .collect();
        Ok(Some(Value::Table(table)))
    }

    /// Replaces the whole set. Parameters that keep their name keep their cell.
    fn deserialise(&mut self, value: &Value, scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        let Value::Table(table) = value else {
            return Err(KeywordError::WrongKind {
                expected: "a table of parameters",
                found: kind_name(value),
            });
        };
        let mut updated = Vec::with_capacity(table.len());
        for (name, entry) in table {
            if !valid_parameter_name(name) {
                return Err(KeywordError::InvalidParameterName(name.clone()));
            }
            let value = Self::value_of(entry, scope)?;
            updated.push((name.as_str(), value));
        }

        let mut parameters = Vec::with_capacity(updated.len());
        for (name, value) in updated {
            let cell = match find_variable(&self.parameters, name) {
                Some(existing) => {
                    existing.set_value(value);
                    existing
                }
                None => ExpressionVariable::new(name, value),
            };
            parameters.push(cell);
        }
        self.parameters = parameters;
        self.info.set = true;
        Ok(())
    }

    /// Legacy lines carry one parameter each and accumulate.
    fn parse_args(&mut self, args: &[String], scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        expect_args(args, "2", |n| n == 2)?;
        self.set_parameter(&args[0], &args[1], scope)
    }

    fn display_value(&self, _scope: &dyn KeywordScope) -> String {
        self.parameters
            .iter()
            .map(|p| format!("{}={}", p.name(), p.value()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expression::Expression;
    use crate::engine::keywords::testing::FixedScope;

    #[test]
    fn updating_a_parameter_keeps_its_cell() {
        let scope = FixedScope::default();
        let mut kw = ParametersKeyword::new("Parameter", "");
        kw.set_parameter("rho", "0.1", &scope).unwrap();
        let expr = Expression::compile("rho*2", kw.get()).unwrap();
        assert!((expr.evaluate().as_double() - 0.2).abs() < 1e-12);

        kw.set_parameter("RHO", "0.2", &scope).unwrap();
        assert_eq!(kw.get().len(), 1);
        assert!((expr.evaluate().as_double() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn legacy_lines_accumulate() {
        let scope = FixedScope::default();
        let mut kw = ParametersKeyword::new("Parameter", "");
        kw.parse_args(&["a".into(), "3".into()], &scope).unwrap();
        kw.parse_args(&["b".into(), "1.5".into()], &scope).unwrap();
        let table = kw.serialise(&scope).unwrap().unwrap();
        let table = table.as_table().unwrap();
        assert_eq!(table["a"], Value::Integer(3));
        assert_eq!(table["b"], Value::Float(1.5));
    }

    #[test]
    fn names_must_be_plain_identifiers() {
        let scope = FixedScope::default();
        let mut kw = ParametersKeyword::new("Parameter", "");
        for bad in ["1x", "a.b", "", "x y"] {
            assert!(matches!(
                kw.set_parameter(bad, "1", &scope),
                Err(KeywordError::InvalidParameterName(_))
            ));
        }
        assert!(!kw.is_set());
    }

    #[test]
    fn expression_values_are_evaluated_once() {
        let scope = FixedScope {
            params: vec![ExpressionVariable::new("n", ExpressionValue::Integer(4))],
            ..Default::default()
        };
        let mut kw = ParametersKeyword::new("Parameter", "");
        let mut table = Table::new();
        table.insert("twice".into(), Value::String("n*2".into()));
        kw.deserialise(&Value::Table(table), &scope).unwrap();
        assert_eq!(kw.get()[0].value(), ExpressionValue::Integer(8));
        scope.params[0].set_value(5_i64);
        assert_eq!(kw.get()[0].value(), ExpressionValue::Integer(8));
    }
}
