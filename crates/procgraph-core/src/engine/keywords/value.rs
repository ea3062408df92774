use super::enumeration::EnumOption;
use super::{Keyword, KeywordInfo, KeywordScope, expect_args, kind_name};
use crate::core::expression::ExpressionVariable;
use crate::engine::error::KeywordError;
use crate::engine::value::NodeValue;
use std::rc::Rc;
use toml::Value;
use tracing::warn;

/// Lower bound checked against literal values when they are set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Minimum {
    Inclusive(f64),
    Exclusive(f64),
}

impl Minimum {
    fn check(&self, value: &NodeValue) -> Result<(), KeywordError> {
        let Some(literal) = value.literal() else {
            return Ok(());
        };
        let (ok, bound) = match *self {
            Minimum::Inclusive(b) => (literal >= b, b),
            Minimum::Exclusive(b) => (literal > b, b),
        };
        if ok {
            Ok(())
        } else {
            Err(KeywordError::BelowMinimum {
                value: value.to_string(),
                minimum: format!("{:?}", bound),
            })
        }
    }
}

fn value_from_toml(
    value: &Value,
    params: &[Rc<ExpressionVariable>],
) -> Result<NodeValue, KeywordError> {
    match value {
        Value::Integer(i) => Ok(NodeValue::Integer(*i)),
        Value::Float(f) => Ok(NodeValue::Double(*f)),
        Value::String(s) => Ok(NodeValue::from_text(s, params)?),
        other => Err(KeywordError::WrongKind {
            expected: "a number or expression",
            found: kind_name(other),
        }),
    }
}

fn rebind_check(value: &NodeValue, scope: &dyn KeywordScope) -> Option<String> {
    (!value.uses_only(&scope.parameters()))
        .then(|| format!("expression '{}' uses parameters that are not in scope", value))
}

/// Re-binds `value` to `params`. An expression whose parameters have left scope is
/// replaced by `default`.
fn repair(
    keyword: &str,
    value: &mut NodeValue,
    default: &NodeValue,
    params: &[Rc<ExpressionVariable>],
) -> bool {
    if value.uses_only(params) {
        return false;
    }
    if !value.rebind(params) {
        warn!(
            keyword,
            expression = %value,
            "Expression uses parameters that are no longer in scope. Reverting to the default."
        );
        *value = default.clone();
    }
    true
}

/// A single [`NodeValue`] setting.
#[derive(Debug, Clone)]
pub struct NodeValueKeyword {
    info: KeywordInfo,
    value: NodeValue,
    default: NodeValue,
    minimum: Option<Minimum>,
}

impl NodeValueKeyword {
    pub fn new(name: &'static str, description: &'static str, default: impl Into<NodeValue>) -> Self {
        let default = default.into();
        Self {
            info: KeywordInfo::new(name, description),
            value: default.clone(),
            default,
            minimum: None,
        }
    }

    pub fn with_minimum(mut self, minimum: Minimum) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn get(&self) -> &NodeValue {
        &self.value
    }

    /// Sets a new value, keeping the old one if the value violates the minimum.
    pub fn set(&mut self, value: NodeValue) -> Result<(), KeywordError> {
        if let Some(minimum) = &self.minimum {
            minimum.check(&value)?;
        }
        self.value = value;
        self.info.set = true;
        Ok(())
    }

    /// Parses and sets `text` against the parameters visible in `scope`.
    pub fn set_text(&mut self, text: &str, scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        let value = NodeValue::from_text(text, &scope.parameters())?;
        self.set(value)
    }
}

impl Keyword for NodeValueKeyword {
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
        self.value == self.default
    }

    fn serialise(&self, _scope: &dyn KeywordScope) -> Result<Option<Value>, KeywordError> {
        Ok(self.info.set.then(|| self.value.to_toml()))
    }

    fn deserialise(&mut self, value: &Value, scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        let parsed = value_from_toml(value, &scope.parameters())?;
        self.set(parsed)
    }

    fn parse_args(&mut self, args: &[String], scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        expect_args(args, "1", |n| n == 1)?;
        self.set_text(&args[0], scope)
    }

    fn validate(&mut self, scope: &dyn KeywordScope) -> bool {
        repair(self.info.name, &mut self.value, &self.default, &scope.parameters())
    }

    fn check(&self, scope: &dyn KeywordScope) -> Option<String> {
        rebind_check(&self.value, scope)
    }

    fn display_value(&self, _scope: &dyn KeywordScope) -> String {
        self.value.to_string()
    }
}

/// Three [`NodeValue`]s, used for vectors and triples of lengths or angles.
#[derive(Debug, Clone)]
pub struct Vec3NodeValueKeyword {
    info: KeywordInfo,
    values: [NodeValue; 3],
    default: [NodeValue; 3],
    minimum: Option<Minimum>,
}

impl Vec3NodeValueKeyword {
    pub fn new(name: &'static str, description: &'static str, default: [f64; 3]) -> Self {
        let default = default.map(NodeValue::Double);
        Self {
            info: KeywordInfo::new(name, description),
            values: default.clone(),
            default,
            minimum: None,
        }
    }

    pub fn with_minimum(mut self, minimum: Minimum) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn get(&self) -> &[NodeValue; 3] {
        &self.values
    }

    /// Evaluates all three components.
    pub fn as_vector(&self) -> nalgebra::Vector3<f64> {
        nalgebra::Vector3::new(
            self.values[0].as_double(),
            self.values[1].as_double(),
            self.values[2].as_double(),
        )
    }

    pub fn set(&mut self, values: [NodeValue; 3]) -> Result<(), KeywordError> {
        if let Some(minimum) = &self.minimum {
            for v in &values {
                minimum.check(v)?;
            }
        }
        self.values = values;
        self.info.set = true;
        Ok(())
    }

    fn set_from(&mut self, items: &[Value], params: &[Rc<ExpressionVariable>]) -> Result<(), KeywordError> {
        let [a, b, c] = items else {
            return Err(KeywordError::ArgumentCount {
                expected: "3",
                found: items.len(),
            });
        };
        let values = [
            value_from_toml(a, params)?,
            value_from_toml(b, params)?,
            value_from_toml(c, params)?,
        ];
        self.set(values)
    }
}

impl Keyword for Vec3NodeValueKeyword {
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
        self.values == self.default
    }

    fn serialise(&self, _scope: &dyn KeywordScope) -> Result<Option<Value>, KeywordError> {
        Ok(self
            .info
            .set
            .then(|| Value::Array(self.values.iter().map(NodeValue::to_toml).collect())))
    }

    fn deserialise(&mut self, value: &Value, scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        match value {
            Value::Array(items) => self.set_from(items, &scope.parameters()),
            other => Err(KeywordError::WrongKind {
                expected: "an array of three values",
                found: kind_name(other),
            }),
        }
    }

    fn parse_args(&mut self, args: &[String], scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        expect_args(args, "3", |n| n == 3)?;
        let items: Vec<Value> = args.iter().map(|a| Value::String(a.clone())).collect();
        self.set_from(&items, &scope.parameters())
    }

    fn validate(&mut self, scope: &dyn KeywordScope) -> bool {
        let params = scope.parameters();
        self.values
            .iter_mut()
            .zip(&self.default)
            .fold(false, |changed, (v, default)| {
                repair(self.info.name, v, default, &params) || changed
            })
    }

    fn check(&self, scope: &dyn KeywordScope) -> Option<String> {
        self.values.iter().find_map(|v| rebind_check(v, scope))
    }

    fn display_value(&self, _scope: &dyn KeywordScope) -> String {
        format!("{} {} {}", self.values[0], self.values[1], self.values[2])
    }
}

/// A [`NodeValue`] qualified by an option, such as a density and its units.
///
/// Persisted as `{ value = ..., units = "..." }`.
#[derive(Debug, Clone)]
pub struct NodeValueEnumKeyword<E: EnumOption> {
    info: KeywordInfo,
    value: NodeValue,
    option: E,
    default: (NodeValue, E),
    minimum: Option<Minimum>,
}

impl<E: EnumOption> NodeValueEnumKeyword<E> {
    pub fn new(
        name: &'static str,
        description: &'static str,
        default: impl Into<NodeValue>,
        option: E,
    ) -> Self {
        let value = default.into();
        Self {
            info: KeywordInfo::new(name, description),
            value: value.clone(),
            option,
            default: (value, option),
            minimum: None,
        }
    }

    pub fn with_minimum(mut self, minimum: Minimum) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn value(&self) -> &NodeValue {
        &self.value
    }

    pub fn option(&self) -> E {
        self.option
    }

    pub fn set(&mut self, value: NodeValue, option: E) -> Result<(), KeywordError> {
        if let Some(minimum) = &self.minimum {
            minimum.check(&value)?;
        }
        self.value = value;
        self.option = option;
        self.info.set = true;
        Ok(())
    }
}

impl<E: EnumOption> Keyword for NodeValueEnumKeyword<E> {
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
        self.value == self.default.0 && self.option == self.default.1
    }

    fn serialise(&self, _scope: &dyn KeywordScope) -> Result<Option<Value>, KeywordError> {
        if !self.info.set {
            return Ok(None);
        }
        let mut table = toml::Table::new();
        table.insert("value".to_string(), self.value.to_toml());
        table.insert(
            "units".to_string(),
            Value::String(self.option.option_name().to_string()),
        );
        Ok(Some(Value::Table(table)))
    }

    fn deserialise(&mut self, value: &Value, scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        let params = scope.parameters();
        match value {
            Value::Table(table) => {
                let raw = table.get("value").ok_or(KeywordError::WrongKind {
                    expected: "a table with a 'value' entry",
                    found: "table".to_string(),
                })?;
                let parsed = value_from_toml(raw, &params)?;
                let option = match table.get("units") {
                    None => self.option,
                    Some(Value::String(s)) => E::parse_option(s)?,
                    Some(other) => {
                        return Err(KeywordError::WrongKind {
                            expected: "an option name",
                            found: kind_name(other),
                        });
                    }
                };
                self.set(parsed, option)
            }
            other => {
                let parsed = value_from_toml(other, &params)?;
                self.set(parsed, self.option)
            }
        }
    }

    fn parse_args(&mut self, args: &[String], scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        expect_args(args, "1 or 2", |n| n == 1 || n == 2)?;
        let parsed = NodeValue::from_text(&args[0], &scope.parameters())?;
        let option = match args.get(1) {
            Some(text) => E::parse_option(text)?,
            None => self.option,
        };
        self.set(parsed, option)
    }

    fn validate(&mut self, scope: &dyn KeywordScope) -> bool {
        repair(self.info.name, &mut self.value, &self.default.0, &scope.parameters())
    }

    fn check(&self, scope: &dyn KeywordScope) -> Option<String> {
        rebind_check(&self.value, scope)
    }

    fn display_value(&self, _scope: &dyn KeywordScope) -> String {
        format!("{} {}", self.value, self.option.option_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expression::ExpressionValue;
    use crate::engine::keywords::testing::FixedScope;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Units {
        PerVolume,
        Mass,
    }

    impl EnumOption for Units {
        fn options() -> &'static [(&'static str, Self)] {
            &[("atoms/A3", Units::PerVolume), ("g/cm3", Units::Mass)]
        }
    }

    fn scope_with_rho() -> FixedScope {
        FixedScope {
            params: vec![ExpressionVariable::new("rho", ExpressionValue::Double(0.1))],
            ..Default::default()
        }
    }

    #[test]
    fn minimum_applies_to_literals_only() {
        let scope = scope_with_rho();
        let mut kw = NodeValueKeyword::new("Population", "", 1).with_minimum(Minimum::Inclusive(0.0));
        assert!(kw.set_text("-1", &scope).is_err());
        assert_eq!(kw.get(), &NodeValue::Integer(1));
        kw.set_text("rho-1", &scope).unwrap();
        assert!(kw.get().is_expression());
    }

    #[test]
    fn expressions_serialise_as_text() {
        let scope = scope_with_rho();
        let mut kw = NodeValueKeyword::new("Population", "", 1);
        kw.deserialise(&Value::String("50*2".into()), &scope).unwrap();
        assert_eq!(kw.get().as_integer(), 100);
        assert_eq!(kw.serialise(&scope).unwrap(), Some(Value::String("50*2".into())));
    }

    #[test]
    fn unknown_parameters_are_rejected_at_set_time() {
        let scope = FixedScope::default();
        let mut kw = NodeValueKeyword::new("Population", "", 1);
        assert!(matches!(
            kw.set_text("rho*2", &scope),
            Err(KeywordError::Expression(_))
        ));
        assert!(!kw.is_set());
    }

    #[test]
    fn expressions_left_without_parameters_revert_to_the_default() {
        let scope = scope_with_rho();
        let mut kw = NodeValueKeyword::new("Temperature", "", 300.0);
        kw.set_text("rho*1000", &scope).unwrap();
        assert!(!kw.validate(&scope));

        let empty = FixedScope::default();
        assert!(kw.check(&empty).is_some());
        assert!(kw.validate(&empty));
        assert_eq!(kw.get(), &NodeValue::Double(300.0));
        assert!(kw.check(&empty).is_none());
        assert!(!kw.validate(&empty));
    }

    #[test]
    fn vector_needs_three_components() {
        let scope = scope_with_rho();
        let mut kw = Vec3NodeValueKeyword::new("Lengths", "", [1.0, 1.0, 1.0])
            .with_minimum(Minimum::Exclusive(0.0));
        assert!(kw.parse_args(&["1".into(), "2".into()], &scope).is_err());
        kw.parse_args(&["10".into(), "rho*100".into(), "12.5".into()], &scope)
            .unwrap();
        let v = kw.as_vector();
        assert_eq!(v.x, 10.0);
        assert!((v.y - 10.0).abs() < 1e-12);
        assert!(kw.set([0.0.into(), 1.0.into(), 1.0.into()]).is_err());
    }

    #[test]
    fn value_with_units_uses_table_form() {
        let scope = scope_with_rho();
        let mut kw = NodeValueEnumKeyword::new("Density", "", 0.1, Units::PerVolume);
        kw.parse_args(&["rho".into(), "g/cm3".into()], &scope).unwrap();
        let written = kw.serialise(&scope).unwrap().unwrap();
        let table = written.as_table().unwrap();
        assert_eq!(table["value"].as_str(), Some("rho"));
        assert_eq!(table["units"].as_str(), Some("g/cm3"));

        let mut back = NodeValueEnumKeyword::new("Density", "", 0.1, Units::PerVolume);
        back.deserialise(&written, &scope).unwrap();
        assert_eq!(back.option(), Units::Mass);
        assert_eq!(back.value(), kw.value());
    }
}
