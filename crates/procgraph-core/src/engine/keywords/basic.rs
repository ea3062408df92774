use super::{Keyword, KeywordInfo, KeywordScope, expect_args, kind_name};
use crate::engine::error::KeywordError;
use toml::Value;

#[derive(Debug, Clone)]
pub struct BoolKeyword {
    info: KeywordInfo,
    value: bool,
    default: bool,
}

impl BoolKeyword {
    pub fn new(name: &'static str, description: &'static str, default: bool) -> Self {
        Self {
            info: KeywordInfo::new(name, description),
            value: default,
            default,
        }
    }

    pub fn get(&self) -> bool {
        self.value
    }

    pub fn set(&mut self, value: bool) {
        self.value = value;
        self.info.set = true;
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

impl Keyword for BoolKeyword {
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
        Ok(self.info.set.then_some(Value::Boolean(self.value)))
    }

    fn deserialise(&mut self, value: &Value, _scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        match value {
            Value::Boolean(b) => {
                self.set(*b);
                Ok(())
            }
            other => Err(KeywordError::WrongKind {
                expected: "a boolean",
                found: kind_name(other),
            }),
        }
    }

    fn parse_args(&mut self, args: &[String], _scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        expect_args(args, "1", |n| n == 1)?;
        let value = parse_bool(&args[0]).ok_or_else(|| KeywordError::UnknownOption {
            value: args[0].clone(),
            options: "true, false, on, off, yes, no, 1, 0".to_string(),
        })?;
        self.set(value);
        Ok(())
    }

    fn display_value(&self, _scope: &dyn KeywordScope) -> String {
        self.value.to_string()
    }
}

/// Checks `value` against optional inclusive bounds.
fn check_bounds<T: PartialOrd + ToString>(
    value: T,
    minimum: Option<T>,
    maximum: Option<T>,
) -> Result<T, KeywordError> {
    if let Some(min) = minimum {
        if value < min {
            return Err(KeywordError::BelowMinimum {
                value: value.to_string(),
                minimum: min.to_string(),
            });
        }
    }
    if let Some(max) = maximum {
        if value > max {
            return Err(KeywordError::AboveMaximum {
                value: value.to_string(),
                maximum: max.to_string(),
            });
        }
    }
    Ok(value)
}

#[derive(Debug, Clone)]
pub struct IntegerKeyword {
    info: KeywordInfo,
    value: i64,
    default: i64,
    minimum: Option<i64>,
    maximum: Option<i64>,
}

impl IntegerKeyword {
    pub fn new(name: &'static str, description: &'static str, default: i64) -> Self {
        Self {
            info: KeywordInfo::new(name, description),
            value: default,
            default,
            minimum: None,
            maximum: None,
        }
    }

    pub fn with_range(mut self, minimum: Option<i64>, maximum: Option<i64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    pub fn get(&self) -> i64 {
        self.value
    }

    pub fn set(&mut self, value: i64) -> Result<(), KeywordError> {
        self.value = check_bounds(value, self.minimum, self.maximum)?;
        self.info.set = true;
        Ok(())
    }
}

impl Keyword for IntegerKeyword {
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
        Ok(self.info.set.then_some(Value::Integer(self.value)))
    }

    fn deserialise(&mut self, value: &Value, _scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        match value {
            Value::Integer(i) => self.set(*i),
            other => Err(KeywordError::WrongKind {
                expected: "an integer",
                found: kind_name(other),
            }),
        }
    }

    fn parse_args(&mut self, args: &[String], _scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        expect_args(args, "1", |n| n == 1)?;
        let value = args[0].parse::<i64>().map_err(|_| KeywordError::WrongKind {
            expected: "an integer",
            found: args[0].clone(),
        })?;
        self.set(value)
    }

    fn display_value(&self, _scope: &dyn KeywordScope) -> String {
        self.value.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct DoubleKeyword {
    info: KeywordInfo,
    value: f64,
    default: f64,
    minimum: Option<f64>,
    maximum: Option<f64>,
}

impl DoubleKeyword {
    pub fn new(name: &'static str, description: &'static str, default: f64) -> Self {
        Self {
            info: KeywordInfo::new(name, description),
            value: default,
            default,
            minimum: None,
            maximum: None,
        }
    }

    pub fn with_range(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    pub fn get(&self) -> f64 {
        self.value
    }

    pub fn set(&mut self, value: f64) -> Result<(), KeywordError> {
        self.value = check_bounds(value, self.minimum, self.maximum)?;
        self.info.set = true;
        Ok(())
    }
}

impl Keyword for DoubleKeyword {
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
        Ok(self.info.set.then_some(Value::Float(self.value)))
    }

    fn deserialise(&mut self, value: &Value, _scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        match value {
            Value::Float(f) => self.set(*f),
            Value::Integer(i) => self.set(*i as f64),
            other => Err(KeywordError::WrongKind {
                expected: "a number",
                found: kind_name(other),
            }),
        }
    }

    fn parse_args(&mut self, args: &[String], _scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        expect_args(args, "1", |n| n == 1)?;
        let value = args[0].parse::<f64>().map_err(|_| KeywordError::WrongKind {
            expected: "a number",
            found: args[0].clone(),
        })?;
        self.set(value)
    }

    fn display_value(&self, _scope: &dyn KeywordScope) -> String {
        format!("{:?}", self.value)
    }
}
