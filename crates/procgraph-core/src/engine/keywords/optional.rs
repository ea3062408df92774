use super::{Keyword, KeywordInfo, KeywordScope, expect_args, kind_name};
use crate::engine::error::KeywordError;
use std::fmt::{Debug, Display};
use toml::Value;

/// Numbers that an [`OptionalKeyword`] can hold.
pub trait OptionalNumber: Copy + PartialOrd + Display + Debug {
    fn from_value(value: &Value) -> Option<Self>;
    fn to_value(self) -> Value;
    fn parse(text: &str) -> Option<Self>;
}

impl OptionalNumber for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_integer()
    }

    fn to_value(self) -> Value {
        Value::Integer(self)
    }

    fn parse(text: &str) -> Option<Self> {
        text.parse().ok()
    }
}

impl OptionalNumber for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    fn to_value(self) -> Value {
        Value::Float(self)
    }

    fn parse(text: &str) -> Option<Self> {
        text.parse().ok()
    }
}

/// A number that may be absent.
///
/// Values at or below the floor are stored as absent instead of being clamped. Values
/// above the ceiling are rejected. Absent values are shown, written and read back as a
/// configurable text such as `"All"` or `"Off"`.
#[derive(Debug, Clone)]
pub struct OptionalKeyword<T: OptionalNumber> {
    info: KeywordInfo,
    value: Option<T>,
    default: Option<T>,
    floor: T,
    ceiling: Option<T>,
    absent_text: &'static str,
}

impl<T: OptionalNumber> OptionalKeyword<T> {
    pub fn new(
        name: &'static str,
        description: &'static str,
        default: Option<T>,
        floor: T,
        ceiling: Option<T>,
        absent_text: &'static str,
    ) -> Self {
        Self {
            info: KeywordInfo::new(name, description),
            value: default,
            default,
            floor,
            ceiling,
            absent_text,
        }
    }

    pub fn get(&self) -> Option<T> {
        self.value
    }

    /// Sets the value. Anything at or below the floor becomes absent.
    pub fn set(&mut self, value: Option<T>) -> Result<(), KeywordError> {
        let stored = match value {
            Some(v) if v <= self.floor => None,
            Some(v) => {
                if let Some(ceiling) = self.ceiling {
                    if v > ceiling {
                        return Err(KeywordError::AboveMaximum {
                            value: v.to_string(),
                            maximum: ceiling.to_string(),
                        });
                    }
                }
                Some(v)
            }
            None => None,
        };
        self.value = stored;
        self.info.set = true;
        Ok(())
    }

    fn parse_text(&self, text: &str) -> Result<Option<T>, KeywordError> {
        if text.eq_ignore_ascii_case(self.absent_text) {
            return Ok(None);
        }
        T::parse(text).map(Some).ok_or_else(|| KeywordError::WrongKind {
            expected: "a number or the absent marker",
            found: text.to_string(),
        })
    }
}

impl<T: OptionalNumber> Keyword for OptionalKeyword<T> {
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
        if !self.info.set {
            return Ok(None);
        }
        Ok(Some(match self.value {
            Some(v) => v.to_value(),
            None => Value::String(self.absent_text.to_string()),
        }))
    }

    fn deserialise(&mut self, value: &Value, _scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        let parsed = match value {
            Value::String(s) => self.parse_text(s)?,
            other => Some(T::from_value(other).ok_or_else(|| KeywordError::WrongKind {
                expected: "a number or the absent marker",
                found: kind_name(other),
            })?),
        };
        self.set(parsed)
    }

    fn parse_args(&mut self, args: &[String], _scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        expect_args(args, "1", |n| n == 1)?;
        let parsed = self.parse_text(&args[0])?;
        self.set(parsed)
    }

    fn display_value(&self, _scope: &dyn KeywordScope) -> String {
        match self.value {
            Some(v) => v.to_string(),
            None => self.absent_text.to_string(),
        }
    }
}
