use super::{Keyword, KeywordInfo, KeywordScope, expect_args, kind_name};
use crate::engine::error::KeywordError;
use toml::Value;

/// A closed set of named options usable in an [`EnumKeyword`].
pub trait EnumOption: Copy + PartialEq + 'static {
    fn options() -> &'static [(&'static str, Self)];

    fn option_name(self) -> &'static str {
        Self::options()
            .iter()
            .find(|(_, v)| *v == self)
            .map_or("?", |(n, _)| *n)
    }

    /// Looks up an option by name, ignoring case.
    fn parse_option(text: &str) -> Result<Self, KeywordError> {
        Self::options()
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(text))
            .map(|(_, v)| *v)
            .ok_or_else(|| KeywordError::UnknownOption {
                value: text.to_string(),
                options: Self::options()
                    .iter()
                    .map(|(n, _)| *n)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

#[derive(Debug, Clone)]
pub struct EnumKeyword<E: EnumOption> {
    info: KeywordInfo,
    value: E,
    default: E,
}

impl<E: EnumOption> EnumKeyword<E> {
    pub fn new(name: &'static str, description: &'static str, default: E) -> Self {
        Self {
            info: KeywordInfo::new(name, description),
            value: default,
            default,
        }
    }

    pub fn get(&self) -> E {
        self.value
    }

    pub fn set(&mut self, value: E) {
        self.value = value;
        self.info.set = true;
    }
}

impl<E: EnumOption> Keyword for EnumKeyword<E> {
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
        Ok(self
            .info
            .set
            .then(|| Value::String(self.value.option_name().to_string())))
    }

    fn deserialise(&mut self, value: &Value, _scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        let Value::String(text) = value else {
            return Err(KeywordError::WrongKind {
                expected: "an option name",
                found: kind_name(value),
            });
        };
        self.set(E::parse_option(text)?);
        Ok(())
    }

    fn parse_args(&mut self, args: &[String], _scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        expect_args(args, "1", |n| n == 1)?;
        self.set(E::parse_option(&args[0])?);
        Ok(())
    }

    fn display_value(&self, _scope: &dyn KeywordScope) -> String {
        self.value.option_name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::keywords::testing::FixedScope;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Shape {
        Round,
        Square,
    }

    impl EnumOption for Shape {
        fn options() -> &'static [(&'static str, Self)] {
            &[("Round", Shape::Round), ("Square", Shape::Square)]
        }
    }

    #[test]
    fn options_are_matched_ignoring_case() {
        let scope = FixedScope::default();
        let mut kw = EnumKeyword::new("Shape", "", Shape::Round);
        kw.deserialise(&Value::String("SQUARE".into()), &scope).unwrap();
        assert_eq!(kw.get(), Shape::Square);
        assert_eq!(kw.serialise(&scope).unwrap(), Some(Value::String("Square".into())));
    }

    #[test]
    fn unknown_option_lists_valid_ones() {
        let scope = FixedScope::default();
        let mut kw = EnumKeyword::new("Shape", "", Shape::Round);
        let err = kw.parse_args(&["Oval".to_string()], &scope).unwrap_err();
        assert_eq!(
            err,
            KeywordError::UnknownOption {
                value: "Oval".into(),
                options: "Round, Square".into()
            }
        );
        assert_eq!(kw.get(), Shape::Round);
        assert!(!kw.is_set());
    }
}
