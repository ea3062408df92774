use crate::core::expression::{Expression, ExpressionError, ExpressionValue, ExpressionVariable};
use std::fmt;
use std::rc::Rc;

/// A scalar node setting: a literal integer, a literal double, or an expression over the
/// parameters in scope.
///
/// Expressions stay bound to the parameter cells they were compiled against, so the value
/// follows later changes to those parameters. Only the literal or the original text is
/// ever persisted, never an evaluated snapshot.
#[derive(Debug, Clone)]
pub enum NodeValue {
    Integer(i64),
    Double(f64),
    Expression(Expression),
}

fn looks_numeric(text: &str) -> bool {
    !text.is_empty()
        && text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
}

impl NodeValue {
    /// Builds a value from text: an integer literal, a float literal, or otherwise an
    /// expression compiled against `params`.
    pub fn from_text(text: &str, params: &[Rc<ExpressionVariable>]) -> Result<Self, ExpressionError> {
        let trimmed = text.trim();
        if looks_numeric(trimmed) {
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(NodeValue::Integer(i));
            }
            if let Ok(d) = trimmed.parse::<f64>() {
                return Ok(NodeValue::Double(d));
            }
        }
        Ok(NodeValue::Expression(Expression::compile(trimmed, params)?))
    }

    /// Replaces the value with one parsed from `text`. On failure the current value is kept.
    pub fn set_text(
        &mut self,
        text: &str,
        params: &[Rc<ExpressionVariable>],
    ) -> Result<(), ExpressionError> {
        *self = Self::from_text(text, params)?;
        Ok(())
    }

    pub fn set_integer(&mut self, value: i64) {
        *self = NodeValue::Integer(value);
    }

    pub fn set_double(&mut self, value: f64) {
        *self = NodeValue::Double(value);
    }

    pub fn evaluate(&self) -> ExpressionValue {
        match self {
            NodeValue::Integer(i) => ExpressionValue::Integer(*i),
            NodeValue::Double(d) => ExpressionValue::Double(*d),
            NodeValue::Expression(e) => e.evaluate(),
        }
    }

    pub fn as_double(&self) -> f64 {
        self.evaluate().as_double()
    }

    /// Evaluates to an integer, rounding to nearest.
    pub fn as_integer(&self) -> i64 {
        self.evaluate().as_integer()
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, NodeValue::Expression(_))
    }

    /// The literal value, if this is not an expression.
    pub fn literal(&self) -> Option<f64> {
        match self {
            NodeValue::Integer(i) => Some(*i as f64),
            NodeValue::Double(d) => Some(*d),
            NodeValue::Expression(_) => None,
        }
    }

    /// Whether every parameter the value depends on is one of `params`.
    pub fn uses_only(&self, params: &[Rc<ExpressionVariable>]) -> bool {
        match self {
            NodeValue::Expression(e) => e.uses_only(params),
            _ => true,
        }
    }

    /// Recompiles an expression whose parameters are no longer all in `params`.
    ///
    /// # Return
    ///
    /// `true` if the value was re-bound. Expressions that cannot be recompiled are left
    /// as they are.
    pub fn rebind(&mut self, params: &[Rc<ExpressionVariable>]) -> bool {
        let NodeValue::Expression(expr) = self else {
            return false;
        };
        if expr.uses_only(params) {
            return false;
        }
        match Expression::compile(&expr.text(), params) {
            Ok(recompiled) => {
                *expr = recompiled;
                true
            }
            Err(_) => false,
        }
    }

    pub fn to_toml(&self) -> toml::Value {
        match self {
            NodeValue::Integer(i) => toml::Value::Integer(*i),
            NodeValue::Double(d) => toml::Value::Float(*d),
            NodeValue::Expression(e) => toml::Value::String(e.text()),
        }
    }
}

impl Default for NodeValue {
    fn default() -> Self {
        NodeValue::Integer(0)
    }
}

impl From<i64> for NodeValue {
    fn from(value: i64) -> Self {
        NodeValue::Integer(value)
    }
}

impl From<f64> for NodeValue {
    fn from(value: f64) -> Self {
        NodeValue::Double(value)
    }
}

impl PartialEq for NodeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NodeValue::Integer(a), NodeValue::Integer(b)) => a == b,
            (NodeValue::Double(a), NodeValue::Double(b)) => a == b,
            (NodeValue::Expression(a), NodeValue::Expression(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeValue::Integer(i) => write!(f, "{}", i),
            NodeValue::Double(d) => write!(f, "{:?}", d),
            NodeValue::Expression(e) => f.write_str(&e.text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_are_recognised() {
        assert_eq!(NodeValue::from_text("100", &[]).unwrap(), NodeValue::Integer(100));
        assert_eq!(NodeValue::from_text(" 0.1 ", &[]).unwrap(), NodeValue::Double(0.1));
        assert_eq!(NodeValue::from_text("1e3", &[]).unwrap(), NodeValue::Double(1000.0));
        assert!(NodeValue::from_text("50*2", &[]).unwrap().is_expression());
    }

    #[test]
    fn display_reparses_to_the_same_variant() {
        for value in [NodeValue::Integer(2), NodeValue::Double(2.0), NodeValue::Double(-0.25)] {
            let text = value.to_string();
            assert_eq!(NodeValue::from_text(&text, &[]).unwrap(), value);
        }
    }

    #[test]
    fn failed_set_keeps_previous_value() {
        let mut value = NodeValue::Double(3.5);
        assert!(value.set_text("rho*2", &[]).is_err());
        assert_eq!(value, NodeValue::Double(3.5));
    }

    #[test]
    fn expressions_round_to_integers() {
        let value = NodeValue::from_text("50*2", &[]).unwrap();
        assert_eq!(value.as_integer(), 100);
        let value = NodeValue::from_text("199/2", &[]).unwrap();
        assert_eq!(value.as_integer(), 100);
        assert_eq!(value.to_toml(), toml::Value::String("199/2".into()));
    }

    #[test]
    fn rebinding_follows_new_parameter_cells() {
        let old = ExpressionVariable::new("rho", ExpressionValue::Double(0.1));
        let mut value = NodeValue::from_text("rho", &[old]).unwrap();
        let new = ExpressionVariable::new("rho", ExpressionValue::Double(0.5));
        let params = vec![new];
        assert!(!value.uses_only(&params));
        assert!(value.rebind(&params));
        assert!(!value.rebind(&params));
        assert_eq!(value.as_double(), 0.5);
        assert!(!value.rebind(&[]));
        assert_eq!(value.as_double(), 0.5);
    }
}
