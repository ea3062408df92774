use std::fmt;

/// Result of evaluating an expression, or the value held by a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExpressionValue {
    Integer(i64),
    Double(f64),
}

impl ExpressionValue {
    pub fn as_double(&self) -> f64 {
        match *self {
            ExpressionValue::Integer(i) => i as f64,
            ExpressionValue::Double(d) => d,
        }
    }

    /// Returns the value as an integer, rounding doubles to the nearest whole number.
    pub fn as_integer(&self) -> i64 {
        match *self {
            ExpressionValue::Integer(i) => i,
            ExpressionValue::Double(d) => d.round() as i64,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ExpressionValue::Integer(_))
    }
}

impl Default for ExpressionValue {
    fn default() -> Self {
        ExpressionValue::Integer(0)
    }
}

impl From<i64> for ExpressionValue {
    fn from(value: i64) -> Self {
        ExpressionValue::Integer(value)
    }
}

impl From<f64> for ExpressionValue {
    fn from(value: f64) -> Self {
        ExpressionValue::Double(value)
    }
}

impl fmt::Display for ExpressionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionValue::Integer(i) => write!(f, "{}", i),
            // Debug formatting keeps the decimal point on whole numbers.
            ExpressionValue::Double(d) => write!(f, "{:?}", d),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_round_to_nearest_integer() {
        assert_eq!(ExpressionValue::Double(99.6).as_integer(), 100);
        assert_eq!(ExpressionValue::Double(-2.5).as_integer(), -3);
        assert_eq!(ExpressionValue::Integer(7).as_double(), 7.0);
    }

    #[test]
    fn display_distinguishes_doubles_from_integers() {
        assert_eq!(ExpressionValue::Integer(2).to_string(), "2");
        assert_eq!(ExpressionValue::Double(2.0).to_string(), "2.0");
        assert_eq!(ExpressionValue::Double(0.1).to_string(), "0.1");
    }
}
