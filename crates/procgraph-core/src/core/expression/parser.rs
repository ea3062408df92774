use super::value::ExpressionValue;
use super::variable::{ExpressionVariable, find_variable};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("Expression is empty")]
    Empty,
    #[error("Unexpected character '{ch}' at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },
    #[error("Unexpected '{token}' at position {position}")]
    UnexpectedToken { token: String, position: usize },
    #[error("Expression ended unexpectedly")]
    UnexpectedEnd,
    #[error("Unbalanced parenthesis at position {0}")]
    UnbalancedParenthesis(usize),
    #[error("Invalid number '{0}'")]
    InvalidNumber(String),
    #[error("Unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(ExpressionValue),
    Identifier(String),
    Operator(char),
    Open,
    Close,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(v) => write!(f, "{}", v),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::Operator(c) => write!(f, "{}", c),
            Token::Open => write!(f, "("),
            Token::Close => write!(f, ")"),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<(Token, usize)>, ExpressionError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < chars.len() {
        let c = chars[pos];
        if c.is_whitespace() {
            pos += 1;
        } else if c.is_ascii_digit() || (c == '.' && chars.get(pos + 1).is_some_and(|n| n.is_ascii_digit())) {
            let start = pos;
            let mut is_float = false;
            while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
                is_float |= chars[pos] == '.';
                pos += 1;
            }
            if pos < chars.len() && (chars[pos] == 'e' || chars[pos] == 'E') {
                let mut look = pos + 1;
                if look < chars.len() && (chars[look] == '+' || chars[look] == '-') {
                    look += 1;
                }
                if look < chars.len() && chars[look].is_ascii_digit() {
                    is_float = true;
                    pos = look;
                    while pos < chars.len() && chars[pos].is_ascii_digit() {
                        pos += 1;
                    }
                }
            }
            let literal: String = chars[start..pos].iter().collect();
            tokens.push((Token::Number(parse_number(&literal, is_float)?), start));
        } else if c.is_alphabetic() || c == '_' {
            let start = pos;
            while pos < chars.len()
                && (chars[pos].is_alphanumeric() || chars[pos] == '_' || chars[pos] == '.')
            {
                pos += 1;
            }
            tokens.push((Token::Identifier(chars[start..pos].iter().collect()), start));
        } else if "+-*/%^".contains(c) {
            tokens.push((Token::Operator(c), pos));
            pos += 1;
        } else if c == '(' {
            tokens.push((Token::Open, pos));
            pos += 1;
        } else if c == ')' {
            tokens.push((Token::Close, pos));
            pos += 1;
        } else {
            return Err(ExpressionError::UnexpectedCharacter { ch: c, position: pos });
        }
    }
    Ok(tokens)
}

fn parse_number(literal: &str, is_float: bool) -> Result<ExpressionValue, ExpressionError> {
    if !is_float {
        if let Ok(i) = literal.parse::<i64>() {
            return Ok(ExpressionValue::Integer(i));
        }
    }
    literal
        .parse::<f64>()
        .map(ExpressionValue::Double)
        .map_err(|_| ExpressionError::InvalidNumber(literal.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Abs,
    Acos,
    Asin,
    Atan,
    Cos,
    Exp,
    Ln,
    Log,
    Sin,
    Sqrt,
    Tan,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "abs" => Function::Abs,
            "acos" => Function::Acos,
            "asin" => Function::Asin,
            "atan" => Function::Atan,
            "cos" => Function::Cos,
            "exp" => Function::Exp,
            "ln" => Function::Ln,
            "log" => Function::Log,
            "sin" => Function::Sin,
            "sqrt" => Function::Sqrt,
            "tan" => Function::Tan,
            _ => return None,
        })
    }

    fn apply(self, arg: ExpressionValue) -> ExpressionValue {
        if let (Function::Abs, ExpressionValue::Integer(i)) = (self, arg) {
            return ExpressionValue::Integer(i.abs());
        }
        let x = arg.as_double();
        ExpressionValue::Double(match self {
            Function::Abs => x.abs(),
            Function::Acos => x.acos().to_degrees(),
            Function::Asin => x.asin().to_degrees(),
            Function::Atan => x.atan().to_degrees(),
            Function::Cos => x.to_radians().cos(),
            Function::Exp => x.exp(),
            Function::Ln => x.ln(),
            Function::Log => x.log10(),
            Function::Sin => x.to_radians().sin(),
            Function::Sqrt => x.sqrt(),
            Function::Tan => x.to_radians().tan(),
        })
    }
}

#[derive(Debug, Clone)]
enum Node {
    Constant(ExpressionValue),
    Variable(Rc<ExpressionVariable>),
    Negate(Box<Node>),
    Binary(char, Box<Node>, Box<Node>),
    Call(Function, Box<Node>),
}

impl Node {
    fn evaluate(&self) -> ExpressionValue {
        match self {
            Node::Constant(v) => *v,
            Node::Variable(var) => var.value(),
            Node::Negate(inner) => match inner.evaluate() {
                ExpressionValue::Integer(i) => i
                    .checked_neg()
                    .map_or(ExpressionValue::Double(-(i as f64)), ExpressionValue::Integer),
                ExpressionValue::Double(d) => ExpressionValue::Double(-d),
            },
            Node::Binary(op, lhs, rhs) => binary(*op, lhs.evaluate(), rhs.evaluate()),
            Node::Call(func, arg) => func.apply(arg.evaluate()),
        }
    }

    fn collect_variables(&self, out: &mut Vec<Rc<ExpressionVariable>>) {
        match self {
            Node::Constant(_) => {}
            Node::Variable(var) => {
                if !out.iter().any(|v| Rc::ptr_eq(v, var)) {
                    out.push(Rc::clone(var));
                }
            }
            Node::Negate(inner) | Node::Call(_, inner) => inner.collect_variables(out),
            Node::Binary(_, lhs, rhs) => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
        }
    }
}

fn binary(op: char, lhs: ExpressionValue, rhs: ExpressionValue) -> ExpressionValue {
    use ExpressionValue::{Double, Integer};
    if let (Integer(a), Integer(b)) = (lhs, rhs) {
        let integral = match op {
            '+' => a.checked_add(b),
            '-' => a.checked_sub(b),
            '*' => a.checked_mul(b),
            '%' => a.checked_rem(b),
            '^' => u32::try_from(b).ok().and_then(|e| a.checked_pow(e)),
            _ => None,
        };
        if let Some(result) = integral {
            return Integer(result);
        }
    }
    let (a, b) = (lhs.as_double(), rhs.as_double());
    Double(match op {
        '+' => a + b,
        '-' => a - b,
        '*' => a * b,
        '/' => a / b,
        '%' => a % b,
        _ => a.powf(b),
    })
}

struct Parser<'a> {
    tokens: Vec<(Token, usize)>,
    cursor: usize,
    params: &'a [Rc<ExpressionVariable>],
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(t, _)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.cursor).map_or(0, |(_, p)| *p)
    }

    fn advance(&mut self) -> Option<(Token, usize)> {
        let next = self.tokens.get(self.cursor).cloned();
        self.cursor += 1;
        next
    }

    fn expression(&mut self) -> Result<Node, ExpressionError> {
        let mut node = self.term()?;
        while let Some(Token::Operator(op @ ('+' | '-'))) = self.peek() {
            let op = *op;
            self.cursor += 1;
            node = Node::Binary(op, Box::new(node), Box::new(self.term()?));
        }
        Ok(node)
    }

    fn term(&mut self) -> Result<Node, ExpressionError> {
        let mut node = self.unary()?;
        while let Some(Token::Operator(op @ ('*' | '/' | '%'))) = self.peek() {
            let op = *op;
            self.cursor += 1;
            node = Node::Binary(op, Box::new(node), Box::new(self.unary()?));
        }
        Ok(node)
    }

    fn unary(&mut self) -> Result<Node, ExpressionError> {
        match self.peek() {
            Some(Token::Operator('-')) => {
                self.cursor += 1;
                Ok(Node::Negate(Box::new(self.unary()?)))
            }
            Some(Token::Operator('+')) => {
                self.cursor += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Node, ExpressionError> {
        let base = self.primary()?;
        if let Some(Token::Operator('^')) = self.peek() {
            self.cursor += 1;
            let exponent = self.unary()?;
            return Ok(Node::Binary('^', Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Node, ExpressionError> {
        let (token, position) = self.advance().ok_or(ExpressionError::UnexpectedEnd)?;
        match token {
            Token::Number(v) => Ok(Node::Constant(v)),
            Token::Open => {
                let inner = self.expression()?;
                self.expect_close(position)?;
                Ok(inner)
            }
            Token::Identifier(name) => {
                if let Some(Token::Open) = self.peek() {
                    let func = Function::from_name(&name)
                        .ok_or_else(|| ExpressionError::UnknownFunction(name.clone()))?;
                    self.cursor += 1;
                    let arg = self.expression()?;
                    self.expect_close(position)?;
                    return Ok(Node::Call(func, Box::new(arg)));
                }
                if let Some(var) = find_variable(self.params, &name) {
                    return Ok(Node::Variable(var));
                }
                if name.eq_ignore_ascii_case("pi") {
                    return Ok(Node::Constant(ExpressionValue::Double(std::f64::consts::PI)));
                }
                Err(ExpressionError::UnknownIdentifier(name))
            }
            Token::Close => Err(ExpressionError::UnbalancedParenthesis(position)),
            Token::Operator(c) => Err(ExpressionError::UnexpectedToken {
                token: c.to_string(),
                position,
            }),
        }
    }

    fn expect_close(&mut self, open_position: usize) -> Result<(), ExpressionError> {
        match self.advance() {
            Some((Token::Close, _)) => Ok(()),
            _ => Err(ExpressionError::UnbalancedParenthesis(open_position)),
        }
    }
}

/// A piece of the source text: either verbatim or a reference to a bound variable.
#[derive(Debug, Clone)]
enum Segment {
    Text(String),
    Variable {
        written: String,
        variable: Rc<ExpressionVariable>,
    },
}

/// Splits `text` around the identifiers that resolve to variables, mirroring the parser's
/// resolution order (a function call wins over a variable of the same name).
fn split_source(
    text: &str,
    tokens: &[(Token, usize)],
    params: &[Rc<ExpressionVariable>],
) -> Vec<Segment> {
    let chars: Vec<char> = text.chars().collect();
    let mut segments = Vec::new();
    let mut start = 0;
    for (i, (token, position)) in tokens.iter().enumerate() {
        let Token::Identifier(name) = token else {
            continue;
        };
        if matches!(tokens.get(i + 1), Some((Token::Open, _))) {
            continue;
        }
        let Some(variable) = find_variable(params, name) else {
            continue;
        };
        if start < *position {
            segments.push(Segment::Text(chars[start..*position].iter().collect()));
        }
        segments.push(Segment::Variable {
            written: name.clone(),
            variable,
        });
        start = position + name.chars().count();
    }
    if start < chars.len() {
        segments.push(Segment::Text(chars[start..].iter().collect()));
    }
    segments
}

/// A compiled expression bound to the variables it references.
///
/// The source text is kept in pieces so that a variable renamed after compilation is
/// written under its new name.
#[derive(Debug, Clone)]
pub struct Expression {
    source: Vec<Segment>,
    root: Node,
    variables: Vec<Rc<ExpressionVariable>>,
}

impl Expression {
    /// Compiles `text`, resolving identifiers against `params` (ignoring case).
    ///
    /// # Errors
    ///
    /// Returns an [`ExpressionError`] for syntax errors, unknown identifiers or unknown
    /// functions.
    pub fn compile(text: &str, params: &[Rc<ExpressionVariable>]) -> Result<Self, ExpressionError> {
        let text = text.trim();
        let tokens = tokenize(text)?;
        if tokens.is_empty() {
            return Err(ExpressionError::Empty);
        }
        let source = split_source(text, &tokens, params);
        let mut parser = Parser {
            tokens,
            cursor: 0,
            params,
        };
        let root = parser.expression()?;
        if let Some(token) = parser.peek() {
            let position = parser.position();
            return Err(match token {
                Token::Close => ExpressionError::UnbalancedParenthesis(position),
                other => ExpressionError::UnexpectedToken {
                    token: other.to_string(),
                    position,
                },
            });
        }
        let mut variables = Vec::new();
        root.collect_variables(&mut variables);
        Ok(Self {
            source,
            root,
            variables,
        })
    }

    /// The source text, with every variable written under its current name.
    pub fn text(&self) -> String {
        self.source
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => text.clone(),
                Segment::Variable { written, variable } if variable.has_name(written) => {
                    written.clone()
                }
                Segment::Variable { variable, .. } => variable.name(),
            })
            .collect()
    }

    pub fn evaluate(&self) -> ExpressionValue {
        self.root.evaluate()
    }

    /// The distinct variables referenced by the expression.
    pub fn variables(&self) -> &[Rc<ExpressionVariable>] {
        &self.variables
    }

    /// Whether every referenced variable is one of `params` (by identity).
    pub fn uses_only(&self, params: &[Rc<ExpressionVariable>]) -> bool {
        self.variables
            .iter()
            .all(|v| params.iter().any(|p| Rc::ptr_eq(p, v)))
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.text() == other.text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(text: &str) -> ExpressionValue {
        Expression::compile(text, &[]).unwrap().evaluate()
    }

    #[test]
    fn integer_arithmetic_stays_integral() {
        assert_eq!(eval("50*2"), ExpressionValue::Integer(100));
        assert_eq!(eval("7 % 3"), ExpressionValue::Integer(1));
        assert_eq!(eval("2^10"), ExpressionValue::Integer(1024));
        assert_eq!(eval("1 + 2 * 3"), ExpressionValue::Integer(7));
    }

    #[test]
    fn division_and_negative_powers_are_floating() {
        assert_eq!(eval("7/2"), ExpressionValue::Double(3.5));
        assert_eq!(eval("2^-1"), ExpressionValue::Double(0.5));
        assert_eq!(eval("1.5e1"), ExpressionValue::Double(15.0));
    }

    #[test]
    fn precedence_and_unary_minus() {
        assert_eq!(eval("-2^2"), ExpressionValue::Integer(-4));
        assert_eq!(eval("(1+2)*3"), ExpressionValue::Integer(9));
        assert_eq!(eval("2^3^2"), ExpressionValue::Integer(512));
        assert_eq!(eval("--3"), ExpressionValue::Integer(3));
    }

    #[test]
    fn functions_work_in_degrees() {
        assert!((eval("sin(90)").as_double() - 1.0).abs() < 1e-12);
        assert!((eval("acos(0)").as_double() - 90.0).abs() < 1e-12);
        assert!((eval("cos(2*pi)").as_double() - (2.0 * std::f64::consts::PI).to_radians().cos()).abs() < 1e-12);
        assert_eq!(eval("abs(-4)"), ExpressionValue::Integer(4));
        assert_eq!(eval("sqrt(16)"), ExpressionValue::Double(4.0));
    }

    #[test]
    fn variables_are_live() {
        let rho = ExpressionVariable::new("rho", ExpressionValue::Double(0.1));
        let params = vec![Rc::clone(&rho)];
        let expr = Expression::compile("RHO*10", &params).unwrap();
        assert!((expr.evaluate().as_double() - 1.0).abs() < 1e-12);
        rho.set_value(0.5);
        assert!((expr.evaluate().as_double() - 5.0).abs() < 1e-12);
        assert!(expr.uses_only(&params));
        assert!(!expr.uses_only(&[]));
    }

    #[test]
    fn dotted_identifiers_resolve() {
        let index = ExpressionVariable::new("Loop.index", ExpressionValue::Integer(3));
        let expr = Expression::compile("Loop.index + 1", &[index]).unwrap();
        assert_eq!(expr.evaluate(), ExpressionValue::Integer(4));
    }

    #[test]
    fn text_follows_renamed_variables() {
        let iteration = ExpressionVariable::new("Loop.iteration", ExpressionValue::Integer(2));
        let params = vec![Rc::clone(&iteration)];
        let expr = Expression::compile(" loop.iteration*10 + sin(pi) ", &params).unwrap();
        assert_eq!(expr.text(), "loop.iteration*10 + sin(pi)");

        iteration.set_name("Cycle.iteration");
        assert_eq!(expr.text(), "Cycle.iteration*10 + sin(pi)");
        let reparsed = Expression::compile(&expr.text(), &params).unwrap();
        assert_eq!(reparsed.evaluate(), expr.evaluate());
    }

    #[test]
    fn compile_errors_are_reported() {
        assert_eq!(Expression::compile("", &[]).unwrap_err(), ExpressionError::Empty);
        assert_eq!(
            Expression::compile("rho", &[]).unwrap_err(),
            ExpressionError::UnknownIdentifier("rho".to_string())
        );
        assert_eq!(
            Expression::compile("foo(1)", &[]).unwrap_err(),
            ExpressionError::UnknownFunction("foo".to_string())
        );
        assert!(matches!(
            Expression::compile("(1+2", &[]).unwrap_err(),
            ExpressionError::UnbalancedParenthesis(0)
        ));
        assert!(matches!(
            Expression::compile("1+2)", &[]).unwrap_err(),
            ExpressionError::UnbalancedParenthesis(3)
        ));
        assert!(matches!(
            Expression::compile("1 2", &[]).unwrap_err(),
            ExpressionError::UnexpectedToken { .. }
        ));
        assert!(matches!(
            Expression::compile("1 $ 2", &[]).unwrap_err(),
            ExpressionError::UnexpectedCharacter { ch: '$', .. }
        ));
    }
}
