//! A small sandboxed expression language for template conditions and output.
//!
//! Expressions evaluate over JSON values:
//!
//! ```text
//! questionnaire_completion > 0.3 and not bot_recent('what i can do', 10)
//! question.title
//! user.first_name or 'du'
//! 'display' in damage_types
//! ```
//!
//! Supported are literals (numbers, quoted strings, `true`, `false`, `none`,
//! `[lists]`), variables with `.field` access, calls of host functions,
//! `not`, `and`, `or`, comparisons, `in` / `not in` and `+ - * / %`. Names
//! are resolved through a [`Scope`]; anything the scope does not define is
//! an error, never evaluated code.

use crate::error::ExpressionError;
use parlance_core::is_truthy;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};

/// Host environment of an expression.
pub trait Scope {
    /// Looks up a top-level variable.
    fn variable(&self, name: &str) -> Option<JsonValue>;

    /// Calls a host function. The default scope defines none.
    ///
    /// # Errors
    ///
    /// Returns `UnknownFunction` for undefined names, or the function's own
    /// argument errors.
    fn call(&self, name: &str, args: &[JsonValue]) -> Result<JsonValue, ExpressionError> {
        let _ = args;
        Err(ExpressionError::UnknownFunction {
            name: name.to_string(),
        })
    }
}

impl Scope for BTreeMap<String, JsonValue> {
    fn variable(&self, name: &str) -> Option<JsonValue> {
        self.get(name).cloned()
    }
}

impl Scope for HashMap<String, JsonValue> {
    fn variable(&self, name: &str) -> Option<JsonValue> {
        self.get(name).cloned()
    }
}

/// Binary operators, loosest binding first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A constant.
    Literal(JsonValue),
    /// A list literal.
    List(Vec<Expr>),
    /// A top-level variable.
    Variable(String),
    /// Field access on an object.
    Attribute(Box<Expr>, String),
    /// A host function call.
    Call(String, Vec<Expr>),
    /// Logical negation.
    Not(Box<Expr>),
    /// Arithmetic negation.
    Neg(Box<Expr>),
    /// A binary operation.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parses a complete expression.
    ///
    /// # Errors
    ///
    /// Returns `Syntax` for malformed input.
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let mut parser = Parser::new(source)?;
        let expr = parser.expression()?;
        parser.expect_end()?;
        Ok(expr)
    }

    /// Parses an output expression followed by `| filter` names.
    ///
    /// # Errors
    ///
    /// Returns `Syntax` for malformed input.
    pub fn parse_with_filters(source: &str) -> Result<(Self, Vec<String>), ExpressionError> {
        let mut parser = Parser::new(source)?;
        let expr = parser.expression()?;
        let mut filters = Vec::new();
        while parser.eat(&Token::Pipe) {
            filters.push(parser.identifier()?);
        }
        parser.expect_end()?;
        Ok((expr, filters))
    }

    /// Evaluates the expression.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown names, type mismatches and division by zero.
    pub fn eval(&self, scope: &dyn Scope) -> Result<JsonValue, ExpressionError> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::List(items) => items
                .iter()
                .map(|item| item.eval(scope))
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            Self::Variable(name) => {
                scope
                    .variable(name)
                    .ok_or_else(|| ExpressionError::UnknownVariable { name: name.clone() })
            }
            Self::Attribute(base, field) => Ok(match base.eval(scope)? {
                JsonValue::Object(mut map) => map.remove(field).unwrap_or(JsonValue::Null),
                _ => JsonValue::Null,
            }),
            Self::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|arg| arg.eval(scope))
                    .collect::<Result<Vec<_>, _>>()?;
                scope.call(name, &args)
            }
            Self::Not(inner) => Ok(JsonValue::Bool(!is_truthy(&inner.eval(scope)?))),
            Self::Neg(inner) => {
                let value = inner.eval(scope)?;
                let n = as_number(&value).ok_or_else(|| type_error("cannot negate", &value))?;
                Ok(number(-n))
            }
            Self::Binary(BinaryOp::Or, lhs, rhs) => {
                let left = lhs.eval(scope)?;
                if is_truthy(&left) { Ok(left) } else { rhs.eval(scope) }
            }
            Self::Binary(BinaryOp::And, lhs, rhs) => {
                let left = lhs.eval(scope)?;
                if is_truthy(&left) { rhs.eval(scope) } else { Ok(left) }
            }
            Self::Binary(op, lhs, rhs) => binary(*op, &lhs.eval(scope)?, &rhs.eval(scope)?),
        }
    }

    /// Evaluates the expression as a condition.
    ///
    /// # Errors
    ///
    /// As [`eval`](Self::eval).
    pub fn is_satisfied(&self, scope: &dyn Scope) -> Result<bool, ExpressionError> {
        self.eval(scope).map(|value| is_truthy(&value))
    }
}

/// Converts a float into a JSON number, preferring integers.
#[must_use]
pub fn number(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        JsonValue::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(JsonValue::Null, JsonValue::Number)
    }
}

fn as_number(value: &JsonValue) -> Option<f64> {
    value.as_f64()
}

fn type_error(what: &str, value: &JsonValue) -> ExpressionError {
    ExpressionError::Type {
        message: format!("{what} {value}"),
    }
}

fn values_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn contains(haystack: &JsonValue, needle: &JsonValue) -> Result<bool, ExpressionError> {
    match haystack {
        JsonValue::Array(items) => Ok(items.iter().any(|item| values_equal(item, needle))),
        JsonValue::String(s) => match needle {
            JsonValue::String(n) => Ok(s.contains(n.as_str())),
            other => Err(type_error("cannot search a string for", other)),
        },
        JsonValue::Object(map) => Ok(needle.as_str().is_some_and(|key| map.contains_key(key))),
        JsonValue::Null => Ok(false),
        other => Err(type_error("cannot search in", other)),
    }
}

fn compare(op: BinaryOp, a: &JsonValue, b: &JsonValue) -> Result<bool, ExpressionError> {
    let ordering = match (a, b) {
        (JsonValue::String(x), JsonValue::String(y)) => x.cmp(y),
        _ => {
            let (Some(x), Some(y)) = (as_number(a), as_number(b)) else {
                return Err(ExpressionError::Type {
                    message: format!("cannot compare {a} with {b}"),
                });
            };
            x.partial_cmp(&y).ok_or_else(|| ExpressionError::Type {
                message: format!("cannot compare {a} with {b}"),
            })?
        }
    };
    Ok(match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    })
}

fn binary(op: BinaryOp, a: &JsonValue, b: &JsonValue) -> Result<JsonValue, ExpressionError> {
    match op {
        BinaryOp::Eq => Ok(JsonValue::Bool(values_equal(a, b))),
        BinaryOp::Ne => Ok(JsonValue::Bool(!values_equal(a, b))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            compare(op, a, b).map(JsonValue::Bool)
        }
        BinaryOp::In => contains(b, a).map(JsonValue::Bool),
        BinaryOp::NotIn => contains(b, a).map(|found| JsonValue::Bool(!found)),
        BinaryOp::Add => match (a, b) {
            (JsonValue::String(x), JsonValue::String(y)) => Ok(JsonValue::String(format!("{x}{y}"))),
            (JsonValue::Array(x), JsonValue::Array(y)) => {
                Ok(JsonValue::Array(x.iter().chain(y).cloned().collect()))
            }
            _ => arithmetic(op, a, b),
        },
        _ => arithmetic(op, a, b),
    }
}

fn arithmetic(op: BinaryOp, a: &JsonValue, b: &JsonValue) -> Result<JsonValue, ExpressionError> {
    let (Some(x), Some(y)) = (as_number(a), as_number(b)) else {
        return Err(ExpressionError::Type {
            message: format!("unsupported operands {a} and {b}"),
        });
    };
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div if y == 0.0 => return Err(ExpressionError::DivisionByZero),
        BinaryOp::Div => x / y,
        BinaryOp::Rem if y == 0.0 => return Err(ExpressionError::DivisionByZero),
        BinaryOp::Rem => x % y,
        other => {
            return Err(ExpressionError::Type {
                message: format!("{other:?} is not an arithmetic operator"),
            });
        }
    };
    Ok(number(result))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Pipe,
}

fn syntax(position: usize, message: impl Into<String>) -> ExpressionError {
    ExpressionError::Syntax {
        position,
        message: message.into(),
    }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c.is_ascii_digit() {
            let mut end = pos;
            while let Some(&(i, d)) = chars.peek() {
                if !(d.is_ascii_digit() || d == '.') {
                    break;
                }
                end = i + d.len_utf8();
                chars.next();
            }
            let text = &source[pos..end];
            let n = text
                .parse::<f64>()
                .map_err(|_| syntax(pos, format!("invalid number '{text}'")))?;
            tokens.push((pos, Token::Number(n)));
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let mut end = pos;
            while let Some(&(i, d)) = chars.peek() {
                if !(d.is_alphanumeric() || d == '_') {
                    break;
                }
                end = i + d.len_utf8();
                chars.next();
            }
            tokens.push((pos, Token::Ident(source[pos..end].to_string())));
            continue;
        }

        chars.next();
        let token = match c {
            '\'' | '"' => {
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, d)) = chars.next() {
                    match d {
                        '\\' => {
                            if let Some((_, escaped)) = chars.next() {
                                text.push(escaped);
                            }
                        }
                        d if d == c => {
                            closed = true;
                            break;
                        }
                        d => text.push(d),
                    }
                }
                if !closed {
                    return Err(syntax(pos, "unterminated string"));
                }
                Token::Str(text)
            }
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            '.' => Token::Dot,
            '|' => Token::Pipe,
            '+' => Token::Op("+"),
            '-' => Token::Op("-"),
            '*' => Token::Op("*"),
            '/' => Token::Op("/"),
            '%' => Token::Op("%"),
            '=' | '!' | '<' | '>' => {
                let followed_by_eq = chars.peek().is_some_and(|&(_, d)| d == '=');
                if followed_by_eq {
                    chars.next();
                }
                match (c, followed_by_eq) {
                    ('=', true) => Token::Op("=="),
                    ('!', true) => Token::Op("!="),
                    ('<', true) => Token::Op("<="),
                    ('>', true) => Token::Op(">="),
                    ('<', false) => Token::Op("<"),
                    ('>', false) => Token::Op(">"),
                    _ => return Err(syntax(pos, format!("unexpected '{c}'"))),
                }
            }
            other => return Err(syntax(pos, format!("unexpected '{other}'"))),
        };
        tokens.push((pos, token));
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    index: usize,
    end: usize,
}

impl Parser {
    fn new(source: &str) -> Result<Self, ExpressionError> {
        Ok(Self {
            tokens: tokenize(source)?,
            index: 0,
            end: source.len(),
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.index).map_or(self.end, |(p, _)| *p)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).map(|(_, t)| t.clone());
        self.index += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(name)) if name == keyword) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn peek_keyword(&self, offset: usize, keyword: &str) -> bool {
        matches!(self.tokens.get(self.index + offset), Some((_, Token::Ident(name))) if name == keyword)
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), ExpressionError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(syntax(self.position(), format!("expected {what}")))
        }
    }

    fn expect_end(&self) -> Result<(), ExpressionError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(syntax(self.position(), format!("unexpected {token:?}"))),
        }
    }

    fn identifier(&mut self) -> Result<String, ExpressionError> {
        let position = self.position();
        match self.advance() {
            Some(Token::Ident(name)) => Ok(name),
            _ => Err(syntax(position, "expected a name")),
        }
    }

    fn expression(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.and_expr()?;
        while self.eat_keyword("or") {
            let rhs = self.and_expr()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.not_expr()?;
        while self.eat_keyword("and") {
            let rhs = self.not_expr()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat_keyword("not") {
            return Ok(Expr::Not(Box::new(self.not_expr()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ExpressionError> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(Token::Op("==")) => BinaryOp::Eq,
            Some(Token::Op("!=")) => BinaryOp::Ne,
            Some(Token::Op("<")) => BinaryOp::Lt,
            Some(Token::Op("<=")) => BinaryOp::Le,
            Some(Token::Op(">")) => BinaryOp::Gt,
            Some(Token::Op(">=")) => BinaryOp::Ge,
            _ if self.peek_keyword(0, "in") => BinaryOp::In,
            _ if self.peek_keyword(0, "not") && self.peek_keyword(1, "in") => {
                self.index += 1;
                BinaryOp::NotIn
            }
            _ => return Ok(lhs),
        };
        self.index += 1;
        let rhs = self.additive()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn additive(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("+")) => BinaryOp::Add,
                Some(Token::Op("-")) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.index += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("*")) => BinaryOp::Mul,
                Some(Token::Op("/")) => BinaryOp::Div,
                Some(Token::Op("%")) => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.index += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&Token::Op("-")) {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.primary()?;
        while self.eat(&Token::Dot) {
            let field = self.identifier()?;
            expr = Expr::Attribute(Box::new(expr), field);
        }
        Ok(expr)
    }

    fn arguments(&mut self, close: &Token) -> Result<Vec<Expr>, ExpressionError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(&Token::Comma, "',' or closing bracket")?;
        }
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let position = self.position();
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(JsonValue::String(s))),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::LBracket) => Ok(Expr::List(self.arguments(&Token::RBracket)?)),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" | "True" => Ok(Expr::Literal(JsonValue::Bool(true))),
                "false" | "False" => Ok(Expr::Literal(JsonValue::Bool(false))),
                "none" | "None" | "null" => Ok(Expr::Literal(JsonValue::Null)),
                "and" | "or" | "not" | "in" => {
                    Err(syntax(position, format!("unexpected keyword '{name}'")))
                }
                _ if self.eat(&Token::LParen) => {
                    Ok(Expr::Call(name, self.arguments(&Token::RParen)?))
                }
                _ => Ok(Expr::Variable(name)),
            },
            Some(token) => Err(syntax(position, format!("unexpected {token:?}"))),
            None => Err(syntax(position, "unexpected end of expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct TestScope(BTreeMap<String, JsonValue>);

    impl Scope for TestScope {
        fn variable(&self, name: &str) -> Option<JsonValue> {
            self.0.get(name).cloned()
        }

        fn call(&self, name: &str, args: &[JsonValue]) -> Result<JsonValue, ExpressionError> {
            match name {
                "len" => Ok(json!(args.len())),
                _ => Err(ExpressionError::UnknownFunction {
                    name: name.to_string(),
                }),
            }
        }
    }

    fn scope() -> TestScope {
        let mut vars = BTreeMap::new();
        vars.insert("ratio".to_string(), json!(0.4));
        vars.insert("count".to_string(), json!(3));
        vars.insert("name".to_string(), json!("Ada"));
        vars.insert("empty".to_string(), json!(""));
        vars.insert("question".to_string(), json!({"title": "Welches Handy?", "required": true}));
        vars.insert("damages".to_string(), json!(["display", "battery"]));
        TestScope(vars)
    }

    fn eval(source: &str) -> JsonValue {
        Expr::parse(source)
            .unwrap_or_else(|e| panic!("{source}: {e}"))
            .eval(&scope())
            .unwrap_or_else(|e| panic!("{source}: {e}"))
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(eval("1 + 2 * 3"), json!(7));
        assert_eq!(eval("(1 + 2) * 3"), json!(9));
        assert_eq!(eval("count - 1 - 1"), json!(1));
        assert_eq!(eval("7 % 4"), json!(3));
        assert_eq!(eval("1 / 4"), json!(0.25));
        assert_eq!(eval("-count"), json!(-3));
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(eval("ratio > 0.3 and count == 3"), json!(true));
        assert_eq!(eval("ratio > 0.5 or count != 3"), json!(false));
        assert_eq!(eval("not empty"), json!(true));
        assert_eq!(eval("3 == 3.0"), json!(true));
        assert_eq!(eval("'a' < 'b'"), json!(true));
    }

    #[test]
    fn or_returns_first_truthy_operand() {
        assert_eq!(eval("empty or name"), json!("Ada"));
        assert_eq!(eval("name or 'du'"), json!("Ada"));
    }

    #[test]
    fn membership() {
        assert_eq!(eval("'display' in damages"), json!(true));
        assert_eq!(eval("'screen' not in damages"), json!(true));
        assert_eq!(eval("'Han' in question.title"), json!(true));
        assert_eq!(eval("'title' in question"), json!(true));
    }

    #[test]
    fn attributes_and_lists() {
        assert_eq!(eval("question.title"), json!("Welches Handy?"));
        assert_eq!(eval("question.missing"), JsonValue::Null);
        assert_eq!(eval("[1, 'two', true]"), json!([1, "two", true]));
        assert_eq!(eval("len(1, 2)"), json!(2));
    }

    #[test]
    fn keywords_accept_python_spelling() {
        assert_eq!(eval("True and not False"), json!(true));
        assert_eq!(eval("None"), JsonValue::Null);
    }

    #[test]
    fn unknown_names_are_errors() {
        let err = Expr::parse("nope > 1")
            .expect("parses")
            .eval(&scope())
            .expect_err("unknown");
        assert_eq!(err, ExpressionError::UnknownVariable { name: "nope".to_string() });

        let err = Expr::parse("__import__('os')")
            .expect("parses")
            .eval(&scope())
            .expect_err("unknown");
        assert!(matches!(err, ExpressionError::UnknownFunction { .. }));
    }

    #[test]
    fn type_errors_and_division_by_zero() {
        let s = scope();
        let err = Expr::parse("name > 1").expect("parses").eval(&s).expect_err("type");
        assert!(matches!(err, ExpressionError::Type { .. }));
        let err = Expr::parse("1 / 0").expect("parses").eval(&s).expect_err("zero");
        assert_eq!(err, ExpressionError::DivisionByZero);
    }

    #[test]
    fn syntax_errors_report_position() {
        let err = Expr::parse("1 +").expect_err("incomplete");
        assert!(matches!(err, ExpressionError::Syntax { position: 3, .. }));
        assert!(Expr::parse("'open").is_err());
        assert!(Expr::parse("a = b").is_err());
        assert!(Expr::parse("a b").is_err());
    }

    #[test]
    fn filters_follow_pipes() {
        let (expr, filters) = Expr::parse_with_filters("question.title | bold | upper").expect("parses");
        assert_eq!(filters, ["bold", "upper"]);
        assert_eq!(expr.eval(&scope()).expect("evaluates"), json!("Welches Handy?"));
    }

    #[test]
    fn plain_maps_are_scopes() {
        let mut vars = HashMap::new();
        vars.insert("x".to_string(), json!(2));
        assert!(Expr::parse("x * 2 == 4").expect("parses").is_satisfied(&vars).expect("evaluates"));
    }
}
