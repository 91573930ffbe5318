//! Formula parser
//!
//! A tokenizer followed by a recursive descent parser for Excel formulas.
//!
//! Precedence (lowest to highest):
//! 1. Comparison: =, <>, <, <=, >, >=
//! 2. Concatenation: &
//! 3. Addition/Subtraction: +, -
//! 4. Multiplication/Division: *, /
//! 5. Exponentiation: ^ (left associative)
//! 6. Postfix percent: %
//! 7. Prefix sign: -, +
//! 8. Reference operators: union (`,` inside parentheses) < intersection (space) < range (`:`)
//! 9. Primary: literals, references, names, function calls, parentheses, arrays

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use lazy_regex::regex;
use sheetcalc_core::{CellError, CellRange, CellValue, Qualifier, Reference};

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use sheetcalc_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("=SUM(A1:A10)").unwrap();
/// let ast = parse_formula("=IF(A1>0,\"Yes\",\"No\")").unwrap();
/// let ast = parse_formula("=SUM(B1:D1 (B1:D1,B1:C1))").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let formula = formula.trim();

    // Formula must start with '='
    let body = formula
        .strip_prefix('=')
        .ok_or_else(|| FormulaError::Parse("Formula must start with '='".into()))?;

    let tokens = tokenize(body)?;
    let mut parser = FormulaParser::new(tokens);
    let expr = parser.parse_expression()?;

    // Make sure we consumed all input
    if !matches!(parser.current().kind, TokenKind::Eof) {
        return Err(FormulaError::Parse(format!(
            "Unexpected {:?} after expression in '{}'",
            parser.current().kind,
            formula
        )));
    }

    Ok(expr)
}

/// Check if cell text is a formula rather than a literal
pub fn is_formula(text: &str) -> bool {
    text.len() > 1 && text.starts_with('=')
}

/// Interpret non-formula cell text as a constant
///
/// Booleans, numbers and error literals are recognised, everything else
/// stays text.
pub fn parse_literal(text: &str) -> CellValue {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("TRUE") {
        return CellValue::Boolean(true);
    }
    if trimmed.eq_ignore_ascii_case("FALSE") {
        return CellValue::Boolean(false);
    }
    if let Some(err) = CellError::parse(trimmed) {
        return CellValue::Error(err);
    }
    if !trimmed.is_empty() {
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return CellValue::Number(n);
            }
        }
    }
    CellValue::String(text.to_string())
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),

    // References and identifiers
    /// Cell, range, row range, column range, possibly sheet/book qualified
    Reference(Reference),
    /// Defined name, possibly book qualified
    Name { book: Option<String>, name: String },
    /// Function name, always directly followed by `(`
    Function(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,
    Comma,
    Semicolon,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,

    // End of input
    Eof,
}

/// A lexical unit plus whether whitespace preceded it
///
/// Whitespace is significant: between two reference operands it is the
/// intersection operator.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub space_before: bool,
}

/// Error literals, longest first so prefixes never shadow a longer match
const ERROR_LITERALS: [&str; 10] = [
    "#GETTING_DATA",
    "#CIRCULAR!",
    "#DIV/0!",
    "#VALUE!",
    "#SPILL!",
    "#NULL!",
    "#NAME?",
    "#NUM!",
    "#REF!",
    "#N/A",
];

/// Split formula text (without the leading `=`) into tokens
///
/// The last token is always [`TokenKind::Eof`].
pub fn tokenize(input: &str) -> FormulaResult<Vec<Token>> {
    let mut lexer = Lexer { input, pos: 0 };
    let mut tokens = Vec::new();
    loop {
        let space_before = lexer.skip_whitespace();
        let kind = lexer.scan_token()?;
        let done = matches!(kind, TokenKind::Eof);
        tokens.push(Token { kind, space_before });
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.rest().chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
        self.pos > start
    }

    fn error(&self, msg: &str) -> FormulaError {
        FormulaError::Parse(format!("{} at offset {} in '{}'", msg, self.pos, self.input))
    }

    fn scan_token(&mut self) -> FormulaResult<TokenKind> {
        let Some(c) = self.peek_char() else {
            return Ok(TokenKind::Eof);
        };

        let single = match c {
            '+' => Some(TokenKind::Plus),
            '-' => Some(TokenKind::Minus),
            '*' => Some(TokenKind::Star),
            '/' => Some(TokenKind::Slash),
            '^' => Some(TokenKind::Caret),
            '%' => Some(TokenKind::Percent),
            '&' => Some(TokenKind::Ampersand),
            ':' => Some(TokenKind::Colon),
            ',' => Some(TokenKind::Comma),
            ';' => Some(TokenKind::Semicolon),
            '(' => Some(TokenKind::LeftParen),
            ')' => Some(TokenKind::RightParen),
            '{' => Some(TokenKind::LeftBrace),
            '}' => Some(TokenKind::RightBrace),
            '=' => Some(TokenKind::Equal),
            _ => None,
        };
        if let Some(kind) = single {
            self.advance();
            return Ok(kind);
        }

        // Two-character operators
        if c == '<' {
            self.advance();
            return Ok(match self.peek_char() {
                Some('=') => {
                    self.advance();
                    TokenKind::LessEqual
                }
                Some('>') => {
                    self.advance();
                    TokenKind::NotEqual
                }
                _ => TokenKind::LessThan,
            });
        }
        if c == '>' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Ok(TokenKind::GreaterEqual);
            }
            return Ok(TokenKind::GreaterThan);
        }

        match c {
            '"' => self.scan_string(),
            '#' => self.scan_error(),
            '\'' => self.scan_quoted_reference(),
            c if c.is_ascii_digit() || c == '.' => {
                if let Some(token) = self.scan_prefixed_reference()? {
                    return Ok(token);
                }
                if let Some(token) = self.scan_reference_body(Qualifier::default())? {
                    return Ok(token);
                }
                self.scan_number()
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' || c == '\\' || c == '[' => {
                if let Some(token) = self.scan_prefixed_reference()? {
                    return Ok(token);
                }
                match self.scan_reference_body(Qualifier::default())? {
                    Some(token) => Ok(token),
                    None => Err(self.error("Unexpected character")),
                }
            }
            _ => Err(self.error(&format!("Unexpected character '{}'", c))),
        }
    }

    fn scan_string(&mut self) -> FormulaResult<TokenKind> {
        self.advance(); // Skip opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                Some('"') => {
                    // Check for escaped quote ("")
                    if self.peek_char_at(1) == Some('"') {
                        s.push('"');
                        self.advance();
                        self.advance();
                    } else {
                        self.advance();
                        return Ok(TokenKind::String(s));
                    }
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
                None => return Err(self.error("Unterminated string literal")),
            }
        }
    }

    fn scan_error(&mut self) -> FormulaResult<TokenKind> {
        let rest = self.rest();
        for literal in ERROR_LITERALS {
            let matches = rest
                .get(..literal.len())
                .map_or(false, |head| head.eq_ignore_ascii_case(literal));
            if matches {
                self.pos += literal.len();
                if let Some(err) = CellError::parse(literal) {
                    return Ok(TokenKind::Error(err));
                }
            }
        }
        Err(self.error("Unknown error literal"))
    }

    fn scan_number(&mut self) -> FormulaResult<TokenKind> {
        let Some(m) = regex!(r"^(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?").find(self.rest())
        else {
            return Err(self.error("Invalid number"));
        };
        let text = m.as_str();
        let num: f64 = text
            .parse()
            .map_err(|_| self.error(&format!("Invalid number '{}'", text)))?;
        self.pos += m.end();
        Ok(TokenKind::Number(num))
    }

    /// `'[book]sheet name'!` followed by a reference body
    fn scan_quoted_reference(&mut self) -> FormulaResult<TokenKind> {
        let start = self.pos;
        self.advance(); // Skip opening quote
        loop {
            match self.peek_char() {
                Some('\'') if self.peek_char_at(1) == Some('\'') => {
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(_) => self.advance(),
                None => return Err(self.error("Unterminated quoted sheet name")),
            }
        }
        if self.peek_char() != Some('!') {
            return Err(self.error("Expected '!' after quoted sheet name"));
        }
        self.advance();

        let (qualifier, _) = Qualifier::split(&self.input[start..self.pos])?;
        match self.scan_reference_body(qualifier)? {
            Some(token) => Ok(token),
            None => Err(self.error("Expected reference after sheet name")),
        }
    }

    /// Unquoted `Sheet1!`, `[book]Sheet1!` or `Sheet1:Sheet3!` followed by a
    /// reference body
    fn scan_prefixed_reference(&mut self) -> FormulaResult<Option<TokenKind>> {
        let Some(m) =
            regex!(r"^(?:\[[^\]]+\])?[A-Za-z0-9_.]*(?::[A-Za-z0-9_.]+)?!").find(self.rest())
        else {
            return Ok(None);
        };
        let prefix = m.as_str();
        let (qualifier, _) = Qualifier::split(prefix)?;
        self.pos += m.end();
        match self.scan_reference_body(qualifier)? {
            Some(token) => Ok(Some(token)),
            None => Err(self.error("Expected reference after sheet name")),
        }
    }

    /// An address form, a `#REF!`, a name or a function name
    fn scan_reference_body(&mut self, qualifier: Qualifier) -> FormulaResult<Option<TokenKind>> {
        let rest = self.rest();
        let qualified = qualifier.book.is_some() || qualifier.sheet.is_some();

        if qualified && rest.get(..5).map_or(false, |h| h.eq_ignore_ascii_case("#REF!")) {
            self.pos += 5;
            return Ok(Some(TokenKind::Error(CellError::Ref)));
        }

        let address = [
            regex!(r"^\$?[A-Za-z]{1,3}\$?[0-9]+:\$?[A-Za-z]{1,3}\$?[0-9]+"),
            regex!(r"^\$?[A-Za-z]{1,3}:\$?[A-Za-z]{1,3}"),
            regex!(r"^\$?[0-9]+:\$?[0-9]+"),
            regex!(r"^\$?[A-Za-z]{1,3}\$?[0-9]+"),
        ];
        for pattern in address {
            let Some(m) = pattern.find(rest) else {
                continue;
            };
            if !at_word_boundary(&rest[m.end()..]) {
                continue;
            }
            let Ok(range) = CellRange::parse(m.as_str()) else {
                continue;
            };
            self.pos += m.end();
            let mut reference = Reference::new(range);
            reference.book = qualifier.book;
            reference.sheet = qualifier.sheet;
            reference.last_sheet = qualifier.last_sheet;
            return Ok(Some(TokenKind::Reference(reference)));
        }

        let Some(m) = regex!(r"^[A-Za-z_\\][A-Za-z0-9_.\\]*").find(rest) else {
            return Ok(None);
        };
        let word = m.as_str();
        self.pos += m.end();

        // Function call only when '(' follows immediately
        if self.peek_char() == Some('(') {
            return Ok(Some(TokenKind::Function(normalize_function_name(word))));
        }

        let upper = word.to_uppercase();
        if !qualified && upper == "TRUE" {
            return Ok(Some(TokenKind::Boolean(true)));
        }
        if !qualified && upper == "FALSE" {
            return Ok(Some(TokenKind::Boolean(false)));
        }
        Ok(Some(TokenKind::Name {
            book: qualifier.book,
            name: upper,
        }))
    }
}

fn at_word_boundary(rest: &str) -> bool {
    !rest
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '(' | '\\' | '$'))
}

/// Upper-case a function name and drop the future-function prefixes Excel
/// writes into files (`_xlfn.CONCAT` is `CONCAT`)
pub fn normalize_function_name(name: &str) -> String {
    let upper = name.to_uppercase();
    for prefix in ["_XLFN._XLWS.", "_XLFN.", "_XLWS."] {
        if let Some(stripped) = upper.strip_prefix(prefix) {
            return stripped.to_string();
        }
    }
    upper
}

/// Formula parser
struct FormulaParser {
    tokens: Vec<Token>,
    pos: usize,
}

const EOF_TOKEN: Token = Token {
    kind: TokenKind::Eof,
    space_before: false,
};

impl FormulaParser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    // === Helper methods ===

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&EOF_TOKEN)
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn consume(&mut self) -> TokenKind {
        let kind = self.current_kind().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn expect(&mut self, expected: &TokenKind) -> FormulaResult<()> {
        if self.current_kind() == expected {
            self.consume();
            Ok(())
        } else {
            Err(FormulaError::Parse(format!(
                "Expected {:?}, got {:?}",
                expected,
                self.current_kind()
            )))
        }
    }

    // === Expression parsing with precedence ===

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let op = match self.current_kind() {
                TokenKind::Equal => BinaryOperator::Equal,
                TokenKind::NotEqual => BinaryOperator::NotEqual,
                TokenKind::LessThan => BinaryOperator::LessThan,
                TokenKind::LessEqual => BinaryOperator::LessEqual,
                TokenKind::GreaterThan => BinaryOperator::GreaterThan,
                TokenKind::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume();
            let right = self.parse_concatenation()?;
            left = FormulaExpr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while matches!(self.current_kind(), TokenKind::Ampersand) {
            self.consume();
            let right = self.parse_additive()?;
            left = FormulaExpr::binary(BinaryOperator::Concat, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_kind() {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            let right = self.parse_multiplicative()?;
            left = FormulaExpr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match self.current_kind() {
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.consume();
            let right = self.parse_exponent()?;
            left = FormulaExpr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_exponent(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_percent()?;

        // Excel evaluates 2^3^2 as (2^3)^2
        while matches!(self.current_kind(), TokenKind::Caret) {
            self.consume();
            let right = self.parse_percent()?;
            left = FormulaExpr::binary(BinaryOperator::Power, left, right);
        }

        Ok(left)
    }

    fn parse_percent(&mut self) -> FormulaResult<FormulaExpr> {
        let mut expr = self.parse_prefix()?;

        while matches!(self.current_kind(), TokenKind::Percent) {
            self.consume();
            expr = FormulaExpr::unary(UnaryOperator::Percent, expr);
        }

        Ok(expr)
    }

    fn parse_prefix(&mut self) -> FormulaResult<FormulaExpr> {
        match self.current_kind() {
            TokenKind::Minus => {
                self.consume();
                let operand = self.parse_prefix()?;
                Ok(FormulaExpr::unary(UnaryOperator::Negate, operand))
            }
            // Prefix plus (no-op)
            TokenKind::Plus => {
                self.consume();
                self.parse_prefix()
            }
            _ => self.parse_intersection(),
        }
    }

    fn parse_intersection(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_range()?;

        while self.current().space_before
            && may_be_reference(&left)
            && self.starts_reference_operand()
        {
            let right = self.parse_range()?;
            if !may_be_reference(&right) {
                return Err(FormulaError::Parse(
                    "Intersection operands must be references".into(),
                ));
            }
            left = FormulaExpr::binary(BinaryOperator::Intersect, left, right);
        }

        Ok(left)
    }

    fn starts_reference_operand(&self) -> bool {
        matches!(
            self.current_kind(),
            TokenKind::Reference(_)
                | TokenKind::Name { .. }
                | TokenKind::Function(_)
                | TokenKind::LeftParen
        )
    }

    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_primary()?;

        while matches!(self.current_kind(), TokenKind::Colon) {
            self.consume();
            let right = self.parse_primary()?;
            left = merge_range(left, right);
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.consume() {
            TokenKind::Number(n) => Ok(FormulaExpr::Number(n)),
            TokenKind::String(s) => Ok(FormulaExpr::String(s)),
            TokenKind::Boolean(b) => Ok(FormulaExpr::Boolean(b)),
            TokenKind::Error(e) => Ok(FormulaExpr::Error(e)),
            TokenKind::Reference(r) => Ok(FormulaExpr::Reference(r)),
            TokenKind::Name { book, name } => Ok(FormulaExpr::NameRef { book, name }),
            TokenKind::Function(name) => self.parse_function_call(name),
            TokenKind::LeftParen => {
                let mut expr = self.parse_expression()?;
                // A comma inside plain parentheses is the union operator
                while matches!(self.current_kind(), TokenKind::Comma) {
                    self.consume();
                    let right = self.parse_expression()?;
                    expr = FormulaExpr::binary(BinaryOperator::Union, expr, right);
                }
                self.expect(&TokenKind::RightParen)?;
                Ok(expr)
            }
            TokenKind::LeftBrace => self.parse_array(),
            other => Err(FormulaError::Parse(format!("Unexpected token: {:?}", other))),
        }
    }

    fn parse_array(&mut self) -> FormulaResult<FormulaExpr> {
        let mut rows: Vec<Vec<CellValue>> = Vec::new();
        let mut current_row = vec![self.parse_array_constant()?];

        loop {
            match self.consume() {
                TokenKind::Comma => current_row.push(self.parse_array_constant()?),
                TokenKind::Semicolon => {
                    rows.push(std::mem::take(&mut current_row));
                    current_row.push(self.parse_array_constant()?);
                }
                TokenKind::RightBrace => break,
                other => {
                    return Err(FormulaError::Parse(format!(
                        "Expected ',' ';' or '}}' in array, got {:?}",
                        other
                    )))
                }
            }
        }
        rows.push(current_row);

        let width = rows[0].len();
        if rows.iter().any(|row| row.len() != width) {
            return Err(FormulaError::Parse(
                "Array rows must have the same number of columns".into(),
            ));
        }

        Ok(FormulaExpr::Array(rows))
    }

    fn parse_array_constant(&mut self) -> FormulaResult<CellValue> {
        let mut sign = 1.0;
        loop {
            match self.consume() {
                TokenKind::Minus => sign = -sign,
                TokenKind::Plus => {}
                TokenKind::Number(n) => return Ok(CellValue::Number(sign * n)),
                TokenKind::String(s) if sign > 0.0 => return Ok(CellValue::String(s)),
                TokenKind::Boolean(b) if sign > 0.0 => return Ok(CellValue::Boolean(b)),
                TokenKind::Error(e) if sign > 0.0 => return Ok(CellValue::Error(e)),
                other => {
                    return Err(FormulaError::Parse(format!(
                        "Array literals may only contain constants, got {:?}",
                        other
                    )))
                }
            }
        }
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        self.expect(&TokenKind::LeftParen)?;

        let mut args = Vec::new();

        if matches!(self.current_kind(), TokenKind::RightParen) {
            self.consume();
            return Ok(FormulaExpr::Function { name, args });
        }

        loop {
            // Omitted arguments (`IF(A1,,2)`, `IFS(TRUE,)`)
            if matches!(
                self.current_kind(),
                TokenKind::Comma | TokenKind::RightParen
            ) {
                args.push(FormulaExpr::Missing);
            } else {
                args.push(self.parse_expression()?);
            }

            match self.consume() {
                TokenKind::Comma => continue,
                TokenKind::RightParen => break,
                other => {
                    return Err(FormulaError::Parse(format!(
                        "Expected ',' or ')' in call to {}, got {:?}",
                        name, other
                    )))
                }
            }
        }

        Ok(FormulaExpr::Function { name, args })
    }
}

/// Fold `left:right` into one bounding reference when both sides are static
/// references on the same sheet
fn merge_range(left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
    if let (FormulaExpr::Reference(l), FormulaExpr::Reference(r)) = (&left, &right) {
        let r = if r.sheet.is_none() && r.book.is_none() {
            l.with_range(r.range)
        } else {
            r.clone()
        };
        if let Some(merged) = l.bounding(&r) {
            return FormulaExpr::Reference(merged);
        }
    }
    FormulaExpr::binary(BinaryOperator::Range, left, right)
}

/// References, reference operators and function calls (`INDEX` returns a
/// reference); literals and arithmetic never do
fn may_be_reference(expr: &FormulaExpr) -> bool {
    expr.is_reference() || matches!(expr, FormulaExpr::Function { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reference(s: &str) -> FormulaExpr {
        FormulaExpr::Reference(Reference::parse(s).unwrap())
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_formula("=42").unwrap(), FormulaExpr::Number(42.0));
        assert_eq!(parse_formula("=2.5").unwrap(), FormulaExpr::Number(2.5));
        assert_eq!(parse_formula("=1e10").unwrap(), FormulaExpr::Number(1e10));
        assert_eq!(parse_formula("=.5").unwrap(), FormulaExpr::Number(0.5));
    }

    #[test]
    fn test_parse_string() {
        let ast = parse_formula("=\"Hello\"").unwrap();
        assert_eq!(ast, FormulaExpr::String("Hello".into()));

        let ast = parse_formula("=\" \"\" a\"").unwrap();
        assert_eq!(ast, FormulaExpr::String(" \" a".into()));

        assert!(parse_formula("=\"open").is_err());
    }

    #[test]
    fn test_parse_boolean_and_error() {
        assert_eq!(parse_formula("=TRUE").unwrap(), FormulaExpr::Boolean(true));
        assert_eq!(parse_formula("=false").unwrap(), FormulaExpr::Boolean(false));
        assert_eq!(
            parse_formula("=#DIV/0!").unwrap(),
            FormulaExpr::Error(CellError::Div0)
        );
        assert_eq!(parse_formula("=#N/A").unwrap(), FormulaExpr::Error(CellError::Na));
        assert_eq!(
            parse_formula("=TRUE()").unwrap(),
            FormulaExpr::Function {
                name: "TRUE".into(),
                args: vec![]
            }
        );
    }

    #[test]
    fn test_parse_arithmetic_precedence() {
        let ast = parse_formula("=1+2*3").unwrap();
        assert_eq!(
            ast,
            FormulaExpr::binary(
                BinaryOperator::Add,
                FormulaExpr::Number(1.0),
                FormulaExpr::binary(
                    BinaryOperator::Multiply,
                    FormulaExpr::Number(2.0),
                    FormulaExpr::Number(3.0)
                )
            )
        );
    }

    #[test]
    fn test_prefix_minus_binds_tighter_than_power() {
        let ast = parse_formula("=-2^2").unwrap();
        assert_eq!(
            ast,
            FormulaExpr::binary(
                BinaryOperator::Power,
                FormulaExpr::unary(UnaryOperator::Negate, FormulaExpr::Number(2.0)),
                FormulaExpr::Number(2.0)
            )
        );
    }

    #[test]
    fn test_power_is_left_associative() {
        let ast = parse_formula("=2^3^2").unwrap();
        assert_eq!(
            ast,
            FormulaExpr::binary(
                BinaryOperator::Power,
                FormulaExpr::binary(
                    BinaryOperator::Power,
                    FormulaExpr::Number(2.0),
                    FormulaExpr::Number(3.0)
                ),
                FormulaExpr::Number(2.0)
            )
        );
    }

    #[test]
    fn test_percent_then_add() {
        let ast = parse_formula("=INT(1)%+3").unwrap();
        assert_eq!(
            ast,
            FormulaExpr::binary(
                BinaryOperator::Add,
                FormulaExpr::unary(
                    UnaryOperator::Percent,
                    FormulaExpr::Function {
                        name: "INT".into(),
                        args: vec![FormulaExpr::Number(1.0)]
                    }
                ),
                FormulaExpr::Number(3.0)
            )
        );
    }

    #[test]
    fn test_comparison_with_negated_reference() {
        let ast = parse_formula("=A2 =-A3").unwrap();
        assert_eq!(
            ast,
            FormulaExpr::binary(
                BinaryOperator::Equal,
                reference("A2"),
                FormulaExpr::unary(UnaryOperator::Negate, reference("A3"))
            )
        );
    }

    #[test]
    fn test_parse_references() {
        assert_eq!(parse_formula("=$B$2").unwrap(), reference("B2"));
        assert_eq!(parse_formula("=A1:B10").unwrap(), reference("A1:B10"));
        assert_eq!(parse_formula("=A:C").unwrap(), reference("A:C"));
        assert_eq!(parse_formula("=4:7").unwrap(), reference("4:7"));
        assert_eq!(
            parse_formula("=Sheet2!A1:B2").unwrap(),
            reference("SHEET2!A1:B2")
        );
        assert_eq!(
            parse_formula("='[excel.xlsx]My Data'!C3").unwrap(),
            reference("'[EXCEL.XLSX]MY DATA'!C3")
        );
        assert_eq!(
            parse_formula("=[b.xlsx]S!A1").unwrap(),
            reference("'[B.XLSX]S'!A1")
        );
        assert_eq!(
            parse_formula("=Sheet1:Sheet3!A1").unwrap(),
            reference("SHEET1:SHEET3!A1")
        );
    }

    #[test]
    fn test_static_range_merge_is_bounding_box() {
        assert_eq!(parse_formula("=B8:D8:F7:H8").unwrap(), reference("B7:H8"));
        assert_eq!(parse_formula("=S!A1:B2:C3").unwrap(), reference("S!A1:C3"));
    }

    #[test]
    fn test_function_name_is_not_a_cell() {
        let ast = parse_formula("=LOG10(100)").unwrap();
        assert!(matches!(ast, FormulaExpr::Function { ref name, .. } if name == "LOG10"));

        let ast = parse_formula("=_xlfn.CONCAT(1,2)").unwrap();
        assert!(matches!(ast, FormulaExpr::Function { ref name, .. } if name == "CONCAT"));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(
            parse_formula("=REF").unwrap(),
            FormulaExpr::NameRef {
                book: None,
                name: "REF".into()
            }
        );
        assert_eq!(
            parse_formula("='[excel.xlsx]DATA'!INPUT_A").unwrap(),
            FormulaExpr::NameRef {
                book: Some("EXCEL.XLSX".into()),
                name: "INPUT_A".into()
            }
        );
        // Past the last column is a name, not an address
        assert!(matches!(
            parse_formula("=XFE1").unwrap(),
            FormulaExpr::NameRef { .. }
        ));
    }

    #[test]
    fn test_whitespace_intersection() {
        let ast = parse_formula("=A2 A3").unwrap();
        assert_eq!(
            ast,
            FormulaExpr::binary(BinaryOperator::Intersect, reference("A2"), reference("A3"))
        );
    }

    #[test]
    fn test_intersection_with_parenthesised_union() {
        let ast = parse_formula("=SUM(B1:D1  (  B1:B2  ,  D1:D2  ))").unwrap();
        let FormulaExpr::Function { name, args } = ast else {
            panic!("Expected Function");
        };
        assert_eq!(name, "SUM");
        assert_eq!(
            args,
            vec![FormulaExpr::binary(
                BinaryOperator::Intersect,
                reference("B1:D1"),
                FormulaExpr::binary(
                    BinaryOperator::Union,
                    reference("B1:B2"),
                    reference("D1:D2")
                )
            )]
        );
    }

    #[test]
    fn test_intersection_needs_references() {
        assert!(parse_formula("=1 (A1)").is_err());
        assert!(parse_formula("=A1 (1)").is_err());
        assert!(parse_formula("=SUM(\"x\" A1)").is_err());
        assert!(parse_formula("=INDEX(A1:B2,1) (A1:A2)").is_ok());
        assert!(parse_formula("=(A1:B2) INPUT_A").is_ok());
    }

    #[test]
    fn test_spaces_around_arithmetic_are_not_intersections() {
        let ast = parse_formula("=( 1 + 2 + 3)*(4 + 5)^(1/5)").unwrap();
        assert!(matches!(
            ast,
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_missing_arguments() {
        let ast = parse_formula("=IFS(FALSE,\"FIRST\",TRUE,)").unwrap();
        let FormulaExpr::Function { args, .. } = ast else {
            panic!("Expected Function");
        };
        assert_eq!(args.len(), 4);
        assert_eq!(args[3], FormulaExpr::Missing);

        let ast = parse_formula("=IF(A1,,2)").unwrap();
        let FormulaExpr::Function { args, .. } = ast else {
            panic!("Expected Function");
        };
        assert_eq!(args[1], FormulaExpr::Missing);
    }

    #[test]
    fn test_parse_array() {
        let ast = parse_formula("={1,-0.2,0}").unwrap();
        assert_eq!(
            ast,
            FormulaExpr::Array(vec![vec![
                CellValue::Number(1.0),
                CellValue::Number(-0.2),
                CellValue::Number(0.0)
            ]])
        );

        let ast = parse_formula("={1,\"a\";TRUE,#N/A}").unwrap();
        assert_eq!(
            ast,
            FormulaExpr::Array(vec![
                vec![CellValue::Number(1.0), CellValue::from("a")],
                vec![CellValue::Boolean(true), CellValue::Error(CellError::Na)],
            ])
        );
    }

    #[test]
    fn test_ragged_array_is_parse_error() {
        assert!(parse_formula("={1,2;3}").is_err());
        assert!(parse_formula("={A1}").is_err());
        assert!(parse_formula("={}").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_formula("1+2").is_err());
        assert!(parse_formula("=1+").is_err());
        assert!(parse_formula("=SUM(1").is_err());
        assert!(parse_formula("=1 2").is_err());
        assert!(parse_formula("=(1").is_err());
    }

    #[test]
    fn test_references_in_order() {
        let ast = parse_formula("=IF(A1>0,SUM(B1:B10),C1)").unwrap();
        let refs: Vec<String> = ast.references().iter().map(|r| r.to_string()).collect();
        assert_eq!(refs, vec!["A1", "B1:B10", "C1"]);
    }

    #[test]
    fn test_literals() {
        assert!(is_formula("=1"));
        assert!(!is_formula("="));
        assert!(!is_formula("text"));
        assert_eq!(parse_literal("12.5"), CellValue::Number(12.5));
        assert_eq!(parse_literal("true"), CellValue::Boolean(true));
        assert_eq!(parse_literal("#REF!"), CellValue::Error(CellError::Ref));
        assert_eq!(parse_literal("="), CellValue::from("="));
        assert_eq!(parse_literal("hello"), CellValue::from("hello"));
    }
}
