//! Formula parser
//!
//! A recursive descent parser with spreadsheet operator precedence.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use magic_sheets_core::{CellAddress, CellError, CellRange};

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use magic_sheets_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("=SUM(A1:A10)").unwrap();
/// let ast = parse_formula("=IF(A1>0,\"Yes\",\"No\")").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let body = formula
        .trim()
        .strip_prefix('=')
        .ok_or_else(|| FormulaError::Parse("Formula must start with '='".into()))?;

    let mut parser = FormulaParser::new(body)?;
    let expr = parser.parse_expression()?;

    if parser.current != Token::Eof {
        return Err(FormulaError::Parse(format!(
            "Unexpected {:?} after expression",
            parser.current
        )));
    }

    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    Identifier(String),
    CellRef(CellAddress),

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

    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,

    Eof,
}

struct FormulaParser<'a> {
    input: &'a str,
    pos: usize,
    current: Token,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str) -> FormulaResult<Self> {
        let mut parser = Self {
            input,
            pos: 0,
            current: Token::Eof,
        };
        parser.advance_token()?;
        Ok(parser)
    }

    // === Token scanning ===

    fn advance_token(&mut self) -> FormulaResult<()> {
        self.current = self.scan_token()?;
        Ok(())
    }

    fn scan_token(&mut self) -> FormulaResult<Token> {
        self.skip_whitespace();

        let Some(c) = self.peek_char() else {
            return Ok(Token::Eof);
        };

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '%' => Some(Token::Percent),
            '&' => Some(Token::Ampersand),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semicolon),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            '=' => Some(Token::Equal),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        match c {
            '<' => {
                self.advance();
                Ok(match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        Token::LessEqual
                    }
                    Some('>') => {
                        self.advance();
                        Token::NotEqual
                    }
                    _ => Token::LessThan,
                })
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    Ok(Token::GreaterEqual)
                } else {
                    Ok(Token::GreaterThan)
                }
            }
            '"' => self.scan_string(),
            c if c.is_ascii_digit()
                || (c == '.' && self.peek_char_at(1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                self.scan_number()
            }
            '#' => self.scan_error(),
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => self.scan_identifier_or_ref(),
            other => Err(FormulaError::Parse(format!(
                "Unexpected character '{}' at {}",
                other, self.pos
            ))),
        }
    }

    fn scan_string(&mut self) -> FormulaResult<Token> {
        self.advance(); // opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                Some('"') if self.peek_char_at(1) == Some('"') => {
                    s.push('"');
                    self.advance();
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    return Ok(Token::String(s));
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
                None => return Err(FormulaError::Parse("Unterminated string literal".into())),
            }
        }
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;

        self.skip_digits();
        if self.peek_char() == Some('.') {
            self.advance();
            self.skip_digits();
        }

        if self.peek_char().is_some_and(|c| c == 'e' || c == 'E') {
            self.advance();
            if self.peek_char().is_some_and(|c| c == '+' || c == '-') {
                self.advance();
            }
            self.skip_digits();
        }

        let text = &self.input[start..self.pos];
        text.parse()
            .map(Token::Number)
            .map_err(|_| FormulaError::Parse(format!("Invalid number '{}'", text)))
    }

    fn scan_error(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance();
        while self
            .peek_char()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '!' || c == '/' || c == '?')
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];
        CellError::parse(text)
            .map(Token::Error)
            .ok_or_else(|| FormulaError::Parse(format!("Unknown error literal '{}'", text)))
    }

    fn scan_identifier_or_ref(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        while self
            .peek_char()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.')
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];
        let followed_by_paren = self.peek_char_after_whitespace() == Some('(');

        // TRUE( / FALSE( and LOG10( are function calls, not literals or references
        if !followed_by_paren {
            match text.to_ascii_uppercase().as_str() {
                "TRUE" => return Ok(Token::Boolean(true)),
                "FALSE" => return Ok(Token::Boolean(false)),
                _ => {}
            }

            if is_cell_reference(text) {
                let clean = text.replace('$', "").to_ascii_uppercase();
                let address = CellAddress::decode(&clean).map_err(|e| {
                    FormulaError::Parse(format!("Invalid cell reference '{}': {}", text, e))
                })?;
                return Ok(Token::CellRef(address));
            }
        }

        Ok(Token::Identifier(text.to_string()))
    }

    fn skip_digits(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn peek_char_after_whitespace(&self) -> Option<char> {
        self.input[self.pos..].chars().find(|c| !c.is_whitespace())
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn consume(&mut self) -> FormulaResult<Token> {
        let next = self.scan_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn expect(&mut self, expected: Token) -> FormulaResult<()> {
        if self.current == expected {
            self.consume()?;
            Ok(())
        } else {
            Err(FormulaError::Parse(format!(
                "Expected {:?}, got {:?}",
                expected, self.current
            )))
        }
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Comparison: =, <>, <, <=, >, >=
    // 2. Concatenation: &
    // 3. Addition/Subtraction: +, -
    // 4. Multiplication/Division: *, /
    // 5. Exponentiation: ^
    // 6. Unary: -, %
    // 7. Range: :
    // 8. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let op = match self.current {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_concatenation()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while self.current == Token::Ampersand {
            self.consume()?;
            let right = self.parse_additive()?;
            left = binary(BinaryOperator::Concat, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match self.current {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_exponent()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_exponent(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_unary()?;

        if self.current == Token::Caret {
            self.consume()?;
            let right = self.parse_exponent()?; // right associative
            return Ok(binary(BinaryOperator::Power, left, right));
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.current {
            Token::Minus => {
                self.consume()?;
                let operand = self.parse_unary()?;
                Ok(FormulaExpr::UnaryOp {
                    op: UnaryOperator::Negate,
                    operand: Box::new(operand),
                })
            }
            Token::Plus => {
                self.consume()?;
                self.parse_unary()
            }
            _ => {
                let mut expr = self.parse_range()?;
                while self.current == Token::Percent {
                    self.consume()?;
                    expr = FormulaExpr::UnaryOp {
                        op: UnaryOperator::Percent,
                        operand: Box::new(expr),
                    };
                }
                Ok(expr)
            }
        }
    }

    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_primary()?;

        if self.current != Token::Colon {
            return Ok(left);
        }

        self.consume()?;
        let right = self.parse_primary()?;

        match (left, right) {
            (FormulaExpr::CellRef(start), FormulaExpr::CellRef(end)) => {
                Ok(FormulaExpr::RangeRef(CellRange::new(start, end)))
            }
            _ => Err(FormulaError::Parse(
                "Range operator requires cell references on both sides".into(),
            )),
        }
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.consume()? {
            Token::Number(n) => Ok(FormulaExpr::Number(n)),
            Token::String(s) => Ok(FormulaExpr::String(s)),
            Token::Boolean(b) => Ok(FormulaExpr::Boolean(b)),
            Token::Error(e) => Ok(FormulaExpr::Error(e)),
            Token::CellRef(addr) => Ok(FormulaExpr::CellRef(addr)),

            Token::LeftParen => {
                let expr = self.parse_expression()?;
                self.expect(Token::RightParen)?;
                Ok(expr)
            }

            Token::LeftBrace => self.parse_array(),

            Token::Identifier(name) => {
                if self.current == Token::LeftParen {
                    self.parse_function_call(name)
                } else {
                    Ok(FormulaExpr::NameRef(name))
                }
            }

            other => Err(FormulaError::Parse(format!("Unexpected token: {:?}", other))),
        }
    }

    fn parse_array(&mut self) -> FormulaResult<FormulaExpr> {
        let mut rows = Vec::new();
        let mut current_row = Vec::new();

        if self.current != Token::RightBrace {
            current_row.push(self.parse_expression()?);

            loop {
                match self.current {
                    Token::Comma => {
                        self.consume()?;
                        current_row.push(self.parse_expression()?);
                    }
                    Token::Semicolon => {
                        self.consume()?;
                        rows.push(std::mem::take(&mut current_row));
                        current_row.push(self.parse_expression()?);
                    }
                    Token::RightBrace => break,
                    _ => {
                        return Err(FormulaError::Parse(
                            "Expected ',' ';' or '}' in array".into(),
                        ))
                    }
                }
            }
        }

        if !current_row.is_empty() {
            rows.push(current_row);
        }

        self.expect(Token::RightBrace)?;
        Ok(FormulaExpr::Array(rows))
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        self.expect(Token::LeftParen)?;

        let mut args = Vec::new();
        if self.current != Token::RightParen {
            args.push(self.parse_expression()?);

            while self.current == Token::Comma {
                self.consume()?;
                args.push(self.parse_expression()?);
            }
        }

        self.expect(Token::RightParen)?;

        Ok(FormulaExpr::Function {
            name: name.to_uppercase(),
            args,
        })
    }
}

fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
    FormulaExpr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// `[$]letters[$]digits`, nothing else
fn is_cell_reference(text: &str) -> bool {
    let rest = text.strip_prefix('$').unwrap_or(text);
    let letters = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    if letters == 0 {
        return false;
    }

    let rest = &rest[letters..];
    let rest = rest.strip_prefix('$').unwrap_or(rest);
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_formula("=42").unwrap(), FormulaExpr::Number(42.0));
        assert_eq!(parse_formula("=3.14").unwrap(), FormulaExpr::Number(3.14));
        assert_eq!(parse_formula("=1e10").unwrap(), FormulaExpr::Number(1e10));
    }

    #[test]
    fn test_parse_string() {
        assert_eq!(
            parse_formula("=\"Hello \"\"World\"\"\"").unwrap(),
            FormulaExpr::String("Hello \"World\"".into())
        );
        assert!(parse_formula("=\"open").is_err());
    }

    #[test]
    fn test_parse_precedence() {
        let ast = parse_formula("=1+2*3").unwrap();
        if let FormulaExpr::BinaryOp { op, left, right } = ast {
            assert_eq!(op, BinaryOperator::Add);
            assert_eq!(*left, FormulaExpr::Number(1.0));
            assert!(matches!(
                *right,
                FormulaExpr::BinaryOp {
                    op: BinaryOperator::Multiply,
                    ..
                }
            ));
        } else {
            panic!("Expected BinaryOp");
        }
    }

    #[test]
    fn test_parse_unary_and_percent() {
        assert!(matches!(
            parse_formula("=-5").unwrap(),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                ..
            }
        ));
        assert!(matches!(
            parse_formula("=50%").unwrap(),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_cell_reference() {
        assert_eq!(
            parse_formula("=A1").unwrap(),
            FormulaExpr::CellRef(CellAddress::new(0, 0))
        );
        assert_eq!(
            parse_formula("=$b$2").unwrap(),
            FormulaExpr::CellRef(CellAddress::new(1, 1))
        );
    }

    #[test]
    fn test_parse_range_reference() {
        let ast = parse_formula("=A1:B10").unwrap();
        assert_eq!(
            ast,
            FormulaExpr::RangeRef(CellRange::from_indices(0, 0, 9, 1))
        );
        assert!(parse_formula("=A1:3").is_err());
    }

    #[test]
    fn test_parse_function() {
        let ast = parse_formula("=sum(A1:A10, 2)").unwrap();
        if let FormulaExpr::Function { name, args } = ast {
            assert_eq!(name, "SUM");
            assert_eq!(args.len(), 2);
            assert!(matches!(&args[0], FormulaExpr::RangeRef(_)));
        } else {
            panic!("Expected Function");
        }

        // LOG10 looks like a reference but is a call
        assert!(matches!(
            parse_formula("=LOG10(100)").unwrap(),
            FormulaExpr::Function { .. }
        ));
    }

    #[test]
    fn test_parse_array() {
        if let FormulaExpr::Array(rows) = parse_formula("={1,2;3,4}").unwrap() {
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[1].len(), 2);
        } else {
            panic!("Expected Array");
        }
    }

    #[test]
    fn test_parse_error_literal() {
        assert_eq!(
            parse_formula("=#DIV/0!").unwrap(),
            FormulaExpr::Error(CellError::Div0)
        );
        assert!(parse_formula("=#BOGUS").is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_formula("1+2").is_err());
        assert!(parse_formula("=1+").is_err());
        assert!(parse_formula("=(1+2").is_err());
        assert!(parse_formula("=1 2").is_err());
        assert!(parse_formula("=A1 @").is_err());
    }

    #[test]
    fn test_complex_formula() {
        let ast = parse_formula("=IF(AND(A1>0,B1<100),A1*B1/100,0)").unwrap();
        assert!(matches!(ast, FormulaExpr::Function { .. }));
        assert_eq!(ast.references().len(), 4);
    }
}
