//! Formula text parser
//!
//! Turns A1-style formula text into an expression tree. The parser accepts
//! any function name and any defined name; deciding whether those can be
//! stored in binary form is left to the token compiler.

use crate::types::{column_index, ErrorCode, MAX_COLUMN, MAX_ROW};

/// Deepest nesting of parentheses, argument lists and sign runs
pub const MAX_NESTING: usize = 64;
/// Longest formula text accepted, in characters
pub const MAX_FORMULA_LEN: usize = 8192;

/// A single cell reference with its `$` anchors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub row: u32,
    pub col: u16,
    pub row_absolute: bool,
    pub col_absolute: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Power,
    Concat,
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Power => "^",
            BinaryOp::Concat => "&",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "=",
            BinaryOp::Ge => ">=",
            BinaryOp::Gt => ">",
            BinaryOp::Ne => "<>",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Bool(bool),
    Error(ErrorCode),
    Ref(CellRef),
    Area(CellRef, CellRef),
    /// Reference qualified with a sheet name, e.g. `Sheet2!A1`
    External { sheet: String, target: Box<Expr> },
    /// Defined name
    Name(String),
    /// Empty function argument
    Missing,
    Unary(UnaryOp, Box<Expr>),
    Percent(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Paren(Box<Expr>),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Text(String),
    Ident(String),
    QuotedSheet(String),
    Error(ErrorCode),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
    Colon,
    Bang,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            '!' => {
                tokens.push(Token::Bang);
                i += 1;
            }
            '+' | '-' | '*' | '/' | '^' | '&' | '%' | '=' => {
                let op = match c {
                    '+' => "+",
                    '-' => "-",
                    '*' => "*",
                    '/' => "/",
                    '^' => "^",
                    '&' => "&",
                    '%' => "%",
                    _ => "=",
                };
                tokens.push(Token::Op(op));
                i += 1;
            }
            '<' => {
                let op = match chars.get(i + 1) {
                    Some('=') => "<=",
                    Some('>') => "<>",
                    _ => "<",
                };
                i += op.len();
                tokens.push(Token::Op(op));
            }
            '>' => {
                let op = if chars.get(i + 1) == Some(&'=') { ">=" } else { ">" };
                i += op.len();
                tokens.push(Token::Op(op));
            }
            '"' => {
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some('"') if chars.get(i + 1) == Some(&'"') => {
                            text.push('"');
                            i += 2;
                        }
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            text.push(ch);
                            i += 1;
                        }
                        None => return Err("unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::Text(text));
            }
            '\'' => {
                let mut sheet = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            sheet.push('\'');
                            i += 2;
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            sheet.push(ch);
                            i += 1;
                        }
                        None => return Err("unterminated quoted sheet name".to_string()),
                    }
                }
                tokens.push(Token::QuotedSheet(sheet));
            }
            '#' => {
                let rest: String = chars[i..].iter().collect();
                let code = ErrorCode::ALL
                    .iter()
                    .copied()
                    .find(|e| {
                        rest.get(..e.text().len())
                            .is_some_and(|head| head.eq_ignore_ascii_case(e.text()))
                    })
                    .ok_or_else(|| format!("unknown error literal in '{rest}'"))?;
                i += code.text().len();
                tokens.push(Token::Error(code));
            }
            _ if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && matches!(chars[j], '+' | '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{text}'"))?;
                tokens.push(Token::Number(value));
            }
            _ if c.is_alphanumeric() || c == '$' || c == '_' || c == '\\' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '$' | '_' | '.' | '\\'))
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => return Err(format!("unexpected character '{c}'")),
        }
    }

    Ok(tokens)
}

/// Parse an A1 reference such as `B7`, `$C$3` or `aa$10`
pub fn parse_cell_ref(text: &str) -> Option<CellRef> {
    let bytes = text.as_bytes();
    let mut i = 0;
    let col_absolute = bytes.first() == Some(&b'$');
    if col_absolute {
        i += 1;
    }
    let col_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    if i == col_start || i - col_start > 3 {
        return None;
    }
    let col = column_index(&text[col_start..i])?;
    let row_absolute = bytes.get(i) == Some(&b'$');
    if row_absolute {
        i += 1;
    }
    let digits = &text[i..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 || row - 1 > MAX_ROW || col > MAX_COLUMN as u32 {
        return None;
    }
    Some(CellRef {
        row: row - 1,
        col: col as u16,
        row_absolute,
        col_absolute,
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

/// Parse formula text into an expression tree.
///
/// A single leading `=` is accepted and ignored. Text longer than
/// [`MAX_FORMULA_LEN`] characters or nested deeper than [`MAX_NESTING`]
/// levels is rejected.
pub fn parse(text: &str) -> Result<Expr, String> {
    let body = text.trim_start();
    let body = body.strip_prefix('=').unwrap_or(body);
    let len = body.chars().count();
    if len > MAX_FORMULA_LEN {
        return Err(format!("formula is {len} characters long (max {MAX_FORMULA_LEN})"));
    }
    let tokens = tokenize(body)?;
    if tokens.is_empty() {
        return Err("empty formula".to_string());
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.comparison()?;
    match parser.peek() {
        None => Ok(expr),
        Some(tok) => Err(format!("unexpected {tok:?} after expression")),
    }
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn enter(&mut self) -> Result<(), String> {
        if self.depth >= MAX_NESTING {
            return Err(format!("formula nests deeper than {MAX_NESTING} levels"));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn comparison(&mut self) -> Result<Expr, String> {
        let mut lhs = self.concat()?;
        while let Some(op) = self.eat_op(&["=", "<>", "<", "<=", ">", ">="]) {
            let rhs = self.concat()?;
            let op = match op {
                "=" => BinaryOp::Eq,
                "<>" => BinaryOp::Ne,
                "<" => BinaryOp::Lt,
                "<=" => BinaryOp::Le,
                ">" => BinaryOp::Gt,
                _ => BinaryOp::Ge,
            };
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn concat(&mut self) -> Result<Expr, String> {
        let mut lhs = self.additive()?;
        while self.eat_op(&["&"]).is_some() {
            let rhs = self.additive()?;
            lhs = Expr::Binary(BinaryOp::Concat, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr, String> {
        let mut lhs = self.term()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let rhs = self.term()?;
            let op = if op == "+" { BinaryOp::Add } else { BinaryOp::Sub };
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.power()?;
        while let Some(op) = self.eat_op(&["*", "/"]) {
            let rhs = self.power()?;
            let op = if op == "*" { BinaryOp::Mul } else { BinaryOp::Div };
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn power(&mut self) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        while self.eat_op(&["^"]).is_some() {
            let rhs = self.unary()?;
            lhs = Expr::Binary(BinaryOp::Power, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // Unary minus binds tighter than '^': -2^2 is 4
    fn unary(&mut self) -> Result<Expr, String> {
        let mut signs = Vec::new();
        while let Some(op) = self.eat_op(&["+", "-"]) {
            if signs.len() == MAX_NESTING {
                return Err(format!("more than {MAX_NESTING} signs in a row"));
            }
            signs.push(if op == "-" { UnaryOp::Minus } else { UnaryOp::Plus });
        }
        let mut expr = self.percent()?;
        for op in signs.into_iter().rev() {
            expr = Expr::Unary(op, Box::new(expr));
        }
        Ok(expr)
    }

    fn percent(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        while self.eat_op(&["%"]).is_some() {
            expr = Expr::Percent(Box::new(expr));
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Text(s)) => Ok(Expr::Text(s)),
            Some(Token::Error(e)) => Ok(Expr::Error(e)),
            Some(Token::LParen) => {
                self.enter()?;
                let inner = self.comparison()?;
                self.leave();
                match self.next() {
                    Some(Token::RParen) => Ok(Expr::Paren(Box::new(inner))),
                    _ => Err("missing ')'".to_string()),
                }
            }
            Some(Token::QuotedSheet(sheet)) => self.external(sheet),
            Some(Token::Ident(name)) => self.ident(name),
            Some(tok) => Err(format!("unexpected {tok:?}")),
            None => Err("unexpected end of formula".to_string()),
        }
    }

    fn ident(&mut self, name: String) -> Result<Expr, String> {
        match self.peek() {
            Some(Token::LParen) => {
                self.pos += 1;
                self.enter()?;
                let args = self.arguments()?;
                self.leave();
                return Ok(Expr::Call(name.to_ascii_uppercase(), args));
            }
            Some(Token::Bang) => return self.external(name),
            _ => {}
        }

        if let Some(first) = parse_cell_ref(&name) {
            return self.maybe_area(first);
        }
        if name.eq_ignore_ascii_case("TRUE") {
            return Ok(Expr::Bool(true));
        }
        if name.eq_ignore_ascii_case("FALSE") {
            return Ok(Expr::Bool(false));
        }
        Ok(Expr::Name(name))
    }

    fn maybe_area(&mut self, first: CellRef) -> Result<Expr, String> {
        if self.peek() != Some(&Token::Colon) {
            return Ok(Expr::Ref(first));
        }
        self.pos += 1;
        match self.next() {
            Some(Token::Ident(text)) => parse_cell_ref(&text)
                .map(|last| Expr::Area(first, last))
                .ok_or_else(|| format!("invalid range end '{text}'")),
            _ => Err("expected a cell reference after ':'".to_string()),
        }
    }

    fn external(&mut self, sheet: String) -> Result<Expr, String> {
        if self.next() != Some(Token::Bang) {
            return Err(format!("expected '!' after sheet name '{sheet}'"));
        }
        let target = match self.next() {
            Some(Token::Ident(text)) => match parse_cell_ref(&text) {
                Some(first) => self.maybe_area(first)?,
                None => Expr::Name(text),
            },
            _ => return Err(format!("expected a reference after '{sheet}!'")),
        };
        Ok(Expr::External {
            sheet,
            target: Box::new(target),
        })
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, String> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            let arg = match self.peek() {
                Some(Token::Comma) | Some(Token::RParen) => Expr::Missing,
                _ => self.comparison()?,
            };
            args.push(arg);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err("missing ')' after function arguments".to_string()),
            }
        }
    }
}
