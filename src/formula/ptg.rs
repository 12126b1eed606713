//! Parsed formula tokens (`Ptg`) in reverse Polish order
//!
//! Operand tokens are emitted with the reference class for cell references
//! and areas and the value class for function calls. The decoder accepts any
//! class.

use super::functions::{function_by_id, function_by_name, FunctionInfo};
use super::parser::{BinaryOp, CellRef, Expr, UnaryOp};
use crate::biff::strings::{push_short_string, read_short_string};
use crate::types::{column_letters, ErrorCode};

const PTG_EXP: u8 = 0x01;
const PTG_TBL: u8 = 0x02;
const PTG_ADD: u8 = 0x03;
const PTG_SUB: u8 = 0x04;
const PTG_MUL: u8 = 0x05;
const PTG_DIV: u8 = 0x06;
const PTG_POWER: u8 = 0x07;
const PTG_CONCAT: u8 = 0x08;
const PTG_LT: u8 = 0x09;
const PTG_LE: u8 = 0x0A;
const PTG_EQ: u8 = 0x0B;
const PTG_GE: u8 = 0x0C;
const PTG_GT: u8 = 0x0D;
const PTG_NE: u8 = 0x0E;
const PTG_ISECT: u8 = 0x0F;
const PTG_RANGE: u8 = 0x11;
const PTG_UPLUS: u8 = 0x12;
const PTG_UMINUS: u8 = 0x13;
const PTG_PERCENT: u8 = 0x14;
const PTG_PAREN: u8 = 0x15;
const PTG_MISSARG: u8 = 0x16;
const PTG_STR: u8 = 0x17;
const PTG_ATTR: u8 = 0x19;
const PTG_ERR: u8 = 0x1C;
const PTG_BOOL: u8 = 0x1D;
const PTG_INT: u8 = 0x1E;
const PTG_NUM: u8 = 0x1F;
const PTG_FUNC_V: u8 = 0x41;
const PTG_FUNCVAR_V: u8 = 0x42;
const PTG_REF_R: u8 = 0x24;
const PTG_AREA_R: u8 = 0x25;

const ATTR_CHOOSE: u8 = 0x04;
const ATTR_SUM: u8 = 0x10;
const SUM_ID: u16 = 4;

const COL_RELATIVE: u16 = 0x4000;
const ROW_RELATIVE: u16 = 0x8000;

#[derive(Debug, Clone, PartialEq)]
pub enum Ptg {
    Binary(BinaryOp),
    Unary(UnaryOp),
    Percent,
    Paren,
    MissArg,
    Str(String),
    Err(ErrorCode),
    Bool(bool),
    Int(u16),
    Num(f64),
    Func { id: u16 },
    FuncVar { argc: u8, id: u16 },
    Ref(CellRef),
    Area(CellRef, CellRef),
}

fn binary_code(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Add => PTG_ADD,
        BinaryOp::Sub => PTG_SUB,
        BinaryOp::Mul => PTG_MUL,
        BinaryOp::Div => PTG_DIV,
        BinaryOp::Power => PTG_POWER,
        BinaryOp::Concat => PTG_CONCAT,
        BinaryOp::Lt => PTG_LT,
        BinaryOp::Le => PTG_LE,
        BinaryOp::Eq => PTG_EQ,
        BinaryOp::Ge => PTG_GE,
        BinaryOp::Gt => PTG_GT,
        BinaryOp::Ne => PTG_NE,
    }
}

fn binary_from_code(code: u8) -> Option<BinaryOp> {
    Some(match code {
        PTG_ADD => BinaryOp::Add,
        PTG_SUB => BinaryOp::Sub,
        PTG_MUL => BinaryOp::Mul,
        PTG_DIV => BinaryOp::Div,
        PTG_POWER => BinaryOp::Power,
        PTG_CONCAT => BinaryOp::Concat,
        PTG_LT => BinaryOp::Lt,
        PTG_LE => BinaryOp::Le,
        PTG_EQ => BinaryOp::Eq,
        PTG_GE => BinaryOp::Ge,
        PTG_GT => BinaryOp::Gt,
        PTG_NE => BinaryOp::Ne,
        _ => return None,
    })
}

enum Step<'e> {
    Visit(&'e Expr),
    Emit(Ptg),
}

/// Compile an expression tree into reverse Polish tokens
pub fn compile(expr: &Expr) -> Result<Vec<Ptg>, String> {
    let mut out = Vec::new();
    let mut work = vec![Step::Visit(expr)];

    // explicit work list: operands are visited before their operator
    while let Some(step) = work.pop() {
        let expr = match step {
            Step::Emit(token) => {
                out.push(token);
                continue;
            }
            Step::Visit(expr) => expr,
        };
        match expr {
            Expr::Number(n) => {
                if n.fract() == 0.0 && (0.0..=65535.0).contains(n) {
                    out.push(Ptg::Int(*n as u16));
                } else {
                    out.push(Ptg::Num(*n));
                }
            }
            Expr::Text(s) => {
                if s.encode_utf16().count() > 255 {
                    return Err("string literal longer than 255 characters".to_string());
                }
                out.push(Ptg::Str(s.clone()));
            }
            Expr::Bool(b) => out.push(Ptg::Bool(*b)),
            Expr::Error(e) => out.push(Ptg::Err(*e)),
            Expr::Ref(r) => out.push(Ptg::Ref(*r)),
            Expr::Area(a, b) => out.push(Ptg::Area(*a, *b)),
            Expr::External { sheet, .. } => {
                return Err(format!("reference to sheet '{sheet}' cannot be encoded"));
            }
            Expr::Name(name) => return Err(format!("defined name '{name}' cannot be encoded")),
            Expr::Missing => out.push(Ptg::MissArg),
            Expr::Unary(op, inner) => {
                work.push(Step::Emit(Ptg::Unary(*op)));
                work.push(Step::Visit(inner));
            }
            Expr::Percent(inner) => {
                work.push(Step::Emit(Ptg::Percent));
                work.push(Step::Visit(inner));
            }
            Expr::Binary(op, lhs, rhs) => {
                work.push(Step::Emit(Ptg::Binary(*op)));
                work.push(Step::Visit(rhs));
                work.push(Step::Visit(lhs));
            }
            Expr::Paren(inner) => {
                work.push(Step::Emit(Ptg::Paren));
                work.push(Step::Visit(inner));
            }
            Expr::Call(name, args) => {
                let func = function_by_name(name).ok_or_else(|| format!("unknown function '{name}'"))?;
                check_arity(&func, args.len())?;
                let token = if func.is_fixed_arity() {
                    Ptg::Func { id: func.id }
                } else {
                    Ptg::FuncVar {
                        argc: args.len() as u8,
                        id: func.id,
                    }
                };
                work.push(Step::Emit(token));
                work.extend(args.iter().rev().map(Step::Visit));
            }
        }
    }
    Ok(out)
}

fn check_arity(func: &FunctionInfo, argc: usize) -> Result<(), String> {
    if argc < func.min_args as usize || argc > func.max_args as usize {
        return Err(format!(
            "{} takes {}..={} arguments, got {}",
            func.name, func.min_args, func.max_args, argc
        ));
    }
    Ok(())
}

fn push_ref_fields(buf: &mut Vec<u8>, r: &CellRef) {
    let mut col = r.col & 0x00FF;
    if !r.col_absolute {
        col |= COL_RELATIVE;
    }
    if !r.row_absolute {
        col |= ROW_RELATIVE;
    }
    buf.extend_from_slice(&(r.row as u16).to_le_bytes());
    buf.extend_from_slice(&col.to_le_bytes());
}

/// Serialize tokens to the `rgce` byte layout
pub fn encode(tokens: &[Ptg]) -> Result<Vec<u8>, String> {
    let mut buf = Vec::with_capacity(tokens.len() * 4);
    for token in tokens {
        match token {
            Ptg::Binary(op) => buf.push(binary_code(*op)),
            Ptg::Unary(UnaryOp::Plus) => buf.push(PTG_UPLUS),
            Ptg::Unary(UnaryOp::Minus) => buf.push(PTG_UMINUS),
            Ptg::Percent => buf.push(PTG_PERCENT),
            Ptg::Paren => buf.push(PTG_PAREN),
            Ptg::MissArg => buf.push(PTG_MISSARG),
            Ptg::Str(s) => {
                buf.push(PTG_STR);
                push_short_string(&mut buf, s)?;
            }
            Ptg::Err(e) => buf.extend_from_slice(&[PTG_ERR, e.code()]),
            Ptg::Bool(b) => buf.extend_from_slice(&[PTG_BOOL, *b as u8]),
            Ptg::Int(n) => {
                buf.push(PTG_INT);
                buf.extend_from_slice(&n.to_le_bytes());
            }
            Ptg::Num(n) => {
                buf.push(PTG_NUM);
                buf.extend_from_slice(&n.to_le_bytes());
            }
            Ptg::Func { id } => {
                buf.push(PTG_FUNC_V);
                buf.extend_from_slice(&id.to_le_bytes());
            }
            Ptg::FuncVar { argc, id } => {
                buf.push(PTG_FUNCVAR_V);
                buf.push(*argc & 0x7F);
                buf.extend_from_slice(&(id & 0x7FFF).to_le_bytes());
            }
            Ptg::Ref(r) => {
                buf.push(PTG_REF_R);
                push_ref_fields(&mut buf, r);
            }
            Ptg::Area(a, b) => {
                buf.push(PTG_AREA_R);
                let (mut first, mut last) = (Vec::with_capacity(4), Vec::with_capacity(4));
                push_ref_fields(&mut first, a);
                push_ref_fields(&mut last, b);
                // rwFirst, rwLast, colFirst, colLast
                buf.extend_from_slice(&first[0..2]);
                buf.extend_from_slice(&last[0..2]);
                buf.extend_from_slice(&first[2..4]);
                buf.extend_from_slice(&last[2..4]);
            }
        }
    }
    if buf.len() > u16::MAX as usize {
        return Err("formula tokens exceed 65535 bytes".to_string());
    }
    Ok(buf)
}

/// Why an `rgce` sequence did not decode to tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Well-formed, but holds tokens this crate does not model
    Unsupported(String),
    /// Truncated bytes or an unknown token
    Malformed(String),
}

impl DecodeError {
    pub fn reason(&self) -> &str {
        match self {
            DecodeError::Unsupported(reason) | DecodeError::Malformed(reason) => reason,
        }
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| DecodeError::Malformed(format!("token truncated at byte {}", self.pos)))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn f64(&mut self) -> Result<f64, DecodeError> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(f64::from_le_bytes(raw))
    }
}

fn ref_from_fields(row: u16, col: u16) -> CellRef {
    CellRef {
        row: row as u32,
        col: col & 0x00FF,
        row_absolute: col & ROW_RELATIVE == 0,
        col_absolute: col & COL_RELATIVE == 0,
    }
}

/// Reference whose relative parts are offsets from `origin`, as stored in
/// shared formulas
fn ref_from_offsets(row: u16, col: u16, origin: (u32, u16)) -> CellRef {
    let mut r = ref_from_fields(row, col);
    if !r.row_absolute {
        r.row = (origin.0 as i64 + row as i16 as i64).rem_euclid(65536) as u32;
    }
    if !r.col_absolute {
        r.col = (origin.1 as i32 + (col & 0x00FF) as u8 as i8 as i32).rem_euclid(256) as u16;
    }
    r
}

/// True for `rgce` that only points at a shared, array or table formula
pub fn is_range_pointer(rgce: &[u8]) -> bool {
    rgce.len() == 5 && matches!(rgce[0], PTG_EXP | PTG_TBL)
}

/// Cell a range pointer refers to, as (row, column)
pub fn range_anchor(rgce: &[u8]) -> Option<(u16, u16)> {
    if !is_range_pointer(rgce) {
        return None;
    }
    Some((u16::from_le_bytes([rgce[1], rgce[2]]), u16::from_le_bytes([rgce[3], rgce[4]])))
}

/// Payload size of class tokens this crate skips over, keyed by base code
fn skipped_class_size(base: u8) -> Option<usize> {
    Some(match base {
        0x00 => 7,               // array constant
        0x03 | 0x0A | 0x0C => 4, // name, ref error, relative ref
        0x06..=0x08 => 6,        // memory areas
        0x09 => 2,               // memory function
        0x0B | 0x0D => 8,        // area error, relative area
        0x19 | 0x1A | 0x1C => 6, // external name, 3-D ref, 3-D ref error
        0x1B | 0x1D => 10,       // 3-D area, 3-D area error
        _ => return None,
    })
}

/// Parse an `rgce` byte sequence back into tokens.
///
/// `origin` is the cell a shared formula is being expanded for; relative
/// references (`RefN`, `AreaN`) only decode when it is given. Every token is
/// checked for structure even after an unsupported one was seen, so
/// [`DecodeError::Unsupported`] means the whole sequence is well-formed.
pub fn decode(data: &[u8], origin: Option<(u32, u16)>) -> Result<Vec<Ptg>, DecodeError> {
    let mut cur = Cursor { data, pos: 0 };
    let mut tokens = Vec::new();
    let mut unsupported: Option<String> = None;
    let mut skip = |code: u8| {
        unsupported.get_or_insert_with(|| format!("unsupported token 0x{code:02X}"));
    };

    while cur.pos < data.len() {
        let code = cur.u8()?;
        let token = match code {
            PTG_EXP | PTG_TBL => {
                cur.take(4)?;
                skip(code);
                continue;
            }
            PTG_ISECT..=PTG_RANGE => {
                skip(code);
                continue;
            }
            PTG_UPLUS => Ptg::Unary(UnaryOp::Plus),
            PTG_UMINUS => Ptg::Unary(UnaryOp::Minus),
            PTG_PERCENT => Ptg::Percent,
            PTG_PAREN => Ptg::Paren,
            PTG_MISSARG => Ptg::MissArg,
            PTG_STR => {
                let text = read_short_string(cur.data, &mut cur.pos)
                    .ok_or_else(|| DecodeError::Malformed("truncated string token".to_string()))?;
                Ptg::Str(text)
            }
            PTG_ATTR => {
                let flags = cur.u8()?;
                let data = cur.u16()?;
                if flags & ATTR_CHOOSE != 0 {
                    cur.take((data as usize + 1) * 2)?;
                }
                if flags & ATTR_SUM != 0 {
                    Ptg::FuncVar { argc: 1, id: SUM_ID }
                } else {
                    continue;
                }
            }
            PTG_ERR => {
                let raw = cur.u8()?;
                Ptg::Err(
                    ErrorCode::from_code(raw)
                        .ok_or_else(|| DecodeError::Malformed(format!("unknown error code 0x{raw:02X}")))?,
                )
            }
            PTG_BOOL => Ptg::Bool(cur.u8()? != 0),
            PTG_INT => Ptg::Int(cur.u16()?),
            PTG_NUM => Ptg::Num(cur.f64()?),
            c @ PTG_ADD..=PTG_NE => match binary_from_code(c) {
                Some(op) => Ptg::Binary(op),
                None => return Err(DecodeError::Malformed(format!("unknown token 0x{c:02X}"))),
            },
            c if c >= 0x20 => match (c & 0x1F, origin) {
                (0x01, _) => {
                    let id = cur.u16()?;
                    if function_by_id(id).is_none() {
                        skip(c);
                        continue;
                    }
                    Ptg::Func { id }
                }
                (0x02, _) => {
                    let argc = cur.u8()? & 0x7F;
                    let id = cur.u16()? & 0x7FFF;
                    if function_by_id(id).is_none() {
                        skip(c);
                        continue;
                    }
                    Ptg::FuncVar { argc, id }
                }
                (0x04, _) => {
                    let row = cur.u16()?;
                    let col = cur.u16()?;
                    Ptg::Ref(ref_from_fields(row, col))
                }
                (0x05, _) => {
                    let row_first = cur.u16()?;
                    let row_last = cur.u16()?;
                    let col_first = cur.u16()?;
                    let col_last = cur.u16()?;
                    Ptg::Area(ref_from_fields(row_first, col_first), ref_from_fields(row_last, col_last))
                }
                (0x0C, Some(at)) => {
                    let row = cur.u16()?;
                    let col = cur.u16()?;
                    Ptg::Ref(ref_from_offsets(row, col, at))
                }
                (0x0D, Some(at)) => {
                    let row_first = cur.u16()?;
                    let row_last = cur.u16()?;
                    let col_first = cur.u16()?;
                    let col_last = cur.u16()?;
                    Ptg::Area(
                        ref_from_offsets(row_first, col_first, at),
                        ref_from_offsets(row_last, col_last, at),
                    )
                }
                (base, _) => match skipped_class_size(base) {
                    Some(size) => {
                        cur.take(size)?;
                        skip(c);
                        continue;
                    }
                    None => return Err(DecodeError::Malformed(format!("unknown token 0x{c:02X}"))),
                },
            },
            c => return Err(DecodeError::Malformed(format!("unknown token 0x{c:02X}"))),
        };
        tokens.push(token);
    }

    match unsupported {
        Some(reason) => Err(DecodeError::Unsupported(reason)),
        None => Ok(tokens),
    }
}

fn ref_text(r: &CellRef) -> String {
    let mut out = String::with_capacity(8);
    if r.col_absolute {
        out.push('$');
    }
    out.push_str(&column_letters(r.col));
    if r.row_absolute {
        out.push('$');
    }
    let mut buf = itoa::Buffer::new();
    out.push_str(buf.format(r.row + 1));
    out
}

/// Render tokens as canonical formula text (no leading `=`)
pub fn render(tokens: &[Ptg]) -> Result<String, String> {
    let mut stack: Vec<String> = Vec::new();
    let underflow = || "token stack underflow".to_string();

    for token in tokens {
        match token {
            Ptg::Binary(op) => {
                let rhs = stack.pop().ok_or_else(underflow)?;
                let lhs = stack.pop().ok_or_else(underflow)?;
                stack.push(format!("{lhs}{}{rhs}", op.symbol()));
            }
            Ptg::Unary(op) => {
                let inner = stack.pop().ok_or_else(underflow)?;
                let sign = if *op == UnaryOp::Minus { '-' } else { '+' };
                stack.push(format!("{sign}{inner}"));
            }
            Ptg::Percent => {
                let inner = stack.pop().ok_or_else(underflow)?;
                stack.push(format!("{inner}%"));
            }
            Ptg::Paren => {
                let inner = stack.pop().ok_or_else(underflow)?;
                stack.push(format!("({inner})"));
            }
            Ptg::MissArg => stack.push(String::new()),
            Ptg::Str(s) => stack.push(format!("\"{}\"", s.replace('"', "\"\""))),
            Ptg::Err(e) => stack.push(e.text().to_string()),
            Ptg::Bool(b) => stack.push(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Ptg::Int(n) => {
                let mut buf = itoa::Buffer::new();
                stack.push(buf.format(*n).to_string());
            }
            Ptg::Num(n) => stack.push(n.to_string()),
            Ptg::Ref(r) => stack.push(ref_text(r)),
            Ptg::Area(a, b) => stack.push(format!("{}:{}", ref_text(a), ref_text(b))),
            Ptg::Func { id } => {
                let func = function_by_id(*id).ok_or_else(|| format!("unknown function id {id}"))?;
                call(&mut stack, func.name, func.min_args as usize)?;
            }
            Ptg::FuncVar { argc, id } => {
                let func = function_by_id(*id).ok_or_else(|| format!("unknown function id {id}"))?;
                call(&mut stack, func.name, *argc as usize)?;
            }
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(text), true) => Ok(text),
        (None, _) => Err("formula has no tokens".to_string()),
        (Some(_), false) => Err("formula leaves more than one value".to_string()),
    }
}

fn call(stack: &mut Vec<String>, name: &str, argc: usize) -> Result<(), String> {
    if stack.len() < argc {
        return Err(format!("{name} expects {argc} arguments on the stack"));
    }
    let args = stack.split_off(stack.len() - argc);
    stack.push(format!("{name}({})", args.join(",")));
    Ok(())
}
