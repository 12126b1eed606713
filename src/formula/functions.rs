//! Built-in function table used by formula tokens.
//!
//! Each function is identified on disk by its 16-bit `iftab` id. Functions
//! with a fixed argument count are encoded as `tFunc`, all others as
//! `tFuncVar` carrying the actual argument count.

/// Largest argument count a variable-arity function accepts
pub const MAX_ARGS: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionInfo {
    pub id: u16,
    pub name: &'static str,
    pub min_args: u8,
    pub max_args: u8,
}

impl FunctionInfo {
    pub fn is_fixed_arity(&self) -> bool {
        self.min_args == self.max_args
    }
}

const fn f(id: u16, name: &'static str, min_args: u8, max_args: u8) -> FunctionInfo {
    FunctionInfo {
        id,
        name,
        min_args,
        max_args,
    }
}

const FUNCTIONS: &[FunctionInfo] = &[
    f(0, "COUNT", 0, MAX_ARGS),
    f(1, "IF", 2, 3),
    f(2, "ISNA", 1, 1),
    f(3, "ISERROR", 1, 1),
    f(4, "SUM", 0, MAX_ARGS),
    f(5, "AVERAGE", 1, MAX_ARGS),
    f(6, "MIN", 1, MAX_ARGS),
    f(7, "MAX", 1, MAX_ARGS),
    f(8, "ROW", 0, 1),
    f(9, "COLUMN", 0, 1),
    f(10, "NA", 0, 0),
    f(12, "STDEV", 1, MAX_ARGS),
    f(15, "SIN", 1, 1),
    f(16, "COS", 1, 1),
    f(17, "TAN", 1, 1),
    f(19, "PI", 0, 0),
    f(20, "SQRT", 1, 1),
    f(21, "EXP", 1, 1),
    f(22, "LN", 1, 1),
    f(23, "LOG10", 1, 1),
    f(24, "ABS", 1, 1),
    f(25, "INT", 1, 1),
    f(26, "SIGN", 1, 1),
    f(27, "ROUND", 2, 2),
    f(28, "LOOKUP", 2, 3),
    f(29, "INDEX", 2, 4),
    f(30, "REPT", 2, 2),
    f(31, "MID", 3, 3),
    f(32, "LEN", 1, 1),
    f(33, "VALUE", 1, 1),
    f(34, "TRUE", 0, 0),
    f(35, "FALSE", 0, 0),
    f(36, "AND", 1, MAX_ARGS),
    f(37, "OR", 1, MAX_ARGS),
    f(38, "NOT", 1, 1),
    f(39, "MOD", 2, 2),
    f(46, "VAR", 1, MAX_ARGS),
    f(48, "TEXT", 2, 2),
    f(63, "RAND", 0, 0),
    f(64, "MATCH", 2, 3),
    f(65, "DATE", 3, 3),
    f(66, "TIME", 3, 3),
    f(67, "DAY", 1, 1),
    f(68, "MONTH", 1, 1),
    f(69, "YEAR", 1, 1),
    f(70, "WEEKDAY", 1, 2),
    f(71, "HOUR", 1, 1),
    f(72, "MINUTE", 1, 1),
    f(73, "SECOND", 1, 1),
    f(74, "NOW", 0, 0),
    f(78, "OFFSET", 3, 5),
    f(82, "SEARCH", 2, 3),
    f(97, "ATAN2", 2, 2),
    f(100, "CHOOSE", 2, MAX_ARGS),
    f(101, "HLOOKUP", 3, 4),
    f(102, "VLOOKUP", 3, 4),
    f(109, "LOG", 1, 2),
    f(112, "LOWER", 1, 1),
    f(113, "UPPER", 1, 1),
    f(114, "PROPER", 1, 1),
    f(115, "LEFT", 1, 2),
    f(116, "RIGHT", 1, 2),
    f(117, "EXACT", 2, 2),
    f(118, "TRIM", 1, 1),
    f(119, "REPLACE", 4, 4),
    f(120, "SUBSTITUTE", 3, 4),
    f(124, "FIND", 2, 3),
    f(127, "ISTEXT", 1, 1),
    f(128, "ISNUMBER", 1, 1),
    f(129, "ISBLANK", 1, 1),
    f(169, "COUNTA", 0, MAX_ARGS),
    f(183, "PRODUCT", 0, MAX_ARGS),
    f(197, "TRUNC", 1, 2),
    f(212, "ROUNDUP", 2, 2),
    f(213, "ROUNDDOWN", 2, 2),
    f(220, "DAYS360", 2, 3),
    f(221, "TODAY", 0, 0),
    f(227, "MEDIAN", 1, MAX_ARGS),
    f(228, "SUMPRODUCT", 1, MAX_ARGS),
    f(285, "FLOOR", 2, 2),
    f(288, "CEILING", 2, 2),
    f(336, "CONCATENATE", 0, MAX_ARGS),
    f(337, "POWER", 2, 2),
    f(345, "SUMIF", 2, 3),
    f(346, "COUNTIF", 2, 2),
    f(347, "COUNTBLANK", 1, 1),
];

pub fn function_by_name(name: &str) -> Option<FunctionInfo> {
    let name = name.trim();
    FUNCTIONS
        .iter()
        .find(|func| func.name.eq_ignore_ascii_case(name))
        .copied()
}

pub fn function_by_id(id: u16) -> Option<FunctionInfo> {
    FUNCTIONS.iter().find(|func| func.id == id).copied()
}
