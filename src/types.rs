//! Stable enumerations and small value types shared across the crate
//!
//! Every enumeration here carries the numeric code it has on disk (and in
//! the classic spreadsheet object model), exposed through `code()` and
//! `from_code()` so binding layers can surface the constants unchanged.

use std::fmt;

macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $name:ident : $repr:ty {
            $( $(#[$vmeta:meta])* $variant:ident = $code:expr, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Numeric code of this value
            pub fn code(self) -> $repr {
                match self {
                    $( $name::$variant => $code, )+
                }
            }

            /// Look up a value by its numeric code
            pub fn from_code(code: $repr) -> Option<Self> {
                match code {
                    $( c if c == $code => Some($name::$variant), )+
                    _ => None,
                }
            }
        }
    };
}

coded_enum! {
    /// Closed type tag of a cell
    CellType: u8 {
        Numeric = 0,
        String = 1,
        Formula = 2,
        Blank = 3,
        Boolean = 4,
        Error = 5,
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CellType::Numeric => "NUMERIC",
            CellType::String => "STRING",
            CellType::Formula => "FORMULA",
            CellType::Blank => "BLANK",
            CellType::Boolean => "BOOLEAN",
            CellType::Error => "ERROR",
        };
        f.write_str(name)
    }
}

coded_enum! {
    /// Horizontal alignment of cell content
    HorizontalAlignment: u8 {
        General = 0,
        Left = 1,
        Center = 2,
        Right = 3,
        Fill = 4,
        Justify = 5,
        CenterSelection = 6,
    }
}

impl Default for HorizontalAlignment {
    fn default() -> Self {
        HorizontalAlignment::General
    }
}

coded_enum! {
    /// Vertical alignment of cell content
    VerticalAlignment: u8 {
        Top = 0,
        Center = 1,
        Bottom = 2,
        Justify = 3,
    }
}

impl Default for VerticalAlignment {
    fn default() -> Self {
        VerticalAlignment::Bottom
    }
}

coded_enum! {
    /// Line style of one cell border
    BorderStyle: u8 {
        None = 0x0,
        Thin = 0x1,
        Medium = 0x2,
        Dashed = 0x3,
        Dotted = 0x4,
        Thick = 0x5,
        Double = 0x6,
        Hair = 0x7,
        MediumDashed = 0x8,
        DashDot = 0x9,
        MediumDashDot = 0xA,
        DashDotDot = 0xB,
        MediumDashDotDot = 0xC,
        SlantedDashDot = 0xD,
    }
}

impl Default for BorderStyle {
    fn default() -> Self {
        BorderStyle::None
    }
}

coded_enum! {
    /// Background fill pattern
    FillPattern: u8 {
        NoFill = 0,
        SolidForeground = 1,
        FineDots = 2,
        AltBars = 3,
        SparseDots = 4,
        ThickHorzBands = 5,
        ThickVertBands = 6,
        ThickBackwardDiag = 7,
        ThickForwardDiag = 8,
        BigSpots = 9,
        Bricks = 10,
        ThinHorzBands = 11,
        ThinVertBands = 12,
        ThinBackwardDiag = 13,
        ThinForwardDiag = 14,
        Squares = 15,
        Diamonds = 16,
        LessDots = 17,
        LeastDots = 18,
    }
}

impl Default for FillPattern {
    fn default() -> Self {
        FillPattern::NoFill
    }
}

coded_enum! {
    /// Font underline style
    Underline: u8 {
        None = 0x00,
        Single = 0x01,
        Double = 0x02,
        SingleAccounting = 0x21,
        DoubleAccounting = 0x22,
    }
}

impl Default for Underline {
    fn default() -> Self {
        Underline::None
    }
}

coded_enum! {
    /// Visibility state of a sheet tab
    SheetVisibility: u8 {
        Visible = 0,
        Hidden = 1,
        VeryHidden = 2,
    }
}

impl Default for SheetVisibility {
    fn default() -> Self {
        SheetVisibility::Visible
    }
}

coded_enum! {
    /// Error value stored in an error cell or formula literal
    ErrorCode: u8 {
        Null = 0x00,
        Div0 = 0x07,
        Value = 0x0F,
        Ref = 0x17,
        Name = 0x1D,
        Num = 0x24,
        NA = 0x2A,
    }
}

impl ErrorCode {
    /// All error codes, in code order
    pub const ALL: [ErrorCode; 7] = [
        ErrorCode::Null,
        ErrorCode::Div0,
        ErrorCode::Value,
        ErrorCode::Ref,
        ErrorCode::Name,
        ErrorCode::Num,
        ErrorCode::NA,
    ];

    /// Literal text of the error, e.g. `#DIV/0!`
    pub fn text(self) -> &'static str {
        match self {
            ErrorCode::Null => "#NULL!",
            ErrorCode::Div0 => "#DIV/0!",
            ErrorCode::Value => "#VALUE!",
            ErrorCode::Ref => "#REF!",
            ErrorCode::Name => "#NAME?",
            ErrorCode::Num => "#NUM!",
            ErrorCode::NA => "#N/A",
        }
    }

    /// Parse error literal text (case-insensitive)
    pub fn from_text(text: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.text().eq_ignore_ascii_case(text))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Largest row index a sheet can hold
pub const MAX_ROW: u32 = 0xFFFF;
/// Largest column index a row can hold
pub const MAX_COLUMN: u16 = 0xFF;

/// Convert column index to letters (0 -> A, 25 -> Z, 26 -> AA)
pub fn column_letters(col: u16) -> String {
    let mut result = String::new();
    let mut col = col as u32 + 1;

    while col > 0 {
        col -= 1;
        result.insert(0, (b'A' + (col % 26) as u8) as char);
        col /= 26;
    }

    result
}

/// Convert column letters back to a 0-based index (A -> 0, AA -> 26)
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for b in letters.bytes() {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        col = col
            .checked_mul(26)?
            .checked_add((b.to_ascii_uppercase() - b'A') as u32 + 1)?;
    }
    Some(col - 1)
}

/// A1-style reference of a cell, e.g. `B3`
pub fn cell_reference(row: u32, col: u16) -> String {
    let mut buf = itoa::Buffer::new();
    let mut out = column_letters(col);
    out.push_str(buf.format(row + 1));
    out
}
