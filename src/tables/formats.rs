//! Built-in and custom number formats

use super::FormatIndex;
use crate::error::{BiffError, Result};
use indexmap::IndexMap;

/// Built-in number formats, indexed by their format code.
///
/// Codes 0x17..=0x24 are reserved for locale-specific formats and have no
/// pattern.
const BUILTIN_FORMATS: [&str; 50] = [
    "General",                              // 0x00
    "0",                                    // 0x01
    "0.00",                                 // 0x02
    "#,##0",                                // 0x03
    "#,##0.00",                             // 0x04
    "\"$\"#,##0_);(\"$\"#,##0)",            // 0x05
    "\"$\"#,##0_);[Red](\"$\"#,##0)",       // 0x06
    "\"$\"#,##0.00_);(\"$\"#,##0.00)",      // 0x07
    "\"$\"#,##0.00_);[Red](\"$\"#,##0.00)", // 0x08
    "0%",                                   // 0x09
    "0.00%",                                // 0x0A
    "0.00E+00",                             // 0x0B
    "# ?/?",                                // 0x0C
    "# ??/??",                              // 0x0D
    "m/d/yy",                               // 0x0E
    "d-mmm-yy",                             // 0x0F
    "d-mmm",                                // 0x10
    "mmm-yy",                               // 0x11
    "h:mm AM/PM",                           // 0x12
    "h:mm:ss AM/PM",                        // 0x13
    "h:mm",                                 // 0x14
    "h:mm:ss",                              // 0x15
    "m/d/yy h:mm",                          // 0x16
    "", "", "", "", "", "", "", "", "", "", "", "", "", "",
    "#,##0_);(#,##0)",            // 0x25
    "#,##0_);[Red](#,##0)",       // 0x26
    "#,##0.00_);(#,##0.00)",      // 0x27
    "#,##0.00_);[Red](#,##0.00)", // 0x28
    "_(* #,##0_);_(* (#,##0);_(* \"-\"_);_(@_)",
    "_(\"$\"* #,##0_);_(\"$\"* (#,##0);_(\"$\"* \"-\"_);_(@_)",
    "_(* #,##0.00_);_(* (#,##0.00);_(* \"-\"??_);_(@_)",
    "_(\"$\"* #,##0.00_);_(\"$\"* (#,##0.00);_(\"$\"* \"-\"??_);_(@_)",
    "mm:ss",     // 0x2D
    "[h]:mm:ss", // 0x2E
    "mm:ss.0",   // 0x2F
    "##0.0E+0",  // 0x30
    "@",         // 0x31
];

/// First code handed out to custom formats
pub const FIRST_CUSTOM_FORMAT: u16 = 164;
/// Custom format codes available above the built-in range
pub const MAX_CUSTOM_FORMATS: usize = (u16::MAX - FIRST_CUSTOM_FORMAT) as usize + 1;

/// Resolve a built-in pattern to its format code
pub fn builtin_format(pattern: &str) -> Result<FormatIndex> {
    lookup_builtin(pattern).ok_or_else(|| BiffError::UnknownFormat(pattern.to_string()))
}

fn lookup_builtin(pattern: &str) -> Option<FormatIndex> {
    if pattern.is_empty() {
        return None;
    }
    BUILTIN_FORMATS
        .iter()
        .position(|&p| p == pattern)
        .map(|code| FormatIndex(code as u16))
}

/// Pattern of a built-in format code
pub fn builtin_pattern(code: u16) -> Option<&'static str> {
    BUILTIN_FORMATS
        .get(code as usize)
        .copied()
        .filter(|p| !p.is_empty())
}

/// Number format pool: the fixed built-in table plus interned custom patterns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFormats {
    custom: IndexMap<String, u16>,
    next_code: u32,
}

impl Default for DataFormats {
    fn default() -> Self {
        Self::new()
    }
}

impl DataFormats {
    pub fn new() -> Self {
        DataFormats {
            custom: IndexMap::new(),
            next_code: FIRST_CUSTOM_FORMAT as u32,
        }
    }

    /// Resolve a built-in pattern, failing with `UnknownFormat` otherwise
    pub fn builtin(&self, pattern: &str) -> Result<FormatIndex> {
        builtin_format(pattern)
    }

    /// Resolve a pattern to a code, appending a custom format when it is
    /// neither built-in nor already known
    pub fn intern(&mut self, pattern: &str) -> Result<FormatIndex> {
        if let Some(code) = lookup_builtin(pattern) {
            return Ok(code);
        }
        if let Some(&code) = self.custom.get(pattern) {
            return Ok(FormatIndex(code));
        }
        let code = u16::try_from(self.next_code).map_err(|_| BiffError::PoolFull {
            pool: "number format",
            max: MAX_CUSTOM_FORMATS,
        })?;
        self.next_code += 1;
        self.custom.insert(pattern.to_string(), code);
        Ok(FormatIndex(code))
    }

    /// Register a custom format under the code it carried in a file.
    ///
    /// Built-in codes resolve to themselves and a pattern already known under
    /// another code keeps that code. A code already bound to a different
    /// pattern is an error.
    pub(crate) fn insert_with_code(&mut self, code: u16, pattern: &str) -> Result<FormatIndex> {
        if code < FIRST_CUSTOM_FORMAT {
            return Ok(FormatIndex(code));
        }
        if let Some(&known) = self.custom.get(pattern) {
            return Ok(FormatIndex(known));
        }
        if let Some(other) = self.pattern(FormatIndex(code)) {
            return Err(BiffError::InvalidFormat(format!(
                "format code {code} is bound to both '{other}' and '{pattern}'"
            )));
        }
        self.custom.insert(pattern.to_string(), code);
        self.next_code = self.next_code.max(code as u32 + 1);
        Ok(FormatIndex(code))
    }

    /// Pattern string of a format code
    pub fn pattern(&self, index: FormatIndex) -> Option<&str> {
        if index.0 < FIRST_CUSTOM_FORMAT {
            return builtin_pattern(index.0);
        }
        self.custom
            .iter()
            .find(|(_, &code)| code == index.0)
            .map(|(pattern, _)| pattern.as_str())
    }

    pub fn contains(&self, index: FormatIndex) -> bool {
        self.pattern(index).is_some()
    }

    /// Custom formats in insertion order
    pub fn custom_formats(&self) -> impl Iterator<Item = (FormatIndex, &str)> {
        self.custom
            .iter()
            .map(|(pattern, &code)| (FormatIndex(code), pattern.as_str()))
    }

    pub fn custom_count(&self) -> usize {
        self.custom.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(builtin_format("General").unwrap(), FormatIndex(0));
        assert_eq!(builtin_format("m/d/yy").unwrap(), FormatIndex(0x0E));
        assert_eq!(builtin_format("m/d/yy h:mm").unwrap(), FormatIndex(0x16));
        assert_eq!(builtin_format("@").unwrap(), FormatIndex(0x31));
        assert_eq!(builtin_pattern(0x17), None);
    }

    #[test]
    fn test_unknown_builtin_fails() {
        let err = builtin_format("yyyy-mm-dd").unwrap_err();
        assert!(matches!(err, BiffError::UnknownFormat(p) if p == "yyyy-mm-dd"));
        assert!(builtin_format("").is_err());
    }

    #[test]
    fn test_intern_falls_through_to_custom() {
        let mut formats = DataFormats::new();
        assert_eq!(formats.intern("0.00").unwrap(), FormatIndex(2));
        let iso = formats.intern("yyyy-mm-dd").unwrap();
        let money = formats.intern("#,##0.000 \"EUR\"").unwrap();
        assert_eq!(iso, FormatIndex(164));
        assert_eq!(money, FormatIndex(165));
        assert_eq!(formats.intern("yyyy-mm-dd").unwrap(), iso);
        assert_eq!(formats.pattern(iso), Some("yyyy-mm-dd"));
        assert_eq!(formats.pattern(FormatIndex(200)), None);
        assert_eq!(formats.custom_count(), 2);
    }

    #[test]
    fn test_insert_with_code_keeps_file_codes() {
        let mut formats = DataFormats::new();
        assert_eq!(formats.insert_with_code(180, "0.0000").unwrap(), FormatIndex(180));
        assert_eq!(formats.insert_with_code(5, "ignored").unwrap(), FormatIndex(5));
        assert_eq!(formats.pattern(FormatIndex(180)), Some("0.0000"));
        assert_eq!(formats.intern("0.0").unwrap(), FormatIndex(181));
        // same pattern under a second code keeps the first
        assert_eq!(formats.insert_with_code(190, "0.0000").unwrap(), FormatIndex(180));
    }

    #[test]
    fn test_insert_with_code_rejects_clashing_codes() {
        let mut formats = DataFormats::new();
        formats.insert_with_code(170, "0.000").unwrap();
        let err = formats.insert_with_code(170, "0.0000").unwrap_err();
        assert!(matches!(err, BiffError::InvalidFormat(_)));
        assert_eq!(formats.pattern(FormatIndex(170)), Some("0.000"));
        assert_eq!(formats.custom_count(), 1);
    }

    #[test]
    fn test_intern_fails_past_last_code() {
        let mut formats = DataFormats::new();
        formats.insert_with_code(u16::MAX, "0.0000000").unwrap();
        assert!(matches!(
            formats.intern("0.000"),
            Err(BiffError::PoolFull { pool: "number format", .. })
        ));
        // known patterns still resolve
        assert_eq!(formats.intern("0.0000000").unwrap(), FormatIndex(u16::MAX));
        assert_eq!(formats.intern("General").unwrap(), FormatIndex(0));
        assert_eq!(formats.custom_count(), 1);
    }
}
