//! Cell style descriptors and the style registry

use super::{FontIndex, FormatIndex, StyleIndex};
use crate::error::{BiffError, Result};
use crate::types::{BorderStyle, FillPattern, HorizontalAlignment, VerticalAlignment};
use indexmap::IndexSet;

/// Palette index of the default foreground colour
pub const COLOR_DEFAULT_FOREGROUND: u16 = 0x40;
/// Palette index of the default background colour
pub const COLOR_DEFAULT_BACKGROUND: u16 = 0x41;
/// Largest palette index an XF record can carry (7 bits)
pub const MAX_PALETTE_INDEX: u16 = 0x7F;
/// Largest indent level an XF record can carry (4 bits)
pub const MAX_INDENT: u8 = 15;
/// Cell styles that fit next to the 15 style XFs in a 4050-XF file
pub const MAX_STYLES: usize = 4050 - 15;

/// One side of a cell border
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Border {
    pub style: BorderStyle,
    /// 7-bit palette index
    pub color: u16,
}

impl Default for Border {
    fn default() -> Self {
        Border {
            style: BorderStyle::None,
            color: COLOR_DEFAULT_FOREGROUND,
        }
    }
}

impl Border {
    pub fn new(style: BorderStyle) -> Self {
        Border {
            style,
            ..Border::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Borders {
    pub left: Border,
    pub right: Border,
    pub top: Border,
    pub bottom: Border,
}

impl Borders {
    /// Same border on all four sides
    pub fn all(style: BorderStyle) -> Self {
        let side = Border::new(style);
        Borders {
            left: side,
            right: side,
            top: side,
            bottom: side,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fill {
    pub pattern: FillPattern,
    pub foreground: u16,
    pub background: u16,
}

impl Default for Fill {
    fn default() -> Self {
        Fill {
            pattern: FillPattern::NoFill,
            foreground: COLOR_DEFAULT_FOREGROUND,
            background: COLOR_DEFAULT_BACKGROUND,
        }
    }
}

impl Fill {
    pub fn solid(color: u16) -> Self {
        Fill {
            pattern: FillPattern::SolidForeground,
            foreground: color,
            ..Fill::default()
        }
    }
}

/// Formatting of a cell, deduplicated by structural equality
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellStyle {
    pub font: FontIndex,
    pub format: FormatIndex,
    pub horizontal: HorizontalAlignment,
    pub vertical: VerticalAlignment,
    pub wrap_text: bool,
    /// Indent level, 0..=15
    pub indent: u8,
    /// 0..=90 counter-clockwise, 91..=180 clockwise, 255 stacked
    pub rotation: u8,
    pub borders: Borders,
    pub fill: Fill,
    pub locked: bool,
    pub hidden: bool,
}

impl Default for CellStyle {
    fn default() -> Self {
        CellStyle {
            font: FontIndex(0),
            format: FormatIndex(0),
            horizontal: HorizontalAlignment::General,
            vertical: VerticalAlignment::Bottom,
            wrap_text: false,
            indent: 0,
            rotation: 0,
            borders: Borders::default(),
            fill: Fill::default(),
            locked: true,
            hidden: false,
        }
    }
}

impl CellStyle {
    pub fn with_font(mut self, font: FontIndex) -> Self {
        self.font = font;
        self
    }

    pub fn with_format(mut self, format: FormatIndex) -> Self {
        self.format = format;
        self
    }

    pub fn with_alignment(mut self, horizontal: HorizontalAlignment, vertical: VerticalAlignment) -> Self {
        self.horizontal = horizontal;
        self.vertical = vertical;
        self
    }

    pub fn with_wrap_text(mut self, wrap: bool) -> Self {
        self.wrap_text = wrap;
        self
    }

    pub fn with_borders(mut self, borders: Borders) -> Self {
        self.borders = borders;
        self
    }

    pub fn with_fill(mut self, fill: Fill) -> Self {
        self.fill = fill;
        self
    }

    /// Check that every field fits its XF bit field
    pub fn validate(&self) -> Result<()> {
        let b = &self.borders;
        let colors = [
            ("left border colour", b.left.color),
            ("right border colour", b.right.color),
            ("top border colour", b.top.color),
            ("bottom border colour", b.bottom.color),
            ("fill foreground colour", self.fill.foreground),
            ("fill background colour", self.fill.background),
        ];
        for (what, color) in colors {
            if color > MAX_PALETTE_INDEX {
                return Err(BiffError::index(what, color as usize, MAX_PALETTE_INDEX as usize));
            }
        }
        if self.indent > MAX_INDENT {
            return Err(BiffError::index("indent", self.indent as usize, MAX_INDENT as usize));
        }
        Ok(())
    }
}

/// Deduplicated style pool; index 0 is the default cell style
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRegistry {
    styles: IndexSet<CellStyle>,
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleRegistry {
    pub fn new() -> Self {
        let mut styles = IndexSet::new();
        styles.insert(CellStyle::default());
        StyleRegistry { styles }
    }

    pub(crate) fn empty() -> Self {
        StyleRegistry {
            styles: IndexSet::new(),
        }
    }

    /// Intern a style; fails once the pool holds [`MAX_STYLES`] entries
    pub fn intern(&mut self, style: CellStyle) -> Result<StyleIndex> {
        if let Some(index) = self.styles.get_index_of(&style) {
            return Ok(StyleIndex(index as u16));
        }
        if self.styles.len() >= MAX_STYLES {
            return Err(BiffError::PoolFull {
                pool: "style",
                max: MAX_STYLES,
            });
        }
        let (index, _) = self.styles.insert_full(style);
        Ok(StyleIndex(index as u16))
    }

    pub fn get(&self, index: StyleIndex) -> Option<&CellStyle> {
        self.styles.get_index(index.index())
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CellStyle> {
        self.styles.iter()
    }
}
