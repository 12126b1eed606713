//! Font descriptors and the workbook font table

use super::FontIndex;
use crate::error::{BiffError, Result};
use crate::types::Underline;
use indexmap::IndexSet;

/// Palette index meaning "automatic" colour
pub const COLOR_AUTOMATIC: u16 = 0x7FFF;
pub const WEIGHT_NORMAL: u16 = 400;
pub const WEIGHT_BOLD: u16 = 700;
/// Fonts a workbook may hold
pub const MAX_FONTS: usize = 512;

/// A font, compared structurally
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Font {
    pub name: String,
    /// Height in twips (1/20 of a point)
    pub height: u16,
    /// 100..=1000, 400 normal, 700 bold
    pub weight: u16,
    pub italic: bool,
    pub strikeout: bool,
    pub underline: Underline,
    /// Palette colour index
    pub color: u16,
}

impl Default for Font {
    fn default() -> Self {
        Font {
            name: "Arial".to_string(),
            height: 200,
            weight: WEIGHT_NORMAL,
            italic: false,
            strikeout: false,
            underline: Underline::None,
            color: COLOR_AUTOMATIC,
        }
    }
}

impl Font {
    /// Create a font with the given name and size in points
    pub fn new(name: &str, points: u16) -> Self {
        Font {
            name: name.to_string(),
            height: points.saturating_mul(20),
            ..Font::default()
        }
    }

    pub fn with_bold(mut self, bold: bool) -> Self {
        self.weight = if bold { WEIGHT_BOLD } else { WEIGHT_NORMAL };
        self
    }

    pub fn with_italic(mut self, italic: bool) -> Self {
        self.italic = italic;
        self
    }

    pub fn with_strikeout(mut self, strikeout: bool) -> Self {
        self.strikeout = strikeout;
        self
    }

    pub fn with_underline(mut self, underline: Underline) -> Self {
        self.underline = underline;
        self
    }

    pub fn with_color(mut self, color: u16) -> Self {
        self.color = color;
        self
    }

    pub fn is_bold(&self) -> bool {
        self.weight >= WEIGHT_BOLD
    }

    pub fn height_in_points(&self) -> u16 {
        self.height / 20
    }
}

/// Deduplicated font pool; index 0 is the default font
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontTable {
    fonts: IndexSet<Font>,
}

impl Default for FontTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FontTable {
    pub fn new() -> Self {
        let mut fonts = IndexSet::new();
        fonts.insert(Font::default());
        FontTable { fonts }
    }

    /// Table with no entries, filled by the reader in file order
    pub(crate) fn empty() -> Self {
        FontTable {
            fonts: IndexSet::new(),
        }
    }

    /// Intern a font; fails once the table holds [`MAX_FONTS`] entries
    pub fn intern(&mut self, font: Font) -> Result<FontIndex> {
        if let Some(index) = self.find(&font) {
            return Ok(index);
        }
        if self.fonts.len() >= MAX_FONTS {
            return Err(BiffError::PoolFull {
                pool: "font",
                max: MAX_FONTS,
            });
        }
        let (index, _) = self.fonts.insert_full(font);
        Ok(FontIndex(index as u16))
    }

    pub fn find(&self, font: &Font) -> Option<FontIndex> {
        self.fonts.get_index_of(font).map(|i| FontIndex(i as u16))
    }

    pub fn get(&self, index: FontIndex) -> Option<&Font> {
        self.fonts.get_index(index.index())
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Font> {
        self.fonts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_font_is_first() {
        let table = FontTable::new();
        assert_eq!(table.len(), 1);
        let font = table.get(FontIndex(0)).unwrap();
        assert_eq!(font.name, "Arial");
        assert_eq!(font.height_in_points(), 10);
        assert!(!font.is_bold());
    }

    #[test]
    fn test_intern_deduplicates() {
        let mut table = FontTable::new();
        let bold = table.intern(Font::new("Arial", 12).with_bold(true)).unwrap();
        let again = table.intern(Font::new("Arial", 12).with_bold(true)).unwrap();
        let italic = table.intern(Font::new("Arial", 12).with_italic(true)).unwrap();

        assert_eq!(bold, again);
        assert_ne!(bold, italic);
        assert_eq!(table.len(), 3);
        assert_eq!(table.find(&Font::default()), Some(FontIndex(0)));
        assert_eq!(table.find(&Font::new("Courier", 9)), None);
    }

    #[test]
    fn test_intern_stops_at_font_limit() {
        let mut table = FontTable::new();
        for points in 1..MAX_FONTS as u16 {
            table.intern(Font::new("Times New Roman", points)).unwrap();
        }
        assert_eq!(table.len(), MAX_FONTS);
        assert!(matches!(
            table.intern(Font::new("Courier", 9)),
            Err(BiffError::PoolFull { pool: "font", max: MAX_FONTS })
        ));
        assert_eq!(table.intern(Font::default()).unwrap(), FontIndex(0));
    }
}
