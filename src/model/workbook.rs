//! The workbook: ordered sheets plus the workbook-scoped resource pools

use super::cell::Cell;
use super::sheet::{validate_sheet_name, Sheet};
use crate::date::DateSystem;
use crate::error::{BiffError, Result};
use crate::tables::{
    formats, CellStyle, DataFormats, Font, FontIndex, FontTable, FormatIndex, SharedStrings,
    StringIndex, StyleIndex, StyleRegistry,
};

/// In-memory workbook
///
/// # Examples
///
/// ```
/// use biffbook::Workbook;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut workbook = Workbook::new();
/// let ruby = workbook.intern_string("Ruby");
/// let sheet = workbook.create_sheet("Sheet1")?;
/// let row = sheet.create_row(0)?;
/// row.create_cell(0)?.set_numeric_value(1.5);
/// row.create_cell(1)?.set_string_value(ruby);
///
/// let bytes = workbook.to_bytes()?;
/// let copy = Workbook::from_bytes(&bytes)?;
/// let cell = copy.sheet_at(0).and_then(|s| s.cell(0, 1)).ok_or("missing cell")?;
/// assert_eq!(copy.string_value(cell)?, "Ruby");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    strings: SharedStrings,
    fonts: FontTable,
    formats: DataFormats,
    styles: StyleRegistry,
    date_system: DateSystem,
    active_sheet: usize,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbook {
    pub fn new() -> Self {
        Workbook {
            sheets: Vec::new(),
            strings: SharedStrings::new(),
            fonts: FontTable::new(),
            formats: DataFormats::new(),
            styles: StyleRegistry::new(),
            date_system: DateSystem::default(),
            active_sheet: 0,
        }
    }

    /// Workbook with empty font and style pools, filled by the reader
    pub(crate) fn for_decoding(date_system: DateSystem) -> Self {
        Workbook {
            fonts: FontTable::empty(),
            styles: StyleRegistry::empty(),
            date_system,
            ..Workbook::new()
        }
    }

    /// Append a sheet. Names are unique regardless of case; a duplicate
    /// fails with `DuplicateName`.
    pub fn create_sheet(&mut self, name: &str) -> Result<&mut Sheet> {
        validate_sheet_name(name)?;
        if self.sheet_index(name).is_some() {
            return Err(BiffError::DuplicateName(name.to_string()));
        }
        self.sheets.push(Sheet::new(name, self.date_system));
        let last = self.sheets.len() - 1;
        Ok(&mut self.sheets[last])
    }

    pub fn number_of_sheets(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheet_at(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_at_mut(&mut self, index: usize) -> Option<&mut Sheet> {
        self.sheets.get_mut(index)
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheet_index(name).map(|i| &self.sheets[i])
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        let index = self.sheet_index(name)?;
        self.sheets.get_mut(index)
    }

    /// Position of the sheet called `name` (case-insensitive)
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|s| s.name().to_lowercase() == name.to_lowercase())
    }

    pub fn sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets.iter()
    }

    fn check_sheet_index(&self, index: usize) -> Result<()> {
        if index >= self.sheets.len() {
            return Err(BiffError::index(
                "sheet",
                index,
                self.sheets.len().saturating_sub(1),
            ));
        }
        Ok(())
    }

    pub fn set_sheet_name(&mut self, index: usize, name: &str) -> Result<()> {
        self.check_sheet_index(index)?;
        validate_sheet_name(name)?;
        if let Some(existing) = self.sheet_index(name) {
            if existing != index {
                return Err(BiffError::DuplicateName(name.to_string()));
            }
        }
        self.sheets[index].set_name(name);
        Ok(())
    }

    pub fn remove_sheet_at(&mut self, index: usize) -> Result<Sheet> {
        self.check_sheet_index(index)?;
        let removed = self.sheets.remove(index);
        if self.active_sheet > index || self.active_sheet >= self.sheets.len() {
            self.active_sheet = self.active_sheet.saturating_sub(1);
        }
        Ok(removed)
    }

    /// Move the sheet called `name` to position `position`
    pub fn set_sheet_order(&mut self, name: &str, position: usize) -> Result<()> {
        let from = self
            .sheet_index(name)
            .ok_or_else(|| BiffError::SheetNotFound(name.to_string()))?;
        self.check_sheet_index(position)?;
        let active_name = self.sheets.get(self.active_sheet).map(|s| s.name().to_string());
        let sheet = self.sheets.remove(from);
        self.sheets.insert(position, sheet);
        if let Some(active) = active_name.and_then(|n| self.sheet_index(&n)) {
            self.active_sheet = active;
        }
        Ok(())
    }

    /// Index of the sheet shown when the workbook is opened
    pub fn active_sheet_index(&self) -> usize {
        self.active_sheet
    }

    pub fn set_active_sheet(&mut self, index: usize) -> Result<()> {
        self.check_sheet_index(index)?;
        self.active_sheet = index;
        Ok(())
    }

    pub fn date_system(&self) -> DateSystem {
        self.date_system
    }

    /// Switch date systems; stored serials are left untouched
    pub fn set_date_system(&mut self, system: DateSystem) {
        self.date_system = system;
        for sheet in &mut self.sheets {
            sheet.set_date_system(system);
        }
    }

    pub fn intern_string(&mut self, text: &str) -> StringIndex {
        self.strings.intern(text)
    }

    pub fn string_at(&self, index: StringIndex) -> Option<&str> {
        self.strings.get(index)
    }

    /// Text of a STRING cell, resolved through the shared-string pool
    pub fn string_value(&self, cell: &Cell) -> Result<&str> {
        let index = cell.string_index()?;
        self.strings.get(index).ok_or_else(|| {
            BiffError::index("shared string", index.index(), self.strings.count().saturating_sub(1))
        })
    }

    /// A sheet together with the string pool, for filling text cells while
    /// the sheet is borrowed
    pub fn sheet_and_strings_mut(&mut self, index: usize) -> Option<(&mut Sheet, &mut SharedStrings)> {
        let sheet = self.sheets.get_mut(index)?;
        Some((sheet, &mut self.strings))
    }

    pub fn number_of_strings(&self) -> usize {
        self.strings.count()
    }

    pub fn strings(&self) -> &SharedStrings {
        &self.strings
    }

    pub(crate) fn strings_mut(&mut self) -> &mut SharedStrings {
        &mut self.strings
    }

    /// Intern a font; fails with `PoolFull` once the font table is full
    pub fn intern_font(&mut self, font: Font) -> Result<FontIndex> {
        self.fonts.intern(font)
    }

    pub fn find_font(&self, font: &Font) -> Option<FontIndex> {
        self.fonts.find(font)
    }

    pub fn font_at(&self, index: FontIndex) -> Option<&Font> {
        self.fonts.get(index)
    }

    pub fn number_of_fonts(&self) -> usize {
        self.fonts.len()
    }

    pub fn fonts(&self) -> &FontTable {
        &self.fonts
    }

    /// Resolve a pattern, interning it as a custom format when it is not
    /// built in
    pub fn intern_format(&mut self, pattern: &str) -> Result<FormatIndex> {
        self.formats.intern(pattern)
    }

    /// Resolve a built-in pattern; unknown patterns fail with
    /// `UnknownFormat`
    pub fn builtin_format(&self, pattern: &str) -> Result<FormatIndex> {
        formats::builtin_format(pattern)
    }

    pub fn format_pattern(&self, index: FormatIndex) -> Option<&str> {
        self.formats.pattern(index)
    }

    pub fn formats(&self) -> &DataFormats {
        &self.formats
    }

    pub(crate) fn formats_mut(&mut self) -> &mut DataFormats {
        &mut self.formats
    }

    /// Intern a style after checking its fields fit an XF record and its
    /// font and format exist
    pub fn intern_style(&mut self, style: CellStyle) -> Result<StyleIndex> {
        style.validate()?;
        if self.fonts.get(style.font).is_none() {
            return Err(BiffError::UnknownFont(style.font.0));
        }
        if !self.formats.contains(style.format) {
            return Err(BiffError::UnknownFormat(format!("code {}", style.format.0)));
        }
        self.styles.intern(style)
    }

    pub fn style_at(&self, index: StyleIndex) -> Option<&CellStyle> {
        self.styles.get(index)
    }

    pub fn number_of_styles(&self) -> usize {
        self.styles.len()
    }

    pub fn styles(&self) -> &StyleRegistry {
        &self.styles
    }

    /// Pattern string behind a cell style, following style -> format
    pub fn style_format_pattern(&self, index: StyleIndex) -> Option<&str> {
        self.styles
            .get(index)
            .and_then(|style| self.formats.pattern(style.format))
    }

    pub(crate) fn fonts_mut(&mut self) -> &mut FontTable {
        &mut self.fonts
    }

    pub(crate) fn styles_mut(&mut self) -> &mut StyleRegistry {
        &mut self.styles
    }
}
