//! Shared strings table for string deduplication

use super::StringIndex;
use indexmap::IndexSet;

/// Shared strings table that deduplicates strings across the workbook
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedStrings {
    strings: IndexSet<String>,
}

impl SharedStrings {
    pub fn new() -> Self {
        SharedStrings {
            strings: IndexSet::with_capacity(64),
        }
    }

    /// Add a string and get its index
    pub fn intern(&mut self, s: &str) -> StringIndex {
        if let Some(index) = self.strings.get_index_of(s) {
            return StringIndex(index as u32);
        }
        let (index, _) = self.strings.insert_full(s.to_string());
        StringIndex(index as u32)
    }

    pub fn get(&self, index: StringIndex) -> Option<&str> {
        self.strings.get_index(index.index()).map(String::as_str)
    }

    pub fn index_of(&self, s: &str) -> Option<StringIndex> {
        self.strings.get_index_of(s).map(|i| StringIndex(i as u32))
    }

    /// Get number of unique strings
    pub fn count(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }
}
