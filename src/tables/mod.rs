//! Workbook-scoped, append-only resource pools
//!
//! Every pool deduplicates by structural equality and hands out a stable
//! index. Indices stay valid for the lifetime of the owning workbook since
//! nothing is ever removed from a pool.

pub mod fonts;
pub mod formats;
pub mod shared_strings;
pub mod styles;

pub use fonts::{Font, FontTable};
pub use formats::DataFormats;
pub use shared_strings::SharedStrings;
pub use styles::{Border, Borders, CellStyle, Fill, StyleRegistry};

macro_rules! pool_index {
    ($(#[$meta:meta])* $name:ident($repr:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub $repr);

        impl $name {
            /// Position in the owning pool
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl From<$name> for $repr {
            fn from(idx: $name) -> $repr {
                idx.0
            }
        }
    };
}

pool_index! {
    /// Handle of an interned shared string
    StringIndex(u32)
}

pool_index! {
    /// Handle of an interned font
    FontIndex(u16)
}

pool_index! {
    /// Number format code; built-in codes are below 164
    FormatIndex(u16)
}

pool_index! {
    /// Handle of an interned cell style
    StyleIndex(u16)
}
