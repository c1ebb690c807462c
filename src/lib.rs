// BMU-EEPROM: codec and Intel HEX tooling for the battery management unit EEPROM

pub mod core;
pub mod formats;
pub mod memmap;

// Re-export commonly used types
pub use self::core::{
    apply_edit, decode_metadata, encode_metadata, find_current, layout::*, set_counter,
    validation, CurrentSlot, FieldEdit, FieldError, FormatRevision, MetadataRecord,
};
pub use formats::{load_eep, save_eep, ChecksumMode, DecodeOptions, EepError, HexError, ImageReport};
pub use memmap::{EepromImage, ImageError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
