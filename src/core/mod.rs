// Core EEPROM codecs: layout, metadata block and frame counter ring
pub mod frame_counter;
pub mod layout;
pub mod metadata;
pub mod validation;

// Re-export commonly used types
pub use frame_counter::{find_current, set_counter, CurrentSlot, SlotInfo, SlotStatus};
pub use layout::*;
pub use metadata::{
    apply_edit, decode_metadata, encode_metadata, Field, FieldEdit, FieldError, FormatRevision,
    MetadataRecord,
};
pub use validation::ValidationMessage;
