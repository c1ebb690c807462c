// File format handlers
pub mod eep;
pub mod ihex;
pub mod report;

pub use eep::{load_eep, load_eep_with, save_eep, EepError};
pub use ihex::{ChecksumMode, DecodeOptions, HexError};
pub use report::ImageReport;
