// .eep / .hex file handling for EEPROM images
// The on-disk form is Intel HEX text, one 16-byte record per line

use super::ihex::{self, DecodeOptions, HexError};
use crate::memmap::EepromImage;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EepError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid Intel HEX file: {0}")]
    Hex(#[from] HexError),
}

pub type Result<T> = std::result::Result<T, EepError>;

/// Load an .eep file with default decode options (checksums not checked)
pub fn load_eep(filename: impl AsRef<Path>) -> Result<EepromImage> {
    load_eep_with(filename, &DecodeOptions::default())
}

/// Load an .eep file
pub fn load_eep_with(filename: impl AsRef<Path>, options: &DecodeOptions) -> Result<EepromImage> {
    let path = filename.as_ref();
    let text = fs::read_to_string(path)?;
    let image = ihex::decode_with(&text, options)?;

    tracing::info!("Loaded EEPROM image from {}", path.display());
    Ok(image)
}

/// Save the whole image to an .eep file
pub fn save_eep(filename: impl AsRef<Path>, image: &EepromImage) -> Result<()> {
    let path = filename.as_ref();
    fs::write(path, ihex::encode(image))?;

    tracing::info!("Saved EEPROM image to {}", path.display());
    Ok(())
}
