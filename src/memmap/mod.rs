// EEPROM image storage
pub mod image;

pub use image::{EepromImage, ImageError};
