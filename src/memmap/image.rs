// Fixed-size EEPROM image for the battery management unit
// Layout reference: module controller EEPROM map (2K part)

use crate::core::layout::{EEPROM_SIZE, ERASED_BYTE};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    #[error("Image size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, ImageError>;

/// In-memory copy of the whole EEPROM.
///
/// The buffer is always exactly [`EEPROM_SIZE`] bytes. A fresh image holds the
/// erased pattern (0xFF in every byte), which is what an unprogrammed part reads back.
#[derive(Clone, PartialEq, Eq)]
pub struct EepromImage {
    data: [u8; EEPROM_SIZE],
}

impl EepromImage {
    /// Create an erased image
    pub fn new() -> Self {
        Self::filled(ERASED_BYTE)
    }

    /// Create an image with every byte set to @fill
    pub fn filled(fill: u8) -> Self {
        Self {
            data: [fill; EEPROM_SIZE],
        }
    }

    /// Create an image from a raw dump, which must be exactly EEPROM_SIZE bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != EEPROM_SIZE {
            return Err(ImageError::SizeMismatch {
                expected: EEPROM_SIZE,
                actual: bytes.len(),
            });
        }

        let mut image = Self::new();
        image.data.copy_from_slice(bytes);
        Ok(image)
    }

    /// Size of the image in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false; kept so the type reads like a collection
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get a chunk of memory from @start for @length bytes
    /// If length is None, returns all data from @start to end
    pub fn get(&self, start: usize, length: Option<usize>) -> Result<&[u8]> {
        let end = self.checked_end(start, length)?;
        Ok(&self.data[start..end])
    }

    /// Get a mutable chunk of memory
    pub fn get_mut(&mut self, start: usize, length: Option<usize>) -> Result<&mut [u8]> {
        let end = self.checked_end(start, length)?;
        Ok(&mut self.data[start..end])
    }

    /// Set a byte at position @pos to @value
    pub fn set_byte(&mut self, pos: usize, value: u8) -> Result<()> {
        if pos >= self.data.len() {
            return Err(ImageError::IndexOutOfBounds(pos));
        }
        self.data[pos] = value;
        Ok(())
    }

    /// Set a chunk of bytes starting at @pos
    pub fn set_bytes(&mut self, pos: usize, bytes: &[u8]) -> Result<()> {
        let end = pos
            .checked_add(bytes.len())
            .ok_or(ImageError::IndexOutOfBounds(pos))?;
        if end > self.data.len() {
            return Err(ImageError::IndexOutOfBounds(end));
        }
        self.data[pos..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Reset every byte to the erased pattern
    pub fn erase(&mut self) {
        self.data.fill(ERASED_BYTE);
    }

    /// Get the entire image as raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Read a fixed-width field.
    ///
    /// Only used with the layout constants, which are in range by construction;
    /// panics if `offset + N` runs past the end of the image.
    pub(crate) fn read<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[offset..offset + N]);
        out
    }

    /// Write a fixed-width field. Same range contract as [`EepromImage::read`].
    pub(crate) fn write<const N: usize>(&mut self, offset: usize, bytes: [u8; N]) {
        self.data[offset..offset + N].copy_from_slice(&bytes);
    }

    /// Get a printable hex representation of the image
    pub fn printable(&self, start: Option<usize>, end: Option<usize>) -> String {
        let start = start.unwrap_or(0).min(self.data.len());
        let end = end.unwrap_or(self.data.len()).clamp(start, self.data.len());

        hexdump(&self.data[start..end], start)
    }

    fn checked_end(&self, start: usize, length: Option<usize>) -> Result<usize> {
        if start > self.data.len() {
            return Err(ImageError::IndexOutOfBounds(start));
        }

        match length {
            Some(len) => {
                let end = start
                    .checked_add(len)
                    .ok_or(ImageError::IndexOutOfBounds(start))?;
                if end > self.data.len() {
                    return Err(ImageError::IndexOutOfBounds(end));
                }
                Ok(end)
            }
            None => Ok(self.data.len()),
        }
    }
}

impl Default for EepromImage {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<&[u8]> for EepromImage {
    type Error = ImageError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes(bytes)
    }
}

impl AsRef<[u8]> for EepromImage {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for EepromImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let programmed = self.data.iter().filter(|&&b| b != ERASED_BYTE).count();
        f.debug_struct("EepromImage")
            .field("len", &self.data.len())
            .field("programmed_bytes", &programmed)
            .finish()
    }
}

impl fmt::Display for EepromImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EepromImage({} bytes)", self.data.len())
    }
}

/// Hex dump with 16 bytes per row: "ADDR: XX XX ..   ascii"
fn hexdump(data: &[u8], base: usize) -> String {
    let mut output = String::new();

    for (i, chunk) in data.chunks(16).enumerate() {
        output.push_str(&format!("{:04X}: ", base + i * 16));

        for byte in chunk {
            output.push_str(&format!("{:02X} ", byte));
        }

        // Keep the ASCII column aligned on a short final row
        for _ in chunk.len()..16 {
            output.push_str("   ");
        }

        output.push_str("  ");
        for &byte in chunk {
            if (0x20..0x7f).contains(&byte) {
                output.push(byte as char);
            } else {
                output.push('.');
            }
        }
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_image_is_erased() {
        let image = EepromImage::new();
        assert_eq!(image.len(), EEPROM_SIZE);
        assert!(!image.is_empty());
        assert!(image.as_bytes().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_from_bytes_size_check() {
        assert_eq!(
            EepromImage::from_bytes(&[0u8; 16]),
            Err(ImageError::SizeMismatch {
                expected: EEPROM_SIZE,
                actual: 16
            })
        );

        let raw = vec![0x5Au8; EEPROM_SIZE];
        let image = EepromImage::try_from(raw.as_slice()).unwrap();
        assert_eq!(image.as_bytes(), raw.as_slice());
    }

    #[test]
    fn test_get_set() {
        let mut image = EepromImage::new();

        image.set_byte(5, 0x42).unwrap();
        assert_eq!(image.get(5, Some(1)).unwrap()[0], 0x42);

        image.set_bytes(0, &[1, 2, 3]).unwrap();
        assert_eq!(image.get(0, Some(3)).unwrap(), &[1, 2, 3]);

        image.get_mut(10, Some(2)).unwrap().copy_from_slice(&[7, 8]);
        assert_eq!(image.get(10, Some(2)).unwrap(), &[7, 8]);

        assert_eq!(image.get(EEPROM_SIZE - 2, None).unwrap(), &[0xFF, 0xFF]);
    }

    #[test]
    fn test_bounds_checking() {
        let mut image = EepromImage::new();

        assert!(image.get(EEPROM_SIZE + 1, Some(1)).is_err());
        assert!(image.get(EEPROM_SIZE - 1, Some(2)).is_err());
        assert!(image.get(usize::MAX, None).is_err());
        assert!(image.set_byte(EEPROM_SIZE, 0).is_err());
        assert!(image.set_bytes(EEPROM_SIZE - 1, &[1, 2]).is_err());
        assert!(image.set_bytes(usize::MAX, &[1]).is_err());
        assert!(image.get(0, Some(usize::MAX)).is_err());
    }

    #[test]
    fn test_fixed_width_access() {
        let mut image = EepromImage::new();
        image.write(0x40, [0x00, 0x00, 0x01, 0x02]);
        assert_eq!(image.read::<4>(0x40), [0x00, 0x00, 0x01, 0x02]);
        assert_eq!(image.read::<2>(0x44), [0xFF, 0xFF]);
    }

    #[test]
    fn test_erase() {
        let mut image = EepromImage::filled(0x00);
        image.erase();
        assert_eq!(image, EepromImage::new());
    }

    #[test]
    fn test_hexdump() {
        let mut image = EepromImage::new();
        image.set_bytes(0, b"ABC").unwrap();

        let dump = image.printable(None, Some(32));
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0000: 41 42 43 FF"));
        assert!(lines[0].ends_with("ABC............."));
        assert!(lines[1].starts_with("0010: FF"));

        let tail = image.printable(Some(0x7F8), None);
        assert!(tail.starts_with("07F8: "));
        assert_eq!(tail.lines().count(), 1);
    }
}
