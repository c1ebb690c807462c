//! Intel HEX transcoding for EEPROM images
//!
//! Only what the EEPROM tooling produces is understood: type 00 data records with
//! 16-bit addresses and the type 01 end-of-file record. Other record types are
//! parsed for shape and then ignored.

use crate::core::layout::EEPROM_SIZE;
use crate::memmap::EepromImage;
use nom::{
    bytes::complete::take_while_m_n,
    character::complete::char,
    error::{Error as NomError, ErrorKind},
    IResult,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HexError {
    #[error("Line {line}: malformed record: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Line {line}: checksum mismatch (expected {expected:02X}, found {found:02X})")]
    ChecksumMismatch { line: usize, expected: u8, found: u8 },

    #[error("Record payload of {0} bytes exceeds the 255-byte limit")]
    PayloadTooLong(usize),
}

pub type Result<T> = std::result::Result<T, HexError>;

/// Payload bytes per data record written by [`encode`]
pub const RECORD_SIZE: usize = 16;

/// End-of-file record terminating every file
pub const EOF_RECORD: &str = ":00000001FF";

/// Shortest possible record: ':' + count + address + type + checksum
const MIN_RECORD_LEN: usize = 11;

/// Largest payload a single record can carry
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

pub const RECORD_DATA: u8 = 0x00;
pub const RECORD_EOF: u8 = 0x01;

/// How record checksums are treated on decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumMode {
    /// Read the checksum but do not check it (what the EEPROM editor has always done)
    #[default]
    Lenient,
    /// Reject any record whose checksum does not match its contents
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    pub checksum: ChecksumMode,
    /// Value of image bytes not covered by any data record
    pub fill: u8,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            checksum: ChecksumMode::default(),
            fill: crate::core::layout::ERASED_BYTE,
        }
    }
}

impl DecodeOptions {
    pub fn strict() -> Self {
        Self {
            checksum: ChecksumMode::Strict,
            ..Self::default()
        }
    }
}

/// One parsed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexRecord {
    pub address: u16,
    pub record_type: u8,
    pub data: Vec<u8>,
    pub checksum: u8,
}

impl HexRecord {
    /// Checksum the record should carry for its contents
    pub fn computed_checksum(&self) -> u8 {
        checksum(self.address, self.record_type, &self.data)
    }
}

/// Two's complement of the byte sum of count, address, type and payload.
///
/// The byte count field is one byte wide, so @data must be at most
/// [`MAX_PAYLOAD`] bytes; longer slices cannot form a record and give a
/// meaningless result.
pub fn checksum(address: u16, record_type: u8, data: &[u8]) -> u8 {
    let [hi, lo] = address.to_be_bytes();
    let header = (data.len() as u8)
        .wrapping_add(hi)
        .wrapping_add(lo)
        .wrapping_add(record_type);
    let sum = data.iter().fold(header, |acc, &b| acc.wrapping_add(b));
    sum.wrapping_neg()
}

/// Parse two hex digits
fn hex_u8(input: &str) -> IResult<&str, u8> {
    let (rest, digits) = take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit())(input)?;
    let value = u8::from_str_radix(digits, 16)
        .map_err(|_| nom::Err::Error(NomError::new(input, ErrorKind::HexDigit)))?;
    Ok((rest, value))
}

/// Parse four hex digits
fn hex_u16(input: &str) -> IResult<&str, u16> {
    let (rest, digits) = take_while_m_n(4, 4, |c: char| c.is_ascii_hexdigit())(input)?;
    let value = u16::from_str_radix(digits, 16)
        .map_err(|_| nom::Err::Error(NomError::new(input, ErrorKind::HexDigit)))?;
    Ok((rest, value))
}

/// Parse @count hex-encoded bytes
fn hex_bytes<'a>(count: usize) -> impl Fn(&'a str) -> IResult<&'a str, Vec<u8>> {
    move |mut input: &'a str| {
        let mut bytes = Vec::with_capacity(count);
        for _ in 0..count {
            let (rest, byte) = hex_u8(input)?;
            bytes.push(byte);
            input = rest;
        }
        Ok((input, bytes))
    }
}

/// Parse a full record: `:CCAAAATT<data>SS`
fn record(input: &str) -> IResult<&str, HexRecord> {
    let (input, _) = char(':')(input)?;
    let (input, byte_count) = hex_u8(input)?;
    let (input, address) = hex_u16(input)?;
    let (input, record_type) = hex_u8(input)?;
    let (input, data) = hex_bytes(byte_count as usize)(input)?;
    let (input, checksum) = hex_u8(input)?;

    Ok((
        input,
        HexRecord {
            address,
            record_type,
            data,
            checksum,
        },
    ))
}

/// Parse one line of text into a record. @line_no is only used for errors.
pub fn parse_record(line_no: usize, line: &str) -> Result<HexRecord> {
    let malformed = |reason: String| HexError::MalformedRecord {
        line: line_no,
        reason,
    };

    if line.len() < MIN_RECORD_LEN {
        return Err(malformed(format!(
            "record too short ({} characters, need at least {})",
            line.len(),
            MIN_RECORD_LEN
        )));
    }

    let (rest, rec) = record(line).map_err(|err| match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => malformed(format!(
            "invalid or missing hex digits at column {}",
            line.len() - e.input.len() + 1
        )),
        nom::Err::Incomplete(_) => malformed("incomplete record".to_string()),
    })?;

    if !rest.is_empty() {
        return Err(malformed(format!(
            "byte count {:02X} does not match record length ({} extra characters)",
            rec.data.len(),
            rest.len()
        )));
    }

    Ok(rec)
}

/// Decode Intel HEX text into an image, ignoring checksums
pub fn decode(text: &str) -> Result<EepromImage> {
    decode_with(text, &DecodeOptions::default())
}

/// Decode Intel HEX text into an image.
///
/// Lines not starting with ':' are skipped. Data bytes addressed past the end of
/// the image are dropped. Any malformed record fails the whole decode; no partial
/// image is returned.
pub fn decode_with(text: &str, options: &DecodeOptions) -> Result<EepromImage> {
    let mut image = EepromImage::filled(options.fill);
    let mut records = 0usize;
    let mut dropped = 0usize;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim_end();

        // Only lines starting with ':' in the first column are records
        if !line.starts_with(':') {
            if !line.trim_start().is_empty() {
                tracing::debug!("Skipping line {}: not a record", line_no);
            }
            continue;
        }

        let rec = parse_record(line_no, line)?;

        if options.checksum == ChecksumMode::Strict {
            let expected = rec.computed_checksum();
            if expected != rec.checksum {
                return Err(HexError::ChecksumMismatch {
                    line: line_no,
                    expected,
                    found: rec.checksum,
                });
            }
        }

        records += 1;
        match rec.record_type {
            RECORD_DATA => {
                for (addr, &byte) in (rec.address as usize..).zip(&rec.data) {
                    if image.set_byte(addr, byte).is_err() {
                        dropped += 1;
                    }
                }
            }
            RECORD_EOF => tracing::debug!("End of file record on line {}", line_no),
            other => tracing::debug!("Ignoring record type {:02X} on line {}", other, line_no),
        }
    }

    if dropped > 0 {
        tracing::warn!(
            "Dropped {} data bytes addressed beyond the {}-byte image",
            dropped,
            EEPROM_SIZE
        );
    }
    tracing::debug!("Decoded {} records", records);

    Ok(image)
}

/// Format a single record line, without line terminator
pub fn format_record(address: u16, record_type: u8, data: &[u8]) -> Result<String> {
    if data.len() > MAX_PAYLOAD {
        return Err(HexError::PayloadTooLong(data.len()));
    }
    Ok(write_record(address, record_type, data))
}

/// Caller guarantees `data.len() <= MAX_PAYLOAD`
fn write_record(address: u16, record_type: u8, data: &[u8]) -> String {
    let mut line = String::with_capacity(MIN_RECORD_LEN + data.len() * 2);

    line.push_str(&format!(":{:02X}{:04X}{:02X}", data.len(), address, record_type));
    for byte in data {
        line.push_str(&format!("{:02X}", byte));
    }
    line.push_str(&format!("{:02X}", checksum(address, record_type, data)));

    line
}

/// Encode the whole image as 16-byte data records followed by the EOF record
pub fn encode(image: &EepromImage) -> String {
    let mut output = String::with_capacity((EEPROM_SIZE / RECORD_SIZE + 1) * 44);

    for (i, chunk) in image.as_bytes().chunks(RECORD_SIZE).enumerate() {
        let address = (i * RECORD_SIZE) as u16;
        output.push_str(&write_record(address, RECORD_DATA, chunk));
        output.push('\n');
    }

    output.push_str(EOF_RECORD);
    output.push('\n');

    output
}
