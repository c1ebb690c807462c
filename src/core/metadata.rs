// Metadata block codec (bytes 0x0000-0x003F)
//
// Two on-disk revisions exist for the same offsets. `Framework` is the native
// format written by the generator tool and read by current firmware; `Legacy` is
// kept as a compatibility mode for images produced by the first editor release.

use super::layout::{
    CURRENT_STEPS_PER_AMP, CURRENT_ZERO_RAW, EXPECTED_CELL_COUNT, LEGACY_CURRENT_SCALE,
    MAX_CHARGE_CURRENT, MAX_DISCHARGE_CURRENT, SEQUENTIAL_COUNT_MISMATCH, UNIQUE_ID,
};
use crate::memmap::EepromImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("{field} value {value} cannot be encoded in the {revision} format")]
    OutOfRange {
        field: Field,
        value: f64,
        revision: FormatRevision,
    },
}

pub type Result<T> = std::result::Result<T, FieldError>;

/// On-disk encoding of the metadata block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatRevision {
    /// First editor release: currents in 0.1 A counts, 16-bit mismatch counter
    Legacy,
    /// Current format: currents as 0.02 A steps above CURRENT_FLOOR, 8-bit mismatch counter
    #[default]
    Framework,
}

impl FormatRevision {
    /// Convert a stored 16-bit current into amps.
    ///
    /// Both rules divide an exact integer count, so every raw value decodes to the
    /// same f64 as its two-decimal literal (0x4F2A gives exactly -250.04).
    pub fn decode_current(self, raw: u16) -> f64 {
        match self {
            FormatRevision::Legacy => raw as f64 / LEGACY_CURRENT_SCALE,
            FormatRevision::Framework => (raw as f64 - CURRENT_ZERO_RAW) / CURRENT_STEPS_PER_AMP,
        }
    }

    /// Convert amps into the stored 16-bit value, rounding to the nearest step.
    /// Returns None when the value falls outside the encodable band.
    pub fn encode_current(self, amps: f64) -> Option<u16> {
        let units = match self {
            FormatRevision::Legacy => amps * LEGACY_CURRENT_SCALE,
            FormatRevision::Framework => amps * CURRENT_STEPS_PER_AMP + CURRENT_ZERO_RAW,
        };

        let raw = units.round();
        if !raw.is_finite() || raw < 0.0 || raw > u16::MAX as f64 {
            return None;
        }
        Some(raw as u16)
    }

    /// Largest value the sequential count mismatch field can hold
    pub fn max_count_mismatch(self) -> u16 {
        match self {
            FormatRevision::Legacy => u16::MAX,
            FormatRevision::Framework => u8::MAX as u16,
        }
    }
}

impl fmt::Display for FormatRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatRevision::Legacy => write!(f, "legacy"),
            FormatRevision::Framework => write!(f, "framework"),
        }
    }
}

/// Names of the metadata fields, used in errors and edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    UniqueId,
    ExpectedCellCount,
    MaxChargeCurrent,
    MaxDischargeCurrent,
    SequentialCountMismatch,
}

impl Field {
    /// Offset of the field in the image
    pub fn offset(self) -> usize {
        match self {
            Field::UniqueId => UNIQUE_ID,
            Field::ExpectedCellCount => EXPECTED_CELL_COUNT,
            Field::MaxChargeCurrent => MAX_CHARGE_CURRENT,
            Field::MaxDischargeCurrent => MAX_DISCHARGE_CURRENT,
            Field::SequentialCountMismatch => SEQUENTIAL_COUNT_MISMATCH,
        }
    }

    /// Width of the field in bytes for the given revision
    pub fn width(self, revision: FormatRevision) -> usize {
        match (self, revision) {
            (Field::UniqueId, _) => 4,
            (Field::ExpectedCellCount, _) => 1,
            (Field::MaxChargeCurrent | Field::MaxDischargeCurrent, _) => 2,
            (Field::SequentialCountMismatch, FormatRevision::Legacy) => 2,
            (Field::SequentialCountMismatch, FormatRevision::Framework) => 1,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::UniqueId => "unique ID",
            Field::ExpectedCellCount => "expected cell count",
            Field::MaxChargeCurrent => "max charge current",
            Field::MaxDischargeCurrent => "max discharge current",
            Field::SequentialCountMismatch => "sequential count mismatch",
        };
        f.write_str(name)
    }
}

/// Decoded metadata block. Currents are in amps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub unique_id: u32,
    pub expected_cell_count: u8,
    pub max_charge_current: f64,
    pub max_discharge_current: f64,
    pub sequential_count_mismatch: u16,
}

/// A single field change, applied to an image with [`apply_edit`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldEdit {
    UniqueId(u32),
    ExpectedCellCount(u8),
    MaxChargeCurrent(f64),
    MaxDischargeCurrent(f64),
    SequentialCountMismatch(u16),
}

impl FieldEdit {
    pub fn field(&self) -> Field {
        match self {
            FieldEdit::UniqueId(_) => Field::UniqueId,
            FieldEdit::ExpectedCellCount(_) => Field::ExpectedCellCount,
            FieldEdit::MaxChargeCurrent(_) => Field::MaxChargeCurrent,
            FieldEdit::MaxDischargeCurrent(_) => Field::MaxDischargeCurrent,
            FieldEdit::SequentialCountMismatch(_) => Field::SequentialCountMismatch,
        }
    }
}

/// Decode the metadata block. Every byte pattern decodes to some value.
pub fn decode_metadata(image: &EepromImage, revision: FormatRevision) -> MetadataRecord {
    let max_charge = u16::from_le_bytes(image.read(MAX_CHARGE_CURRENT));
    let max_discharge = u16::from_le_bytes(image.read(MAX_DISCHARGE_CURRENT));

    let sequential_count_mismatch = match Field::SequentialCountMismatch.width(revision) {
        2 => u16::from_le_bytes(image.read(SEQUENTIAL_COUNT_MISMATCH)),
        _ => u16::from(u8::from_le_bytes(image.read(SEQUENTIAL_COUNT_MISMATCH))),
    };

    MetadataRecord {
        unique_id: u32::from_le_bytes(image.read(UNIQUE_ID)),
        expected_cell_count: u8::from_le_bytes(image.read(EXPECTED_CELL_COUNT)),
        max_charge_current: revision.decode_current(max_charge),
        max_discharge_current: revision.decode_current(max_discharge),
        sequential_count_mismatch,
    }
}

/// Encode a full metadata record into the image.
///
/// All fields are checked before anything is written, so on error the image is
/// left untouched. Bytes of the metadata region not owned by a field are preserved.
pub fn encode_metadata(
    image: &mut EepromImage,
    revision: FormatRevision,
    record: &MetadataRecord,
) -> Result<()> {
    let edits = [
        FieldEdit::UniqueId(record.unique_id),
        FieldEdit::ExpectedCellCount(record.expected_cell_count),
        FieldEdit::MaxChargeCurrent(record.max_charge_current),
        FieldEdit::MaxDischargeCurrent(record.max_discharge_current),
        FieldEdit::SequentialCountMismatch(record.sequential_count_mismatch),
    ];

    let mut staged = Vec::with_capacity(edits.len());
    for edit in edits {
        staged.push(stage(revision, edit)?);
    }
    for raw in staged {
        raw.write_to(image);
    }

    tracing::debug!(
        "Encoded metadata ({}): id={:08X} cells={}",
        revision,
        record.unique_id,
        record.expected_cell_count
    );
    Ok(())
}

/// Apply a single field edit to the image
pub fn apply_edit(
    image: &mut EepromImage,
    revision: FormatRevision,
    edit: FieldEdit,
) -> Result<()> {
    let raw = stage(revision, edit)?;
    raw.write_to(image);

    tracing::debug!("Applied edit {:?} ({})", edit, revision);
    Ok(())
}

/// A field value already converted to its stored form
enum RawField {
    U8(usize, u8),
    U16(usize, u16),
    U32(usize, u32),
}

impl RawField {
    fn write_to(self, image: &mut EepromImage) {
        match self {
            RawField::U8(offset, v) => image.write(offset, v.to_le_bytes()),
            RawField::U16(offset, v) => image.write(offset, v.to_le_bytes()),
            RawField::U32(offset, v) => image.write(offset, v.to_le_bytes()),
        }
    }
}

fn stage(revision: FormatRevision, edit: FieldEdit) -> Result<RawField> {
    let field = edit.field();
    let out_of_range = |value: f64| FieldError::OutOfRange {
        field,
        value,
        revision,
    };

    let raw = match edit {
        FieldEdit::UniqueId(id) => RawField::U32(field.offset(), id),
        FieldEdit::ExpectedCellCount(cells) => RawField::U8(field.offset(), cells),
        FieldEdit::MaxChargeCurrent(amps) | FieldEdit::MaxDischargeCurrent(amps) => {
            let raw = revision
                .encode_current(amps)
                .ok_or_else(|| out_of_range(amps))?;
            RawField::U16(field.offset(), raw)
        }
        FieldEdit::SequentialCountMismatch(count) => match field.width(revision) {
            2 => RawField::U16(field.offset(), count),
            _ => {
                let byte = u8::try_from(count).map_err(|_| out_of_range(count as f64))?;
                RawField::U8(field.offset(), byte)
            }
        },
    };

    Ok(raw)
}
