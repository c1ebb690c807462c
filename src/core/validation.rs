// Metadata sanity checks and helpers
// Rules follow the EEPROM generator tool's argument checks

use super::metadata::{FormatRevision, MetadataRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationMessage {
    Warning(String),
    Error(String),
}

impl ValidationMessage {
    pub fn is_error(&self) -> bool {
        matches!(self, ValidationMessage::Error(_))
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, ValidationMessage::Warning(_))
    }

    pub fn message(&self) -> &str {
        match self {
            ValidationMessage::Warning(msg) | ValidationMessage::Error(msg) => msg,
        }
    }
}

/// Check a metadata record for values the firmware would reject or misread.
///
/// Advisory only: encoding does not depend on it.
pub fn validate_metadata(
    record: &MetadataRecord,
    revision: FormatRevision,
) -> Vec<ValidationMessage> {
    let mut messages = Vec::new();

    if record.max_charge_current < 0.0 {
        messages.push(ValidationMessage::Error(format!(
            "Charge current maximum must be a positive number (got {:.2} A)",
            record.max_charge_current
        )));
    }

    if record.max_discharge_current >= 0.0 {
        messages.push(ValidationMessage::Error(format!(
            "Discharge current maximum must be a negative number (got {:.2} A)",
            record.max_discharge_current
        )));
    }

    for (name, amps) in [
        ("Charge", record.max_charge_current),
        ("Discharge", record.max_discharge_current),
    ] {
        if revision.encode_current(amps).is_none() {
            messages.push(ValidationMessage::Error(format!(
                "{} current {:.2} A is outside the {} encoding range",
                name, amps, revision
            )));
        }
    }

    if record.sequential_count_mismatch > revision.max_count_mismatch() {
        messages.push(ValidationMessage::Error(format!(
            "Count mismatch {} exceeds {} for the {} format",
            record.sequential_count_mismatch,
            revision.max_count_mismatch(),
            revision
        )));
    }

    if record.expected_cell_count == 0 {
        messages.push(ValidationMessage::Warning(
            "Expected cell count is 0".to_string(),
        ));
    }

    if record.sequential_count_mismatch == 0 {
        messages.push(ValidationMessage::Warning(
            "Count mismatch reset is disabled (0)".to_string(),
        ));
    }

    messages
}

/// Error texts, in the order they were raised
pub fn errors(messages: &[ValidationMessage]) -> impl Iterator<Item = &str> + '_ {
    messages.iter().filter(|m| m.is_error()).map(|m| m.message())
}

/// Warning texts, in the order they were raised
pub fn warnings(messages: &[ValidationMessage]) -> impl Iterator<Item = &str> + '_ {
    messages.iter().filter(|m| m.is_warning()).map(|m| m.message())
}
