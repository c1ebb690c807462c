// Decoded view of an image, for display or JSON export

use crate::core::frame_counter::{self, CurrentSlot, SlotInfo, SlotStatus};
use crate::core::metadata::{decode_metadata, FormatRevision, MetadataRecord};
use crate::memmap::EepromImage;
use serde::{Deserialize, Serialize};

/// Everything a front end needs to show an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageReport {
    pub revision: FormatRevision,
    pub metadata: MetadataRecord,

    /// None when every slot is unprogrammed
    pub current_counter: Option<CurrentSlot>,

    /// Programmed slots only; unprogrammed slots are omitted
    #[serde(default)]
    pub slots: Vec<SlotInfo>,
}

impl ImageReport {
    /// Decode an image into a report
    pub fn from_image(image: &EepromImage, revision: FormatRevision) -> Self {
        let slots = frame_counter::slots(image)
            .into_iter()
            .filter(|slot| slot.status != SlotStatus::Unprogrammed)
            .collect();

        Self {
            revision,
            metadata: decode_metadata(image, revision),
            current_counter: frame_counter::find_current(image),
            slots,
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
