// Frame counter ring (bytes 0x0040-0x023F)
// Reference: module controller FRAMECOUNTER.c
//
// 128 slots of 4 bytes, each a big-endian counter. The slot holding the highest
// programmed value is the current one; 0xFFFFFFFF marks an unprogrammed slot.

use super::layout::{BYTES_PER_COUNTER, COUNTER_INVALID, COUNTER_SLOTS, FRAME_COUNTER_BASE};
use crate::memmap::EepromImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RingError {
    #[error("Slot {0} is outside the frame counter ring (0-127)")]
    SlotOutOfRange(usize),
}

pub type Result<T> = std::result::Result<T, RingError>;

/// The authoritative slot of the ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentSlot {
    pub index: usize,
    pub value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Unprogrammed,
    Stale,
    Current,
}

/// One row of the ring listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub index: usize,
    pub address: usize,
    pub value: u32,
    pub status: SlotStatus,
}

/// Image offset of a slot
pub fn slot_address(index: usize) -> usize {
    FRAME_COUNTER_BASE + index * BYTES_PER_COUNTER
}

/// Read the raw counter stored in a slot
pub fn read_slot(image: &EepromImage, index: usize) -> Result<u32> {
    check_index(index)?;
    Ok(u32::from_be_bytes(image.read(slot_address(index))))
}

/// Overwrite a single slot
pub fn write_slot(image: &mut EepromImage, index: usize, value: u32) -> Result<()> {
    check_index(index)?;
    image.write(slot_address(index), value.to_be_bytes());
    Ok(())
}

fn check_index(index: usize) -> Result<()> {
    if index >= COUNTER_SLOTS {
        return Err(RingError::SlotOutOfRange(index));
    }
    Ok(())
}

fn counters(image: &EepromImage) -> impl Iterator<Item = (usize, u32)> + '_ {
    (0..COUNTER_SLOTS).map(move |index| {
        let value = u32::from_be_bytes(image.read(slot_address(index)));
        (index, value)
    })
}

/// Scan the ring for the slot with the highest programmed value.
///
/// Ties go to the lowest index. Returns None when every slot is unprogrammed.
pub fn find_current(image: &EepromImage) -> Option<CurrentSlot> {
    let mut current: Option<CurrentSlot> = None;

    for (index, value) in counters(image) {
        if value == COUNTER_INVALID {
            continue;
        }
        match current {
            Some(best) if value <= best.value => {}
            _ => current = Some(CurrentSlot { index, value }),
        }
    }

    current
}

/// Write a new counter value into the current slot (slot 0 on an erased ring).
///
/// The value overwrites the current slot in place; it does not advance to the
/// next slot. Use [`rotate_counter`] for the firmware's wear-leveling move.
pub fn set_counter(image: &mut EepromImage, value: u32) -> usize {
    let index = find_current(image).map_or(0, |slot| slot.index);
    image.write(slot_address(index), value.to_be_bytes());

    tracing::debug!("Frame counter slot {} set to {}", index, value);
    index
}

/// Move the counter to the next slot, as the firmware does every 256 frames.
///
/// The current slot is marked unprogrammed and @value lands in the slot after it,
/// wrapping at the end of the ring. On an erased ring @value goes to slot 0.
pub fn rotate_counter(image: &mut EepromImage, value: u32) -> usize {
    let index = match find_current(image) {
        Some(slot) => {
            image.write(slot_address(slot.index), COUNTER_INVALID.to_be_bytes());
            (slot.index + 1) % COUNTER_SLOTS
        }
        None => 0,
    };
    image.write(slot_address(index), value.to_be_bytes());

    tracing::debug!("Frame counter rotated to slot {} with value {}", index, value);
    index
}

/// List every slot with its status
pub fn slots(image: &EepromImage) -> Vec<SlotInfo> {
    let current = find_current(image).map(|slot| slot.index);

    counters(image)
        .map(|(index, value)| {
            let status = if value == COUNTER_INVALID {
                SlotStatus::Unprogrammed
            } else if Some(index) == current {
                SlotStatus::Current
            } else {
                SlotStatus::Stale
            };

            SlotInfo {
                index,
                address: slot_address(index),
                value,
                status,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erased_ring_has_no_current() {
        let mut image = EepromImage::new();
        assert_eq!(find_current(&image), None);

        assert_eq!(set_counter(&mut image, 0), 0);
        assert_eq!(image.get(0x40, Some(4)).unwrap(), &[0, 0, 0, 0]);
        assert_eq!(find_current(&image), Some(CurrentSlot { index: 0, value: 0 }));
    }

    #[test]
    fn test_highest_value_wins() {
        let mut image = EepromImage::new();
        write_slot(&mut image, 3, 100).unwrap();
        write_slot(&mut image, 10, 5000).unwrap();
        write_slot(&mut image, 127, 4999).unwrap();

        let current = find_current(&image).unwrap();
        assert_eq!(current, CurrentSlot { index: 10, value: 5000 });

        // Scanning again without changes gives the same answer
        assert_eq!(find_current(&image), Some(current));
    }

    #[test]
    fn test_tie_goes_to_lowest_index() {
        let mut image = EepromImage::new();
        write_slot(&mut image, 20, 77).unwrap();
        write_slot(&mut image, 5, 77).unwrap();
        write_slot(&mut image, 90, 77).unwrap();

        assert_eq!(find_current(&image).unwrap().index, 5);
    }

    #[test]
    fn test_zero_is_a_valid_counter() {
        let mut image = EepromImage::new();
        write_slot(&mut image, 7, 0).unwrap();

        assert_eq!(find_current(&image), Some(CurrentSlot { index: 7, value: 0 }));
    }

    #[test]
    fn test_set_counter_overwrites_current_slot() {
        let mut image = EepromImage::new();
        write_slot(&mut image, 42, 0x0102_0304).unwrap();

        assert_eq!(set_counter(&mut image, 0x0A0B_0C0D), 42);
        assert_eq!(
            image.get(slot_address(42), Some(4)).unwrap(),
            &[0x0A, 0x0B, 0x0C, 0x0D]
        );
        assert_eq!(read_slot(&image, 43).unwrap(), COUNTER_INVALID);
    }

    #[test]
    fn test_rotate_counter() {
        let mut image = EepromImage::new();
        assert_eq!(rotate_counter(&mut image, 256), 0);
        assert_eq!(rotate_counter(&mut image, 512), 1);
        assert_eq!(read_slot(&image, 0).unwrap(), COUNTER_INVALID);
        assert_eq!(find_current(&image), Some(CurrentSlot { index: 1, value: 512 }));

        write_slot(&mut image, 1, COUNTER_INVALID).unwrap();
        write_slot(&mut image, 127, 1000).unwrap();
        assert_eq!(rotate_counter(&mut image, 1256), 0);
        assert_eq!(read_slot(&image, 127).unwrap(), COUNTER_INVALID);
    }

    #[test]
    fn test_slot_bounds() {
        let mut image = EepromImage::new();
        assert_eq!(read_slot(&image, 128), Err(RingError::SlotOutOfRange(128)));
        assert_eq!(write_slot(&mut image, 200, 1), Err(RingError::SlotOutOfRange(200)));
        assert_eq!(slot_address(127), 0x023C);
    }

    #[test]
    fn test_slot_listing() {
        let mut image = EepromImage::new();
        write_slot(&mut image, 1, 10).unwrap();
        write_slot(&mut image, 2, 11).unwrap();

        let listing = slots(&image);
        assert_eq!(listing.len(), COUNTER_SLOTS);
        assert_eq!(listing[0].status, SlotStatus::Unprogrammed);
        assert_eq!(listing[1].status, SlotStatus::Stale);
        assert_eq!(listing[2].status, SlotStatus::Current);
        assert_eq!(listing[2].address, 0x0048);
        assert_eq!(
            listing
                .iter()
                .filter(|s| s.status == SlotStatus::Current)
                .count(),
            1
        );
    }
}
