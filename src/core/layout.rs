// EEPROM layout constants shared by the module controller firmware and host tools
// Reference: module controller EEPROM.h / FRAMECOUNTER.c

/// Size of the EEPROM part in bytes
pub const EEPROM_SIZE: usize = 2048;

/// Value of every byte on an erased part
pub const ERASED_BYTE: u8 = 0xFF;

/// First 64 bytes (0x00-0x3F) are reserved for metadata
pub const METADATA_BASE: usize = 0x0000;
pub const METADATA_SIZE: usize = 64;

// Metadata field offsets
pub const UNIQUE_ID: usize = METADATA_BASE;
pub const EXPECTED_CELL_COUNT: usize = UNIQUE_ID + 4;
pub const MAX_CHARGE_CURRENT: usize = EXPECTED_CELL_COUNT + 1;
pub const MAX_DISCHARGE_CURRENT: usize = MAX_CHARGE_CURRENT + 2;
pub const SEQUENTIAL_COUNT_MISMATCH: usize = MAX_DISCHARGE_CURRENT + 2;

/// Frame counter area (0x0040 - 0x023F), 512 bytes for wear leveling
pub const FRAME_COUNTER_BASE: usize = 0x0040;
pub const FRAME_COUNTER_SIZE: usize = 512;
pub const BYTES_PER_COUNTER: usize = 4;
pub const COUNTER_SLOTS: usize = FRAME_COUNTER_SIZE / BYTES_PER_COUNTER;

/// Counter value of an unprogrammed slot
pub const COUNTER_INVALID: u32 = 0xFFFF_FFFF;

/// Framework raw value that stands for 0 A
pub const CURRENT_ZERO_RAW: f64 = 32768.0;

/// Framework encoding resolution: 0.02 A per count
pub const CURRENT_STEPS_PER_AMP: f64 = 50.0;

/// Lowest current representable by the framework encoding (raw 0x0000), in amps
pub const CURRENT_FLOOR: f64 = -CURRENT_ZERO_RAW / CURRENT_STEPS_PER_AMP;

/// Highest current representable by the framework encoding (raw 0xFFFF), in amps
pub const CURRENT_CEILING: f64 = (u16::MAX as f64 - CURRENT_ZERO_RAW) / CURRENT_STEPS_PER_AMP;

/// Legacy encoding stores currents as counts of 0.1 A
pub const LEGACY_CURRENT_SCALE: f64 = 10.0;
