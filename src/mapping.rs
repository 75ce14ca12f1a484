//! Slot addressing translation.
//!
//! The station exposes a flat 1-based slot index to callers while each
//! board only understands its own 0-based slot positions:
//!
//! - Slots 1-6   → Board 0, Slots 0-5
//! - Slots 7-12  → Board 1, Slots 0-5
//! - Slots 13-18 → Board 2, Slots 0-5
//! - Slots 19-24 → Board 3, Slots 0-5
//! - Slots 25-30 → Board 4, Slots 0-5
//!
//! Out-of-range input is rejected here, before any byte reaches the
//! bus; the boards are never relied on to reject bad addressing.

use crate::constants::{
    MAXIMUM_BOARD_ADDRESS, MAXIMUM_SLOT_ADDRESS, SLOTS_PER_BOARD, SLOT_INDEX_MAXIMUM,
    SLOT_INDEX_MINIMUM,
};
use crate::error::{Result, StationError};

/// A flat slot index resolved to its board-local addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotMapping {
    /// Board address in the daisy chain (0-4)
    pub board_address: u8,
    /// Slot position within the board (0-5)
    pub slot_in_board: u8,
}

/// Resolve a flat 1-based slot index (1-30) to board address and slot
/// position.
pub fn map_slot_to_board(slot_index: u8) -> Result<SlotMapping> {
    if !(SLOT_INDEX_MINIMUM..=SLOT_INDEX_MAXIMUM).contains(&slot_index) {
        return Err(StationError::SlotIndexOutOfRange { index: slot_index });
    }

    let zero_based = slot_index - 1;
    let board_address = zero_based / SLOTS_PER_BOARD;
    let slot_in_board = zero_based % SLOTS_PER_BOARD;

    if board_address > MAXIMUM_BOARD_ADDRESS {
        return Err(StationError::BoardAddressOutOfRange {
            board: board_address,
            max: MAXIMUM_BOARD_ADDRESS,
        });
    }

    Ok(SlotMapping {
        board_address,
        slot_in_board,
    })
}

/// Resolve a board address and slot position back to the flat 1-based
/// slot index.
pub fn map_board_to_slot(board_address: u8, slot_in_board: u8) -> Result<u8> {
    if board_address > MAXIMUM_BOARD_ADDRESS {
        return Err(StationError::BoardAddressOutOfRange {
            board: board_address,
            max: MAXIMUM_BOARD_ADDRESS,
        });
    }
    if slot_in_board > MAXIMUM_SLOT_ADDRESS {
        return Err(StationError::SlotOutOfRange {
            slot: slot_in_board,
            max: MAXIMUM_SLOT_ADDRESS,
        });
    }

    Ok(board_address * SLOTS_PER_BOARD + slot_in_board + 1)
}

/// LED addressing transform: the LED controller counts slots in the
/// opposite direction from every other opcode (0->5, 1->4, ...).
///
/// This inversion is specific to the LED path on current firmware.
/// Keep it a named, per-operation transform; it is not a universal
/// mapping and has only been confirmed for CMD_SET_LED.
pub fn led_slot_index(slot_in_board: u8) -> u8 {
    MAXIMUM_SLOT_ADDRESS - slot_in_board
}
