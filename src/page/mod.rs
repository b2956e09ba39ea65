//! Slotted page format shared by heap pages, catalog pages, and the free
//! list.
//!
//! Layout of a [`PAGE_SIZE`]-byte page:
//!
//! ```text
//! [0..2)   flags           (u16, bit 0 = is-first-catalog-page, see catalog)
//! [2..4)   slot_count      (u16)
//! [4..6)   free_offset     (u16, start of the free region, grows downward)
//! [6..10)  next_page       (u32, PageId or 0)
//! [10..14) checksum        (u32, CRC32 of bytes [14..free_offset) ++ slots)
//! [14..)   slot directory, growing forward: each slot is
//!          (offset: u16, length: u16); length == 0 means a tombstoned
//!          (deleted) slot.
//! ```
//!
//! Row payloads are appended at `free_offset` and grow backward from the
//! end of the page toward the slot directory; a page is full when the
//! slot directory and the payload region would overlap.

use crate::error::{GraniteError, Result};
use crate::pager::PAGE_SIZE;

const HEADER_SIZE: usize = 14;
const SLOT_SIZE: usize = 4;

/// A slot-local row identifier within a page.
pub type SlotId = u16;

/// A decoded slot directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub offset: u16,
    pub length: u16,
}

impl Slot {
    /// A slot with `length == 0` marks a deleted row; its offset is
    /// meaningless and the space is not reclaimed until the page is
    /// rewritten by a future insert that needs the room.
    pub fn is_tombstone(&self) -> bool {
        self.length == 0
    }
}

/// A mutable view over one slotted page buffer.
pub struct SlottedPage<'a> {
    buf: &'a mut [u8; PAGE_SIZE],
}

impl<'a> SlottedPage<'a> {
    /// Wrap an existing buffer without resetting it.
    pub fn new(buf: &'a mut [u8; PAGE_SIZE]) -> Self {
        SlottedPage { buf }
    }

    /// Initialize a freshly allocated page as an empty slotted page.
    pub fn init(buf: &'a mut [u8; PAGE_SIZE], next_page: u32) -> Self {
        let mut page = SlottedPage { buf };
        page.set_slot_count(0);
        page.set_free_offset(PAGE_SIZE as u16);
        page.set_next_page(next_page);
        page.write_checksum();
        page
    }

    pub fn slot_count(&self) -> u16 {
        u16::from_le_bytes([self.buf[2], self.buf[3]])
    }

    fn set_slot_count(&mut self, n: u16) {
        self.buf[2..4].copy_from_slice(&n.to_le_bytes());
    }

    fn free_offset(&self) -> u16 {
        u16::from_le_bytes([self.buf[4], self.buf[5]])
    }

    fn set_free_offset(&mut self, offset: u16) {
        self.buf[4..6].copy_from_slice(&offset.to_le_bytes());
    }

    pub fn next_page(&self) -> u32 {
        u32::from_le_bytes([self.buf[6], self.buf[7], self.buf[8], self.buf[9]])
    }

    pub fn set_next_page(&mut self, page_id: u32) {
        self.buf[6..10].copy_from_slice(&page_id.to_le_bytes());
        self.write_checksum();
    }

    fn stored_checksum(&self) -> u32 {
        u32::from_le_bytes([self.buf[10], self.buf[11], self.buf[12], self.buf[13]])
    }

    fn computed_checksum(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.buf[HEADER_SIZE..]);
        hasher.finalize()
    }

    fn write_checksum(&mut self) {
        let sum = self.computed_checksum();
        self.buf[10..14].copy_from_slice(&sum.to_le_bytes());
    }

    /// Verify the page checksum; called when a page is read off disk
    /// (not on every in-memory access).
    pub fn verify_checksum(&self) -> Result<()> {
        if self.stored_checksum() != self.computed_checksum() {
            return Err(GraniteError::Corruption(
                "page checksum mismatch".into(),
            ));
        }
        Ok(())
    }

    fn slot_dir_offset(slot_id: SlotId) -> usize {
        HEADER_SIZE + slot_id as usize * SLOT_SIZE
    }

    pub fn slot(&self, slot_id: SlotId) -> Option<Slot> {
        if slot_id >= self.slot_count() {
            return None;
        }
        let at = Self::slot_dir_offset(slot_id);
        let offset = u16::from_le_bytes([self.buf[at], self.buf[at + 1]]);
        let length = u16::from_le_bytes([self.buf[at + 2], self.buf[at + 3]]);
        Some(Slot { offset, length })
    }

    fn write_slot(&mut self, slot_id: SlotId, slot: Slot) {
        let at = Self::slot_dir_offset(slot_id);
        self.buf[at..at + 2].copy_from_slice(&slot.offset.to_le_bytes());
        self.buf[at + 2..at + 4].copy_from_slice(&slot.length.to_le_bytes());
    }

    /// Bytes of a row at `slot_id`, or `None` if the slot is out of range
    /// or tombstoned.
    pub fn read(&self, slot_id: SlotId) -> Option<&[u8]> {
        let slot = self.slot(slot_id)?;
        if slot.is_tombstone() {
            return None;
        }
        let start = slot.offset as usize;
        let end = start + slot.length as usize;
        Some(&self.buf[start..end])
    }

    /// Iterate over all live (non-tombstoned) slots in ascending order.
    pub fn iter_live(&self) -> impl Iterator<Item = (SlotId, &[u8])> + '_ {
        (0..self.slot_count()).filter_map(move |id| self.read(id).map(|bytes| (id, bytes)))
    }

    /// Bytes of free space remaining for a new row (accounting for the
    /// new slot directory entry it would need).
    pub fn free_space(&self) -> usize {
        let slot_dir_end = Self::slot_dir_offset(self.slot_count());
        (self.free_offset() as usize).saturating_sub(slot_dir_end)
    }

    /// Insert `row` and return its new slot id, or `None` if the page
    /// does not have enough contiguous free space.
    pub fn insert(&mut self, row: &[u8]) -> Option<SlotId> {
        let needed = row.len() + SLOT_SIZE;
        if needed > self.free_space() {
            return None;
        }

        let new_offset = self.free_offset() as usize - row.len();
        self.buf[new_offset..new_offset + row.len()].copy_from_slice(row);
        self.set_free_offset(new_offset as u16);

        let slot_id = self.slot_count();
        self.write_slot(slot_id, Slot { offset: new_offset as u16, length: row.len() as u16 });
        self.set_slot_count(slot_id + 1);
        self.write_checksum();
        Some(slot_id)
    }

    /// Tombstone `slot_id` (mark it deleted without reclaiming its
    /// payload bytes). Returns `false` if `slot_id` was already
    /// tombstoned or out of range.
    pub fn delete(&mut self, slot_id: SlotId) -> bool {
        match self.slot(slot_id) {
            Some(slot) if !slot.is_tombstone() => {
                self.write_slot(slot_id, Slot { offset: 0, length: 0 });
                self.write_checksum();
                true
            }
            _ => false,
        }
    }

    /// Replace the row at `slot_id` in place when `new_row` fits in the
    /// slot's current payload size; otherwise tombstones the slot and
    /// inserts a new one, returning the new slot id. Returns `None` if
    /// neither fits (page full) or the slot is already a tombstone.
    pub fn update(&mut self, slot_id: SlotId, new_row: &[u8]) -> Option<SlotId> {
        let slot = self.slot(slot_id)?;
        if slot.is_tombstone() {
            return None;
        }
        if new_row.len() as u16 <= slot.length {
            let start = slot.offset as usize;
            self.buf[start..start + new_row.len()].copy_from_slice(new_row);
            // Shrink the recorded length so free-space accounting and
            // iteration see the true payload size.
            self.write_slot(
                slot_id,
                Slot { offset: slot.offset, length: new_row.len() as u16 },
            );
            self.write_checksum();
            return Some(slot_id);
        }
        self.delete(slot_id);
        self.insert(new_row)
    }
}
