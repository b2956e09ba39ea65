//! Heap file: an unordered chain of slotted pages holding one table's
//! rows.
//!
//! A table's heap is a singly-linked chain of pages (next-page pointer
//! in the slotted page header); [`HeapFile::insert`] appends to the
//! last page with room, allocating a new page and linking it in when
//! none has space. [`RowId`] identifies a row by `(page_id, slot_id)`
//! and is stable across updates that fit in place; an update that grows
//! a row relocates it to a new slot (see [`page::SlottedPage::update`]),
//! so callers that cache a `RowId` across a write must re-fetch it from
//! the index/identity path that produced it, not assume permanence
//! across arbitrary mutations.

use crate::buffer::DirtyPages;
use crate::error::Result;
use crate::page::{SlotId, SlottedPage};
use crate::pager::{PageId, PAGE_SIZE};

/// Identifies a row within a heap file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId {
    pub page_id: PageId,
    pub slot_id: SlotId,
}

/// A handle onto one table's page chain. Stateless beyond the root page
/// id — all actual data lives behind `DirtyPages`/the pager.
pub struct HeapFile {
    root: PageId,
}

impl HeapFile {
    pub fn new(root: PageId) -> HeapFile {
        HeapFile { root }
    }

    /// Create a brand-new, empty heap and return its root page id.
    pub fn create(dirty: &mut DirtyPages) -> Result<PageId> {
        let root = dirty.allocate_page()?;
        let mut buf = [0u8; PAGE_SIZE];
        SlottedPage::init(&mut buf, 0);
        dirty.write_page(root, buf);
        Ok(root)
    }

    pub fn root(&self) -> PageId {
        self.root
    }

    /// Append `row` to the heap, allocating a new page if none in the
    /// chain has room.
    pub fn insert(&self, dirty: &mut DirtyPages, row: &[u8]) -> Result<RowId> {
        let mut page_id = self.root;
        loop {
            let mut buf = dirty.read_page(page_id)?;
            let next_page = {
                let page = SlottedPage::new(&mut buf);
                page.next_page()
            };

            {
                let mut page = SlottedPage::new(&mut buf);
                if let Some(slot_id) = page.insert(row) {
                    dirty.write_page(page_id, buf);
                    return Ok(RowId { page_id, slot_id });
                }
            }

            if next_page != 0 {
                page_id = next_page;
                continue;
            }

            let new_page_id = dirty.allocate_page()?;
            let mut new_buf = [0u8; PAGE_SIZE];
            SlottedPage::init(&mut new_buf, 0);
            let slot_id = {
                let mut new_page = SlottedPage::new(&mut new_buf);
                new_page.insert(row).expect("row must fit in an empty page")
            };
            dirty.write_page(new_page_id, new_buf);

            {
                let mut page = SlottedPage::new(&mut buf);
                page.set_next_page(new_page_id);
            }
            dirty.write_page(page_id, buf);

            return Ok(RowId { page_id, slot_id });
        }
    }

    /// Fetch a row's raw bytes, or `None` if it has been deleted.
    pub fn get(&self, dirty: &DirtyPages, row_id: RowId) -> Result<Option<Vec<u8>>> {
        let mut buf = dirty.read_page(row_id.page_id)?;
        let page = SlottedPage::new(&mut buf);
        Ok(page.read(row_id.slot_id).map(|b| b.to_vec()))
    }

    /// Delete a row, tombstoning its slot. Returns `false` if it was
    /// already deleted.
    pub fn delete(&self, dirty: &mut DirtyPages, row_id: RowId) -> Result<bool> {
        let mut buf = dirty.read_page(row_id.page_id)?;
        let removed = {
            let mut page = SlottedPage::new(&mut buf);
            page.delete(row_id.slot_id)
        };
        if removed {
            dirty.write_page(row_id.page_id, buf);
        }
        Ok(removed)
    }

    /// Update a row in place if it fits, otherwise tombstone and
    /// reinsert elsewhere in the same page (never in a different page,
    /// so callers needing cross-page relocation should delete + insert
    /// through the heap directly). Returns the row's new location.
    pub fn update(&self, dirty: &mut DirtyPages, row_id: RowId, new_row: &[u8]) -> Result<RowId> {
        let mut buf = dirty.read_page(row_id.page_id)?;
        let new_slot = {
            let mut page = SlottedPage::new(&mut buf);
            page.update(row_id.slot_id, new_row)
        };
        match new_slot {
            Some(slot_id) => {
                dirty.write_page(row_id.page_id, buf);
                Ok(RowId { page_id: row_id.page_id, slot_id })
            }
            None => {
                // Page has no room even after tombstoning; delete here
                // and insert wherever the chain has space.
                {
                    let mut page = SlottedPage::new(&mut buf);
                    page.delete(row_id.slot_id);
                }
                dirty.write_page(row_id.page_id, buf);
                self.insert(dirty, new_row)
            }
        }
    }

    /// Iterate every live row in the heap, in page-chain then slot
    /// order. Reads the full chain eagerly since `DirtyPages` does not
    /// expose an iterator-friendly borrow.
    pub fn scan(&self, dirty: &DirtyPages) -> Result<Vec<(RowId, Vec<u8>)>> {
        let mut out = Vec::new();
        let mut page_id = self.root;
        while page_id != 0 {
            let mut buf = dirty.read_page(page_id)?;
            let next_page = {
                let page = SlottedPage::new(&mut buf);
                page.next_page()
            };
            {
                let page = SlottedPage::new(&mut buf);
                for (slot_id, bytes) in page.iter_live() {
                    out.push((RowId { page_id, slot_id }, bytes.to_vec()));
                }
            }
            page_id = next_page;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::Pager;
    use crate::wal::WalManager;
    use tempfile::NamedTempFile;

    fn fixtures() -> (Pager, WalManager, NamedTempFile, NamedTempFile) {
        let db_file = NamedTempFile::new().unwrap();
        let wal_file = NamedTempFile::new().unwrap();
        let pager = Pager::open(db_file.path(), false).unwrap();
        let wal = WalManager::open(wal_file.path()).unwrap();
        (pager, wal, db_file, wal_file)
    }

    #[test]
    fn insert_and_scan_round_trip() {
        let (mut pager, mut wal, _f1, _f2) = fixtures();
        let mut dirty = DirtyPages::new(&mut pager, &mut wal);
        let root = HeapFile::create(&mut dirty).unwrap();
        let heap = HeapFile::new(root);

        heap.insert(&mut dirty, b"row one").unwrap();
        heap.insert(&mut dirty, b"row two").unwrap();

        let rows = heap.scan(&dirty).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1, b"row one");
        assert_eq!(rows[1].1, b"row two");
    }

    #[test]
    fn delete_removes_row_from_scan() {
        let (mut pager, mut wal, _f1, _f2) = fixtures();
        let mut dirty = DirtyPages::new(&mut pager, &mut wal);
        let root = HeapFile::create(&mut dirty).unwrap();
        let heap = HeapFile::new(root);

        let id = heap.insert(&mut dirty, b"doomed").unwrap();
        heap.insert(&mut dirty, b"survivor").unwrap();
        assert!(heap.delete(&mut dirty, id).unwrap());

        let rows = heap.scan(&dirty).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, b"survivor");
    }

    #[test]
    fn insert_spills_to_new_page_when_full() {
        let (mut pager, mut wal, _f1, _f2) = fixtures();
        let mut dirty = DirtyPages::new(&mut pager, &mut wal);
        let root = HeapFile::create(&mut dirty).unwrap();
        let heap = HeapFile::new(root);

        let row = vec![0u8; 900];
        let mut ids = Vec::new();
        for _ in 0..10 {
            ids.push(heap.insert(&mut dirty, &row).unwrap());
        }
        // At least one row must have landed on a page beyond the root.
        assert!(ids.iter().any(|id| id.page_id != root));
        assert_eq!(heap.scan(&dirty).unwrap().len(), 10);
    }

    #[test]
    fn update_in_place_keeps_row_id() {
        let (mut pager, mut wal, _f1, _f2) = fixtures();
        let mut dirty = DirtyPages::new(&mut pager, &mut wal);
        let root = HeapFile::create(&mut dirty).unwrap();
        let heap = HeapFile::new(root);

        let id = heap.insert(&mut dirty, b"1234567890").unwrap();
        let new_id = heap.update(&mut dirty, id, b"short").unwrap();
        assert_eq!(new_id, id);
        let rows = heap.scan(&dirty).unwrap();
        assert_eq!(rows[0].1, b"short");
    }

    #[test]
    fn update_relocates_when_grown() {
        let (mut pager, mut wal, _f1, _f2) = fixtures();
        let mut dirty = DirtyPages::new(&mut pager, &mut wal);
        let root = HeapFile::create(&mut dirty).unwrap();
        let heap = HeapFile::new(root);

        let id = heap.insert(&mut dirty, b"a").unwrap();
        let big = vec![1u8; 50];
        let new_id = heap.update(&mut dirty, id, &big).unwrap();
        assert_ne!(new_id.slot_id, id.slot_id);
        assert_eq!(heap.scan(&dirty).unwrap().len(), 1);
    }
}
