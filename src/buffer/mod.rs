//! In-memory write buffering between the executor and the pager/WAL.
//!
//! GraniteDB has no long-lived transactions: every statement is its own
//! implicit transaction, so there is no need for an LRU-managed page
//! cache shared across statements. Instead, [`DirtyPages`] is a small
//! per-statement overlay: reads fall through to the pager, writes land
//! in an in-memory map, and [`DirtyPages::commit`] is the only place
//! that talks to the WAL and the pager, in the durability order the
//! engine promises (§4.2): append WAL records + `fsync`, write pages to
//! the data file + `fsync`, truncate the WAL.
//!
//! If a statement fails partway through, the caller simply drops its
//! `DirtyPages` — nothing was ever written to the WAL or the data file,
//! so the failed statement leaves no trace, without needing an UNDO log.

use std::collections::HashMap;

use crate::error::Result;
use crate::pager::{PageId, Pager, PAGE_SIZE};
use crate::wal::{WalManager, WalRecord};

/// A read-through, write-behind overlay over one [`Pager`] for the
/// duration of a single statement.
pub struct DirtyPages<'a> {
    pager: &'a mut Pager,
    wal: &'a mut WalManager,
    overlay: HashMap<PageId, Box<[u8; PAGE_SIZE]>>,
}

impl<'a> DirtyPages<'a> {
    pub fn new(pager: &'a mut Pager, wal: &'a mut WalManager) -> Self {
        DirtyPages {
            pager,
            wal,
            overlay: HashMap::new(),
        }
    }

    /// Read a page, preferring this statement's own uncommitted writes
    /// over what is currently on disk.
    pub fn read_page(&self, page_id: PageId) -> Result<[u8; PAGE_SIZE]> {
        if let Some(image) = self.overlay.get(&page_id) {
            return Ok(**image);
        }
        self.pager.read_page(page_id)
    }

    /// Stage a page write. Not visible outside this `DirtyPages` until
    /// [`commit`](Self::commit) succeeds.
    pub fn write_page(&mut self, page_id: PageId, data: [u8; PAGE_SIZE]) {
        self.overlay.insert(page_id, Box::new(data));
    }

    /// Allocate a new page through the underlying pager. Allocation
    /// itself is not deferred — the page-count/free-list bookkeeping in
    /// the header is small and idempotent to redo, and deferring it
    /// would require staging file-length changes too.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        self.pager.allocate_page()
    }

    /// Free a page through the underlying pager (see `allocate_page`).
    pub fn free_page(&mut self, page_id: PageId) -> Result<()> {
        self.overlay.remove(&page_id);
        self.pager.free_page(page_id)
    }

    /// `true` if no pages have been staged for write.
    pub fn is_empty(&self) -> bool {
        self.overlay.is_empty()
    }

    /// Commit every staged write: WAL append + fsync, page writes +
    /// fsync, WAL truncate. On success, nothing remains staged.
    pub fn commit(mut self) -> Result<()> {
        if self.overlay.is_empty() {
            return Ok(());
        }

        let mut records: Vec<(PageId, Box<[u8; PAGE_SIZE]>)> = self.overlay.drain().collect();
        records.sort_by_key(|(id, _)| *id);

        let wal_records: Vec<WalRecord> = records
            .iter()
            .map(|(page_id, image)| WalRecord {
                page_id: *page_id,
                image: image.clone(),
            })
            .collect();

        self.wal.append_statement(&wal_records)?;

        for (page_id, image) in &records {
            self.pager.write_page(*page_id, image)?;
        }
        self.pager.sync()?;

        self.wal.truncate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn fixtures() -> (Pager, WalManager, NamedTempFile, NamedTempFile) {
        let db_file = NamedTempFile::new().unwrap();
        let wal_file = NamedTempFile::new().unwrap();
        let pager = Pager::open(db_file.path(), false).unwrap();
        let wal = WalManager::open(wal_file.path()).unwrap();
        (pager, wal, db_file, wal_file)
    }

    #[test]
    fn read_through_sees_disk_before_write() {
        let (mut pager, mut wal, _f1, _f2) = fixtures();
        let page_id = pager.allocate_page().unwrap();
        let dirty = DirtyPages::new(&mut pager, &mut wal);
        let page = dirty.read_page(page_id).unwrap();
        assert!(page.iter().all(|&b| b == 0));
    }

    #[test]
    fn read_after_write_sees_overlay() {
        let (mut pager, mut wal, _f1, _f2) = fixtures();
        let page_id = pager.allocate_page().unwrap();
        let mut dirty = DirtyPages::new(&mut pager, &mut wal);

        let mut data = [0u8; PAGE_SIZE];
        data[0] = 0x42;
        dirty.write_page(page_id, data);

        let read_back = dirty.read_page(page_id).unwrap();
        assert_eq!(read_back[0], 0x42);
    }

    #[test]
    fn commit_persists_to_pager() {
        let (mut pager, mut wal, _f1, _f2) = fixtures();
        let page_id = pager.allocate_page().unwrap();
        let mut dirty = DirtyPages::new(&mut pager, &mut wal);

        let mut data = [0u8; PAGE_SIZE];
        data[0] = 7;
        dirty.write_page(page_id, data);
        dirty.commit().unwrap();

        let read_back = pager.read_page(page_id).unwrap();
        assert_eq!(read_back[0], 7);
    }

    #[test]
    fn dropped_without_commit_leaves_disk_unchanged() {
        let (mut pager, mut wal, _f1, _f2) = fixtures();
        let page_id = pager.allocate_page().unwrap();
        {
            let mut dirty = DirtyPages::new(&mut pager, &mut wal);
            let mut data = [0u8; PAGE_SIZE];
            data[0] = 9;
            dirty.write_page(page_id, data);
            // dropped without commit
        }
        let read_back = pager.read_page(page_id).unwrap();
        assert_eq!(read_back[0], 0);
    }

    #[test]
    fn commit_truncates_wal() {
        let (mut pager, mut wal, _f1, wal_file) = fixtures();
        let page_id = pager.allocate_page().unwrap();
        let mut dirty = DirtyPages::new(&mut pager, &mut wal);
        dirty.write_page(page_id, [1u8; PAGE_SIZE]);
        dirty.commit().unwrap();

        let len = std::fs::metadata(wal_file.path()).unwrap().len();
        assert_eq!(len, 8);
    }
}
