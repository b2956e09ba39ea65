//! Redo-only write-ahead log for GraniteDB.
//!
//! Every statement is its own implicit transaction (no explicit
//! `BEGIN`/`COMMIT`), so the WAL only ever needs to replay committed
//! writes — there is no UNDO path and no notion of an in-flight
//! transaction surviving a crash.
//!
//! ## WAL file format
//!
//! - `[0..8)`: magic `b"GRNIWAL1"`.
//! - Followed by zero or more records, each:
//!   - `[0..4)`  LSN (`u32`, monotonically increasing within the file)
//!   - `[4..8)`  page id (`u32`)
//!   - `[8..8+PAGE_SIZE)` after-image of the page
//!   - last 4 bytes: CRC32 (`crc32fast`) of the LSN+page-id+image
//!
//! `append_statement` writes every record for one statement, `fsync`s,
//! then the caller applies the images to the data file and `fsync`s
//! again, then calls `truncate` to discard the now-redundant log. This
//! ordering is what makes replay-on-open idempotent: if the process
//! crashes between the WAL fsync and the truncate, [`WalManager::replay`]
//! re-applies the same images to the same pages.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{GraniteError, Result};
use crate::pager::{PageId, Pager, PAGE_SIZE};

const WAL_MAGIC: &[u8; 8] = b"GRNIWAL1";
const WAL_HEADER_SIZE: usize = 8;
const RECORD_HEADER_SIZE: usize = 4 + 4;
const RECORD_SIZE: usize = RECORD_HEADER_SIZE + PAGE_SIZE + 4;

/// One durable page write: the page id and its full after-image.
#[derive(Debug, Clone)]
pub struct WalRecord {
    pub page_id: PageId,
    pub image: Box<[u8; PAGE_SIZE]>,
}

/// Manages the on-disk redo log.
pub struct WalManager {
    path: PathBuf,
    file: File,
    next_lsn: u32,
}

impl WalManager {
    /// Open or create the WAL file alongside the database file.
    pub fn open(path: &Path) -> Result<Self> {
        let exists = path.exists();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        if exists && file.metadata()?.len() >= WAL_HEADER_SIZE as u64 {
            let mut magic = [0u8; WAL_HEADER_SIZE];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut magic)?;
            if &magic != WAL_MAGIC {
                return Err(GraniteError::Corruption("invalid WAL magic bytes".into()));
            }
        } else {
            file.seek(SeekFrom::Start(0))?;
            file.write_all(WAL_MAGIC)?;
            file.set_len(WAL_HEADER_SIZE as u64)?;
            file.sync_all()?;
        }

        Ok(WalManager {
            path: path.to_path_buf(),
            file,
            next_lsn: 1,
        })
    }

    /// Append every record of one statement's write set to the log and
    /// `fsync`. Must be called before the corresponding pages are written
    /// to the data file.
    pub fn append_statement(&mut self, records: &[WalRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.file.seek(SeekFrom::End(0))?;
        for record in records {
            let lsn = self.next_lsn;
            self.next_lsn += 1;

            let mut buf = Vec::with_capacity(RECORD_SIZE);
            buf.extend_from_slice(&lsn.to_le_bytes());
            buf.extend_from_slice(&record.page_id.to_le_bytes());
            buf.extend_from_slice(record.image.as_ref());

            let mut hasher = crc32fast::Hasher::new();
            hasher.update(&buf);
            let checksum = hasher.finalize();
            buf.extend_from_slice(&checksum.to_le_bytes());

            self.file.write_all(&buf)?;
        }
        self.file.sync_all()?;
        Ok(())
    }

    /// Truncate the log back to just the header, discarding all records.
    /// Called after the records have been durably applied to the data
    /// file.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(WAL_HEADER_SIZE as u64)?;
        self.file.sync_all()?;
        self.next_lsn = 1;
        Ok(())
    }

    /// Replay every record currently in the log into `pager`, in LSN
    /// order, then truncate. Called once at database open time, before
    /// any statement executes.
    pub fn replay(&mut self, pager: &mut Pager) -> Result<usize> {
        let records = self.read_all_records()?;
        let applied = records.len();
        for (page_id, image) in records {
            if page_id < pager.page_count() {
                pager.write_page(page_id, &image)?;
            }
        }
        if applied > 0 {
            pager.sync()?;
        }
        self.truncate()?;
        Ok(applied)
    }

    fn read_all_records(&mut self) -> Result<Vec<(PageId, Box<[u8; PAGE_SIZE]>)>> {
        let file_len = self.file.metadata()?.len();
        if file_len <= WAL_HEADER_SIZE as u64 {
            return Ok(Vec::new());
        }

        self.file.seek(SeekFrom::Start(WAL_HEADER_SIZE as u64))?;
        let mut out = Vec::new();
        let mut offset = WAL_HEADER_SIZE as u64;

        while offset + RECORD_SIZE as u64 <= file_len {
            let mut record = vec![0u8; RECORD_SIZE];
            self.file.read_exact(&mut record)?;
            offset += RECORD_SIZE as u64;

            let body = &record[..RECORD_HEADER_SIZE + PAGE_SIZE];
            let stored_checksum = u32::from_le_bytes(
                record[RECORD_HEADER_SIZE + PAGE_SIZE..].try_into().unwrap(),
            );
            let mut hasher = crc32fast::Hasher::new();
            hasher.update(body);
            if hasher.finalize() != stored_checksum {
                // A torn write at the tail of the log: stop replaying
                // here, the statement that wrote it never finished its
                // fsync and was never reported as successful.
                break;
            }

            let page_id = u32::from_le_bytes(record[4..8].try_into().unwrap());
            let mut image = Box::new([0u8; PAGE_SIZE]);
            image.copy_from_slice(&record[RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + PAGE_SIZE]);
            out.push((page_id, image));
        }

        Ok(out)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn record(page_id: PageId, fill: u8) -> WalRecord {
        let mut image = Box::new([0u8; PAGE_SIZE]);
        image.fill(fill);
        WalRecord { page_id, image }
    }

    #[test]
    fn new_wal_is_empty() {
        let tmp = NamedTempFile::new().unwrap();
        let mut wal = WalManager::open(tmp.path()).unwrap();
        let replayed = wal.replay(&mut dummy_pager()).unwrap();
        assert_eq!(replayed, 0);
    }

    fn dummy_pager() -> Pager {
        let tmp = NamedTempFile::new().unwrap();
        Pager::open(tmp.path(), false).unwrap()
    }

    #[test]
    fn append_then_replay_applies_pages() {
        let wal_file = NamedTempFile::new().unwrap();
        let mut wal = WalManager::open(wal_file.path()).unwrap();

        let mut pager = dummy_pager();
        let p1 = pager.allocate_page().unwrap();
        let p2 = pager.allocate_page().unwrap();

        wal.append_statement(&[record(p1, 0xAA), record(p2, 0xBB)])
            .unwrap();

        let applied = wal.replay(&mut pager).unwrap();
        assert_eq!(applied, 2);

        let page1 = pager.read_page(p1).unwrap();
        assert!(page1.iter().all(|&b| b == 0xAA));
        let page2 = pager.read_page(p2).unwrap();
        assert!(page2.iter().all(|&b| b == 0xBB));
    }

    #[test]
    fn replay_truncates_log() {
        let wal_file = NamedTempFile::new().unwrap();
        let mut wal = WalManager::open(wal_file.path()).unwrap();
        let mut pager = dummy_pager();
        let p1 = pager.allocate_page().unwrap();

        wal.append_statement(&[record(p1, 1)]).unwrap();
        wal.replay(&mut pager).unwrap();

        assert_eq!(wal.file.metadata().unwrap().len(), WAL_HEADER_SIZE as u64);
    }

    #[test]
    fn reopen_detects_bad_magic() {
        use std::io::Write as _;
        let tmp = NamedTempFile::new().unwrap();
        {
            let mut f = tmp.reopen().unwrap();
            f.write_all(b"NOTAWAL!").unwrap();
        }
        let err = WalManager::open(tmp.path()).unwrap_err();
        assert!(matches!(err, GraniteError::Corruption(_)));
    }

    #[test]
    fn truncated_tail_record_is_ignored() {
        let wal_file = NamedTempFile::new().unwrap();
        let mut wal = WalManager::open(wal_file.path()).unwrap();
        let mut pager = dummy_pager();
        let p1 = pager.allocate_page().unwrap();

        wal.append_statement(&[record(p1, 5)]).unwrap();

        // Corrupt the checksum to simulate a torn write.
        let len = wal.file.metadata().unwrap().len();
        wal.file.seek(SeekFrom::Start(len - 1)).unwrap();
        wal.file.write_all(&[0xFF]).unwrap();

        let applied = wal.replay(&mut pager).unwrap();
        assert_eq!(applied, 0);
    }

    #[test]
    fn empty_statement_writes_nothing() {
        let wal_file = NamedTempFile::new().unwrap();
        let mut wal = WalManager::open(wal_file.path()).unwrap();
        wal.append_statement(&[]).unwrap();
        assert_eq!(
            wal.file.metadata().unwrap().len(),
            WAL_HEADER_SIZE as u64
        );
    }
}
