//! Low-level page I/O for GraniteDB.
//!
//! The [`Pager`] is the lowest-level storage abstraction in the database
//! engine. It views the database file as a flat sequence of fixed-size
//! **pages** ([`PAGE_SIZE`] = 4096 bytes each) and provides read / write /
//! allocate / free operations on those pages.
//!
//! The pager knows nothing about the *contents* of pages — it deals
//! exclusively in raw `[u8; PAGE_SIZE]` buffers. Higher layers (the page
//! module, the buffer overlay, the WAL) build their own structure on top.
//!
//! # File header
//!
//! Page 0's first bytes hold a fixed file header: an 8-byte magic, a
//! version, the page size, the free-list head, the catalog root, and the
//! current page count. All multi-byte fields are little-endian.
//!
//! # Free list
//!
//! Freed pages are chained in a singly-linked list. Each free page stores
//! the [`PageId`] of the next free page in its first four bytes;
//! [`Pager::allocate_page`] pops the head of this list, [`Pager::free_page`]
//! pushes onto it.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{GraniteError, Result};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Every page in the database file is exactly this many bytes.
pub const PAGE_SIZE: usize = 4096;

/// Magic bytes written at offset 0 of every valid GraniteDB file.
pub const MAGIC: &[u8; 8] = b"GRNIDB01";

/// Current on-disk format version.
pub const VERSION: u16 = 1;

/// The fixed-size header region at the start of page 0.
const HEADER_SIZE: usize = 8 + 2 + 4 + 4 + 4 + 4;

// ---------------------------------------------------------------------------
// PageId
// ---------------------------------------------------------------------------

/// A zero-based page number. Page 0 is always the header page.
pub type PageId = u32;

// ---------------------------------------------------------------------------
// Pager
// ---------------------------------------------------------------------------

/// Manages a database file as a flat array of [`PAGE_SIZE`]-byte pages.
///
/// The pager is responsible for:
///
/// * Reading and writing individual pages by [`PageId`].
/// * Maintaining the file header (magic, page count, free-list head,
///   catalog root).
/// * Allocating new pages (from the free list or by extending the file).
/// * Freeing pages (pushing them onto the free list).
///
/// It does **not** cache pages in memory — that is the job of the
/// `buffer` module sitting above it.
#[derive(Debug)]
pub struct Pager {
    file: File,
    /// Total number of pages currently in the file (including page 0).
    page_count: u32,
    /// Head of the singly-linked free-page list (`0` means empty).
    free_list_head: PageId,
    /// Root page of the catalog blob chain (`0` means no catalog yet).
    catalog_root: PageId,
    /// When `true`, mutating operations return an error.
    read_only: bool,
}

impl Pager {
    // ---------------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------------

    /// Open an existing database file, or create a new one if it does not
    /// exist.
    pub fn open(path: &Path, read_only: bool) -> Result<Self> {
        let file = if read_only {
            OpenOptions::new().read(true).open(path)?
        } else {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(path)?
        };

        let file_len = file.metadata()?.len();

        if file_len == 0 {
            if read_only {
                return Err(GraniteError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "cannot create a new database in read-only mode",
                )));
            }

            let mut pager = Pager {
                file,
                page_count: 1,
                free_list_head: 0,
                catalog_root: 0,
                read_only,
            };

            let blank = [0u8; PAGE_SIZE];
            pager.file.seek(SeekFrom::Start(0))?;
            pager.file.write_all(&blank)?;
            pager.flush_header()?;
            pager.file.sync_all()?;

            Ok(pager)
        } else {
            if file_len < PAGE_SIZE as u64 {
                return Err(GraniteError::Corruption(
                    "file is shorter than a single page".into(),
                ));
            }

            let mut pager = Pager {
                file,
                page_count: 0,
                free_list_head: 0,
                catalog_root: 0,
                read_only,
            };

            pager.read_header()?;

            Ok(pager)
        }
    }

    // ---------------------------------------------------------------------
    // Page I/O
    // ---------------------------------------------------------------------

    /// Read the page identified by `page_id` into a `[u8; PAGE_SIZE]`
    /// buffer and return it.
    pub fn read_page(&self, page_id: PageId) -> Result<[u8; PAGE_SIZE]> {
        if page_id >= self.page_count {
            return Err(GraniteError::Corruption(format!(
                "page {page_id} out of range (page_count = {})",
                self.page_count
            )));
        }

        let offset = page_id as u64 * PAGE_SIZE as u64;
        let mut buf = [0u8; PAGE_SIZE];

        let file = &self.file;
        (&*file).seek(SeekFrom::Start(offset))?;
        (&*file).read_exact(&mut buf)?;

        Ok(buf)
    }

    /// Write `data` to the page identified by `page_id`.
    pub fn write_page(&mut self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        self.ensure_writable()?;

        if page_id >= self.page_count {
            return Err(GraniteError::Corruption(format!(
                "page {page_id} out of range (page_count = {})",
                self.page_count
            )));
        }

        let offset = page_id as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;

        Ok(())
    }

    /// `fsync` the data file.
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Page allocation / deallocation
    // ---------------------------------------------------------------------

    /// Allocate a page and return its [`PageId`].
    ///
    /// If the free list is non-empty the head page is recycled; otherwise
    /// the file is extended by one page. The returned page is always
    /// zeroed.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        self.ensure_writable()?;

        if self.free_list_head != 0 {
            let page_id = self.free_list_head;
            let page = self.read_page(page_id)?;
            let next = u32::from_le_bytes([page[0], page[1], page[2], page[3]]);
            self.free_list_head = next;

            let blank = [0u8; PAGE_SIZE];
            self.write_page(page_id, &blank)?;

            self.flush_header()?;
            Ok(page_id)
        } else {
            let page_id = self.page_count;
            self.page_count += 1;

            let blank = [0u8; PAGE_SIZE];
            let offset = page_id as u64 * PAGE_SIZE as u64;
            self.file.seek(SeekFrom::Start(offset))?;
            self.file.write_all(&blank)?;

            self.flush_header()?;
            Ok(page_id)
        }
    }

    /// Return `page_id` to the free list so it can be reused by a future
    /// [`allocate_page`](Self::allocate_page) call.
    pub fn free_page(&mut self, page_id: PageId) -> Result<()> {
        self.ensure_writable()?;

        if page_id == 0 {
            return Err(GraniteError::Internal(
                "cannot free the header page (page 0)".into(),
            ));
        }
        if page_id >= self.page_count {
            return Err(GraniteError::Corruption(format!(
                "page {page_id} out of range (page_count = {})",
                self.page_count
            )));
        }

        let mut page = [0u8; PAGE_SIZE];
        page[0..4].copy_from_slice(&self.free_list_head.to_le_bytes());

        self.write_page(page_id, &page)?;

        self.free_list_head = page_id;
        self.flush_header()?;

        Ok(())
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Root page of the catalog blob chain (`0` if no catalog yet).
    #[inline]
    pub fn catalog_root(&self) -> PageId {
        self.catalog_root
    }

    /// Set the catalog root page and persist it to the file header.
    pub fn set_catalog_root(&mut self, page_id: PageId) -> Result<()> {
        self.ensure_writable()?;
        self.catalog_root = page_id;
        self.flush_header()
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    // ---------------------------------------------------------------------
    // Header persistence
    // ---------------------------------------------------------------------

    /// Serialize all in-memory metadata fields into the header region of
    /// page 0 and write the entire page back to disk, preserving bytes
    /// past the header.
    pub fn flush_header(&mut self) -> Result<()> {
        self.ensure_writable()?;

        let mut page = [0u8; PAGE_SIZE];
        self.file.seek(SeekFrom::Start(0))?;
        let _ = (&self.file).read(&mut page);

        page[0..8].copy_from_slice(MAGIC);
        page[8..10].copy_from_slice(&VERSION.to_le_bytes());
        page[10..14].copy_from_slice(&(PAGE_SIZE as u32).to_le_bytes());
        page[14..18].copy_from_slice(&self.free_list_head.to_le_bytes());
        page[18..22].copy_from_slice(&self.catalog_root.to_le_bytes());
        page[22..26].copy_from_slice(&self.page_count.to_le_bytes());

        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&page)?;

        Ok(())
    }

    /// Read and validate the file header from page 0, populating all
    /// in-memory metadata fields.
    fn read_header(&mut self) -> Result<()> {
        let mut header = [0u8; HEADER_SIZE];
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(&mut header)?;

        if &header[0..8] != MAGIC {
            return Err(GraniteError::Corruption(
                "invalid magic bytes — not a GraniteDB file".into(),
            ));
        }

        let version = u16::from_le_bytes([header[8], header[9]]);
        if version != VERSION {
            return Err(GraniteError::Corruption(format!(
                "unsupported format version {version}"
            )));
        }

        let stored_page_size =
            u32::from_le_bytes([header[10], header[11], header[12], header[13]]) as usize;
        if stored_page_size != PAGE_SIZE {
            return Err(GraniteError::Corruption(format!(
                "unexpected page size {stored_page_size} (expected {PAGE_SIZE})"
            )));
        }

        self.free_list_head = u32::from_le_bytes([header[14], header[15], header[16], header[17]]);
        self.catalog_root = u32::from_le_bytes([header[18], header[19], header[20], header[21]]);
        self.page_count = u32::from_le_bytes([header[22], header[23], header[24], header[25]]);

        Ok(())
    }

    #[inline]
    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            Err(GraniteError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "cannot mutate a read-only database",
            )))
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn new_pager() -> (Pager, NamedTempFile) {
        let tmp = NamedTempFile::new().expect("failed to create temp file");
        let pager = Pager::open(tmp.path(), false).expect("failed to open pager");
        (pager, tmp)
    }

    #[test]
    fn new_database_has_correct_defaults() {
        let (pager, _tmp) = new_pager();
        assert_eq!(pager.page_count(), 1);
        assert_eq!(pager.catalog_root(), 0);
    }

    #[test]
    fn magic_bytes_are_written() {
        let (pager, _tmp) = new_pager();
        let page0 = pager.read_page(0).unwrap();
        assert_eq!(&page0[0..8], MAGIC);
    }

    #[test]
    fn header_round_trips() {
        let tmp = NamedTempFile::new().unwrap();

        {
            let mut pager = Pager::open(tmp.path(), false).unwrap();
            pager.set_catalog_root(42).unwrap();
            pager.sync().unwrap();
        }

        let pager = Pager::open(tmp.path(), true).unwrap();
        assert_eq!(pager.catalog_root(), 42);
        assert_eq!(pager.page_count(), 1);
    }

    #[test]
    fn reopen_preserves_page_count() {
        let tmp = NamedTempFile::new().unwrap();

        {
            let mut pager = Pager::open(tmp.path(), false).unwrap();
            let _ = pager.allocate_page().unwrap();
            let _ = pager.allocate_page().unwrap();
            pager.sync().unwrap();
        }

        let pager = Pager::open(tmp.path(), true).unwrap();
        assert_eq!(pager.page_count(), 3);
    }

    #[test]
    fn write_then_read_page() {
        let (mut pager, _tmp) = new_pager();
        let page_id = pager.allocate_page().unwrap();

        let mut data = [0u8; PAGE_SIZE];
        data[0] = 0xCA;
        data[1] = 0xFE;
        data[PAGE_SIZE - 1] = 0xFF;
        pager.write_page(page_id, &data).unwrap();

        let read_back = pager.read_page(page_id).unwrap();
        assert_eq!(read_back[0], 0xCA);
        assert_eq!(read_back[1], 0xFE);
        assert_eq!(read_back[PAGE_SIZE - 1], 0xFF);
    }

    #[test]
    fn read_out_of_range_returns_error() {
        let (pager, _tmp) = new_pager();
        let err = pager.read_page(999).unwrap_err();
        assert!(matches!(err, GraniteError::Corruption(_)));
    }

    #[test]
    fn write_out_of_range_returns_error() {
        let (mut pager, _tmp) = new_pager();
        let data = [0u8; PAGE_SIZE];
        let err = pager.write_page(999, &data).unwrap_err();
        assert!(matches!(err, GraniteError::Corruption(_)));
    }

    #[test]
    fn allocate_extends_file() {
        let (mut pager, _tmp) = new_pager();
        assert_eq!(pager.page_count(), 1);

        let p1 = pager.allocate_page().unwrap();
        assert_eq!(p1, 1);
        assert_eq!(pager.page_count(), 2);

        let p2 = pager.allocate_page().unwrap();
        assert_eq!(p2, 2);
        assert_eq!(pager.page_count(), 3);
    }

    #[test]
    fn allocated_page_is_zeroed() {
        let (mut pager, _tmp) = new_pager();
        let pid = pager.allocate_page().unwrap();
        let page = pager.read_page(pid).unwrap();
        assert!(page.iter().all(|&b| b == 0));
    }

    #[test]
    fn free_and_reuse_page() {
        let (mut pager, _tmp) = new_pager();

        let p1 = pager.allocate_page().unwrap();
        let _p2 = pager.allocate_page().unwrap();
        assert_eq!(pager.page_count(), 3);

        pager.free_page(p1).unwrap();
        let recycled = pager.allocate_page().unwrap();
        assert_eq!(recycled, p1);
        assert_eq!(pager.page_count(), 3);

        let page = pager.read_page(recycled).unwrap();
        assert!(page.iter().all(|&b| b == 0));
    }

    #[test]
    fn free_list_is_lifo() {
        let (mut pager, _tmp) = new_pager();
        let p1 = pager.allocate_page().unwrap();
        let p2 = pager.allocate_page().unwrap();

        pager.free_page(p1).unwrap();
        pager.free_page(p2).unwrap();

        assert_eq!(pager.allocate_page().unwrap(), p2);
        assert_eq!(pager.allocate_page().unwrap(), p1);
    }

    #[test]
    fn cannot_free_header_page() {
        let (mut pager, _tmp) = new_pager();
        assert!(matches!(
            pager.free_page(0).unwrap_err(),
            GraniteError::Internal(_)
        ));
    }

    #[test]
    fn read_only_pager_rejects_mutation() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let _pager = Pager::open(tmp.path(), false).unwrap();
        }
        let mut pager = Pager::open(tmp.path(), true).unwrap();
        assert!(pager.allocate_page().is_err());
    }

    #[test]
    fn truncated_file_is_corruption() {
        use std::io::Write as _;
        let tmp = NamedTempFile::new().unwrap();
        {
            let mut f = tmp.reopen().unwrap();
            f.write_all(&[1, 2, 3]).unwrap();
        }
        let err = Pager::open(tmp.path(), true).unwrap_err();
        assert!(matches!(err, GraniteError::Corruption(_)));
    }
}
