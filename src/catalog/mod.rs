//! Schema catalog for GraniteDB.
//!
//! The catalog is the central repository of metadata describing every
//! table, column, and index in the database. It is loaded from a
//! dedicated page chain on startup (rooted at the pager header's
//! `catalog_root` field) and persisted back to that chain whenever a DDL
//! statement (`CREATE TABLE`, `DROP TABLE`, `CREATE INDEX`, `DROP INDEX`)
//! runs.
//!
//! # Persistence
//!
//! The catalog blob is written as a simple length-prefixed binary
//! encoding (no external serialization crate — the format is small and
//! entirely owned by this module) and chained across pages the same way
//! the free list chains free pages: each page's first four bytes hold
//! the next page id (`0` = end of chain); the first page additionally
//! reserves the next four bytes for the total blob length. Table and
//! index ordering on disk is always by lowercase name, so two catalogs
//! with the same content serialize identically regardless of the order
//! objects were created in.

use std::collections::HashMap;

use crate::buffer::DirtyPages;
use crate::error::{GraniteError, Result};
use crate::pager::{PageId, Pager, PAGE_SIZE};
use crate::types::ColumnType;

const CHAIN_HEADER: usize = 4;
const FIRST_PAGE_EXTRA: usize = 4;
const FIRST_PAGE_CAPACITY: usize = PAGE_SIZE - CHAIN_HEADER - FIRST_PAGE_EXTRA;
const PAGE_CAPACITY: usize = PAGE_SIZE - CHAIN_HEADER;

/// What happens to rows in the child table when a referenced row in the
/// parent is removed. Recorded for introspection only — GraniteDB never
/// enforces foreign keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    NoAction,
    Cascade,
    SetNull,
    Restrict,
}

#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

/// A single column's schema.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

/// A table's schema and storage location.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    /// Indices into `columns` that make up the primary key, empty if none.
    pub primary_key: Vec<usize>,
    pub foreign_keys: Vec<ForeignKey>,
    /// First page of the table's heap chain.
    pub heap_root: PageId,
    pub row_count: u64,
}

impl Table {
    pub fn find_column(&self, name: &str) -> Option<(usize, &Column)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.name.eq_ignore_ascii_case(name))
    }
}

/// A secondary or primary-key index's schema and storage location.
#[derive(Debug, Clone)]
pub struct Index {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
    /// On-disk identifier used to name the index's file
    /// (`<db-file-name>.idx<id>`).
    pub file_id: u32,
}

/// The in-memory schema catalog, keyed case-insensitively but retaining
/// the original (display) casing of every name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: HashMap<String, Table>,
    indexes: HashMap<String, Index>,
    next_index_file_id: u32,
}

impl Catalog {
    pub fn new() -> Catalog {
        Catalog {
            tables: HashMap::new(),
            indexes: HashMap::new(),
            next_index_file_id: 1,
        }
    }

    fn key(name: &str) -> String {
        name.to_ascii_lowercase()
    }

    pub fn create_table(&mut self, table: Table) -> Result<()> {
        let key = Self::key(&table.name);
        if self.tables.contains_key(&key) {
            return Err(GraniteError::Definition(format!(
                "table {} already exists",
                table.name
            )));
        }
        self.tables.insert(key, table);
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str) -> Result<Table> {
        let key = Self::key(name);
        self.indexes.retain(|_, idx| !idx.table.eq_ignore_ascii_case(name));
        self.tables
            .remove(&key)
            .ok_or_else(|| GraniteError::Definition(format!("table {name} does not exist")))
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(&Self::key(name))
            .ok_or_else(|| GraniteError::Definition(format!("table {name} does not exist")))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(&Self::key(name))
            .ok_or_else(|| GraniteError::Definition(format!("table {name} does not exist")))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(&Self::key(name))
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        let mut tables: Vec<&Table> = self.tables.values().collect();
        tables.sort_by_key(|t| t.name.to_ascii_lowercase());
        tables.into_iter()
    }

    pub fn create_index(&mut self, mut index: Index) -> Result<u32> {
        let key = Self::key(&index.name);
        if self.indexes.contains_key(&key) {
            return Err(GraniteError::Definition(format!(
                "index {} already exists",
                index.name
            )));
        }
        index.file_id = self.next_index_file_id;
        self.next_index_file_id += 1;
        let file_id = index.file_id;
        self.indexes.insert(key, index);
        Ok(file_id)
    }

    pub fn drop_index(&mut self, name: &str) -> Result<Index> {
        self.indexes
            .remove(&Self::key(name))
            .ok_or_else(|| GraniteError::Definition(format!("index {name} does not exist")))
    }

    pub fn index(&self, name: &str) -> Result<&Index> {
        self.indexes
            .get(&Self::key(name))
            .ok_or_else(|| GraniteError::Definition(format!("index {name} does not exist")))
    }

    pub fn indexes_on(&self, table: &str) -> impl Iterator<Item = &Index> {
        self.indexes
            .values()
            .filter(move |idx| idx.table.eq_ignore_ascii_case(table))
    }

    pub fn indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.values()
    }

    pub fn increment_row_count(&mut self, table: &str, delta: i64) -> Result<()> {
        let t = self.table_mut(table)?;
        t.row_count = (t.row_count as i64 + delta).max(0) as u64;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------

    /// Load the catalog from the page chain rooted at `root`.
    pub fn load(pager: &Pager, root: PageId) -> Result<Catalog> {
        if root == 0 {
            return Ok(Catalog::new());
        }

        let mut blob = Vec::new();
        let mut total_len: Option<usize> = None;
        let mut page_id = root;
        let mut first = true;

        while page_id != 0 {
            let page = pager.read_page(page_id)?;
            let next = u32::from_le_bytes([page[0], page[1], page[2], page[3]]);
            let mut cursor = CHAIN_HEADER;
            if first {
                let len = u32::from_le_bytes([page[4], page[5], page[6], page[7]]) as usize;
                total_len = Some(len);
                cursor = CHAIN_HEADER + FIRST_PAGE_EXTRA;
                first = false;
            }
            blob.extend_from_slice(&page[cursor..]);
            page_id = next;
        }

        let total_len = total_len.unwrap_or(0);
        blob.truncate(total_len);
        decode_catalog(&blob)
    }

    /// Persist the catalog to a page chain, reusing existing pages in
    /// `existing_root`'s chain where possible and allocating/freeing
    /// pages as the blob grows or shrinks. Returns the (possibly new)
    /// root page id.
    pub fn persist(&self, dirty: &mut DirtyPages, existing_root: PageId) -> Result<PageId> {
        let blob = encode_catalog(self);

        let mut old_pages = Vec::new();
        let mut page_id = existing_root;
        while page_id != 0 {
            let page = dirty.read_page(page_id)?;
            let next = u32::from_le_bytes([page[0], page[1], page[2], page[3]]);
            old_pages.push(page_id);
            page_id = next;
        }

        let mut chunks: Vec<&[u8]> = Vec::new();
        let first_len = FIRST_PAGE_CAPACITY.min(blob.len());
        chunks.push(&blob[0..first_len]);
        let mut offset = first_len;
        while offset < blob.len() {
            let len = PAGE_CAPACITY.min(blob.len() - offset);
            chunks.push(&blob[offset..offset + len]);
            offset += len;
        }

        let mut new_pages = Vec::with_capacity(chunks.len());
        for (i, _) in chunks.iter().enumerate() {
            if let Some(&page_id) = old_pages.get(i) {
                new_pages.push(page_id);
            } else {
                new_pages.push(dirty.allocate_page()?);
            }
        }
        for &extra in old_pages.iter().skip(new_pages.len()) {
            dirty.free_page(extra)?;
        }

        for (i, chunk) in chunks.iter().enumerate() {
            let mut page = [0u8; PAGE_SIZE];
            let next = new_pages.get(i + 1).copied().unwrap_or(0);
            page[0..4].copy_from_slice(&next.to_le_bytes());
            if i == 0 {
                page[4..8].copy_from_slice(&(blob.len() as u32).to_le_bytes());
                page[CHAIN_HEADER + FIRST_PAGE_EXTRA..CHAIN_HEADER + FIRST_PAGE_EXTRA + chunk.len()]
                    .copy_from_slice(chunk);
            } else {
                page[CHAIN_HEADER..CHAIN_HEADER + chunk.len()].copy_from_slice(chunk);
            }
            dirty.write_page(new_pages[i], page);
        }

        Ok(new_pages.first().copied().unwrap_or(0))
    }
}

// ---------------------------------------------------------------------
// Binary encoding (hand-rolled, deterministic)
// ---------------------------------------------------------------------

fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn read_string(buf: &[u8], cursor: &mut usize) -> Result<String> {
    let len = read_u32(buf, cursor)? as usize;
    let end = *cursor + len;
    if end > buf.len() {
        return Err(GraniteError::Corruption("truncated catalog string".into()));
    }
    let s = String::from_utf8(buf[*cursor..end].to_vec())
        .map_err(|_| GraniteError::Corruption("invalid UTF-8 in catalog".into()))?;
    *cursor = end;
    Ok(s)
}

fn read_u32(buf: &[u8], cursor: &mut usize) -> Result<u32> {
    if *cursor + 4 > buf.len() {
        return Err(GraniteError::Corruption("truncated catalog".into()));
    }
    let v = u32::from_le_bytes(buf[*cursor..*cursor + 4].try_into().unwrap());
    *cursor += 4;
    Ok(v)
}

fn read_u8(buf: &[u8], cursor: &mut usize) -> Result<u8> {
    if *cursor >= buf.len() {
        return Err(GraniteError::Corruption("truncated catalog".into()));
    }
    let v = buf[*cursor];
    *cursor += 1;
    Ok(v)
}

fn write_column_type(buf: &mut Vec<u8>, t: &ColumnType) {
    match t {
        ColumnType::Int32 => buf.push(0),
        ColumnType::Int64 => buf.push(1),
        ColumnType::Varchar(l) => {
            buf.push(2);
            buf.extend_from_slice(&l.to_le_bytes());
        }
        ColumnType::Decimal(p, s) => {
            buf.push(3);
            buf.push(*p);
            buf.push(*s);
        }
        ColumnType::Boolean => buf.push(4),
        ColumnType::Date => buf.push(5),
        ColumnType::Timestamp => buf.push(6),
    }
}

fn read_column_type(buf: &[u8], cursor: &mut usize) -> Result<ColumnType> {
    let tag = read_u8(buf, cursor)?;
    Ok(match tag {
        0 => ColumnType::Int32,
        1 => ColumnType::Int64,
        2 => {
            if *cursor + 2 > buf.len() {
                return Err(GraniteError::Corruption("truncated catalog".into()));
            }
            let l = u16::from_le_bytes(buf[*cursor..*cursor + 2].try_into().unwrap());
            *cursor += 2;
            ColumnType::Varchar(l)
        }
        3 => {
            let p = read_u8(buf, cursor)?;
            let s = read_u8(buf, cursor)?;
            ColumnType::Decimal(p, s)
        }
        4 => ColumnType::Boolean,
        5 => ColumnType::Date,
        6 => ColumnType::Timestamp,
        other => {
            return Err(GraniteError::Corruption(format!(
                "unknown column type tag {other}"
            )))
        }
    })
}

fn write_action(buf: &mut Vec<u8>, a: ReferentialAction) {
    buf.push(match a {
        ReferentialAction::NoAction => 0,
        ReferentialAction::Cascade => 1,
        ReferentialAction::SetNull => 2,
        ReferentialAction::Restrict => 3,
    });
}

fn read_action(buf: &[u8], cursor: &mut usize) -> Result<ReferentialAction> {
    Ok(match read_u8(buf, cursor)? {
        0 => ReferentialAction::NoAction,
        1 => ReferentialAction::Cascade,
        2 => ReferentialAction::SetNull,
        _ => ReferentialAction::Restrict,
    })
}

fn encode_catalog(catalog: &Catalog) -> Vec<u8> {
    let mut buf = Vec::new();

    let mut tables: Vec<&Table> = catalog.tables.values().collect();
    tables.sort_by_key(|t| t.name.to_ascii_lowercase());
    buf.extend_from_slice(&(tables.len() as u32).to_le_bytes());
    for table in tables {
        write_string(&mut buf, &table.name);
        buf.extend_from_slice(&(table.columns.len() as u32).to_le_bytes());
        for col in &table.columns {
            write_string(&mut buf, &col.name);
            write_column_type(&mut buf, &col.column_type);
            buf.push(col.nullable as u8);
        }
        buf.extend_from_slice(&(table.primary_key.len() as u32).to_le_bytes());
        for &pk in &table.primary_key {
            buf.extend_from_slice(&(pk as u32).to_le_bytes());
        }
        buf.extend_from_slice(&(table.foreign_keys.len() as u32).to_le_bytes());
        for fk in &table.foreign_keys {
            buf.extend_from_slice(&(fk.columns.len() as u32).to_le_bytes());
            for c in &fk.columns {
                write_string(&mut buf, c);
            }
            write_string(&mut buf, &fk.ref_table);
            buf.extend_from_slice(&(fk.ref_columns.len() as u32).to_le_bytes());
            for c in &fk.ref_columns {
                write_string(&mut buf, c);
            }
            write_action(&mut buf, fk.on_delete);
            write_action(&mut buf, fk.on_update);
        }
        buf.extend_from_slice(&table.heap_root.to_le_bytes());
        buf.extend_from_slice(&table.row_count.to_le_bytes());
    }

    let mut indexes: Vec<&Index> = catalog.indexes.values().collect();
    indexes.sort_by_key(|i| i.name.to_ascii_lowercase());
    buf.extend_from_slice(&(indexes.len() as u32).to_le_bytes());
    for index in indexes {
        write_string(&mut buf, &index.name);
        write_string(&mut buf, &index.table);
        buf.extend_from_slice(&(index.columns.len() as u32).to_le_bytes());
        for c in &index.columns {
            write_string(&mut buf, c);
        }
        buf.push(index.unique as u8);
        buf.extend_from_slice(&index.file_id.to_le_bytes());
    }

    buf.extend_from_slice(&catalog.next_index_file_id.to_le_bytes());

    buf
}

fn decode_catalog(buf: &[u8]) -> Result<Catalog> {
    let mut cursor = 0;
    let mut catalog = Catalog::new();

    let table_count = read_u32(buf, &mut cursor)?;
    for _ in 0..table_count {
        let name = read_string(buf, &mut cursor)?;
        let col_count = read_u32(buf, &mut cursor)?;
        let mut columns = Vec::with_capacity(col_count as usize);
        for _ in 0..col_count {
            let cname = read_string(buf, &mut cursor)?;
            let column_type = read_column_type(buf, &mut cursor)?;
            let nullable = read_u8(buf, &mut cursor)? != 0;
            columns.push(Column { name: cname, column_type, nullable });
        }
        let pk_count = read_u32(buf, &mut cursor)?;
        let mut primary_key = Vec::with_capacity(pk_count as usize);
        for _ in 0..pk_count {
            primary_key.push(read_u32(buf, &mut cursor)? as usize);
        }
        let fk_count = read_u32(buf, &mut cursor)?;
        let mut foreign_keys = Vec::with_capacity(fk_count as usize);
        for _ in 0..fk_count {
            let fk_col_count = read_u32(buf, &mut cursor)?;
            let mut fk_columns = Vec::with_capacity(fk_col_count as usize);
            for _ in 0..fk_col_count {
                fk_columns.push(read_string(buf, &mut cursor)?);
            }
            let ref_table = read_string(buf, &mut cursor)?;
            let ref_col_count = read_u32(buf, &mut cursor)?;
            let mut ref_columns = Vec::with_capacity(ref_col_count as usize);
            for _ in 0..ref_col_count {
                ref_columns.push(read_string(buf, &mut cursor)?);
            }
            let on_delete = read_action(buf, &mut cursor)?;
            let on_update = read_action(buf, &mut cursor)?;
            foreign_keys.push(ForeignKey {
                columns: fk_columns,
                ref_table,
                ref_columns,
                on_delete,
                on_update,
            });
        }
        let heap_root = read_u32(buf, &mut cursor)?;
        if cursor + 8 > buf.len() {
            return Err(GraniteError::Corruption("truncated catalog".into()));
        }
        let row_count = u64::from_le_bytes(buf[cursor..cursor + 8].try_into().unwrap());
        cursor += 8;

        catalog.tables.insert(
            name.to_ascii_lowercase(),
            Table { name, columns, primary_key, foreign_keys, heap_root, row_count },
        );
    }

    let index_count = read_u32(buf, &mut cursor)?;
    for _ in 0..index_count {
        let name = read_string(buf, &mut cursor)?;
        let table = read_string(buf, &mut cursor)?;
        let col_count = read_u32(buf, &mut cursor)?;
        let mut columns = Vec::with_capacity(col_count as usize);
        for _ in 0..col_count {
            columns.push(read_string(buf, &mut cursor)?);
        }
        let unique = read_u8(buf, &mut cursor)? != 0;
        let file_id = read_u32(buf, &mut cursor)?;
        catalog.indexes.insert(
            name.to_ascii_lowercase(),
            Index { name, table, columns, unique, file_id },
        );
    }

    catalog.next_index_file_id = read_u32(buf, &mut cursor)?;

    Ok(catalog)
}
