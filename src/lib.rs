//! # GraniteDB
//!
//! A compact single-file relational database engine: a page-oriented
//! storage layer with a redo-only WAL, a catalog of tables and
//! indexes, and a small SQL front-end (lexer/parser/planner/executor)
//! sitting on top.

pub mod error;
pub mod types;
pub mod pager;
pub mod wal;
pub mod buffer;
pub mod page;
pub mod tuple;
pub mod heap;
pub mod index;
pub mod catalog;
pub mod sql;
pub mod expr;
pub mod planner;
pub mod execution;

pub use error::{GraniteError, Result};
pub use types::Value;
pub use pager::PageId;
pub use planner::ExplainNode;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use catalog::{Column as CatalogColumn, Index as CatalogIndex};

/// One returned row: its values in the same order as the owning
/// [`QueryResult`]'s `columns`.
#[derive(Debug, Clone)]
pub struct Row {
    columns: std::sync::Arc<Vec<String>>,
    pub values: Vec<Value>,
}

impl Row {
    /// Look up a value by column name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)).map(|i| &self.values[i])
    }

    /// Look up a value by its position in the result set.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }
}

/// The result of a `SELECT`.
pub struct QueryResult {
    columns: std::sync::Arc<Vec<String>>,
    rows: Vec<Row>,
}

impl QueryResult {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl IntoIterator for QueryResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// A lightweight description of one table's schema, returned by
/// [`Database::tables`] so a caller can render the schema without
/// reaching into catalog internals.
#[derive(Debug, Clone)]
pub struct TableMeta {
    pub name: String,
    pub columns: Vec<CatalogColumn>,
    pub primary_key: Vec<String>,
    pub indexes: Vec<CatalogIndex>,
    pub row_count: u64,
}

/// The main database handle. Every statement runs to completion under
/// a single internal lock — there is no notion of a multi-statement
/// transaction held open across calls.
pub struct Database {
    path: PathBuf,
    inner: Mutex<DatabaseInner>,
}

struct DatabaseInner {
    pager: pager::Pager,
    wal: wal::WalManager,
    catalog: catalog::Catalog,
}

fn wal_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_owned();
    name.push(".wal");
    PathBuf::from(name)
}

impl Database {
    /// Open an existing database file, or create a new one if it
    /// doesn't exist. Replays any WAL records left behind by a crash
    /// between the prior statement's log fsync and its data-file
    /// fsync before the catalog is loaded.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut pager = pager::Pager::open(&path, false)?;
        let mut wal = wal::WalManager::open(&wal_path(&path))?;
        wal.replay(&mut pager)?;

        let catalog = if pager.catalog_root() == 0 {
            catalog::Catalog::new()
        } else {
            catalog::Catalog::load(&pager, pager.catalog_root())?
        };

        Ok(Database {
            path,
            inner: Mutex::new(DatabaseInner { pager, wal, catalog }),
        })
    }

    /// Execute one or more `;`-separated DDL/`INSERT` statements,
    /// returning the total number of rows affected.
    pub fn execute(&self, sql_text: &str) -> Result<usize> {
        let stmts = sql::parser::Parser::parse(sql_text)?;
        let mut inner = self.inner.lock().map_err(|_| GraniteError::Internal("mutex poisoned".into()))?;
        let DatabaseInner { pager, wal, catalog } = &mut *inner;

        let mut total = 0;
        for stmt in &stmts {
            total += execution::execute_statement(stmt, pager, wal, catalog, &self.path)?;
        }
        Ok(total)
    }

    /// Execute a single `SELECT` statement, returning its result set.
    pub fn query(&self, sql_text: &str) -> Result<QueryResult> {
        let stmts = sql::parser::Parser::parse(sql_text)?;
        let stmt = stmts
            .first()
            .ok_or_else(|| GraniteError::Planning("empty query".into()))?;

        let mut inner = self.inner.lock().map_err(|_| GraniteError::Internal("mutex poisoned".into()))?;
        let DatabaseInner { pager, wal, catalog } = &mut *inner;

        let (columns, rows) = execution::execute_query(stmt, pager, wal, catalog, &self.path)?;
        let columns = std::sync::Arc::new(columns);
        Ok(QueryResult {
            rows: rows.into_iter().map(|values| Row { columns: columns.clone(), values }).collect(),
            columns,
        })
    }

    /// Build the `EXPLAIN` tree for a statement without executing it.
    /// Never mutates durable state, even for DDL/`INSERT` (those
    /// statements only get a single descriptive leaf node — no
    /// planning work is needed to describe them).
    pub fn explain(&self, sql_text: &str) -> Result<ExplainNode> {
        let stmts = sql::parser::Parser::parse(sql_text)?;
        let stmt = stmts
            .first()
            .ok_or_else(|| GraniteError::Planning("empty query".into()))?;
        let inner = self.inner.lock().map_err(|_| GraniteError::Internal("mutex poisoned".into()))?;
        execution::explain(stmt, &inner.catalog)
    }

    /// `explain`'s tree rendered as JSON bytes.
    pub fn explain_json(&self, sql_text: &str) -> Result<Vec<u8>> {
        let stmts = sql::parser::Parser::parse(sql_text)?;
        let stmt = stmts
            .first()
            .ok_or_else(|| GraniteError::Planning("empty query".into()))?;
        let inner = self.inner.lock().map_err(|_| GraniteError::Internal("mutex poisoned".into()))?;
        execution::explain_json(stmt, &inner.catalog)
    }

    /// Describe every table currently in the catalog.
    pub fn tables(&self) -> Result<Vec<TableMeta>> {
        let inner = self.inner.lock().map_err(|_| GraniteError::Internal("mutex poisoned".into()))?;
        Ok(inner
            .catalog
            .tables()
            .map(|t| TableMeta {
                name: t.name.clone(),
                columns: t.columns.clone(),
                primary_key: t.primary_key.iter().map(|&i| t.columns[i].name.clone()).collect(),
                indexes: inner.catalog.indexes_on(&t.name).cloned().collect(),
                row_count: t.row_count,
            })
            .collect())
    }

    /// The database file's path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the database. Every write already fsyncs as part of its
    /// own commit, so there's nothing left to flush here.
    pub fn close(self) -> Result<()> {
        Ok(())
    }
}
