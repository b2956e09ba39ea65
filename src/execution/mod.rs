//! # Execution Engine
//!
//! Executes SQL statements against the storage layer: DDL and `INSERT`
//! go through [`execute_statement`], `SELECT` through [`execute_query`].
//! The query path builds a tree of pull-based [`Operator`]s from the
//! planner's [`PlanNode`] and drains it to completion; each operator
//! materializes its output on `open` rather than streaming page-by-page,
//! which keeps the implementation simple at the cost of holding a full
//! intermediate result set in memory per operator.

use std::cmp::Ordering;
use std::path::Path;

use crate::buffer::DirtyPages;
use crate::catalog::{Catalog, Column, ForeignKey, Index, ReferentialAction, Table};
use crate::error::{GraniteError, Result};
use crate::expr::{self, ResolvedColumn};
use crate::heap::HeapFile;
use crate::index::{self, IndexFile};
use crate::page::SlottedPage;
use crate::pager::{PageId, Pager};
use crate::planner::{self, AggregateCall, ExplainNode, PlanNode};
use crate::sql::ast::*;
use crate::tuple;
use crate::types::{ColumnType, Decimal, Value};
use crate::wal::WalManager;

/// Everything an [`Operator`] needs while open: read-only access to the
/// catalog and the in-flight page overlay, plus the database's path (for
/// locating index files, which live next to the main file on disk).
pub struct ExecContext<'a> {
    pub catalog: &'a Catalog,
    pub dirty: &'a DirtyPages<'a>,
    pub db_path: &'a Path,
}

/// A physical operator in the classic `open`/`next`/`close` iterator
/// model. `next` returns `Ok(None)` at end of stream.
pub trait Operator {
    fn schema(&self) -> &[ResolvedColumn];
    fn open(&mut self, ctx: &ExecContext<'_>) -> Result<()>;
    fn next(&mut self) -> Result<Option<Vec<Value>>>;
    fn close(&mut self) -> Result<()>;
}

// ---------------------------------------------------------------------
// Top-level dispatch
// ---------------------------------------------------------------------

/// Execute a non-query statement (DDL, `INSERT`). Returns the number of
/// rows affected (always `0` for DDL).
pub fn execute_statement(
    stmt: &Statement,
    pager: &mut Pager,
    wal: &mut WalManager,
    catalog: &mut Catalog,
    db_path: &Path,
) -> Result<usize> {
    match stmt {
        Statement::CreateTable(s) => execute_create_table(s, pager, wal, catalog, db_path),
        Statement::DropTable(s) => execute_drop_table(s, pager, wal, catalog, db_path),
        Statement::CreateIndex(s) => execute_create_index(s, pager, wal, catalog, db_path),
        Statement::DropIndex(s) => execute_drop_index(s, pager, wal, catalog, db_path),
        Statement::Insert(s) => execute_insert(s, pager, wal, catalog, db_path),
        Statement::Select(_) => Err(GraniteError::Internal(
            "use execute_query for SELECT statements".into(),
        )),
    }
}

/// Execute a `SELECT`, returning its column names and result rows.
pub fn execute_query(
    stmt: &Statement,
    pager: &mut Pager,
    wal: &mut WalManager,
    catalog: &Catalog,
    db_path: &Path,
) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
    let select = match stmt {
        Statement::Select(s) => s,
        _ => return Err(GraniteError::Internal("execute_query only accepts SELECT statements".into())),
    };

    let (plan, _) = planner::plan_select(select, catalog)?;
    let mut op = build_operator(&plan, catalog)?;
    let columns: Vec<String> = op.schema().iter().map(|c| c.name.clone()).collect();

    let mut dirty = DirtyPages::new(pager, wal);
    let mut rows = Vec::new();
    {
        let ctx = ExecContext { catalog, dirty: &dirty, db_path };
        op.open(&ctx)?;
        while let Some(row) = op.next()? {
            rows.push(row);
        }
        op.close()?;
    }
    // SELECT never stages a write, so dropping `dirty` here without a
    // commit is always a no-op.
    Ok((columns, rows))
}

/// Build the `EXPLAIN` tree for any statement. DDL and `INSERT` get a
/// single leaf node; `SELECT` delegates to the planner.
pub fn explain(stmt: &Statement, catalog: &Catalog) -> Result<ExplainNode> {
    match stmt {
        Statement::Select(s) => Ok(planner::plan_select(s, catalog)?.1),
        Statement::Insert(s) => Ok(leaf("Insert", vec![("table".into(), s.table.clone())])),
        Statement::CreateTable(s) => Ok(leaf("CreateTable", vec![("table".into(), s.name.clone())])),
        Statement::DropTable(s) => Ok(leaf("DropTable", vec![("table".into(), s.name.clone())])),
        Statement::CreateIndex(s) => Ok(leaf("CreateIndex", vec![("index".into(), s.name.clone())])),
        Statement::DropIndex(s) => Ok(leaf("DropIndex", vec![("index".into(), s.name.clone())])),
    }
}

/// `EXPLAIN`'s JSON rendering, delegating the actual serialization to
/// the planner's hand-rolled writer.
pub fn explain_json(stmt: &Statement, catalog: &Catalog) -> Result<Vec<u8>> {
    Ok(planner::explain_json(&explain(stmt, catalog)?))
}

fn leaf(name: &str, details: Vec<(String, String)>) -> ExplainNode {
    ExplainNode { name: name.to_string(), details, children: vec![] }
}

// ---------------------------------------------------------------------
// DDL
// ---------------------------------------------------------------------

fn execute_create_table(
    stmt: &CreateTableStatement,
    pager: &mut Pager,
    wal: &mut WalManager,
    catalog: &mut Catalog,
    db_path: &Path,
) -> Result<usize> {
    planner::validate_create_table(stmt, catalog)?;

    let mut columns = Vec::with_capacity(stmt.columns.len());
    for col in &stmt.columns {
        let args: Vec<i64> = col.type_args.iter().map(|a| *a as i64).collect();
        let column_type = ColumnType::parse(&col.type_name, &args)?;
        columns.push(Column { name: col.name.clone(), column_type, nullable: !col.not_null });
    }

    let primary_key: Vec<usize> = stmt
        .primary_key
        .iter()
        .map(|name| columns.iter().position(|c| c.name.eq_ignore_ascii_case(name)).unwrap())
        .collect();

    let mut foreign_keys = Vec::with_capacity(stmt.foreign_keys.len());
    for fk in &stmt.foreign_keys {
        for col in &fk.columns {
            if !columns.iter().any(|c| c.name.eq_ignore_ascii_case(col)) {
                return Err(GraniteError::Definition(format!(
                    "foreign key column {col} is not defined on table {}",
                    stmt.name
                )));
            }
        }
        foreign_keys.push(ForeignKey {
            columns: fk.columns.clone(),
            ref_table: fk.ref_table.clone(),
            ref_columns: fk.ref_columns.clone(),
            on_delete: parse_referential_action(fk.on_delete.as_deref()),
            on_update: parse_referential_action(fk.on_update.as_deref()),
        });
    }

    let existing_root = pager.catalog_root();
    let mut dirty = DirtyPages::new(pager, wal);
    let heap_root = HeapFile::create(&mut dirty)?;

    catalog.create_table(Table {
        name: stmt.name.clone(),
        columns,
        primary_key: primary_key.clone(),
        foreign_keys,
        heap_root,
        row_count: 0,
    })?;

    let new_root = catalog.persist(&mut dirty, existing_root)?;
    dirty.commit()?;
    pager.set_catalog_root(new_root)?;
    pager.sync()?;

    // An implicit unique index backs the primary key, matching how
    // `UNIQUE` secondary indexes are built: empty at this point, since
    // the table was just created.
    if !primary_key.is_empty() {
        let table = catalog.table(&stmt.name)?.clone();
        let pk_columns: Vec<String> = primary_key.iter().map(|&i| table.columns[i].name.clone()).collect();
        let index_name = format!("pk_{}", stmt.name);
        build_index(
            &index_name,
            &stmt.name,
            &pk_columns,
            true,
            pager,
            wal,
            catalog,
            db_path,
        )?;
    }

    Ok(0)
}

fn execute_drop_table(
    stmt: &DropTableStatement,
    pager: &mut Pager,
    wal: &mut WalManager,
    catalog: &mut Catalog,
    db_path: &Path,
) -> Result<usize> {
    let table = catalog.table(&stmt.name)?.clone();
    let dropped_indexes: Vec<Index> = catalog.indexes_on(&stmt.name).cloned().collect();

    let existing_root = pager.catalog_root();
    catalog.drop_table(&stmt.name)?;

    let mut dirty = DirtyPages::new(pager, wal);
    let mut page_id = table.heap_root;
    while page_id != 0 {
        let mut buf = dirty.read_page(page_id)?;
        let next_page = SlottedPage::new(&mut buf).next_page();
        dirty.free_page(page_id)?;
        page_id = next_page;
    }

    let new_root = catalog.persist(&mut dirty, existing_root)?;
    dirty.commit()?;
    pager.set_catalog_root(new_root)?;
    pager.sync()?;

    for idx in &dropped_indexes {
        let _ = std::fs::remove_file(index::index_path(db_path, idx.file_id));
    }

    Ok(0)
}

fn execute_create_index(
    stmt: &CreateIndexStatement,
    pager: &mut Pager,
    wal: &mut WalManager,
    catalog: &mut Catalog,
    db_path: &Path,
) -> Result<usize> {
    build_index(&stmt.name, &stmt.table, &stmt.columns, stmt.unique, pager, wal, catalog, db_path)?;
    Ok(0)
}

fn execute_drop_index(
    stmt: &DropIndexStatement,
    pager: &mut Pager,
    wal: &mut WalManager,
    catalog: &mut Catalog,
    db_path: &Path,
) -> Result<usize> {
    let index_meta = catalog.index(&stmt.name)?.clone();
    let existing_root = pager.catalog_root();
    catalog.drop_index(&stmt.name)?;

    let mut dirty = DirtyPages::new(pager, wal);
    let new_root = catalog.persist(&mut dirty, existing_root)?;
    dirty.commit()?;
    pager.set_catalog_root(new_root)?;
    pager.sync()?;

    let _ = std::fs::remove_file(index::index_path(db_path, index_meta.file_id));
    Ok(0)
}

/// Shared by `CREATE INDEX` and `CREATE TABLE`'s implicit primary-key
/// index: registers the index in the catalog, then builds its on-disk
/// file from whatever rows the table already holds (empty for a
/// brand-new table).
fn build_index(
    name: &str,
    table_name: &str,
    columns: &[String],
    unique: bool,
    pager: &mut Pager,
    wal: &mut WalManager,
    catalog: &mut Catalog,
    db_path: &Path,
) -> Result<()> {
    let table = catalog.table(table_name)?.clone();
    let mut col_indices = Vec::with_capacity(columns.len());
    for c in columns {
        let (idx, _) = table
            .find_column(c)
            .ok_or_else(|| GraniteError::Definition(format!("unknown column {c} on table {table_name}")))?;
        col_indices.push(idx);
    }

    let existing_root = pager.catalog_root();
    let file_id = catalog.create_index(Index {
        name: name.to_string(),
        table: table_name.to_string(),
        columns: columns.to_vec(),
        unique,
        file_id: 0,
    })?;

    let path = index::index_path(db_path, file_id);
    let mut index_file = IndexFile::create(&path, unique)?;

    let mut dirty = DirtyPages::new(pager, wal);
    let heap = HeapFile::new(table.heap_root);
    let heap_rows = heap.scan(&dirty)?;
    let mut entries = Vec::with_capacity(heap_rows.len());
    for (row_id, bytes) in heap_rows {
        let values = tuple::decode(&table.columns, &bytes)?;
        let components: Vec<Vec<u8>> = col_indices.iter().map(|&i| encode_index_component(&values[i])).collect();
        entries.push(index::Entry { key: index::encode_key(&components), row_id });
    }
    index_file.rebuild(entries)?;

    let new_root = catalog.persist(&mut dirty, existing_root)?;
    dirty.commit()?;
    pager.set_catalog_root(new_root)?;
    pager.sync()?;
    Ok(())
}

fn parse_referential_action(text: Option<&str>) -> ReferentialAction {
    match text.map(|s| s.to_ascii_uppercase()) {
        Some(s) if s == "CASCADE" => ReferentialAction::Cascade,
        Some(s) if s == "SET NULL" => ReferentialAction::SetNull,
        Some(s) if s == "RESTRICT" => ReferentialAction::Restrict,
        _ => ReferentialAction::NoAction,
    }
}

// ---------------------------------------------------------------------
// INSERT
// ---------------------------------------------------------------------

fn execute_insert(
    stmt: &InsertStatement,
    pager: &mut Pager,
    wal: &mut WalManager,
    catalog: &mut Catalog,
    db_path: &Path,
) -> Result<usize> {
    let table = catalog.table(&stmt.table)?.clone();

    let column_order: Vec<usize> = match &stmt.columns {
        Some(names) => {
            let mut order = Vec::with_capacity(names.len());
            for n in names {
                let (idx, _) = table
                    .find_column(n)
                    .ok_or_else(|| GraniteError::Definition(format!("unknown column {n} on table {}", table.name)))?;
                order.push(idx);
            }
            order
        }
        None => (0..table.columns.len()).collect(),
    };

    let indexes: Vec<Index> = catalog.indexes_on(&stmt.table).cloned().collect();
    let heap = HeapFile::new(table.heap_root);
    let existing_root = pager.catalog_root();
    let mut dirty = DirtyPages::new(pager, wal);
    let empty_schema: Vec<ResolvedColumn> = Vec::new();
    let mut inserted = 0usize;

    for value_row in &stmt.values {
        if value_row.len() != column_order.len() {
            return Err(GraniteError::Type(format!(
                "expected {} values, got {}",
                column_order.len(),
                value_row.len()
            )));
        }

        let mut row = vec![Value::Null; table.columns.len()];
        for (&slot, expr) in column_order.iter().zip(value_row.iter()) {
            let value = expr::eval(expr, &empty_schema, &[])?;
            row[slot] = coerce_value_to_column(value, &table.columns[slot])?;
        }

        let encoded = tuple::encode(&table.columns, &row)?;
        let row_id = heap.insert(&mut dirty, &encoded)?;

        for index_meta in &indexes {
            let components: Vec<Vec<u8>> = index_meta
                .columns
                .iter()
                .map(|col_name| {
                    let (idx, _) = table.find_column(col_name).expect("index column must exist on table");
                    encode_index_component(&row[idx])
                })
                .collect();
            let key = index::encode_key(&components);
            let path = index::index_path(db_path, index_meta.file_id);
            let mut index_file = IndexFile::open(&path, index_meta.unique)?;
            index_file.insert(key, row_id)?;
        }

        inserted += 1;
    }

    catalog.increment_row_count(&stmt.table, inserted as i64)?;
    let new_root = catalog.persist(&mut dirty, existing_root)?;
    dirty.commit()?;
    pager.set_catalog_root(new_root)?;
    pager.sync()?;

    Ok(inserted)
}

/// Coerce an evaluated expression value to its target column's declared
/// type. Literal integers always evaluate to `Value::Int64` regardless
/// of the column they're headed for (`expr::eval`), so every `INSERT`
/// and every index probe key needs this to land on the column's actual
/// runtime representation before encoding. `NULL` passes through
/// untouched; nullability is checked separately by `tuple::encode`.
fn coerce_value_to_column(value: Value, column: &Column) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match (&column.column_type, value) {
        (ColumnType::Int32, v @ Value::Int32(_)) => Ok(v),
        (ColumnType::Int32, Value::Int64(n)) => i32::try_from(n).map(Value::Int32).map_err(|_| {
            GraniteError::Type(format!("value {n} out of range for column {} (INT32)", column.name))
        }),
        (ColumnType::Int64, v @ Value::Int64(_)) => Ok(v),
        (ColumnType::Int64, Value::Int32(n)) => Ok(Value::Int64(n as i64)),
        (ColumnType::Varchar(_), v @ Value::Varchar(_)) => Ok(v),
        (ColumnType::Decimal(..), v @ Value::Decimal(_)) => Ok(v),
        (ColumnType::Decimal(_, scale), Value::Int32(n)) => Ok(Value::Decimal(Decimal::new(n as i128, 0).rescale(*scale))),
        (ColumnType::Decimal(_, scale), Value::Int64(n)) => Ok(Value::Decimal(Decimal::new(n as i128, 0).rescale(*scale))),
        (ColumnType::Boolean, v @ Value::Boolean(_)) => Ok(v),
        (ColumnType::Date, v @ Value::Date(_)) => Ok(v),
        (ColumnType::Date, Value::Int64(n)) => i32::try_from(n).map(Value::Date).map_err(|_| {
            GraniteError::Type(format!("value {n} out of range for column {} (DATE)", column.name))
        }),
        (ColumnType::Date, Value::Int32(n)) => Ok(Value::Date(n)),
        (ColumnType::Timestamp, v @ Value::Timestamp(_)) => Ok(v),
        (ColumnType::Timestamp, Value::Int64(n)) => Ok(Value::Timestamp(n)),
        (ColumnType::Timestamp, Value::Int32(n)) => Ok(Value::Timestamp(n as i64)),
        (expected, got) => Err(GraniteError::Type(format!("column {} expects {expected}, got {got:?}", column.name))),
    }
}

/// Encode one value as an index key component: a leading NULL tag
/// (`0`/`1`) so `NULL` always sorts first, matching `Value::total_cmp`,
/// followed by a byte encoding that preserves numeric/lexicographic
/// order under plain unsigned byte comparison. Signed integers are
/// stored sign-flipped big-endian; `DECIMAL` relies on every value in a
/// column sharing that column's declared scale (enforced by
/// `tuple::encode`), so comparing raw magnitudes directly is correct.
fn encode_index_component(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    match value {
        Value::Null => out.push(0),
        Value::Int32(n) => {
            out.push(1);
            out.extend_from_slice(&flip_i32(*n));
        }
        Value::Int64(n) => {
            out.push(1);
            out.extend_from_slice(&flip_i64(*n));
        }
        Value::Decimal(d) => {
            out.push(1);
            out.extend_from_slice(&flip_i128(d.raw));
        }
        Value::Varchar(s) => {
            out.push(1);
            out.extend_from_slice(s.as_bytes());
        }
        Value::Boolean(b) => {
            out.push(1);
            out.push(if *b { 1 } else { 0 });
        }
        Value::Date(d) => {
            out.push(1);
            out.extend_from_slice(&flip_i32(*d));
        }
        Value::Timestamp(t) => {
            out.push(1);
            out.extend_from_slice(&flip_i64(*t));
        }
    }
    out
}

fn flip_i32(v: i32) -> [u8; 4] {
    ((v as u32) ^ 0x8000_0000).to_be_bytes()
}

fn flip_i64(v: i64) -> [u8; 8] {
    ((v as u64) ^ 0x8000_0000_0000_0000).to_be_bytes()
}

fn flip_i128(v: i128) -> [u8; 16] {
    ((v as u128) ^ (1u128 << 127)).to_be_bytes()
}

// ---------------------------------------------------------------------
// Operator tree construction
// ---------------------------------------------------------------------

fn table_schema(table_name: &str, alias: Option<&str>, table: &Table) -> Vec<ResolvedColumn> {
    let binding = alias.unwrap_or(table_name).to_string();
    table
        .columns
        .iter()
        .map(|c| ResolvedColumn {
            table: Some(binding.clone()),
            name: c.name.clone(),
            column_type: c.column_type,
            nullable: c.nullable,
        })
        .collect()
}

fn build_operator(node: &PlanNode, catalog: &Catalog) -> Result<Box<dyn Operator>> {
    match node {
        PlanNode::SingleRow => Ok(Box::new(SingleRowOp { schema: Vec::new(), done: false })),
        PlanNode::SeqScan { table, alias } => {
            let t = catalog.table(table)?;
            let schema = table_schema(table, alias.as_deref(), t);
            Ok(Box::new(SeqScanOp { table: t.clone(), schema, rows: Vec::new().into_iter() }))
        }
        PlanNode::IndexSeek { table, alias, index, key } => {
            let t = catalog.table(table)?;
            let schema = table_schema(table, alias.as_deref(), t);
            Ok(Box::new(IndexSeekOp {
                table: t.clone(),
                index_name: index.clone(),
                key: key.clone(),
                schema,
                rows: Vec::new().into_iter(),
            }))
        }
        PlanNode::IndexRange { table, alias, index, lower, upper } => {
            let t = catalog.table(table)?;
            let schema = table_schema(table, alias.as_deref(), t);
            Ok(Box::new(IndexRangeOp {
                table: t.clone(),
                index_name: index.clone(),
                lower: lower.clone(),
                upper: upper.clone(),
                schema,
                rows: Vec::new().into_iter(),
            }))
        }
        PlanNode::Filter { input, predicate } => {
            let child = build_operator(input, catalog)?;
            let schema = child.schema().to_vec();
            Ok(Box::new(FilterOp { input: child, predicate: predicate.clone(), schema }))
        }
        PlanNode::NestedLoopJoin { left, right, join_type, on } => {
            let left_op = build_operator(left, catalog)?;
            let right_op = build_operator(right, catalog)?;
            let mut schema = left_op.schema().to_vec();
            let right_width = right_op.schema().len();
            // NULL-extend the right side's nullability for a LEFT JOIN so
            // typing downstream (e.g. expr::infer_type, not exercised at
            // runtime here) reflects unmatched rows correctly.
            let mut right_schema = right_op.schema().to_vec();
            if *join_type == JoinType::Left {
                for c in &mut right_schema {
                    c.nullable = true;
                }
            }
            schema.extend(right_schema);
            Ok(Box::new(NestedLoopJoinOp {
                left: left_op,
                right: right_op,
                join_type: join_type.clone(),
                on: on.clone(),
                schema,
                right_rows: Vec::new(),
                right_width,
                current_left: None,
                right_idx: 0,
                matched_any: false,
            }))
        }
        PlanNode::HashGroup { input, group_by, aggregates, having } => {
            let child = build_operator(input, catalog)?;
            let input_schema = child.schema().to_vec();
            let mut schema = Vec::with_capacity(group_by.len() + aggregates.len());
            for (i, g) in group_by.iter().enumerate() {
                let t = expr::infer_type(g, &input_schema)?;
                schema.push(ResolvedColumn {
                    table: None,
                    name: format!("__group_{i}"),
                    column_type: t.kind.unwrap_or(ColumnType::Int64),
                    nullable: t.nullable,
                });
            }
            for (i, call) in aggregates.iter().enumerate() {
                let (kind, nullable) = aggregate_result_type(call, &input_schema)?;
                schema.push(ResolvedColumn { table: None, name: format!("__agg_{i}"), column_type: kind, nullable });
            }
            Ok(Box::new(HashGroupOp {
                input: child,
                group_by: group_by.clone(),
                aggregates: aggregates.clone(),
                having: having.clone(),
                input_schema,
                schema,
                output: Vec::new().into_iter(),
            }))
        }
        PlanNode::Project { input, columns } => {
            let child = build_operator(input, catalog)?;
            let input_schema = child.schema().to_vec();
            let grouped = group_context(input);

            let mut exprs = Vec::new();
            let mut schema = Vec::new();
            for col in columns {
                match col {
                    SelectColumn::AllColumns => {
                        for (i, c) in input_schema.iter().enumerate() {
                            exprs.push(Expr::Column { table: None, name: format!("__col_{i}") });
                            schema.push(c.clone());
                        }
                    }
                    SelectColumn::TableAllColumns(t) => {
                        for (i, c) in input_schema.iter().enumerate() {
                            if c.table.as_deref().is_some_and(|ct| ct.eq_ignore_ascii_case(t)) {
                                exprs.push(Expr::Column { table: None, name: format!("__col_{i}") });
                                schema.push(c.clone());
                            }
                        }
                    }
                    SelectColumn::Expr { expr, alias } => {
                        let rewritten = match grouped {
                            Some((group_by, aggregates)) => planner::rewrite_for_group(expr, group_by, aggregates),
                            None => expr.clone(),
                        };
                        let t = expr::infer_type(&rewritten, &input_schema)?;
                        let name = alias.clone().unwrap_or_else(|| default_column_name(expr));
                        schema.push(ResolvedColumn {
                            table: None,
                            name,
                            column_type: t.kind.unwrap_or(ColumnType::Int64),
                            nullable: t.nullable,
                        });
                        exprs.push(rewritten);
                    }
                }
            }
            // `__col_i` placeholders from `*`/`t.*` expansion resolve
            // directly by position rather than through expr::eval's
            // name-based lookup, since the synthesized alias is not a
            // real column name.
            Ok(Box::new(ProjectOp { input: child, exprs, input_schema, schema }))
        }
        PlanNode::Distinct { input } => {
            let child = build_operator(input, catalog)?;
            let schema = child.schema().to_vec();
            Ok(Box::new(DistinctOp { input: child, schema, seen: Vec::new(), rows: Vec::new().into_iter() }))
        }
        PlanNode::Sort { input, order_by } => {
            let child = build_operator(input, catalog)?;
            let schema = child.schema().to_vec();
            let grouped = group_context(input);
            let keys: Vec<(Expr, bool)> = order_by
                .iter()
                .map(|item| {
                    let e = match grouped {
                        Some((group_by, aggregates)) => planner::rewrite_for_group(&item.expr, group_by, aggregates),
                        None => item.expr.clone(),
                    };
                    (e, item.desc)
                })
                .collect();
            Ok(Box::new(SortOp { input: child, keys, schema, rows: Vec::new().into_iter() }))
        }
        PlanNode::Limit { input, limit, offset } => {
            let child = build_operator(input, catalog)?;
            let schema = child.schema().to_vec();
            let limit = match limit {
                Some(e) => Some(eval_const_i64(e)? as usize),
                None => None,
            };
            let offset = match offset {
                Some(e) => eval_const_i64(e)? as usize,
                None => 0,
            };
            Ok(Box::new(LimitOp { input: child, limit, offset, schema, skipped: 0, taken: 0 }))
        }
    }
}

/// If `node` is a `HashGroup`, return its `group_by`/`aggregates` so the
/// caller can rewrite expressions that reference grouped-query output
/// through `planner::rewrite_for_group` instead of the raw input schema.
fn group_context(node: &PlanNode) -> Option<(&[Expr], &[AggregateCall])> {
    match node {
        PlanNode::HashGroup { group_by, aggregates, .. } => Some((group_by, aggregates)),
        _ => None,
    }
}

fn default_column_name(expr: &Expr) -> String {
    match expr {
        Expr::Column { name, .. } => name.clone(),
        Expr::Function { name, star: true, .. } => format!("{}(*)", name.to_ascii_uppercase()),
        Expr::Function { name, .. } => name.to_ascii_uppercase(),
        _ => "expr".to_string(),
    }
}

fn eval_const_i64(expr: &Expr) -> Result<i64> {
    let empty_schema: Vec<ResolvedColumn> = Vec::new();
    match expr::eval(expr, &empty_schema, &[])? {
        Value::Int32(n) => Ok(n as i64),
        Value::Int64(n) => Ok(n),
        other => Err(GraniteError::Type(format!("expected an integer LIMIT/OFFSET, got {other:?}"))),
    }
}

// ---------------------------------------------------------------------
// Leaf operators
// ---------------------------------------------------------------------

/// The source for a `SELECT` with no `FROM` clause: exactly one empty
/// row, so a projection of scalar expressions runs exactly once.
struct SingleRowOp {
    schema: Vec<ResolvedColumn>,
    done: bool,
}

impl Operator for SingleRowOp {
    fn schema(&self) -> &[ResolvedColumn] {
        &self.schema
    }

    fn open(&mut self, _ctx: &ExecContext<'_>) -> Result<()> {
        self.done = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Vec<Value>>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        Ok(Some(Vec::new()))
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

struct SeqScanOp {
    table: Table,
    schema: Vec<ResolvedColumn>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl Operator for SeqScanOp {
    fn schema(&self) -> &[ResolvedColumn] {
        &self.schema
    }

    fn open(&mut self, ctx: &ExecContext<'_>) -> Result<()> {
        let heap = HeapFile::new(self.table.heap_root);
        let mut rows = Vec::new();
        for (_, bytes) in heap.scan(ctx.dirty)? {
            rows.push(tuple::decode(&self.table.columns, &bytes)?);
        }
        self.rows = rows.into_iter();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows.next())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

struct IndexSeekOp {
    table: Table,
    index_name: String,
    key: Vec<Expr>,
    schema: Vec<ResolvedColumn>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl Operator for IndexSeekOp {
    fn schema(&self) -> &[ResolvedColumn] {
        &self.schema
    }

    fn open(&mut self, ctx: &ExecContext<'_>) -> Result<()> {
        let index_meta = ctx.catalog.index(&self.index_name)?;
        let path = index::index_path(ctx.db_path, index_meta.file_id);
        let index_file = IndexFile::open(&path, index_meta.unique)?;

        let empty_schema: Vec<ResolvedColumn> = Vec::new();
        let mut components = Vec::with_capacity(self.key.len());
        for (e, col_name) in self.key.iter().zip(index_meta.columns.iter()) {
            let (_, column) = self
                .table
                .find_column(col_name)
                .ok_or_else(|| GraniteError::Internal(format!("index column {col_name} missing from table")))?;
            let value = expr::eval(e, &empty_schema, &[])?;
            let coerced = coerce_value_to_column(value, column)?;
            components.push(encode_index_component(&coerced));
        }
        let key = index::encode_key(&components);
        let row_ids = index_file.seek_exact(&key);

        let heap = HeapFile::new(self.table.heap_root);
        let mut rows = Vec::with_capacity(row_ids.len());
        for row_id in row_ids {
            if let Some(bytes) = heap.get(ctx.dirty, row_id)? {
                rows.push(tuple::decode(&self.table.columns, &bytes)?);
            }
        }
        self.rows = rows.into_iter();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows.next())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

struct IndexRangeOp {
    table: Table,
    index_name: String,
    lower: Option<(Expr, bool)>,
    upper: Option<(Expr, bool)>,
    schema: Vec<ResolvedColumn>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl Operator for IndexRangeOp {
    fn schema(&self) -> &[ResolvedColumn] {
        &self.schema
    }

    fn open(&mut self, ctx: &ExecContext<'_>) -> Result<()> {
        let index_meta = ctx.catalog.index(&self.index_name)?;
        let path = index::index_path(ctx.db_path, index_meta.file_id);
        let index_file = IndexFile::open(&path, index_meta.unique)?;

        let (column_idx, column) = index_meta
            .columns
            .first()
            .and_then(|c| self.table.find_column(c))
            .ok_or_else(|| GraniteError::Internal("index range on a table with no matching column".into()))?;

        let empty_schema: Vec<ResolvedColumn> = Vec::new();
        let lower_value = match &self.lower {
            Some((e, inclusive)) => {
                let v = coerce_value_to_column(expr::eval(e, &empty_schema, &[])?, column)?;
                Some((v, *inclusive))
            }
            None => None,
        };
        let upper_value = match &self.upper {
            Some((e, inclusive)) => {
                let v = coerce_value_to_column(expr::eval(e, &empty_schema, &[])?, column)?;
                Some((v, *inclusive))
            }
            None => None,
        };

        // `IndexFile::range`'s upper bound is always exclusive, which
        // can't safely represent an inclusive `<=` bound at the byte
        // level for every value type. Prune on the lower bound only
        // (inclusive, i.e. the index's own semantics) and re-check both
        // bounds against the decoded values afterward.
        let lower_key = lower_value.as_ref().map(|(v, _)| index::encode_key(&[encode_index_component(v)]));
        let row_ids = index_file.range(lower_key.as_deref(), None);

        let heap = HeapFile::new(self.table.heap_root);
        let mut rows = Vec::new();

        for row_id in row_ids {
            let Some(bytes) = heap.get(ctx.dirty, row_id)? else { continue };
            let values = tuple::decode(&self.table.columns, &bytes)?;
            let candidate = &values[column_idx];
            if let Some((bound, inclusive)) = &lower_value {
                let cmp = candidate.total_cmp(bound);
                if cmp == Ordering::Less || (!*inclusive && cmp == Ordering::Equal) {
                    continue;
                }
            }
            if let Some((bound, inclusive)) = &upper_value {
                let cmp = candidate.total_cmp(bound);
                if cmp == Ordering::Greater || (!*inclusive && cmp == Ordering::Equal) {
                    continue;
                }
            }
            rows.push(values);
        }
        self.rows = rows.into_iter();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows.next())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Combinator operators
// ---------------------------------------------------------------------

struct FilterOp {
    input: Box<dyn Operator>,
    predicate: Expr,
    schema: Vec<ResolvedColumn>,
}

impl Operator for FilterOp {
    fn schema(&self) -> &[ResolvedColumn] {
        &self.schema
    }

    fn open(&mut self, ctx: &ExecContext<'_>) -> Result<()> {
        self.input.open(ctx)
    }

    fn next(&mut self) -> Result<Option<Vec<Value>>> {
        while let Some(row) = self.input.next()? {
            if expr::eval(&self.predicate, &self.schema, &row)?.to_bool3() == Some(true) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        self.input.close()
    }
}

struct NestedLoopJoinOp {
    left: Box<dyn Operator>,
    right: Box<dyn Operator>,
    join_type: JoinType,
    on: Option<Expr>,
    schema: Vec<ResolvedColumn>,
    right_rows: Vec<Vec<Value>>,
    right_width: usize,
    current_left: Option<Vec<Value>>,
    right_idx: usize,
    matched_any: bool,
}

impl Operator for NestedLoopJoinOp {
    fn schema(&self) -> &[ResolvedColumn] {
        &self.schema
    }

    fn open(&mut self, ctx: &ExecContext<'_>) -> Result<()> {
        self.left.open(ctx)?;
        self.right.open(ctx)?;
        self.right_rows.clear();
        while let Some(row) = self.right.next()? {
            self.right_rows.push(row);
        }
        self.right.close()?;
        self.current_left = None;
        self.right_idx = 0;
        self.matched_any = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Vec<Value>>> {
        loop {
            if self.current_left.is_none() {
                match self.left.next()? {
                    None => return Ok(None),
                    Some(row) => {
                        self.current_left = Some(row);
                        self.right_idx = 0;
                        self.matched_any = false;
                    }
                }
            }
            let left_row = self.current_left.clone().expect("checked above");

            while self.right_idx < self.right_rows.len() {
                let right_row = self.right_rows[self.right_idx].clone();
                self.right_idx += 1;
                let mut combined = left_row.clone();
                combined.extend(right_row);

                let keep = match &self.on {
                    None => true,
                    Some(pred) => expr::eval(pred, &self.schema, &combined)?.to_bool3() == Some(true),
                };
                if keep {
                    self.matched_any = true;
                    return Ok(Some(combined));
                }
            }

            let unmatched_left = self.current_left.take();
            if self.join_type == JoinType::Left && !self.matched_any {
                let mut combined = unmatched_left.expect("checked above");
                combined.extend(std::iter::repeat(Value::Null).take(self.right_width));
                return Ok(Some(combined));
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.left.close()
    }
}

struct HashGroupOp {
    input: Box<dyn Operator>,
    group_by: Vec<Expr>,
    aggregates: Vec<AggregateCall>,
    having: Option<Expr>,
    input_schema: Vec<ResolvedColumn>,
    schema: Vec<ResolvedColumn>,
    output: std::vec::IntoIter<Vec<Value>>,
}

impl Operator for HashGroupOp {
    fn schema(&self) -> &[ResolvedColumn] {
        &self.schema
    }

    fn open(&mut self, ctx: &ExecContext<'_>) -> Result<()> {
        self.input.open(ctx)?;
        let mut buckets: Vec<(Vec<Value>, Vec<Vec<Value>>)> = Vec::new();
        while let Some(row) = self.input.next()? {
            let key: Vec<Value> =
                self.group_by.iter().map(|e| expr::eval(e, &self.input_schema, &row)).collect::<Result<_>>()?;
            match buckets.iter_mut().find(|(k, _)| keys_eq(k, &key)) {
                Some(bucket) => bucket.1.push(row),
                None => buckets.push((key, vec![row])),
            }
        }
        self.input.close()?;

        // A bare aggregate with no GROUP BY always produces one row,
        // even over zero input rows (e.g. `SELECT COUNT(*) FROM t` on an
        // empty table yields 0, not no rows).
        if buckets.is_empty() && self.group_by.is_empty() {
            buckets.push((Vec::new(), Vec::new()));
        }

        let mut out_rows = Vec::new();
        for (key, rows) in &buckets {
            let mut out = key.clone();
            for call in &self.aggregates {
                out.push(fold_aggregate(call, rows, &self.input_schema)?);
            }
            if let Some(having) = &self.having {
                let rewritten = planner::rewrite_for_group(having, &self.group_by, &self.aggregates);
                if expr::eval(&rewritten, &self.schema, &out)?.to_bool3() != Some(true) {
                    continue;
                }
            }
            out_rows.push(out);
        }
        self.output = out_rows.into_iter();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.output.next())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

fn keys_eq(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.group_key_eq(y))
}

struct ProjectOp {
    input: Box<dyn Operator>,
    exprs: Vec<Expr>,
    input_schema: Vec<ResolvedColumn>,
    schema: Vec<ResolvedColumn>,
}

impl Operator for ProjectOp {
    fn schema(&self) -> &[ResolvedColumn] {
        &self.schema
    }

    fn open(&mut self, ctx: &ExecContext<'_>) -> Result<()> {
        self.input.open(ctx)
    }

    fn next(&mut self) -> Result<Option<Vec<Value>>> {
        let Some(row) = self.input.next()? else { return Ok(None) };
        let mut out = Vec::with_capacity(self.exprs.len());
        for e in &self.exprs {
            out.push(eval_projected(e, &self.input_schema, &row)?);
        }
        Ok(Some(out))
    }

    fn close(&mut self) -> Result<()> {
        self.input.close()
    }
}

/// `*`/`t.*` expansion emits `__col_i` placeholders that bind by
/// position rather than name (the name-based lookup in `expr::eval`
/// doesn't apply, since these aren't real column references).
fn eval_projected(expr: &Expr, schema: &[ResolvedColumn], row: &[Value]) -> Result<Value> {
    if let Expr::Column { table: None, name } = expr {
        if let Some(rest) = name.strip_prefix("__col_") {
            if let Ok(i) = rest.parse::<usize>() {
                return Ok(row[i].clone());
            }
        }
    }
    expr::eval(expr, schema, row)
}

struct DistinctOp {
    input: Box<dyn Operator>,
    schema: Vec<ResolvedColumn>,
    seen: Vec<Vec<Value>>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl Operator for DistinctOp {
    fn schema(&self) -> &[ResolvedColumn] {
        &self.schema
    }

    fn open(&mut self, ctx: &ExecContext<'_>) -> Result<()> {
        self.input.open(ctx)?;
        self.seen.clear();
        let mut out = Vec::new();
        while let Some(row) = self.input.next()? {
            if !self.seen.iter().any(|s| keys_eq(s, &row)) {
                self.seen.push(row.clone());
                out.push(row);
            }
        }
        self.input.close()?;
        self.rows = out.into_iter();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows.next())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

struct SortOp {
    input: Box<dyn Operator>,
    keys: Vec<(Expr, bool)>,
    schema: Vec<ResolvedColumn>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl Operator for SortOp {
    fn schema(&self) -> &[ResolvedColumn] {
        &self.schema
    }

    fn open(&mut self, ctx: &ExecContext<'_>) -> Result<()> {
        self.input.open(ctx)?;
        let mut rows = Vec::new();
        while let Some(row) = self.input.next()? {
            rows.push(row);
        }
        self.input.close()?;

        let mut err = None;
        rows.sort_by(|a, b| {
            for (key, desc) in &self.keys {
                let ordering = match (expr::eval(key, &self.schema, a), expr::eval(key, &self.schema, b)) {
                    (Ok(av), Ok(bv)) => compare_for_sort(&av, &bv, *desc),
                    (Err(e), _) | (_, Err(e)) => {
                        if err.is_none() {
                            err = Some(e);
                        }
                        Ordering::Equal
                    }
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        if let Some(e) = err {
            return Err(e);
        }
        self.rows = rows.into_iter();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows.next())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// `Value::total_cmp` always sorts `NULL` as least, so flipping the
/// comparands for `DESC` automatically yields "NULLs first on ASC,
/// NULLs last on DESC" with no special-casing.
fn compare_for_sort(a: &Value, b: &Value, desc: bool) -> Ordering {
    if desc {
        b.total_cmp(a)
    } else {
        a.total_cmp(b)
    }
}

struct LimitOp {
    input: Box<dyn Operator>,
    limit: Option<usize>,
    offset: usize,
    schema: Vec<ResolvedColumn>,
    skipped: usize,
    taken: usize,
}

impl Operator for LimitOp {
    fn schema(&self) -> &[ResolvedColumn] {
        &self.schema
    }

    fn open(&mut self, ctx: &ExecContext<'_>) -> Result<()> {
        self.skipped = 0;
        self.taken = 0;
        self.input.open(ctx)
    }

    fn next(&mut self) -> Result<Option<Vec<Value>>> {
        if let Some(limit) = self.limit {
            if self.taken >= limit {
                return Ok(None);
            }
        }
        while self.skipped < self.offset {
            if self.input.next()?.is_none() {
                return Ok(None);
            }
            self.skipped += 1;
        }
        let row = self.input.next()?;
        if row.is_some() {
            self.taken += 1;
        }
        Ok(row)
    }

    fn close(&mut self) -> Result<()> {
        self.input.close()
    }
}

// ---------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------

fn aggregate_result_type(call: &AggregateCall, input_schema: &[ResolvedColumn]) -> Result<(ColumnType, bool)> {
    match call.func.as_str() {
        "COUNT" => Ok((ColumnType::Int64, false)),
        "SUM" | "AVG" => {
            let arg = call.arg.as_ref().ok_or_else(|| GraniteError::Planning(format!("{} requires an argument", call.func)))?;
            let t = expr::infer_type(arg, input_schema)?;
            let kind = match call.func.as_str() {
                "AVG" => match t.kind {
                    Some(ColumnType::Decimal(p, s)) => ColumnType::Decimal(p.min(38), (s + 6).min(37)),
                    _ => ColumnType::Decimal(38, 6),
                },
                _ => match t.kind {
                    Some(ColumnType::Int32) | Some(ColumnType::Int64) => ColumnType::Int64,
                    Some(other) => other,
                    None => ColumnType::Int64,
                },
            };
            Ok((kind, true))
        }
        "MIN" | "MAX" => {
            let arg = call.arg.as_ref().ok_or_else(|| GraniteError::Planning(format!("{} requires an argument", call.func)))?;
            let t = expr::infer_type(arg, input_schema)?;
            Ok((t.kind.unwrap_or(ColumnType::Int64), true))
        }
        other => Err(GraniteError::Planning(format!("unknown aggregate function {other}"))),
    }
}

fn fold_aggregate(call: &AggregateCall, rows: &[Vec<Value>], schema: &[ResolvedColumn]) -> Result<Value> {
    match call.func.as_str() {
        "COUNT" => match &call.arg {
            None => Ok(Value::Int64(rows.len() as i64)),
            Some(arg) => {
                let mut count = 0i64;
                for row in rows {
                    if !expr::eval(arg, schema, row)?.is_null() {
                        count += 1;
                    }
                }
                Ok(Value::Int64(count))
            }
        },
        "SUM" => {
            let arg = call.arg.as_ref().expect("validated by aggregate_result_type");
            let mut acc: Option<Value> = None;
            for row in rows {
                let v = expr::eval(arg, schema, row)?;
                if v.is_null() {
                    continue;
                }
                acc = Some(match acc {
                    None => v,
                    Some(prev) => add_numeric(&prev, &v),
                });
            }
            Ok(acc.unwrap_or(Value::Null))
        }
        "AVG" => {
            let arg = call.arg.as_ref().expect("validated by aggregate_result_type");
            let mut sum: Option<Value> = None;
            let mut count = 0i64;
            for row in rows {
                let v = expr::eval(arg, schema, row)?;
                if v.is_null() {
                    continue;
                }
                count += 1;
                sum = Some(match sum {
                    None => v,
                    Some(prev) => add_numeric(&prev, &v),
                });
            }
            match sum {
                None => Ok(Value::Null),
                Some(total) => Ok(divide_value_by_count(&total, count)),
            }
        }
        "MIN" => fold_min_max(call, rows, schema, Ordering::Less),
        "MAX" => fold_min_max(call, rows, schema, Ordering::Greater),
        other => Err(GraniteError::Internal(format!("unknown aggregate function {other}"))),
    }
}

fn fold_min_max(call: &AggregateCall, rows: &[Vec<Value>], schema: &[ResolvedColumn], want: Ordering) -> Result<Value> {
    let arg = call.arg.as_ref().expect("validated by aggregate_result_type");
    let mut best: Option<Value> = None;
    for row in rows {
        let v = expr::eval(arg, schema, row)?;
        if v.is_null() {
            continue;
        }
        best = Some(match best {
            None => v,
            Some(prev) => {
                if v.total_cmp(&prev) == want {
                    v
                } else {
                    prev
                }
            }
        });
    }
    Ok(best.unwrap_or(Value::Null))
}

fn add_numeric(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Decimal(_), _) | (_, Value::Decimal(_)) => {
            let ad = to_decimal_value(a);
            let bd = to_decimal_value(b);
            let scale = ad.scale.max(bd.scale);
            Value::Decimal(Decimal::new(ad.rescale(scale).raw + bd.rescale(scale).raw, scale))
        }
        (Value::Int64(_), _) | (_, Value::Int64(_)) => Value::Int64(as_i64(a) + as_i64(b)),
        _ => Value::Int32(as_i64(a) as i32 + as_i64(b) as i32),
    }
}

fn as_i64(v: &Value) -> i64 {
    match v {
        Value::Int32(n) => *n as i64,
        Value::Int64(n) => *n,
        _ => 0,
    }
}

fn to_decimal_value(v: &Value) -> Decimal {
    match v {
        Value::Decimal(d) => *d,
        Value::Int32(n) => Decimal::new(*n as i128, 0),
        Value::Int64(n) => Decimal::new(*n as i128, 0),
        _ => Decimal::new(0, 0),
    }
}

fn divide_value_by_count(total: &Value, count: i64) -> Value {
    if count == 0 {
        return Value::Null;
    }
    let d = to_decimal_value(total);
    let scale = (d.scale + 6).min(37);
    let rescaled = d.rescale(scale);
    Value::Decimal(Decimal::new(rescaled.raw / count as i128, scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::sql::parser::Parser;
    use crate::wal::WalManager;
    use tempfile::tempdir;

    fn open_fresh(dir: &std::path::Path) -> (Pager, WalManager, Catalog, std::path::PathBuf) {
        let db_path = dir.join("test.gdb");
        let wal_path = dir.join("test.gdb.wal");
        let mut pager = Pager::open(&db_path, false).unwrap();
        let wal = WalManager::open(&wal_path).unwrap();
        let catalog = Catalog::load(&pager, pager.catalog_root()).unwrap_or_else(|_| Catalog::new());
        (pager, wal, catalog, db_path)
    }

    fn run(pager: &mut Pager, wal: &mut WalManager, catalog: &mut Catalog, db_path: &Path, sql: &str) -> usize {
        let stmts = Parser::parse(sql).unwrap();
        let mut affected = 0;
        for stmt in &stmts {
            affected += execute_statement(stmt, pager, wal, catalog, db_path).unwrap();
        }
        affected
    }

    fn query(pager: &mut Pager, wal: &mut WalManager, catalog: &Catalog, db_path: &Path, sql: &str) -> (Vec<String>, Vec<Vec<Value>>) {
        let stmts = Parser::parse(sql).unwrap();
        match &stmts[0] {
            Statement::Select(_) => execute_query(&stmts[0], pager, wal, catalog, db_path).unwrap(),
            other => panic!("expected SELECT, got {other:?}"),
        }
    }

    #[test]
    fn create_insert_select_round_trip() {
        let dir = tempdir().unwrap();
        let (mut pager, mut wal, mut catalog, db_path) = open_fresh(&dir.path());
        run(&mut pager, &mut wal, &mut catalog, &db_path, "CREATE TABLE t (id INT32 PRIMARY KEY, name VARCHAR(20) NOT NULL)");
        run(&mut pager, &mut wal, &mut catalog, &db_path, "INSERT INTO t (id, name) VALUES (1, 'alice'), (2, 'bob')");
        let (columns, rows) = query(&mut pager, &mut wal, &catalog, &db_path, "SELECT id, name FROM t");
        assert_eq!(columns, vec!["id", "name"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1].to_string(), "alice");
    }

    #[test]
    fn unique_index_rejects_duplicate_primary_key() {
        let dir = tempdir().unwrap();
        let (mut pager, mut wal, mut catalog, db_path) = open_fresh(&dir.path());
        run(&mut pager, &mut wal, &mut catalog, &db_path, "CREATE TABLE t (id INT32 PRIMARY KEY)");
        run(&mut pager, &mut wal, &mut catalog, &db_path, "INSERT INTO t (id) VALUES (1)");
        let stmts = Parser::parse("INSERT INTO t (id) VALUES (1)").unwrap();
        let err = execute_statement(&stmts[0], &mut pager, &mut wal, &mut catalog, &db_path).unwrap_err();
        assert!(matches!(err, GraniteError::Constraint(_)));
    }

    #[test]
    fn where_clause_filters_rows() {
        let dir = tempdir().unwrap();
        let (mut pager, mut wal, mut catalog, db_path) = open_fresh(&dir.path());
        run(&mut pager, &mut wal, &mut catalog, &db_path, "CREATE TABLE t (id INT32 PRIMARY KEY, amount INT32 NOT NULL)");
        run(&mut pager, &mut wal, &mut catalog, &db_path, "INSERT INTO t (id, amount) VALUES (1, 10), (2, 20), (3, 30)");
        let (_, rows) = query(&mut pager, &mut wal, &catalog, &db_path, "SELECT id FROM t WHERE amount > 15");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn group_by_count_and_having() {
        let dir = tempdir().unwrap();
        let (mut pager, mut wal, mut catalog, db_path) = open_fresh(&dir.path());
        run(
            &mut pager, &mut wal, &mut catalog, &db_path,
            "CREATE TABLE orders (id INT32 PRIMARY KEY, customer VARCHAR(20) NOT NULL, total INT32 NOT NULL)",
        );
        run(
            &mut pager, &mut wal, &mut catalog, &db_path,
            "INSERT INTO orders (id, customer, total) VALUES (1, 'acme', 10), (2, 'acme', 20), (3, 'globex', 5)",
        );
        let (columns, rows) = query(
            &mut pager, &mut wal, &catalog, &db_path,
            "SELECT customer, COUNT(*) FROM orders GROUP BY customer HAVING COUNT(*) > 1",
        );
        assert_eq!(columns, vec!["customer", "COUNT"]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0].to_string(), "acme");
        assert_eq!(rows[0][1].to_string(), "2");
    }

    #[test]
    fn left_join_extends_unmatched_rows_with_null() {
        let dir = tempdir().unwrap();
        let (mut pager, mut wal, mut catalog, db_path) = open_fresh(&dir.path());
        run(&mut pager, &mut wal, &mut catalog, &db_path, "CREATE TABLE a (id INT32 PRIMARY KEY)");
        run(&mut pager, &mut wal, &mut catalog, &db_path, "CREATE TABLE b (a_id INT32 NOT NULL, label VARCHAR(10) NOT NULL)");
        run(&mut pager, &mut wal, &mut catalog, &db_path, "INSERT INTO a (id) VALUES (1), (2)");
        run(&mut pager, &mut wal, &mut catalog, &db_path, "INSERT INTO b (a_id, label) VALUES (1, 'x')");
        let (_, rows) = query(
            &mut pager, &mut wal, &catalog, &db_path,
            "SELECT a.id, b.label FROM a LEFT JOIN b ON a.id = b.a_id ORDER BY a.id",
        );
        assert_eq!(rows.len(), 2);
        assert!(rows[1][1].is_null());
    }

    #[test]
    fn order_by_desc_sorts_nulls_last() {
        let dir = tempdir().unwrap();
        let (mut pager, mut wal, mut catalog, db_path) = open_fresh(&dir.path());
        run(&mut pager, &mut wal, &mut catalog, &db_path, "CREATE TABLE t (id INT32 PRIMARY KEY, score INT32)");
        run(&mut pager, &mut wal, &mut catalog, &db_path, "INSERT INTO t (id, score) VALUES (1, NULL), (2, 5), (3, 10)");
        let (_, rows) = query(&mut pager, &mut wal, &catalog, &db_path, "SELECT id FROM t ORDER BY score DESC");
        assert_eq!(rows[0][0].to_string(), "3");
        assert_eq!(rows[2][0].to_string(), "1");
    }

    #[test]
    fn index_seek_used_for_equality_predicate() {
        let dir = tempdir().unwrap();
        let (mut pager, mut wal, mut catalog, db_path) = open_fresh(&dir.path());
        run(
            &mut pager, &mut wal, &mut catalog, &db_path,
            "CREATE TABLE t (id INT32 PRIMARY KEY, name VARCHAR(20) NOT NULL)",
        );
        run(&mut pager, &mut wal, &mut catalog, &db_path, "CREATE INDEX idx_name ON t (name)");
        run(&mut pager, &mut wal, &mut catalog, &db_path, "INSERT INTO t (id, name) VALUES (1, 'alice'), (2, 'bob')");
        let stmts = Parser::parse("SELECT id FROM t WHERE name = 'bob'").unwrap();
        let plan_explain = match &stmts[0] {
            Statement::Select(s) => planner::plan_select(s, &catalog).unwrap().1,
            _ => unreachable!(),
        };
        assert_eq!(plan_explain.name, "Project");
        let (_, rows) = query(&mut pager, &mut wal, &catalog, &db_path, "SELECT id FROM t WHERE name = 'bob'");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0].to_string(), "2");
    }

    #[test]
    fn drop_table_removes_rows_and_metadata() {
        let dir = tempdir().unwrap();
        let (mut pager, mut wal, mut catalog, db_path) = open_fresh(&dir.path());
        run(&mut pager, &mut wal, &mut catalog, &db_path, "CREATE TABLE t (id INT32 PRIMARY KEY)");
        run(&mut pager, &mut wal, &mut catalog, &db_path, "INSERT INTO t (id) VALUES (1)");
        run(&mut pager, &mut wal, &mut catalog, &db_path, "DROP TABLE t");
        assert!(!catalog.has_table("t"));
    }

    #[test]
    fn three_valued_where_excludes_unknown() {
        let dir = tempdir().unwrap();
        let (mut pager, mut wal, mut catalog, db_path) = open_fresh(&dir.path());
        run(&mut pager, &mut wal, &mut catalog, &db_path, "CREATE TABLE t (id INT32 PRIMARY KEY, score INT32)");
        run(&mut pager, &mut wal, &mut catalog, &db_path, "INSERT INTO t (id, score) VALUES (1, NULL), (2, 5)");
        let (_, rows) = query(&mut pager, &mut wal, &catalog, &db_path, "SELECT id FROM t WHERE score > 0");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0].to_string(), "2");
    }
}
