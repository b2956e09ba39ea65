//! Heuristic query planner.
//!
//! Produces two trees from one pass over the AST: a [`PlanNode`] tree the
//! executor pulls rows through, and a parallel [`ExplainNode`] tree for
//! `EXPLAIN`/`explain_json`. There is no cost model — index selection
//! follows the fixed rule order in [`choose_access_path`].

use crate::catalog::{Catalog, Index, Table};
use crate::error::{GraniteError, Result};
use crate::sql::ast::*;

/// A physical operator the executor knows how to run.
#[derive(Debug, Clone)]
pub enum PlanNode {
    /// A single, schema-less row of no columns — the source for a
    /// `SELECT` with no `FROM` clause, e.g. `SELECT 1 + 1`.
    SingleRow,
    SeqScan {
        table: String,
        alias: Option<String>,
    },
    /// Index lookup on an exact-match key (all of `key` bound by equality
    /// conjuncts in WHERE).
    IndexSeek {
        table: String,
        alias: Option<String>,
        index: String,
        key: Vec<Expr>,
    },
    /// Index range scan: a leading column bounded by `<`/`<=`/`>`/`>=`.
    IndexRange {
        table: String,
        alias: Option<String>,
        index: String,
        lower: Option<(Expr, bool)>,
        upper: Option<(Expr, bool)>,
    },
    Filter {
        input: Box<PlanNode>,
        predicate: Expr,
    },
    NestedLoopJoin {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        join_type: JoinType,
        on: Option<Expr>,
    },
    HashGroup {
        input: Box<PlanNode>,
        group_by: Vec<Expr>,
        aggregates: Vec<AggregateCall>,
        having: Option<Expr>,
    },
    Project {
        input: Box<PlanNode>,
        columns: Vec<SelectColumn>,
    },
    Distinct {
        input: Box<PlanNode>,
    },
    Sort {
        input: Box<PlanNode>,
        order_by: Vec<OrderByItem>,
    },
    Limit {
        input: Box<PlanNode>,
        limit: Option<Expr>,
        offset: Option<Expr>,
    },
}

/// One aggregate function call extracted from the projection/HAVING/ORDER
/// BY of a grouped query. `arg` is `None` for the bare `COUNT(*)` form.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCall {
    pub func: String,
    pub arg: Option<Expr>,
}

/// A node in the `EXPLAIN` output tree.
#[derive(Debug, Clone)]
pub struct ExplainNode {
    pub name: String,
    pub details: Vec<(String, String)>,
    pub children: Vec<ExplainNode>,
}

impl ExplainNode {
    fn leaf(name: &str, details: Vec<(String, String)>) -> ExplainNode {
        ExplainNode { name: name.to_string(), details, children: vec![] }
    }

    fn wrap(name: &str, details: Vec<(String, String)>, child: ExplainNode) -> ExplainNode {
        ExplainNode { name: name.to_string(), details, children: vec![child] }
    }
}

/// Serialize an `ExplainNode` tree to JSON bytes without a serialization
/// dependency — the format is small enough to hand-write.
pub fn explain_json(node: &ExplainNode) -> Vec<u8> {
    let mut out = String::new();
    write_explain_json(node, &mut out);
    out.into_bytes()
}

fn write_explain_json(node: &ExplainNode, out: &mut String) {
    out.push('{');
    out.push_str("\"name\":");
    write_json_string(&node.name, out);
    out.push_str(",\"details\":{");
    for (i, (k, v)) in node.details.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_json_string(k, out);
        out.push(':');
        write_json_string(v, out);
    }
    out.push_str("},\"children\":[");
    for (i, child) in node.children.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_explain_json(child, out);
    }
    out.push_str("]}");
}

fn write_json_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Plan a `SELECT` statement, returning both the physical plan and its
/// explain tree.
pub fn plan_select(select: &SelectStatement, catalog: &Catalog) -> Result<(PlanNode, ExplainNode)> {
    let where_conjuncts = select.where_clause.as_ref().map(collect_conjuncts).unwrap_or_default();

    let (mut plan, mut explain, consumed) = match &select.from {
        Some(from) => plan_from(from, &where_conjuncts, catalog)?,
        None => {
            let node = PlanNode::SingleRow;
            let ex = ExplainNode::leaf("SingleRow", vec![]);
            (node, ex, vec![])
        }
    };

    let leftover: Vec<Expr> = where_conjuncts
        .iter()
        .filter(|c| !consumed.iter().any(|u| u == *c))
        .cloned()
        .collect();
    if let Some(predicate) = conjoin(leftover) {
        let ex = ExplainNode::wrap(
            "Filter",
            vec![("predicate".into(), format!("{predicate:?}"))],
            explain,
        );
        plan = PlanNode::Filter { input: Box::new(plan), predicate: predicate.clone() };
        explain = ex;
    }

    let needs_group = !select.group_by.is_empty() || select_has_aggregate(select);
    if needs_group {
        let mut aggregates = Vec::new();
        for col in &select.columns {
            if let SelectColumn::Expr { expr, .. } = col {
                collect_aggregates(expr, &mut aggregates);
            }
        }
        if let Some(having) = &select.having {
            collect_aggregates(having, &mut aggregates);
        }
        for item in &select.order_by {
            collect_aggregates(&item.expr, &mut aggregates);
        }

        let ex = ExplainNode::wrap(
            "HashGroup",
            vec![
                ("group_by".into(), format!("{:?}", select.group_by)),
                ("aggregates".into(), format!("{aggregates:?}")),
            ],
            explain,
        );
        plan = PlanNode::HashGroup {
            input: Box::new(plan),
            group_by: select.group_by.clone(),
            aggregates,
            having: select.having.clone(),
        };
        explain = ex;
    }

    // Sort runs before the final projection so ORDER BY can reference base
    // columns (or, in a grouped query, group/aggregate slots) that the
    // projection may not carry through to its output.
    if !select.order_by.is_empty() {
        let ex = ExplainNode::wrap(
            "Sort",
            vec![("keys".into(), format!("{:?}", select.order_by))],
            explain,
        );
        plan = PlanNode::Sort { input: Box::new(plan), order_by: select.order_by.clone() };
        explain = ex;
    }

    let ex = ExplainNode::wrap("Project", vec![("columns".into(), format!("{:?}", select.columns))], explain);
    plan = PlanNode::Project { input: Box::new(plan), columns: select.columns.clone() };
    explain = ex;

    if select.distinct {
        let ex = ExplainNode::wrap("Distinct", vec![], explain);
        plan = PlanNode::Distinct { input: Box::new(plan) };
        explain = ex;
    }

    if select.limit.is_some() || select.offset.is_some() {
        let ex = ExplainNode::wrap(
            "Limit",
            vec![
                ("limit".into(), format!("{:?}", select.limit)),
                ("offset".into(), format!("{:?}", select.offset)),
            ],
            explain,
        );
        plan = PlanNode::Limit { input: Box::new(plan), limit: select.limit.clone(), offset: select.offset.clone() };
        explain = ex;
    }

    Ok((plan, explain))
}

/// Split a predicate on top-level `AND`s so push-down can consider each
/// conjunct independently. `OR` stops the split — its subtree is kept
/// whole.
fn collect_conjuncts(expr: &Expr) -> Vec<Expr> {
    match expr {
        Expr::BinaryOp { left, op: BinaryOp::And, right } => {
            let mut out = collect_conjuncts(left);
            out.extend(collect_conjuncts(right));
            out
        }
        other => vec![other.clone()],
    }
}

fn conjoin(mut exprs: Vec<Expr>) -> Option<Expr> {
    let mut acc = exprs.pop()?;
    while let Some(next) = exprs.pop() {
        acc = Expr::BinaryOp { left: Box::new(next), op: BinaryOp::And, right: Box::new(acc) };
    }
    Some(acc)
}

fn select_has_aggregate(select: &SelectStatement) -> bool {
    select.columns.iter().any(|c| matches!(c, SelectColumn::Expr { expr, .. } if expr_has_aggregate(expr)))
        || select.having.as_ref().is_some_and(expr_has_aggregate)
}

fn expr_has_aggregate(expr: &Expr) -> bool {
    match expr {
        Expr::Function { name, .. } => is_aggregate_name(name),
        Expr::BinaryOp { left, right, .. } => expr_has_aggregate(left) || expr_has_aggregate(right),
        Expr::UnaryOp { expr, .. } => expr_has_aggregate(expr),
        Expr::IsNull { expr, .. } => expr_has_aggregate(expr),
        Expr::Coalesce(a, b) => expr_has_aggregate(a) || expr_has_aggregate(b),
        _ => false,
    }
}

fn is_aggregate_name(name: &str) -> bool {
    matches!(name.to_ascii_uppercase().as_str(), "COUNT" | "SUM" | "AVG" | "MIN" | "MAX")
}

fn collect_aggregates(expr: &Expr, out: &mut Vec<AggregateCall>) {
    match expr {
        Expr::Function { name, args, star } if is_aggregate_name(name) => {
            let call = AggregateCall {
                func: name.to_ascii_uppercase(),
                arg: if *star { None } else { args.first().cloned() },
            };
            if !out.contains(&call) {
                out.push(call);
            }
        }
        Expr::BinaryOp { left, right, .. } => {
            collect_aggregates(left, out);
            collect_aggregates(right, out);
        }
        Expr::UnaryOp { expr, .. } => collect_aggregates(expr, out),
        Expr::IsNull { expr, .. } => collect_aggregates(expr, out),
        Expr::Coalesce(a, b) => {
            collect_aggregates(a, out);
            collect_aggregates(b, out);
        }
        _ => {}
    }
}

/// Rewrite `expr` to reference synthesized group/aggregate slots instead
/// of the original columns, so `Project` above a `HashGroup` can evaluate
/// against the group's flat `[group-keys ++ aggregate-results]` row.
pub fn rewrite_for_group(expr: &Expr, group_by: &[Expr], aggregates: &[AggregateCall]) -> Expr {
    if let Some(pos) = group_by.iter().position(|g| g == expr) {
        return Expr::Column { table: None, name: format!("__group_{pos}") };
    }
    if let Expr::Function { name, args, star } = expr {
        if is_aggregate_name(name) {
            let call = AggregateCall {
                func: name.to_ascii_uppercase(),
                arg: if *star { None } else { args.first().cloned() },
            };
            if let Some(pos) = aggregates.iter().position(|a| *a == call) {
                return Expr::Column { table: None, name: format!("__agg_{pos}") };
            }
        }
    }
    match expr {
        Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
            left: Box::new(rewrite_for_group(left, group_by, aggregates)),
            op: op.clone(),
            right: Box::new(rewrite_for_group(right, group_by, aggregates)),
        },
        Expr::UnaryOp { op, expr } => {
            Expr::UnaryOp { op: op.clone(), expr: Box::new(rewrite_for_group(expr, group_by, aggregates)) }
        }
        Expr::IsNull { expr, negated } => {
            Expr::IsNull { expr: Box::new(rewrite_for_group(expr, group_by, aggregates)), negated: *negated }
        }
        Expr::Coalesce(a, b) => Expr::Coalesce(
            Box::new(rewrite_for_group(a, group_by, aggregates)),
            Box::new(rewrite_for_group(b, group_by, aggregates)),
        ),
        other => other.clone(),
    }
}

fn plan_from(
    from: &FromClause,
    where_conjuncts: &[Expr],
    catalog: &Catalog,
) -> Result<(PlanNode, ExplainNode, Vec<Expr>)> {
    match from {
        FromClause::Table { name, alias } => {
            let table = catalog.table(name)?;
            let applicable: Vec<&Expr> = where_conjuncts
                .iter()
                .filter(|c| conjunct_refers_only_to(c, name, alias.as_deref()))
                .collect();
            let (node, explain, used) = choose_access_path(name, alias.clone(), table, catalog, &applicable);
            Ok((node, explain, used))
        }
        FromClause::Join { left, join_type, right, on } => {
            let (left_plan, left_explain, left_used) = plan_from(left, where_conjuncts, catalog)?;
            let (right_plan, right_explain, right_used) = plan_from(right, where_conjuncts, catalog)?;
            let mut used = left_used;
            used.extend(right_used);

            let explain = ExplainNode {
                name: format!("{:?}Join", join_type),
                details: vec![("on".into(), format!("{on:?}"))],
                children: vec![left_explain, right_explain],
            };
            let node = PlanNode::NestedLoopJoin {
                left: Box::new(left_plan),
                right: Box::new(right_plan),
                join_type: join_type.clone(),
                on: on.clone(),
            };
            Ok((node, explain, used))
        }
    }
}

/// Does `expr` reference only columns from the table bound to `alias`
/// (or `table_name` if unaliased)? Used to decide whether a WHERE
/// conjunct can be pushed down to this base table's access path.
fn conjunct_refers_only_to(expr: &Expr, table_name: &str, alias: Option<&str>) -> bool {
    let binding = alias.unwrap_or(table_name);
    match expr {
        Expr::Column { table, .. } => table.as_deref().map_or(true, |t| t.eq_ignore_ascii_case(binding)),
        Expr::Literal(_) => true,
        Expr::BinaryOp { left, right, .. } => {
            conjunct_refers_only_to(left, table_name, alias) && conjunct_refers_only_to(right, table_name, alias)
        }
        Expr::UnaryOp { expr, .. } => conjunct_refers_only_to(expr, table_name, alias),
        Expr::IsNull { expr, .. } => conjunct_refers_only_to(expr, table_name, alias),
        Expr::Coalesce(a, b) => {
            conjunct_refers_only_to(a, table_name, alias) && conjunct_refers_only_to(b, table_name, alias)
        }
        Expr::Function { args, .. } => args.iter().all(|a| conjunct_refers_only_to(a, table_name, alias)),
    }
}

/// Extract `(column_name, literal)` from an equality conjunct whose
/// column belongs to this table.
fn extract_equality(expr: &Expr) -> Option<(String, Expr)> {
    if let Expr::BinaryOp { left, op: BinaryOp::Eq, right } = expr {
        if let Expr::Column { name, .. } = left.as_ref() {
            if matches!(right.as_ref(), Expr::Literal(_)) {
                return Some((name.clone(), (**right).clone()));
            }
        }
        if let Expr::Column { name, .. } = right.as_ref() {
            if matches!(left.as_ref(), Expr::Literal(_)) {
                return Some((name.clone(), (**left).clone()));
            }
        }
    }
    None
}

/// Extract a `(column_name, operator, literal)` range bound.
fn extract_range(expr: &Expr) -> Option<(String, BinaryOp, Expr)> {
    if let Expr::BinaryOp { left, op, right } = expr {
        if !matches!(op, BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq) {
            return None;
        }
        if let Expr::Column { name, .. } = left.as_ref() {
            if matches!(right.as_ref(), Expr::Literal(_)) {
                return Some((name.clone(), op.clone(), (**right).clone()));
            }
        }
        if let Expr::Column { name, .. } = right.as_ref() {
            if matches!(left.as_ref(), Expr::Literal(_)) {
                let flipped = match op {
                    BinaryOp::Lt => BinaryOp::Gt,
                    BinaryOp::LtEq => BinaryOp::GtEq,
                    BinaryOp::Gt => BinaryOp::Lt,
                    BinaryOp::GtEq => BinaryOp::LtEq,
                    other => other.clone(),
                };
                return Some((name.clone(), flipped, (**left).clone()));
            }
        }
    }
    None
}

/// Rule order (spec.md §4.10): longest equality prefix wins an
/// `IndexSeek`; else a leading range conjunct on the first key column
/// gives `IndexRange`; else `SeqScan`. Ties broken by unique-first, then
/// alphabetic index name.
fn choose_access_path(
    table_name: &str,
    alias: Option<String>,
    _table: &Table,
    catalog: &Catalog,
    conjuncts: &[&Expr],
) -> (PlanNode, ExplainNode, Vec<Expr>) {
    let equalities: Vec<(String, Expr)> = conjuncts.iter().filter_map(|c| extract_equality(c)).collect();
    let ranges: Vec<(String, BinaryOp, Expr)> = conjuncts.iter().filter_map(|c| extract_range(c)).collect();

    let mut candidates: Vec<(&Index, usize)> = catalog
        .indexes_on(table_name)
        .map(|idx| {
            let prefix_len = idx
                .columns
                .iter()
                .take_while(|col| equalities.iter().any(|(n, _)| n.eq_ignore_ascii_case(col)))
                .count();
            (idx, prefix_len)
        })
        .filter(|(_, len)| *len > 0)
        .collect();

    candidates.sort_by(|(a_idx, a_len), (b_idx, b_len)| {
        b_len
            .cmp(a_len)
            .then(b_idx.unique.cmp(&a_idx.unique))
            .then(a_idx.name.to_ascii_lowercase().cmp(&b_idx.name.to_ascii_lowercase()))
    });

    if let Some((idx, prefix_len)) = candidates.first() {
        let key: Vec<Expr> = idx.columns[..*prefix_len]
            .iter()
            .map(|col| equalities.iter().find(|(n, _)| n.eq_ignore_ascii_case(col)).unwrap().1.clone())
            .collect();
        let used: Vec<Expr> = conjuncts
            .iter()
            .filter(|c| {
                extract_equality(c).is_some_and(|(n, _)| idx.columns[..*prefix_len].iter().any(|col| col.eq_ignore_ascii_case(&n)))
            })
            .map(|c| (*c).clone())
            .collect();

        let node = PlanNode::IndexSeek { table: table_name.to_string(), alias: alias.clone(), index: idx.name.clone(), key };
        let explain = ExplainNode::leaf(
            "IndexSeek",
            vec![("index".into(), idx.name.clone()), ("table".into(), table_name.to_string())],
        );
        return (node, explain, used);
    }

    if let Some(idx) = catalog.indexes_on(table_name).find(|idx| {
        idx.columns.first().is_some_and(|c| ranges.iter().any(|(n, _, _)| n.eq_ignore_ascii_case(c)))
    }) {
        let col = &idx.columns[0];
        let mut lower = None;
        let mut upper = None;
        for (name, op, value) in &ranges {
            if !name.eq_ignore_ascii_case(col) {
                continue;
            }
            match op {
                BinaryOp::Gt => lower = Some((value.clone(), false)),
                BinaryOp::GtEq => lower = Some((value.clone(), true)),
                BinaryOp::Lt => upper = Some((value.clone(), false)),
                BinaryOp::LtEq => upper = Some((value.clone(), true)),
                _ => {}
            }
        }
        let used: Vec<Expr> = conjuncts
            .iter()
            .filter(|c| extract_range(c).is_some_and(|(n, _, _)| n.eq_ignore_ascii_case(col)))
            .map(|c| (*c).clone())
            .collect();

        let node = PlanNode::IndexRange {
            table: table_name.to_string(),
            alias: alias.clone(),
            index: idx.name.clone(),
            lower,
            upper,
        };
        let explain = ExplainNode::leaf(
            "IndexRange",
            vec![("index".into(), idx.name.clone()), ("table".into(), table_name.to_string())],
        );
        return (node, explain, used);
    }

    let node = PlanNode::SeqScan { table: table_name.to_string(), alias };
    let explain = ExplainNode::leaf("SeqScan", vec![("table".into(), table_name.to_string())]);
    (node, explain, vec![])
}

/// Validate a `CREATE TABLE` against catalog invariants not already
/// enforced at parse time (duplicate table, missing PK column).
pub fn validate_create_table(stmt: &CreateTableStatement, catalog: &Catalog) -> Result<()> {
    if catalog.has_table(&stmt.name) {
        return Err(GraniteError::Definition(format!("table {} already exists", stmt.name)));
    }
    for pk_col in &stmt.primary_key {
        if !stmt.columns.iter().any(|c| c.name.eq_ignore_ascii_case(pk_col)) {
            return Err(GraniteError::Definition(format!(
                "primary key column {pk_col} is not defined on table {}",
                stmt.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Column, Index, Table};
    use crate::sql::parser::Parser;
    use crate::types::ColumnType;

    fn catalog_with_orders() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .create_table(Table {
                name: "orders".into(),
                columns: vec![
                    Column { name: "id".into(), column_type: ColumnType::Int32, nullable: false },
                    Column { name: "customer".into(), column_type: ColumnType::Varchar(20), nullable: false },
                    Column { name: "total".into(), column_type: ColumnType::Decimal(10, 2), nullable: false },
                ],
                primary_key: vec![0],
                foreign_keys: vec![],
                heap_root: 1,
                row_count: 0,
            })
            .unwrap();
        catalog
            .create_index(Index {
                name: "idx_customer".into(),
                table: "orders".into(),
                columns: vec!["customer".into()],
                unique: false,
                file_id: 0,
            })
            .unwrap();
        catalog
    }

    fn select(sql: &str) -> SelectStatement {
        let stmts = Parser::parse(sql).unwrap();
        match &stmts[0] {
            Statement::Select(s) => s.clone(),
            other => panic!("expected SELECT, got {other:?}"),
        }
    }

    #[test]
    fn equality_conjunct_chooses_index_seek() {
        let catalog = catalog_with_orders();
        let stmt = select("SELECT * FROM orders WHERE customer = 'acme'");
        let (plan, _) = plan_select(&stmt, &catalog).unwrap();
        let mut node = &plan;
        loop {
            match node {
                PlanNode::IndexSeek { index, .. } => {
                    assert_eq!(index, "idx_customer");
                    break;
                }
                PlanNode::Project { input, .. } | PlanNode::Filter { input, .. } => node = input,
                other => panic!("expected to find IndexSeek, hit {other:?}"),
            }
        }
    }

    #[test]
    fn no_matching_index_falls_back_to_seq_scan() {
        let catalog = catalog_with_orders();
        let stmt = select("SELECT * FROM orders WHERE total > 10");
        let (plan, _) = plan_select(&stmt, &catalog).unwrap();
        let mut node = &plan;
        loop {
            match node {
                PlanNode::SeqScan { .. } => break,
                PlanNode::Project { input, .. } | PlanNode::Filter { input, .. } => node = input,
                other => panic!("expected SeqScan, hit {other:?}"),
            }
        }
    }

    #[test]
    fn group_by_builds_hash_group_node() {
        let catalog = catalog_with_orders();
        let stmt = select("SELECT customer, COUNT(*) FROM orders GROUP BY customer");
        let (plan, _) = plan_select(&stmt, &catalog).unwrap();
        match plan {
            PlanNode::Project { input, .. } => assert!(matches!(*input, PlanNode::HashGroup { .. })),
            other => panic!("expected Project over HashGroup, got {other:?}"),
        }
    }

    #[test]
    fn explain_json_roundtrips_structure() {
        let node = ExplainNode::wrap("Project", vec![("columns".into(), "*".into())], ExplainNode::leaf("SeqScan", vec![("table".into(), "orders".into())]));
        let json = String::from_utf8(explain_json(&node)).unwrap();
        assert!(json.contains("\"name\":\"Project\""));
        assert!(json.contains("\"SeqScan\""));
    }

    #[test]
    fn rewrite_for_group_replaces_matching_subexpressions() {
        let group_by = vec![Expr::Column { table: None, name: "customer".into() }];
        let aggregates = vec![AggregateCall { func: "COUNT".into(), arg: None }];
        let expr = Expr::Function { name: "COUNT".into(), args: vec![], star: true };
        let rewritten = rewrite_for_group(&expr, &group_by, &aggregates);
        assert_eq!(rewritten, Expr::Column { table: None, name: "__agg_0".into() });
    }
}
