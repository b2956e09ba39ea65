//! Abstract syntax tree definitions for GraniteDB SQL.
//!
//! Every statement parsed by [`super::parser::Parser`] is represented as
//! a tree of the types defined here, consumed downstream by the planner
//! and executor.

/// A top-level SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    CreateTable(CreateTableStatement),
    DropTable(DropTableStatement),
    CreateIndex(CreateIndexStatement),
    DropIndex(DropIndexStatement),
}

/// A `SELECT` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub distinct: bool,
    pub columns: Vec<SelectColumn>,
    pub from: Option<FromClause>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
}

/// A single item in the SELECT column list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    /// An arbitrary expression, optionally aliased (`expr AS alias`).
    Expr { expr: Expr, alias: Option<String> },
    /// A bare `*`.
    AllColumns,
    /// A qualified `table.*`.
    TableAllColumns(String),
}

/// The `FROM` clause: a single table or a left-deep join tree. No
/// subqueries (the grammar doesn't support them).
#[derive(Debug, Clone, PartialEq)]
pub enum FromClause {
    Table {
        name: String,
        alias: Option<String>,
    },
    Join {
        left: Box<FromClause>,
        join_type: JoinType,
        right: Box<FromClause>,
        on: Option<Expr>,
    },
}

/// The flavour of a `JOIN`. Only inner and left-outer are parseable.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinType {
    Inner,
    Left,
}

/// A single item in an `ORDER BY` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: Expr,
    pub desc: bool,
}

/// An `INSERT` statement. Values are literals only.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Option<Vec<String>>,
    /// Multiple value rows: `VALUES (a, b), (c, d)`.
    pub values: Vec<Vec<Expr>>,
}

/// A `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyDef>,
}

/// A column definition inside `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub type_name: String,
    pub type_args: Vec<u32>,
    pub not_null: bool,
}

/// A `FOREIGN KEY` clause inside `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyDef {
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

/// A `DROP TABLE` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStatement {
    pub name: String,
}

/// A `CREATE INDEX` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStatement {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// A `DROP INDEX` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DropIndexStatement {
    pub name: String,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// An expression node in the AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(LiteralValue),
    Column {
        table: Option<String>,
        name: String,
    },
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    /// `COALESCE(a, b)` — always exactly two arguments per the grammar.
    Coalesce(Box<Expr>, Box<Expr>),
    /// A scalar or aggregate function call: `UPPER(x)`, `SUM(total)`,
    /// `COUNT(*)`.
    Function {
        name: String,
        args: Vec<Expr>,
        /// `true` for the bare `COUNT(*)` form.
        star: bool,
    },
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Integer(i64),
    Decimal(String),
    String(String),
    Boolean(bool),
    Null,
}

/// Binary operators.
#[derive(Debug, Clone, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

/// Unary operators.
#[derive(Debug, Clone, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_statement_default_fields() {
        let stmt = SelectStatement {
            distinct: false,
            columns: vec![SelectColumn::AllColumns],
            from: Some(FromClause::Table {
                name: "users".into(),
                alias: None,
            }),
            where_clause: None,
            group_by: vec![],
            having: None,
            order_by: vec![],
            limit: None,
            offset: None,
        };
        assert!(!stmt.distinct);
        assert_eq!(stmt.columns.len(), 1);
    }

    #[test]
    fn expr_binary_op_nesting() {
        // Represent: 1 + 2 * 3
        let expr = Expr::BinaryOp {
            left: Box::new(Expr::Literal(LiteralValue::Integer(1))),
            op: BinaryOp::Add,
            right: Box::new(Expr::BinaryOp {
                left: Box::new(Expr::Literal(LiteralValue::Integer(2))),
                op: BinaryOp::Mul,
                right: Box::new(Expr::Literal(LiteralValue::Integer(3))),
            }),
        };
        if let Expr::BinaryOp { op, .. } = &expr {
            assert_eq!(*op, BinaryOp::Add);
        } else {
            panic!("expected BinaryOp");
        }
    }

    #[test]
    fn column_def_with_type_args() {
        let col = ColumnDef {
            name: "balance".into(),
            type_name: "DECIMAL".into(),
            type_args: vec![10, 2],
            not_null: true,
        };
        assert!(col.not_null);
        assert_eq!(col.type_args, vec![10, 2]);
    }

    #[test]
    fn literal_value_variants() {
        let vals: Vec<LiteralValue> = vec![
            LiteralValue::Integer(42),
            LiteralValue::Decimal("3.14".into()),
            LiteralValue::String("hello".into()),
            LiteralValue::Boolean(true),
            LiteralValue::Null,
        ];
        assert_eq!(vals.len(), 5);
    }
}
