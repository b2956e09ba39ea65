//! Recursive-descent SQL parser for GraniteDB.
//!
//! The entry point is [`Parser::parse`], which tokenizes the input and
//! then parses one or more semicolon-separated statements into a
//! `Vec<Statement>`.

use crate::error::{GraniteError, Result};
use crate::sql::ast::*;
use crate::sql::lexer::{Lexer, Token};

/// A recursive-descent parser that transforms a token stream into an AST.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Parse a SQL string into a list of statements.
    pub fn parse(sql: &str) -> Result<Vec<Statement>> {
        let tokens = Lexer::new(sql).tokenize()?;
        let mut parser = Parser { tokens, pos: 0 };
        let mut stmts = Vec::new();
        loop {
            while parser.current() == &Token::Semicolon {
                parser.advance();
            }
            if parser.current() == &Token::Eof {
                break;
            }
            stmts.push(parser.parse_statement()?);
            if parser.current() == &Token::Semicolon {
                parser.advance();
            }
        }
        Ok(stmts)
    }

    // =======================================================================
    // Token helpers
    // =======================================================================

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn peek_ahead(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> &Token {
        let tok = self.tokens.get(self.pos).unwrap_or(&Token::Eof);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        if self.current() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {expected:?}, got {:?}", self.current())))
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.current().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            Token::Key => {
                self.advance();
                Ok("key".to_string())
            }
            _ => Err(self.error(format!("expected identifier, got {:?}", self.current()))),
        }
    }

    fn error(&self, msg: String) -> GraniteError {
        GraniteError::Planning(msg)
    }

    // =======================================================================
    // Statement dispatch
    // =======================================================================

    fn parse_statement(&mut self) -> Result<Statement> {
        match self.current() {
            Token::Select => self.parse_select_stmt(),
            Token::Insert => self.parse_insert(),
            Token::Create => self.parse_create(),
            Token::Drop => self.parse_drop(),
            _ => Err(self.error(format!(
                "unexpected token at start of statement: {:?}",
                self.current()
            ))),
        }
    }

    // =======================================================================
    // SELECT
    // =======================================================================

    fn parse_select_stmt(&mut self) -> Result<Statement> {
        Ok(Statement::Select(self.parse_select()?))
    }

    fn parse_select(&mut self) -> Result<SelectStatement> {
        self.expect(&Token::Select)?;

        let distinct = if self.current() == &Token::Distinct {
            self.advance();
            true
        } else {
            false
        };

        let columns = self.parse_select_columns()?;

        let from = if self.current() == &Token::From {
            self.advance();
            Some(self.parse_from_clause()?)
        } else {
            None
        };

        let where_clause = if self.current() == &Token::Where {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };

        let group_by = if self.current() == &Token::Group {
            self.advance();
            self.expect(&Token::By)?;
            self.parse_expr_list()?
        } else {
            vec![]
        };

        let having = if self.current() == &Token::Having {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };

        let order_by = if self.current() == &Token::Order {
            self.advance();
            self.expect(&Token::By)?;
            self.parse_order_by_list()?
        } else {
            vec![]
        };

        let limit = if self.current() == &Token::Limit {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };

        let offset = if self.current() == &Token::Offset {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(SelectStatement {
            distinct,
            columns,
            from,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    fn parse_select_columns(&mut self) -> Result<Vec<SelectColumn>> {
        let mut cols = vec![self.parse_select_column()?];
        while self.current() == &Token::Comma {
            self.advance();
            cols.push(self.parse_select_column()?);
        }
        Ok(cols)
    }

    fn parse_select_column(&mut self) -> Result<SelectColumn> {
        if self.current() == &Token::Star {
            self.advance();
            return Ok(SelectColumn::AllColumns);
        }

        if let Token::Identifier(name) = self.current().clone() {
            if self.peek_ahead(1) == &Token::Dot && self.peek_ahead(2) == &Token::Star {
                self.advance();
                self.advance();
                self.advance();
                return Ok(SelectColumn::TableAllColumns(name));
            }
        }

        let expr = self.parse_expr()?;
        let alias = self.parse_optional_alias()?;
        Ok(SelectColumn::Expr { expr, alias })
    }

    fn parse_optional_alias(&mut self) -> Result<Option<String>> {
        if self.current() == &Token::As {
            self.advance();
            let name = self.expect_identifier()?;
            Ok(Some(name))
        } else if let Token::Identifier(_) = self.current() {
            let name = self.expect_identifier()?;
            Ok(Some(name))
        } else {
            Ok(None)
        }
    }

    // =======================================================================
    // FROM clause + JOINs (left-deep, INNER/LEFT only, no subqueries)
    // =======================================================================

    fn parse_from_clause(&mut self) -> Result<FromClause> {
        let mut left = self.parse_from_item()?;

        loop {
            let join_type = match self.current() {
                Token::Join | Token::Inner => {
                    if self.current() == &Token::Inner {
                        self.advance();
                    }
                    self.expect(&Token::Join)?;
                    JoinType::Inner
                }
                Token::Left => {
                    self.advance();
                    if self.current() == &Token::Outer {
                        self.advance();
                    }
                    self.expect(&Token::Join)?;
                    JoinType::Left
                }
                _ => break,
            };

            let right = self.parse_from_item()?;

            let on = if self.current() == &Token::On {
                self.advance();
                Some(self.parse_expr()?)
            } else {
                None
            };

            left = FromClause::Join {
                left: Box::new(left),
                join_type,
                right: Box::new(right),
                on,
            };
        }

        Ok(left)
    }

    fn parse_from_item(&mut self) -> Result<FromClause> {
        let name = self.expect_identifier()?;
        let alias = self.parse_optional_table_alias()?;
        Ok(FromClause::Table { name, alias })
    }

    /// A table alias follows the same "AS name | bare name" rule as a
    /// projection alias, but must stop before a join keyword.
    fn parse_optional_table_alias(&mut self) -> Result<Option<String>> {
        if self.current() == &Token::As {
            self.advance();
            Ok(Some(self.expect_identifier()?))
        } else if let Token::Identifier(_) = self.current() {
            Ok(Some(self.expect_identifier()?))
        } else {
            Ok(None)
        }
    }

    // =======================================================================
    // INSERT
    // =======================================================================

    fn parse_insert(&mut self) -> Result<Statement> {
        self.expect(&Token::Insert)?;
        self.expect(&Token::Into)?;
        let table = self.expect_identifier()?;

        let columns = if self.current() == &Token::LeftParen {
            self.advance();
            let cols = self.parse_identifier_list()?;
            self.expect(&Token::RightParen)?;
            Some(cols)
        } else {
            None
        };

        self.expect(&Token::Values)?;
        let mut values = vec![self.parse_value_row()?];
        while self.current() == &Token::Comma {
            self.advance();
            values.push(self.parse_value_row()?);
        }

        Ok(Statement::Insert(InsertStatement { table, columns, values }))
    }

    fn parse_value_row(&mut self) -> Result<Vec<Expr>> {
        self.expect(&Token::LeftParen)?;
        let exprs = self.parse_expr_list()?;
        self.expect(&Token::RightParen)?;
        Ok(exprs)
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<String>> {
        let mut list = vec![self.expect_identifier()?];
        while self.current() == &Token::Comma {
            self.advance();
            list.push(self.expect_identifier()?);
        }
        Ok(list)
    }

    // =======================================================================
    // CREATE TABLE / INDEX
    // =======================================================================

    fn parse_create(&mut self) -> Result<Statement> {
        self.expect(&Token::Create)?;

        if self.current() == &Token::Unique {
            self.advance();
            return self.parse_create_index(true);
        }

        match self.current() {
            Token::Table => self.parse_create_table(),
            Token::Index => self.parse_create_index(false),
            _ => Err(self.error(format!(
                "expected TABLE or INDEX after CREATE, got {:?}",
                self.current()
            ))),
        }
    }

    fn parse_create_table(&mut self) -> Result<Statement> {
        self.expect(&Token::Table)?;
        let name = self.expect_identifier()?;

        self.expect(&Token::LeftParen)?;
        let mut columns = Vec::new();
        let mut primary_key = Vec::new();
        let mut foreign_keys = Vec::new();

        loop {
            match self.current() {
                Token::Primary => {
                    self.advance();
                    self.expect(&Token::Key)?;
                    self.expect(&Token::LeftParen)?;
                    primary_key = self.parse_identifier_list()?;
                    self.expect(&Token::RightParen)?;
                }
                Token::Foreign => {
                    self.advance();
                    self.expect(&Token::Key)?;
                    self.expect(&Token::LeftParen)?;
                    let columns = self.parse_identifier_list()?;
                    self.expect(&Token::RightParen)?;
                    self.expect(&Token::References)?;
                    let ref_table = self.expect_identifier()?;
                    self.expect(&Token::LeftParen)?;
                    let ref_columns = self.parse_identifier_list()?;
                    self.expect(&Token::RightParen)?;

                    let mut on_delete = None;
                    let mut on_update = None;
                    loop {
                        match self.current() {
                            Token::On if self.peek_ahead(1) == &Token::Delete => {
                                self.advance();
                                self.advance();
                                on_delete = Some(self.parse_referential_action()?);
                            }
                            Token::On if self.peek_ahead(1) == &Token::Update => {
                                self.advance();
                                self.advance();
                                on_update = Some(self.parse_referential_action()?);
                            }
                            _ => break,
                        }
                    }

                    foreign_keys.push(ForeignKeyDef {
                        columns,
                        ref_table,
                        ref_columns,
                        on_delete,
                        on_update,
                    });
                }
                _ => columns.push(self.parse_column_def()?),
            }

            if self.current() == &Token::Comma {
                self.advance();
                continue;
            }
            break;
        }
        self.expect(&Token::RightParen)?;

        Ok(Statement::CreateTable(CreateTableStatement {
            name,
            columns,
            primary_key,
            foreign_keys,
        }))
    }

    fn parse_referential_action(&mut self) -> Result<String> {
        match self.current() {
            Token::Cascade => {
                self.advance();
                Ok("CASCADE".to_string())
            }
            Token::Restrict => {
                self.advance();
                Ok("RESTRICT".to_string())
            }
            Token::Set => {
                self.advance();
                self.expect(&Token::Null)?;
                Ok("SET NULL".to_string())
            }
            _ => Err(self.error(format!(
                "expected CASCADE, RESTRICT or SET NULL, got {:?}",
                self.current()
            ))),
        }
    }

    fn parse_column_def(&mut self) -> Result<ColumnDef> {
        let name = self.expect_identifier()?;
        let (type_name, type_args) = self.parse_type_name()?;

        let mut not_null = false;
        loop {
            match self.current() {
                Token::Not => {
                    self.advance();
                    self.expect(&Token::Null)?;
                    not_null = true;
                }
                _ => break,
            }
        }

        Ok(ColumnDef { name, type_name, type_args, not_null })
    }

    fn parse_type_name(&mut self) -> Result<(String, Vec<u32>)> {
        let name = self.expect_identifier()?;
        let upper = name.to_ascii_uppercase();

        let mut args = Vec::new();
        if self.current() == &Token::LeftParen {
            self.advance();
            loop {
                match self.current().clone() {
                    Token::IntegerLiteral(n) => {
                        self.advance();
                        args.push(n as u32);
                    }
                    other => {
                        return Err(self.error(format!("expected integer in type args, got {other:?}")));
                    }
                }
                if self.current() == &Token::Comma {
                    self.advance();
                    continue;
                }
                break;
            }
            self.expect(&Token::RightParen)?;
        }

        Ok((upper, args))
    }

    fn parse_create_index(&mut self, unique: bool) -> Result<Statement> {
        self.expect(&Token::Index)?;
        let name = self.expect_identifier()?;
        self.expect(&Token::On)?;
        let table = self.expect_identifier()?;

        self.expect(&Token::LeftParen)?;
        let columns = self.parse_identifier_list()?;
        self.expect(&Token::RightParen)?;

        Ok(Statement::CreateIndex(CreateIndexStatement { name, table, columns, unique }))
    }

    // =======================================================================
    // DROP TABLE / INDEX
    // =======================================================================

    fn parse_drop(&mut self) -> Result<Statement> {
        self.expect(&Token::Drop)?;
        match self.current() {
            Token::Table => {
                self.advance();
                let name = self.expect_identifier()?;
                Ok(Statement::DropTable(DropTableStatement { name }))
            }
            Token::Index => {
                self.advance();
                let name = self.expect_identifier()?;
                Ok(Statement::DropIndex(DropIndexStatement { name }))
            }
            _ => Err(self.error(format!(
                "expected TABLE or INDEX after DROP, got {:?}",
                self.current()
            ))),
        }
    }

    // =======================================================================
    // ORDER BY list
    // =======================================================================

    fn parse_order_by_list(&mut self) -> Result<Vec<OrderByItem>> {
        let mut items = vec![self.parse_order_by_item()?];
        while self.current() == &Token::Comma {
            self.advance();
            items.push(self.parse_order_by_item()?);
        }
        Ok(items)
    }

    fn parse_order_by_item(&mut self) -> Result<OrderByItem> {
        let expr = self.parse_expr()?;
        let desc = if self.current() == &Token::Asc {
            self.advance();
            false
        } else if self.current() == &Token::Desc {
            self.advance();
            true
        } else {
            false
        };
        Ok(OrderByItem { expr, desc })
    }

    // =======================================================================
    // Expression parser (precedence climbing)
    // =======================================================================
    //
    // Precedence (lowest to highest):
    //   1. OR
    //   2. AND
    //   3. NOT (prefix)
    //   4. IS [NOT] NULL, comparison (=, <>, <, >, <=, >=)
    //   5. Addition (+, -)
    //   6. Multiplication (*, /, %)
    //   7. Unary (-)
    //   8. Primary (literals, columns, function calls, parens)

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or_expr()
    }

    fn parse_or_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_and_expr()?;
        while self.current() == &Token::Or {
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::Or, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_not_expr()?;
        while self.current() == &Token::And {
            self.advance();
            let right = self.parse_not_expr()?;
            left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::And, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr> {
        if self.current() == &Token::Not {
            self.advance();
            let expr = self.parse_not_expr()?;
            Ok(Expr::UnaryOp { op: UnaryOp::Not, expr: Box::new(expr) })
        } else {
            self.parse_comparison_expr()
        }
    }

    fn parse_comparison_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_add_expr()?;

        loop {
            match self.current() {
                Token::Is => {
                    self.advance();
                    let negated = if self.current() == &Token::Not {
                        self.advance();
                        true
                    } else {
                        false
                    };
                    self.expect(&Token::Null)?;
                    left = Expr::IsNull { expr: Box::new(left), negated };
                }
                Token::Eq => {
                    self.advance();
                    let right = self.parse_add_expr()?;
                    left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::Eq, right: Box::new(right) };
                }
                Token::NotEq => {
                    self.advance();
                    let right = self.parse_add_expr()?;
                    left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::NotEq, right: Box::new(right) };
                }
                Token::Lt => {
                    self.advance();
                    let right = self.parse_add_expr()?;
                    left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::Lt, right: Box::new(right) };
                }
                Token::Gt => {
                    self.advance();
                    let right = self.parse_add_expr()?;
                    left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::Gt, right: Box::new(right) };
                }
                Token::LtEq => {
                    self.advance();
                    let right = self.parse_add_expr()?;
                    left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::LtEq, right: Box::new(right) };
                }
                Token::GtEq => {
                    self.advance();
                    let right = self.parse_add_expr()?;
                    left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::GtEq, right: Box::new(right) };
                }
                _ => break,
            }
        }

        Ok(left)
    }

    fn parse_add_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_mul_expr()?;
        loop {
            match self.current() {
                Token::Plus => {
                    self.advance();
                    let right = self.parse_mul_expr()?;
                    left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::Add, right: Box::new(right) };
                }
                Token::Minus => {
                    self.advance();
                    let right = self.parse_mul_expr()?;
                    left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::Sub, right: Box::new(right) };
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_mul_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary_expr()?;
        loop {
            match self.current() {
                Token::Star => {
                    self.advance();
                    let right = self.parse_unary_expr()?;
                    left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::Mul, right: Box::new(right) };
                }
                Token::Slash => {
                    self.advance();
                    let right = self.parse_unary_expr()?;
                    left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::Div, right: Box::new(right) };
                }
                Token::Percent => {
                    self.advance();
                    let right = self.parse_unary_expr()?;
                    left = Expr::BinaryOp { left: Box::new(left), op: BinaryOp::Mod, right: Box::new(right) };
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr> {
        if self.current() == &Token::Minus {
            self.advance();
            let expr = self.parse_unary_expr()?;
            Ok(Expr::UnaryOp { op: UnaryOp::Neg, expr: Box::new(expr) })
        } else {
            self.parse_primary_expr()
        }
    }

    fn parse_primary_expr(&mut self) -> Result<Expr> {
        match self.current().clone() {
            Token::IntegerLiteral(n) => {
                self.advance();
                Ok(Expr::Literal(LiteralValue::Integer(n)))
            }
            Token::DecimalLiteral(s) => {
                self.advance();
                Ok(Expr::Literal(LiteralValue::Decimal(s)))
            }
            Token::StringLiteral(s) => {
                self.advance();
                Ok(Expr::Literal(LiteralValue::String(s)))
            }
            Token::True => {
                self.advance();
                Ok(Expr::Literal(LiteralValue::Boolean(true)))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Literal(LiteralValue::Boolean(false)))
            }
            Token::Null => {
                self.advance();
                Ok(Expr::Literal(LiteralValue::Null))
            }
            Token::Coalesce => {
                self.advance();
                self.expect(&Token::LeftParen)?;
                let a = self.parse_expr()?;
                self.expect(&Token::Comma)?;
                let b = self.parse_expr()?;
                self.expect(&Token::RightParen)?;
                Ok(Expr::Coalesce(Box::new(a), Box::new(b)))
            }
            Token::LeftParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }
            Token::Identifier(name) => {
                self.advance();

                // function call: NAME ( ... )
                if self.current() == &Token::LeftParen {
                    self.advance();
                    if self.current() == &Token::Star {
                        self.advance();
                        self.expect(&Token::RightParen)?;
                        return Ok(Expr::Function { name, args: vec![], star: true });
                    }
                    let args = if self.current() == &Token::RightParen {
                        vec![]
                    } else {
                        self.parse_expr_list()?
                    };
                    self.expect(&Token::RightParen)?;
                    return Ok(Expr::Function { name, args, star: false });
                }

                // qualified column: table.column
                if self.current() == &Token::Dot {
                    self.advance();
                    let column = self.expect_identifier()?;
                    return Ok(Expr::Column { table: Some(name), name: column });
                }

                Ok(Expr::Column { table: None, name })
            }
            other => Err(self.error(format!("unexpected token in expression: {other:?}"))),
        }
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>> {
        let mut exprs = vec![self.parse_expr()?];
        while self.current() == &Token::Comma {
            self.advance();
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_table_with_primary_key_and_not_null() {
        let stmts =
            Parser::parse("CREATE TABLE people(id INT NOT NULL, name VARCHAR(50), PRIMARY KEY(id))")
                .unwrap();
        match &stmts[0] {
            Statement::CreateTable(ct) => {
                assert_eq!(ct.name, "people");
                assert_eq!(ct.columns.len(), 2);
                assert_eq!(ct.primary_key, vec!["id".to_string()]);
                assert!(ct.columns[0].not_null);
                assert_eq!(ct.columns[1].type_args, vec![50]);
            }
            other => panic!("expected CreateTable, got {other:?}"),
        }
    }

    #[test]
    fn parses_foreign_key_with_actions() {
        let sql = "CREATE TABLE orders(id INT, customer_id INT, \
                   FOREIGN KEY(customer_id) REFERENCES customers(id) ON DELETE CASCADE ON UPDATE RESTRICT)";
        let stmts = Parser::parse(sql).unwrap();
        match &stmts[0] {
            Statement::CreateTable(ct) => {
                let fk = &ct.foreign_keys[0];
                assert_eq!(fk.ref_table, "customers");
                assert_eq!(fk.on_delete.as_deref(), Some("CASCADE"));
                assert_eq!(fk.on_update.as_deref(), Some("RESTRICT"));
            }
            other => panic!("expected CreateTable, got {other:?}"),
        }
    }

    #[test]
    fn parses_insert_with_explicit_columns() {
        let stmts = Parser::parse("INSERT INTO people(id, name) VALUES (1, 'Ada')").unwrap();
        match &stmts[0] {
            Statement::Insert(ins) => {
                assert_eq!(ins.table, "people");
                assert_eq!(ins.columns, Some(vec!["id".to_string(), "name".to_string()]));
                assert_eq!(ins.values.len(), 1);
            }
            other => panic!("expected Insert, got {other:?}"),
        }
    }

    #[test]
    fn parses_select_with_join_where_group_order_limit() {
        let sql = "SELECT c.id, SUM(o.total) AS s FROM customers c \
                   LEFT JOIN orders o ON c.id = o.customer_id \
                   WHERE c.id > 0 GROUP BY c.id HAVING SUM(o.total) IS NOT NULL \
                   ORDER BY s DESC LIMIT 10 OFFSET 5";
        let stmts = Parser::parse(sql).unwrap();
        match &stmts[0] {
            Statement::Select(sel) => {
                assert_eq!(sel.columns.len(), 2);
                assert!(sel.where_clause.is_some());
                assert_eq!(sel.group_by.len(), 1);
                assert!(sel.having.is_some());
                assert_eq!(sel.order_by.len(), 1);
                assert!(sel.order_by[0].desc);
                assert!(sel.limit.is_some());
                assert!(sel.offset.is_some());
                match sel.from.as_ref().unwrap() {
                    FromClause::Join { join_type, .. } => assert_eq!(*join_type, JoinType::Left),
                    other => panic!("expected Join, got {other:?}"),
                }
            }
            other => panic!("expected Select, got {other:?}"),
        }
    }

    #[test]
    fn parses_create_unique_index() {
        let stmts = Parser::parse("CREATE UNIQUE INDEX u_name ON people(name)").unwrap();
        match &stmts[0] {
            Statement::CreateIndex(ci) => {
                assert_eq!(ci.name, "u_name");
                assert_eq!(ci.table, "people");
                assert!(ci.unique);
                assert_eq!(ci.columns, vec!["name".to_string()]);
            }
            other => panic!("expected CreateIndex, got {other:?}"),
        }
    }

    #[test]
    fn parses_drop_table_and_index() {
        let stmts = Parser::parse("DROP TABLE people; DROP INDEX u_name").unwrap();
        assert!(matches!(stmts[0], Statement::DropTable(_)));
        assert!(matches!(stmts[1], Statement::DropIndex(_)));
    }

    #[test]
    fn three_valued_null_comparison_parses() {
        let stmts = Parser::parse("SELECT NULL = NULL").unwrap();
        match &stmts[0] {
            Statement::Select(sel) => match &sel.columns[0] {
                SelectColumn::Expr { expr, .. } => {
                    assert!(matches!(expr, Expr::BinaryOp { op: BinaryOp::Eq, .. }));
                }
                other => panic!("expected Expr column, got {other:?}"),
            },
            other => panic!("expected Select, got {other:?}"),
        }
    }

    #[test]
    fn expression_precedence_multiplication_over_addition() {
        let stmts = Parser::parse("SELECT 1 + 2 * 3").unwrap();
        match &stmts[0] {
            Statement::Select(sel) => match &sel.columns[0] {
                SelectColumn::Expr { expr, .. } => {
                    if let Expr::BinaryOp { op, right, .. } = expr {
                        assert_eq!(*op, BinaryOp::Add);
                        assert!(matches!(**right, Expr::BinaryOp { op: BinaryOp::Mul, .. }));
                    } else {
                        panic!("expected BinaryOp");
                    }
                }
                other => panic!("expected Expr column, got {other:?}"),
            },
            other => panic!("expected Select, got {other:?}"),
        }
    }

    #[test]
    fn unexpected_token_is_planning_error() {
        let result = Parser::parse("SELECT FROM");
        assert!(matches!(result, Err(GraniteError::Planning(_))));
    }
}
