//! In-memory executor for tests and local development
//!
//! Holds tables of upstream rows and answers the query shapes the query
//! builder emits. Text is parsed with the T-SQL dialect of `sqlparser` and
//! the resulting `Select` is evaluated over the seeded rows:
//!
//! ```text
//! SELECT TOP n COL, ... FROM TABLE [WHERE ...] [ORDER BY COL [ASC|DESC]]
//! SELECT COUNT(*) AS ALIAS FROM TABLE [WHERE ...]
//! ```
//!
//! `WHERE` supports `=`, `>=`, `<=`, `LIKE`, `BETWEEN ... AND ...`, `AND`,
//! `OR` and parentheses. Anything else fails the way the upstream would, with
//! a query error. String comparison is case-insensitive and ignores trailing
//! spaces. Every call is recorded with the token it ran under.

use crate::core::credential::CredentialContext;
use crate::core::error::{GatewayError, GatewayResult, UpstreamError};
use crate::query::QueryText;
use crate::upstream::{QueryExecutor, UpstreamRow};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use sqlparser::ast::{
    BinaryOperator, Expr, Function, FunctionArg, FunctionArgExpr, FunctionArguments, ObjectName,
    ObjectNamePart, OrderByKind, SelectItem, SetExpr, Statement, TableFactor, Top, TopQuantity,
    UnaryOperator, Value as SqlValue,
};
use sqlparser::dialect::MsSqlDialect;
use sqlparser::parser::Parser;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// One executed query, as seen by the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub query: String,
    pub token: String,
}

/// Executor over in-memory tables
#[derive(Clone, Default)]
pub struct InMemoryExecutor {
    tables: Arc<RwLock<HashMap<String, Vec<UpstreamRow>>>>,
    calls: Arc<RwLock<Vec<RecordedCall>>>,
}

impl InMemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table (builder style)
    pub fn with_table(self, table: &str, rows: Vec<UpstreamRow>) -> Self {
        if let Ok(mut tables) = self.tables.write() {
            tables.insert(table.to_ascii_uppercase(), rows);
        }
        self
    }

    /// Append rows to a table, creating it if needed
    pub fn insert_rows(&self, table: &str, rows: Vec<UpstreamRow>) -> GatewayResult<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| GatewayError::Internal(format!("Failed to acquire write lock: {}", e)))?;
        tables
            .entry(table.to_ascii_uppercase())
            .or_default()
            .extend(rows);
        Ok(())
    }

    /// Calls made so far, oldest first
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().map(|c| c.len()).unwrap_or_default()
    }

    fn run(&self, query: &str) -> GatewayResult<Vec<UpstreamRow>> {
        let statement = SelectStatement::parse(query)?;

        let tables = self
            .tables
            .read()
            .map_err(|e| GatewayError::Internal(format!("Failed to acquire read lock: {}", e)))?;
        let rows = tables.get(&statement.table).ok_or_else(|| {
            UpstreamError::query_failed(None, &format!("Invalid object name '{}'", statement.table))
        })?;

        let mut matched: Vec<&UpstreamRow> = rows
            .iter()
            .filter(|row| statement.filter.as_ref().is_none_or(|f| f.matches(row)))
            .collect();

        match statement.projection {
            Projection::Count { alias } => {
                let mut row = UpstreamRow::new();
                row.insert(alias, Value::from(matched.len()));
                Ok(vec![row])
            }
            Projection::Columns { top, columns } => {
                if let Some((column, descending)) = &statement.order_by {
                    matched.sort_by(|a, b| {
                        let ordering = compare_cells(a.get(column), b.get(column));
                        if *descending { ordering.reverse() } else { ordering }
                    });
                }
                Ok(matched
                    .into_iter()
                    .take(top)
                    .map(|row| {
                        columns
                            .iter()
                            .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                            .collect()
                    })
                    .collect())
            }
        }
    }
}

#[async_trait]
impl QueryExecutor for InMemoryExecutor {
    async fn execute(
        &self,
        query: &QueryText,
        credential: &CredentialContext,
    ) -> GatewayResult<Vec<UpstreamRow>> {
        {
            let mut calls = self.calls.write().map_err(|e| {
                GatewayError::Internal(format!("Failed to acquire write lock: {}", e))
            })?;
            calls.push(RecordedCall {
                query: query.as_str().to_string(),
                token: credential.token().to_string(),
            });
        }
        self.run(query.as_str())
    }
}

// =============================================================================
// Statement shape
// =============================================================================

fn query_failed(message: impl fmt::Display) -> GatewayError {
    UpstreamError::query_failed(None, &message.to_string()).into()
}

fn unsupported(what: impl fmt::Display) -> GatewayError {
    query_failed(format!("Unsupported {} in in-memory query", what))
}

enum Projection {
    Count { alias: String },
    Columns { top: usize, columns: Vec<String> },
}

struct SelectStatement {
    projection: Projection,
    table: String,
    filter: Option<Condition>,
    order_by: Option<(String, bool)>,
}

impl SelectStatement {
    fn parse(text: &str) -> GatewayResult<Self> {
        let statements = Parser::parse_sql(&MsSqlDialect {}, text).map_err(query_failed)?;
        let [Statement::Query(query)] = statements.as_slice() else {
            return Err(unsupported("statement"));
        };
        let SetExpr::Select(select) = query.body.as_ref() else {
            return Err(unsupported("query body"));
        };

        let [from] = select.from.as_slice() else {
            return Err(unsupported("FROM clause"));
        };
        if !from.joins.is_empty() {
            return Err(unsupported("JOIN"));
        }
        let TableFactor::Table { name, .. } = &from.relation else {
            return Err(unsupported("table reference"));
        };

        let projection = match select.projection.as_slice() {
            [SelectItem::ExprWithAlias {
                expr: Expr::Function(function),
                alias,
            }] if is_count_star(function) => Projection::Count {
                alias: alias.value.to_ascii_uppercase(),
            },
            items => {
                let top = select
                    .top
                    .as_ref()
                    .ok_or_else(|| unsupported("SELECT without TOP"))?;
                let columns = items
                    .iter()
                    .map(|item| match item {
                        SelectItem::UnnamedExpr(expr) => column_name(expr),
                        other => Err(unsupported(format!("select item {}", other))),
                    })
                    .collect::<GatewayResult<Vec<_>>>()?;
                Projection::Columns {
                    top: top_quantity(top)?,
                    columns,
                }
            }
        };

        let order_by = match &query.order_by {
            None => None,
            Some(order_by) => match &order_by.kind {
                OrderByKind::Expressions(exprs) => match exprs.as_slice() {
                    [single] => Some((column_name(&single.expr)?, single.options.asc == Some(false))),
                    _ => return Err(unsupported("ORDER BY list")),
                },
                _ => return Err(unsupported("ORDER BY ALL")),
            },
        };

        Ok(Self {
            projection,
            table: object_name(name)?,
            filter: select.selection.as_ref().map(Condition::from_expr).transpose()?,
            order_by,
        })
    }
}

fn object_name(name: &ObjectName) -> GatewayResult<String> {
    name.0
        .last()
        .and_then(ObjectNamePart::as_ident)
        .map(|ident| ident.value.to_ascii_uppercase())
        .ok_or_else(|| unsupported(format!("object name {}", name)))
}

fn column_name(expr: &Expr) -> GatewayResult<String> {
    match expr {
        Expr::Identifier(ident) => Ok(ident.value.to_ascii_uppercase()),
        Expr::CompoundIdentifier(idents) => idents
            .last()
            .map(|ident| ident.value.to_ascii_uppercase())
            .ok_or_else(|| unsupported("empty identifier")),
        other => Err(unsupported(format!("column expression {}", other))),
    }
}

fn is_count_star(function: &Function) -> bool {
    function.name.to_string().eq_ignore_ascii_case("COUNT")
        && matches!(
            &function.args,
            FunctionArguments::List(list)
                if matches!(list.args.as_slice(), [FunctionArg::Unnamed(FunctionArgExpr::Wildcard)])
        )
}

fn top_quantity(top: &Top) -> GatewayResult<usize> {
    if top.percent || top.with_ties {
        return Err(unsupported("TOP modifier"));
    }
    match &top.quantity {
        Some(TopQuantity::Constant(n)) => {
            usize::try_from(*n).map_err(|_| unsupported(format!("TOP {}", n)))
        }
        Some(TopQuantity::Expr(Expr::Value(v))) => match &v.value {
            SqlValue::Number(n, _) => n.parse().map_err(|_| unsupported(format!("TOP {}", n))),
            other => Err(unsupported(format!("TOP {}", other))),
        },
        _ => Err(unsupported("TOP quantity")),
    }
}

// =============================================================================
// Conditions
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Comparison {
    Eq,
    Gte,
    Lte,
}

#[derive(Debug, Clone)]
enum Operand {
    Text(String),
    Number(f64),
}

#[derive(Debug)]
enum Condition {
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Compare {
        column: String,
        op: Comparison,
        operand: Operand,
    },
    Between {
        column: String,
        from: Operand,
        to: Operand,
    },
    Like {
        column: String,
        pattern: Regex,
    },
}

impl Condition {
    fn from_expr(expr: &Expr) -> GatewayResult<Self> {
        match expr {
            Expr::Nested(inner) => Self::from_expr(inner),
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And,
                right,
            } => Ok(Condition::And(
                Box::new(Self::from_expr(left)?),
                Box::new(Self::from_expr(right)?),
            )),
            Expr::BinaryOp {
                left,
                op: BinaryOperator::Or,
                right,
            } => Ok(Condition::Or(
                Box::new(Self::from_expr(left)?),
                Box::new(Self::from_expr(right)?),
            )),
            Expr::BinaryOp { left, op, right } => {
                let op = match op {
                    BinaryOperator::Eq => Comparison::Eq,
                    BinaryOperator::GtEq => Comparison::Gte,
                    BinaryOperator::LtEq => Comparison::Lte,
                    other => return Err(unsupported(format!("operator {}", other))),
                };
                Ok(Condition::Compare {
                    column: column_name(left)?,
                    op,
                    operand: operand(right)?,
                })
            }
            Expr::Like {
                negated: false,
                expr,
                pattern,
                ..
            } => match operand(pattern)? {
                Operand::Text(pattern) => Ok(Condition::Like {
                    column: column_name(expr)?,
                    pattern: like_regex(&pattern),
                }),
                Operand::Number(_) => Err(unsupported("numeric LIKE pattern")),
            },
            Expr::Between {
                expr,
                negated: false,
                low,
                high,
            } => Ok(Condition::Between {
                column: column_name(expr)?,
                from: operand(low)?,
                to: operand(high)?,
            }),
            other => Err(query_failed(format!(
                "An expression of non-boolean type specified in a context where a condition is expected, near '{}'",
                other
            ))),
        }
    }

    fn matches(&self, row: &UpstreamRow) -> bool {
        match self {
            Condition::And(left, right) => left.matches(row) && right.matches(row),
            Condition::Or(left, right) => left.matches(row) || right.matches(row),
            Condition::Compare {
                column,
                op,
                operand,
            } => match compare_operand(row.get(column), operand) {
                Some(ordering) => match op {
                    Comparison::Eq => ordering == Ordering::Equal,
                    Comparison::Gte => ordering != Ordering::Less,
                    Comparison::Lte => ordering != Ordering::Greater,
                },
                None => false,
            },
            Condition::Between { column, from, to } => {
                let cell = row.get(column);
                matches!(
                    compare_operand(cell, from),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(
                    compare_operand(cell, to),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }
            Condition::Like { column, pattern } => row
                .get(column)
                .and_then(cell_text)
                .is_some_and(|text| pattern.is_match(&text)),
        }
    }
}

fn operand(expr: &Expr) -> GatewayResult<Operand> {
    match expr {
        Expr::Value(v) => match &v.value {
            SqlValue::SingleQuotedString(s) | SqlValue::NationalStringLiteral(s) => {
                Ok(Operand::Text(s.clone()))
            }
            SqlValue::Number(n, _) => n
                .parse()
                .map(Operand::Number)
                .map_err(|_| query_failed(format!("Invalid numeric literal '{}'", n))),
            other => Err(unsupported(format!("literal {}", other))),
        },
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match operand(expr)? {
            Operand::Number(n) => Ok(Operand::Number(-n)),
            Operand::Text(_) => Err(unsupported("negated string")),
        },
        other => Err(unsupported(format!("operand {}", other))),
    }
}

fn like_regex(pattern: &str) -> Regex {
    let mut regex = String::from("(?is)^");
    for c in pattern.chars() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');
    // Every non-wildcard character is escaped above.
    Regex::new(&regex).unwrap_or_else(|_| Regex::new("$^").expect("empty regex"))
}

// =============================================================================
// Cell comparison
// =============================================================================

fn cell_text(cell: &Value) -> Option<String> {
    match cell {
        Value::Null => None,
        Value::String(s) => Some(s.trim_end().to_string()),
        Value::Bool(b) => Some(if *b { "S" } else { "N" }.to_string()),
        other => Some(other.to_string()),
    }
}

fn cell_number(cell: &Value) -> Option<f64> {
    match cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `None` when the cell is `NULL` or cannot be compared (SQL unknown)
fn compare_operand(cell: Option<&Value>, operand: &Operand) -> Option<Ordering> {
    let cell = cell?;
    match operand {
        Operand::Number(n) => cell_number(cell)?.partial_cmp(n),
        Operand::Text(t) => {
            let text = cell_text(cell)?;
            Some(
                text.to_lowercase()
                    .cmp(&t.trim_end().to_lowercase()),
            )
        }
    }
}

/// `ORDER BY` comparison; `NULL` sorts first
fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(_), Value::Number(_)) => cell_number(a)
                .partial_cmp(&cell_number(b))
                .unwrap_or(Ordering::Equal),
            _ => cell_text(a)
                .unwrap_or_default()
                .to_lowercase()
                .cmp(&cell_text(b).unwrap_or_default().to_lowercase()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<UpstreamRow> {
        [
            json!({ "ID": 1, "NAME": "O'Brien", "STATUS": "E", "DT": "2024-01-10" }),
            json!({ "ID": 2, "NAME": "Smith   ", "STATUS": "F", "DT": "2024-02-10" }),
            json!({ "ID": 3, "NAME": "obrien", "STATUS": "E", "DT": null }),
        ]
        .into_iter()
        .map(|v| serde_json::from_value(v).unwrap())
        .collect()
    }

    fn executor() -> InMemoryExecutor {
        InMemoryExecutor::new().with_table("PEOPLE", rows())
    }

    async fn run(query: &str) -> GatewayResult<Vec<UpstreamRow>> {
        let credential = CredentialContext::new("token").unwrap();
        executor()
            .execute(&QueryText::new(query).unwrap(), &credential)
            .await
    }

    fn ids(rows: &[UpstreamRow]) -> Vec<i64> {
        rows.iter().map(|r| r["ID"].as_i64().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_top_and_order() {
        let rows = run("SELECT TOP 2 ID, NAME FROM PEOPLE ORDER BY ID DESC")
            .await
            .unwrap();
        assert_eq!(ids(&rows), vec![3, 2]);
        assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["ID", "NAME"]);
    }

    #[tokio::test]
    async fn test_where_clauses() {
        let rows = run("SELECT TOP 10 ID FROM PEOPLE WHERE STATUS = 'e' ORDER BY ID ASC")
            .await
            .unwrap();
        assert_eq!(ids(&rows), vec![1, 3]);

        let rows = run("SELECT TOP 10 ID FROM PEOPLE WHERE NAME = 'O''Brien' ORDER BY ID")
            .await
            .unwrap();
        assert_eq!(ids(&rows), vec![1]);

        let rows = run(
            "SELECT TOP 10 ID FROM PEOPLE WHERE DT BETWEEN '2024-01-01' AND '2024-01-31' ORDER BY ID",
        )
        .await
        .unwrap();
        assert_eq!(ids(&rows), vec![1]);

        let rows = run(
            "SELECT TOP 10 ID FROM PEOPLE WHERE (NAME LIKE '%brien%' OR STATUS LIKE '%F%') AND ID >= 2 ORDER BY ID",
        )
        .await
        .unwrap();
        assert_eq!(ids(&rows), vec![2, 3]);

        let rows = run("SELECT TOP 10 ID FROM PEOPLE WHERE NAME = 'Smith' ORDER BY ID")
            .await
            .unwrap();
        assert_eq!(ids(&rows), vec![2]);
    }

    #[tokio::test]
    async fn test_count() {
        let rows = run("SELECT COUNT(*) AS TOTAL FROM PEOPLE WHERE STATUS = 'E'")
            .await
            .unwrap();
        assert_eq!(rows[0]["TOTAL"], json!(2));
    }

    #[tokio::test]
    async fn test_unknown_table_and_bad_syntax() {
        let err = run("SELECT TOP 1 ID FROM NOWHERE").await.unwrap_err();
        assert_eq!(err.error_code(), "UPSTREAM_QUERY_FAILED");

        let err = run("SELECT TOP 1 ID FROM PEOPLE WHERE ID").await.unwrap_err();
        assert_eq!(err.error_code(), "UPSTREAM_QUERY_FAILED");

        let err = run("SELECT TOP 1 ID FROM PEOPLE WHERE ID <> 1").await.unwrap_err();
        assert_eq!(err.error_code(), "UPSTREAM_QUERY_FAILED");

        let err = run("SELECT ID FROM PEOPLE").await.unwrap_err();
        assert_eq!(err.error_code(), "UPSTREAM_QUERY_FAILED");
    }

    #[tokio::test]
    async fn test_parenthesised_top_and_negative_numbers() {
        let rows = run("SELECT TOP (1) ID FROM PEOPLE WHERE ID >= -1 ORDER BY ID DESC")
            .await
            .unwrap();
        assert_eq!(ids(&rows), vec![3]);
    }

    #[tokio::test]
    async fn test_calls_are_recorded_with_their_token() {
        let executor = executor();
        let credential = CredentialContext::new("user-a-token").unwrap();
        let query = QueryText::new("SELECT TOP 1 ID FROM PEOPLE").unwrap();
        executor.execute(&query, &credential).await.unwrap();

        assert_eq!(
            executor.calls(),
            vec![RecordedCall {
                query: query.as_str().to_string(),
                token: "user-a-token".to_string(),
            }]
        );
    }
}
