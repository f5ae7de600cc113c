//! Aggregation queries over source tables
//!
//! The dataset accessor answers one shape of question: group the rows of a
//! table by a key and aggregate a numeric column per group. This is the
//! shape of the exploratory queries run before picking a transform, e.g.
//! average rental duration per day of week.
//!
//! ## Supported SQL
//!
//! ```sql
//! SELECT EXTRACT(DAYOFWEEK FROM start_date) AS dayofweek,
//!        AVG(duration) AS avg_duration
//! FROM cycle_hire
//! GROUP BY dayofweek
//! ```
//!
//! - exactly one group key: a column, or `EXTRACT(DAYOFWEEK|DOW|HOUR FROM col)`
//!   (optionally wrapped in `CAST(... AS STRING)`)
//! - exactly one aggregation: SUM, AVG, COUNT, MIN, MAX
//! - a single table, no JOINs, no WHERE
//! - no HAVING, DISTINCT, LIMIT/OFFSET/FETCH, FILTER or OVER
//! - ORDER BY only on the key, ascending
//!
//! Rows always come back in ascending key order.

mod executor;

pub use executor::{AggregateRows, QueryExecutor};

use serde::{Deserialize, Serialize};
use sqlparser::ast::{DuplicateTreatment, Expr, FunctionArguments, GroupByExpr, Query, SelectItem, SetExpr, Statement};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::fmt;

use crate::{Error, Result};

/// Supported aggregation functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunction {
    /// Sum of values
    Sum,
    /// Average of values
    Avg,
    /// Count of rows
    Count,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
}

/// Calendar part extracted from a timestamp column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatePart {
    /// Day of week, 1 = Sunday .. 7 = Saturday
    DayOfWeek,
    /// Hour of day, 0..=23
    Hour,
}

/// Grouping key of an aggregation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupKey {
    /// Group by the raw values of a column
    Column(String),
    /// Group by a calendar part of a timestamp column
    Extract {
        /// Part to extract
        part: DatePart,
        /// Timestamp column
        column: String,
    },
}

/// Declarative aggregation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSpec {
    /// Source table identifier
    pub table: String,
    /// Grouping key
    pub group_by: GroupKey,
    /// Aggregate function
    pub function: AggregateFunction,
    /// Aggregated column (`*` for COUNT(*))
    pub column: String,
}

impl AggregationSpec {
    /// Build a request
    #[must_use]
    pub fn new(
        table: impl Into<String>,
        group_by: GroupKey,
        function: AggregateFunction,
        column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            group_by,
            function,
            column: column.into(),
        }
    }
}

/// Value of a group key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GroupValue {
    /// Integer key (integer columns, extracted date parts)
    Int(i64),
    /// String key
    Text(String),
}

impl fmt::Display for GroupValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// One `{key, aggregate_value}` pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    /// Group key
    pub key: GroupValue,
    /// Aggregate over the group; `None` when SUM/AVG/MIN/MAX saw only nulls
    pub value: Option<f64>,
}

/// Read-only access to a tabular source
pub trait DataSource {
    /// Run an aggregation and stream its rows
    ///
    /// # Errors
    ///
    /// `SourceUnavailable` if the table cannot be reached, `InvalidField` if a
    /// referenced column does not exist or has an unusable type
    fn query(&self, spec: &AggregationSpec) -> Result<AggregateRows>;
}

/// Query parser
pub struct QueryEngine {
    dialect: GenericDialect,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryEngine {
    /// Create a new query engine
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dialect: GenericDialect {},
        }
    }

    /// Parse SQL into an aggregation request
    ///
    /// # Errors
    /// Returns `ParseError` if the SQL is invalid or outside the supported subset
    ///
    /// # Example
    /// ```
    /// use trueno_features::query::{AggregateFunction, DatePart, GroupKey, QueryEngine};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let spec = QueryEngine::new().parse(
    ///     "SELECT EXTRACT(HOUR FROM start_date) AS hour, AVG(duration) FROM trips GROUP BY hour",
    /// )?;
    /// assert_eq!(spec.table, "trips");
    /// assert_eq!(spec.function, AggregateFunction::Avg);
    /// assert_eq!(
    ///     spec.group_by,
    ///     GroupKey::Extract { part: DatePart::Hour, column: "start_date".to_string() }
    /// );
    /// # Ok(())
    /// # }
    /// ```
    pub fn parse(&self, sql: &str) -> Result<AggregationSpec> {
        let statements = Parser::parse_sql(&self.dialect, sql)
            .map_err(|e| Error::ParseError(format!("SQL parse error: {e}")))?;

        if statements.len() != 1 {
            return Err(Error::ParseError(
                "Only single statements supported".to_string(),
            ));
        }

        let Statement::Query(query) = &statements[0] else {
            return Err(Error::ParseError("Only SELECT queries supported".to_string()));
        };

        Self::parse_aggregation(query)
    }

    fn parse_aggregation(query: &Query) -> Result<AggregationSpec> {
        let SetExpr::Select(select) = query.body.as_ref() else {
            return Err(Error::ParseError("Only SELECT queries supported".to_string()));
        };

        let unsupported = [
            ("WHERE", select.selection.is_some()),
            ("HAVING", select.having.is_some()),
            ("QUALIFY", select.qualify.is_some()),
            ("DISTINCT", select.distinct.is_some()),
            ("TOP", select.top.is_some()),
            ("LIMIT", query.limit.is_some() || !query.limit_by.is_empty()),
            ("OFFSET", query.offset.is_some()),
            ("FETCH", query.fetch.is_some()),
        ];
        if let Some((clause, _)) = unsupported.iter().find(|(_, present)| *present) {
            return Err(Error::ParseError(format!("{clause} is not supported")));
        }

        let table = match select.from.as_slice() {
            [single] if single.joins.is_empty() => single.relation.to_string(),
            [_] => return Err(Error::ParseError("JOINs not supported".to_string())),
            [] => return Err(Error::ParseError("Missing FROM clause".to_string())),
            _ => return Err(Error::ParseError("Multiple tables not supported".to_string())),
        };

        let mut key: Option<(GroupKey, Option<String>, String)> = None;
        let mut aggregation: Option<(AggregateFunction, String)> = None;

        for item in &select.projection {
            let (expr, alias) = match item {
                SelectItem::UnnamedExpr(expr) => (expr, None),
                SelectItem::ExprWithAlias { expr, alias } => (expr, Some(alias.value.clone())),
                _ => return Err(Error::ParseError("Wildcards not supported".to_string())),
            };

            if let Some(agg) = Self::extract_aggregate(expr)? {
                if aggregation.replace(agg).is_some() {
                    return Err(Error::ParseError(
                        "Exactly one aggregation supported".to_string(),
                    ));
                }
            } else {
                let group_key = Self::extract_group_key(expr)?;
                if key.replace((group_key, alias, expr.to_string())).is_some() {
                    return Err(Error::ParseError("Exactly one group key supported".to_string()));
                }
            }
        }

        let (function, column) =
            aggregation.ok_or_else(|| Error::ParseError("Missing aggregation".to_string()))?;
        let (group_by, alias, key_sql) =
            key.ok_or_else(|| Error::ParseError("Missing group key".to_string()))?;

        let grouped = match &select.group_by {
            GroupByExpr::Expressions(exprs, _) => exprs.iter().map(ToString::to_string).collect(),
            GroupByExpr::All(_) => vec![key_sql.clone()],
        };
        let matches_key = |g: &String| {
            g == &key_sql || alias.as_ref().is_some_and(|a| g.eq_ignore_ascii_case(a))
        };
        if grouped.len() != 1 || !grouped.iter().all(matches_key) {
            return Err(Error::ParseError(format!(
                "GROUP BY must reference the selected key {key_sql}"
            )));
        }

        if let Some(order_by) = &query.order_by {
            let ascending_on_key = order_by.exprs.iter().all(|o| {
                o.asc != Some(false) && o.with_fill.is_none() && matches_key(&o.expr.to_string())
            });
            if !ascending_on_key || order_by.interpolate.is_some() {
                return Err(Error::ParseError(format!(
                    "ORDER BY supports only ascending order on the key {key_sql}"
                )));
            }
        }

        Ok(AggregationSpec {
            table,
            group_by,
            function,
            column,
        })
    }

    fn extract_group_key(expr: &Expr) -> Result<GroupKey> {
        match expr {
            Expr::Identifier(ident) => Ok(GroupKey::Column(ident.value.clone())),
            Expr::CompoundIdentifier(parts) => parts
                .last()
                .map(|ident| GroupKey::Column(ident.value.clone()))
                .ok_or_else(|| Error::ParseError("Empty identifier".to_string())),
            Expr::Nested(inner) | Expr::Cast { expr: inner, .. } => Self::extract_group_key(inner),
            Expr::Extract { field, expr, .. } => {
                let part = match field.to_string().to_uppercase().as_str() {
                    "DAYOFWEEK" | "DOW" => DatePart::DayOfWeek,
                    "HOUR" => DatePart::Hour,
                    other => {
                        return Err(Error::ParseError(format!(
                            "EXTRACT({other}) not supported"
                        )))
                    }
                };
                match Self::extract_group_key(expr)? {
                    GroupKey::Column(column) => Ok(GroupKey::Extract { part, column }),
                    GroupKey::Extract { .. } => {
                        Err(Error::ParseError("Nested EXTRACT not supported".to_string()))
                    }
                }
            }
            other => Err(Error::ParseError(format!("Unsupported group key: {other}"))),
        }
    }

    fn extract_aggregate(expr: &Expr) -> Result<Option<(AggregateFunction, String)>> {
        let Expr::Function(func) = expr else {
            return Ok(None);
        };
        let agg_func = match func.name.to_string().to_uppercase().as_str() {
            "SUM" => AggregateFunction::Sum,
            "AVG" => AggregateFunction::Avg,
            "COUNT" => AggregateFunction::Count,
            "MIN" => AggregateFunction::Min,
            "MAX" => AggregateFunction::Max,
            _ => return Ok(None),
        };

        if func.filter.is_some() || func.over.is_some() {
            return Err(Error::ParseError(format!(
                "FILTER/OVER on {} not supported",
                func.name
            )));
        }

        let col = match &func.args {
            FunctionArguments::List(list) => {
                if matches!(list.duplicate_treatment, Some(DuplicateTreatment::Distinct)) {
                    return Err(Error::ParseError(format!(
                        "{}(DISTINCT ...) not supported",
                        func.name
                    )));
                }
                list.args
                    .first()
                    .map_or_else(|| "*".to_string(), ToString::to_string)
            }
            _ => "*".to_string(),
        };
        Ok(Some((agg_func, col)))
    }
}
