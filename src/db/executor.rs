//! Query execution using sqlx

use super::Row;
use crate::error::{AgentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgConnection, Postgres};
use sqlx::query::Query;
use sqlx::types::{Json, Uuid};
use sqlx::{Connection, Executor, Row as _, Statement, TypeInfo};
use std::time::Duration;
use tracing::{debug, warn};

/// Runs a read-only statement with positional arguments.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn fetch_rows(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>>;
}

/// PostgreSQL executor. Opens one connection per call and closes it on both
/// the success and the failure path.
pub struct PgExecutor {
    database_url: String,
    statement_timeout: Option<Duration>,
}

impl PgExecutor {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            statement_timeout: None,
        }
    }

    pub fn with_statement_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.statement_timeout = timeout;
        self
    }

    async fn run(&self, conn: &mut PgConnection, sql: &str, args: &[Value]) -> Result<Vec<Row>> {
        if let Some(timeout) = self.statement_timeout {
            sqlx::query(&format!("SET statement_timeout = {}", timeout.as_millis()))
                .execute(&mut *conn)
                .await?;
        }

        let wrapped = wrap_as_json(sql);
        debug!("Wrapped SQL: {}", wrapped);

        // Let the server infer placeholder types, then bind each argument as
        // that type. The cache is dropped so execution re-prepares with the
        // bound types.
        let param_types: Vec<String> = {
            let statement = (&mut *conn).prepare(&wrapped).await?;
            statement
                .parameters()
                .and_then(|params| params.left())
                .map(|types| types.iter().map(|t| t.name().to_string()).collect())
                .unwrap_or_default()
        };
        conn.clear_cached_statements().await?;
        debug!("Parameter types: {:?}", param_types);

        let mut query = sqlx::query(&wrapped);
        for (idx, value) in args.iter().enumerate() {
            let param = PgParam::coerce(value, param_types.get(idx).map(String::as_str))
                .map_err(|e| AgentError::Argument(format!("${}: {}", idx + 1, e)))?;
            query = param.bind(query);
        }

        let rows = query.fetch_all(&mut *conn).await?;
        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let text: String = row.try_get(0)?;
            result.push(serde_json::from_str::<Row>(&text)?);
        }
        Ok(result)
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn fetch_rows(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>> {
        let mut conn = PgConnection::connect(&self.database_url).await?;
        let result = self.run(&mut conn, sql, args).await;
        if let Err(e) = conn.close().await {
            warn!("Failed to close database connection: {}", e);
        }
        result
    }
}

/// Let Postgres render every row as JSON so uuid, numeric and timestamp
/// columns come back serialisable without per-type decoding.
pub fn wrap_as_json(sql: &str) -> String {
    let body = sql.trim().trim_end_matches(';').trim_end();
    format!("SELECT row_to_json(q)::text FROM (\n{}\n) AS q", body)
}

/// An argument converted to the Rust type matching its placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum PgParam {
    Bool(Option<bool>),
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
    Uuid(Option<Uuid>),
    Timestamp(Option<NaiveDateTime>),
    TimestampTz(Option<DateTime<Utc>>),
    Date(Option<NaiveDate>),
    Time(Option<NaiveTime>),
    Json(Option<Value>),
}

impl PgParam {
    /// Convert a JSON argument for a placeholder of the given Postgres type
    /// name (`UUID`, `TIMESTAMP`, ...). Unknown types keep the JSON shape.
    pub fn coerce(value: &Value, pg_type: Option<&str>) -> std::result::Result<Self, String> {
        let Some(pg_type) = pg_type else {
            return Ok(Self::untyped(value));
        };
        let null = value.is_null();
        let mismatch = || format!("cannot use {} as {}", value, pg_type);
        let text = value.as_str().map(str::trim);

        let param = match pg_type {
            "BOOL" => PgParam::Bool(if null {
                None
            } else {
                Some(value_bool(value).ok_or_else(mismatch)?)
            }),
            "INT2" | "INT4" | "INT8" | "OID" => PgParam::Int(if null {
                None
            } else {
                let parsed = value.as_i64().or_else(|| text.and_then(|s| s.parse().ok()));
                Some(parsed.ok_or_else(mismatch)?)
            }),
            "FLOAT4" | "FLOAT8" | "NUMERIC" => PgParam::Float(if null {
                None
            } else {
                let parsed = value.as_f64().or_else(|| text.and_then(|s| s.parse().ok()));
                Some(parsed.ok_or_else(mismatch)?)
            }),
            "UUID" => PgParam::Uuid(if null {
                None
            } else {
                Some(text.and_then(|s| Uuid::parse_str(s).ok()).ok_or_else(mismatch)?)
            }),
            "TIMESTAMP" => PgParam::Timestamp(if null {
                None
            } else {
                Some(text.and_then(parse_naive_datetime).ok_or_else(mismatch)?)
            }),
            "TIMESTAMPTZ" => PgParam::TimestampTz(if null {
                None
            } else {
                Some(text.and_then(parse_utc_datetime).ok_or_else(mismatch)?)
            }),
            "DATE" => PgParam::Date(if null {
                None
            } else {
                let parsed = text.and_then(|s| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .or_else(|| parse_naive_datetime(s).map(|dt| dt.date()))
                });
                Some(parsed.ok_or_else(mismatch)?)
            }),
            "TIME" => PgParam::Time(if null {
                None
            } else {
                let parsed = text.and_then(|s| {
                    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                        .ok()
                });
                Some(parsed.ok_or_else(mismatch)?)
            }),
            "JSON" | "JSONB" => PgParam::Json(if null { None } else { Some(value.clone()) }),
            _ => Self::untyped(value),
        };
        Ok(param)
    }

    fn untyped(value: &Value) -> Self {
        match value {
            Value::Null => PgParam::Text(None),
            Value::Bool(b) => PgParam::Bool(Some(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PgParam::Int(Some(i)),
                None => PgParam::Float(n.as_f64()),
            },
            Value::String(s) => PgParam::Text(Some(s.clone())),
            other => PgParam::Text(Some(other.to_string())),
        }
    }

    fn bind<'q>(self, query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments> {
        match self {
            PgParam::Bool(v) => query.bind(v),
            PgParam::Int(v) => query.bind(v),
            PgParam::Float(v) => query.bind(v),
            PgParam::Text(v) => query.bind(v),
            PgParam::Uuid(v) => query.bind(v),
            PgParam::Timestamp(v) => query.bind(v),
            PgParam::TimestampTz(v) => query.bind(v),
            PgParam::Date(v) => query.bind(v),
            PgParam::Time(v) => query.bind(v),
            PgParam::Json(v) => query.bind(v.map(Json)),
        }
    }
}

fn value_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Some(true),
            "false" | "f" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// `2024-01-01`, `2024-01-01 10:00:00[.fff]` or the `T`-separated form.
fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// RFC 3339 with offset; naive forms are taken as UTC.
fn parse_utc_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_naive_datetime(s).map(|dt| dt.and_utc()))
}
