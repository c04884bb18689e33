// Allow module inception - this is a common Rust pattern for database clients
#![allow(clippy::module_name_repetitions)]

use crate::config::Config;
use crate::error::{CampaignSqlError, CampaignSqlResult};
use crate::value::{Row, SqlValue};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{
    Column, ConnectOptions, Connection, MySql, MySqlConnection, Row as _, TypeInfo, ValueRef,
};
use std::time::Duration;
use tracing::{debug, warn};

/// Runs a parameterized read query and returns every row
///
/// Placeholders use the MySQL `?` convention; `params` are bound positionally.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute `query` with `params` and fetch all rows eagerly
    ///
    /// # Errors
    ///
    /// Returns the underlying driver error if connecting or querying fails
    async fn fetch_all(&self, query: &str, params: &[SqlValue]) -> CampaignSqlResult<Vec<Row>>;
}

/// Query executor that opens a fresh MySQL connection for every call
///
/// No pooling: each `fetch_all` connects, runs one statement, and closes the
/// connection again before returning, on success and on failure.
#[derive(Debug, Clone)]
pub struct MySqlExecutor {
    options: MySqlConnectOptions,
    connect_timeout: Duration,
}

impl MySqlExecutor {
    /// Create an executor for the database described by `config`
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.db_host)
            .port(config.db_port)
            .username(&config.db_user)
            .password(&config.db_password)
            .database(&config.db_name);

        Self {
            options,
            connect_timeout: config.connect_timeout_duration(),
        }
    }

    async fn connect(&self) -> CampaignSqlResult<MySqlConnection> {
        match tokio::time::timeout(self.connect_timeout, self.options.connect()).await {
            Ok(conn) => Ok(conn?),
            Err(_) => Err(CampaignSqlError::Database(sqlx::Error::Io(
                std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!(
                        "connection not established within {}s",
                        self.connect_timeout.as_secs()
                    ),
                ),
            ))),
        }
    }
}

#[async_trait]
impl QueryExecutor for MySqlExecutor {
    async fn fetch_all(&self, query: &str, params: &[SqlValue]) -> CampaignSqlResult<Vec<Row>> {
        debug!("Executing query with {} bind values: {}", params.len(), query);

        let mut conn = self.connect().await?;

        let result = bind_all(sqlx::query(query), params)
            .fetch_all(&mut conn)
            .await;

        // Close regardless of the query outcome
        if let Err(e) = conn.close().await {
            warn!("Failed to close database connection cleanly: {e}");
        }

        let rows = result?;
        debug!("Query returned {} rows", rows.len());

        rows.iter().map(decode_row).collect()
    }
}

fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(x) => query.bind(*x),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Date(d) => query.bind(*d),
            SqlValue::DateTime(dt) => query.bind(*dt),
            SqlValue::Time(t) => query.bind(*t),
        };
    }
    query
}

/// How a MySQL column type is decoded into a [`SqlValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Null,
    Bool,
    Int,
    UnsignedInt,
    Float,
    Double,
    Date,
    DateTime,
    Time,
    Bit,
    Binary,
    Text,
}

impl ColumnKind {
    fn from_type_name(name: &str) -> Self {
        let upper = name.to_ascii_uppercase();
        match upper.as_str() {
            "NULL" => Self::Null,
            "BOOLEAN" => Self::Bool,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => Self::Int,
            "FLOAT" => Self::Float,
            "DOUBLE" => Self::Double,
            "DATE" => Self::Date,
            "DATETIME" | "TIMESTAMP" => Self::DateTime,
            "TIME" => Self::Time,
            "BIT" => Self::Bit,
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB"
            | "GEOMETRY" => Self::Binary,
            _ if upper.ends_with(" UNSIGNED") => Self::UnsignedInt,
            // CHAR, VARCHAR, TEXT variants, ENUM, SET, DECIMAL, JSON: sent as
            // length-encoded strings under the binary protocol
            _ => Self::Text,
        }
    }
}

fn decode_row(row: &MySqlRow) -> CampaignSqlResult<Row> {
    let mut decoded = Row::new();

    for column in row.columns() {
        let index = column.ordinal();
        let name = column.name();

        let is_null = row.try_get_raw(index)?.is_null();
        let kind = if is_null {
            ColumnKind::Null
        } else {
            ColumnKind::from_type_name(column.type_info().name())
        };

        let value = decode_cell(row, index, kind).map_err(|e| {
            CampaignSqlError::Decode(format!(
                "column '{name}' ({}): {e}",
                column.type_info().name()
            ))
        })?;

        decoded.insert(name.to_string(), value);
    }

    Ok(decoded)
}

fn decode_cell(row: &MySqlRow, index: usize, kind: ColumnKind) -> Result<SqlValue, sqlx::Error> {
    let value = match kind {
        ColumnKind::Null => SqlValue::Null,
        ColumnKind::Bool => SqlValue::Bool(row.try_get::<bool, _>(index)?),
        ColumnKind::Int => SqlValue::Int(row.try_get_unchecked::<i64, _>(index)?),
        ColumnKind::UnsignedInt => {
            let raw = row.try_get_unchecked::<u64, _>(index)?;
            i64::try_from(raw).map_or_else(|_| SqlValue::Text(raw.to_string()), SqlValue::Int)
        }
        ColumnKind::Float => SqlValue::Float(f64::from(row.try_get::<f32, _>(index)?)),
        ColumnKind::Double => SqlValue::Float(row.try_get::<f64, _>(index)?),
        ColumnKind::Date => SqlValue::Date(row.try_get::<NaiveDate, _>(index)?),
        ColumnKind::DateTime => SqlValue::DateTime(row.try_get::<NaiveDateTime, _>(index)?),
        // Negative or >= 24h TIME values do not fit a time of day and fail here
        ColumnKind::Time => SqlValue::Time(row.try_get::<NaiveTime, _>(index)?),
        ColumnKind::Bit => bit_value(&row.try_get_unchecked::<Vec<u8>, _>(index)?),
        ColumnKind::Binary => binary_value(row.try_get_unchecked::<Vec<u8>, _>(index)?)?,
        ColumnKind::Text => SqlValue::Text(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}

/// BIT(n) arrives as big-endian bytes
fn bit_value(bytes: &[u8]) -> SqlValue {
    if bytes.len() > 8 {
        return SqlValue::Text(bytes.iter().map(|b| format!("{b:08b}")).collect());
    }
    let raw = bytes
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    i64::try_from(raw).map_or_else(|_| SqlValue::Text(raw.to_string()), SqlValue::Int)
}

/// Binary columns are only usable in a text template when they hold UTF-8
fn binary_value(bytes: Vec<u8>) -> Result<SqlValue, sqlx::Error> {
    String::from_utf8(bytes)
        .map(SqlValue::Text)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}
