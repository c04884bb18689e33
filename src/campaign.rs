use crate::error::{CampaignSqlError, CampaignSqlResult};
use crate::executor::QueryExecutor;
use crate::template::RenderParams;
use crate::value::{Row, SqlValue};
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;
use tracing::{debug, warn};

/// Lookup used by [`CampaignRepository::find_by_name`]
const FIND_BY_NAME_QUERY: &str = "SELECT name, start_dt, end_dt FROM campaigns WHERE name = ?";

/// Start or end of a campaign, as stored in a `DATE` or `DATETIME` column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignDate {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl fmt::Display for CampaignDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", SqlValue::from(*self))
    }
}

impl From<CampaignDate> for SqlValue {
    fn from(value: CampaignDate) -> Self {
        match value {
            CampaignDate::Date(d) => Self::Date(d),
            CampaignDate::DateTime(dt) => Self::DateTime(dt),
        }
    }
}

/// A campaign record from the `campaigns` table
#[derive(Debug, Clone, PartialEq)]
pub struct Campaign {
    pub name: String,
    pub start_dt: CampaignDate,
    pub end_dt: CampaignDate,
}

impl Campaign {
    /// Decode a campaign from a `name, start_dt, end_dt` result row
    ///
    /// # Errors
    ///
    /// Returns `Decode` if a column is missing or has an unexpected type
    pub fn from_row(row: &Row) -> CampaignSqlResult<Self> {
        let name = match row.get("name") {
            Some(SqlValue::Text(name)) => name.clone(),
            other => return Err(unexpected_column("name", other)),
        };

        Ok(Self {
            name,
            start_dt: date_column(row, "start_dt")?,
            end_dt: date_column(row, "end_dt")?,
        })
    }

    /// Convert the record into template parameters keyed by column name
    #[must_use]
    pub fn into_params(self) -> RenderParams {
        let mut params = RenderParams::new();
        params.insert("name".to_string(), SqlValue::Text(self.name));
        params.insert("start_dt".to_string(), self.start_dt.into());
        params.insert("end_dt".to_string(), self.end_dt.into());
        params
    }
}

fn date_column(row: &Row, column: &str) -> CampaignSqlResult<CampaignDate> {
    match row.get(column) {
        Some(SqlValue::Date(d)) => Ok(CampaignDate::Date(*d)),
        Some(SqlValue::DateTime(dt)) => Ok(CampaignDate::DateTime(*dt)),
        other => Err(unexpected_column(column, other)),
    }
}

fn unexpected_column(column: &str, value: Option<&SqlValue>) -> CampaignSqlError {
    match value {
        None => CampaignSqlError::Decode(format!("campaign row has no '{column}' column")),
        Some(value) => CampaignSqlError::Decode(format!(
            "campaign column '{column}' has unexpected value {value:?}"
        )),
    }
}

/// Read-only access to the `campaigns` table
pub struct CampaignRepository<E> {
    executor: E,
}

impl<E: QueryExecutor> CampaignRepository<E> {
    /// Create a repository backed by `executor`
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Find a campaign by its unique name
    ///
    /// Names are assumed unique; if the table holds duplicates, the first row
    /// returned is used and a warning is logged.
    ///
    /// # Errors
    ///
    /// Returns `CampaignNotFound` if no row matches, the executor's error
    /// unchanged if the query fails, or `Decode` if the row is malformed
    pub async fn find_by_name(&self, name: &str) -> CampaignSqlResult<Campaign> {
        debug!("Looking up campaign '{}'", name);

        let rows = self
            .executor
            .fetch_all(FIND_BY_NAME_QUERY, &[SqlValue::from(name)])
            .await?;

        let Some(first) = rows.first() else {
            return Err(CampaignSqlError::CampaignNotFound {
                name: name.to_string(),
            });
        };

        if rows.len() > 1 {
            warn!(
                "Campaign '{}' matched {} rows, using the first",
                name,
                rows.len()
            );
        }

        Campaign::from_row(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MockQueryExecutor;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn campaign_row(name: &str, start: NaiveDate, end: NaiveDate) -> Row {
        let mut row = Row::new();
        row.insert("name".to_string(), SqlValue::from(name));
        row.insert("start_dt".to_string(), SqlValue::Date(start));
        row.insert("end_dt".to_string(), SqlValue::Date(end));
        row
    }

    #[tokio::test]
    async fn test_find_by_name_found() {
        let mut executor = MockQueryExecutor::new();
        executor
            .expect_fetch_all()
            .withf(|query, params| {
                query == FIND_BY_NAME_QUERY
                    && params.len() == 1
                    && params[0] == SqlValue::from("summer2024")
            })
            .times(1)
            .returning(|_, _| {
                Ok(vec![campaign_row(
                    "summer2024",
                    date(2024, 6, 1),
                    date(2024, 8, 31),
                )])
            });

        let repository = CampaignRepository::new(executor);
        let campaign = repository.find_by_name("summer2024").await.unwrap();

        assert_eq!(campaign.name, "summer2024");
        assert_eq!(campaign.start_dt, CampaignDate::Date(date(2024, 6, 1)));
        assert_eq!(campaign.end_dt, CampaignDate::Date(date(2024, 8, 31)));
    }

    #[tokio::test]
    async fn test_find_by_name_not_found() {
        let mut executor = MockQueryExecutor::new();
        executor
            .expect_fetch_all()
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let repository = CampaignRepository::new(executor);
        let err = repository.find_by_name("winter2030").await.unwrap_err();

        match err {
            CampaignSqlError::CampaignNotFound { name } => assert_eq!(name, "winter2030"),
            other => panic!("expected CampaignNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_find_by_name_propagates_database_error() {
        let mut executor = MockQueryExecutor::new();
        executor
            .expect_fetch_all()
            .times(1)
            .returning(|_, _| Err(CampaignSqlError::Database(sqlx::Error::PoolClosed)));

        let repository = CampaignRepository::new(executor);
        let err = repository.find_by_name("summer2024").await.unwrap_err();

        assert!(matches!(
            err,
            CampaignSqlError::Database(sqlx::Error::PoolClosed)
        ));
    }

    #[tokio::test]
    async fn test_find_by_name_duplicates_uses_first_row() {
        let mut executor = MockQueryExecutor::new();
        executor.expect_fetch_all().times(1).returning(|_, _| {
            Ok(vec![
                campaign_row("dup", date(2024, 1, 1), date(2024, 1, 31)),
                campaign_row("dup", date(2025, 1, 1), date(2025, 1, 31)),
            ])
        });

        let repository = CampaignRepository::new(executor);
        let campaign = repository.find_by_name("dup").await.unwrap();

        assert_eq!(campaign.start_dt, CampaignDate::Date(date(2024, 1, 1)));
    }

    #[test]
    fn test_from_row_accepts_datetime_columns() {
        let start = date(2024, 6, 1).and_hms_opt(8, 0, 0).unwrap();
        let mut row = campaign_row("summer2024", date(2024, 6, 1), date(2024, 8, 31));
        row.insert("start_dt".to_string(), SqlValue::DateTime(start));

        let campaign = Campaign::from_row(&row).unwrap();
        assert_eq!(campaign.start_dt, CampaignDate::DateTime(start));
        assert_eq!(campaign.start_dt.to_string(), "2024-06-01 08:00:00");
    }

    #[test]
    fn test_from_row_rejects_missing_column() {
        let mut row = campaign_row("summer2024", date(2024, 6, 1), date(2024, 8, 31));
        row.remove("end_dt");

        assert!(matches!(
            Campaign::from_row(&row),
            Err(CampaignSqlError::Decode(_))
        ));
    }

    #[test]
    fn test_from_row_rejects_null_date() {
        let mut row = campaign_row("summer2024", date(2024, 6, 1), date(2024, 8, 31));
        row.insert("start_dt".to_string(), SqlValue::Null);

        assert!(matches!(
            Campaign::from_row(&row),
            Err(CampaignSqlError::Decode(_))
        ));
    }

    #[test]
    fn test_into_params() {
        let campaign = Campaign {
            name: "summer2024".to_string(),
            start_dt: CampaignDate::Date(date(2024, 6, 1)),
            end_dt: CampaignDate::Date(date(2024, 8, 31)),
        };

        let params = campaign.into_params();
        assert_eq!(params.len(), 3);
        assert_eq!(params["name"], SqlValue::from("summer2024"));
        assert_eq!(params["start_dt"], SqlValue::Date(date(2024, 6, 1)));
    }
}
