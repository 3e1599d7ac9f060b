use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use offerank_core::catalog::ports::{CandidateQuery, CandidateStore, StoreError};
use offerank_core::domain::candidate::{Candidate, CandidateId, Characteristic};

use super::RepositoryError;
use crate::DbPool;

pub struct SqlCandidateRepository {
    pool: DbPool,
}

/// Size of the candidate cache across every query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub candidates: i64,
    pub suitable: i64,
}

impl SqlCandidateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn stats(&self) -> Result<CacheStats, RepositoryError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS candidates, COALESCE(SUM(suitable), 0) AS suitable FROM candidate",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CacheStats {
            candidates: row.try_get("candidates")?,
            suitable: row.try_get("suitable")?,
        })
    }

    async fn exists_row(&self, id: &CandidateId) -> Result<bool, RepositoryError> {
        let found = sqlx::query("SELECT 1 FROM candidate WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn insert_row(&self, candidate: &Candidate) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO candidate (
                id,
                identifier,
                title,
                price,
                characteristics_json,
                suitable,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&candidate.id.0)
        .bind(candidate.identifier.as_deref())
        .bind(&candidate.title)
        .bind(candidate.price)
        .bind(encode_characteristics(&candidate.characteristics)?)
        .bind(candidate.suitable)
        .bind(encode_timestamp(&candidate.created_at))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn query_rows(&self, query: &CandidateQuery) -> Result<Vec<Candidate>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                id,
                identifier,
                title,
                price,
                characteristics_json,
                suitable,
                created_at
             FROM candidate
             WHERE instr(lower(title), lower(?)) > 0
               AND (? = 0 OR suitable = 1)
             ORDER BY created_at DESC, id ASC
             LIMIT ?",
        )
        .bind(&query.matching_text)
        .bind(query.suitable_only)
        .bind(query.limit.map(i64::from).unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(candidate_from_row).collect()
    }

    async fn update_row(&self, candidate: &Candidate) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE candidate SET
                identifier = ?,
                title = ?,
                price = ?,
                characteristics_json = ?,
                suitable = ?
             WHERE id = ?",
        )
        .bind(candidate.identifier.as_deref())
        .bind(&candidate.title)
        .bind(candidate.price)
        .bind(encode_characteristics(&candidate.characteristics)?)
        .bind(candidate.suitable)
        .bind(&candidate.id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Missing(candidate.id.0.clone()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CandidateStore for SqlCandidateRepository {
    async fn exists(&self, id: &CandidateId) -> Result<bool, StoreError> {
        Ok(self.exists_row(id).await?)
    }

    async fn insert(&self, candidate: Candidate) -> Result<bool, StoreError> {
        Ok(self.insert_row(&candidate).await?)
    }

    async fn query(&self, query: &CandidateQuery) -> Result<Vec<Candidate>, StoreError> {
        Ok(self.query_rows(query).await?)
    }

    async fn update(&self, candidate: &Candidate) -> Result<(), StoreError> {
        Ok(self.update_row(candidate).await?)
    }
}

fn candidate_from_row(row: SqliteRow) -> Result<Candidate, RepositoryError> {
    Ok(Candidate {
        id: CandidateId(row.try_get("id")?),
        identifier: row.try_get("identifier")?,
        title: row.try_get("title")?,
        price: row.try_get("price")?,
        characteristics: decode_characteristics(row.try_get("characteristics_json")?)?,
        suitable: row.try_get("suitable")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn encode_characteristics(characteristics: &[Characteristic]) -> Result<String, RepositoryError> {
    serde_json::to_string(characteristics)
        .map_err(|error| RepositoryError::Decode(format!("invalid characteristics: {error}")))
}

fn decode_characteristics(value: String) -> Result<Vec<Characteristic>, RepositoryError> {
    serde_json::from_str(&value).map_err(|error| {
        RepositoryError::Decode(format!("invalid characteristics_json `{value}` ({error})"))
    })
}

/// Fixed-width UTC so text ordering matches time ordering.
fn encode_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}
