use std::path::Path;

use serde::Serialize;
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use tracing::{debug, info};

use trace2pass_common::{AnomalyReport, CheckKind};

use crate::error::CollectorError;
use crate::priority;

const SCHEMA_VERSION: i64 = 1;

/// One fingerprint's aggregated state: first/last seen, occurrence count,
/// and the most recently observed report for that fingerprint.
#[derive(Debug, Clone, Serialize)]
pub struct CollectorRecord {
    pub fingerprint: String,
    pub kind: CheckKind,
    pub report: AnomalyReport,
    pub first_seen_ns: i64,
    pub last_seen_ns: i64,
    pub occurrence_count: i64,
    pub priority: f64,
}

#[derive(Debug, Serialize)]
pub struct CollectorStats {
    pub reports_total: i64,
    pub records_total: i64,
    pub per_kind: Vec<(CheckKind, i64)>,
}

/// Single embedded SQLite table keyed by fingerprint (§4.3 "a single
/// embedded relational table keyed by fingerprint is sufficient").
pub struct CollectorStore {
    pool: SqlitePool,
}

impl CollectorStore {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, CollectorError> {
        let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new().max_connections(5).connect(&db_url).await?;
        Self::from_pool(pool).await
    }

    /// Builds a store over an already-connected pool — used by the
    /// `sqlite::memory:` integration tests.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, CollectorError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);
            CREATE TABLE IF NOT EXISTS records (
                fingerprint TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                report_json TEXT NOT NULL,
                first_seen_ns INTEGER NOT NULL,
                last_seen_ns INTEGER NOT NULL,
                occurrence_count INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_records_last_seen ON records(last_seen_ns);
            CREATE INDEX IF NOT EXISTS idx_records_kind ON records(kind);
            "#,
        )
        .execute(&pool)
        .await?;

        let version_row = sqlx::query("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool)
            .await?;
        let version_count: i64 = version_row.get(0);
        if version_count == 0 {
            sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                .bind(SCHEMA_VERSION)
                .execute(&pool)
                .await?;
        }

        info!("collector store initialized");
        Ok(Self { pool })
    }

    /// Creates a new record, or updates count and last-seen on an existing
    /// one (§4.3). Returns whether this fingerprint was new.
    pub async fn upsert(&self, fingerprint: &str, report: &AnomalyReport, now_ns: i64) -> Result<bool, CollectorError> {
        let existing = sqlx::query("SELECT occurrence_count FROM records WHERE fingerprint = ?")
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?;

        match existing {
            Some(row) => {
                // The representative record's identity is fixed at creation
                // (§4.3 "the identity of the representative record never
                // changes after creation") — a duplicate only advances the
                // counters, it never touches `report_json`.
                let count: i64 = row.get(0);
                sqlx::query("UPDATE records SET last_seen_ns = ?, occurrence_count = ? WHERE fingerprint = ?")
                    .bind(now_ns)
                    .bind(count + 1)
                    .bind(fingerprint)
                    .execute(&self.pool)
                    .await?;
                debug!(fingerprint, "updated existing record");
                Ok(false)
            }
            None => {
                let report_json = serde_json::to_string(report)
                    .map_err(|err| CollectorError::Rejected(format!("unserializable report: {err}")))?;
                let kind = report.kind.as_str();
                sqlx::query(
                    "INSERT INTO records (fingerprint, kind, report_json, first_seen_ns, last_seen_ns, occurrence_count) VALUES (?, ?, ?, ?, ?, 1)",
                )
                .bind(fingerprint)
                .bind(kind)
                .bind(&report_json)
                .bind(now_ns)
                .bind(now_ns)
                .execute(&self.pool)
                .await?;
                debug!(fingerprint, "created new record");
                Ok(true)
            }
        }
    }

    pub async fn get(&self, fingerprint: &str) -> Result<Option<CollectorRecord>, CollectorError> {
        let row = sqlx::query(
            "SELECT fingerprint, kind, report_json, first_seen_ns, last_seen_ns, occurrence_count FROM records WHERE fingerprint = ?",
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_record(r, now_ns())).transpose()
    }

    /// Returns records ordered by priority, most urgent first (§4.3 "Read
    /// the triage queue"). Priority is computed at read time rather than
    /// stored, since it depends on the caller's notion of "now".
    pub async fn queue(&self, limit: i64) -> Result<Vec<CollectorRecord>, CollectorError> {
        // Priority depends on recency and can't be expressed in SQL without
        // duplicating `priority::priority`'s decay curve, so every row is
        // fetched and sorted here before `limit` is applied — truncating in
        // SQL first (e.g. an `ORDER BY last_seen_ns DESC LIMIT ?`) could drop
        // a high-priority, less-recently-touched record before its priority
        // is ever computed.
        let rows = sqlx::query(
            "SELECT fingerprint, kind, report_json, first_seen_ns, last_seen_ns, occurrence_count FROM records",
        )
        .fetch_all(&self.pool)
        .await?;

        let now = now_ns();
        let mut records: Vec<CollectorRecord> = rows
            .into_iter()
            .map(|r| row_to_record(r, now))
            .collect::<Result<_, _>>()?;
        records.sort_by(|a, b| b.priority.partial_cmp(&a.priority).unwrap_or(std::cmp::Ordering::Equal));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }

    pub async fn stats(&self) -> Result<CollectorStats, CollectorError> {
        let reports_row = sqlx::query("SELECT COALESCE(SUM(occurrence_count), 0) FROM records")
            .fetch_one(&self.pool)
            .await?;
        let reports_total: i64 = reports_row.get(0);

        let records_row = sqlx::query("SELECT COUNT(*) FROM records").fetch_one(&self.pool).await?;
        let records_total: i64 = records_row.get(0);

        let mut per_kind = Vec::with_capacity(CheckKind::ALL.len());
        for kind in CheckKind::ALL {
            let row = sqlx::query("SELECT COALESCE(SUM(occurrence_count), 0) FROM records WHERE kind = ?")
                .bind(kind.as_str())
                .fetch_one(&self.pool)
                .await?;
            per_kind.push((kind, row.get(0)));
        }

        Ok(CollectorStats {
            reports_total,
            records_total,
            per_kind,
        })
    }

    pub async fn delete(&self, fingerprint: &str) -> Result<bool, CollectorError> {
        let result = sqlx::query("DELETE FROM records WHERE fingerprint = ?")
            .bind(fingerprint)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all(&self) -> Result<u64, CollectorError> {
        let result = sqlx::query("DELETE FROM records").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

fn now_ns() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

fn row_to_record(row: sqlx::sqlite::SqliteRow, now_ns: i64) -> Result<CollectorRecord, CollectorError> {
    let fingerprint: String = row.get(0);
    // `kind` is also denormalized into its own TEXT column for the index,
    // but the decoded report is the source of truth.
    let report_json: String = row.get(2);
    let first_seen_ns: i64 = row.get(3);
    let last_seen_ns: i64 = row.get(4);
    let occurrence_count: i64 = row.get(5);

    let report: AnomalyReport = serde_json::from_str(&report_json)
        .map_err(|err| CollectorError::Storage(sqlx::Error::Decode(Box::new(err))))?;
    let kind = report.kind;

    Ok(CollectorRecord {
        priority: priority::priority(kind, occurrence_count, last_seen_ns, now_ns),
        fingerprint,
        kind,
        report,
        first_seen_ns,
        last_seen_ns,
        occurrence_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use trace2pass_common::{AnomalyReportBuilder, CheckDetails};

    async fn memory_store() -> CollectorStore {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        CollectorStore::from_pool(pool).await.unwrap()
    }

    fn sample_report() -> AnomalyReport {
        AnomalyReportBuilder::new(
            CheckDetails::ArithOverflow {
                expr: "x * y".to_string(),
                lhs: 1,
                rhs: 2,
            },
            0,
            0,
            0,
        )
        .finish()
    }

    #[tokio::test]
    async fn first_submission_creates_a_new_record() {
        let store = memory_store().await;
        let report = sample_report();
        let is_new = store.upsert("fp1", &report, 100).await.unwrap();
        assert!(is_new);
        let record = store.get("fp1").await.unwrap().unwrap();
        assert_eq!(record.occurrence_count, 1);
    }

    #[tokio::test]
    async fn repeated_submission_increments_count_and_last_seen() {
        let store = memory_store().await;
        let report = sample_report();
        store.upsert("fp1", &report, 100).await.unwrap();
        let is_new = store.upsert("fp1", &report, 200).await.unwrap();
        assert!(!is_new);
        let record = store.get("fp1").await.unwrap().unwrap();
        assert_eq!(record.occurrence_count, 2);
        assert_eq!(record.last_seen_ns, 200);
    }

    #[tokio::test]
    async fn queue_orders_by_priority_descending() {
        let store = memory_store().await;
        let report = sample_report();
        store.upsert("low", &report, 1).await.unwrap();
        for _ in 0..5 {
            store.upsert("high", &report, 1).await.unwrap();
        }
        let queue = store.queue(10).await.unwrap();
        assert_eq!(queue[0].fingerprint, "high");
    }

    #[tokio::test]
    async fn limit_truncates_after_priority_sort_not_before() {
        let store = memory_store().await;
        let report = sample_report();
        // Many recently-touched, low-occurrence records...
        for i in 0..5 {
            store.upsert(&format!("recent-{i}"), &report, 1_000).await.unwrap();
        }
        // ...plus one stale record that has fired far more often, so it
        // outranks every "recent" one on priority despite its older
        // last-seen timestamp.
        for _ in 0..50 {
            store.upsert("stale-but-frequent", &report, 1).await.unwrap();
        }

        let queue = store.queue(1).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].fingerprint, "stale-but-frequent");
    }

    #[tokio::test]
    async fn delete_removes_a_record() {
        let store = memory_store().await;
        let report = sample_report();
        store.upsert("fp1", &report, 1).await.unwrap();
        assert!(store.delete("fp1").await.unwrap());
        assert!(store.get("fp1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_all_purges_every_record() {
        let store = memory_store().await;
        let report = sample_report();
        store.upsert("fp1", &report, 1).await.unwrap();
        store.upsert("fp2", &report, 1).await.unwrap();
        let deleted = store.delete_all().await.unwrap();
        assert_eq!(deleted, 2);
    }
}
