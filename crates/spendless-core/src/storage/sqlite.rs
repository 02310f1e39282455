//! SQLite-backed store for enrollments and transactions.
//!
//! Dates are stored as ISO-8601 text so that window filters in SQL and in
//! Rust agree on plain string ordering. Amounts are stored as decimal text.
//!
//! rusqlite is blocking, so every query runs on tokio's blocking pool and the
//! engine's I/O timeout can fire while a locked database is retried.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use super::migrations;
use super::{EnrollmentStore, TransactionStore, UpsertSummary};
use crate::error::StoreError;
use crate::model::{Category, Enrollment, EnrollmentStatus, Transaction};

const ENROLLMENT_COLUMNS: &str = "id, user_id, template_id, status, joined_at, streak, last_checked_at,
     last_evaluated_date, failure_reason, completed_at, version";

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file and apply migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    pub fn open_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        migrations::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock()?;
            f(&mut guard)
        })
        .await?
    }
}

// === Row mapping ===

struct EnrollmentRow {
    id: String,
    user_id: String,
    template_id: String,
    status: String,
    joined_at: String,
    streak: u32,
    last_checked_at: Option<String>,
    last_evaluated_date: Option<String>,
    failure_reason: Option<String>,
    completed_at: Option<String>,
    version: u64,
}

impl EnrollmentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            template_id: row.get(2)?,
            status: row.get(3)?,
            joined_at: row.get(4)?,
            streak: row.get(5)?,
            last_checked_at: row.get(6)?,
            last_evaluated_date: row.get(7)?,
            failure_reason: row.get(8)?,
            completed_at: row.get(9)?,
            version: row.get::<_, i64>(10)? as u64,
        })
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn fmt_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{value}': {e}")))
}

fn parse_date(value: &str) -> Result<NaiveDate, StoreError> {
    value
        .parse::<NaiveDate>()
        .map_err(|e| StoreError::Corrupt(format!("bad date '{value}': {e}")))
}

impl TryFrom<EnrollmentRow> for Enrollment {
    type Error = StoreError;

    fn try_from(row: EnrollmentRow) -> Result<Self, Self::Error> {
        let status = EnrollmentStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown enrollment status '{}'", row.status)))?;
        Ok(Enrollment {
            id: row.id,
            user_id: row.user_id,
            template_id: row.template_id,
            status,
            joined_at: parse_instant(&row.joined_at)?,
            streak: row.streak,
            last_checked_at: row.last_checked_at.as_deref().map(parse_instant).transpose()?,
            last_evaluated_date: row.last_evaluated_date.as_deref().map(parse_date).transpose()?,
            failure_reason: row.failure_reason,
            completed_at: row.completed_at.as_deref().map(parse_instant).transpose()?,
            version: row.version,
        })
    }
}

struct TransactionRow {
    id: String,
    amount: String,
    date: String,
    authorized_date: Option<String>,
    merchant_name: Option<String>,
    category_primary: Option<String>,
    category_detailed: Option<String>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let amount = row
            .amount
            .parse::<Decimal>()
            .map_err(|e| StoreError::Corrupt(format!("bad amount '{}': {e}", row.amount)))?;
        Ok(Transaction {
            id: row.id,
            amount,
            date: parse_date(&row.date)?,
            authorized_date: row.authorized_date.as_deref().map(parse_date).transpose()?,
            merchant_name: row.merchant_name,
            category: Category {
                primary: row.category_primary,
                detailed: row.category_detailed,
            },
        })
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn collect_enrollments(rows: Vec<EnrollmentRow>) -> Result<Vec<Enrollment>, StoreError> {
    rows.into_iter().map(Enrollment::try_from).collect()
}

#[async_trait]
impl EnrollmentStore for SqliteStore {
    async fn current_enrollment(&self, user_id: &str, template_id: &str) -> Result<Option<Enrollment>, StoreError> {
        let (user_id, template_id) = (user_id.to_string(), template_id.to_string());
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {ENROLLMENT_COLUMNS} FROM enrollments
                         WHERE user_id = ?1 AND template_id = ?2
                         ORDER BY joined_at DESC, rowid DESC LIMIT 1"
                    ),
                    params![user_id, template_id],
                    EnrollmentRow::from_row,
                )
                .optional()?;
            row.map(Enrollment::try_from).transpose()
        })
        .await
    }

    async fn enrollment_history(&self, user_id: &str, template_id: &str) -> Result<Vec<Enrollment>, StoreError> {
        let (user_id, template_id) = (user_id.to_string(), template_id.to_string());
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENROLLMENT_COLUMNS} FROM enrollments
                 WHERE user_id = ?1 AND template_id = ?2
                 ORDER BY joined_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map(params![user_id, template_id], EnrollmentRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            collect_enrollments(rows)
        })
        .await
    }

    async fn user_enrollments(&self, user_id: &str) -> Result<Vec<Enrollment>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENROLLMENT_COLUMNS} FROM enrollments
                 WHERE user_id = ?1
                 ORDER BY template_id ASC, joined_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map(params![user_id], EnrollmentRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut current: Vec<Enrollment> = Vec::new();
            for enrollment in collect_enrollments(rows)? {
                if current.last().map(|e| &e.template_id) != Some(&enrollment.template_id) {
                    current.push(enrollment);
                }
            }
            Ok(current)
        })
        .await
    }

    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<Enrollment, StoreError> {
        let enrollment = enrollment.clone();
        self.with_conn(move |conn| {
            let result = conn.execute(
                &format!(
                    "INSERT INTO enrollments ({ENROLLMENT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1)"
                ),
                params![
                    enrollment.id,
                    enrollment.user_id,
                    enrollment.template_id,
                    enrollment.status.as_str(),
                    fmt_instant(enrollment.joined_at),
                    enrollment.streak,
                    enrollment.last_checked_at.map(fmt_instant),
                    enrollment.last_evaluated_date.map(|d| d.to_string()),
                    enrollment.failure_reason,
                    enrollment.completed_at.map(fmt_instant),
                ],
            );
            match result {
                Ok(_) => {
                    let mut stored = enrollment;
                    stored.version = 1;
                    Ok(stored)
                }
                Err(e) if is_constraint_violation(&e) => Err(StoreError::Duplicate(format!(
                    "active enrollment for {}/{}",
                    enrollment.user_id, enrollment.template_id
                ))),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn update_enrollment(&self, enrollment: &Enrollment, expected_version: u64) -> Result<Enrollment, StoreError> {
        let enrollment = enrollment.clone();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE enrollments
                 SET status = ?1, streak = ?2, last_checked_at = ?3, last_evaluated_date = ?4,
                     failure_reason = ?5, completed_at = ?6, version = version + 1
                 WHERE id = ?7 AND version = ?8",
                params![
                    enrollment.status.as_str(),
                    enrollment.streak,
                    enrollment.last_checked_at.map(fmt_instant),
                    enrollment.last_evaluated_date.map(|d| d.to_string()),
                    enrollment.failure_reason,
                    enrollment.completed_at.map(fmt_instant),
                    enrollment.id,
                    expected_version as i64,
                ],
            )?;

            if changed == 0 {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM enrollments WHERE id = ?1)",
                    params![enrollment.id],
                    |row| row.get(0),
                )?;
                return Err(if exists {
                    StoreError::VersionConflict {
                        enrollment_id: enrollment.id.clone(),
                        expected: expected_version,
                    }
                } else {
                    StoreError::MissingRecord(enrollment.id.clone())
                });
            }

            let mut stored = enrollment;
            stored.version = expected_version + 1;
            Ok(stored)
        })
        .await
    }
}

#[async_trait]
impl TransactionStore for SqliteStore {
    async fn upsert_transactions(&self, user_id: &str, transactions: &[Transaction]) -> Result<UpsertSummary, StoreError> {
        let user_id = user_id.to_string();
        let transactions = transactions.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut summary = UpsertSummary::default();
            {
                let mut select = tx.prepare(
                    "SELECT id, amount, date, authorized_date, merchant_name, category_primary, category_detailed
                     FROM transactions WHERE user_id = ?1 AND id = ?2",
                )?;
                let mut upsert = tx.prepare(
                    "INSERT OR REPLACE INTO transactions
                        (user_id, id, amount, date, authorized_date, merchant_name, category_primary, category_detailed)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )?;

                for record in &transactions {
                    let existing = select
                        .query_row(params![user_id, record.id], transaction_row)
                        .optional()?
                        .map(Transaction::try_from)
                        .transpose()?;

                    match existing {
                        Some(ref previous) if previous == record => {
                            summary.unchanged += 1;
                            continue;
                        }
                        Some(_) => summary.updated += 1,
                        None => summary.inserted += 1,
                    }

                    upsert.execute(params![
                        user_id,
                        record.id,
                        record.amount.to_string(),
                        record.date.to_string(),
                        record.authorized_date.map(|d| d.to_string()),
                        record.merchant_name,
                        record.category.primary,
                        record.category.detailed,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(summary)
        })
        .await
    }

    async fn transactions_for(&self, user_id: &str) -> Result<Vec<Transaction>, StoreError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, amount, date, authorized_date, merchant_name, category_primary, category_detailed
                 FROM transactions WHERE user_id = ?1 ORDER BY date ASC, id ASC",
            )?;
            let rows = stmt
                .query_map(params![user_id], transaction_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(Transaction::try_from).collect()
        })
        .await
    }
}

fn transaction_row(row: &Row<'_>) -> rusqlite::Result<TransactionRow> {
    Ok(TransactionRow {
        id: row.get(0)?,
        amount: row.get(1)?,
        date: row.get(2)?,
        authorized_date: row.get(3)?,
        merchant_name: row.get(4)?,
        category_primary: row.get(5)?,
        category_detailed: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[tokio::test]
    async fn enrollment_round_trip() {
        let store = SqliteStore::open_memory().unwrap();
        let joined_at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let stored = store.insert_enrollment(&Enrollment::new("u1", "t1", joined_at)).await.unwrap();
        assert_eq!(stored.version, 1);

        let mut progressed = stored.clone();
        progressed.advance(2, day(2), joined_at).unwrap();
        let updated = store.update_enrollment(&progressed, 1).await.unwrap();
        assert_eq!(updated.version, 2);

        let loaded = store.current_enrollment("u1", "t1").await.unwrap().unwrap();
        assert_eq!(loaded, updated);
        assert_eq!(loaded.last_evaluated_date, Some(day(2)));
    }

    #[tokio::test]
    async fn stale_write_is_a_version_conflict() {
        let store = SqliteStore::open_memory().unwrap();
        let stored = store.insert_enrollment(&Enrollment::new("u1", "t1", Utc::now())).await.unwrap();
        store.update_enrollment(&stored, 1).await.unwrap();
        let err = store.update_enrollment(&stored, 1).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { expected: 1, .. }));

        let mut ghost = stored.clone();
        ghost.id = "missing".into();
        let err = store.update_enrollment(&ghost, 1).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingRecord(_)));
    }

    #[tokio::test]
    async fn second_active_insert_is_duplicate() {
        let store = SqliteStore::open_memory().unwrap();
        store.insert_enrollment(&Enrollment::new("u1", "t1", Utc::now())).await.unwrap();
        let err = store
            .insert_enrollment(&Enrollment::new("u1", "t1", Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn history_and_current_per_template() {
        let store = SqliteStore::open_memory().unwrap();
        let first_join = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let stored = store.insert_enrollment(&Enrollment::new("u1", "t1", first_join)).await.unwrap();
        let mut failed = stored.clone();
        failed.fail("burger", day(2), first_join).unwrap();
        store.update_enrollment(&failed, 1).await.unwrap();

        let second_join = Utc.with_ymd_and_hms(2026, 3, 3, 8, 0, 0).unwrap();
        let rejoined = store.insert_enrollment(&Enrollment::new("u1", "t1", second_join)).await.unwrap();
        store.insert_enrollment(&Enrollment::new("u1", "t2", second_join)).await.unwrap();

        let history = store.enrollment_history("u1", "t1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, rejoined.id);
        assert_eq!(history[1].failure_reason.as_deref(), Some("burger"));

        let current = store.user_enrollments("u1").await.unwrap();
        assert_eq!(current.len(), 2);
        assert_eq!(current[0].id, rejoined.id);
        assert_eq!(current[1].template_id, "t2");
    }

    #[tokio::test]
    async fn transactions_upsert_by_id() {
        let store = SqliteStore::open_memory().unwrap();
        let tx = Transaction::new("t1", "12.34".parse().unwrap(), day(2))
            .with_authorized_date(day(1))
            .with_merchant("Burger Barn")
            .with_category("FOOD_AND_DRINK", "FOOD_AND_DRINK_FAST_FOOD");

        let summary = store.upsert_transactions("u1", &[tx.clone()]).await.unwrap();
        assert_eq!(summary.inserted, 1);
        let summary = store.upsert_transactions("u1", &[tx.clone()]).await.unwrap();
        assert_eq!(summary.unchanged, 1);

        let loaded = store.transactions_for("u1").await.unwrap();
        assert_eq!(loaded, vec![tx]);
    }

    #[test]
    fn unwritable_parent_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let err = SqliteStore::open(&blocker.join("spendless.db")).err().unwrap();
        assert!(matches!(err, StoreError::CreateDir { .. }), "{err}");
    }

    #[tokio::test]
    async fn held_connection_lets_the_caller_time_out() {
        let store = SqliteStore::open_memory().unwrap();
        let held = Arc::clone(&store.conn);
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let holder = std::thread::spawn(move || {
            let _guard = held.lock().unwrap();
            locked_tx.send(()).unwrap();
            release_rx.recv().ok();
        });
        locked_rx.recv().unwrap();

        let waited = tokio::time::timeout(std::time::Duration::from_millis(50), store.transactions_for("u1")).await;
        assert!(waited.is_err(), "query must yield while the connection is busy");

        release_tx.send(()).unwrap();
        holder.join().unwrap();
        assert!(store.transactions_for("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_database_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spendless.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_enrollment(&Enrollment::new("u1", "t1", Utc::now())).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.current_enrollment("u1", "t1").await.unwrap().is_some());
    }
}
