//! PostgreSQL store backend.
//!
//! Every method runs under `store::bounded`, so a stalled database surfaces
//! as `StoreError::Unavailable` instead of hanging the request.

use std::time::Duration;

use uuid::Uuid;

use super::{
    AttendanceLog, CredentialStore, FacilityDirectory, PrincipalDirectory, Store, StoreError,
    bounded, cooldown_window,
};
use crate::{
    db::DbPool,
    models::{
        attendance::{AttendanceRecord, NewAttendanceRecord},
        credential::{FacilityCredential, NewFacilityCredential},
        facility::Facility,
        principal::{Identity, Principal},
    },
};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: DbPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait::async_trait]
impl CredentialStore for PgStore {
    async fn insert_credential(
        &self,
        credential: &NewFacilityCredential,
    ) -> Result<FacilityCredential, StoreError> {
        bounded(self.timeout, async {
            let row = sqlx::query_as::<_, FacilityCredential>(
                r#"
                INSERT INTO facility_credentials (facility_id, token, valid_from, valid_until)
                VALUES ($1, $2, $3, $4)
                RETURNING id, facility_id, token, valid_from, valid_until, created_at
                "#,
            )
            .bind(credential.facility_id)
            .bind(&credential.token)
            .bind(credential.valid_from)
            .bind(credential.valid_until)
            .fetch_one(&self.pool)
            .await?;
            Ok::<_, StoreError>(row)
        })
        .await
    }

    async fn credential_by_token(
        &self,
        token: &str,
    ) -> Result<Option<FacilityCredential>, StoreError> {
        bounded(self.timeout, async {
            let row = sqlx::query_as::<_, FacilityCredential>(
                "SELECT id, facility_id, token, valid_from, valid_until, created_at
                 FROM facility_credentials
                 WHERE token = $1",
            )
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
            Ok::<_, StoreError>(row)
        })
        .await
    }
}

#[async_trait::async_trait]
impl AttendanceLog for PgStore {
    async fn latest_scan(
        &self,
        student_id: Uuid,
        facility_id: Uuid,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        bounded(self.timeout, async {
            let row = sqlx::query_as::<_, AttendanceRecord>(
                "SELECT id, student_id, facility_id, scanned_at
                 FROM attendance
                 WHERE student_id = $1 AND facility_id = $2
                 ORDER BY scanned_at DESC
                 LIMIT 1",
            )
            .bind(student_id)
            .bind(facility_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok::<_, StoreError>(row)
        })
        .await
    }

    async fn append_outside_cooldown(
        &self,
        record: &NewAttendanceRecord,
        cooldown: chrono::Duration,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let (window_start, window_end) = cooldown_window(record.scanned_at, cooldown);
        let pair_key = format!("{}:{}", record.student_id, record.facility_id);

        bounded(self.timeout, async {
            let mut tx = self.pool.begin().await?;

            // Serialise concurrent admissions for the same (student, facility).
            // The lock is released on commit or rollback.
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(&pair_key)
                .execute(&mut *tx)
                .await?;

            let conflicting: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM attendance
                    WHERE student_id = $1
                    AND facility_id = $2
                    AND scanned_at > $3
                    AND scanned_at < $4
                )
                "#,
            )
            .bind(record.student_id)
            .bind(record.facility_id)
            .bind(window_start)
            .bind(window_end)
            .fetch_one(&mut *tx)
            .await?;

            if conflicting {
                tx.rollback().await?;
                return Ok(None);
            }

            let inserted = sqlx::query_as::<_, AttendanceRecord>(
                r#"
                INSERT INTO attendance (student_id, facility_id, scanned_at)
                VALUES ($1, $2, $3)
                RETURNING id, student_id, facility_id, scanned_at
                "#,
            )
            .bind(record.student_id)
            .bind(record.facility_id)
            .bind(record.scanned_at)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;

            Ok::<_, StoreError>(Some(inserted))
        })
        .await
    }
}

#[async_trait::async_trait]
impl FacilityDirectory for PgStore {
    async fn facility_exists(&self, facility_id: Uuid) -> Result<bool, StoreError> {
        bounded(self.timeout, async {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM facilities WHERE id = $1)")
                    .bind(facility_id)
                    .fetch_one(&self.pool)
                    .await?;
            Ok::<_, StoreError>(exists)
        })
        .await
    }

    async fn get_facility(&self, facility_id: Uuid) -> Result<Option<Facility>, StoreError> {
        bounded(self.timeout, async {
            let row = sqlx::query_as::<_, Facility>(
                "SELECT id, name, location, created_at FROM facilities WHERE id = $1",
            )
            .bind(facility_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok::<_, StoreError>(row)
        })
        .await
    }

    async fn list_facilities(&self) -> Result<Vec<Facility>, StoreError> {
        bounded(self.timeout, async {
            let rows = sqlx::query_as::<_, Facility>(
                "SELECT id, name, location, created_at FROM facilities ORDER BY name",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok::<_, StoreError>(rows)
        })
        .await
    }

    async fn create_facility(&self, name: &str, location: &str) -> Result<Facility, StoreError> {
        bounded(self.timeout, async {
            let row = sqlx::query_as::<_, Facility>(
                r#"
                INSERT INTO facilities (name, location)
                VALUES ($1, $2)
                RETURNING id, name, location, created_at
                "#,
            )
            .bind(name)
            .bind(location)
            .fetch_one(&self.pool)
            .await?;
            Ok::<_, StoreError>(row)
        })
        .await
    }
}

#[async_trait::async_trait]
impl PrincipalDirectory for PgStore {
    async fn identity_by_key_hash(&self, key_hash: &str) -> Result<Option<Identity>, StoreError> {
        let principal = bounded(self.timeout, async {
            let row = sqlx::query_as::<_, Principal>(
                "SELECT id, key_hash, role, created_at, is_active
                 FROM principals
                 WHERE key_hash = $1 AND is_active = true",
            )
            .bind(key_hash)
            .fetch_optional(&self.pool)
            .await?;
            Ok::<_, StoreError>(row)
        })
        .await?;

        match principal {
            Some(principal) => {
                let identity = Identity::try_from(principal).map_err(StoreError::Backend)?;
                Ok(Some(identity))
            }
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        bounded(self.timeout, async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok::<_, StoreError>(())
        })
        .await
    }
}

/// These run against a real database and are skipped unless requested:
/// `DATABASE_URL=postgres://... cargo test -- --ignored`
#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::{DateTime, TimeZone, Utc};

    async fn connect() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = db::create_pool(&url, 10, Duration::from_secs(5))
            .await
            .unwrap();
        db::run_migrations(&pool).await.unwrap();
        PgStore::new(pool, Duration::from_secs(5))
    }

    /// Fresh student and facility so runs never see each other's rows.
    async fn pair(store: &PgStore) -> (Uuid, Uuid) {
        let student_id: Uuid = sqlx::query_scalar(
            "INSERT INTO principals (key_hash, role) VALUES ($1, 'student') RETURNING id",
        )
        .bind(Uuid::new_v4().simple().to_string())
        .fetch_one(&store.pool)
        .await
        .unwrap();
        let facility = store.create_facility("Library", "Block A").await.unwrap();
        (student_id, facility.id)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 9, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn scan(student_id: Uuid, facility_id: Uuid, scanned_at: DateTime<Utc>) -> NewAttendanceRecord {
        NewAttendanceRecord {
            student_id,
            facility_id,
            scanned_at,
        }
    }

    async fn rows_for(store: &PgStore, student_id: Uuid, facility_id: Uuid) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM attendance WHERE student_id = $1 AND facility_id = $2",
        )
        .bind(student_id)
        .bind(facility_id)
        .fetch_one(&store.pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn scan_inside_cooldown_is_suppressed() {
        let store = connect().await;
        let (student, facility) = pair(&store).await;
        let cooldown = chrono::Duration::seconds(60);

        let first = store
            .append_outside_cooldown(&scan(student, facility, at(0)), cooldown)
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .append_outside_cooldown(&scan(student, facility, at(30)), cooldown)
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(rows_for(&store, student, facility).await, 1);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn scan_at_cooldown_boundary_is_appended() {
        let store = connect().await;
        let (student, facility) = pair(&store).await;
        let cooldown = chrono::Duration::seconds(60);

        store
            .append_outside_cooldown(&scan(student, facility, at(0)), cooldown)
            .await
            .unwrap();
        let boundary = store
            .append_outside_cooldown(&scan(student, facility, at(60)), cooldown)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(boundary.scanned_at, at(60));
        let latest = store.latest_scan(student, facility).await.unwrap().unwrap();
        assert_eq!(latest.id, boundary.id);
        assert_eq!(rows_for(&store, student, facility).await, 2);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn concurrent_scans_for_one_pair_insert_once() {
        let store = connect().await;
        let (student, facility) = pair(&store).await;
        let cooldown = chrono::Duration::seconds(60);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let record = scan(student, facility, at(0) + chrono::Duration::milliseconds(i));
                tokio::spawn(async move { store.append_outside_cooldown(&record, cooldown).await })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 1);
        assert_eq!(rows_for(&store, student, facility).await, 1);
    }
}
