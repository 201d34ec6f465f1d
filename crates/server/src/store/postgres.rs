use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use idemgate_common::time::duration_ms;
use idemgate_common::{Fingerprint, IdempotencyKey, Scope};

use super::fingerprint_store::{
    decide_begin, decide_transition, BeginDecision, BeginOutcome, BeginRequest, FingerprintStore,
    StoreError, Transition,
};
use super::record::{IdempotencyRecord, RecordKey, RecordState, ResponseSnapshot};

const SELECT_COLUMNS: &str = "scope, key, fingerprint, state, lease, response_status, \
     response_headers, response_body, created_at_ms, started_at_ms, completed_at_ms, expires_at_ms";

#[derive(Clone)]
pub struct PgFingerprintStore {
    pool: PgPool,
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::Corrupt(e.to_string())
            }
            other => Self::Unavailable(other.to_string()),
        }
    }
}

impl PgFingerprintStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn lock_record(
        tx: &mut Transaction<'_, Postgres>,
        key: &RecordKey,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM idempotency_records \
             WHERE scope = $1 AND key = $2 FOR UPDATE"
        );
        let row = sqlx::query(&sql)
            .bind(key.scope.as_str())
            .bind(key.key.as_str())
            .fetch_optional(&mut **tx)
            .await?;
        row.map(|r| record_from_row(&r)).transpose()
    }

    async fn transition(
        &self,
        key: &RecordKey,
        lease: Uuid,
        state: RecordState,
        response: &ResponseSnapshot,
        now_ms: i64,
    ) -> Result<Transition, StoreError> {
        let mut tx = self.pool.begin().await?;
        let existing = Self::lock_record(&mut tx, key).await?;
        let transition = decide_transition(existing.as_ref(), lease);
        if transition == Transition::Applied {
            let headers = serde_json::to_value(&response.headers)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            sqlx::query(
                r#"UPDATE idempotency_records
                   SET state = $3, response_status = $4, response_headers = $5,
                       response_body = $6, completed_at_ms = $7
                   WHERE scope = $1 AND key = $2"#,
            )
            .bind(key.scope.as_str())
            .bind(key.key.as_str())
            .bind(state.as_str())
            .bind(i32::from(response.status_code))
            .bind(&headers)
            .bind(&response.body)
            .bind(now_ms)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(transition)
    }
}

#[async_trait]
impl FingerprintStore for PgFingerprintStore {
    async fn begin(&self, request: &BeginRequest) -> Result<BeginOutcome, StoreError> {
        let key = &request.key;
        let lease = Uuid::new_v4();
        let expires_at_ms = request.now_ms.saturating_add(duration_ms(request.ttl));

        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            r#"INSERT INTO idempotency_records
               (scope, key, fingerprint, state, lease, created_at_ms, started_at_ms, expires_at_ms)
               VALUES ($1, $2, $3, 'PENDING', $4, $5, $5, $6)
               ON CONFLICT (scope, key) DO NOTHING"#,
        )
        .bind(key.scope.as_str())
        .bind(key.key.as_str())
        .bind(request.fingerprint.as_str())
        .bind(lease)
        .bind(request.now_ms)
        .bind(expires_at_ms)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 1 {
            tx.commit().await?;
            return Ok(BeginOutcome::Began {
                lease,
                reclaimed: false,
            });
        }

        let existing = Self::lock_record(&mut tx, key).await?;
        let outcome = match decide_begin(existing.as_ref(), request) {
            BeginDecision::Insert => {
                sqlx::query(
                    r#"UPDATE idempotency_records
                       SET fingerprint = $3, state = 'PENDING', lease = $4,
                           response_status = NULL, response_headers = NULL, response_body = NULL,
                           created_at_ms = $5, started_at_ms = $5, completed_at_ms = NULL,
                           expires_at_ms = $6
                       WHERE scope = $1 AND key = $2"#,
                )
                .bind(key.scope.as_str())
                .bind(key.key.as_str())
                .bind(request.fingerprint.as_str())
                .bind(lease)
                .bind(request.now_ms)
                .bind(expires_at_ms)
                .execute(&mut *tx)
                .await?;
                BeginOutcome::Began {
                    lease,
                    reclaimed: false,
                }
            }
            BeginDecision::Reclaim => {
                sqlx::query(
                    r#"UPDATE idempotency_records SET lease = $3, started_at_ms = $4
                       WHERE scope = $1 AND key = $2"#,
                )
                .bind(key.scope.as_str())
                .bind(key.key.as_str())
                .bind(lease)
                .bind(request.now_ms)
                .execute(&mut *tx)
                .await?;
                BeginOutcome::Began {
                    lease,
                    reclaimed: true,
                }
            }
            BeginDecision::Existing(outcome) => outcome,
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn complete(
        &self,
        key: &RecordKey,
        lease: Uuid,
        response: &ResponseSnapshot,
        now_ms: i64,
    ) -> Result<Transition, StoreError> {
        self.transition(key, lease, RecordState::Completed, response, now_ms)
            .await
    }

    async fn fail(
        &self,
        key: &RecordKey,
        lease: Uuid,
        response: &ResponseSnapshot,
        now_ms: i64,
    ) -> Result<Transition, StoreError> {
        self.transition(key, lease, RecordState::Failed, response, now_ms)
            .await
    }

    async fn get(
        &self,
        key: &RecordKey,
        now_ms: i64,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM idempotency_records \
             WHERE scope = $1 AND key = $2 AND expires_at_ms > $3"
        );
        let row = sqlx::query(&sql)
            .bind(key.scope.as_str())
            .bind(key.key.as_str())
            .bind(now_ms)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| record_from_row(&r)).transpose()
    }

    async fn sweep_expired(&self, now_ms: i64, keep: &[RecordKey]) -> Result<u64, StoreError> {
        let keep_scopes: Vec<&str> = keep.iter().map(|k| k.scope.as_str()).collect();
        let keep_keys: Vec<&str> = keep.iter().map(|k| k.key.as_str()).collect();
        let purged = sqlx::query(
            r#"DELETE FROM idempotency_records r
               WHERE r.expires_at_ms <= $1
                 AND NOT EXISTS (
                     SELECT 1 FROM UNNEST($2::text[], $3::text[]) AS k(scope, key)
                     WHERE k.scope = r.scope AND k.key = r.key
                 )"#,
        )
        .bind(now_ms)
        .bind(&keep_scopes)
        .bind(&keep_keys)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(purged)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn record_from_row(row: &PgRow) -> Result<IdempotencyRecord, StoreError> {
    let key: String = row.try_get("key")?;
    let key = IdempotencyKey::parse(&key).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let state: String = row.try_get("state")?;
    let state = RecordState::parse(&state)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown state {state:?}")))?;

    let status: Option<i32> = row.try_get("response_status")?;
    let response = match status {
        Some(status) => {
            let status_code = u16::try_from(status)
                .map_err(|_| StoreError::Corrupt(format!("status {status} out of range")))?;
            let headers: Option<serde_json::Value> = row.try_get("response_headers")?;
            let headers: Vec<(String, String)> = match headers {
                Some(v) => {
                    serde_json::from_value(v).map_err(|e| StoreError::Corrupt(e.to_string()))?
                }
                None => Vec::new(),
            };
            let body: Option<Vec<u8>> = row.try_get("response_body")?;
            Some(ResponseSnapshot {
                status_code,
                headers,
                body: body.unwrap_or_default(),
            })
        }
        None => None,
    };

    Ok(IdempotencyRecord {
        scope: Scope::from_stored(row.try_get("scope")?),
        key,
        fingerprint: Fingerprint::from_stored(row.try_get("fingerprint")?),
        state,
        response,
        lease: row.try_get("lease")?,
        created_at_ms: row.try_get("created_at_ms")?,
        started_at_ms: row.try_get("started_at_ms")?,
        completed_at_ms: row.try_get("completed_at_ms")?,
        expires_at_ms: row.try_get("expires_at_ms")?,
    })
}
