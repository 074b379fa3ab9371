/// Identity record persistence
use super::IdentityStore;
use crate::error::{IdentityError, Result};
use crate::models::{IdentityRecord, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct IdentityRow {
    id: Uuid,
    external_uid: String,
    role: String,
    municipality_code: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IdentityRow> for IdentityRecord {
    type Error = IdentityError;

    fn try_from(row: IdentityRow) -> Result<Self> {
        Ok(IdentityRecord {
            id: row.id,
            external_uid: row.external_uid,
            role: row
                .role
                .parse()
                .map_err(|_| IdentityError::Database(format!("unknown role {}", row.role)))?,
            municipality_code: row.municipality_code,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_by_external_uid(&self, external_uid: &str) -> Result<Option<IdentityRecord>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT id, external_uid, role, municipality_code, created_at, updated_at
            FROM identity_records
            WHERE external_uid = $1
            "#,
        )
        .bind(external_uid)
        .fetch_optional(&self.pool)
        .await?;

        row.map(IdentityRecord::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<IdentityRecord>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT id, external_uid, role, municipality_code, created_at, updated_at
            FROM identity_records
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(IdentityRecord::try_from).transpose()
    }

    async fn create(&self, record: &IdentityRecord) -> Result<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO identity_records (
                id, external_uid, role, municipality_code, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (external_uid) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(&record.external_uid)
        .bind(record.role.as_str())
        .bind(&record.municipality_code)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(IdentityError::IdentityAlreadyExists);
        }

        Ok(())
    }

    async fn update_role<'a>(
        &self,
        id: Uuid,
        role: Role,
        municipality_code: Option<&'a str>,
    ) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE identity_records
            SET role = $2,
                municipality_code = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(role.as_str())
        .bind(municipality_code)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() > 0)
    }
}
