/// Rescuer mission persistence
use super::MissionStore;
use crate::error::{IdentityError, Result};
use crate::models::{RescuerMission, Scope};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct MissionRow {
    id: Uuid,
    sos_id: String,
    municipality_code: String,
    token: String,
    expires_at: DateTime<Utc>,
    permissions: Json<Vec<Scope>>,
    created_by_user_id: Uuid,
    created_by_role: String,
    created_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl TryFrom<MissionRow> for RescuerMission {
    type Error = IdentityError;

    fn try_from(row: MissionRow) -> Result<Self> {
        Ok(RescuerMission {
            id: row.id,
            sos_id: row.sos_id,
            municipality_code: row.municipality_code,
            token: row.token,
            expires_at: row.expires_at,
            permissions: row.permissions.0,
            created_by_user_id: row.created_by_user_id,
            created_by_role: row.created_by_role.parse().map_err(|_| {
                IdentityError::Database(format!("unknown role {}", row.created_by_role))
            })?,
            created_at: row.created_at,
            revoked_at: row.revoked_at,
        })
    }
}

#[derive(Clone)]
pub struct PgMissionStore {
    pool: PgPool,
}

impl PgMissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MissionStore for PgMissionStore {
    async fn insert(&self, mission: &RescuerMission) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rescuer_missions (
                id, sos_id, municipality_code, token, expires_at, permissions,
                created_by_user_id, created_by_role, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(mission.id)
        .bind(&mission.sos_id)
        .bind(&mission.municipality_code)
        .bind(&mission.token)
        .bind(mission.expires_at)
        .bind(Json(&mission.permissions))
        .bind(mission.created_by_user_id)
        .bind(mission.created_by_role.as_str())
        .bind(mission.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<RescuerMission>> {
        let row = sqlx::query_as::<_, MissionRow>(
            r#"
            SELECT id, sos_id, municipality_code, token, expires_at, permissions,
                   created_by_user_id, created_by_role, created_at, revoked_at
            FROM rescuer_missions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RescuerMission::try_from).transpose()
    }

    async fn revoke(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE rescuer_missions SET revoked_at = $2 WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() > 0)
    }

    async fn revoke_by_sos(
        &self,
        sos_id: &str,
        municipality_code: &str,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let updated = sqlx::query(
            r#"
            UPDATE rescuer_missions
            SET revoked_at = $3
            WHERE sos_id = $1
              AND municipality_code = $2
              AND revoked_at IS NULL
            "#,
        )
        .bind(sos_id)
        .bind(municipality_code)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected())
    }
}
