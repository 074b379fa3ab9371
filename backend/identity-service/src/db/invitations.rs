/// Admin invite persistence
use super::InviteStore;
use crate::error::{IdentityError, Result};
use crate::models::{Invite, InviteFilter, InviteState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const INVITE_COLUMNS: &str = "id, code, role, municipality_code, created_by_user_id, created_at, \
     expires_at, used_at, used_by_user_id, department, department_id";

#[derive(Debug, sqlx::FromRow)]
struct InviteRow {
    id: Uuid,
    code: String,
    role: String,
    municipality_code: String,
    created_by_user_id: Uuid,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    used_by_user_id: Option<Uuid>,
    department: Option<String>,
    department_id: Option<String>,
}

impl TryFrom<InviteRow> for Invite {
    type Error = IdentityError;

    fn try_from(row: InviteRow) -> Result<Self> {
        Ok(Invite {
            id: row.id,
            code: row.code,
            role: row
                .role
                .parse()
                .map_err(|_| IdentityError::Database(format!("unknown role {}", row.role)))?,
            municipality_code: row.municipality_code,
            created_by_user_id: row.created_by_user_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
            used_at: row.used_at,
            used_by_user_id: row.used_by_user_id,
            department: row.department,
            department_id: row.department_id,
        })
    }
}

#[derive(Clone)]
pub struct PgInviteStore {
    pool: PgPool,
}

impl PgInviteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InviteStore for PgInviteStore {
    async fn insert(&self, invite: &Invite) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_invites (
                id, code, role, municipality_code, created_by_user_id,
                created_at, expires_at, department, department_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(invite.id)
        .bind(&invite.code)
        .bind(invite.role.as_str())
        .bind(&invite.municipality_code)
        .bind(invite.created_by_user_id)
        .bind(invite.created_at)
        .bind(invite.expires_at)
        .bind(&invite.department)
        .bind(&invite.department_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Invite>> {
        let row = sqlx::query_as::<_, InviteRow>(&format!(
            "SELECT {INVITE_COLUMNS} FROM admin_invites WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Invite::try_from).transpose()
    }

    async fn mark_used(&self, id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE admin_invites
            SET used_at = $3,
                used_by_user_id = $2
            WHERE id = $1
              AND used_at IS NULL
              AND expires_at > $3
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() > 0)
    }

    async fn release(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE admin_invites
            SET used_at = NULL,
                used_by_user_id = NULL
            WHERE id = $1
              AND used_by_user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() > 0)
    }

    async fn list(&self, filter: &InviteFilter, now: DateTime<Utc>) -> Result<(Vec<Invite>, i64)> {
        // NULL parameters disable their predicate
        const WHERE_CLAUSE: &str = r#"
            WHERE ($1::text IS NULL OR municipality_code = $1)
              AND ($2::text IS NULL OR role = $2)
              AND ($3::uuid IS NULL OR created_by_user_id = $3)
              AND (
                $4::text IS NULL
                OR ($4 = 'USED' AND used_at IS NOT NULL)
                OR ($4 = 'PENDING' AND used_at IS NULL AND expires_at > $5)
                OR ($4 = 'EXPIRED' AND used_at IS NULL AND expires_at <= $5)
              )
        "#;

        let role = filter.role.map(|r| r.as_str());
        let status = filter.status.map(status_label);

        let rows = sqlx::query_as::<_, InviteRow>(&format!(
            "SELECT {INVITE_COLUMNS} FROM admin_invites {WHERE_CLAUSE} \
             ORDER BY created_at DESC LIMIT $6 OFFSET $7"
        ))
        .bind(&filter.municipality_code)
        .bind(role)
        .bind(filter.created_by_user_id)
        .bind(status)
        .bind(now)
        .bind(i64::from(filter.limit()))
        .bind(filter.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM admin_invites {WHERE_CLAUSE}"
        ))
        .bind(&filter.municipality_code)
        .bind(role)
        .bind(filter.created_by_user_id)
        .bind(status)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let invites = rows
            .into_iter()
            .map(Invite::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok((invites, total))
    }

    async fn purge_expired(&self, before: DateTime<Utc>) -> Result<u64> {
        let deleted = sqlx::query(
            "DELETE FROM admin_invites WHERE used_at IS NULL AND expires_at < $1",
        )
        .bind(before)
        .execute(&self.pool)
        .await?;

        Ok(deleted.rows_affected())
    }
}

fn status_label(state: InviteState) -> &'static str {
    match state {
        InviteState::Pending => "PENDING",
        InviteState::Used => "USED",
        InviteState::Expired => "EXPIRED",
    }
}
