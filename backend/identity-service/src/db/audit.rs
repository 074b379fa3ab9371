/// Append-only audit log
use super::AuditSink;
use crate::error::Result;
use crate::models::AuditEntry;
use async_trait::async_trait;
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, action, outcome, actor_user_id, actor_role, entity_type,
                entity_id, municipality_code, metadata, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id)
        .bind(entry.action.as_str())
        .bind(entry.outcome.as_str())
        .bind(entry.actor_user_id)
        .bind(entry.actor_role.map(|role| role.as_str()))
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.municipality_code)
        .bind(&entry.metadata)
        .bind(entry.occurred_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
