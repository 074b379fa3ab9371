/// Fire-and-forget audit trail
///
/// A failed audit write never fails the operation being audited. Failures are logged at
/// warn level with the full entry and counted in `identity_audit_write_failures_total`.
use crate::db::AuditSink;
use crate::metrics;
use crate::models::AuditEntry;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct AuditTrail {
    sink: Arc<dyn AuditSink>,
}

impl AuditTrail {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub async fn emit(&self, entry: AuditEntry) {
        if let Err(e) = self.sink.record(&entry).await {
            warn!(
                error = %e,
                action = entry.action.as_str(),
                entity_id = %entry.entity_id,
                entry = ?entry,
                "Failed to write audit record"
            );
            metrics::record_audit_write_failure(entry.action.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockAuditSink;
    use crate::error::IdentityError;
    use crate::models::{AuditAction, AuditOutcome};

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        let mut sink = MockAuditSink::new();
        sink.expect_record()
            .times(1)
            .returning(|_| Err(IdentityError::Database("disk full".to_string())));

        let trail = AuditTrail::new(Arc::new(sink));
        trail
            .emit(AuditEntry::new(
                AuditAction::MissionRevoked,
                AuditOutcome::Success,
                "mission",
                "m-1",
            ))
            .await;
    }
}
