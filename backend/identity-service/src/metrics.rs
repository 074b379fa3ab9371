/// Prometheus metrics for token issuance and security-relevant degradations
use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

static TOKENS_ISSUED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "identity_tokens_issued_total",
        "Total number of tokens issued",
        &["token_type"]
    )
    .expect("Failed to register tokens issued metric")
});

static VALIDATION_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "identity_token_validation_failures_total",
        "Total number of failed token validations",
        &["reason"]
    )
    .expect("Failed to register validation failures metric")
});

static REVOCATION_FAIL_OPEN: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "identity_revocation_check_fail_open_total",
        "Validations that proceeded because the revocation ledger was unreadable",
        &["token_use"]
    )
    .expect("Failed to register revocation fail-open metric")
});

static REFRESH_REVOCATION_SKIPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "identity_refresh_revocation_skipped_total",
        "Refresh rotations whose old token could not be revoked",
        &["reason"]
    )
    .expect("Failed to register refresh revocation skipped metric")
});

static AUDIT_WRITE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "identity_audit_write_failures_total",
        "Audit records that could not be written",
        &["action"]
    )
    .expect("Failed to register audit write failures metric")
});

pub fn record_token_issued(token_type: &str) {
    TOKENS_ISSUED.with_label_values(&[token_type]).inc();
}

pub fn record_validation_failure(reason: &str) {
    VALIDATION_FAILURES.with_label_values(&[reason]).inc();
}

pub fn record_revocation_fail_open(token_use: &str) {
    REVOCATION_FAIL_OPEN.with_label_values(&[token_use]).inc();
}

/// `reason` must be low-cardinality
pub fn record_refresh_revocation_skipped(reason: &str) {
    REFRESH_REVOCATION_SKIPPED.with_label_values(&[reason]).inc();
}

pub fn record_audit_write_failure(action: &str) {
    AUDIT_WRITE_FAILURES.with_label_values(&[action]).inc();
}

/// Current value, for assertions in tests
pub fn refresh_revocation_skipped_count(reason: &str) -> u64 {
    REFRESH_REVOCATION_SKIPPED.with_label_values(&[reason]).get()
}

pub fn revocation_fail_open_count(token_use: &str) -> u64 {
    REVOCATION_FAIL_OPEN.with_label_values(&[token_use]).get()
}

/// Render the default registry in the Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
