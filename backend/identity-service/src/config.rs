//! Configuration management for the rescue identity service
//!
//! Loads settings from:
//! 1. Environment variables
//! 2. .env file (local development)
//!
//! Settings are read once at startup and passed by reference into the token issuer, validator
//! and engines; nothing reads the environment mid-request.
//!
//! # Example
//!
//! ```no_run
//! use rescue_identity::config::Settings;
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     println!("JWT issuer: {}", settings.jwt.issuer);
//!     Ok(())
//! }
//! ```

use anyhow::{anyhow, Context, Result};
use jwt_security::{JwtCodec, KeyPair, SigningKeys};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use tracing::info;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub jwt: JwtSettings,
    pub core: CoreSettings,
    pub server: ServerSettings,
}

impl Settings {
    /// Load settings from environment variables (and `.env` in debug builds)
    pub fn load() -> Result<Self> {
        // Load .env file in development
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
            info!("Loaded .env file for development");
        }

        Ok(Settings {
            database: DatabaseSettings::from_env()?,
            redis: RedisSettings::from_env()?,
            jwt: JwtSettings::from_env()?,
            core: CoreSettings::from_env()?,
            server: ServerSettings::from_env()?,
        })
    }
}

/// Settings consumed by the identity core itself
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreSettings {
    pub tokens: TokenTtlSettings,
    pub revocation: RevocationSettings,
    pub invites: InviteSettings,
}

impl CoreSettings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            tokens: TokenTtlSettings::from_env()?,
            revocation: RevocationSettings::from_env()?,
            invites: InviteSettings::from_env()?,
        })
    }
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

impl DatabaseSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 20)?,
            min_connections: parse_env("DATABASE_MIN_CONNECTIONS", 2)?,
            acquire_timeout: parse_env("DATABASE_ACQUIRE_TIMEOUT", 5)?,
        })
    }
}

/// Redis settings (revocation ledger)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    pub url: String,
    pub key_prefix: String,
}

impl RedisSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("REDIS_URL").context("REDIS_URL must be set")?,
            key_prefix: env::var("REDIS_KEY_PREFIX").unwrap_or_else(|_| "rescue".to_string()),
        })
    }
}

/// JWT signing settings
///
/// Access and refresh tokens use separate RSA key pairs so that a leaked refresh key cannot
/// mint access tokens.
#[derive(Clone, Serialize, Deserialize)]
pub struct JwtSettings {
    pub access_private_key: String,
    pub access_public_key: String,
    pub refresh_private_key: String,
    pub refresh_public_key: String,
    pub issuer: String,
    pub audience: String,
}

impl JwtSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            access_private_key: pem_from_env("JWT_ACCESS_PRIVATE_KEY")?,
            access_public_key: pem_from_env("JWT_ACCESS_PUBLIC_KEY")?,
            refresh_private_key: pem_from_env("JWT_REFRESH_PRIVATE_KEY")?,
            refresh_public_key: pem_from_env("JWT_REFRESH_PUBLIC_KEY")?,
            issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "rescue-identity".to_string()),
            audience: env::var("JWT_AUDIENCE").unwrap_or_else(|_| "rescue-platform".to_string()),
        })
    }

    /// Parse both key pairs and build the codec
    pub fn build_codec(&self) -> Result<JwtCodec> {
        let access = KeyPair::from_pem(&self.access_private_key, &self.access_public_key)
            .context("Invalid access token key pair")?;
        let refresh = KeyPair::from_pem(&self.refresh_private_key, &self.refresh_public_key)
            .context("Invalid refresh token key pair")?;
        let keys = SigningKeys::new(access, refresh).context("Invalid JWT key configuration")?;

        Ok(JwtCodec::new(keys, &self.issuer, &self.audience))
    }
}

impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

/// Lifetimes per token kind, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenTtlSettings {
    pub access_secs: i64,
    pub refresh_secs: i64,
    pub anon_citizen_secs: i64,
    pub rescuer_mission_secs: i64,
    /// Upper bound for caller-supplied rescuer token lifetime
    pub rescuer_mission_max_secs: i64,
    pub share_link_secs: i64,
    /// Upper bound for caller-supplied share-link expiry
    pub share_link_max_secs: i64,
}

impl Default for TokenTtlSettings {
    fn default() -> Self {
        Self {
            access_secs: 900,
            refresh_secs: 7 * 24 * 3600,
            anon_citizen_secs: 24 * 3600,
            rescuer_mission_secs: 12 * 3600,
            rescuer_mission_max_secs: 24 * 3600,
            share_link_secs: 24 * 3600,
            share_link_max_secs: 72 * 3600,
        }
    }
}

impl TokenTtlSettings {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let settings = Self {
            access_secs: parse_env("ACCESS_TOKEN_TTL_SECS", defaults.access_secs)?,
            refresh_secs: parse_env("REFRESH_TOKEN_TTL_SECS", defaults.refresh_secs)?,
            anon_citizen_secs: parse_env("ANON_CITIZEN_TTL_SECS", defaults.anon_citizen_secs)?,
            rescuer_mission_secs: parse_env(
                "RESCUER_MISSION_TTL_SECS",
                defaults.rescuer_mission_secs,
            )?,
            rescuer_mission_max_secs: parse_env(
                "RESCUER_MISSION_MAX_TTL_SECS",
                defaults.rescuer_mission_max_secs,
            )?,
            share_link_secs: parse_env("SHARE_LINK_TTL_SECS", defaults.share_link_secs)?,
            share_link_max_secs: parse_env(
                "SHARE_LINK_MAX_TTL_SECS",
                defaults.share_link_max_secs,
            )?,
        };

        let all = [
            settings.access_secs,
            settings.refresh_secs,
            settings.anon_citizen_secs,
            settings.rescuer_mission_secs,
            settings.rescuer_mission_max_secs,
            settings.share_link_secs,
            settings.share_link_max_secs,
        ];
        if all.iter().any(|ttl| *ttl <= 0) {
            return Err(anyhow!("token TTLs must be positive"));
        }
        if settings.rescuer_mission_secs > settings.rescuer_mission_max_secs {
            return Err(anyhow!(
                "RESCUER_MISSION_TTL_SECS must not exceed RESCUER_MISSION_MAX_TTL_SECS"
            ));
        }
        if settings.share_link_secs > settings.share_link_max_secs {
            return Err(anyhow!(
                "SHARE_LINK_TTL_SECS must not exceed SHARE_LINK_MAX_TTL_SECS"
            ));
        }

        Ok(settings)
    }
}

/// Behavior when the revocation ledger cannot be read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationFailurePolicy {
    /// Treat the token as not revoked and keep validating
    #[default]
    FailOpen,
    /// Reject the token
    FailClosed,
}

impl FromStr for RevocationFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail_open" | "open" => Ok(Self::FailOpen),
            "fail_closed" | "closed" => Ok(Self::FailClosed),
            other => Err(anyhow!("unknown revocation failure policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationSettings {
    pub check_enabled: bool,
    pub failure_policy: RevocationFailurePolicy,
    /// TTL for ledger entries whose token carries no `exp`
    pub retention_secs: i64,
}

impl Default for RevocationSettings {
    fn default() -> Self {
        Self {
            check_enabled: true,
            failure_policy: RevocationFailurePolicy::FailOpen,
            retention_secs: 7 * 24 * 3600,
        }
    }
}

impl RevocationSettings {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            check_enabled: parse_env("REVOCATION_CHECK_ENABLED", defaults.check_enabled)?,
            failure_policy: env::var("REVOCATION_FAILURE_POLICY")
                .ok()
                .map(|raw| raw.parse::<RevocationFailurePolicy>())
                .transpose()
                .context("Invalid REVOCATION_FAILURE_POLICY")?
                .unwrap_or(defaults.failure_policy),
            retention_secs: parse_env("REVOCATION_RETENTION_SECS", defaults.retention_secs)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteSettings {
    /// Landing page that receives `/{invite_id}?token=...`
    pub link_base_url: String,
    /// How long unused, expired invites are kept before purge
    pub purge_grace_secs: i64,
}

impl Default for InviteSettings {
    fn default() -> Self {
        Self {
            link_base_url: "http://localhost:3000/admin/invite".to_string(),
            purge_grace_secs: 24 * 3600,
        }
    }
}

impl InviteSettings {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            link_base_url: env::var("INVITE_LINK_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.link_base_url),
            purge_grace_secs: parse_env("INVITE_PURGE_GRACE_SECS", defaults.purge_grace_secs)?,
        })
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Shared secret required on every route except health and metrics
    pub internal_api_key: Option<String>,
}

impl ServerSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env("SERVER_PORT", 8080)?,
            internal_api_key: env::var("INTERNAL_API_KEY").ok().filter(|k| !k.is_empty()),
        })
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}

/// PEM keys are often injected with literal `\n` sequences
fn pem_from_env(name: &str) -> Result<String> {
    let raw = env::var(name).with_context(|| format!("{} must be set", name))?;
    Ok(raw.replace("\\n", "\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jwt_security::test_utils::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_token_ttl_defaults() {
        for name in [
            "ACCESS_TOKEN_TTL_SECS",
            "REFRESH_TOKEN_TTL_SECS",
            "ANON_CITIZEN_TTL_SECS",
            "RESCUER_MISSION_TTL_SECS",
            "RESCUER_MISSION_MAX_TTL_SECS",
            "SHARE_LINK_TTL_SECS",
            "SHARE_LINK_MAX_TTL_SECS",
        ] {
            env::remove_var(name);
        }

        let settings = TokenTtlSettings::from_env().unwrap();

        assert_eq!(settings.access_secs, 900);
        assert_eq!(settings.refresh_secs, 604_800);
        assert_eq!(settings.anon_citizen_secs, 86_400);
        assert_eq!(settings.rescuer_mission_secs, 43_200);
        assert_eq!(settings.rescuer_mission_max_secs, 86_400);
        assert_eq!(settings.share_link_secs, 86_400);
    }

    #[test]
    #[serial]
    fn test_token_ttl_overrides() {
        env::set_var("ACCESS_TOKEN_TTL_SECS", "300");
        env::set_var("REFRESH_TOKEN_TTL_SECS", "3600");

        let settings = TokenTtlSettings::from_env().unwrap();

        assert_eq!(settings.access_secs, 300);
        assert_eq!(settings.refresh_secs, 3600);

        env::remove_var("ACCESS_TOKEN_TTL_SECS");
        env::remove_var("REFRESH_TOKEN_TTL_SECS");
    }

    #[test]
    #[serial]
    fn test_token_ttl_rejects_non_positive() {
        env::set_var("ACCESS_TOKEN_TTL_SECS", "0");
        assert!(TokenTtlSettings::from_env().is_err());

        env::set_var("ACCESS_TOKEN_TTL_SECS", "ten");
        assert!(TokenTtlSettings::from_env().is_err());

        env::remove_var("ACCESS_TOKEN_TTL_SECS");
    }

    #[test]
    #[serial]
    fn test_revocation_settings_from_env() {
        env::remove_var("REVOCATION_CHECK_ENABLED");
        env::remove_var("REVOCATION_FAILURE_POLICY");
        env::remove_var("REVOCATION_RETENTION_SECS");

        let settings = RevocationSettings::from_env().unwrap();
        assert!(settings.check_enabled);
        assert_eq!(settings.failure_policy, RevocationFailurePolicy::FailOpen);
        assert_eq!(settings.retention_secs, 604_800);

        env::set_var("REVOCATION_FAILURE_POLICY", "fail_closed");
        env::set_var("REVOCATION_CHECK_ENABLED", "false");

        let settings = RevocationSettings::from_env().unwrap();
        assert!(!settings.check_enabled);
        assert_eq!(settings.failure_policy, RevocationFailurePolicy::FailClosed);

        env::set_var("REVOCATION_FAILURE_POLICY", "sometimes");
        assert!(RevocationSettings::from_env().is_err());

        env::remove_var("REVOCATION_CHECK_ENABLED");
        env::remove_var("REVOCATION_FAILURE_POLICY");
    }

    #[test]
    #[serial]
    fn test_jwt_settings_from_env() {
        env::set_var(
            "JWT_ACCESS_PRIVATE_KEY",
            TEST_ACCESS_PRIVATE_KEY.replace('\n', "\\n"),
        );
        env::set_var("JWT_ACCESS_PUBLIC_KEY", TEST_ACCESS_PUBLIC_KEY);
        env::set_var("JWT_REFRESH_PRIVATE_KEY", TEST_REFRESH_PRIVATE_KEY);
        env::set_var("JWT_REFRESH_PUBLIC_KEY", TEST_REFRESH_PUBLIC_KEY);
        env::set_var("JWT_ISSUER", "test-issuer");
        env::remove_var("JWT_AUDIENCE");

        let settings = JwtSettings::from_env().unwrap();

        assert_eq!(settings.issuer, "test-issuer");
        assert_eq!(settings.audience, "rescue-platform");
        assert_eq!(settings.access_private_key, TEST_ACCESS_PRIVATE_KEY);

        let codec = settings.build_codec().unwrap();
        assert_eq!(codec.issuer(), "test-issuer");

        for name in [
            "JWT_ACCESS_PRIVATE_KEY",
            "JWT_ACCESS_PUBLIC_KEY",
            "JWT_REFRESH_PRIVATE_KEY",
            "JWT_REFRESH_PUBLIC_KEY",
            "JWT_ISSUER",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_shared_key_material_rejected() {
        let settings = JwtSettings {
            access_private_key: TEST_ACCESS_PRIVATE_KEY.to_string(),
            access_public_key: TEST_ACCESS_PUBLIC_KEY.to_string(),
            refresh_private_key: TEST_ACCESS_PRIVATE_KEY.to_string(),
            refresh_public_key: TEST_ACCESS_PUBLIC_KEY.to_string(),
            issuer: "issuer".to_string(),
            audience: "audience".to_string(),
        };

        assert!(settings.build_codec().is_err());
    }

    #[test]
    #[serial]
    fn test_invite_settings_trim_trailing_slash() {
        env::set_var("INVITE_LINK_BASE_URL", "https://admin.example.ph/invite/");

        let settings = InviteSettings::from_env().unwrap();
        assert_eq!(settings.link_base_url, "https://admin.example.ph/invite");
        assert_eq!(settings.purge_grace_secs, 86_400);

        env::remove_var("INVITE_LINK_BASE_URL");
    }
}
