/// Token security primitives for identity-service
///
/// - **issuer**: builds and signs every token context (RS256 via jwt-security)
/// - **validator**: revocation check, then signature and claim validation
/// - **refresh**: refresh-token rotation
/// - **token_revocation**: Redis-backed revocation ledger
/// - **permissions**: role to scope matrix and scope-requirement rules
pub mod issuer;
pub mod permissions;
pub mod refresh;
pub mod token_revocation;
pub mod validator;

pub use issuer::{ShareLinkRequest, SignedToken, TokenIssuer, UserTokenRequest};
pub use refresh::{RefreshCoordinator, RefreshResult};
pub use token_revocation::{RedisRevocationStore, RevocationLedger, RevocationStore};
pub use validator::TokenValidator;
