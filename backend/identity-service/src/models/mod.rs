/// Data models for identity and authorization
pub mod audit;
pub mod claims;
pub mod invite;
pub mod mission;
pub mod role;
pub mod token_revocation;
pub mod user;

pub use audit::{AuditAction, AuditEntry, AuditOutcome};
pub use claims::{
    ActorContext, ActorType, IdentityClaims, MissionContext, Principal, ShareAssignment,
    TokenPayload, TokenResponse, TokenType, ValidationFailure, ValidationResult, UNKNOWN_CITY,
};
pub use invite::{
    CreateInviteRequest, Invite, InviteFilter, InviteReceipt, InviteRejection, InviteState,
    InviteStatus, InviteSummary, Page, RoleGrantReceipt,
};
pub use mission::{CreateMissionRequest, MissionClaims, MissionToken, RescuerMission};
pub use role::{Role, Scope};
pub use token_revocation::{RevocationOutcome, RevokedToken};
pub use user::IdentityRecord;
