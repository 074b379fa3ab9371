/// Service layer for identity-service
///
/// - Authority hierarchy for provisioning and mission management
/// - Invite lifecycle (create, validate, accept, list, purge)
/// - Rescuer missions (create, verify, revoke)
/// - Fire-and-forget audit trail
pub mod audit;
pub mod authority;
pub mod invites;
pub mod missions;

pub use audit::AuditTrail;
pub use invites::InviteService;
pub use missions::MissionService;
