//! Role to scope resolution and scope-requirement rules
//!
//! Whether a token must carry scopes depends on who is acting:
//!
//! | actor      | role               | scopes    |
//! |------------|--------------------|-----------|
//! | USER       | CITIZEN            | optional  |
//! | USER       | any other          | required  |
//! | ANON       | any                | optional  |
//! | SYSTEM     | -                  | required  |
//! | SHARE_LINK | -                  | required  |
//!
//! Scopes may come from `identity.scopes` or `mission.scopes`. A violation is reported when the
//! token is built, never deferred to validation.

use crate::error::{IdentityError, Result};
use crate::models::{ActorType, Role, Scope, TokenPayload};

/// Static permission matrix used to populate `identity.scopes` for authenticated logins
pub fn scopes_for_role(role: Role) -> Vec<Scope> {
    use Scope::*;

    match role {
        Role::AppAdmin => vec![
            ManageCities,
            ManageAdmins,
            ManageDepartments,
            ManageEvacuations,
            AssignRescuer,
            RespondToSos,
            ViewSos,
            UpdateStatus,
            ViewReports,
        ],
        Role::CityAdmin => vec![
            ManageAdmins,
            ManageDepartments,
            ManageEvacuations,
            AssignRescuer,
            RespondToSos,
            ViewSos,
            UpdateStatus,
            ViewReports,
        ],
        Role::SosAdmin => vec![
            ManageAdmins,
            AssignRescuer,
            RespondToSos,
            ViewSos,
            UpdateStatus,
            SendMessage,
            ViewReports,
        ],
        Role::SkAdmin => vec![ManageEvacuations, ViewSos, ViewReports],
        Role::Rescuer => vec![
            RespondToSos,
            ViewSos,
            UpdateStatus,
            SendLocation,
            SendMessage,
        ],
        Role::Citizen => vec![CreateSos, ViewSos, SendLocation, SendMessage],
        Role::ShareViewer => vec![ViewSos],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRequirement {
    Optional,
    Required,
}

pub fn scope_requirement(actor_type: ActorType, role: Option<Role>) -> ScopeRequirement {
    match (actor_type, role) {
        (ActorType::User, Some(Role::Citizen)) => ScopeRequirement::Optional,
        (ActorType::User, _) => ScopeRequirement::Required,
        (ActorType::Anon, _) => ScopeRequirement::Optional,
        (ActorType::System, _) | (ActorType::ShareLink, _) => ScopeRequirement::Required,
    }
}

/// Reject payloads whose actor/role combination needs scopes but carries none
pub fn ensure_scope_requirement(payload: &TokenPayload) -> Result<()> {
    let role = payload.role();
    if scope_requirement(payload.actor.actor_type, role) == ScopeRequirement::Optional {
        return Ok(());
    }

    if payload.effective_scopes().is_empty() {
        return Err(IdentityError::Validation(format!(
            "{} token for {} requires at least one scope",
            payload.actor.actor_type.as_str(),
            role.map(|r| r.as_str()).unwrap_or("no role"),
        )));
    }

    Ok(())
}

/// Municipality is mandatory for every role below the platform admin
pub fn ensure_city_for_role(role: Role, city_code: Option<&str>) -> Result<()> {
    match city_code {
        Some(code) if !code.trim().is_empty() => Ok(()),
        _ if !role.requires_city() => Ok(()),
        _ => Err(IdentityError::Validation(format!(
            "cityCode is required for role {}",
            role
        ))),
    }
}

/// Mission scopes must be a non-empty subset of the mission permissions
pub fn normalize_mission_permissions(requested: Option<Vec<Scope>>) -> Result<Vec<Scope>> {
    let mut permissions = requested.unwrap_or_else(|| Scope::MISSION_PERMISSIONS.to_vec());

    if let Some(bad) = permissions.iter().find(|scope| !scope.is_mission_permission()) {
        return Err(IdentityError::Validation(format!(
            "{} is not a mission permission",
            bad
        )));
    }

    permissions.sort();
    permissions.dedup();

    if permissions.is_empty() {
        return Err(IdentityError::Validation(
            "mission requires at least one permission".to_string(),
        ));
    }

    Ok(permissions)
}
