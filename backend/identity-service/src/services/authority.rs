//! Creation-authority hierarchy
//!
//! | creator    | may provision                               | where              |
//! |------------|---------------------------------------------|--------------------|
//! | APP_ADMIN  | CITY_ADMIN, SOS_ADMIN, SK_ADMIN, RESCUER    | any municipality   |
//! | CITY_ADMIN | SOS_ADMIN, SK_ADMIN, RESCUER                | own municipality   |
//! | SOS_ADMIN  | RESCUER                                     | own municipality   |
//! | others     | nothing                                     |                    |

use crate::error::{IdentityError, Result};
use crate::models::{InviteFilter, Principal, Role};

pub fn provisionable_roles(creator: Role) -> &'static [Role] {
    match creator {
        Role::AppAdmin => &[Role::CityAdmin, Role::SosAdmin, Role::SkAdmin, Role::Rescuer],
        Role::CityAdmin => &[Role::SosAdmin, Role::SkAdmin, Role::Rescuer],
        Role::SosAdmin => &[Role::Rescuer],
        _ => &[],
    }
}

pub fn can_provision(creator: &Principal, target: Role, municipality_code: &str) -> bool {
    provisionable_roles(creator.role).contains(&target)
        && (creator.role.is_platform_admin() || creator.in_city(municipality_code))
}

pub fn ensure_can_provision(
    creator: &Principal,
    target: Role,
    municipality_code: &str,
) -> Result<()> {
    if !provisionable_roles(creator.role).contains(&target) {
        return Err(IdentityError::Forbidden(format!(
            "{} cannot create {} invites",
            creator.role, target
        )));
    }

    if !creator.role.is_platform_admin() && !creator.in_city(municipality_code) {
        return Err(IdentityError::Forbidden(format!(
            "{} may only invite within its own municipality",
            creator.role
        )));
    }

    Ok(())
}

/// Missions are created and revoked by CITY_ADMIN or SOS_ADMIN in their own municipality
pub fn ensure_can_manage_missions(principal: &Principal, municipality_code: &str) -> Result<()> {
    if !matches!(principal.role, Role::CityAdmin | Role::SosAdmin) {
        return Err(IdentityError::Forbidden(format!(
            "{} cannot manage rescuer missions",
            principal.role
        )));
    }

    if !principal.in_city(municipality_code) {
        return Err(IdentityError::Forbidden(
            "missions are limited to the caller's municipality".to_string(),
        ));
    }

    Ok(())
}

/// Pin a listing to what the requester may see
///
/// Platform admins see everything; other admins only their own municipality. An explicit
/// filter on a foreign municipality is rejected rather than silently rewritten.
pub fn scope_invite_filter(requester: &Principal, mut filter: InviteFilter) -> Result<InviteFilter> {
    if !requester.role.is_admin() {
        return Err(IdentityError::Forbidden(format!(
            "{} cannot list invites",
            requester.role
        )));
    }

    if requester.role.is_platform_admin() {
        return Ok(filter);
    }

    let own = requester.city_code.clone().ok_or_else(|| {
        IdentityError::Forbidden("caller has no municipality".to_string())
    })?;

    match &filter.municipality_code {
        Some(requested) if requested != &own => Err(IdentityError::Forbidden(
            "cannot list invites of another municipality".to_string(),
        )),
        _ => {
            filter.municipality_code = Some(own);
            Ok(filter)
        }
    }
}
