use crate::error::IdentityError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platform roles, from the top-level platform admin down to share-link viewers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    AppAdmin,
    CityAdmin,
    SosAdmin,
    SkAdmin,
    Rescuer,
    Citizen,
    ShareViewer,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::AppAdmin,
        Role::CityAdmin,
        Role::SosAdmin,
        Role::SkAdmin,
        Role::Rescuer,
        Role::Citizen,
        Role::ShareViewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::AppAdmin => "APP_ADMIN",
            Role::CityAdmin => "CITY_ADMIN",
            Role::SosAdmin => "SOS_ADMIN",
            Role::SkAdmin => "SK_ADMIN",
            Role::Rescuer => "RESCUER",
            Role::Citizen => "CITIZEN",
            Role::ShareViewer => "SHARE_VIEWER",
        }
    }

    pub fn is_platform_admin(&self) -> bool {
        matches!(self, Role::AppAdmin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Role::AppAdmin | Role::CityAdmin | Role::SosAdmin | Role::SkAdmin
        )
    }

    /// Every role except the platform admin is bound to one municipality
    pub fn requires_city(&self) -> bool {
        !self.is_platform_admin()
    }

    /// Roles that can be granted through an invite
    pub fn is_invitable(&self) -> bool {
        matches!(
            self,
            Role::CityAdmin | Role::SosAdmin | Role::SkAdmin | Role::Rescuer
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| IdentityError::Validation(format!("unknown role: {}", s)))
    }
}

/// Named capability carried in `identity.scopes` or `mission.scopes`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    ManageCities,
    ManageAdmins,
    ManageDepartments,
    ManageEvacuations,
    AssignRescuer,
    RespondToSos,
    CreateSos,
    ViewSos,
    UpdateStatus,
    SendLocation,
    SendMessage,
    ViewReports,
    AcceptInvite,
}

impl Scope {
    /// The only capabilities a rescuer mission may carry
    pub const MISSION_PERMISSIONS: [Scope; 4] = [
        Scope::ViewSos,
        Scope::UpdateStatus,
        Scope::SendLocation,
        Scope::SendMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::ManageCities => "manage_cities",
            Scope::ManageAdmins => "manage_admins",
            Scope::ManageDepartments => "manage_departments",
            Scope::ManageEvacuations => "manage_evacuations",
            Scope::AssignRescuer => "assign_rescuer",
            Scope::RespondToSos => "respond_to_sos",
            Scope::CreateSos => "create_sos",
            Scope::ViewSos => "view_sos",
            Scope::UpdateStatus => "update_status",
            Scope::SendLocation => "send_location",
            Scope::SendMessage => "send_message",
            Scope::ViewReports => "view_reports",
            Scope::AcceptInvite => "accept_invite",
        }
    }

    pub fn is_mission_permission(&self) -> bool {
        Scope::MISSION_PERMISSIONS.contains(self)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("SUPER_ADMIN".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_wire_format() {
        let json = serde_json::to_string(&Role::SosAdmin).unwrap();
        assert_eq!(json, "\"SOS_ADMIN\"");
    }

    #[test]
    fn test_only_platform_admin_is_cityless() {
        assert!(!Role::AppAdmin.requires_city());
        assert!(Role::CityAdmin.requires_city());
        assert!(Role::Citizen.requires_city());
    }

    #[test]
    fn test_invitable_roles() {
        let invitable: Vec<Role> = Role::ALL.into_iter().filter(Role::is_invitable).collect();
        assert_eq!(
            invitable,
            vec![Role::CityAdmin, Role::SosAdmin, Role::SkAdmin, Role::Rescuer]
        );
    }

    #[test]
    fn test_scope_wire_format() {
        let json = serde_json::to_string(&Scope::RespondToSos).unwrap();
        assert_eq!(json, "\"respond_to_sos\"");
        assert!(serde_json::from_str::<Scope>("\"launch_missiles\"").is_err());
    }
}
