use serde::{Deserialize, Serialize};

use super::domain::UserId;

/// Closed set of roles supplied by the upstream auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Staff,
    Client,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Client => "client",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "staff" => Some(Role::Staff),
            "client" => Some(Role::Client),
            _ => None,
        }
    }

    pub const fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Staff)
    }
}

/// Identity of the user issuing a command. Trusted as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            role,
        }
    }

    /// System identity used by webhook handlers and background jobs.
    pub fn system() -> Self {
        Self::new("system", Role::Admin)
    }
}

/// Operations gated by the access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ManageGrants,
    ManageClients,
    ManageMatches,
    ManageApplications,
    ManageInvites,
    RegisterUser { target: Role },
    ViewCatalog,
    ViewClient,
    ViewApplication,
    BrowseGrants,
    ManageServiceRequests,
    RequestManagedService,
}

impl Operation {
    pub fn describe(self) -> String {
        match self {
            Operation::ManageGrants => "manage grants".to_string(),
            Operation::ManageClients => "manage clients".to_string(),
            Operation::ManageMatches => "manage matches".to_string(),
            Operation::ManageApplications => "manage applications".to_string(),
            Operation::ManageInvites => "manage invites".to_string(),
            Operation::RegisterUser { target } => format!("register {} users", target.label()),
            Operation::ViewCatalog => "view staff records".to_string(),
            Operation::ViewClient => "view client".to_string(),
            Operation::ViewApplication => "view application".to_string(),
            Operation::BrowseGrants => "browse grants".to_string(),
            Operation::ManageServiceRequests => "manage service requests".to_string(),
            Operation::RequestManagedService => "request managed service".to_string(),
        }
    }
}

/// Relationship between the actor and the organization owning the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    NotApplicable,
    Member,
    NonMember,
}

/// Authorization failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("{} users may not {}", .role.label(), .operation.describe())]
    Role { role: Role, operation: Operation },
    #[error("user does not belong to the organization required to {}", .operation.describe())]
    NotMember { operation: Operation },
    #[error("an active subscription is required to browse the grant database")]
    SubscriptionRequired,
}

/// Single policy table for every gated operation.
///
/// Admins may do anything. Staff may do anything except create other staff or
/// admin accounts. Client users may only read their own organization's records and,
/// with membership, browse grants or ask for managed service.
pub fn authorize(
    actor: &Actor,
    operation: Operation,
    ownership: Ownership,
) -> Result<(), AccessDenied> {
    let role_denied = AccessDenied::Role {
        role: actor.role,
        operation,
    };

    match (actor.role, operation) {
        (Role::Admin, _) => Ok(()),
        (Role::Staff, Operation::RegisterUser { target }) => {
            if target == Role::Client {
                Ok(())
            } else {
                Err(role_denied)
            }
        }
        (Role::Staff, _) => Ok(()),
        (
            Role::Client,
            Operation::ViewClient
            | Operation::ViewApplication
            | Operation::BrowseGrants
            | Operation::RequestManagedService,
        ) => match ownership {
            Ownership::Member => Ok(()),
            Ownership::NonMember | Ownership::NotApplicable => {
                Err(AccessDenied::NotMember { operation })
            }
        },
        (Role::Client, _) => Err(role_denied),
    }
}
