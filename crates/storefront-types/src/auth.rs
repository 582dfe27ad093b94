use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// Signed token payload. Field names are part of the wire contract with
/// existing clients and must not be renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub id: i64,
    pub is_admin: bool,
    pub is_supplier: bool,
    pub is_customer: bool,
    /// Absolute expiry, whole seconds since the Unix epoch (UTC).
    pub exp: i64,
}

// -- Roles --

/// The three independent role flags. Any combination is valid, including
/// none at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleFlags {
    pub is_admin: bool,
    pub is_supplier: bool,
    pub is_customer: bool,
}

impl RoleFlags {
    pub const CUSTOMER: Self = Self {
        is_admin: false,
        is_supplier: false,
        is_customer: true,
    };

    /// True if at least one role is held.
    pub fn any(&self) -> bool {
        self.is_admin || self.is_supplier || self.is_customer
    }
}

// -- Principal --

/// The authenticated caller of the current request, decoded from a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub user_id: i64,
    #[serde(flatten)]
    pub roles: RoleFlags,
}

impl Principal {
    pub fn new(username: impl Into<String>, user_id: i64, roles: RoleFlags) -> Self {
        Self {
            username: username.into(),
            user_id,
            roles,
        }
    }
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            username: claims.sub,
            user_id: claims.id,
            roles: RoleFlags {
                is_admin: claims.is_admin,
                is_supplier: claims.is_supplier,
                is_customer: claims.is_customer,
            },
        }
    }
}
