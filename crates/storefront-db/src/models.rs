//! Row and parameter types that only exist at the storage boundary.
//! Catalog rows map straight onto `storefront_types::models`.

use storefront_types::auth::RoleFlags;
use storefront_types::models::User;

pub struct UserRow {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string.
    pub password: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub is_supplier: bool,
    pub is_customer: bool,
}

impl UserRow {
    pub fn roles(&self) -> RoleFlags {
        RoleFlags {
            is_admin: self.is_admin,
            is_supplier: self.is_supplier,
            is_customer: self.is_customer,
        }
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            is_admin: row.is_admin,
            is_supplier: row.is_supplier,
            is_customer: row.is_customer,
            is_active: row.is_active,
        }
    }
}

pub struct NewUser<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub roles: RoleFlags,
}

/// Column values written on product insert and full update.
pub struct ProductFields<'a> {
    pub name: &'a str,
    pub slug: &'a str,
    pub description: &'a str,
    pub price: i64,
    pub image_url: &'a str,
    pub stock: i64,
    pub category_id: i64,
}
