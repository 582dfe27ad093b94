use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Soft-delete state shared by products, reviews and users.
///
/// The only transition is Active -> Inactive. Rows are never hard-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("already inactive")]
    AlreadyInactive,
}

impl Status {
    pub fn from_active(is_active: bool) -> Self {
        if is_active { Self::Active } else { Self::Inactive }
    }

    /// Active -> Inactive. Deactivating an inactive entity is rejected rather
    /// than treated as a no-op.
    pub fn deactivate(self) -> Result<Self, StatusError> {
        match self {
            Self::Active => Ok(Self::Inactive),
            Self::Inactive => Err(StatusError::AlreadyInactive),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub image_url: String,
    pub stock: i64,
    pub category_id: i64,
    pub rating: f64,
    /// Owning supplier. `None` means platform-owned (editable by admins only).
    pub supplier_id: Option<i64>,
    pub is_active: bool,
}

impl Product {
    pub fn status(&self) -> Status {
        Status::from_active(self.is_active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub comment: String,
    pub comment_date: DateTime<Utc>,
    pub grade: i64,
    pub is_active: bool,
}

/// Public view of an account. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_admin: bool,
    pub is_supplier: bool,
    pub is_customer: bool,
    pub is_active: bool,
}
