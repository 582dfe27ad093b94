//! Who may mutate what.
//!
//! Every check here is a pure function of the caller's role flags and, where
//! relevant, the resource's owner. No IO. A denial never says which rule failed.

use thiserror::Error;

use storefront_types::auth::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("forbidden")]
pub struct Forbidden;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductAction {
    Create,
    Update,
    Delete,
}

/// Owner-or-admin rule for products.
///
/// `supplier_id` is the product's current owner and is ignored for `Create`.
/// A platform-owned product (`None`) can only be changed by an admin.
pub fn authorize_product(
    principal: &Principal,
    action: ProductAction,
    supplier_id: Option<i64>,
) -> Result<(), Forbidden> {
    let roles = principal.roles;
    let allowed = match action {
        ProductAction::Create => roles.is_admin || roles.is_supplier,
        ProductAction::Update | ProductAction::Delete => {
            roles.is_admin || (roles.is_supplier && supplier_id == Some(principal.user_id))
        }
    };

    if allowed { Ok(()) } else { Err(Forbidden) }
}

/// Any authenticated role may post a review.
pub fn authorize_review_create(principal: &Principal) -> Result<(), Forbidden> {
    if principal.roles.any() { Ok(()) } else { Err(Forbidden) }
}

/// Bulk review deactivation is admin-only, whoever owns the product.
pub fn authorize_review_purge(principal: &Principal) -> Result<(), Forbidden> {
    require_admin(principal)
}

pub fn require_admin(principal: &Principal) -> Result<(), Forbidden> {
    if principal.roles.is_admin { Ok(()) } else { Err(Forbidden) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_types::auth::RoleFlags;

    const USER_ID: i64 = 7;

    fn all_role_combinations() -> Vec<RoleFlags> {
        let mut out = Vec::new();
        for is_admin in [false, true] {
            for is_supplier in [false, true] {
                for is_customer in [false, true] {
                    out.push(RoleFlags {
                        is_admin,
                        is_supplier,
                        is_customer,
                    });
                }
            }
        }
        out
    }

    #[test]
    fn product_truth_table() {
        for roles in all_role_combinations() {
            let principal = Principal::new("u", USER_ID, roles);
            for owner in [Some(USER_ID), Some(USER_ID + 2), None] {
                for action in [ProductAction::Create, ProductAction::Update, ProductAction::Delete] {
                    let expected = match action {
                        ProductAction::Create => roles.is_admin || roles.is_supplier,
                        _ => roles.is_admin || (roles.is_supplier && owner == Some(USER_ID)),
                    };
                    assert_eq!(
                        authorize_product(&principal, action, owner).is_ok(),
                        expected,
                        "roles={roles:?} owner={owner:?} action={action:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn supplier_must_own_the_product() {
        let supplier = Principal::new(
            "s",
            7,
            RoleFlags {
                is_admin: false,
                is_supplier: true,
                is_customer: false,
            },
        );

        assert_eq!(authorize_product(&supplier, ProductAction::Update, Some(9)), Err(Forbidden));
        assert_eq!(authorize_product(&supplier, ProductAction::Delete, Some(9)), Err(Forbidden));
        assert_eq!(authorize_product(&supplier, ProductAction::Update, Some(7)), Ok(()));
        assert_eq!(authorize_product(&supplier, ProductAction::Delete, None), Err(Forbidden));
    }

    #[test]
    fn admin_ignores_ownership() {
        let admin = Principal::new(
            "a",
            1,
            RoleFlags {
                is_admin: true,
                is_supplier: false,
                is_customer: false,
            },
        );

        for owner in [Some(1), Some(2), None] {
            assert!(authorize_product(&admin, ProductAction::Update, owner).is_ok());
            assert!(authorize_product(&admin, ProductAction::Delete, owner).is_ok());
        }
    }

    #[test]
    fn review_creation_needs_any_role() {
        for roles in all_role_combinations() {
            let principal = Principal::new("u", USER_ID, roles);
            assert_eq!(authorize_review_create(&principal).is_ok(), roles.any());
        }
    }

    #[test]
    fn review_purge_is_admin_only() {
        for roles in all_role_combinations() {
            let principal = Principal::new("u", USER_ID, roles);
            assert_eq!(authorize_review_purge(&principal).is_ok(), roles.is_admin);
        }
    }
}
