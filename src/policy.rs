//! Authorization rules, expressed as pure functions of the acting identity and
//! the ownership facts of the target entity. Services load the entity, then ask
//! here; nothing in this module touches storage.

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Role,
};

pub fn can_create_product(actor: &AuthUser) -> AppResult<()> {
    match actor.role {
        Role::Admin | Role::Seller => Ok(()),
        Role::Customer => Err(AppError::Forbidden),
    }
}

/// Decide which seller owns a new listing, or refuse the creation.
///
/// Sellers may only list for themselves and default to owning the listing.
/// Admins may list on behalf of a seller or author an unowned listing.
pub fn listing_owner_for_create(
    actor: &AuthUser,
    requested_seller: Option<Uuid>,
) -> AppResult<Option<Uuid>> {
    can_create_product(actor)?;
    match (actor.role, requested_seller) {
        (Role::Admin, requested) => Ok(requested),
        (_, Some(seller_id)) if seller_id != actor.user_id => Err(AppError::Forbidden),
        _ => Ok(Some(actor.user_id)),
    }
}

/// Update and delete share the same rule: admins always, sellers only on their own listings.
pub fn can_modify_product(actor: &AuthUser, seller_id: Option<Uuid>) -> AppResult<()> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Seller if seller_id == Some(actor.user_id) => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}

pub fn can_view_seller_listing(actor: &AuthUser, seller_id: Uuid) -> AppResult<()> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Seller if seller_id == actor.user_id => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}

fn owner_or_admin(actor: &AuthUser, owner_id: Uuid) -> AppResult<()> {
    if actor.user_id == owner_id || actor.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

pub fn can_view_order(actor: &AuthUser, owner_id: Uuid) -> AppResult<()> {
    owner_or_admin(actor, owner_id)
}

/// Only the owner composes an order; admins manage status, not contents.
pub fn can_modify_order(actor: &AuthUser, owner_id: Uuid) -> AppResult<()> {
    if actor.user_id == owner_id {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

pub fn can_change_order_status(actor: &AuthUser) -> AppResult<()> {
    ensure_admin(actor)
}

pub fn can_decide_application(actor: &AuthUser) -> AppResult<()> {
    ensure_admin(actor)
}

pub fn can_moderate_catalog(actor: &AuthUser) -> AppResult<()> {
    ensure_admin(actor)
}

pub fn can_delete_review(actor: &AuthUser, author_id: Uuid) -> AppResult<()> {
    owner_or_admin(actor, author_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role) -> AuthUser {
        AuthUser::new(Uuid::new_v4(), role)
    }

    #[test]
    fn customers_cannot_create_listings() {
        let customer = actor(Role::Customer);
        assert!(can_create_product(&customer).is_err());
        assert!(can_create_product(&actor(Role::Seller)).is_ok());
        assert!(matches!(
            listing_owner_for_create(&customer, None),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn seller_listing_defaults_to_self_and_rejects_foreign_owner() {
        let seller = actor(Role::Seller);
        assert_eq!(
            listing_owner_for_create(&seller, None).unwrap(),
            Some(seller.user_id)
        );
        assert_eq!(
            listing_owner_for_create(&seller, Some(seller.user_id)).unwrap(),
            Some(seller.user_id)
        );
        assert!(matches!(
            listing_owner_for_create(&seller, Some(Uuid::new_v4())),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn admin_listing_keeps_requested_owner() {
        let admin = actor(Role::Admin);
        let seller_id = Uuid::new_v4();
        assert_eq!(listing_owner_for_create(&admin, None).unwrap(), None);
        assert_eq!(
            listing_owner_for_create(&admin, Some(seller_id)).unwrap(),
            Some(seller_id)
        );
    }

    #[test]
    fn product_modification_requires_matching_seller_or_admin() {
        let seller = actor(Role::Seller);
        let other = actor(Role::Seller);
        let admin = actor(Role::Admin);
        let customer = actor(Role::Customer);

        assert!(can_modify_product(&seller, Some(seller.user_id)).is_ok());
        assert!(can_modify_product(&other, Some(seller.user_id)).is_err());
        assert!(can_modify_product(&seller, None).is_err());
        assert!(can_modify_product(&admin, Some(seller.user_id)).is_ok());
        assert!(can_modify_product(&admin, None).is_ok());
        assert!(can_modify_product(&customer, Some(customer.user_id)).is_err());
    }

    #[test]
    fn seller_listing_view_is_scoped() {
        let seller = actor(Role::Seller);
        assert!(can_view_seller_listing(&seller, seller.user_id).is_ok());
        assert!(can_view_seller_listing(&seller, Uuid::new_v4()).is_err());
        assert!(can_view_seller_listing(&actor(Role::Admin), seller.user_id).is_ok());
        assert!(can_view_seller_listing(&actor(Role::Customer), seller.user_id).is_err());
    }

    #[test]
    fn order_rules_split_view_and_modify() {
        let owner = actor(Role::Customer);
        let admin = actor(Role::Admin);
        let stranger = actor(Role::Seller);

        assert!(can_view_order(&owner, owner.user_id).is_ok());
        assert!(can_view_order(&admin, owner.user_id).is_ok());
        assert!(can_view_order(&stranger, owner.user_id).is_err());

        assert!(can_modify_order(&owner, owner.user_id).is_ok());
        assert!(can_modify_order(&admin, owner.user_id).is_err());

        assert!(can_change_order_status(&admin).is_ok());
        assert!(can_change_order_status(&owner).is_err());
    }

    #[test]
    fn admin_only_decisions() {
        assert!(can_decide_application(&actor(Role::Admin)).is_ok());
        assert!(can_decide_application(&actor(Role::Seller)).is_err());
        assert!(can_moderate_catalog(&actor(Role::Customer)).is_err());
    }

    #[test]
    fn reviews_are_deleted_by_author_or_admin() {
        let author = actor(Role::Customer);
        assert!(can_delete_review(&author, author.user_id).is_ok());
        assert!(can_delete_review(&actor(Role::Admin), author.user_id).is_ok());
        assert!(can_delete_review(&actor(Role::Customer), author.user_id).is_err());
    }
}
