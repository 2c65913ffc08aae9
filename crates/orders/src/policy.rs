//! Who may see and change an order.
//!
//! Owners see and edit their own orders and may cancel them while pending.
//! Administrators may do anything, including status changes and purges.

use freshly_auth::{AuthzError, Principal, ensure_admin, ensure_owner_or_admin};
use freshly_core::UserId;

use crate::{Order, OrderPatch};

pub fn ensure_can_view(principal: &Principal, order: &Order) -> Result<(), AuthzError> {
    ensure_owner_or_admin(principal, order.user_id, "access this order")
}

/// Admins may cancel any order; owners only while it is still pending.
pub fn ensure_can_cancel(principal: &Principal, order: &Order) -> Result<(), AuthzError> {
    if principal.is_admin() || (principal.owns(order.user_id) && order.is_pending()) {
        return Ok(());
    }
    tracing::debug!(
        user_id = %principal.user_id(),
        order_id = %order.id,
        status = %order.status,
        "cancel denied"
    );
    Err(AuthzError::forbidden("not authorized to cancel this order"))
}

pub fn ensure_can_update(
    principal: &Principal,
    order: &Order,
    patch: &OrderPatch,
) -> Result<(), AuthzError> {
    ensure_owner_or_admin(principal, order.user_id, "modify this order")?;
    if patch.sets_status() && !principal.is_admin() {
        return Err(AuthzError::forbidden("only administrators can change order status"));
    }
    Ok(())
}

pub fn ensure_can_purge(principal: &Principal) -> Result<(), AuthzError> {
    ensure_admin(principal, "purge orders")
}

/// `None` lists every order; `Some(user)` restricts the listing to one owner.
pub fn list_scope(principal: &Principal) -> Option<UserId> {
    if principal.is_admin() {
        None
    } else {
        Some(principal.user_id())
    }
}
