//! Access-control predicates.
//!
//! Pure functions over the caller's identity/role and the target record's
//! ownership. Callers pass these in explicitly; nothing here reads ambient
//! state, so every rule is testable in isolation.

use crate::model::{common::Role, mongodb::Id};

/// May the caller modify or delete a record owned by `owner_id`?
/// Owners may touch their own records; moderator-equivalent roles may touch
/// anyone's.
pub fn owner_or_moderator(caller_id: Id, caller_role: Role, owner_id: Id) -> bool {
    caller_id == owner_id || caller_role.is_moderator()
}

/// Like [`owner_or_moderator`], but for records that may be unowned
/// (e.g. an unclaimed business): only moderators may touch those.
pub fn maybe_owner_or_moderator(caller_id: Id, caller_role: Role, owner_id: Option<Id>) -> bool {
    owner_id.map_or(caller_role.is_moderator(), |owner| {
        owner_or_moderator(caller_id, caller_role, owner)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_may_modify_own_record() {
        let alice = Id::new();
        assert!(owner_or_moderator(alice, Role::Member, alice));
    }

    #[test]
    fn stranger_may_not_modify() {
        let alice = Id::new();
        let bob = Id::new();
        assert!(!owner_or_moderator(bob, Role::Member, alice));
    }

    #[test]
    fn moderator_equivalents_may_modify_anything() {
        let alice = Id::new();
        let staff = Id::new();
        assert!(owner_or_moderator(staff, Role::Moderator, alice));
        assert!(owner_or_moderator(staff, Role::Admin, alice));
    }

    #[test]
    fn unowned_records_are_moderator_only() {
        let bob = Id::new();
        assert!(!maybe_owner_or_moderator(bob, Role::Member, None));
        assert!(maybe_owner_or_moderator(bob, Role::Moderator, None));
        assert!(maybe_owner_or_moderator(bob, Role::Member, Some(bob)));
    }
}
