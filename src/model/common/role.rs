use std::fmt::{self, Display, Formatter};

use mongodb::bson::Bson;
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Privilege levels, ordered: a higher role satisfies any lower requirement.
#[derive(
    Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum Role {
    /// An ordinary signed-up user.
    Member = 0,
    /// May edit or remove any user content.
    Moderator = 1,
    /// May additionally manage users, categories, claims, and settings.
    Admin = 2,
}

impl Role {
    /// Moderator-equivalent: moderators and admins.
    pub fn is_moderator(self) -> bool {
        self >= Role::Moderator
    }

    pub fn is_admin(self) -> bool {
        self >= Role::Admin
    }
}

impl Display for Role {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Member => "member",
                Self::Moderator => "moderator",
                Self::Admin => "admin",
            }
        )
    }
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        Bson::Int32(role as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_hierarchical() {
        assert!(Role::Admin > Role::Moderator);
        assert!(Role::Moderator > Role::Member);
    }

    #[test]
    fn moderator_equivalence() {
        assert!(!Role::Member.is_moderator());
        assert!(Role::Moderator.is_moderator());
        assert!(Role::Admin.is_moderator());
        assert!(!Role::Moderator.is_admin());
        assert!(Role::Admin.is_admin());
    }
}
