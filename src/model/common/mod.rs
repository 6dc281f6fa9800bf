mod role;
mod slug;
mod vote;

pub use role::Role;
pub use slug::slugify;
pub use vote::{VoteDirection, VoteTally};
