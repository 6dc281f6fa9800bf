mod bson;
mod collection;
mod transaction;

pub use bson::Id;
pub use collection::{ensure_indexes_exist, is_duplicate_key, Coll, MongoCollection};
pub use transaction::{commit_with_retry, is_transient, Commit, MAX_TRANSACTION_ATTEMPTS};

pub(crate) use transaction::in_transaction;
