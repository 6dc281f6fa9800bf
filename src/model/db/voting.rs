use mongodb::Client;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::model::{
    common::{VoteDirection, VoteTally},
    mongodb::{in_transaction, Coll, Id, MongoCollection},
};

/// A record that carries a vote tally: questions and answers.
pub trait Voteable: MongoCollection + DeserializeOwned + Unpin + Send + Sync {
    /// Human-readable record kind for error messages.
    const KIND: &'static str;

    fn tally(&self) -> &VoteTally;
}

/// Toggle one user's vote on the target record.
///
/// Runs as an optimistic transaction: the tally is recomputed from a snapshot
/// of the membership sets and all four fields are written back together, so
/// two users voting on the same target at once both land. Fails with
/// `NotFound` if the target was deleted concurrently; callers may treat that
/// as ignorable.
pub async fn cast_vote<T: Voteable>(
    client: &Client,
    targets: &Coll<T>,
    target_id: Id,
    voter: Id,
    direction: VoteDirection,
) -> Result<VoteTally> {
    in_transaction!(client, |session| {
        let target = targets
            .find_one_with_session(target_id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("{} {}", T::KIND, target_id)))?;

        let mut tally = target.tally().clone();
        tally.toggle(voter, direction);

        targets
            .update_one_with_session(target_id.as_doc(), tally.as_update(), None, &mut session)
            .await?;
        Ok(tally)
    })
}
