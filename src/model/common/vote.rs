use mongodb::bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A vote on a question or answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

/// Denormalized vote state carried by every voteable record: the membership
/// sets plus counters that always equal their cardinality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub upvotes: u64,
    pub downvotes: u64,
    pub upvoted_by: Vec<Id>,
    pub downvoted_by: Vec<Id>,
}

impl VoteTally {
    /// Apply one vote with toggle semantics:
    ///
    /// - voting the direction already held retracts the vote;
    /// - voting the opposite direction switches it in the same step;
    /// - counters are recomputed from the sets, never adjusted directly.
    pub fn toggle(&mut self, voter: Id, direction: VoteDirection) {
        let held_up = self.upvoted_by.contains(&voter);
        let held_down = self.downvoted_by.contains(&voter);

        self.upvoted_by.retain(|id| *id != voter);
        self.downvoted_by.retain(|id| *id != voter);

        match direction {
            VoteDirection::Up if !held_up => self.upvoted_by.push(voter),
            VoteDirection::Down if !held_down => self.downvoted_by.push(voter),
            _ => {} // Same direction twice: the retain above already retracted it.
        }

        self.upvotes = self.upvoted_by.len() as u64;
        self.downvotes = self.downvoted_by.len() as u64;
    }

    pub fn score(&self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }

    /// A `$set` update persisting all four fields together.
    pub fn as_update(&self) -> Document {
        let upvoted_by = self.upvoted_by.iter().copied().map(Bson::from).collect::<Vec<_>>();
        let downvoted_by = self.downvoted_by.iter().copied().map(Bson::from).collect::<Vec<_>>();
        doc! {
            "$set": {
                "upvotes": self.upvotes as i64,
                "downvotes": self.downvotes as i64,
                "upvoted_by": upvoted_by,
                "downvoted_by": downvoted_by,
            }
        }
    }

    /// The counters must equal the set cardinalities and no voter may hold
    /// both directions at once.
    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        self.upvotes == self.upvoted_by.len() as u64
            && self.downvotes == self.downvoted_by.len() as u64
            && !self.upvoted_by.iter().any(|id| self.downvoted_by.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_vote_cancels() {
        let alice = Id::new();
        let mut tally = VoteTally::default();
        let before = tally.clone();

        tally.toggle(alice, VoteDirection::Up);
        assert_eq!(tally.upvotes, 1);
        tally.toggle(alice, VoteDirection::Up);
        assert_eq!(tally, before);
    }

    #[test]
    fn switching_direction_moves_the_vote_in_one_step() {
        let alice = Id::new();
        let mut tally = VoteTally::default();

        tally.toggle(alice, VoteDirection::Up);
        assert_eq!((tally.upvotes, tally.downvotes), (1, 0));

        tally.toggle(alice, VoteDirection::Down);
        assert_eq!((tally.upvotes, tally.downvotes), (0, 1));
        assert!(!tally.upvoted_by.contains(&alice));
        assert!(tally.downvoted_by.contains(&alice));
    }

    #[test]
    fn one_direction_per_voter_after_any_sequence() {
        let alice = Id::new();
        let bob = Id::new();
        let mut tally = VoteTally::default();

        let sequence = [
            (alice, VoteDirection::Up),
            (bob, VoteDirection::Down),
            (alice, VoteDirection::Down),
            (alice, VoteDirection::Down),
            (bob, VoteDirection::Up),
            (alice, VoteDirection::Up),
            (bob, VoteDirection::Up),
        ];
        for (voter, direction) in sequence {
            tally.toggle(voter, direction);
            assert!(tally.is_consistent());
        }

        assert!(tally.upvoted_by.contains(&alice));
        assert!(!tally.downvoted_by.contains(&alice));
        assert!(!tally.upvoted_by.contains(&bob));
        assert!(!tally.downvoted_by.contains(&bob));
    }

    #[test]
    fn independent_voters_accumulate() {
        let mut tally = VoteTally::default();
        let voters: Vec<Id> = (0..5).map(|_| Id::new()).collect();
        for voter in &voters {
            tally.toggle(*voter, VoteDirection::Up);
        }
        assert_eq!(tally.upvotes, 5);
        assert_eq!(tally.score(), 5);

        tally.toggle(voters[0], VoteDirection::Down);
        assert_eq!(tally.upvotes, 4);
        assert_eq!(tally.downvotes, 1);
        assert_eq!(tally.score(), 3);
    }

    #[test]
    fn update_persists_all_four_fields() {
        let mut tally = VoteTally::default();
        tally.toggle(Id::new(), VoteDirection::Up);
        tally.toggle(Id::new(), VoteDirection::Down);

        let set = tally.as_update().get_document("$set").unwrap().clone();
        assert_eq!(set.get_i64("upvotes").unwrap(), 1);
        assert_eq!(set.get_i64("downvotes").unwrap(), 1);
        assert_eq!(set.get_array("upvoted_by").unwrap().len(), 1);
        assert_eq!(set.get_array("downvoted_by").unwrap().len(), 1);
    }
}
