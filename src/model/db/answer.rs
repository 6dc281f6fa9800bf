use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::{bson::doc, options::FindOptions, Client};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{Role, VoteTally},
    mongodb::{in_transaction, Coll, Id},
    permissions,
};

use super::{question::Question, voting::Voteable};

/// Core answer data. Answers live in their own collection, keyed back to the
/// owning question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerCore {
    pub question_id: Id,
    pub body: String,
    pub author_id: Id,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub tally: VoteTally,
    pub accepted: bool,
}

impl AnswerCore {
    pub fn new(question_id: Id, body: String, author_id: Id) -> Self {
        Self {
            question_id,
            body,
            author_id,
            created_at: Utc::now(),
            tally: VoteTally::default(),
            accepted: false,
        }
    }
}

/// An answer without an ID, ready for insertion.
pub type NewAnswer = AnswerCore;

/// An answer from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub answer: AnswerCore,
}

impl Deref for Answer {
    type Target = AnswerCore;

    fn deref(&self) -> &Self::Target {
        &self.answer
    }
}

impl DerefMut for Answer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.answer
    }
}

impl Voteable for Answer {
    const KIND: &'static str = "Answer";

    fn tally(&self) -> &VoteTally {
        &self.answer.tally
    }
}

/// All answers to a question: accepted first, then by votes, then oldest
/// first. Sorting happens in the database, not in memory.
pub async fn answers_for_question(answers: &Coll<Answer>, question_id: Id) -> Result<Vec<Answer>> {
    let filter = doc! { "question_id": question_id };
    let options = FindOptions::builder()
        .sort(doc! { "accepted": -1, "upvotes": -1, "created_at": 1 })
        .build();
    Ok(answers.find(filter, options).await?.try_collect().await?)
}

/// Append an answer to a question.
///
/// The insert and the `answer_count` bump land in one transaction so the
/// counter stays exact under concurrent appends and deletes, and so no
/// answer can be attached to a question that was deleted in between.
pub async fn post_answer(
    client: &Client,
    questions: &Coll<Question>,
    answers: &Coll<NewAnswer>,
    answer: NewAnswer,
) -> Result<Id> {
    let question_id = answer.question_id;
    in_transaction!(client, |session| {
        questions
            .find_one_with_session(question_id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Question {}", question_id)))?;

        let new_id: Id = answers
            .insert_one_with_session(&answer, None, &mut session)
            .await?
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB.
            .into();

        let bump = doc! { "$inc": { "answer_count": 1 } };
        questions
            .update_one_with_session(question_id.as_doc(), bump, None, &mut session)
            .await?;
        Ok(new_id)
    })
}

/// Remove one answer and decrement the question's `answer_count`, together.
///
/// Permitted to the answer's author or a moderator-equivalent caller. An
/// unknown answer ID fails with `NotFound` and changes nothing.
pub async fn delete_answer(
    client: &Client,
    questions: &Coll<Question>,
    answers: &Coll<Answer>,
    question_id: Id,
    answer_id: Id,
    caller_id: Id,
    caller_role: Role,
) -> Result<()> {
    in_transaction!(client, |session| {
        let filter = doc! { "_id": answer_id, "question_id": question_id };
        let answer = answers
            .find_one_with_session(filter.clone(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Answer {}", answer_id)))?;

        if !permissions::owner_or_moderator(caller_id, caller_role, answer.author_id) {
            return Err(Error::permission_denied(format!(
                "Answer {} may only be deleted by its author or a moderator",
                answer_id
            )));
        }

        answers
            .delete_one_with_session(filter, None, &mut session)
            .await?;
        let decrement = doc! { "$inc": { "answer_count": -1 } };
        questions
            .update_one_with_session(question_id.as_doc(), decrement, None, &mut session)
            .await?;
        Ok(())
    })
}

/// Toggle the accepted flag on an answer.
///
/// Only the question's author or a moderator-equivalent caller may accept.
/// Accepting an answer un-accepts every other answer of the same question in
/// the same transaction, so at most one answer is ever accepted; accepting an
/// already-accepted answer retracts the acceptance and touches nothing else.
///
/// Returns the answer's new accepted state.
pub async fn toggle_accepted(
    client: &Client,
    questions: &Coll<Question>,
    answers: &Coll<Answer>,
    question_id: Id,
    answer_id: Id,
    caller_id: Id,
    caller_role: Role,
) -> Result<bool> {
    in_transaction!(client, |session| {
        let question = questions
            .find_one_with_session(question_id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Question {}", question_id)))?;

        if !permissions::owner_or_moderator(caller_id, caller_role, question.author_id) {
            return Err(Error::permission_denied(format!(
                "Only the author of question {} or a moderator may accept answers",
                question_id
            )));
        }

        let target_filter = doc! { "_id": answer_id, "question_id": question_id };
        let answer = answers
            .find_one_with_session(target_filter.clone(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Answer {}", answer_id)))?;

        let now_accepted = !answer.accepted;
        if now_accepted {
            // Clear any sibling acceptance in the same write set.
            let accepted_siblings = doc! { "question_id": question_id, "accepted": true };
            let clear = doc! { "$set": { "accepted": false } };
            answers
                .update_many_with_session(accepted_siblings, clear, None, &mut session)
                .await?;
        }
        let set = doc! { "$set": { "accepted": now_accepted } };
        answers
            .update_one_with_session(target_filter, set, None, &mut session)
            .await?;
        Ok(now_accepted)
    })
}
