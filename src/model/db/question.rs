use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Client,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{Role, VoteTally},
    mongodb::{in_transaction, Coll, Id},
    permissions,
};

use super::{answer::Answer, voting::Voteable};

/// Core question data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionCore {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub author_id: Id,
    pub created_at: DateTime<Utc>,
    pub views: u64,
    #[serde(flatten)]
    pub tally: VoteTally,
    /// Kept equal to the number of answers referencing this question.
    pub answer_count: u64,
}

impl QuestionCore {
    pub fn new(title: String, body: String, tags: Vec<String>, author_id: Id) -> Self {
        Self {
            title,
            body,
            tags,
            author_id,
            created_at: Utc::now(),
            views: 0,
            tally: VoteTally::default(),
            answer_count: 0,
        }
    }
}

/// A question without an ID, ready for insertion.
pub type NewQuestion = QuestionCore;

/// A question from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub question: QuestionCore,
}

impl Deref for Question {
    type Target = QuestionCore;

    fn deref(&self) -> &Self::Target {
        &self.question
    }
}

impl DerefMut for Question {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.question
    }
}

impl Voteable for Question {
    const KIND: &'static str = "Question";

    fn tally(&self) -> &VoteTally {
        &self.question.tally
    }
}

/// Fetch a question while counting the view: a server-side atomic increment,
/// never a read-then-write of the number.
///
/// If the increment errors, degrade to a plain read that does not count the
/// view; undercounting views is better than failing the whole page load. A
/// question that simply doesn't exist is `NotFound`, not a fallback case.
pub async fn record_view(questions: &Coll<Question>, question_id: Id) -> Result<Question> {
    let update = doc! {
        "$inc": { "views": 1 }
    };
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    match questions
        .find_one_and_update(question_id.as_doc(), update, options)
        .await
    {
        Ok(found) => found.ok_or_else(|| Error::not_found(format!("Question {}", question_id))),
        Err(err) => {
            warn!("View-count increment failed for question {question_id}, serving stale: {err}");
            questions
                .find_one(question_id.as_doc(), None)
                .await?
                .ok_or_else(|| Error::not_found(format!("Question {}", question_id)))
        }
    }
}

/// Delete a question and all of its answers.
///
/// Permitted to the question's author or a moderator-equivalent caller. The
/// cascade spans two collections, so it runs in one transaction.
pub async fn delete_question(
    client: &Client,
    questions: &Coll<Question>,
    answers: &Coll<Answer>,
    question_id: Id,
    caller_id: Id,
    caller_role: Role,
) -> Result<()> {
    in_transaction!(client, |session| {
        let question = questions
            .find_one_with_session(question_id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Question {}", question_id)))?;

        if !permissions::owner_or_moderator(caller_id, caller_role, question.author_id) {
            return Err(Error::permission_denied(format!(
                "Question {} may only be deleted by its author or a moderator",
                question_id
            )));
        }

        questions
            .delete_one_with_session(question_id.as_doc(), None, &mut session)
            .await?;
        let by_question = doc! { "question_id": question_id };
        answers
            .delete_many_with_session(by_question, None, &mut session)
            .await?;
        Ok(())
    })
}
