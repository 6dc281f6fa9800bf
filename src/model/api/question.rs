use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::VoteDirection,
    db::{answer::Answer, question::Question},
    mongodb::Id,
};

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_TAGS: usize = 10;

/// A question as submitted by a member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl QuestionRequest {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::validation("Question title must not be empty"));
        }
        if self.title.len() > MAX_TITLE_LENGTH {
            return Err(Error::validation(format!(
                "Question title must be at most {MAX_TITLE_LENGTH} characters"
            )));
        }
        if self.body.trim().is_empty() {
            return Err(Error::validation("Question body must not be empty"));
        }
        if self.tags.len() > MAX_TAGS {
            return Err(Error::validation(format!("At most {MAX_TAGS} tags allowed")));
        }
        if self.tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(Error::validation("Tags must not be empty"));
        }
        Ok(())
    }
}

/// A vote cast through the API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VoteRequest {
    pub direction: VoteDirection,
}

/// Sort orders for question listings, applied in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromFormField)]
pub enum QuestionSort {
    Newest,
    Views,
    Votes,
}

impl QuestionSort {
    pub fn sort_doc(self) -> Document {
        match self {
            Self::Newest => doc! { "created_at": -1 },
            Self::Views => doc! { "views": -1, "created_at": -1 },
            Self::Votes => doc! { "upvotes": -1, "created_at": -1 },
        }
    }
}

/// A question row in a listing: everything but the body and answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSummary {
    pub id: Id,
    pub title: String,
    pub tags: Vec<String>,
    pub author_id: Id,
    pub created_at: DateTime<Utc>,
    pub views: u64,
    pub upvotes: u64,
    pub downvotes: u64,
    pub score: i64,
    pub answer_count: u64,
}

impl From<Question> for QuestionSummary {
    fn from(question: Question) -> Self {
        let score = question.tally.score();
        Self {
            id: question.id,
            title: question.question.title,
            tags: question.question.tags,
            author_id: question.question.author_id,
            created_at: question.question.created_at,
            views: question.question.views,
            upvotes: question.question.tally.upvotes,
            downvotes: question.question.tally.downvotes,
            score,
            answer_count: question.question.answer_count,
        }
    }
}

/// A full question page: the record plus its answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDetail {
    #[serde(flatten)]
    pub summary: QuestionSummary,
    pub body: String,
    pub answers: Vec<AnswerView>,
}

impl QuestionDetail {
    pub fn new(question: Question, answers: Vec<Answer>) -> Self {
        let body = question.question.body.clone();
        Self {
            summary: question.into(),
            body,
            answers: answers.into_iter().map(AnswerView::from).collect(),
        }
    }
}

/// An answer as rendered under its question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerView {
    pub id: Id,
    pub body: String,
    pub author_id: Id,
    pub created_at: DateTime<Utc>,
    pub upvotes: u64,
    pub downvotes: u64,
    pub score: i64,
    pub accepted: bool,
}

impl From<Answer> for AnswerView {
    fn from(answer: Answer) -> Self {
        let score = answer.tally.score();
        Self {
            id: answer.id,
            body: answer.answer.body,
            author_id: answer.answer.author_id,
            created_at: answer.answer.created_at,
            upvotes: answer.answer.tally.upvotes,
            downvotes: answer.answer.tally.downvotes,
            score,
            accepted: answer.answer.accepted,
        }
    }
}

/// A new answer as submitted by a member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub body: String,
}

impl AnswerRequest {
    pub fn validate(&self) -> Result<()> {
        if self.body.trim().is_empty() {
            return Err(Error::validation("Answer body must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(title: &str, body: &str, tags: &[&str]) -> QuestionRequest {
        QuestionRequest {
            title: title.to_string(),
            body: body.to_string(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
        }
    }

    #[test]
    fn accepts_reasonable_questions() {
        assert!(question("Best oil for a 2009 diesel?", "Asking for a friend.", &["maintenance"])
            .validate()
            .is_ok());
    }

    #[test]
    fn rejects_empty_shapes() {
        assert!(question("", "body", &[]).validate().is_err());
        assert!(question("title", "   ", &[]).validate().is_err());
        assert!(question("title", "body", &["ok", " "]).validate().is_err());
        assert!(question(&"t".repeat(MAX_TITLE_LENGTH + 1), "body", &[]).validate().is_err());
    }

    #[test]
    fn answers_must_have_a_body() {
        assert!(AnswerRequest { body: "\n".to_string() }.validate().is_err());
        assert!(AnswerRequest { body: "Use 5W-30.".to_string() }.validate().is_ok());
    }
}
