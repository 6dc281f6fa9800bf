use mongodb::{bson::doc, Client};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        pagination::{Paginated, PaginationRequest},
        question::{
            AnswerRequest, QuestionDetail, QuestionRequest, QuestionSort, QuestionSummary,
            VoteRequest,
        },
    },
    db::{
        activity::{self, ActivityAction, NewActivityEntry},
        answer::{self, Answer, NewAnswer},
        question::{self, NewQuestion, Question, QuestionCore},
        voting,
    },
    mongodb::{Coll, Id},
    permissions,
};

pub fn routes() -> Vec<Route> {
    routes![
        list_questions,
        ask_question,
        view_question,
        edit_question,
        delete_question,
        vote_on_question,
        post_answer,
        delete_answer,
        vote_on_answer,
        accept_answer,
    ]
}

#[get("/questions?<tag>&<author>&<sort>&<pagination..>")]
async fn list_questions(
    tag: Option<String>,
    author: Option<Id>,
    sort: Option<QuestionSort>,
    pagination: PaginationRequest,
    questions: Coll<Question>,
) -> Result<Json<Paginated<QuestionSummary>>> {
    let mut filter = doc! {};
    if let Some(tag) = tag {
        filter.insert("tags", tag);
    }
    if let Some(author) = author {
        filter.insert("author_id", author);
    }

    let sort = sort.unwrap_or(QuestionSort::Newest);
    let page: Vec<Question> = questions
        .find(filter.clone(), pagination.find_options(sort.sort_doc()))
        .await?
        .try_collect()
        .await?;
    let total = questions.count_documents(filter, None).await?;

    let summaries = page.into_iter().map(QuestionSummary::from).collect();
    Ok(Json(pagination.to_paginated(total, summaries)))
}

#[post("/questions", data = "<request>", format = "json")]
async fn ask_question(
    token: AuthToken,
    request: Json<QuestionRequest>,
    new_questions: Coll<NewQuestion>,
    questions: Coll<Question>,
    activity_log: Coll<NewActivityEntry>,
) -> Result<Json<QuestionSummary>> {
    request.validate()?;
    let request = request.0;

    let new_question = QuestionCore::new(request.title, request.body, request.tags, token.id);
    let new_id: Id = new_questions
        .insert_one(&new_question, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB.
        .into();

    let question = questions
        .find_one(new_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Question {}", new_id)))?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Created,
        "questions",
        new_id,
        format!("Asked \"{}\"", question.title),
    )
    .await;

    Ok(Json(question.into()))
}

/// Fetch one question with its answers, counting the view.
#[get("/questions/<question_id>")]
async fn view_question(
    question_id: Id,
    questions: Coll<Question>,
    answers: Coll<Answer>,
) -> Result<Json<QuestionDetail>> {
    let question = question::record_view(&questions, question_id).await?;
    let question_answers = answer::answers_for_question(&answers, question_id).await?;
    Ok(Json(QuestionDetail::new(question, question_answers)))
}

#[put("/questions/<question_id>", data = "<request>", format = "json")]
async fn edit_question(
    token: AuthToken,
    question_id: Id,
    request: Json<QuestionRequest>,
    questions: Coll<Question>,
    activity_log: Coll<NewActivityEntry>,
) -> Result<Json<QuestionSummary>> {
    request.validate()?;

    let question = questions
        .find_one(question_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Question {}", question_id)))?;
    if !permissions::owner_or_moderator(token.id, token.role, question.author_id) {
        return Err(Error::permission_denied(format!(
            "Question {} may only be edited by its author or a moderator",
            question_id
        )));
    }

    let request = request.0;
    let update = doc! {
        "$set": {
            "title": &request.title,
            "body": &request.body,
            "tags": request.tags.clone(),
        }
    };
    questions
        .update_one(question_id.as_doc(), update, None)
        .await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Updated,
        "questions",
        question_id,
        format!("Edited \"{}\"", request.title),
    )
    .await;

    let updated = questions
        .find_one(question_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Question {}", question_id)))?;
    Ok(Json(updated.into()))
}

#[delete("/questions/<question_id>")]
async fn delete_question(
    token: AuthToken,
    question_id: Id,
    questions: Coll<Question>,
    answers: Coll<Answer>,
    activity_log: Coll<NewActivityEntry>,
    db_client: &State<Client>,
) -> Result<()> {
    question::delete_question(
        db_client,
        &questions,
        &answers,
        question_id,
        token.id,
        token.role,
    )
    .await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Deleted,
        "questions",
        question_id,
        "Deleted a question and its answers",
    )
    .await;

    Ok(())
}

#[post("/questions/<question_id>/vote", data = "<vote>", format = "json")]
async fn vote_on_question(
    token: AuthToken,
    question_id: Id,
    vote: Json<VoteRequest>,
    questions: Coll<Question>,
    db_client: &State<Client>,
) -> Result<Json<QuestionSummary>> {
    voting::cast_vote(db_client, &questions, question_id, token.id, vote.direction).await?;

    let question = questions
        .find_one(question_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Question {}", question_id)))?;
    Ok(Json(question.into()))
}

#[post("/questions/<question_id>/answers", data = "<request>", format = "json")]
async fn post_answer(
    token: AuthToken,
    question_id: Id,
    request: Json<AnswerRequest>,
    questions: Coll<Question>,
    new_answers: Coll<NewAnswer>,
    answers: Coll<Answer>,
    activity_log: Coll<NewActivityEntry>,
    db_client: &State<Client>,
) -> Result<Json<QuestionDetail>> {
    request.validate()?;

    let new_answer = NewAnswer::new(question_id, request.0.body, token.id);
    let answer_id =
        answer::post_answer(db_client, &questions, &new_answers, new_answer).await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Created,
        "answers",
        answer_id,
        format!("Answered question {}", question_id),
    )
    .await;

    question_detail(&questions, &answers, question_id).await
}

#[delete("/questions/<question_id>/answers/<answer_id>")]
async fn delete_answer(
    token: AuthToken,
    question_id: Id,
    answer_id: Id,
    questions: Coll<Question>,
    answers: Coll<Answer>,
    activity_log: Coll<NewActivityEntry>,
    db_client: &State<Client>,
) -> Result<()> {
    answer::delete_answer(
        db_client,
        &questions,
        &answers,
        question_id,
        answer_id,
        token.id,
        token.role,
    )
    .await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Deleted,
        "answers",
        answer_id,
        format!("Deleted an answer to question {}", question_id),
    )
    .await;

    Ok(())
}

#[post(
    "/questions/<question_id>/answers/<answer_id>/vote",
    data = "<vote>",
    format = "json"
)]
async fn vote_on_answer(
    token: AuthToken,
    question_id: Id,
    answer_id: Id,
    vote: Json<VoteRequest>,
    questions: Coll<Question>,
    answers: Coll<Answer>,
    db_client: &State<Client>,
) -> Result<Json<QuestionDetail>> {
    // The vote itself only needs the answer, but 404 early if the IDs don't
    // belong together.
    let belongs = doc! { "_id": answer_id, "question_id": question_id };
    answers
        .find_one(belongs, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Answer {}", answer_id)))?;

    voting::cast_vote(db_client, &answers, answer_id, token.id, vote.direction).await?;

    question_detail(&questions, &answers, question_id).await
}

#[post("/questions/<question_id>/answers/<answer_id>/accept")]
async fn accept_answer(
    token: AuthToken,
    question_id: Id,
    answer_id: Id,
    questions: Coll<Question>,
    answers: Coll<Answer>,
    activity_log: Coll<NewActivityEntry>,
    db_client: &State<Client>,
) -> Result<Json<QuestionDetail>> {
    let now_accepted = answer::toggle_accepted(
        db_client,
        &questions,
        &answers,
        question_id,
        answer_id,
        token.id,
        token.role,
    )
    .await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::AcceptToggled,
        "answers",
        answer_id,
        if now_accepted {
            format!("Accepted an answer to question {}", question_id)
        } else {
            format!("Retracted the accepted answer to question {}", question_id)
        },
    )
    .await;

    question_detail(&questions, &answers, question_id).await
}

/// Re-read a question page after a mutation, without counting a view.
async fn question_detail(
    questions: &Coll<Question>,
    answers: &Coll<Answer>,
    question_id: Id,
) -> Result<Json<QuestionDetail>> {
    let question = questions
        .find_one(question_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Question {}", question_id)))?;
    let question_answers = answer::answers_for_question(answers, question_id).await?;
    Ok(Json(QuestionDetail::new(question, question_answers)))
}
