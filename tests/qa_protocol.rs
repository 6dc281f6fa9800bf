//! Q&A protocol tests against a live MongoDB replica set.
//!
//! The unit suite covers the pure tally and acceptance rules; these tests
//! exercise what only a real database can: the transactional guarantees
//! under concurrency and the multi-document cascades. They need a replica
//! set (transactions don't run on a standalone server), so they are ignored
//! by default:
//!
//!     DB_URI=mongodb://localhost:27017/?replicaSet=rs0 \
//!         cargo test --test qa_protocol -- --ignored

use mongodb::{Client, Database};

use autodir_backend::error::Error;
use autodir_backend::model::{
    common::{Role, VoteDirection},
    db::{
        answer::{self, Answer, NewAnswer},
        question::{self, NewQuestion, Question},
        voting,
    },
    mongodb::{Coll, Id},
};

async fn test_db() -> (Client, Database) {
    let uri = std::env::var("DB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017/?replicaSet=rs0".to_string());
    let client = Client::with_uri_str(&uri)
        .await
        .expect("failed to connect; is the replica set up?");
    let random: u32 = rand::random();
    let db = client.database(&format!("qa_test_{random}"));
    (client, db)
}

async fn insert_question(db: &Database, author: Id) -> Id {
    let new_question = NewQuestion::new(
        "Does my timing belt need changing?".to_string(),
        "It's been 60k miles.".to_string(),
        vec!["maintenance".to_string()],
        author,
    );
    Coll::<NewQuestion>::from_db(db)
        .insert_one(&new_question, None)
        .await
        .unwrap()
        .inserted_id
        .as_object_id()
        .unwrap()
        .into()
}

async fn question_by_id(db: &Database, id: Id) -> Question {
    Coll::<Question>::from_db(db)
        .find_one(id.as_doc(), None)
        .await
        .unwrap()
        .unwrap()
}

#[rocket::async_test]
#[ignore = "requires a MongoDB replica set (see module docs)"]
async fn concurrent_votes_both_land() {
    let (client, db) = test_db().await;
    let questions = Coll::<Question>::from_db(&db);

    let author = Id::new();
    let alice = Id::new();
    let bob = Id::new();
    let question_id = insert_question(&db, author).await;

    // Two voters race on the same question. With the optimistic transaction
    // neither membership update may be lost; a naive read-modify-write
    // implementation fails this test.
    let (first, second) = rocket::tokio::join!(
        voting::cast_vote(&client, &questions, question_id, alice, VoteDirection::Up),
        voting::cast_vote(&client, &questions, question_id, bob, VoteDirection::Up),
    );
    first.unwrap();
    second.unwrap();

    let question = question_by_id(&db, question_id).await;
    assert_eq!(question.tally.upvotes, 2);
    assert!(question.tally.upvoted_by.contains(&alice));
    assert!(question.tally.upvoted_by.contains(&bob));

    db.drop(None).await.unwrap();
}

#[rocket::async_test]
#[ignore = "requires a MongoDB replica set (see module docs)"]
async fn vote_switch_and_cancellation_persist() {
    let (client, db) = test_db().await;
    let questions = Coll::<Question>::from_db(&db);

    let alice = Id::new();
    let question_id = insert_question(&db, Id::new()).await;

    // Up: 0 -> 1.
    voting::cast_vote(&client, &questions, question_id, alice, VoteDirection::Up)
        .await
        .unwrap();
    let question = question_by_id(&db, question_id).await;
    assert_eq!((question.tally.upvotes, question.tally.downvotes), (1, 0));

    // Switching direction moves the vote in one call.
    voting::cast_vote(&client, &questions, question_id, alice, VoteDirection::Down)
        .await
        .unwrap();
    let question = question_by_id(&db, question_id).await;
    assert_eq!((question.tally.upvotes, question.tally.downvotes), (0, 1));

    // Voting the held direction again cancels it.
    voting::cast_vote(&client, &questions, question_id, alice, VoteDirection::Down)
        .await
        .unwrap();
    let question = question_by_id(&db, question_id).await;
    assert_eq!((question.tally.upvotes, question.tally.downvotes), (0, 0));
    assert!(question.tally.upvoted_by.is_empty());
    assert!(question.tally.downvoted_by.is_empty());

    db.drop(None).await.unwrap();
}

#[rocket::async_test]
#[ignore = "requires a MongoDB replica set (see module docs)"]
async fn accepted_answer_is_exclusive() {
    let (client, db) = test_db().await;
    let questions = Coll::<Question>::from_db(&db);
    let answers = Coll::<Answer>::from_db(&db);
    let new_answers = Coll::<NewAnswer>::from_db(&db);

    let author = Id::new();
    let question_id = insert_question(&db, author).await;
    let first = answer::post_answer(
        &client,
        &questions,
        &new_answers,
        NewAnswer::new(question_id, "Every 100k miles.".to_string(), Id::new()),
    )
    .await
    .unwrap();
    let second = answer::post_answer(
        &client,
        &questions,
        &new_answers,
        NewAnswer::new(question_id, "Check the service book.".to_string(), Id::new()),
    )
    .await
    .unwrap();

    let accepted_ids = |answers: Vec<Answer>| {
        answers
            .into_iter()
            .filter(|answer| answer.accepted)
            .map(|answer| answer.id)
            .collect::<Vec<_>>()
    };

    // Accept the first.
    answer::toggle_accepted(&client, &questions, &answers, question_id, first, author, Role::Member)
        .await
        .unwrap();
    let listed = answer::answers_for_question(&answers, question_id).await.unwrap();
    assert_eq!(accepted_ids(listed), vec![first]);

    // Accepting the second un-accepts the first in the same transaction.
    answer::toggle_accepted(&client, &questions, &answers, question_id, second, author, Role::Member)
        .await
        .unwrap();
    let listed = answer::answers_for_question(&answers, question_id).await.unwrap();
    assert_eq!(accepted_ids(listed), vec![second]);

    // Toggling the accepted answer again leaves none accepted.
    answer::toggle_accepted(&client, &questions, &answers, question_id, second, author, Role::Member)
        .await
        .unwrap();
    let listed = answer::answers_for_question(&answers, question_id).await.unwrap();
    assert!(accepted_ids(listed).is_empty());

    // A stranger may not accept at all.
    let outcome = answer::toggle_accepted(
        &client,
        &questions,
        &answers,
        question_id,
        second,
        Id::new(),
        Role::Member,
    )
    .await;
    assert!(matches!(outcome, Err(Error::PermissionDenied(_))));

    db.drop(None).await.unwrap();
}

#[rocket::async_test]
#[ignore = "requires a MongoDB replica set (see module docs)"]
async fn deleting_answers_keeps_the_count_exact() {
    let (client, db) = test_db().await;
    let questions = Coll::<Question>::from_db(&db);
    let answers = Coll::<Answer>::from_db(&db);
    let new_answers = Coll::<NewAnswer>::from_db(&db);

    let replier = Id::new();
    let question_id = insert_question(&db, Id::new()).await;
    let first = answer::post_answer(
        &client,
        &questions,
        &new_answers,
        NewAnswer::new(question_id, "Yes.".to_string(), replier),
    )
    .await
    .unwrap();
    let second = answer::post_answer(
        &client,
        &questions,
        &new_answers,
        NewAnswer::new(question_id, "No.".to_string(), replier),
    )
    .await
    .unwrap();
    assert_eq!(question_by_id(&db, question_id).await.answer_count, 2);

    // Deleting one answer removes it and decrements the counter together.
    answer::delete_answer(
        &client, &questions, &answers, question_id, second, replier, Role::Member,
    )
    .await
    .unwrap();
    let question = question_by_id(&db, question_id).await;
    assert_eq!(question.answer_count, 1);
    let remaining = answer::answers_for_question(&answers, question_id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, first);

    // Deleting an unknown answer fails with NotFound and changes nothing.
    let outcome = answer::delete_answer(
        &client,
        &questions,
        &answers,
        question_id,
        Id::new(),
        replier,
        Role::Member,
    )
    .await;
    assert!(matches!(outcome, Err(Error::NotFound(_))));
    assert_eq!(question_by_id(&db, question_id).await.answer_count, 1);

    // Deleting the question cascades to its remaining answers.
    question::delete_question(
        &client,
        &questions,
        &answers,
        question_id,
        Id::new(),
        Role::Moderator,
    )
    .await
    .unwrap();
    assert!(Coll::<Question>::from_db(&db)
        .find_one(question_id.as_doc(), None)
        .await
        .unwrap()
        .is_none());
    assert!(answer::answers_for_question(&answers, question_id)
        .await
        .unwrap()
        .is_empty());

    db.drop(None).await.unwrap();
}
