use log::info;
use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        admin::AdminKey,
        question::{ChoiceSpec, QuestionDescription, QuestionSpec},
    },
    common::QuestionId,
    db::question::Question,
    mongodb::{question_id_filter, Coll, Counter, CHOICE_ID_COUNTER_ID, QUESTION_ID_COUNTER_ID},
};

pub fn routes() -> Vec<Route> {
    routes![all_questions, create_question, add_choice, delete_question]
}

#[get("/api/questions")]
async fn all_questions(
    _key: AdminKey,
    questions: Coll<Question>,
) -> Result<Json<Vec<QuestionDescription>>> {
    let options = FindOptions::builder()
        .sort(doc! {"pub_date": -1, "_id": -1})
        .build();
    let all: Vec<QuestionDescription> = questions
        .find(None, options)
        .await?
        .map_ok(QuestionDescription::from)
        .try_collect()
        .await?;
    Ok(Json(all))
}

#[post("/api/questions", data = "<spec>", format = "json")]
async fn create_question(
    _key: AdminKey,
    spec: Json<QuestionSpec>,
    questions: Coll<Question>,
    counters: Coll<Counter>,
) -> Result<Json<QuestionDescription>> {
    if !spec.is_valid() {
        return Err(Error::Status(
            Status::BadRequest,
            "Question and choice text must not be blank".to_string(),
        ));
    }
    let choice_count = u32::try_from(spec.choices.len())
        .map_err(|_| Error::Status(Status::BadRequest, "Too many choices".to_string()))?;

    // Allocate IDs.
    let id = Counter::next(&counters, QUESTION_ID_COUNTER_ID).await?;
    let choice_ids = Counter::reserve(&counters, CHOICE_ID_COUNTER_ID, choice_count).await?;

    let question = Question {
        id,
        question: spec.0.into_core(choice_ids),
    };
    questions.insert_one(&question, None).await?;
    info!(
        "Created question {id} with {} choices",
        question.choices.len()
    );

    Ok(Json(question.into()))
}

#[post("/api/questions/<question_id>/choices", data = "<spec>", format = "json")]
async fn add_choice(
    _key: AdminKey,
    question_id: QuestionId,
    spec: Json<ChoiceSpec>,
    questions: Coll<Question>,
    counters: Coll<Counter>,
) -> Result<Json<QuestionDescription>> {
    if !spec.is_valid() {
        return Err(Error::Status(
            Status::BadRequest,
            "Choice text must not be blank".to_string(),
        ));
    }

    // Check the question exists before using up an ID.
    let existing = questions
        .count_documents(question_id_filter(question_id), None)
        .await?;
    if existing == 0 {
        return Err(Error::not_found(format!("Question with ID '{question_id}'")));
    }

    let choice_id = Counter::next(&counters, CHOICE_ID_COUNTER_ID).await?;
    let update = doc! {
        "$push": {
            "choices": {
                "id": choice_id,
                "choice_text": &spec.choice_text,
                "votes": 0_u32,
            }
        }
    };
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let question = questions
        .find_one_and_update(question_id_filter(question_id), update, options)
        .await?
        .ok_or_else(|| Error::not_found(format!("Question with ID '{question_id}'")))?;
    info!("Added choice {choice_id} to question {question_id}");

    Ok(Json(question.into()))
}

#[delete("/api/questions/<question_id>")]
async fn delete_question(
    _key: AdminKey,
    question_id: QuestionId,
    questions: Coll<Question>,
) -> Result<()> {
    // Choices are embedded, so they go with it.
    let result = questions
        .delete_one(question_id_filter(question_id), None)
        .await?;
    if result.deleted_count == 0 {
        return Err(Error::not_found(format!("Question with ID '{question_id}'")));
    }
    info!("Deleted question {question_id}");
    Ok(())
}
