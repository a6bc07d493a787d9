use std::ops::Range;

use log::debug;
use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
};
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::Coll;

/// Counter that allocates question IDs.
pub const QUESTION_ID_COUNTER_ID: &str = "question_id";

/// Counter that allocates choice IDs. Choice IDs are unique across all questions.
pub const CHOICE_ID_COUNTER_ID: &str = "choice_id";

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: u32,
}

impl Counter {
    /// Create a new `Counter` with the given ID, starting at the given value.
    pub fn new(id: impl Into<String>, start: u32) -> Self {
        Self {
            id: id.into(),
            next: start,
        }
    }

    /// Atomically retrieve the next value of the counter with the given ID.
    pub async fn next(counters: &Coll<Counter>, id: &str) -> Result<u32> {
        let range = Self::reserve(counters, id, 1).await?;
        Ok(range.start)
    }

    /// Atomically reserve `count` consecutive values from the counter with
    /// the given ID.
    pub async fn reserve(counters: &Coll<Counter>, id: &str, count: u32) -> Result<Range<u32>> {
        let update = doc! {
            "$inc": { "next": count }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update(doc! {"_id": id}, update, options)
            .await?
            .ok_or_else(|| {
                Error::Status(
                    Status::InternalServerError,
                    format!("Failed to find counter with ID {id}"),
                )
            })?;
        let end = counter.next.checked_add(count).ok_or_else(|| {
            Error::Status(
                Status::InternalServerError,
                format!("Counter with ID {id} is exhausted"),
            )
        })?;
        Ok(counter.next..end)
    }
}

/// Ensure that every ID counter exists, starting from 1. Existing counters are
/// left untouched.
pub async fn ensure_counters_exist(counters: &Coll<Counter>) -> std::result::Result<(), DbError> {
    debug!("Ensuring ID counters exist");

    let upsert = UpdateOptions::builder().upsert(true).build();
    for id in [QUESTION_ID_COUNTER_ID, CHOICE_ID_COUNTER_ID] {
        let update = doc! {
            "$setOnInsert": { "next": 1_u32 }
        };
        counters
            .update_one(doc! {"_id": id}, update, upsert.clone())
            .await?;
    }
    Ok(())
}
