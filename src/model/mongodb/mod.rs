mod collection;
mod counter;

pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{
    ensure_counters_exist, Counter, CHOICE_ID_COUNTER_ID, QUESTION_ID_COUNTER_ID,
};

use mongodb::{bson::doc, bson::Document, error::Error as DbError, Database};

use crate::model::common::QuestionId;

/// A filter document matching the question with the given ID.
pub fn question_id_filter(id: QuestionId) -> Document {
    doc! {
        "_id": id,
    }
}

/// Perform all setup the application needs before it can serve requests.
///
/// This operation is idempotent.
pub async fn prepare_database(db: &Database) -> Result<(), DbError> {
    ensure_indexes_exist(db).await?;
    ensure_counters_exist(&Coll::from_db(db)).await?;
    Ok(())
}
