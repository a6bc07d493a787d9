use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Duration, Utc};
use log::debug;
use mongodb::{
    bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime},
    options::{FindOneAndUpdateOptions, ReturnDocument},
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    common::{ChoiceId, QuestionId},
    mongodb::Coll,
};

/// Core question data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionCore {
    /// The question being asked.
    pub question_text: String,
    /// When the question becomes visible in the listing.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub pub_date: DateTime<Utc>,
    /// Possible answers, in display order.
    pub choices: Vec<Choice>,
}

impl QuestionCore {
    /// Find one of this question's choices by ID.
    pub fn choice(&self, choice_id: ChoiceId) -> Option<&Choice> {
        self.choices.iter().find(|choice| choice.id == choice_id)
    }

    /// Was this question published within the last day?
    /// Questions with a publication date in the future do not count.
    pub fn was_published_recently(&self) -> bool {
        let now = Utc::now();
        now - Duration::days(1) <= self.pub_date && self.pub_date <= now
    }

    /// Total votes across all choices.
    pub fn total_votes(&self) -> u64 {
        self.choices.iter().map(|choice| u64::from(choice.votes)).sum()
    }
}

/// A question from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: QuestionId,
    #[serde(flatten)]
    pub question: QuestionCore,
}

impl Question {
    /// Record one vote for `choice_id` on the question with ID `question_id`.
    ///
    /// The choice is matched and incremented in a single atomic update, scoped
    /// to the given question, so concurrent voters never lose each other's
    /// votes and a choice from a different question can never be touched.
    pub async fn record_vote(
        questions: &Coll<Question>,
        question_id: QuestionId,
        choice_id: Option<ChoiceId>,
    ) -> Result<VoteOutcome> {
        let Some(choice_id) = choice_id else {
            return Ok(VoteOutcome::InvalidSelection);
        };

        let filter = doc! {
            "_id": question_id,
            "choices.id": choice_id,
        };
        let update = doc! {
            "$inc": { "choices.$.votes": 1 }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = questions
            .find_one_and_update(filter, update, options)
            .await?;

        let outcome = updated
            .and_then(|question| question.question.choices.into_iter().find(|c| c.id == choice_id))
            .map(VoteOutcome::Recorded)
            .unwrap_or_else(|| {
                debug!("Choice {choice_id} does not belong to question {question_id}");
                VoteOutcome::InvalidSelection
            });
        Ok(outcome)
    }
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

/// A single possible answer to a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: ChoiceId,
    pub choice_text: String,
    pub votes: u32,
}

impl Choice {
    /// A new choice with no votes.
    pub fn new(id: ChoiceId, choice_text: impl Into<String>) -> Self {
        Self {
            id,
            choice_text: choice_text.into(),
            votes: 0,
        }
    }
}

/// The result of trying to record a vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The vote was counted; contains the choice as it is after the increment.
    Recorded(Choice),
    /// No choice was given, or it does not belong to the question.
    /// Nothing was modified.
    InvalidSelection,
}
