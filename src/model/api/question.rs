use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{ChoiceId, QuestionId},
    db::question::{Choice, Question, QuestionCore},
};

/// A question as the listing page shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSummary {
    pub id: QuestionId,
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
}

impl From<Question> for QuestionSummary {
    fn from(question: Question) -> Self {
        Self {
            id: question.id,
            question_text: question.question.question_text,
            pub_date: question.question.pub_date,
        }
    }
}

/// A question with all its choices and their tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDescription {
    pub id: QuestionId,
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
    pub was_published_recently: bool,
    pub total_votes: u64,
    pub choices: Vec<ChoiceDescription>,
}

impl From<Question> for QuestionDescription {
    fn from(question: Question) -> Self {
        let was_published_recently = question.was_published_recently();
        let total_votes = question.total_votes();
        Self {
            id: question.id,
            question_text: question.question.question_text,
            pub_date: question.question.pub_date,
            was_published_recently,
            total_votes,
            choices: question
                .question
                .choices
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceDescription {
    pub id: ChoiceId,
    pub choice_text: String,
    pub votes: u32,
}

impl From<Choice> for ChoiceDescription {
    fn from(choice: Choice) -> Self {
        Self {
            id: choice.id,
            choice_text: choice.choice_text,
            votes: choice.votes,
        }
    }
}

/// A new question, as submitted to the management API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSpec {
    pub question_text: String,
    /// Defaults to the time of creation.
    #[serde(default)]
    pub pub_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub choices: Vec<String>,
}

impl QuestionSpec {
    /// Check that neither the question nor any choice is blank.
    pub fn is_valid(&self) -> bool {
        !self.question_text.trim().is_empty()
            && self.choices.iter().all(|choice| !choice.trim().is_empty())
    }

    /// Turn this spec into question data, given one freshly allocated ID per
    /// choice.
    pub fn into_core(self, choice_ids: impl IntoIterator<Item = ChoiceId>) -> QuestionCore {
        let choices = choice_ids
            .into_iter()
            .zip(self.choices)
            .map(|(id, text)| Choice::new(id, text))
            .collect();
        QuestionCore {
            question_text: self.question_text,
            pub_date: self.pub_date.unwrap_or_else(Utc::now),
            choices,
        }
    }
}

/// A new choice for an existing question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceSpec {
    pub choice_text: String,
}

impl ChoiceSpec {
    pub fn is_valid(&self) -> bool {
        !self.choice_text.trim().is_empty()
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use chrono::Duration;

    use super::*;

    impl QuestionSpec {
        pub fn example() -> Self {
            Self {
                question_text: "Tabs or spaces?".to_string(),
                pub_date: Some(Utc::now() - Duration::minutes(5)),
                choices: vec!["Tabs".to_string(), "Spaces".to_string()],
            }
        }
    }
}
