//! Types shared between the DB and API representations.

/// Questions are identified by an auto-incrementing integer.
pub type QuestionId = u32;

/// Choices are identified by an auto-incrementing integer, unique across all
/// questions.
pub type ChoiceId = u32;
