use crate::model::common::ChoiceId;

/// The voting form. `choice` is deliberately lenient: a missing or garbled
/// value is an invalid selection rather than a malformed request.
#[derive(Debug, FromForm)]
pub struct VoteForm<'r> {
    pub choice: Option<&'r str>,
}

impl VoteForm<'_> {
    /// The selected choice, if one was given and it looks like a choice ID.
    pub fn choice_id(&self) -> Option<ChoiceId> {
        self.choice?.trim().parse().ok()
    }
}
