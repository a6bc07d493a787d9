//! API-compatible (e.g. de/serialisable) types.
//!
//! These are what the outside world sees, either as JSON from the management
//! API or as context handed to the page templates. Datetimes are serialised
//! as RFC 3339 strings.

pub mod admin;
pub mod question;
pub mod vote;
