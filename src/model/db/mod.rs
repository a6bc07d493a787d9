//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in a DB-friendly way, e.g.:
//!
//! - Datetimes are serialised in MongoDB's own format.
//! - Choices are embedded in their question, so they cannot outlive it.

pub mod question;
