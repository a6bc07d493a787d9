//! Data types for the polls backend.
//!
//! - [`db`] types are exactly what is persisted in MongoDB.
//! - [`api`] types are what the outside world sees, either as JSON or as
//!   template context.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
