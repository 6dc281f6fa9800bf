//! API-facing types.
//!
//! Requests are validated here, at the boundary; responses are serialised in
//! an API-friendly shape (IDs as hex strings, datetimes as RFC 3339, no
//! internal fields like password hashes).

pub mod admin;
pub mod auth;
pub mod business;
pub mod pagination;
pub mod post;
pub mod question;
pub mod vehicle;
