//! Framework-level plumbing shared by makrgate services: the request
//! envelope (request ids, timing, unified error responses), input
//! validation utilities, health handlers, and tracing bootstrap.

pub mod clock;
pub mod envelope;
pub mod error;
pub mod health;
pub mod tracing;
pub mod validate;
