//! API endpoint handlers.
//!
//! Each module covers one resource. Handlers open a connection per request
//! and delegate to the lifecycle, auth and consistency modules.

pub mod admin;
pub mod appointments;
pub mod auth;
pub mod health;
pub mod records;
pub mod slots;
