//! Shared wire types for the biolink API.
//!
//! This crate provides:
//! - API error codes returned in every error body
//! - The public profile payload served to page renderers

mod errors;
mod profile;

pub use errors::{ErrorBody, ErrorCode};
pub use profile::{
    PublicForm, PublicFormField, PublicLink, PublicProfile, PublicSocialLink, PublicTheme,
};
