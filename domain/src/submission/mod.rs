//! Submission subdomain: the applicant's request and its processing state.

pub mod entities;
pub mod value_objects;
