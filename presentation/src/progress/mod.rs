//! Progress reporting for submission processing

pub mod reporter;
