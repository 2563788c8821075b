//! Worksheet concepts: cell addresses, cell values and the submission cell mapping.

pub mod cell_mapper;
pub mod cell_ref;
pub mod value;
