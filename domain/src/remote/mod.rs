//! Remote-system value objects: procedure results and typed requests.

pub mod requests;
pub mod table;
