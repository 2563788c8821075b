//! Rating subdomain: line-of-business configuration, quote options and premiums.

pub mod line_of_business;
pub mod premium;
pub mod quote_option;
