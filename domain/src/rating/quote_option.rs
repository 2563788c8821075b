//! Quote options created remotely alongside a quote

use serde::{Deserialize, Serialize};

/// One priced coverage variant of a remote quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteOption {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_location: Option<String>,
}

impl QuoteOption {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            line_id: None,
            line_name: None,
            company_location: None,
        }
    }
}
