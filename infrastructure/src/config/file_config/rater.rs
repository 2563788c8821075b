//! Rater configuration from TOML (`[rater]` section)

use rater_domain::DEFAULT_TARGET_SHEET;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRaterConfig {
    /// Sheet receiving mapped submission data when a line does not name one
    pub sheet: String,
    /// Send the calculated rater through SaveRatingSheet / ImportExcelRater
    pub upload: bool,
    /// Write a template-derived premium back to the first quote option
    pub post_premium: bool,
}

impl Default for FileRaterConfig {
    fn default() -> Self {
        Self {
            sheet: DEFAULT_TARGET_SHEET.to_string(),
            upload: false,
            post_premium: false,
        }
    }
}
