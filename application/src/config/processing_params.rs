//! Processing parameters for the submission pipeline.
//!
//! [`ProcessingParams`] groups the static switches that control optional
//! remote side effects in
//! [`ProcessSubmissionUseCase`](crate::use_cases::process_submission::ProcessSubmissionUseCase)
//! and the lookup order of the premium resolver.

use chrono::NaiveDate;
use rater_domain::PremiumQuery;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingParams {
    /// Send the calculated rater back through SaveRatingSheet / ImportExcelRater.
    pub upload_rater: bool,
    /// Post a template-derived premium to the first quote option.
    pub post_premium: bool,
    /// Supplementary premium lookups, tried in order.
    pub premium_queries: Vec<PremiumQuery>,
    /// Fixed effective date; `None` means today.
    pub effective_date: Option<NaiveDate>,
}

impl Default for ProcessingParams {
    fn default() -> Self {
        Self {
            upload_rater: false,
            post_premium: false,
            premium_queries: PremiumQuery::defaults(),
            effective_date: None,
        }
    }
}

impl ProcessingParams {
    // ==================== Builder Methods ====================

    pub fn with_upload_rater(mut self, upload: bool) -> Self {
        self.upload_rater = upload;
        self
    }

    pub fn with_post_premium(mut self, post: bool) -> Self {
        self.post_premium = post;
        self
    }

    pub fn with_premium_queries(mut self, queries: Vec<PremiumQuery>) -> Self {
        self.premium_queries = queries;
        self
    }

    pub fn with_effective_date(mut self, date: NaiveDate) -> Self {
        self.effective_date = Some(date);
        self
    }
}
