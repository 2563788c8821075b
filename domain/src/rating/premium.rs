//! Premium mappings and resolution results

use crate::core::error::DomainError;
use crate::remote::table::ProcedureParams;
use crate::sheet::cell_ref::CellRef;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Where in a calculated template a premium may be found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremiumMapping {
    pub sheet_name: String,
    pub cell_reference: String,
    pub priority: u32,
}

impl PremiumMapping {
    pub fn new(sheet_name: impl Into<String>, cell_reference: impl Into<String>, priority: u32) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            cell_reference: cell_reference.into(),
            priority,
        }
    }

    /// Mappings used when a line configures none
    pub fn defaults() -> Vec<PremiumMapping> {
        vec![
            PremiumMapping::new("IMS_TAGS", "B6", 1),
            PremiumMapping::new("Summary", "B6", 2),
            PremiumMapping::new("Premium", "B10", 3),
            PremiumMapping::new("Rating", "E15", 4),
            PremiumMapping::new("submission_data", "B50", 5),
        ]
    }

    pub fn cell(&self) -> Result<CellRef, DomainError> {
        CellRef::parse(&self.cell_reference)
    }

    /// Mappings in probe order: ascending priority, ties keep configured order
    pub fn in_priority_order(mappings: &[PremiumMapping]) -> Vec<&PremiumMapping> {
        let mut ordered: Vec<&PremiumMapping> = mappings.iter().collect();
        ordered.sort_by_key(|m| m.priority);
        ordered
    }

    pub fn label(&self) -> String {
        format!("{}!{}", self.sheet_name, self.cell_reference)
    }
}

impl FromStr for PremiumMapping {
    type Err = DomainError;

    /// `Sheet!B6` or `Sheet!B6:2`; a missing priority means 1
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidPremiumMapping(s.to_string());
        let (sheet, rest) = s.rsplit_once('!').ok_or_else(invalid)?;
        let sheet = sheet.trim().trim_matches('\'');
        let (cell, priority) = match rest.split_once(':') {
            Some((cell, priority)) => (cell, priority.trim().parse().map_err(|_| invalid())?),
            None => (rest, 1),
        };
        if sheet.is_empty() {
            return Err(invalid());
        }
        let cell = CellRef::parse(cell).map_err(|_| invalid())?;
        Ok(PremiumMapping::new(sheet, cell.to_string(), priority))
    }
}

/// Which quote identifier a supplementary premium query is keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteKey {
    Quote,
    QuoteOption,
}

/// A supplementary remote lookup tried by the premium resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PremiumQuery {
    /// The policy information web method, searched for premium-like fields
    PolicyInformation,
    /// A named stored procedure keyed by one quote id, plus fixed arguments
    Procedure {
        name: String,
        key: QuoteKey,
        parameter: String,
        /// Sent ahead of the id parameter
        #[serde(default, skip_serializing_if = "ProcedureParams::is_empty")]
        extra: ProcedureParams,
    },
}

impl PremiumQuery {
    pub fn procedure(name: impl Into<String>, key: QuoteKey, parameter: impl Into<String>) -> Self {
        PremiumQuery::Procedure {
            name: name.into(),
            key,
            parameter: parameter.into(),
            extra: ProcedureParams::new(),
        }
    }

    /// Adds a fixed argument; no effect on `PolicyInformation`
    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let PremiumQuery::Procedure { extra, .. } = &mut self {
            extra.insert(name.into(), value.into());
        }
        self
    }

    /// Lookup order used unless configured otherwise
    pub fn defaults() -> Vec<PremiumQuery> {
        vec![
            PremiumQuery::PolicyInformation,
            PremiumQuery::procedure("GetQuoteOptionPremium", QuoteKey::QuoteOption, "QuoteOptionGUID"),
            PremiumQuery::procedure("GetQuotePremium", QuoteKey::Quote, "QuoteGUID"),
            PremiumQuery::procedure("GetDynamicData", QuoteKey::Quote, "QuoteGUID")
                .with_argument("TableName", "Dynamic_Data_AlliedHealth"),
        ]
    }

    pub fn label(&self) -> String {
        match self {
            PremiumQuery::PolicyInformation => "GetPolicyInformation".to_string(),
            PremiumQuery::Procedure { name, .. } => name.clone(),
        }
    }
}

/// Where a resolved premium came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PremiumSource {
    ProcedureResult { field: String },
    SupplementaryQuery { query: String, field: String },
    Template { sheet: String, cell: String },
}

/// One candidate source the resolver looked at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumAttempt {
    pub source: String,
    pub outcome: String,
}

impl PremiumAttempt {
    pub fn new(source: impl Into<String>, outcome: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            outcome: outcome.into(),
        }
    }
}

/// Outcome of premium resolution; a `None` premium is not an error
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PremiumResolution {
    pub premium: Option<f64>,
    pub source: Option<PremiumSource>,
    pub attempts: Vec<PremiumAttempt>,
    /// Why no premium was found, when none was
    pub diagnostic: Option<String>,
}

impl PremiumResolution {
    pub fn is_resolved(&self) -> bool {
        self.premium.is_some()
    }

    pub fn from_template(&self) -> bool {
        matches!(self.source, Some(PremiumSource::Template { .. }))
    }
}

/// Field names checked first, in order, before any column containing "premium"
pub const PREFERRED_PREMIUM_FIELDS: [&str; 4] = ["Premium", "TotalPremium", "PremiumAmount", "Total"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order_is_stable() {
        let mappings = vec![
            PremiumMapping::new("B", "A1", 2),
            PremiumMapping::new("A", "A1", 1),
            PremiumMapping::new("C", "A1", 2),
        ];
        let ordered: Vec<&str> = PremiumMapping::in_priority_order(&mappings)
            .iter()
            .map(|m| m.sheet_name.as_str())
            .collect();
        assert_eq!(ordered, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_parse_mapping() {
        let m: PremiumMapping = "Summary!B6:3".parse().unwrap();
        assert_eq!(m, PremiumMapping::new("Summary", "B6", 3));
        let m: PremiumMapping = "'Rate Sheet'!$e$15".parse().unwrap();
        assert_eq!(m, PremiumMapping::new("Rate Sheet", "E15", 1));
        assert!("Summary".parse::<PremiumMapping>().is_err());
        assert!("!B6".parse::<PremiumMapping>().is_err());
        assert!("Summary!B6:x".parse::<PremiumMapping>().is_err());
    }

    #[test]
    fn test_default_mappings_start_with_ims_tags() {
        let defaults = PremiumMapping::defaults();
        assert_eq!(defaults[0].label(), "IMS_TAGS!B6");
        assert_eq!(defaults.len(), 5);
    }

    #[test]
    fn test_default_queries_order() {
        let labels: Vec<String> = PremiumQuery::defaults().iter().map(|q| q.label()).collect();
        assert_eq!(
            labels,
            vec![
                "GetPolicyInformation",
                "GetQuoteOptionPremium",
                "GetQuotePremium",
                "GetDynamicData"
            ]
        );
    }

    #[test]
    fn test_query_deserializes_from_config_shape() {
        let json = r#"{"kind":"procedure","name":"GetQuotePremium","key":"quote","parameter":"QuoteGUID"}"#;
        let query: PremiumQuery = serde_json::from_str(json).unwrap();
        assert_eq!(
            query,
            PremiumQuery::procedure("GetQuotePremium", QuoteKey::Quote, "QuoteGUID")
        );

        let json = r#"{"kind":"procedure","name":"GetDynamicData","key":"quote","parameter":"QuoteGUID","extra":{"TableName":"Dynamic_Data_AlliedHealth"}}"#;
        let query: PremiumQuery = serde_json::from_str(json).unwrap();
        assert_eq!(query, PremiumQuery::defaults()[3]);
    }

    #[test]
    fn test_arguments_ignored_for_policy_information() {
        assert_eq!(
            PremiumQuery::PolicyInformation.with_argument("TableName", "x"),
            PremiumQuery::PolicyInformation
        );
    }
}
