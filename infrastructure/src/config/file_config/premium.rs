//! Premium lookup configuration from TOML (`[premium]` section)

use rater_domain::PremiumQuery;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePremiumConfig {
    /// Supplementary lookups tried after the quote-options result table.
    /// `None` keeps the built-in order; an empty list disables them.
    pub queries: Option<Vec<PremiumQuery>>,
}

impl FilePremiumConfig {
    pub fn queries(&self) -> Vec<PremiumQuery> {
        self.queries.clone().unwrap_or_else(PremiumQuery::defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rater_domain::QuoteKey;

    #[test]
    fn test_default_queries() {
        assert_eq!(FilePremiumConfig::default().queries(), PremiumQuery::defaults());
    }

    #[test]
    fn test_configured_queries() {
        let toml_str = r#"
[[queries]]
kind = "procedure"
name = "GetRatedPremium"
key = "quote"
parameter = "QuoteGUID"

[[queries]]
kind = "procedure"
name = "GetDynamicData"
key = "quote"
parameter = "QuoteGUID"
extra = { TableName = "Dynamic_Data_Liability" }
"#;
        let config: FilePremiumConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.queries(),
            vec![
                PremiumQuery::procedure("GetRatedPremium", QuoteKey::Quote, "QuoteGUID"),
                PremiumQuery::procedure("GetDynamicData", QuoteKey::Quote, "QuoteGUID")
                    .with_argument("TableName", "Dynamic_Data_Liability"),
            ]
        );
    }
}
