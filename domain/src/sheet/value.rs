//! Cell values as stored in (and computed for) a worksheet

use serde::{Deserialize, Serialize};
use std::fmt;

/// Spreadsheet error literals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorValue {
    Div0,
    Value,
    Ref,
    Name,
    Na,
    Num,
    Null,
}

impl ErrorValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorValue::Div0 => "#DIV/0!",
            ErrorValue::Value => "#VALUE!",
            ErrorValue::Ref => "#REF!",
            ErrorValue::Name => "#NAME?",
            ErrorValue::Na => "#N/A",
            ErrorValue::Num => "#NUM!",
            ErrorValue::Null => "#NULL!",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let upper = text.trim().to_ascii_uppercase();
        [
            ErrorValue::Div0,
            ErrorValue::Value,
            ErrorValue::Ref,
            ErrorValue::Name,
            ErrorValue::Na,
            ErrorValue::Num,
            ErrorValue::Null,
        ]
        .into_iter()
        .find(|e| e.as_str() == upper)
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value held by one cell
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    Error(ErrorValue),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }

    /// Numeric view of the value, if it has one
    ///
    /// Text is accepted when it reads as a number once currency symbols and
    /// thousands separators are stripped, since rating templates often format
    /// premiums as text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Text(s) => parse_number_text(s),
            _ => None,
        }
    }

    /// The value as a strictly positive amount
    pub fn as_positive_amount(&self) -> Option<f64> {
        self.as_number().filter(|n| *n > 0.0)
    }

    /// Text rendering used for string concatenation and display
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
            CellValue::Bool(true) => "TRUE".to_string(),
            CellValue::Bool(false) => "FALSE".to_string(),
            CellValue::Error(e) => e.as_str().to_string(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Parse free-form numeric text such as `$1,200.50`
pub fn parse_number_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Render a number the way a spreadsheet shows it in general format
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        let text = format!("{n}");
        if text.contains('e') {
            text
        } else {
            // Trim binary noise like 0.30000000000000004
            let rounded = format!("{n:.10}");
            rounded
                .trim_end_matches('0')
                .trim_end_matches('.')
                .to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_literals() {
        assert_eq!(ErrorValue::parse("#div/0!"), Some(ErrorValue::Div0));
        assert_eq!(ErrorValue::parse("#N/A"), Some(ErrorValue::Na));
        assert_eq!(ErrorValue::parse("#BOGUS"), None);
        assert_eq!(ErrorValue::Name.to_string(), "#NAME?");
    }

    #[test]
    fn test_as_number_handles_formatted_text() {
        assert_eq!(CellValue::Text("$1,200.50".into()).as_number(), Some(1200.5));
        assert_eq!(CellValue::Text(" 42 ".into()).as_number(), Some(42.0));
        assert_eq!(CellValue::Text("pending".into()).as_number(), None);
        assert_eq!(CellValue::Bool(true).as_number(), None);
        assert_eq!(CellValue::Empty.as_number(), None);
    }

    #[test]
    fn test_positive_amount() {
        assert_eq!(CellValue::Number(1200.5).as_positive_amount(), Some(1200.5));
        assert_eq!(CellValue::Number(0.0).as_positive_amount(), None);
        assert_eq!(CellValue::Number(-5.0).as_positive_amount(), None);
        assert_eq!(CellValue::Number(f64::NAN).as_positive_amount(), None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1500.0), "1500");
        assert_eq!(format_number(0.1 + 0.2), "0.3");
        assert_eq!(format_number(-2.5), "-2.5");
    }

    #[test]
    fn test_to_text() {
        assert_eq!(CellValue::Bool(true).to_text(), "TRUE");
        assert_eq!(CellValue::Error(ErrorValue::Na).to_text(), "#N/A");
        assert_eq!(CellValue::Empty.to_text(), "");
    }
}
