//! Formula engine: tokenizer, recursive-descent parser and evaluator.
//!
//! Used two ways:
//!
//! - by the in-process calculation backend, with a resolver backed by a workbook
//! - for calculated form fields, where `{field}` placeholders resolve to submitted
//!   values through [`evaluate_with_fields`]

pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;

use crate::sheet::cell_ref::CellRef;
use crate::sheet::value::{CellValue, parse_number_text};
use evaluator::{Evaluator, ReferenceResolver};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use parser::{BinaryOp, Expr, parse};

/// Errors raised while turning formula text into an expression tree
///
/// Evaluation itself never fails: runtime problems become error values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("Empty formula")]
    Empty,

    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedCharacter(char, usize),

    #[error("Unterminated string literal")]
    UnterminatedString,

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),

    #[error("Unexpected end of formula")]
    UnexpectedEnd,

    #[error("Formula produced a non-numeric result: {0}")]
    NotNumeric(String),
}

/// Parse and evaluate formula text against a resolver
pub fn evaluate<R: ReferenceResolver + ?Sized>(
    formula: &str,
    resolver: &R,
) -> Result<CellValue, FormulaError> {
    let expr = parse(formula)?;
    Ok(Evaluator::new(resolver).eval(&expr))
}

/// Whether every function called in the expression is implemented
pub fn is_fully_supported(expr: &Expr) -> bool {
    match expr {
        Expr::Call { name, args } => {
            functions::is_supported(name) && args.iter().all(is_fully_supported)
        }
        Expr::Negate(inner) | Expr::Percent(inner) => is_fully_supported(inner),
        Expr::Binary { left, right, .. } => is_fully_supported(left) && is_fully_supported(right),
        _ => true,
    }
}

/// Resolves `{field}` names to submitted form values; cell references are invalid here
struct FieldResolver<'a> {
    fields: &'a IndexMap<String, serde_json::Value>,
}

impl ReferenceResolver for FieldResolver<'_> {
    fn cell(&self, _sheet: Option<&str>, _cell: CellRef) -> CellValue {
        CellValue::Error(crate::sheet::value::ErrorValue::Ref)
    }

    fn name(&self, name: &str) -> Option<CellValue> {
        let value = self
            .fields
            .get(name)
            .or_else(|| {
                self.fields
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })?;
        // Missing or non-numeric answers count as zero
        let number = match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => parse_number_text(s),
            serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        };
        Some(CellValue::Number(number.unwrap_or(0.0)))
    }
}

/// Evaluate an arithmetic expression over named form fields
pub fn evaluate_with_fields(
    formula: &str,
    fields: &IndexMap<String, serde_json::Value>,
) -> Result<f64, FormulaError> {
    let value = evaluate(formula, &FieldResolver { fields })?;
    match value {
        CellValue::Number(n) => Ok(n),
        other => Err(FormulaError::NotNumeric(other.to_text())),
    }
}

/// A form field whose value is computed from other fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculatedField {
    pub target: String,
    pub formula: String,
}

impl CalculatedField {
    pub fn new(target: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            formula: formula.into(),
        }
    }
}

/// Apply calculated fields in order, each seeing the results of the previous ones
///
/// Fields that fail to evaluate are left unset and reported back.
pub fn apply_calculated_fields(
    fields: &mut IndexMap<String, serde_json::Value>,
    calculations: &[CalculatedField],
) -> Vec<(String, FormulaError)> {
    let mut failures = Vec::new();
    for calc in calculations {
        match evaluate_with_fields(&calc.formula, fields) {
            Ok(n) => {
                let value = serde_json::Number::from_f64(n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null);
                fields.insert(calc.target.clone(), value);
            }
            Err(e) => failures.push((calc.target.clone(), e)),
        }
    }
    failures
}
