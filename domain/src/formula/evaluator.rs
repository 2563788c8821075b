//! Expression evaluation over a pluggable reference resolver

use super::functions;
use super::parser::{BinaryOp, Expr};
use crate::sheet::cell_ref::CellRef;
use crate::sheet::value::{CellValue, ErrorValue};
use std::cmp::Ordering;

/// Supplies cell, range and name values to the evaluator
pub trait ReferenceResolver {
    fn cell(&self, sheet: Option<&str>, cell: CellRef) -> CellValue;

    /// Row-major block of values; the default walks every cell in the block
    fn range(&self, sheet: Option<&str>, start: CellRef, end: CellRef) -> Vec<Vec<CellValue>> {
        (start.row()..=end.row())
            .map(|row| {
                (start.column()..=end.column())
                    .filter_map(|column| CellRef::new(column, row).ok())
                    .map(|cell| self.cell(sheet, cell))
                    .collect()
            })
            .collect()
    }

    fn name(&self, _name: &str) -> Option<CellValue> {
        None
    }
}

/// Evaluated function argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(CellValue),
    Range(Vec<Vec<CellValue>>),
}

impl Arg {
    /// Scalar view; a multi-cell range has none
    pub fn scalar(&self) -> CellValue {
        match self {
            Arg::Value(v) => v.clone(),
            Arg::Range(rows) => match rows.as_slice() {
                [row] if row.len() == 1 => row[0].clone(),
                _ => CellValue::Error(ErrorValue::Value),
            },
        }
    }
}

pub struct Evaluator<'a, R: ReferenceResolver + ?Sized> {
    resolver: &'a R,
}

impl<'a, R: ReferenceResolver + ?Sized> Evaluator<'a, R> {
    pub fn new(resolver: &'a R) -> Self {
        Self { resolver }
    }

    pub fn eval(&self, expr: &Expr) -> CellValue {
        match expr {
            Expr::Number(n) => CellValue::Number(*n),
            Expr::Text(s) => CellValue::Text(s.clone()),
            Expr::Bool(b) => CellValue::Bool(*b),
            Expr::Error(e) => CellValue::Error(*e),
            Expr::Cell { sheet, cell } => self.resolver.cell(sheet.as_deref(), *cell),
            Expr::Range { .. } => self.arg(expr).scalar(),
            Expr::Name(name) => self
                .resolver
                .name(name)
                .unwrap_or(CellValue::Error(ErrorValue::Name)),
            Expr::Negate(inner) => match functions::to_number(&self.eval(inner)) {
                Ok(n) => CellValue::Number(-n),
                Err(e) => CellValue::Error(e),
            },
            Expr::Percent(inner) => match functions::to_number(&self.eval(inner)) {
                Ok(n) => CellValue::Number(n / 100.0),
                Err(e) => CellValue::Error(e),
            },
            Expr::Binary { op, left, right } => {
                let left = self.eval(left);
                let right = self.eval(right);
                binary(*op, &left, &right)
            }
            Expr::Call { name, args } => self.call(name, args),
        }
    }

    pub fn arg(&self, expr: &Expr) -> Arg {
        match expr {
            Expr::Range { sheet, start, end } => {
                Arg::Range(self.resolver.range(sheet.as_deref(), *start, *end))
            }
            other => Arg::Value(self.eval(other)),
        }
    }

    fn call(&self, name: &str, args: &[Expr]) -> CellValue {
        // Lazily evaluated branches
        match name {
            "IF" => {
                if args.len() < 2 || args.len() > 3 {
                    return CellValue::Error(ErrorValue::Value);
                }
                return match functions::to_bool(&self.eval(&args[0])) {
                    Ok(true) => self.eval(&args[1]),
                    Ok(false) => args
                        .get(2)
                        .map(|e| self.eval(e))
                        .unwrap_or(CellValue::Bool(false)),
                    Err(e) => CellValue::Error(e),
                };
            }
            "IFERROR" => {
                if args.len() != 2 {
                    return CellValue::Error(ErrorValue::Value);
                }
                let value = self.eval(&args[0]);
                return if value.is_error() {
                    self.eval(&args[1])
                } else {
                    value
                };
            }
            _ => {}
        }
        let evaluated: Vec<Arg> = args.iter().map(|a| self.arg(a)).collect();
        functions::call(name, &evaluated)
    }
}

fn binary(op: BinaryOp, left: &CellValue, right: &CellValue) -> CellValue {
    match op {
        BinaryOp::Concat => match (functions::to_text(left), functions::to_text(right)) {
            (Ok(a), Ok(b)) => CellValue::Text(a + &b),
            (Err(e), _) | (_, Err(e)) => CellValue::Error(e),
        },
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            if let CellValue::Error(e) = left {
                return CellValue::Error(*e);
            }
            if let CellValue::Error(e) = right {
                return CellValue::Error(*e);
            }
            let ordering = compare(left, right);
            CellValue::Bool(match op {
                BinaryOp::Eq => ordering == Ordering::Equal,
                BinaryOp::Ne => ordering != Ordering::Equal,
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
        _ => {
            let (a, b) = match (functions::to_number(left), functions::to_number(right)) {
                (Ok(a), Ok(b)) => (a, b),
                (Err(e), _) | (_, Err(e)) => return CellValue::Error(e),
            };
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div if b == 0.0 => return CellValue::Error(ErrorValue::Div0),
                BinaryOp::Div => a / b,
                _ => a.powf(b),
            };
            functions::number(result)
        }
    }
}

/// Spreadsheet ordering: numbers < text < booleans; text compares case-insensitively
pub fn compare(left: &CellValue, right: &CellValue) -> Ordering {
    fn rank(v: &CellValue) -> u8 {
        match v {
            CellValue::Number(_) | CellValue::Empty => 0,
            CellValue::Text(_) => 1,
            CellValue::Bool(_) => 2,
            CellValue::Error(_) => 3,
        }
    }
    match (left, right) {
        (CellValue::Empty, CellValue::Text(s)) => {
            if s.is_empty() { Ordering::Equal } else { Ordering::Less }
        }
        (CellValue::Text(s), CellValue::Empty) => {
            if s.is_empty() { Ordering::Equal } else { Ordering::Greater }
        }
        (CellValue::Empty, CellValue::Bool(b)) => false.cmp(b),
        (CellValue::Bool(b), CellValue::Empty) => b.cmp(&false),
        (CellValue::Text(a), CellValue::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (CellValue::Bool(a), CellValue::Bool(b)) => a.cmp(b),
        _ if rank(left) == 0 && rank(right) == 0 => {
            let a = functions::to_number(left).unwrap_or(0.0);
            let b = functions::to_number(right).unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        _ => rank(left).cmp(&rank(right)),
    }
}
