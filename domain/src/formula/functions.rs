//! Built-in worksheet functions and value coercions

use super::evaluator::{Arg, compare};
use crate::sheet::value::{CellValue, ErrorValue, parse_number_text};
use std::cmp::Ordering;

/// Wrap a numeric result, mapping NaN and infinities to `#NUM!`
pub fn number(n: f64) -> CellValue {
    if n.is_finite() {
        CellValue::Number(n)
    } else {
        CellValue::Error(ErrorValue::Num)
    }
}

pub fn to_number(value: &CellValue) -> Result<f64, ErrorValue> {
    match value {
        CellValue::Empty => Ok(0.0),
        CellValue::Number(n) => Ok(*n),
        CellValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        CellValue::Text(s) if s.trim().is_empty() => Ok(0.0),
        CellValue::Text(s) => s.trim().parse::<f64>().map_err(|_| ErrorValue::Value),
        CellValue::Error(e) => Err(*e),
    }
}

pub fn to_bool(value: &CellValue) -> Result<bool, ErrorValue> {
    match value {
        CellValue::Empty => Ok(false),
        CellValue::Bool(b) => Ok(*b),
        CellValue::Number(n) => Ok(*n != 0.0),
        CellValue::Text(s) if s.eq_ignore_ascii_case("TRUE") => Ok(true),
        CellValue::Text(s) if s.eq_ignore_ascii_case("FALSE") => Ok(false),
        CellValue::Text(_) => Err(ErrorValue::Value),
        CellValue::Error(e) => Err(*e),
    }
}

pub fn to_text(value: &CellValue) -> Result<String, ErrorValue> {
    match value {
        CellValue::Error(e) => Err(*e),
        other => Ok(other.to_text()),
    }
}

/// Numbers from every argument: ranges contribute only numeric cells,
/// direct arguments are coerced
fn numbers(args: &[Arg]) -> Result<Vec<f64>, ErrorValue> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Arg::Range(rows) => {
                for value in rows.iter().flatten() {
                    match value {
                        CellValue::Number(n) => out.push(*n),
                        CellValue::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            Arg::Value(value) => out.push(to_number(value)?),
        }
    }
    Ok(out)
}

fn values(args: &[Arg]) -> impl Iterator<Item = CellValue> + '_ {
    args.iter().flat_map(|arg| match arg {
        Arg::Value(v) => vec![v.clone()],
        Arg::Range(rows) => rows.iter().flatten().cloned().collect(),
    })
}

fn arity(args: &[Arg], min: usize, max: usize) -> Result<(), ErrorValue> {
    if args.len() < min || args.len() > max {
        Err(ErrorValue::Value)
    } else {
        Ok(())
    }
}

fn scalar_number(args: &[Arg], index: usize) -> Result<f64, ErrorValue> {
    to_number(&args[index].scalar())
}

fn scalar_text(args: &[Arg], index: usize) -> Result<String, ErrorValue> {
    to_text(&args[index].scalar())
}

fn round_with(args: &[Arg], f: fn(f64) -> f64) -> Result<CellValue, ErrorValue> {
    arity(args, 1, 2)?;
    let value = scalar_number(args, 0)?;
    let digits = if args.len() == 2 {
        scalar_number(args, 1)?.trunc() as i32
    } else {
        0
    };
    let factor = 10f64.powi(digits);
    Ok(number(f(value * factor) / factor))
}

fn logical(args: &[Arg], all: bool) -> Result<CellValue, ErrorValue> {
    let mut seen = false;
    let mut result = all;
    for arg in args {
        let flags: Vec<bool> = match arg {
            Arg::Value(v) => vec![to_bool(v)?],
            Arg::Range(rows) => rows
                .iter()
                .flatten()
                .filter_map(|v| match v {
                    CellValue::Bool(b) => Some(Ok(*b)),
                    CellValue::Number(n) => Some(Ok(*n != 0.0)),
                    CellValue::Error(e) => Some(Err(*e)),
                    _ => None,
                })
                .collect::<Result<_, _>>()?,
        };
        for flag in flags {
            seen = true;
            result = if all { result && flag } else { result || flag };
        }
    }
    if seen {
        Ok(CellValue::Bool(result))
    } else {
        Err(ErrorValue::Value)
    }
}

fn lookup_matches(candidate: &CellValue, wanted: &CellValue) -> bool {
    match (candidate, wanted) {
        (CellValue::Text(a), CellValue::Text(b)) => a.eq_ignore_ascii_case(b),
        (CellValue::Number(a), CellValue::Number(b)) => a == b,
        (CellValue::Bool(a), CellValue::Bool(b)) => a == b,
        _ => false,
    }
}

fn vlookup(args: &[Arg]) -> Result<CellValue, ErrorValue> {
    arity(args, 3, 4)?;
    let wanted = args[0].scalar();
    if let CellValue::Error(e) = wanted {
        return Err(e);
    }
    let Arg::Range(rows) = &args[1] else {
        return Err(ErrorValue::Na);
    };
    let column = scalar_number(args, 2)?.trunc();
    if column < 1.0 {
        return Err(ErrorValue::Value);
    }
    let column = column as usize - 1;
    let approximate = match args.get(3) {
        Some(arg) => to_bool(&arg.scalar())?,
        None => true,
    };

    let found = if approximate {
        // Sorted first column: last row whose key is <= the wanted value
        let mut best = None;
        for (i, row) in rows.iter().enumerate() {
            let Some(key) = row.first() else { continue };
            if key.is_empty() {
                continue;
            }
            if compare(key, &wanted) == Ordering::Greater {
                break;
            }
            best = Some(i);
        }
        best
    } else {
        rows.iter()
            .position(|row| row.first().is_some_and(|key| lookup_matches(key, &wanted)))
    };

    let row = found.ok_or(ErrorValue::Na)?;
    rows[row].get(column).cloned().ok_or(ErrorValue::Ref)
}

fn dispatch(name: &str, args: &[Arg]) -> Result<CellValue, ErrorValue> {
    match name {
        "SUM" => Ok(number(numbers(args)?.iter().sum())),
        "AVERAGE" => {
            let nums = numbers(args)?;
            if nums.is_empty() {
                return Err(ErrorValue::Div0);
            }
            Ok(number(nums.iter().sum::<f64>() / nums.len() as f64))
        }
        "MIN" => Ok(number(numbers(args)?.into_iter().reduce(f64::min).unwrap_or(0.0))),
        "MAX" => Ok(number(numbers(args)?.into_iter().reduce(f64::max).unwrap_or(0.0))),
        "COUNT" => {
            let count = args
                .iter()
                .map(|arg| match arg {
                    Arg::Value(v) => usize::from(to_number(v).is_ok() && !v.is_empty()),
                    Arg::Range(rows) => rows
                        .iter()
                        .flatten()
                        .filter(|v| matches!(v, CellValue::Number(_)))
                        .count(),
                })
                .sum::<usize>();
            Ok(CellValue::Number(count as f64))
        }
        "COUNTA" => Ok(CellValue::Number(
            values(args).filter(|v| !matches!(v, CellValue::Empty)).count() as f64,
        )),
        "AND" => logical(args, true),
        "OR" => logical(args, false),
        "NOT" => {
            arity(args, 1, 1)?;
            Ok(CellValue::Bool(!to_bool(&args[0].scalar())?))
        }
        "ABS" => {
            arity(args, 1, 1)?;
            Ok(number(scalar_number(args, 0)?.abs()))
        }
        "ROUND" => round_with(args, f64::round),
        "ROUNDUP" => round_with(args, |x| if x < 0.0 { x.floor() } else { x.ceil() }),
        "ROUNDDOWN" => round_with(args, f64::trunc),
        "CONCATENATE" | "CONCAT" => {
            let mut out = String::new();
            for value in values(args) {
                out.push_str(&to_text(&value)?);
            }
            Ok(CellValue::Text(out))
        }
        "UPPER" => {
            arity(args, 1, 1)?;
            Ok(CellValue::Text(scalar_text(args, 0)?.to_uppercase()))
        }
        "LOWER" => {
            arity(args, 1, 1)?;
            Ok(CellValue::Text(scalar_text(args, 0)?.to_lowercase()))
        }
        "LEN" => {
            arity(args, 1, 1)?;
            Ok(CellValue::Number(scalar_text(args, 0)?.chars().count() as f64))
        }
        "TRIM" => {
            arity(args, 1, 1)?;
            let text = scalar_text(args, 0)?;
            Ok(CellValue::Text(text.split_whitespace().collect::<Vec<_>>().join(" ")))
        }
        "VALUE" => {
            arity(args, 1, 1)?;
            match args[0].scalar() {
                CellValue::Number(n) => Ok(CellValue::Number(n)),
                CellValue::Error(e) => Err(e),
                other => parse_number_text(&other.to_text())
                    .map(CellValue::Number)
                    .ok_or(ErrorValue::Value),
            }
        }
        "VLOOKUP" => vlookup(args),
        _ => Err(ErrorValue::Name),
    }
}

/// Invoke a built-in; unknown names yield `#NAME?`
pub fn call(name: &str, args: &[Arg]) -> CellValue {
    dispatch(name, args).unwrap_or_else(CellValue::Error)
}

/// Whether `name` is a function this engine implements
pub fn is_supported(name: &str) -> bool {
    matches!(name, "IF" | "IFERROR") || dispatch(name, &[]) != Err(ErrorValue::Name)
}
