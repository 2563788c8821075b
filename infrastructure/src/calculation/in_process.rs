//! Embedded formula evaluation over the loaded workbook

use crate::workbook::{CellWrite, LoadedWorkbook};
use async_trait::async_trait;
use rater_application::{CalculationBackend, CalculationContext, CalculationError, WorkbookError};
use rater_domain::formula::evaluator::{Evaluator, ReferenceResolver};
use rater_domain::formula::{Expr, is_fully_supported, parse};
use rater_domain::{CalculationMethod, CellRef, CellValue, ErrorValue};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

type Key = (usize, CellRef);

/// Nested evaluations allowed before a cell falls back to its stored value.
/// Only cycles reach this; acyclic chains are pre-ordered.
const MAX_NESTING: usize = 256;

/// Recalculates every formula cell and writes the results back as cached values.
///
/// Formulas the engine cannot handle (unknown functions, defined names,
/// shared-formula children) keep the value Excel last stored.
pub struct InProcessBackend;

impl InProcessBackend {
    pub fn new() -> Self {
        Self
    }

    pub fn recalculate(bytes: &[u8]) -> Result<Vec<u8>, WorkbookError> {
        let workbook = LoadedWorkbook::load(bytes)?;
        let engine = Engine::new(&workbook);

        let mut writes: BTreeMap<usize, BTreeMap<CellRef, CellWrite>> = BTreeMap::new();
        let mut evaluated = 0usize;
        for (index, sheet) in workbook.sheets.iter().enumerate() {
            for (cell, raw) in &sheet.cells {
                if raw.formula.is_none() || engine.compiled(index, cell).is_none() {
                    continue;
                }
                evaluated += 1;
                let value = engine.evaluate(index, *cell);
                if value != raw.resolve(&workbook.shared_strings) {
                    writes
                        .entry(index)
                        .or_default()
                        .insert(*cell, CellWrite::CachedValue(value));
                }
            }
        }

        let changed: usize = writes.values().map(BTreeMap::len).sum();
        debug!("Evaluated {} formula(s), {} cached value(s) changed", evaluated, changed);
        workbook.write_back(bytes, &writes)
    }
}

impl Default for InProcessBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CalculationBackend for InProcessBackend {
    fn method(&self) -> CalculationMethod {
        CalculationMethod::InProcess
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn calculate(
        &self,
        workbook: &[u8],
        _context: &CalculationContext,
    ) -> Result<Vec<u8>, CalculationError> {
        let bytes = workbook.to_vec();
        tokio::task::spawn_blocking(move || Self::recalculate(&bytes))
            .await
            .map_err(|e| CalculationError::Process(e.to_string()))?
            .map_err(|e| CalculationError::Workbook(e.to_string()))
    }
}

/// Memoized, cycle-aware evaluation of one workbook
struct Engine<'w> {
    workbook: &'w LoadedWorkbook,
    /// Parsed formulas; `None` marks a formula the engine leaves alone
    compiled: HashMap<Key, Option<Expr>>,
    /// Formula cells per sheet, for expanding range dependencies
    formula_cells: Vec<Vec<CellRef>>,
    memo: RefCell<HashMap<Key, CellValue>>,
    in_progress: RefCell<HashSet<Key>>,
    nesting: Cell<usize>,
}

impl<'w> Engine<'w> {
    fn new(workbook: &'w LoadedWorkbook) -> Self {
        let mut compiled = HashMap::new();
        let mut formula_cells = vec![Vec::new(); workbook.sheets.len()];
        for (index, sheet) in workbook.sheets.iter().enumerate() {
            for (cell, raw) in &sheet.cells {
                if let Some(formula) = &raw.formula {
                    let expr = parse(formula)
                        .ok()
                        .filter(|expr| is_fully_supported(expr) && !uses_names(expr));
                    if expr.is_some() {
                        formula_cells[index].push(*cell);
                    }
                    compiled.insert((index, *cell), expr);
                }
            }
        }
        Self {
            workbook,
            compiled,
            formula_cells,
            memo: RefCell::new(HashMap::new()),
            in_progress: RefCell::new(HashSet::new()),
            nesting: Cell::new(0),
        }
    }

    fn compiled(&self, sheet: usize, cell: &CellRef) -> Option<&Expr> {
        self.compiled.get(&(sheet, *cell)).and_then(Option::as_ref)
    }

    fn cached(&self, sheet: usize, cell: CellRef) -> CellValue {
        self.workbook.sheets[sheet]
            .cells
            .get(&cell)
            .map(|raw| raw.resolve(&self.workbook.shared_strings))
            .unwrap_or_default()
    }

    /// Evaluates `cell` after every formula it depends on, walking the
    /// dependency graph with an explicit stack so long chains stay flat.
    fn evaluate(&self, sheet: usize, cell: CellRef) -> CellValue {
        let mut visiting = HashSet::new();
        let mut stack = vec![((sheet, cell), false)];
        while let Some((key, expanded)) = stack.pop() {
            if expanded {
                visiting.remove(&key);
                self.value(key.0, key.1);
                continue;
            }
            if self.memo.borrow().contains_key(&key) || !visiting.insert(key) {
                continue;
            }
            let Some(expr) = self.compiled(key.0, &key.1) else {
                visiting.remove(&key);
                continue;
            };
            stack.push((key, true));
            let mut dependencies = Vec::new();
            self.dependencies(key.0, expr, &mut dependencies);
            stack.extend(
                dependencies
                    .into_iter()
                    .filter(|dep| !visiting.contains(dep))
                    .map(|dep| (dep, false)),
            );
        }
        self.value(sheet, cell)
    }

    /// Formula cells referenced by `expr`, including those inside ranges
    fn dependencies(&self, sheet: usize, expr: &Expr, out: &mut Vec<Key>) {
        match expr {
            Expr::Cell { sheet: name, cell } => {
                if let Some(index) = self.resolve_sheet(sheet, name.as_deref()) {
                    out.push((index, *cell));
                }
            }
            Expr::Range { sheet: name, start, end } => {
                if let Some(index) = self.resolve_sheet(sheet, name.as_deref()) {
                    let rows = start.row().min(end.row())..=start.row().max(end.row());
                    let columns = start.column().min(end.column())..=start.column().max(end.column());
                    out.extend(
                        self.formula_cells[index]
                            .iter()
                            .filter(|c| rows.contains(&c.row()) && columns.contains(&c.column()))
                            .map(|c| (index, *c)),
                    );
                }
            }
            Expr::Negate(inner) | Expr::Percent(inner) => self.dependencies(sheet, inner, out),
            Expr::Binary { left, right, .. } => {
                self.dependencies(sheet, left, out);
                self.dependencies(sheet, right, out);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    self.dependencies(sheet, arg, out);
                }
            }
            _ => {}
        }
    }

    fn resolve_sheet(&self, current: usize, name: Option<&str>) -> Option<usize> {
        match name {
            None => Some(current),
            Some(name) => self.workbook.sheet_index(name),
        }
    }

    fn value(&self, sheet: usize, cell: CellRef) -> CellValue {
        let key = (sheet, cell);
        if let Some(value) = self.memo.borrow().get(&key) {
            return value.clone();
        }
        let Some(expr) = self.compiled(sheet, &cell) else {
            return self.cached(sheet, cell);
        };
        // Circular reference: fall back to the stored result
        if !self.in_progress.borrow_mut().insert(key) {
            return self.cached(sheet, cell);
        }
        let depth = self.nesting.get();
        if depth >= MAX_NESTING {
            warn!("Formula nesting too deep at {}, keeping stored value", cell);
            self.in_progress.borrow_mut().remove(&key);
            return self.cached(sheet, cell);
        }

        self.nesting.set(depth + 1);
        let scope = SheetScope { engine: self, sheet };
        let value = Evaluator::new(&scope).eval(expr);
        self.nesting.set(depth);

        self.in_progress.borrow_mut().remove(&key);
        self.memo.borrow_mut().insert(key, value.clone());
        value
    }
}

/// Resolves unqualified references against one sheet
struct SheetScope<'e, 'w> {
    engine: &'e Engine<'w>,
    sheet: usize,
}

impl ReferenceResolver for SheetScope<'_, '_> {
    fn cell(&self, sheet: Option<&str>, cell: CellRef) -> CellValue {
        match self.engine.resolve_sheet(self.sheet, sheet) {
            Some(index) => self.engine.value(index, cell),
            None => CellValue::Error(ErrorValue::Ref),
        }
    }
}

fn uses_names(expr: &Expr) -> bool {
    match expr {
        Expr::Name(_) => true,
        Expr::Negate(inner) | Expr::Percent(inner) => uses_names(inner),
        Expr::Binary { left, right, .. } => uses_names(left) || uses_names(right),
        Expr::Call { args, .. } => args.iter().any(uses_names),
        _ => false,
    }
}
