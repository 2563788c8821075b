//! OOXML workbook access
//!
//! Rater templates are zip packages of XML parts. Edits rewrite only the
//! worksheet parts they touch; every other entry is copied unchanged.

mod editor;
pub mod package;
pub mod shared_strings;
pub mod sheet_xml;

pub use editor::OoxmlRaterWorkbook;
pub use package::SheetPart;
pub use sheet_xml::{CellWrite, RawCell};

use package::Package;
use rater_application::WorkbookError;
use rater_domain::CellRef;
use std::collections::{BTreeMap, HashMap};

/// A worksheet loaded with its source XML
pub struct LoadedSheet {
    pub part: SheetPart,
    pub xml: String,
    pub cells: BTreeMap<CellRef, RawCell>,
}

/// Every worksheet plus the shared string table
pub struct LoadedWorkbook {
    pub sheets: Vec<LoadedSheet>,
    pub shared_strings: Vec<String>,
}

impl LoadedWorkbook {
    pub fn load(bytes: &[u8]) -> Result<Self, WorkbookError> {
        let mut package = Package::open(bytes)?;
        let shared_strings = package.shared_strings()?;
        let mut sheets = Vec::new();
        for part in package.sheets()? {
            // Chartsheets and dialog sheets have no cells
            if !package.has_part(&part.path) {
                continue;
            }
            let xml = package.read_text(&part.path)?;
            let cells = sheet_xml::read_cells(&part.path, &xml)?;
            sheets.push(LoadedSheet { part, xml, cells });
        }
        Ok(Self {
            sheets,
            shared_strings,
        })
    }

    /// Index of a sheet by name, ignoring case
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|s| s.part.name == name)
            .or_else(|| {
                self.sheets
                    .iter()
                    .position(|s| s.part.name.eq_ignore_ascii_case(name))
            })
    }

    /// Apply per-sheet cell writes (keyed by sheet index) to the original package
    pub fn write_back(
        &self,
        original: &[u8],
        writes: &BTreeMap<usize, BTreeMap<CellRef, CellWrite>>,
    ) -> Result<Vec<u8>, WorkbookError> {
        let mut replacements = HashMap::new();
        for (index, edits) in writes {
            if edits.is_empty() {
                continue;
            }
            let Some(sheet) = self.sheets.get(*index) else {
                continue;
            };
            let rewritten = sheet_xml::rewrite_cells(&sheet.part.path, &sheet.xml, edits)?;
            replacements.insert(sheet.part.path.clone(), rewritten);
        }
        if replacements.is_empty() {
            return Ok(original.to_vec());
        }
        package::rewrite(original, &replacements)
    }
}
