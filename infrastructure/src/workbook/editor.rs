//! RaterWorkbook adapter over the OOXML package

use super::package::{self, Package};
use super::sheet_xml::{self, CellWrite};
use rater_application::{RaterWorkbook, WorkbookError};
use rater_domain::{CellMapping, CellRef, CellValue};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Edits rater templates in place: only the target sheet part is rewritten
#[derive(Debug, Clone, Copy, Default)]
pub struct OoxmlRaterWorkbook;

impl OoxmlRaterWorkbook {
    pub fn new() -> Self {
        Self
    }

    /// Populate or fail; [`RaterWorkbook::populate_cells`] falls back to the input
    pub fn try_populate(
        &self,
        template: &[u8],
        mapping: &CellMapping,
        sheet: &str,
    ) -> Result<Vec<u8>, WorkbookError> {
        let mut package = Package::open(template)?;
        let target = package.sheet(sheet)?;
        let xml = package.read_text(&target.path)?;

        let edits: BTreeMap<CellRef, CellWrite> = mapping
            .iter()
            .map(|(cell, value)| (*cell, CellWrite::InlineString(value.to_string())))
            .collect();
        let rewritten = sheet_xml::rewrite_cells(&target.path, &xml, &edits)?;

        debug!(
            "Populated {} cell(s) in {} ({})",
            edits.len(),
            target.name,
            target.path
        );
        package::rewrite(template, &HashMap::from([(target.path, rewritten)]))
    }
}

impl RaterWorkbook for OoxmlRaterWorkbook {
    fn populate_cells(&self, template: &[u8], mapping: &CellMapping, sheet: &str) -> Vec<u8> {
        if mapping.is_empty() {
            return template.to_vec();
        }
        match self.try_populate(template, mapping, sheet) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not populate sheet '{}', keeping template unchanged: {}", sheet, e);
                template.to_vec()
            }
        }
    }

    fn read_cell(&self, workbook: &[u8], sheet: &str, cell: &CellRef) -> Result<CellValue, WorkbookError> {
        let mut package = Package::open(workbook)?;
        let target = package.sheet(sheet)?;
        let xml = package.read_text(&target.path)?;
        let cells = sheet_xml::read_cells(&target.path, &xml)?;

        let Some(raw) = cells.get(cell) else {
            return Ok(CellValue::Empty);
        };
        let shared_strings = if raw.kind.as_deref() == Some("s") {
            package.shared_strings()?
        } else {
            Vec::new()
        };
        Ok(raw.resolve(&shared_strings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::test_support::{WorkbookBuilder, entries, part_text};

    fn cell(reference: &str) -> CellRef {
        CellRef::parse(reference).unwrap()
    }

    fn template() -> Vec<u8> {
        WorkbookBuilder::new()
            .sheet(
                "Summary",
                r#"<sheetData><row r="6"><c r="A6" t="s"><v>0</v></c><c r="B6" s="2"><f>submission_data!B20*0.05</f><v>0</v></c></row></sheetData>"#,
            )
            .sheet(
                "submission_data",
                r#"<sheetData><row r="1"><c r="A1" t="s"><v>1</v></c><c r="B1" s="7"><v>42</v></c></row></sheetData>"#,
            )
            .shared_strings(&["Premium", "Insured Name"])
            .part("xl/calcChain.xml", "<calcChain><c r=\"B6\" i=\"1\"/></calcChain>")
            .build()
    }

    #[test]
    fn test_populate_rewrites_only_target_sheet() {
        let template = template();
        let mut mapping = CellMapping::new();
        mapping.set(cell("B1"), "Jane Doe");
        mapping.set(cell("B7"), "TX");

        let populated = OoxmlRaterWorkbook::new().populate_cells(&template, &mapping, "SUBMISSION_DATA");
        assert_ne!(populated, template);

        let before = entries(&template);
        let after = entries(&populated);
        assert_eq!(before.len(), after.len());
        for ((name, old), (_, new)) in before.iter().zip(after.iter()) {
            if name != "xl/worksheets/sheet2.xml" {
                assert_eq!(old, new, "{name} changed");
            }
        }

        let sheet = part_text(&populated, "xl/worksheets/sheet2.xml");
        assert!(sheet.contains(r#"<c r="B1" s="7" t="inlineStr"><is><t>Jane Doe</t></is></c>"#), "{sheet}");
        assert!(sheet.contains(r#"<row r="7"><c r="B7" t="inlineStr"><is><t>TX</t></is></c></row>"#), "{sheet}");
    }

    #[test]
    fn test_populate_failure_returns_original_bytes() {
        let template = template();
        let mut mapping = CellMapping::new();
        mapping.set(cell("B1"), "Jane Doe");

        let workbook = OoxmlRaterWorkbook::new();
        assert_eq!(workbook.populate_cells(&template, &mapping, "No Such Sheet"), template);
        assert_eq!(workbook.populate_cells(b"not a zip", &mapping, "Summary"), b"not a zip");
    }

    #[test]
    fn test_read_cell_values() {
        let template = template();
        let workbook = OoxmlRaterWorkbook::new();

        assert_eq!(
            workbook.read_cell(&template, "submission_data", &cell("A1")).unwrap(),
            CellValue::Text("Insured Name".to_string())
        );
        assert_eq!(
            workbook.read_cell(&template, "submission_data", &cell("B1")).unwrap(),
            CellValue::Number(42.0)
        );
        assert_eq!(
            workbook.read_cell(&template, "Summary", &cell("C9")).unwrap(),
            CellValue::Empty
        );
        assert!(matches!(
            workbook.read_cell(&template, "Rating", &cell("E15")),
            Err(WorkbookError::SheetNotFound(_))
        ));
    }

    #[test]
    fn test_populated_value_reads_back() {
        let mut mapping = CellMapping::new();
        mapping.set(cell("B20"), "250000");
        let workbook = OoxmlRaterWorkbook::new();
        let populated = workbook.populate_cells(&template(), &mapping, "submission_data");

        assert_eq!(
            workbook.read_cell(&populated, "submission_data", &cell("B20")).unwrap(),
            CellValue::Text("250000".to_string())
        );
    }
}
