//! Worksheet XML: cell reader and streaming, format-preserving cell rewrite.
//!
//! The rewrite copies every event it does not need to touch, so untouched
//! rows, cells, formulas and worksheet-level elements keep their exact text.

use super::package::{attribute, xml_error};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use rater_application::WorkbookError;
use rater_domain::{CellRef, CellValue, ErrorValue, parse_number_text};
use std::collections::BTreeMap;
use tracing::warn;

/// A cell as stored in the sheet part
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCell {
    /// The `t` attribute
    pub kind: Option<String>,
    /// Text of `<v>`
    pub value: Option<String>,
    /// Text of an `<is>` inline string
    pub inline: Option<String>,
    /// Formula text; `None` for constants and shared-formula children
    pub formula: Option<String>,
}

impl RawCell {
    /// The cached value, resolving shared strings
    pub fn resolve(&self, shared_strings: &[String]) -> CellValue {
        let value = self.value.as_deref();
        match self.kind.as_deref() {
            Some("s") => value
                .and_then(|v| v.trim().parse::<usize>().ok())
                .and_then(|index| shared_strings.get(index))
                .map(|s| CellValue::Text(s.clone()))
                .unwrap_or(CellValue::Empty),
            Some("inlineStr") => self
                .inline
                .clone()
                .or_else(|| self.value.clone())
                .map(CellValue::Text)
                .unwrap_or(CellValue::Empty),
            Some("str") | Some("d") => value.map(|v| CellValue::Text(v.to_string())).unwrap_or(CellValue::Empty),
            Some("b") => value
                .map(|v| CellValue::Bool(v.trim() == "1" || v.trim().eq_ignore_ascii_case("true")))
                .unwrap_or(CellValue::Empty),
            Some("e") => value
                .map(|v| match ErrorValue::parse(v.trim()) {
                    Some(e) => CellValue::Error(e),
                    None => CellValue::Text(v.to_string()),
                })
                .unwrap_or(CellValue::Empty),
            _ => match value {
                Some(v) if !v.trim().is_empty() => match parse_number_text(v) {
                    Some(n) => CellValue::Number(n),
                    None => CellValue::Text(v.to_string()),
                },
                _ => CellValue::Empty,
            },
        }
    }
}

/// What to write into one cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellWrite {
    /// Replace the cell content with an inline string; formula and cached value are dropped
    InlineString(String),
    /// Keep the formula and replace only its cached value
    CachedValue(CellValue),
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Value,
    Formula,
    InlineText,
}

/// Read every cell of a worksheet part
pub fn read_cells(part: &str, xml: &str) -> Result<BTreeMap<CellRef, RawCell>, WorkbookError> {
    let mut reader = Reader::from_str(xml);
    let mut cells = BTreeMap::new();
    let mut position = Position::default();
    let mut current: Option<(CellRef, RawCell)> = None;
    let mut field: Option<Field> = None;
    let mut formula_kind: Option<String> = None;
    let mut formula_text = String::new();
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event().map_err(|e| xml_error(part, e))? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    position.enter_row(&e);
                }
                b"c" => {
                    current = position
                        .enter_cell(&e)
                        .map(|cell| (cell, RawCell { kind: attribute(&e, b"t"), ..Default::default() }));
                }
                b"v" => field = Some(Field::Value),
                b"f" => {
                    field = Some(Field::Formula);
                    formula_kind = attribute(&e, b"t");
                    formula_text.clear();
                }
                b"rPh" => phonetic_depth += 1,
                b"t" if phonetic_depth == 0 => field = Some(Field::InlineText),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    position.enter_row(&e);
                }
                // Self-closing cells carry style only
                b"c" => {
                    position.enter_cell(&e);
                }
                _ => {}
            },
            Event::Text(t) => {
                if let (Some(field), Some((_, cell))) = (field, current.as_mut()) {
                    let text = t.unescape().map_err(|e| xml_error(part, e))?;
                    append(cell, field, &text, &mut formula_text);
                }
            }
            Event::CData(c) => {
                if let (Some(field), Some((_, cell))) = (field, current.as_mut()) {
                    append(cell, field, &String::from_utf8_lossy(&c), &mut formula_text);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"c" => {
                    if let Some((cell, raw)) = current.take() {
                        cells.insert(cell, raw);
                    }
                }
                b"f" => {
                    field = None;
                    let shared_child = formula_text.trim().is_empty();
                    let data_table = formula_kind.as_deref() == Some("dataTable");
                    if !shared_child
                        && !data_table
                        && let Some((_, cell)) = current.as_mut()
                    {
                        cell.formula = Some(formula_text.clone());
                    }
                }
                b"v" | b"t" => field = None,
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(cells)
}

fn append(cell: &mut RawCell, field: Field, text: &str, formula: &mut String) {
    match field {
        Field::Value => cell.value.get_or_insert_with(String::new).push_str(text),
        Field::InlineText => cell.inline.get_or_insert_with(String::new).push_str(text),
        Field::Formula => formula.push_str(text),
    }
}

/// Row/column tracking; `r` attributes are optional in the format
#[derive(Default)]
struct Position {
    row: u32,
    column: u32,
}

impl Position {
    fn enter_row(&mut self, e: &BytesStart<'_>) -> u32 {
        self.row = attribute(e, b"r")
            .and_then(|r| r.trim().parse().ok())
            .unwrap_or(self.row + 1);
        self.column = 0;
        self.row
    }

    fn enter_cell(&mut self, e: &BytesStart<'_>) -> Option<CellRef> {
        let cell = match attribute(e, b"r").and_then(|r| CellRef::parse(&r).ok()) {
            Some(cell) => cell,
            None => CellRef::new(self.column + 1, self.row.max(1)).ok()?,
        };
        self.row = cell.row();
        self.column = cell.column();
        Some(cell)
    }
}

type RowEdits<'e> = BTreeMap<u32, (CellRef, &'e CellWrite)>;

/// Rewrite a worksheet part with the given cell writes.
///
/// Rows and cells are found or created in order. Edited cells keep their
/// other attributes (style `s` in particular). A touched row loses its
/// `spans` hint, which is optional and would otherwise go stale.
pub fn rewrite_cells(
    part: &str,
    xml: &str,
    edits: &BTreeMap<CellRef, CellWrite>,
) -> Result<Vec<u8>, WorkbookError> {
    let mut pending: BTreeMap<u32, RowEdits<'_>> = BTreeMap::new();
    for (cell, write) in edits {
        pending
            .entry(cell.row())
            .or_default()
            .insert(cell.column(), (*cell, write));
    }

    let mut reader = Reader::from_str(xml);
    let mut out = SheetWriter {
        part,
        writer: Writer::new(Vec::with_capacity(xml.len() + edits.len() * 64)),
        prefix: String::new(),
    };
    let mut position = Position::default();
    let mut in_sheet_data = false;
    let mut seen_sheet_data = false;
    let mut open_row: Option<RowEdits<'_>> = None;

    loop {
        let event = reader.read_event().map_err(|e| xml_error(part, e))?;
        match event {
            Event::Eof => break,
            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                out.prefix = element_prefix(&e);
                seen_sheet_data = true;
                in_sheet_data = true;
                out.write(Event::Start(e))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                out.prefix = element_prefix(&e);
                seen_sheet_data = true;
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                out.write(Event::Start(e))?;
                out.new_rows(std::mem::take(&mut pending))?;
                out.write(Event::End(BytesEnd::new(name)))?;
            }
            Event::End(e) if in_sheet_data && e.local_name().as_ref() == b"sheetData" => {
                out.new_rows(std::mem::take(&mut pending))?;
                in_sheet_data = false;
                out.write(Event::End(e))?;
            }
            Event::Start(e) if in_sheet_data && open_row.is_none() && e.local_name().as_ref() == b"row" => {
                let row = position.enter_row(&e);
                out.new_rows(split_before(&mut pending, row))?;
                match pending.remove(&row) {
                    Some(row_edits) => {
                        out.write(Event::Start(without_attribute(&e, b"spans")))?;
                        open_row = Some(row_edits);
                    }
                    None => out.write(Event::Start(e))?,
                }
            }
            Event::Empty(e) if in_sheet_data && open_row.is_none() && e.local_name().as_ref() == b"row" => {
                let row = position.enter_row(&e);
                out.new_rows(split_before(&mut pending, row))?;
                match pending.remove(&row) {
                    Some(row_edits) => {
                        let start = without_attribute(&e, b"spans");
                        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                        out.write(Event::Start(start))?;
                        out.new_cells(row_edits)?;
                        out.write(Event::End(BytesEnd::new(name)))?;
                    }
                    None => out.write(Event::Empty(e))?,
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"row" && open_row.is_some() => {
                if let Some(row_edits) = open_row.take() {
                    out.new_cells(row_edits)?;
                }
                out.write(Event::End(e))?;
            }
            Event::Start(e) if e.local_name().as_ref() == b"c" && open_row.is_some() => {
                let children = collect_children(part, &mut reader)?;
                if let Some(row_edits) = open_row.as_mut() {
                    out.cell(&mut position, row_edits, e, Some(children))?;
                }
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" && open_row.is_some() => {
                if let Some(row_edits) = open_row.as_mut() {
                    out.cell(&mut position, row_edits, e, None)?;
                }
            }
            other => out.write(other)?,
        }
    }

    if !seen_sheet_data {
        return Err(xml_error(part, "worksheet has no sheetData element"));
    }
    Ok(out.writer.into_inner())
}

/// Entries with a key below `key`, removed from `map`
fn split_before<V>(map: &mut BTreeMap<u32, V>, key: u32) -> BTreeMap<u32, V> {
    let rest = map.split_off(&key);
    std::mem::replace(map, rest)
}

/// Owned events up to (not including) the end tag closing the current element
fn collect_children(part: &str, reader: &mut Reader<&[u8]>) -> Result<Vec<Event<'static>>, WorkbookError> {
    let mut depth = 0usize;
    let mut children = Vec::new();
    loop {
        let event = reader.read_event().map_err(|e| xml_error(part, e))?;
        match &event {
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => return Ok(children),
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(xml_error(part, "unexpected end of worksheet inside a cell")),
            _ => {}
        }
        children.push(event.into_owned());
    }
}

/// `x:` for `<x:sheetData>`, empty for the default namespace
fn element_prefix(e: &BytesStart<'_>) -> String {
    e.name()
        .prefix()
        .map(|p| format!("{}:", String::from_utf8_lossy(p.as_ref())))
        .unwrap_or_default()
}

fn without_attribute(e: &BytesStart<'_>, key: &[u8]) -> BytesStart<'static> {
    without_attributes(e, &[key])
}

fn without_attributes(e: &BytesStart<'_>, keys: &[&[u8]]) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut start = BytesStart::new(name);
    for attr in e.attributes().flatten() {
        if !keys.contains(&attr.key.as_ref()) {
            start.push_attribute(attr);
        }
    }
    start
}

/// `(t attribute, <v> text)` for a cached formula result
fn cached_value(value: &CellValue) -> (Option<&'static str>, String) {
    match value {
        CellValue::Number(n) if n.is_finite() => (None, n.to_string()),
        CellValue::Number(_) => (Some("e"), ErrorValue::Num.as_str().to_string()),
        CellValue::Text(s) => (Some("str"), s.clone()),
        CellValue::Bool(b) => (Some("b"), if *b { "1" } else { "0" }.to_string()),
        CellValue::Error(e) => (Some("e"), e.as_str().to_string()),
        // A formula pointing at a blank cell shows 0
        CellValue::Empty => (None, "0".to_string()),
    }
}

/// `<f t="shared" ref="..">`: the cell other cells borrow their formula from
fn defines_shared_formula(children: &[Event<'static>]) -> bool {
    children.iter().any(|event| match event {
        Event::Start(e) | Event::Empty(e) => {
            e.local_name().as_ref() == b"f"
                && attribute(e, b"t").as_deref() == Some("shared")
                && attribute(e, b"ref").is_some()
        }
        _ => false,
    })
}

fn is_value_element(e: &BytesStart<'_>) -> bool {
    matches!(e.local_name().as_ref(), b"v" | b"is")
}

struct SheetWriter<'p> {
    part: &'p str,
    writer: Writer<Vec<u8>>,
    /// Namespace prefix used by the sheet's own elements
    prefix: String,
}

impl SheetWriter<'_> {
    fn write<'a>(&mut self, event: Event<'a>) -> Result<(), WorkbookError> {
        self.writer
            .write_event(event)
            .map_err(|e| xml_error(self.part, e))
    }

    fn name(&self, local: &str) -> String {
        format!("{}{}", self.prefix, local)
    }

    fn new_rows(&mut self, rows: BTreeMap<u32, RowEdits<'_>>) -> Result<(), WorkbookError> {
        for (row, cells) in rows {
            let name = self.name("row");
            let mut start = BytesStart::new(name.clone());
            start.push_attribute(("r", row.to_string().as_str()));
            self.write(Event::Start(start))?;
            self.new_cells(cells)?;
            self.write(Event::End(BytesEnd::new(name)))?;
        }
        Ok(())
    }

    fn new_cells(&mut self, cells: RowEdits<'_>) -> Result<(), WorkbookError> {
        for (cell, write) in cells.into_values() {
            let mut start = BytesStart::new(self.name("c"));
            start.push_attribute(("r", cell.to_string().as_str()));
            self.cell_content(start, &[], write)?;
        }
        Ok(())
    }

    /// An existing cell inside a row with pending edits
    fn cell(
        &mut self,
        position: &mut Position,
        row_edits: &mut RowEdits<'_>,
        e: BytesStart<'_>,
        children: Option<Vec<Event<'static>>>,
    ) -> Result<(), WorkbookError> {
        let column = position.enter_cell(&e).map(|c| c.column()).unwrap_or(0);
        self.new_cells(split_before(row_edits, column))?;

        match (row_edits.remove(&column), children) {
            // Dropping the anchor would orphan every cell sharing its formula
            (Some((cell, CellWrite::InlineString(_))), Some(children))
                if defines_shared_formula(&children) =>
            {
                warn!("{} in {} anchors a shared formula; left unchanged", cell, self.part);
                self.copy_cell(e, children)
            }
            (Some((_, write)), children) => {
                let start = match write {
                    CellWrite::InlineString(_) => without_attributes(&e, &[b"t", b"cm", b"vm"]),
                    CellWrite::CachedValue(_) => without_attributes(&e, &[b"t", b"vm"]),
                };
                self.cell_content(start, children.as_deref().unwrap_or(&[]), write)
            }
            (None, Some(children)) => self.copy_cell(e, children),
            (None, None) => self.write(Event::Empty(e)),
        }
    }

    fn copy_cell(&mut self, e: BytesStart<'_>, children: Vec<Event<'static>>) -> Result<(), WorkbookError> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        self.write(Event::Start(e))?;
        for child in children {
            self.write(child)?;
        }
        self.write(Event::End(BytesEnd::new(name)))
    }

    /// Write a cell element from its start tag (without `t`) and prior children
    fn cell_content(
        &mut self,
        mut start: BytesStart<'static>,
        children: &[Event<'static>],
        write: &CellWrite,
    ) -> Result<(), WorkbookError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        match write {
            CellWrite::InlineString(text) => {
                start.push_attribute(("t", "inlineStr"));
                self.write(Event::Start(start))?;
                self.inline_string(text)?;
            }
            CellWrite::CachedValue(value) => {
                let (kind, text) = cached_value(value);
                if let Some(kind) = kind {
                    start.push_attribute(("t", kind));
                }
                self.write(Event::Start(start))?;
                self.children_with_value(children, &text)?;
            }
        }
        self.write(Event::End(BytesEnd::new(name)))
    }

    fn inline_string(&mut self, text: &str) -> Result<(), WorkbookError> {
        let is = self.name("is");
        let t = self.name("t");
        self.write(Event::Start(BytesStart::new(is.clone())))?;
        let mut t_start = BytesStart::new(t.clone());
        if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) || text.contains('\n') {
            t_start.push_attribute(("xml:space", "preserve"));
        }
        self.write(Event::Start(t_start))?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.write(Event::End(BytesEnd::new(t)))?;
        self.write(Event::End(BytesEnd::new(is)))
    }

    /// Copy children except old values, placing `<v>` after the formula
    fn children_with_value(&mut self, children: &[Event<'static>], text: &str) -> Result<(), WorkbookError> {
        let mut depth = 0usize;
        let mut skipping = false;
        let mut value_written = false;

        for event in children {
            let top_level = depth == 0;
            match event {
                Event::Start(e) => {
                    depth += 1;
                    if top_level {
                        skipping = is_value_element(e);
                        if !skipping && e.local_name().as_ref() != b"f" && !value_written {
                            self.value(text)?;
                            value_written = true;
                        }
                    }
                }
                Event::Empty(e) if top_level => {
                    if is_value_element(e) {
                        continue;
                    }
                    if e.local_name().as_ref() != b"f" && !value_written {
                        self.value(text)?;
                        value_written = true;
                    }
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 && skipping {
                        skipping = false;
                        continue;
                    }
                }
                _ => {}
            }
            if !skipping {
                self.write(event.clone())?;
            }
        }

        if !value_written {
            self.value(text)?;
        }
        Ok(())
    }

    fn value(&mut self, text: &str) -> Result<(), WorkbookError> {
        let v = self.name("v");
        self.write(Event::Start(BytesStart::new(v.clone())))?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.write(Event::End(BytesEnd::new(v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PART: &str = "xl/worksheets/sheet1.xml";

    fn worksheet(sheet_data: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1:C3"/>{sheet_data}<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#
        )
    }

    fn cell(reference: &str) -> CellRef {
        CellRef::parse(reference).unwrap()
    }

    fn inline(edits: &[(&str, &str)]) -> BTreeMap<CellRef, CellWrite> {
        edits
            .iter()
            .map(|(r, v)| (cell(r), CellWrite::InlineString(v.to_string())))
            .collect()
    }

    fn rewrite(xml: &str, edits: &BTreeMap<CellRef, CellWrite>) -> String {
        String::from_utf8(rewrite_cells(PART, xml, edits).unwrap()).unwrap()
    }

    #[test]
    fn test_read_cells_all_kinds() {
        let xml = worksheet(
            r#"<sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>1250.5</v></c><c r="C1" t="b"><v>1</v></c></row>
<row r="2"><c r="A2" t="inlineStr"><is><t>Jane</t></is></c><c r="B2"><f>B1*2</f><v>2501</v></c><c r="C2" t="e"><v>#DIV/0!</v></c></row>
<row r="3"><c r="A3" s="4"/><c r="B3"><f t="shared" si="0"/><v>7</v></c><c r="C3" t="str"><f>"a"&amp;"b"</f><v>ab</v></c></row>
</sheetData>"#,
        );
        let cells = read_cells(PART, &xml).unwrap();
        let shared = vec!["Premium".to_string()];
        let value = |r: &str| cells.get(&cell(r)).map(|c| c.resolve(&shared)).unwrap_or_default();

        assert_eq!(value("A1"), CellValue::Text("Premium".to_string()));
        assert_eq!(value("B1"), CellValue::Number(1250.5));
        assert_eq!(value("C1"), CellValue::Bool(true));
        assert_eq!(value("A2"), CellValue::Text("Jane".to_string()));
        assert_eq!(value("B2"), CellValue::Number(2501.0));
        assert_eq!(value("C2"), CellValue::Error(ErrorValue::Div0));
        assert_eq!(value("A3"), CellValue::Empty);
        assert_eq!(value("C3"), CellValue::Text("ab".to_string()));

        assert_eq!(cells[&cell("B2")].formula.as_deref(), Some("B1*2"));
        assert_eq!(cells[&cell("C3")].formula.as_deref(), Some(r#""a"&"b""#));
        // Shared-formula children keep only their cached value
        assert_eq!(cells[&cell("B3")].formula, None);
    }

    #[test]
    fn test_read_cells_without_references() {
        let xml = worksheet("<sheetData><row><c><v>1</v></c><c><v>2</v></c></row><row><c><v>3</v></c></row></sheetData>");
        let cells = read_cells(PART, &xml).unwrap();
        assert_eq!(cells[&cell("B1")].value.as_deref(), Some("2"));
        assert_eq!(cells[&cell("A2")].value.as_deref(), Some("3"));
    }

    #[test]
    fn test_overwrite_keeps_style_and_drops_formula() {
        let xml = worksheet(
            r#"<sheetData><row r="1" spans="1:3"><c r="A1" s="2"><v>9</v></c><c r="B1" s="5" t="s"><f>A1</f><v>3</v></c><c r="C1"><v>1</v></c></row></sheetData>"#,
        );
        let out = rewrite(&xml, &inline(&[("B1", "Jane & Co")]));

        assert!(out.contains(r#"<row r="1">"#), "{out}");
        assert!(out.contains(r#"<c r="A1" s="2"><v>9</v></c>"#));
        assert!(out.contains(r#"<c r="B1" s="5" t="inlineStr"><is><t>Jane &amp; Co</t></is></c>"#), "{out}");
        assert!(out.contains(r#"<c r="C1"><v>1</v></c>"#));
        assert!(!out.contains("<f>A1</f>"));
    }

    #[test]
    fn test_shared_formula_anchor_is_not_overwritten() {
        let xml = worksheet(
            r#"<sheetData><row r="1"><c r="A1" s="1"><f t="shared" ref="A1:A3" si="0">B1*2</f><v>4</v></c><c r="B1"><v>2</v></c></row><row r="2"><c r="A2"><f t="shared" si="0"/><v>6</v></c></row></sheetData>"#,
        );
        let out = rewrite(&xml, &inline(&[("A1", "replaced"), ("A2", "child"), ("B1", "kept")]));

        assert!(
            out.contains(r#"<c r="A1" s="1"><f t="shared" ref="A1:A3" si="0">B1*2</f><v>4</v></c>"#),
            "{out}"
        );
        assert!(!out.contains("replaced"));
        // Cells that only borrow the formula can still be written
        assert!(out.contains(r#"<c r="A2" t="inlineStr"><is><t>child</t></is></c>"#), "{out}");
        assert!(out.contains(r#"<c r="B1" t="inlineStr"><is><t>kept</t></is></c>"#), "{out}");
    }

    #[test]
    fn test_inserts_rows_and_cells_in_order() {
        let xml = worksheet(
            r#"<sheetData><row r="2"><c r="B2"><v>1</v></c></row><row r="5"><c r="A5"><v>2</v></c></row></sheetData>"#,
        );
        let out = rewrite(
            &xml,
            &inline(&[("B1", "first"), ("A2", "left"), ("C2", "right"), ("A3", "gap"), ("A20", "tail")]),
        );

        let order: Vec<usize> = [
            r#"<row r="1"><c r="B1""#,
            r#"<row r="2"><c r="A2""#,
            r#"<c r="B2"><v>1</v></c><c r="C2""#,
            r#"<row r="3"><c r="A3""#,
            r#"<row r="5">"#,
            r#"<row r="20"><c r="A20""#,
        ]
        .iter()
        .map(|needle| out.find(needle).unwrap_or_else(|| panic!("missing {needle} in {out}")))
        .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]), "{out}");
        // Worksheet-level elements after sheetData survive
        assert!(out.contains("<pageMargins"));
    }

    #[test]
    fn test_empty_sheet_data_and_self_closing_row() {
        let out = rewrite(&worksheet("<sheetData/>"), &inline(&[("A1", "x")]));
        assert!(out.contains(r#"<sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>x</t></is></c></row></sheetData>"#), "{out}");

        let out = rewrite(
            &worksheet(r#"<sheetData><row r="1" spans="1:1" ht="20" customHeight="1"/></sheetData>"#),
            &inline(&[("A1", " padded ")]),
        );
        assert!(out.contains(r#"<row r="1" ht="20" customHeight="1"><c r="A1" t="inlineStr"><is><t xml:space="preserve"> padded </t></is></c></row>"#), "{out}");
    }

    #[test]
    fn test_prefixed_namespace() {
        let xml = r#"<x:worksheet xmlns:x="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><x:sheetData><x:row r="1"><x:c r="A1"><x:v>1</x:v></x:c></x:row></x:sheetData></x:worksheet>"#;
        let out = rewrite(xml, &inline(&[("B1", "y")]));
        assert!(out.contains(r#"<x:c r="B1" t="inlineStr"><x:is><x:t>y</x:t></x:is></x:c></x:row>"#), "{out}");
    }

    #[test]
    fn test_cached_value_keeps_formula() {
        let xml = worksheet(
            r#"<sheetData><row r="1"><c r="A1" s="3"><f>SUM(B1:C1)</f><v>0</v></c><c r="B1" t="str"><f>"x"</f></c><c r="C1" t="e"><f>1/0</f><v>#DIV/0!</v></c></row></sheetData>"#,
        );
        let edits = BTreeMap::from([
            (cell("A1"), CellWrite::CachedValue(CellValue::Number(1250.5))),
            (cell("B1"), CellWrite::CachedValue(CellValue::Text("x".to_string()))),
            (cell("C1"), CellWrite::CachedValue(CellValue::Bool(true))),
        ]);
        let out = rewrite(&xml, &edits);

        assert!(out.contains(r#"<c r="A1" s="3"><f>SUM(B1:C1)</f><v>1250.5</v></c>"#), "{out}");
        assert!(out.contains(r#"<c r="B1" t="str"><f>"x"</f><v>x</v></c>"#), "{out}");
        assert!(out.contains(r#"<c r="C1" t="b"><f>1/0</f><v>1</v></c>"#), "{out}");
    }

    #[test]
    fn test_missing_sheet_data_is_an_error() {
        let result = rewrite_cells(PART, "<worksheet/>", &inline(&[("A1", "x")]));
        assert!(matches!(result, Err(WorkbookError::Xml { .. })));
    }
}
