//! OOXML package access: part lookup, sheet resolution and entry-preserving rewrite

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use rater_application::WorkbookError;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";
const DEFAULT_SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// A worksheet and the archive entry backing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetPart {
    pub name: String,
    pub path: String,
}

/// Read-only view over a workbook archive
pub struct Package<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> Package<'a> {
    pub fn open(bytes: &'a [u8]) -> Result<Self, WorkbookError> {
        let archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| WorkbookError::Archive(e.to_string()))?;
        Ok(Self { archive })
    }

    /// Entry name as stored, matching case-insensitively as OPC part names do
    fn entry_name(&self, part: &str) -> Option<String> {
        if self.archive.index_for_name(part).is_some() {
            return Some(part.to_string());
        }
        self.archive
            .file_names()
            .find(|name| name.eq_ignore_ascii_case(part))
            .map(str::to_string)
    }

    pub fn has_part(&self, part: &str) -> bool {
        self.entry_name(part).is_some()
    }

    pub fn read_part(&mut self, part: &str) -> Result<Vec<u8>, WorkbookError> {
        let name = self
            .entry_name(part)
            .ok_or_else(|| WorkbookError::MissingPart(part.to_string()))?;
        let mut entry = self
            .archive
            .by_name(&name)
            .map_err(|e| WorkbookError::Archive(e.to_string()))?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| WorkbookError::Archive(format!("{part}: {e}")))?;
        Ok(bytes)
    }

    pub fn read_text(&mut self, part: &str) -> Result<String, WorkbookError> {
        let bytes = self.read_part(part)?;
        String::from_utf8(bytes).map_err(|_| WorkbookError::Xml {
            part: part.to_string(),
            message: "part is not UTF-8".to_string(),
        })
    }

    /// Main workbook part, from the package relationships
    fn workbook_part(&mut self) -> Result<String, WorkbookError> {
        if self.has_part("_rels/.rels") {
            let rels = self.read_text("_rels/.rels")?;
            let target = parse_relationships("_rels/.rels", &rels)?
                .into_iter()
                .find(|rel| rel.kind.ends_with("/officeDocument"))
                .map(|rel| resolve_target("", &rel.target));
            if let Some(target) = target {
                return Ok(target);
            }
        }
        Ok(DEFAULT_WORKBOOK_PART.to_string())
    }

    /// All worksheets in workbook order, with their backing parts
    pub fn sheets(&mut self) -> Result<Vec<SheetPart>, WorkbookError> {
        let workbook = self.workbook_part()?;
        let xml = self.read_text(&workbook)?;
        let declared = parse_sheet_list(&workbook, &xml)?;

        let rels_part = relationships_part(&workbook);
        let rels_xml = self.read_text(&rels_part)?;
        let targets: HashMap<String, String> = parse_relationships(&rels_part, &rels_xml)?
            .into_iter()
            .map(|rel| (rel.id, resolve_target(base_dir(&workbook), &rel.target)))
            .collect();

        Ok(declared
            .into_iter()
            .filter_map(|(name, rel_id)| {
                targets
                    .get(&rel_id)
                    .map(|path| SheetPart { name, path: path.clone() })
            })
            .collect())
    }

    /// Sheet lookup by name, ignoring case
    pub fn sheet(&mut self, name: &str) -> Result<SheetPart, WorkbookError> {
        let sheets = self.sheets()?;
        sheets
            .iter()
            .find(|s| s.name == name)
            .or_else(|| sheets.iter().find(|s| s.name.eq_ignore_ascii_case(name)))
            .cloned()
            .ok_or_else(|| WorkbookError::SheetNotFound(name.to_string()))
    }

    /// Shared string table; an absent part means no shared strings
    pub fn shared_strings(&mut self) -> Result<Vec<String>, WorkbookError> {
        let workbook = self.workbook_part()?;
        let rels_part = relationships_part(&workbook);
        let mut part = None;
        if self.has_part(&rels_part) {
            let rels_xml = self.read_text(&rels_part)?;
            part = parse_relationships(&rels_part, &rels_xml)?
                .into_iter()
                .find(|rel| rel.kind.ends_with("/sharedStrings"))
                .map(|rel| resolve_target(base_dir(&workbook), &rel.target));
        }
        let part = part.unwrap_or_else(|| DEFAULT_SHARED_STRINGS_PART.to_string());
        if !self.has_part(&part) {
            return Ok(Vec::new());
        }
        let xml = self.read_text(&part)?;
        super::shared_strings::parse(&part, &xml)
    }
}

/// Copy `original`, substituting the given parts.
///
/// Untouched entries are copied raw (compressed bytes unchanged); replaced
/// entries keep their original compression method.
pub fn rewrite(original: &[u8], replacements: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>, WorkbookError> {
    let archive_error = |e: zip::result::ZipError| WorkbookError::Archive(e.to_string());

    let mut archive = ZipArchive::new(Cursor::new(original)).map_err(archive_error)?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(original.len())));

    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index).map_err(archive_error)?;
        let replacement = replacements
            .iter()
            .find(|(part, _)| part.eq_ignore_ascii_case(entry.name()))
            .map(|(_, bytes)| bytes);

        match replacement {
            Some(bytes) => {
                let name = entry.name().to_string();
                let method = match entry.compression() {
                    CompressionMethod::Stored => CompressionMethod::Stored,
                    _ => CompressionMethod::Deflated,
                };
                drop(entry);
                writer
                    .start_file(name.as_str(), SimpleFileOptions::default().compression_method(method))
                    .map_err(archive_error)?;
                writer
                    .write_all(bytes)
                    .map_err(|e| WorkbookError::Archive(format!("{name}: {e}")))?;
            }
            None => writer.raw_copy_file(entry).map_err(archive_error)?,
        }
    }

    Ok(writer.finish().map_err(archive_error)?.into_inner())
}

struct Relationship {
    id: String,
    kind: String,
    target: String,
}

fn parse_relationships(part: &str, xml: &str) -> Result<Vec<Relationship>, WorkbookError> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    loop {
        match reader.read_event().map_err(|e| xml_error(part, e))? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                // External targets (hyperlinks etc.) never back a sheet
                if attribute(&e, b"TargetMode").is_some_and(|m| m.eq_ignore_ascii_case("External")) {
                    continue;
                }
                if let (Some(id), Some(target)) = (attribute(&e, b"Id"), attribute(&e, b"Target")) {
                    out.push(Relationship {
                        id,
                        kind: attribute(&e, b"Type").unwrap_or_default(),
                        target,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// `(sheet name, relationship id)` pairs in workbook order
fn parse_sheet_list(part: &str, xml: &str) -> Result<Vec<(String, String)>, WorkbookError> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    loop {
        match reader.read_event().map_err(|e| xml_error(part, e))? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attribute(&e, b"name");
                // r:id, whatever the relationships prefix is bound to
                let rel_id = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.prefix().is_some() && a.key.local_name().as_ref() == b"id")
                    .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()));
                if let (Some(name), Some(rel_id)) = (name, rel_id) {
                    out.push((name, rel_id));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// Unprefixed attribute value, unescaped
pub(crate) fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

pub(crate) fn xml_error(part: &str, e: impl std::fmt::Display) -> WorkbookError {
    WorkbookError::Xml {
        part: part.to_string(),
        message: e.to_string(),
    }
}

fn base_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// `xl/workbook.xml` → `xl/_rels/workbook.xml.rels`
fn relationships_part(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against the source part's directory.
/// Absolute targets (`/xl/...`) are package-rooted.
fn resolve_target(base: &str, target: &str) -> String {
    let target = target.replace('\\', "/");
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None if base.is_empty() => target,
        None => format!("{base}/{target}"),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::test_support::{WorkbookBuilder, entries};

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("xl", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("xl", "/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
        assert_eq!(resolve_target("xl/worksheets", "../sharedStrings.xml"), "xl/sharedStrings.xml");
        assert_eq!(resolve_target("", "xl/workbook.xml"), "xl/workbook.xml");
    }

    #[test]
    fn test_relationships_part() {
        assert_eq!(relationships_part("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
    }

    #[test]
    fn test_sheet_lookup_is_case_insensitive() {
        let bytes = WorkbookBuilder::new()
            .sheet("Summary", "<sheetData/>")
            .sheet("submission_data", "<sheetData/>")
            .build();
        let mut package = Package::open(&bytes).unwrap();

        let sheets = package.sheets().unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[1].path, "xl/worksheets/sheet2.xml");

        let summary = package.sheet("SUMMARY").unwrap();
        assert_eq!(summary.name, "Summary");
        assert_eq!(summary.path, "xl/worksheets/sheet1.xml");
        assert!(matches!(
            package.sheet("Missing"),
            Err(WorkbookError::SheetNotFound(_))
        ));
    }

    #[test]
    fn test_absolute_relationship_targets() {
        let bytes = WorkbookBuilder::new()
            .absolute_targets()
            .sheet("Rates", "<sheetData/>")
            .build();
        let mut package = Package::open(&bytes).unwrap();
        assert_eq!(package.sheet("Rates").unwrap().path, "xl/worksheets/sheet1.xml");
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            Package::open(b"definitely not a workbook"),
            Err(WorkbookError::Archive(_))
        ));
    }

    #[test]
    fn test_rewrite_replaces_only_named_part() {
        let bytes = WorkbookBuilder::new()
            .sheet("A", "<sheetData/>")
            .sheet("B", "<sheetData/>")
            .build();
        let replacements = HashMap::from([(
            "xl/worksheets/sheet2.xml".to_string(),
            b"<worksheet/>".to_vec(),
        )]);

        let rewritten = rewrite(&bytes, &replacements).unwrap();
        let before = entries(&bytes);
        let after = entries(&rewritten);

        assert_eq!(before.len(), after.len());
        for ((name, old), (new_name, new)) in before.iter().zip(after.iter()) {
            assert_eq!(name, new_name);
            if name == "xl/worksheets/sheet2.xml" {
                assert_eq!(new, b"<worksheet/>");
            } else {
                assert_eq!(old, new, "{name} changed");
            }
        }
    }
}
