//! Shared string table (`xl/sharedStrings.xml`)

use super::package::xml_error;
use quick_xml::Reader;
use quick_xml::events::Event;
use rater_application::WorkbookError;

/// Plain text of every `<si>` item, in index order.
///
/// Rich-text runs are concatenated; phonetic runs (`<rPh>`) are ignored.
pub fn parse(part: &str, xml: &str) -> Result<Vec<String>, WorkbookError> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event().map_err(|e| xml_error(part, e))? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => phonetic_depth += 1,
                b"t" if phonetic_depth == 0 => in_text = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(t) if in_text => {
                if let Some(current) = current.as_mut() {
                    current.push_str(&t.unescape().map_err(|e| xml_error(part, e))?);
                }
            }
            Event::CData(c) if in_text => {
                if let Some(current) = current.as_mut() {
                    current.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"t" => in_text = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(strings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_rich_items() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="4" uniqueCount="4">
  <si><t>Premium</t></si>
  <si><r><rPr><b/></rPr><t>Total </t></r><r><t xml:space="preserve">Due</t></r></si>
  <si><t>A &amp; B</t><rPh sb="0" eb="1"><t>ignored</t></rPh></si>
  <si/>
</sst>"#;

        let strings = parse("xl/sharedStrings.xml", xml).unwrap();
        assert_eq!(strings, vec!["Premium", "Total Due", "A & B", ""]);
    }

    #[test]
    fn test_malformed_xml_names_part() {
        let err = parse("xl/sharedStrings.xml", "<sst><si><t>x</si></sst>").unwrap_err();
        assert!(matches!(err, WorkbookError::Xml { ref part, .. } if part == "xl/sharedStrings.xml"));
    }
}
