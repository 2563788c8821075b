//! SOAP protocol types for the IMS web services.
//!
//! Builds request envelopes and parses responses into a generic
//! [`ResultNode`] tree. Element names are compared by local name so the
//! `soap:` prefix (or any other) does not matter.
//!
//! Faults are classified by their text:
//!
//! - `Token is not valid` → [`ImsError::TokenInvalid`] (caller re-authenticates once)
//! - `expects parameter '@X'` → [`ImsError::ParameterRequired`]
//! - anything else → [`ImsError::Fault`] with the `faultstring`

use super::error::{ImsError, Result};
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use rater_domain::{DataRow, DataTable};
use regex::Regex;
use std::sync::LazyLock;

const NAMESPACE_BASE: &str = "http://tempuri.org/IMSWebServices";
const TOKEN_INVALID_SENTINEL: &str = "Token is not valid";

static MISSING_PARAMETER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"expects parameter '(@[^']+)'").ok());

/// The IMS web service a method belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Logon,
    InsuredFunctions,
    QuoteFunctions,
    DocumentFunctions,
    ProducerFunctions,
    DataAccess,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Logon => "Logon",
            Service::InsuredFunctions => "InsuredFunctions",
            Service::QuoteFunctions => "QuoteFunctions",
            Service::DocumentFunctions => "DocumentFunctions",
            Service::ProducerFunctions => "ProducerFunctions",
            Service::DataAccess => "DataAccess",
        }
    }

    /// File name of the `.asmx` endpoint, relative to the base address
    pub fn endpoint(&self) -> String {
        match self {
            Service::DataAccess => "DataAccess.asmx".to_string(),
            other => format!("{}.asmx", other.as_str().to_lowercase()),
        }
    }

    pub fn namespace(&self) -> String {
        format!("{}/{}", NAMESPACE_BASE, self.as_str())
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An element of a request body
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    content: Content,
}

#[derive(Debug, Clone, PartialEq)]
enum Content {
    Text(String),
    Children(Vec<Element>),
}

impl Element {
    pub fn text(name: impl Into<String>, value: impl std::fmt::Display) -> Self {
        Self {
            name: name.into(),
            content: Content::Text(value.to_string()),
        }
    }

    pub fn group(name: impl Into<String>, children: Vec<Element>) -> Self {
        Self {
            name: name.into(),
            content: Content::Children(children),
        }
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        out.push('>');
        match &self.content {
            Content::Text(text) => out.push_str(&escape(text.as_str())),
            Content::Children(children) => {
                for child in children {
                    child.write(out);
                }
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// A call to one web method
#[derive(Debug, Clone, PartialEq)]
pub struct WebMethod {
    pub service: Service,
    pub method: String,
    params: Vec<Element>,
}

impl WebMethod {
    pub fn new(service: Service, method: impl Into<String>) -> Self {
        Self {
            service,
            method: method.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl std::fmt::Display) -> Self {
        self.params.push(Element::text(name, value));
        self
    }

    pub fn element(mut self, element: Element) -> Self {
        self.params.push(element);
        self
    }

    pub fn soap_action(&self) -> String {
        format!("\"{}/{}\"", self.service.namespace(), self.method)
    }

    fn write_body(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.method);
        out.push_str(" xmlns=\"");
        out.push_str(&self.service.namespace());
        out.push_str("\">");
        for param in &self.params {
            param.write(out);
        }
        out.push_str("</");
        out.push_str(&self.method);
        out.push('>');
    }
}

/// Authentication header sent with every call except the login itself
#[derive(Debug, Clone, Copy)]
pub struct TokenHeader<'a> {
    pub token: &'a str,
    pub context: &'a str,
}

/// Serialize a complete SOAP 1.1 envelope
pub fn envelope(call: &WebMethod, header: Option<TokenHeader<'_>>) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <soap:Envelope xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
         xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\" \
         xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\">",
    );
    if let Some(header) = header {
        out.push_str("<soap:Header><TokenHeader xmlns=\"");
        out.push_str(&call.service.namespace());
        out.push_str("\">");
        Element::text("Token", header.token).write(&mut out);
        Element::text("Context", header.context).write(&mut out);
        out.push_str("</TokenHeader></soap:Header>");
    }
    out.push_str("<soap:Body>");
    call.write_body(&mut out);
    out.push_str("</soap:Body></soap:Envelope>");
    out
}

/// Generic element tree of a response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultNode {
    pub name: String,
    pub text: String,
    pub children: Vec<ResultNode>,
}

impl ResultNode {
    fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// First direct child with the given name (case-insensitive)
    pub fn child(&self, name: &str) -> Option<&ResultNode> {
        self.children
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ResultNode> {
        self.children
            .iter()
            .filter(move |c| c.name.eq_ignore_ascii_case(name))
    }

    /// Depth-first search, this node included
    pub fn find(&self, name: &str) -> Option<&ResultNode> {
        if self.name.eq_ignore_ascii_case(name) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    /// Trimmed text of a direct child, if present and non-empty
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
    }

    pub fn value(&self) -> &str {
        self.text.trim()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Parse an XML document into a tree rooted at a synthetic `#document` node
pub fn parse_document(xml: &str) -> Result<ResultNode> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack = vec![ResultNode::named("#document")];
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                stack.push(ResultNode::named(name));
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(ResultNode::named(name));
                }
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err(ImsError::Parse("unbalanced closing tag".into()));
                }
                if let Some(node) = stack.pop()
                    && let Some(parent) = stack.last_mut()
                {
                    parent.children.push(node);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match stack.len() {
        1 => Ok(stack.remove(0)),
        _ => Err(ImsError::Parse("unexpected end of document".into())),
    }
}

/// Extract `<Method>Result` from a response envelope, or classify its fault.
///
/// Void methods answer with an empty `<Method>Response`; that yields an empty node.
pub fn parse_response(xml: &str, method: &str) -> Result<ResultNode> {
    let document = parse_document(xml)?;
    let body = document
        .find("Body")
        .ok_or_else(|| ImsError::Parse(format!("{method}: response has no SOAP body")))?;

    if let Some(fault) = body.child("Fault") {
        return Err(classify_fault(fault));
    }

    let response_name = format!("{method}Response");
    let result_name = format!("{method}Result");
    let response = body
        .child(&response_name)
        .ok_or_else(|| ImsError::Parse(format!("missing {response_name}")))?;
    Ok(response
        .child(&result_name)
        .cloned()
        .unwrap_or_else(|| ResultNode::named(result_name)))
}

/// Map a `soap:Fault` element onto the error taxonomy
pub fn classify_fault(fault: &ResultNode) -> ImsError {
    let faultstring = fault
        .child_text("faultstring")
        .unwrap_or("Unknown SOAP error")
        .to_string();
    let mut full_text = faultstring.clone();
    if let Some(detail) = fault.child("detail") {
        collect_text(detail, &mut full_text);
    }

    if full_text.contains(TOKEN_INVALID_SENTINEL) {
        return ImsError::TokenInvalid;
    }
    if let Some(regex) = MISSING_PARAMETER.as_ref()
        && let Some(captures) = regex.captures(&full_text)
    {
        return ImsError::ParameterRequired(captures[1].to_string());
    }
    ImsError::Fault(faultstring)
}

fn collect_text(node: &ResultNode, out: &mut String) {
    if !node.text.is_empty() {
        out.push(' ');
        out.push_str(&node.text);
    }
    for child in &node.children {
        collect_text(child, out);
    }
}

/// Decode the dataset carried by `ExecuteDataSetResult`.
///
/// The dataset normally arrives as escaped XML text; inline elements are
/// accepted as well. Every `Table*` element is one row.
pub fn parse_data_set(result: &ResultNode) -> Result<DataTable> {
    let parsed;
    let root = if result.is_leaf() {
        if result.value().is_empty() {
            return Ok(DataTable::default());
        }
        parsed = parse_document(result.value())?;
        &parsed
    } else {
        result
    };

    // #document > NewDataSet > Table*, or NewDataSet > Table* when inline
    let data_set = match root.children.as_slice() {
        [single] if !single.name.starts_with("Table") => single,
        _ => root,
    };
    let rows = data_set
        .children
        .iter()
        .filter(|c| c.name.starts_with("Table"))
        .map(|table| {
            table
                .children
                .iter()
                .map(|column| (column.name.clone(), column.value().to_string()))
                .collect::<DataRow>()
        })
        .collect();
    Ok(DataTable::new(rows))
}

/// All leaf elements of a tree as a single row; the first occurrence of a name wins
pub fn flatten_leaves(node: &ResultNode) -> DataRow {
    let mut row = DataRow::new();
    flatten_into(node, &mut row);
    row
}

fn flatten_into(node: &ResultNode, row: &mut DataRow) {
    for child in &node.children {
        if child.is_leaf() {
            if !row.contains_key(&child.name) {
                row.insert(child.name.clone(), child.value().to_string());
            }
        } else {
            flatten_into(child, row);
        }
    }
}
