//! XML marshaling for the gateway wire format.
//!
//! Requests travel as a flat list of keyed fields:
//!
//! ```xml
//! <TRANSACTION><FIELDS><FIELD KEY="name">value</FIELD>...</FIELDS></TRANSACTION>
//! ```
//!
//! Replies come back as `<RESPONSE><FIELDS>...</FIELDS></RESPONSE>` where the
//! children may nest and repeat. [`decode_elements`] turns those children into a
//! [`FieldMap`] with two rules:
//!
//! - A `KEY` attribute, when present and non-empty, replaces the tag name as the
//!   logical field name.
//! - Siblings sharing a logical name collapse into a [`FieldValue::List`] in
//!   document order. A name seen once is never a list.
//!
//! # Example
//!
//! ```
//! use first_american_xml::xml::{XmlElement, decode_elements, FieldValue};
//!
//! let root = XmlElement::parse(br#"<RESPONSE><FIELDS>
//!     <FIELD KEY="status">1</FIELD>
//!     <FIELD KEY="order_id">A-1</FIELD>
//! </FIELDS></RESPONSE>"#).unwrap();
//! let fields = decode_elements(first_american_xml::xml::response_elements(&root));
//! assert_eq!(fields.get("status"), Some(&FieldValue::from("1")));
//! ```

use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use serde::{Deserialize, Serialize};

use crate::error::XmlError;

/// Outgoing request fields, in the order they are written to the wire.
pub type RequestFields = IndexMap<String, String>;

/// Decoded reply fields, keyed by logical name in first-occurrence order.
pub type FieldMap = IndexMap<String, FieldValue>;

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Text content of a leaf element. Empty when the element has no text.
    Text(String),
    /// Children of an element that has child elements.
    Map(FieldMap),
    /// Values of two or more siblings sharing one logical name.
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Returns the text if this is a leaf value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&FieldMap> {
        match self {
            FieldValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Text(String::new())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<FieldMap> for FieldValue {
    fn from(value: FieldMap) -> Self {
        FieldValue::Map(value)
    }
}

/// Encodes request fields into a `TRANSACTION` document.
///
/// Each pair becomes one `<FIELD KEY="key">value</FIELD>` in iteration order.
/// Keys and values are XML-escaped. No declaration is written.
pub fn encode_request<I, K, V>(fields: I) -> Result<Vec<u8>, XmlError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut fields = fields.into_iter().peekable();
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Start(BytesStart::new("TRANSACTION")))?;
    if fields.peek().is_none() {
        writer.write_event(Event::Empty(BytesStart::new("FIELDS")))?;
    } else {
        writer.write_event(Event::Start(BytesStart::new("FIELDS")))?;
        for (key, value) in fields {
            let field = BytesStart::new("FIELD").with_attributes([("KEY", key.as_ref())]);
            writer.write_event(Event::Start(field))?;
            writer.write_event(Event::Text(BytesText::new(value.as_ref())))?;
            writer.write_event(Event::End(BytesEnd::new("FIELD")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("FIELDS")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("TRANSACTION")))?;
    Ok(writer.into_inner())
}

/// One element of a parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Tag name.
    pub name: String,
    /// Value of the `KEY` attribute, if the element carries one.
    pub key: Option<String>,
    pub children: Vec<XmlElement>,
    /// Concatenated text and CDATA content. Ignored when `children` is non-empty.
    pub text: String,
}

impl XmlElement {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_key<K: Into<String>>(mut self, key: K) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_text<T: Into<String>>(mut self, text: T) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// The name this element decodes under: a non-empty `KEY`, else the tag name.
    pub fn logical_name(&self) -> &str {
        match self.key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => &self.name,
        }
    }

    /// Parses a complete document and returns its root element.
    ///
    /// An XML declaration, doctype, comments, processing instructions and
    /// whitespace around the root are skipped. Ill-formed input (mismatched
    /// tags, bad escapes, truncated documents, text or a second element
    /// outside the root) is an error.
    pub fn parse(xml: &[u8]) -> Result<Self, XmlError> {
        let xml = std::str::from_utf8(xml).map_err(|source| XmlError::Utf8 {
            context: "document",
            source,
        })?;
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    Self::ensure_single_root(&stack, &root)?;
                    stack.push(Self::open(&start)?);
                }
                Event::Empty(start) => {
                    Self::ensure_single_root(&stack, &root)?;
                    let element = Self::open(&start)?;
                    Self::attach(element, &mut stack, &mut root);
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or(XmlError::UnexpectedEof("closing tag without opening tag"))?;
                    Self::attach(element, &mut stack, &mut root);
                }
                Event::Text(text) => match stack.last_mut() {
                    Some(current) => current.text.push_str(&text.unescape()?),
                    None if text.iter().all(u8::is_ascii_whitespace) => {}
                    None => return Err(XmlError::OutsideRoot("text")),
                },
                Event::CData(data) => {
                    let Some(current) = stack.last_mut() else {
                        return Err(XmlError::OutsideRoot("CDATA section"));
                    };
                    let data = std::str::from_utf8(&data).map_err(|source| XmlError::Utf8 {
                        context: "CDATA section",
                        source,
                    })?;
                    current.text.push_str(data);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(XmlError::UnexpectedEof("unclosed element"));
        }
        root.ok_or(XmlError::NoRoot)
    }

    fn open(start: &BytesStart<'_>) -> Result<Self, XmlError> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|source| XmlError::Utf8 {
                context: "element name",
                source,
            })?
            .to_string();
        let key = start
            .try_get_attribute("KEY")
            .map_err(quick_xml::Error::from)?
            .map(|attr| attr.unescape_value().map(|value| value.into_owned()))
            .transpose()?;
        Ok(Self {
            name,
            key,
            children: Vec::new(),
            text: String::new(),
        })
    }

    /// A top-level element after the root has closed is a second root.
    fn ensure_single_root(stack: &[XmlElement], root: &Option<XmlElement>) -> Result<(), XmlError> {
        if stack.is_empty() && root.is_some() {
            return Err(XmlError::OutsideRoot("second root element"));
        }
        Ok(())
    }

    fn attach(element: XmlElement, stack: &mut [XmlElement], root: &mut Option<XmlElement>) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => *root = Some(element),
        }
    }
}

/// Selects `/RESPONSE/FIELDS/*` from a parsed reply.
///
/// Returns nothing when the root is not `RESPONSE` or has no `FIELDS` child.
pub fn response_elements(root: &XmlElement) -> impl Iterator<Item = &XmlElement> {
    let fields: &[XmlElement] = if root.name == "RESPONSE" {
        &root.children
    } else {
        &[]
    };
    fields
        .iter()
        .filter(|child| child.name == "FIELDS")
        .flat_map(|child| child.children.iter())
}

/// Decodes sibling elements into a [`FieldMap`], recursing into children.
pub fn decode_elements<'a, I>(elements: I) -> FieldMap
where
    I: IntoIterator<Item = &'a XmlElement>,
{
    let mut result = FieldMap::new();
    for element in elements {
        let value = if element.children.is_empty() {
            FieldValue::Text(element.text.clone())
        } else {
            FieldValue::Map(decode_elements(&element.children))
        };
        // Single decoded values are never lists, so an existing list means the
        // name has already repeated.
        match result.get_mut(element.logical_name()) {
            Some(FieldValue::List(items)) => items.push(value),
            Some(existing) => {
                let first = std::mem::take(existing);
                *existing = FieldValue::List(vec![first, value]);
            }
            None => {
                result.insert(element.logical_name().to_string(), value);
            }
        }
    }
    result
}

/// Parses a reply body and decodes `/RESPONSE/FIELDS/*`.
pub fn decode_response(xml: &[u8]) -> Result<FieldMap, XmlError> {
    let root = XmlElement::parse(xml)?;
    Ok(decode_elements(response_elements(&root)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_fields(xml: &[u8]) -> FieldMap {
        let root = XmlElement::parse(xml).unwrap();
        assert_eq!(root.name, "TRANSACTION");
        let fields = root
            .children
            .iter()
            .find(|child| child.name == "FIELDS")
            .unwrap();
        decode_elements(&fields.children)
    }

    #[test]
    fn test_encode_empty_fields() {
        let xml = encode_request(RequestFields::new()).unwrap();
        assert_eq!(xml, b"<TRANSACTION><FIELDS/></TRANSACTION>");
        assert!(request_fields(&xml).is_empty());
    }

    #[test]
    fn test_encode_key_attribute() {
        let xml = encode_request([("foo", "bar")]).unwrap();
        assert_eq!(
            String::from_utf8(xml.clone()).unwrap(),
            r#"<TRANSACTION><FIELDS><FIELD KEY="foo">bar</FIELD></FIELDS></TRANSACTION>"#
        );
        let root = XmlElement::parse(&xml).unwrap();
        let fields = &root.children[0];
        assert_eq!(fields.children.len(), 1);
        assert_eq!(fields.children[0].name, "FIELD");
        assert_eq!(fields.children[0].key.as_deref(), Some("foo"));
        assert_eq!(fields.children[0].text, "bar");
    }

    #[test]
    fn test_encode_preserves_order_and_escapes() {
        let mut fields = RequestFields::new();
        fields.insert("zeta".into(), "1".into());
        fields.insert("alpha".into(), "<&>".into());
        fields.insert("quote\"key".into(), "it's".into());
        let xml = encode_request(&fields).unwrap();
        let text = String::from_utf8(xml.clone()).unwrap();
        assert!(text.contains("&lt;&amp;&gt;"));
        assert!(text.find("zeta").unwrap() < text.find("alpha").unwrap());

        let decoded = request_fields(&xml);
        let keys: Vec<&str> = decoded.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "quote\"key"]);
        assert_eq!(decoded["alpha"], FieldValue::from("<&>"));
        assert_eq!(decoded["quote\"key"], FieldValue::from("it's"));
    }

    #[test]
    fn test_encode_round_trip_keeps_whitespace() {
        let xml = encode_request([("owner_street", " 123 Test St ")]).unwrap();
        let decoded = request_fields(&xml);
        assert_eq!(decoded["owner_street"], FieldValue::from(" 123 Test St "));
    }

    #[test]
    fn test_decode_element_name_as_key() {
        let element = XmlElement::new("test");
        let decoded = decode_elements([&element]);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded["test"], FieldValue::from(""));
    }

    #[test]
    fn test_decode_children_become_map() {
        let element = XmlElement::new("foo").with_child(XmlElement::new("bar"));
        let decoded = decode_elements([&element]);
        let nested = decoded["foo"].as_map().unwrap();
        assert!(nested.contains_key("bar"));
    }

    #[test]
    fn test_decode_children_win_over_key_and_text() {
        let element = XmlElement::new("FIELD")
            .with_key("cim_record")
            .with_text("ignored")
            .with_child(XmlElement::new("FIELD").with_key("cim_ref_num").with_text("1"));
        let decoded = decode_elements([&element]);
        let record = decoded["cim_record"].as_map().unwrap();
        assert_eq!(record["cim_ref_num"], FieldValue::from("1"));
    }

    #[test]
    fn test_decode_duplicates_become_list() {
        let elements = [
            XmlElement::new("field").with_text("1"),
            XmlElement::new("field").with_text("2"),
        ];
        let decoded = decode_elements(&elements);
        assert_eq!(
            decoded["field"],
            FieldValue::List(vec![FieldValue::from("1"), FieldValue::from("2")])
        );
    }

    #[test]
    fn test_decode_equal_duplicates_still_list() {
        let elements = [
            XmlElement::new("field").with_text("x"),
            XmlElement::new("field").with_text("x"),
            XmlElement::new("field").with_text("x"),
        ];
        let decoded = decode_elements(&elements);
        assert_eq!(decoded["field"].as_list().unwrap().len(), 3);
    }

    #[test]
    fn test_decode_single_never_list() {
        let elements = [
            XmlElement::new("a").with_text("1"),
            XmlElement::new("b").with_text("2"),
        ];
        let decoded = decode_elements(&elements);
        assert_eq!(decoded["a"], FieldValue::from("1"));
        assert_eq!(decoded["b"], FieldValue::from("2"));
    }

    #[test]
    fn test_decode_key_overrides_name() {
        let element = XmlElement::new("field").with_key("bar").with_text("x");
        let decoded = decode_elements([&element]);
        assert!(decoded.contains_key("bar"));
        assert!(!decoded.contains_key("field"));
    }

    #[test]
    fn test_decode_key_groups_by_key_not_tag() {
        let elements = [
            XmlElement::new("FIELD").with_key("FIELD").with_text("a"),
            XmlElement::new("FIELD").with_key("other").with_text("b"),
        ];
        let decoded = decode_elements(&elements);
        assert_eq!(decoded["FIELD"], FieldValue::from("a"));
        assert_eq!(decoded["other"], FieldValue::from("b"));
    }

    #[test]
    fn test_decode_empty_key_falls_back_to_tag() {
        let element = XmlElement::new("field").with_key("").with_text("x");
        let decoded = decode_elements([&element]);
        assert_eq!(decoded["field"], FieldValue::from("x"));
    }

    #[test]
    fn test_decode_first_occurrence_order() {
        let elements = [
            XmlElement::new("b").with_text("1"),
            XmlElement::new("a").with_text("2"),
            XmlElement::new("b").with_text("3"),
        ];
        let decoded = decode_elements(&elements);
        let keys: Vec<&str> = decoded.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_decode_response_with_declaration() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<RESPONSE>
  <FIELDS>
    <FIELD KEY="status">1</FIELD>
    <FIELD KEY="auth_response">APPROVED</FIELD>
    <FIELD KEY="error"><![CDATA[ none ]]></FIELD>
  </FIELDS>
</RESPONSE>"#;
        let decoded = decode_response(xml).unwrap();
        assert_eq!(decoded["status"], FieldValue::from("1"));
        assert_eq!(decoded["auth_response"], FieldValue::from("APPROVED"));
        assert_eq!(decoded["error"], FieldValue::from(" none "));
    }

    #[test]
    fn test_decode_response_nested_repeated() {
        let xml = br#"<RESPONSE><FIELDS>
            <FIELD KEY="records_found">2</FIELD>
            <RECORD><FIELD KEY="id">1</FIELD></RECORD>
            <RECORD><FIELD KEY="id">2</FIELD></RECORD>
        </FIELDS></RESPONSE>"#;
        let decoded = decode_response(xml).unwrap();
        let records = decoded["RECORD"].as_list().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].as_map().unwrap()["id"], FieldValue::from("2"));
    }

    #[test]
    fn test_decode_response_wrong_root_is_empty() {
        let decoded = decode_response(b"<OTHER><FIELDS><a>1</a></FIELDS></OTHER>").unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_decode_response_missing_fields_is_empty() {
        let decoded = decode_response(b"<RESPONSE/>").unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_parse_malformed_fails() {
        assert!(XmlElement::parse(b"<RESPONSE><FIELDS></RESPONSE>").is_err());
        assert!(XmlElement::parse(b"<RESPONSE><FIELDS>").is_err());
        assert!(XmlElement::parse(b"").is_err());
        assert!(XmlElement::parse(b"not xml at all").is_err());
    }

    #[test]
    fn test_parse_rejects_content_outside_root() {
        let two_roots = b"<RESPONSE><FIELDS><a>1</a></FIELDS></RESPONSE>\
            <RESPONSE><FIELDS><b>2</b></FIELDS></RESPONSE>";
        assert!(matches!(
            decode_response(two_roots),
            Err(XmlError::OutsideRoot("second root element"))
        ));
        let trailing = b"<RESPONSE><FIELDS><a>1</a></FIELDS></RESPONSE>garbage after root";
        assert!(matches!(
            decode_response(trailing),
            Err(XmlError::OutsideRoot("text"))
        ));
        let leading = b"junk<RESPONSE><FIELDS><a>1</a></FIELDS></RESPONSE>";
        assert!(matches!(
            decode_response(leading),
            Err(XmlError::OutsideRoot("text"))
        ));
        assert!(XmlElement::parse(b"<a/><b/>").is_err());
        assert!(XmlElement::parse(b"<a/><![CDATA[x]]>").is_err());
    }

    #[test]
    fn test_parse_allows_prolog_and_trailing_whitespace() {
        let xml = b"<?xml version=\"1.0\"?>\n<!DOCTYPE RESPONSE>\n<!-- reply -->\n\
            <RESPONSE><FIELDS><a>1</a></FIELDS></RESPONSE>\n<!-- end -->\n  ";
        let decoded = decode_response(xml).unwrap();
        assert_eq!(decoded["a"], FieldValue::from("1"));
    }

    #[test]
    fn test_parse_unescapes_text_and_key() {
        let root = XmlElement::parse(br#"<a KEY="x&amp;y">1 &lt; 2</a>"#).unwrap();
        assert_eq!(root.key.as_deref(), Some("x&y"));
        assert_eq!(root.text, "1 < 2");
    }
}
