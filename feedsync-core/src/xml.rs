//! Lowers feed XML into a dynamic [`serde_json::Value`] tree so the shape
//! probing in [`crate::feed`] can work over one representation regardless of
//! which of the supported feed layouts the supplier emits.
//!
//! Conventions, chosen to match the feed ecosystem's usual flattening:
//! - element attributes become `@_`-prefixed keys,
//! - mixed text next to child elements lands under `#text`,
//! - namespace prefixes (`g:price` and friends) are stripped,
//! - repeated sibling elements fold into a JSON array.
//!
//! Malformed markup is fatal: the caller gets a [`SyncError::Parse`] and no
//! partial tree.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};

use crate::error::SyncError;

/// Attribute key prefix in the lowered tree.
pub const ATTR_PREFIX: &str = "@_";
/// Key for character data in elements that also have children or attributes.
pub const TEXT_KEY: &str = "#text";

struct Frame {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            name,
            fields: Map::new(),
            text: String::new(),
        }
    }

    fn into_value(self) -> (String, Value) {
        let Frame {
            name,
            mut fields,
            text,
        } = self;
        let text = text.trim().to_string();
        let value = if fields.is_empty() {
            Value::String(text)
        } else {
            if !text.is_empty() {
                fields.insert(TEXT_KEY.to_string(), Value::String(text));
            }
            Value::Object(fields)
        };
        (name, value)
    }
}

/// Insert `value` under `key`, folding repeated keys into an array.
fn insert_folding(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        None => {
            map.insert(key, value);
        }
        Some(Value::Array(existing)) => existing.push(value),
        Some(occupied) => {
            let first = occupied.take();
            *occupied = Value::Array(vec![first, value]);
        }
    }
}

fn local_name(raw: &[u8]) -> Result<String, SyncError> {
    let name = std::str::from_utf8(raw)
        .map_err(|e| SyncError::Parse(format!("non-UTF-8 element name: {e}")))?;
    Ok(name.rsplit(':').next().unwrap_or(name).to_string())
}

/// Parse an XML document into a JSON tree rooted at the document element.
///
/// The returned value is an object with a single key (the root element name)
/// unless the document is empty, in which case an empty object is returned.
pub fn to_value(bytes: &[u8]) -> Result<Value, SyncError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = vec![Frame::new(String::new())];
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(start)) => {
                let mut frame = Frame::new(local_name(start.local_name().as_ref())?);
                for attr in start.attributes() {
                    let attr =
                        attr.map_err(|e| SyncError::Parse(format!("bad attribute: {e}")))?;
                    let key = local_name(attr.key.local_name().as_ref())?;
                    let value = attr
                        .unescape_value()
                        .map_err(|e| SyncError::Parse(format!("bad attribute value: {e}")))?;
                    frame
                        .fields
                        .insert(format!("{ATTR_PREFIX}{key}"), Value::String(value.into_owned()));
                }
                stack.push(frame);
            }
            Ok(Event::Empty(start)) => {
                let mut frame = Frame::new(local_name(start.local_name().as_ref())?);
                for attr in start.attributes() {
                    let attr =
                        attr.map_err(|e| SyncError::Parse(format!("bad attribute: {e}")))?;
                    let key = local_name(attr.key.local_name().as_ref())?;
                    let value = attr
                        .unescape_value()
                        .map_err(|e| SyncError::Parse(format!("bad attribute value: {e}")))?;
                    frame
                        .fields
                        .insert(format!("{ATTR_PREFIX}{key}"), Value::String(value.into_owned()));
                }
                let (name, value) = frame.into_value();
                let parent = stack.last_mut().expect("document frame always present");
                insert_folding(&mut parent.fields, name, value);
            }
            Ok(Event::Text(text)) => {
                let unescaped = text
                    .unescape()
                    .map_err(|e| SyncError::Parse(format!("bad character data: {e}")))?;
                let frame = stack.last_mut().expect("document frame always present");
                frame.text.push_str(&unescaped);
            }
            Ok(Event::CData(data)) => {
                let raw = String::from_utf8_lossy(&data).into_owned();
                let frame = stack.last_mut().expect("document frame always present");
                frame.text.push_str(&raw);
            }
            Ok(Event::End(_)) => {
                // quick-xml validates nesting, so the pop always matches.
                let (name, value) = stack.pop().expect("unbalanced element stack").into_value();
                let parent = stack.last_mut().expect("document frame always present");
                insert_folding(&mut parent.fields, name, value);
            }
            Ok(Event::Eof) => break,
            Ok(Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_)) => {}
            Err(e) => return Err(SyncError::Parse(format!("malformed XML: {e}"))),
        }
        buf.clear();
    }

    if stack.len() != 1 {
        return Err(SyncError::Parse("malformed XML: unclosed element".into()));
    }
    Ok(Value::Object(stack.pop().expect("document frame").fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowers_elements_attributes_and_text() {
        let tree = to_value(b"<item id=\"7\"><title>Mouse</title></item>").unwrap();
        assert_eq!(tree["item"]["@_id"], "7");
        assert_eq!(tree["item"]["title"], "Mouse");
    }

    #[test]
    fn strips_namespace_prefixes() {
        let xml = b"<rss xmlns:g=\"http://base.google.com/ns/1.0\"><channel><item><g:price>10 EUR</g:price></item></channel></rss>";
        let tree = to_value(xml).unwrap();
        assert_eq!(tree["rss"]["channel"]["item"]["price"], "10 EUR");
    }

    #[test]
    fn folds_repeated_siblings_into_arrays() {
        let tree = to_value(b"<products><product>a</product><product>b</product></products>")
            .unwrap();
        let products = tree["products"]["product"].as_array().unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0], "a");
    }

    #[test]
    fn mixed_text_lands_under_text_key() {
        let tree = to_value(b"<p lang=\"en\">hello</p>").unwrap();
        assert_eq!(tree["p"]["@_lang"], "en");
        assert_eq!(tree["p"]["#text"], "hello");
    }

    #[test]
    fn malformed_markup_is_a_parse_error() {
        let err = to_value(b"<items><item></items>").unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
    }

    #[test]
    fn empty_document_yields_empty_object() {
        let tree = to_value(b"").unwrap();
        assert_eq!(tree, Value::Object(Map::new()));
    }
}
