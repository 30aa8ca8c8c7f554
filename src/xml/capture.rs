//! Subtree consumers: rest capture and deep-skip.
//!
//! Both are entered right after a `StartElement` and return once the matching
//! `EndElement` has been consumed. Each keeps its own local stack, so the
//! decoder's frames are untouched while they run.
use indexmap::IndexMap;
use log::trace;

use super::event::{EventSource, StartElement, XmlEvent};
use super::frame::Slot;
use crate::error::{BindError, Result};
use crate::value::Value;

struct OpenNode {
    name: String,
    entries: IndexMap<String, Slot>,
    text: String,
}

impl OpenNode {
    fn new(start: &StartElement) -> Self {
        let mut entries = IndexMap::new();
        for attr in &start.attributes {
            entries.insert(attr.name.local.clone(), Slot::One(Value::String(attr.value.clone())));
        }
        Self { name: start.name.local.clone(), entries, text: String::new() }
    }

    fn push(&mut self, name: String, value: Value) {
        match self.entries.get_mut(&name) {
            Some(slot) => slot.push(value),
            None => {
                self.entries.insert(name, Slot::One(value));
            }
        }
    }

    /// Leaf elements become their text; elements with children or
    /// attributes become maps, any text kept under `text_key`.
    fn into_value(self, text_key: &str) -> Value {
        if self.entries.is_empty() {
            return Value::String(self.text);
        }
        let mut map: IndexMap<String, Value> =
            self.entries.into_iter().map(|(k, slot)| (k, slot.into_value())).collect();
        if !self.text.is_empty() {
            map.insert(text_key.to_owned(), Value::String(self.text));
        }
        Value::Map(map)
    }
}

/// Materialize the element opened by `start` and its subtree as an open value.
pub(super) fn capture<S: EventSource + ?Sized>(source: &mut S, start: &StartElement, text_key: &str) -> Result<Value> {
    trace!("capturing <{}> into rest", start.name.local);
    let mut stack = vec![OpenNode::new(start)];
    loop {
        match source.next_event()? {
            XmlEvent::StartElement(child) => stack.push(OpenNode::new(&child)),
            XmlEvent::EndElement(_) => {
                let Some(done) = stack.pop() else {
                    return Err(BindError::MalformedInput("unbalanced end element".into()));
                };
                let name = done.name.clone();
                let value = done.into_value(text_key);
                match stack.last_mut() {
                    Some(parent) => parent.push(name, value),
                    None => return Ok(value),
                }
            }
            XmlEvent::Characters(text) | XmlEvent::CData(text) => {
                if !text.trim().is_empty() {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&text);
                    }
                }
            }
            XmlEvent::EndDocument => {
                let open = stack.last().map_or_else(|| start.name.local.clone(), |n| n.name.clone());
                return Err(BindError::UnexpectedEndOfDocument { open });
            }
            XmlEvent::Comment(_) | XmlEvent::ProcessingInstruction | XmlEvent::Dtd => {}
        }
    }
}

/// Consume the subtree of `start` without building anything.
pub(super) fn skip<S: EventSource + ?Sized>(source: &mut S, start: &StartElement) -> Result<()> {
    trace!("skipping <{}>", start.name.local);
    let mut depth = 1usize;
    loop {
        match source.next_event()? {
            XmlEvent::StartElement(_) => depth += 1,
            XmlEvent::EndElement(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            XmlEvent::EndDocument => {
                return Err(BindError::UnexpectedEndOfDocument { open: start.name.local.clone() });
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::event::QuickXmlSource;
    use serde_json::json;

    fn capture_str(xml: &str) -> Result<Value> {
        let mut src = QuickXmlSource::from_str(xml);
        let XmlEvent::StartElement(start) = src.next_event()? else { panic!("expected start") };
        let out = capture(&mut src, &start, "#content")?;
        assert_eq!(src.next_event()?, XmlEvent::EndDocument);
        Ok(out)
    }

    #[test]
    fn leaf_elements_capture_as_text() {
        assert_eq!(capture_str("<a>hi</a>").unwrap(), Value::from("hi"));
        assert_eq!(capture_str("<a/>").unwrap(), Value::from(""));
    }

    #[test]
    fn nested_subtrees_coalesce_siblings() {
        let out = capture_str(r#"<a k="v"><b>1</b><b>2</b><c><d>x</d></c>tail</a>"#).unwrap();
        assert_eq!(
            out.to_json(),
            json!({"k": "v", "b": ["1", "2"], "c": {"d": "x"}, "#content": "tail"})
        );
    }

    #[test]
    fn skip_consumes_exactly_one_subtree() {
        let mut src = QuickXmlSource::from_str("<r><x><y/><x/></x><z/></r>");
        src.next_event().unwrap();
        let XmlEvent::StartElement(x) = src.next_event().unwrap() else { panic!("expected <x>") };
        skip(&mut src, &x).unwrap();
        let XmlEvent::StartElement(z) = src.next_event().unwrap() else { panic!("expected <z>") };
        assert_eq!(z.name.local, "z");
    }

    #[test]
    fn truncated_subtree_reports_the_open_element() {
        let start = StartElement::new("a");
        let mut src = crate::xml::event::EventList::new([XmlEvent::StartElement(StartElement::new("b"))]);
        let err = capture(&mut src, &start, "#content").unwrap_err();
        assert_eq!(err, BindError::UnexpectedEndOfDocument { open: "b".into() });
    }
}
