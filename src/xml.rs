//! Streaming XML decoder.
//!
//! One forward pass over an [`EventSource`], binding directly against a
//! record type. There is no backtracking: unions are only consulted for text
//! conversion and a non-record root is rejected up front.
//!
//! Every start event either pushes a node onto the decoder's stack or hands
//! the whole subtree to [`capture`] (rest capture, open-typed fields) or
//! [`capture::skip`] (unknown elements), so every end event closes the node
//! on top of the stack.
mod capture;
pub mod event;
mod frame;

use std::sync::Arc;

use log::{debug, trace};

use crate::error::{BindError, Result, XmlError};
use crate::options::DecodeOptions;
use crate::schema::{Namespace, RecordType, TargetType};
use crate::value::Value;
use event::{EventSource, QName, StartElement, XmlEvent};
use frame::{convert_text, shape_of, Element, Frame, PendingText, Shape};

pub use event::QuickXmlSource;

pub fn decode<S: EventSource + ?Sized>(
    source: &mut S,
    ty: &TargetType,
    options: &DecodeOptions,
) -> std::result::Result<Value, XmlError> {
    let Some(root) = ty.as_record() else {
        return Err(BindError::Schema(format!("xml input needs a record type, found '{ty}'")).into());
    };
    debug!("decoding xml against '{root}'");
    let out = Decoder::new(source, root, options).run()?;
    debug!("xml decode finished");
    Ok(out)
}

#[derive(Debug)]
enum Node {
    Record(Frame),
    Text(PendingText),
}

impl Node {
    fn element(&self) -> &str {
        match self {
            Node::Record(frame) => &frame.element,
            Node::Text(pending) => &pending.element,
        }
    }
}

/// Per-call decoder state.
struct Decoder<'a, S: ?Sized> {
    source: &'a mut S,
    root: &'a Arc<RecordType>,
    options: &'a DecodeOptions,
    stack: Vec<Node>,
    done: Option<Value>,
}

impl<'a, S: EventSource + ?Sized> Decoder<'a, S> {
    fn new(source: &'a mut S, root: &'a Arc<RecordType>, options: &'a DecodeOptions) -> Self {
        Self { source, root, options, stack: Vec::new(), done: None }
    }

    fn run(mut self) -> Result<Value> {
        loop {
            match self.source.next_event()? {
                XmlEvent::StartElement(start) if self.stack.is_empty() => self.start_root(start)?,
                XmlEvent::StartElement(start) => self.start_child(start)?,
                XmlEvent::EndElement(name) => self.end(&name)?,
                XmlEvent::Characters(text) | XmlEvent::CData(text) => self.text(&text),
                XmlEvent::Comment(_) | XmlEvent::ProcessingInstruction | XmlEvent::Dtd => {}
                XmlEvent::EndDocument => return self.end_document(),
            }
        }
    }

    // ------------------------------ Starts ------------------------------- //

    fn start_root(&mut self, start: StartElement) -> Result<()> {
        if self.done.is_some() {
            return Err(BindError::MalformedInput(format!(
                "unexpected element '{}' after the root element",
                start.name.local
            )));
        }
        let root = self.root;
        if let Some(expected) = &root.resolved().element_name {
            if *expected != start.name.local {
                return Err(BindError::RootNameMismatch {
                    expected: expected.clone(),
                    found: start.name.local.clone(),
                });
            }
        }
        check_namespace(root.namespace(), &start)?;
        self.push_frame(Arc::clone(root), &start, None)
    }

    fn start_child(&mut self, start: StartElement) -> Result<()> {
        let record = match self.stack.last() {
            Some(Node::Record(frame)) => Arc::clone(&frame.record),
            _ => {
                // markup inside a scalar element carries no value
                return capture::skip(&mut *self.source, &start);
            }
        };
        let local = start.name.local.as_str();

        let Some((idx, field)) = record.field_named(local) else {
            if record.rest_type().is_some() {
                let value = capture::capture(&mut *self.source, &start, &self.options.text_key)?;
                self.frame()?.store_rest(local, value);
                return Ok(());
            }
            return capture::skip(&mut *self.source, &start);
        };

        check_namespace(field.namespace.as_ref(), &start)?;
        let occurrences = self.frame()?.mark_seen(local);
        let shape = shape_of(&field.ty);
        if occurrences > 1 && !matches!(shape, Shape::Repeated { .. }) {
            return Err(BindError::shape(&field.ty, format!("repeated element <{local}>"), self.path(local)));
        }
        let element = match shape {
            Shape::Repeated { element, .. } => element,
            Shape::Text(_) => Element::Text(&field.ty),
            Shape::Record(nested) => Element::Record(nested),
            Shape::Open => Element::Open,
            Shape::Unsupported => {
                return Err(BindError::Schema(format!(
                    "field '{}' of type '{}' cannot be read from xml",
                    field.name, field.ty
                )));
            }
        };

        match element {
            Element::Text(_) => {
                trace!("pending text for '{}'", field.name);
                self.stack.push(Node::Text(PendingText { field: idx, element: local.to_owned(), text: String::new() }));
                Ok(())
            }
            Element::Record(nested) => {
                check_namespace(nested.namespace(), &start)?;
                self.push_frame(Arc::clone(nested), &start, Some(idx))
            }
            Element::Open => {
                let value = capture::capture(&mut *self.source, &start, &self.options.text_key)?;
                self.frame()?.store(idx, value);
                Ok(())
            }
        }
    }

    fn push_frame(&mut self, record: Arc<RecordType>, start: &StartElement, field: Option<usize>) -> Result<()> {
        debug!("push frame <{}> as '{record}'", start.name.local);
        let mut frame = Frame::new(record, start.name.local.clone(), field);
        let path = self.path(&start.name.local);
        apply_attributes(&mut frame, start, &path)?;
        self.stack.push(Node::Record(frame));
        Ok(())
    }

    // ------------------------------- Text -------------------------------- //

    fn text(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        match self.stack.last_mut() {
            Some(Node::Text(pending)) => pending.text.push_str(text),
            Some(Node::Record(frame)) if frame.record.content_field().is_some() => {
                frame.content.get_or_insert_with(String::new).push_str(text);
            }
            Some(Node::Record(frame)) => trace!("discarding text inside <{}>", frame.element),
            None => trace!("discarding text outside the root element"),
        }
    }

    // ------------------------------- Ends -------------------------------- //

    fn end(&mut self, name: &QName) -> Result<()> {
        let Some(node) = self.stack.pop() else {
            return Err(BindError::MalformedInput(format!("unexpected closing tag '{}'", name.local)));
        };
        if node.element() != name.local {
            return Err(BindError::MalformedInput(format!(
                "closing tag '{}' does not match '{}'",
                name.local,
                node.element()
            )));
        }
        let path = self.path(&name.local);
        match node {
            Node::Text(pending) => {
                let parent = self.frame()?;
                let value = {
                    let field = parent.record.field(pending.field);
                    let ty = match shape_of(&field.ty) {
                        Shape::Repeated { element: Element::Text(ty), .. } => ty,
                        _ => &field.ty,
                    };
                    convert_text(&pending.text, ty, &path)?
                };
                parent.store(pending.field, value);
            }
            Node::Record(frame) => {
                debug!("pop frame <{}>", frame.element);
                let field = frame.field;
                let value = frame.finish(&path)?;
                match field {
                    Some(idx) => self.frame()?.store(idx, value),
                    None => self.done = Some(value),
                }
            }
        }
        Ok(())
    }

    fn end_document(self) -> Result<Value> {
        if let Some(node) = self.stack.last() {
            return Err(BindError::UnexpectedEndOfDocument { open: node.element().to_owned() });
        }
        self.done.ok_or_else(|| BindError::UnexpectedEndOfDocument {
            open: self.root.resolved().element_name.clone().unwrap_or_else(|| "root".to_owned()),
        })
    }

    // ------------------------------ Helpers ------------------------------ //

    fn frame(&mut self) -> Result<&mut Frame> {
        match self.stack.last_mut() {
            Some(Node::Record(frame)) => Ok(frame),
            _ => Err(BindError::MalformedInput("no open record element".into())),
        }
    }

    /// `/root/child/leaf` for the element `leaf` under the open stack.
    fn path(&self, leaf: &str) -> String {
        let mut out = String::new();
        for node in &self.stack {
            out.push('/');
            out.push_str(node.element());
        }
        out.push('/');
        out.push_str(leaf);
        out
    }
}

fn check_namespace(declared: Option<&Namespace>, start: &StartElement) -> Result<()> {
    let Some(ns) = declared else { return Ok(()) };
    if start.namespace.as_deref() == Some(ns.uri.as_str()) {
        return Ok(());
    }
    Err(BindError::NamespaceMismatch {
        element: start.name.local.clone(),
        expected: ns.uri.clone(),
        found: start.namespace.clone(),
    })
}

/// Bind the start tag's attributes into the new frame. Attribute fields are
/// looked up first, then ordinary fields; anything else is ignored.
fn apply_attributes(frame: &mut Frame, start: &StartElement, path: &str) -> Result<()> {
    let record = Arc::clone(&frame.record);
    for attr in &start.attributes {
        let local = attr.name.local.as_str();
        let Some((idx, field)) = record.attribute_named(local).or_else(|| record.field_named(local)) else {
            trace!("ignoring attribute '{local}' on <{}>", start.name.local);
            continue;
        };
        let attr_path = format!("{path}/@{local}");
        let value = match shape_of(&field.ty) {
            Shape::Text(ty) | Shape::Repeated { element: Element::Text(ty), .. } => {
                convert_text(&attr.value, ty, &attr_path)?
            }
            Shape::Open => Value::String(attr.value.clone()),
            _ => return Err(BindError::shape(&field.ty, format!("attribute '{local}'"), attr_path)),
        };
        frame.mark_seen(local);
        frame.store(idx, value);
    }
    Ok(())
}
