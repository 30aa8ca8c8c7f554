//! Forward-only XML event stream consumed by the decoder.
//!
//! [`QuickXmlSource`] adapts `quick_xml::NsReader`; [`EventList`] replays a
//! prepared sequence, which is handy for callers that already tokenized.
use std::collections::VecDeque;
use std::io::BufRead;

use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{QName as RawQName, ResolveResult};
use quick_xml::NsReader;

use crate::error::{BindError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub namespace: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartElement {
    pub name: QName,
    /// Resolved namespace URI of the element, if any is in scope.
    pub namespace: Option<String>,
    /// Attributes, without `xmlns` declarations.
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    StartElement(StartElement),
    EndElement(QName),
    Characters(String),
    CData(String),
    Comment(String),
    ProcessingInstruction,
    Dtd,
    EndDocument,
}

pub trait EventSource {
    fn next_event(&mut self) -> Result<XmlEvent>;
}

impl<S: EventSource + ?Sized> EventSource for &mut S {
    fn next_event(&mut self) -> Result<XmlEvent> {
        (**self).next_event()
    }
}

// ------------------------------- Helpers --------------------------------- //

impl QName {
    pub fn local(local: impl Into<String>) -> Self {
        Self { prefix: None, local: local.into() }
    }
}

impl StartElement {
    pub fn new(local: impl Into<String>) -> Self {
        Self { name: QName::local(local), namespace: None, attributes: Vec::new() }
    }

    pub fn in_namespace(mut self, uri: impl Into<String>) -> Self {
        self.namespace = Some(uri.into());
        self
    }

    pub fn with_attribute(mut self, local: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute { name: QName::local(local), namespace: None, value: value.into() });
        self
    }
}

// ------------------------------ EventList -------------------------------- //

/// Replays prepared events, then reports `EndDocument` forever.
#[derive(Debug, Default)]
pub struct EventList(VecDeque<XmlEvent>);

impl EventList {
    pub fn new(events: impl IntoIterator<Item = XmlEvent>) -> Self {
        Self(events.into_iter().collect())
    }
}

impl EventSource for EventList {
    fn next_event(&mut self) -> Result<XmlEvent> {
        Ok(self.0.pop_front().unwrap_or(XmlEvent::EndDocument))
    }
}

// ---------------------------- QuickXmlSource ----------------------------- //

pub struct QuickXmlSource<R: BufRead> {
    reader: NsReader<R>,
    buf: Vec<u8>,
    queued: VecDeque<XmlEvent>,
    text: Option<String>,
}

impl<'a> QuickXmlSource<&'a [u8]> {
    pub fn from_str(input: &'a str) -> Self {
        Self::new(input.as_bytes())
    }
}

impl<R: BufRead> QuickXmlSource<R> {
    pub fn new(input: R) -> Self {
        Self {
            reader: NsReader::from_reader(input),
            buf: Vec::new(),
            queued: VecDeque::new(),
            text: None,
        }
    }

    /// Emit pending text before `event`, keeping document order.
    fn emit(&mut self, event: XmlEvent) -> XmlEvent {
        match self.text.take() {
            Some(text) => {
                self.queued.push_back(event);
                XmlEvent::Characters(text)
            }
            None => event,
        }
    }
}

impl<R: BufRead> EventSource for QuickXmlSource<R> {
    fn next_event(&mut self) -> Result<XmlEvent> {
        if let Some(event) = self.queued.pop_front() {
            return Ok(event);
        }
        loop {
            self.buf.clear();
            let (resolve, event) = self.reader.read_resolved_event_into(&mut self.buf).map_err(malformed)?;
            let namespace = resolve_namespace(resolve);
            let next = match event {
                Event::Start(e) => XmlEvent::StartElement(start_element(&self.reader, namespace, &e)?),
                Event::Empty(e) => {
                    let start = start_element(&self.reader, namespace, &e)?;
                    let end = XmlEvent::EndElement(start.name.clone());
                    // pending text, then start, then end
                    let first = self.emit(XmlEvent::StartElement(start));
                    self.queued.push_back(end);
                    return Ok(first);
                }
                Event::End(e) => XmlEvent::EndElement(qname(e.name())?),
                Event::Text(e) => {
                    let text = e.decode().map_err(malformed)?;
                    self.text.get_or_insert_with(String::new).push_str(&text);
                    continue;
                }
                Event::GeneralRef(e) => {
                    let raw = e.decode().map_err(malformed)?;
                    let resolved = resolve_entity(&raw)?;
                    self.text.get_or_insert_with(String::new).push_str(&resolved);
                    continue;
                }
                Event::CData(e) => XmlEvent::CData(utf8(e.as_ref())?.to_owned()),
                Event::Comment(e) => XmlEvent::Comment(utf8(e.as_ref())?.to_owned()),
                Event::PI(_) => XmlEvent::ProcessingInstruction,
                Event::DocType(_) => XmlEvent::Dtd,
                Event::Decl(_) => continue,
                Event::Eof => XmlEvent::EndDocument,
            };
            return Ok(self.emit(next));
        }
    }
}

fn start_element<R>(reader: &NsReader<R>, namespace: Option<String>, e: &BytesStart<'_>) -> Result<StartElement> {
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(malformed)?;
        let key = attr.key;
        if key.as_ref() == b"xmlns" || key.prefix().is_some_and(|p| p.as_ref() == b"xmlns") {
            continue;
        }
        let (resolve, _) = reader.resolver().resolve_attribute(key);
        let namespace = resolve_namespace(resolve);
        let value = attr.unescape_value().map_err(malformed)?.into_owned();
        attributes.push(Attribute { name: qname(key)?, namespace, value });
    }
    Ok(StartElement { name: qname(e.name())?, namespace, attributes })
}

fn qname(name: RawQName<'_>) -> Result<QName> {
    let prefix = match name.prefix() {
        Some(p) => Some(utf8(p.as_ref())?.to_owned()),
        None => None,
    };
    let local = utf8(name.local_name().as_ref())?.to_owned();
    Ok(QName { prefix, local })
}

fn resolve_namespace(resolve: ResolveResult<'_>) -> Option<String> {
    match resolve {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        ResolveResult::Unbound | ResolveResult::Unknown(_) => None,
    }
}

/// Predefined (`&amp;`) and numeric (`&#38;`, `&#x26;`) references.
fn resolve_entity(raw: &str) -> Result<String> {
    if let Some(resolved) = resolve_xml_entity(raw) {
        return Ok(resolved.to_owned());
    }
    let Some(rest) = raw.strip_prefix('#') else {
        return Err(BindError::MalformedInput(format!("undefined entity reference '&{raw};'")));
    };
    let code = match rest.strip_prefix('x').or_else(|| rest.strip_prefix('X')) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => rest.parse::<u32>(),
    }
    .map_err(|_| BindError::MalformedInput(format!("invalid character reference '&{raw};'")))?;
    char::from_u32(code)
        .map(String::from)
        .ok_or_else(|| BindError::MalformedInput(format!("invalid character reference '&{raw};'")))
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(malformed)
}

fn malformed(err: impl std::fmt::Display) -> BindError {
    BindError::MalformedInput(err.to_string())
}
