//! Minimal, tolerant XML parser.
//!
//! The whole document is parsed into an arena of nodes. Parsing never fails:
//! malformed input produces [`XmlDiagnostic`]s alongside a best-effort tree.

use std::collections::HashMap;
use std::fmt;

/// Deepest element nesting accepted. Parsing stops at the first element
/// beyond it.
pub const MAX_NESTING_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XmlNodeId(usize);

#[derive(Debug, Clone)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
}

#[derive(Debug, Clone)]
pub struct XmlElement {
    pub name: String,
    pub attributes: HashMap<String, String>,
    pub children: Vec<XmlNodeId>,
    pub parent: Option<XmlNodeId>,
    /// 1-based line of the opening `<`.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDiagnostic {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for XmlDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct XmlDocument {
    nodes: Vec<XmlNode>,
    root: Option<XmlNodeId>,
    diagnostics: Vec<XmlDiagnostic>,
}

impl XmlDocument {
    pub fn root(&self) -> Option<XmlNodeId> {
        self.root
    }

    pub fn diagnostics(&self) -> &[XmlDiagnostic] {
        &self.diagnostics
    }

    pub fn node(&self, id: XmlNodeId) -> &XmlNode {
        &self.nodes[id.0]
    }

    /// Returns the element behind `id`, or `None` for text and CDATA nodes.
    pub fn element(&self, id: XmlNodeId) -> Option<&XmlElement> {
        match &self.nodes[id.0] {
            XmlNode::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn parent(&self, id: XmlNodeId) -> Option<XmlNodeId> {
        self.element(id).and_then(|element| element.parent)
    }

    pub fn attribute(&self, id: XmlNodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|element| element.attributes.get(name))
            .map(|value| value.as_str())
    }

    /// All child nodes of `id`, including text and CDATA.
    pub fn children(&self, id: XmlNodeId) -> &[XmlNodeId] {
        self.element(id)
            .map(|element| element.children.as_slice())
            .unwrap_or_default()
    }

    /// Child elements of `id` in document order, skipping text and CDATA.
    pub fn child_elements(&self, id: XmlNodeId) -> impl Iterator<Item = XmlNodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.element(*child).is_some())
    }

    /// Concatenated text and CDATA content of the direct children of `id`.
    pub fn text_content(&self, id: XmlNodeId) -> String {
        let mut text = String::new();
        if let Some(element) = self.element(id) {
            for child in &element.children {
                match &self.nodes[child.0] {
                    XmlNode::Text(value) | XmlNode::CData(value) => text.push_str(value),
                    XmlNode::Element(_) => {}
                }
            }
        }
        text
    }
}

pub fn parse_xml(input: &str) -> XmlDocument {
    let mut parser = XmlParser::new(input);
    parser.parse_document();
    XmlDocument {
        nodes: parser.nodes,
        root: parser.root,
        diagnostics: parser.diagnostics,
    }
}

struct XmlParser<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    nodes: Vec<XmlNode>,
    root: Option<XmlNodeId>,
    diagnostics: Vec<XmlDiagnostic>,
    depth: usize,
    too_deep: bool,
}

impl<'a> XmlParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            nodes: Vec::new(),
            root: None,
            diagnostics: Vec::new(),
            depth: 0,
            too_deep: false,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn advance_by(&mut self, bytes: usize) {
        let target = (self.pos + bytes).min(self.input.len());
        while self.pos < target {
            self.advance();
        }
    }

    /// Consumes everything up to and including `terminator`. Returns the text
    /// before it, or `None` (having consumed the rest) when it never appears.
    fn consume_until(&mut self, terminator: &str) -> Option<&'a str> {
        let start = self.pos;
        match self.rest().find(terminator) {
            Some(offset) => {
                self.advance_by(offset);
                let content = &self.input[start..self.pos];
                self.advance_by(terminator.len());
                Some(content)
            }
            None => {
                self.advance_by(self.input.len() - self.pos);
                None
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.advance();
        }
    }

    fn error(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics.push(XmlDiagnostic {
            line,
            message: message.into(),
        });
    }

    fn parse_document(&mut self) {
        loop {
            self.skip_whitespace();
            let line = self.line;
            if self.starts_with("<?") {
                if self.consume_until("?>").is_none() {
                    self.error(line, "Unterminated processing instruction");
                }
            } else if self.starts_with("<!--") {
                self.skip_comment();
            } else if self.starts_with("<!DOCTYPE") || self.starts_with("<!doctype") {
                self.skip_doctype();
            } else {
                break;
            }
        }

        let is_element_start = self.starts_with("<")
            && self.rest()[1..].chars().next().is_some_and(is_name_start);
        if !is_element_start {
            let line = self.line;
            self.error(line, "No root element found");
            return;
        }
        let root = self.parse_element(None);
        self.root = Some(root);

        loop {
            self.skip_whitespace();
            if self.starts_with("<!--") {
                self.skip_comment();
            } else if self.starts_with("<?") {
                self.consume_until("?>");
            } else {
                break;
            }
        }
        if !self.at_end() {
            let line = self.line;
            self.error(line, "Unexpected content after the root element");
        }
    }

    fn skip_comment(&mut self) {
        let line = self.line;
        self.advance_by(4);
        if self.consume_until("-->").is_none() {
            self.error(line, "Unterminated comment");
        }
    }

    fn skip_doctype(&mut self) {
        let line = self.line;
        let mut depth = 0usize;
        while let Some(ch) = self.advance() {
            match ch {
                '<' => depth += 1,
                '>' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
        self.error(line, "Unterminated DOCTYPE declaration");
    }

    fn read_name(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if is_name_char(ch)) {
            self.advance();
        }
        &self.input[start..self.pos]
    }

    fn push_node(&mut self, node: XmlNode) -> XmlNodeId {
        self.nodes.push(node);
        XmlNodeId(self.nodes.len() - 1)
    }

    fn element_mut(&mut self, id: XmlNodeId) -> &mut XmlElement {
        match &mut self.nodes[id.0] {
            XmlNode::Element(element) => element,
            _ => unreachable!("element ids always point at elements"),
        }
    }

    fn parse_element(&mut self, parent: Option<XmlNodeId>) -> XmlNodeId {
        let line = self.line;
        self.advance();
        let name = self.read_name().to_string();
        let id = self.push_node(XmlNode::Element(XmlElement {
            name: name.clone(),
            attributes: HashMap::new(),
            children: Vec::new(),
            parent,
            line,
        }));

        loop {
            self.skip_whitespace();
            if self.starts_with("/>") {
                self.advance_by(2);
                return id;
            }
            match self.peek() {
                Some('>') => {
                    self.advance();
                    break;
                }
                None => {
                    self.error(line, format!("Unexpected end of input inside <{name}> tag"));
                    return id;
                }
                Some(_) => self.parse_attribute(id, &name),
            }
        }

        self.parse_content(id, &name, line);
        id
    }

    fn parse_attribute(&mut self, id: XmlNodeId, element_name: &str) {
        let line = self.line;
        let attr_name = self.read_name().to_string();
        if attr_name.is_empty() {
            let ch = self.advance().unwrap_or_default();
            self.error(line, format!("Unexpected character '{ch}' in <{element_name}> tag"));
            return;
        }
        self.skip_whitespace();
        if self.peek() != Some('=') {
            self.error(line, format!("Attribute \"{attr_name}\" has no value"));
            return;
        }
        self.advance();
        self.skip_whitespace();
        let quote = match self.peek() {
            Some(quote @ ('"' | '\'')) => quote,
            _ => {
                self.error(line, format!("Attribute \"{attr_name}\" value is not quoted"));
                return;
            }
        };
        self.advance();
        let terminator = quote.to_string();
        let Some(raw) = self.consume_until(&terminator) else {
            self.error(line, format!("Unterminated value of attribute \"{attr_name}\""));
            return;
        };
        let value = decode_entities(raw);
        self.element_mut(id).attributes.insert(attr_name, value);
    }

    fn parse_content(&mut self, id: XmlNodeId, name: &str, line: usize) {
        loop {
            if self.at_end() {
                self.error(line, format!("Missing end tag for <{name}>"));
                return;
            }
            if self.starts_with("</") {
                let end_line = self.line;
                self.advance_by(2);
                let end_name = self.read_name().to_string();
                self.skip_whitespace();
                if self.peek() == Some('>') {
                    self.advance();
                } else {
                    self.consume_until(">");
                    self.error(end_line, format!("Malformed end tag </{end_name}>"));
                }
                if end_name != name {
                    self.error(
                        end_line,
                        format!("Mismatched end tag: expected </{name}> but found </{end_name}>"),
                    );
                }
                return;
            }
            if self.starts_with("<!--") {
                self.skip_comment();
            } else if self.starts_with("<![CDATA[") {
                let cdata_line = self.line;
                self.advance_by("<![CDATA[".len());
                let content = match self.consume_until("]]>") {
                    Some(content) => content.to_string(),
                    None => {
                        self.error(cdata_line, "Unterminated CDATA section");
                        return;
                    }
                };
                let child = self.push_node(XmlNode::CData(content));
                self.element_mut(id).children.push(child);
            } else if self.starts_with("<?") {
                self.consume_until("?>");
            } else if self.starts_with("<!") {
                self.consume_until(">");
            } else if self.starts_with("<") {
                if self.depth >= MAX_NESTING_DEPTH {
                    let line = self.line;
                    self.error(line, "Document nested too deeply");
                    self.too_deep = true;
                    self.pos = self.input.len();
                    return;
                }
                self.depth += 1;
                let child = self.parse_element(Some(id));
                self.depth -= 1;
                self.element_mut(id).children.push(child);
                if self.too_deep {
                    return;
                }
            } else {
                let start = self.pos;
                let length = self.rest().find('<').unwrap_or(self.input.len() - self.pos);
                self.advance_by(length);
                let text = decode_entities(&self.input[start..self.pos]);
                let child = self.push_node(XmlNode::Text(text));
                self.element_mut(id).children.push(child);
            }
        }
    }
}

fn is_name_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == ':'
}

fn is_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '-' | '_' | '.' | ':')
}

/// Decodes the predefined entities and numeric character references.
/// Anything unknown or out of range is kept verbatim.
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .and_then(|semi| decode_entity(&rest[1..semi]).map(|ch| (ch, semi)));
        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => {
            let number = entity.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse::<u32>().ok()?,
            };
            // Surrogates and values above U+10FFFF are rejected here.
            char::from_u32(code)
        }
    }
}
