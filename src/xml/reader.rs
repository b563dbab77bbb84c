//! XML reader.
//!
//! A small character scanner that materializes the whole document into an
//! [`XmlDocument`] arena, keeping comments, CDATA sections and source line
//! numbers. It covers the XML subset the DTD workflow needs: declaration,
//! DOCTYPE, elements, attributes, text, comments and CDATA.

use crate::error::{Error, Result, SyntaxError};
use crate::xml::document::{Doctype, DoctypeId, XmlDocument, XmlNodeId};

/// Parses an XML string into a document arena.
pub fn parse(input: &str) -> Result<XmlDocument> {
    let mut reader = Reader::new(input);
    reader.parse_document()
}

struct Reader {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
    line: usize,
    column: usize,
}

impl Reader {
    fn new(input: &str) -> Self {
        let input_vec: Vec<char> = input.strip_prefix('\u{feff}').unwrap_or(input).chars().collect();
        let current_char = input_vec.first().copied();
        Self {
            input: input_vec,
            position: 0,
            current_char,
            line: 1,
            column: 1,
        }
    }

    fn advance(&mut self) {
        if let Some(c) = self.current_char {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.peek(i) == Some(c))
    }

    fn consume(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            for _ in 0..s.chars().count() {
                self.advance();
            }
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current_char {
            if !c.is_whitespace() {
                break;
            }
            self.advance();
        }
    }

    fn error(&self, err: SyntaxError) -> Error {
        Error::syntax(err).with_location(self.line, self.column)
    }

    fn parse_document(&mut self) -> Result<XmlDocument> {
        let mut doc = XmlDocument::new();

        self.skip_whitespace();
        if self.starts_with("<?xml") {
            doc.encoding = self.parse_declaration()?;
        }

        loop {
            self.skip_whitespace();
            match self.current_char {
                None => break,
                Some('<') => {
                    if self.starts_with("<!--") {
                        let comment = self.parse_comment()?;
                        let id = doc.new_comment(&comment);
                        doc.append_top_level(id);
                    } else if self.starts_with("<!DOCTYPE") {
                        doc.doctype = Some(self.parse_doctype()?);
                    } else {
                        let id = self.parse_element(&mut doc)?;
                        doc.append_top_level(id);
                    }
                }
                Some(c) => return Err(self.error(SyntaxError::UnexpectedCharacter(c))),
            }
        }

        if doc.root().is_none() {
            return Err(self.error(SyntaxError::UnexpectedEof));
        }
        Ok(doc)
    }

    /// `<?xml version="1.0" encoding="..."?>`; returns the encoding.
    fn parse_declaration(&mut self) -> Result<Option<String>> {
        self.consume("<?xml");
        let mut encoding = None;
        loop {
            self.skip_whitespace();
            if self.consume("?>") {
                return Ok(encoding);
            }
            if self.current_char.is_none() {
                return Err(self.error(SyntaxError::UnexpectedEof));
            }
            let name = self.read_name()?;
            self.skip_whitespace();
            if !self.consume("=") {
                return Err(self.error(SyntaxError::BadDeclaration("xml declaration".into())));
            }
            self.skip_whitespace();
            let value = self.read_quoted()?;
            if name == "encoding" {
                encoding = Some(value);
            }
        }
    }

    fn parse_doctype(&mut self) -> Result<Doctype> {
        self.consume("<!DOCTYPE");
        self.skip_whitespace();
        let root = self.read_name()?;
        self.skip_whitespace();
        let id = if self.consume("SYSTEM") {
            self.skip_whitespace();
            DoctypeId::System(self.read_quoted()?)
        } else if self.consume("PUBLIC") {
            self.skip_whitespace();
            let public = self.read_quoted()?;
            self.skip_whitespace();
            let system = self.read_quoted()?;
            DoctypeId::Public(public, system)
        } else {
            return Err(self.error(SyntaxError::BadDeclaration("DOCTYPE".into())));
        };
        self.skip_whitespace();
        if !self.consume(">") {
            return Err(self.error(SyntaxError::BadDeclaration("DOCTYPE".into())));
        }
        Ok(Doctype { root, id })
    }

    fn parse_element(&mut self, doc: &mut XmlDocument) -> Result<XmlNodeId> {
        let line = self.line;
        if !self.consume("<") {
            return Err(self.error(SyntaxError::UnexpectedEof));
        }
        let tag = self.read_name()?;
        let id = doc.new_element(&tag, line);

        loop {
            self.skip_whitespace();
            if self.consume("/>") {
                return Ok(id);
            }
            if self.consume(">") {
                break;
            }
            let name = self.read_name()?;
            self.skip_whitespace();
            if !self.consume("=") {
                return Err(self.error(SyntaxError::BadDeclaration(name)));
            }
            self.skip_whitespace();
            let value = self.read_quoted()?;
            doc.set_attribute(id, &name, &decode_entities(&value));
        }

        // Children until the matching closing tag.
        loop {
            match self.current_char {
                None => return Err(self.error(SyntaxError::UnexpectedEof)),
                Some('<') => {
                    if self.starts_with("</") {
                        self.consume("</");
                        let closing = self.read_name()?;
                        self.skip_whitespace();
                        if !self.consume(">") {
                            return Err(self.error(SyntaxError::UnexpectedEof));
                        }
                        if closing != tag {
                            return Err(self.error(SyntaxError::MismatchedClosingTag {
                                expected: tag,
                                found: closing,
                            }));
                        }
                        return Ok(id);
                    } else if self.starts_with("<!--") {
                        let comment = self.parse_comment()?;
                        let child = doc.new_comment(&comment);
                        doc.append_child(id, child);
                    } else if self.starts_with("<![CDATA[") {
                        let cdata = self.parse_cdata()?;
                        let child = doc.new_cdata(&cdata);
                        doc.append_child(id, child);
                    } else {
                        let child = self.parse_element(doc)?;
                        doc.append_child(id, child);
                    }
                }
                Some(_) => {
                    let text = self.read_text();
                    let child = doc.new_text(&decode_entities(&text));
                    doc.append_child(id, child);
                }
            }
        }
    }

    fn parse_comment(&mut self) -> Result<String> {
        self.consume("<!--");
        let mut text = String::new();
        loop {
            if self.consume("-->") {
                return Ok(text);
            }
            match self.current_char {
                None => return Err(self.error(SyntaxError::UnterminatedComment)),
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }
    }

    fn parse_cdata(&mut self) -> Result<String> {
        self.consume("<![CDATA[");
        let mut text = String::new();
        loop {
            if self.consume("]]>") {
                return Ok(text);
            }
            match self.current_char {
                None => return Err(self.error(SyntaxError::UnterminatedCData)),
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }
    }

    fn read_text(&mut self) -> String {
        let mut text = String::new();
        while let Some(c) = self.current_char {
            if c == '<' {
                break;
            }
            text.push(c);
            self.advance();
        }
        text
    }

    fn read_name(&mut self) -> Result<String> {
        let mut name = String::new();
        while let Some(c) = self.current_char {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':') {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(self.error(SyntaxError::InvalidName(
                self.current_char.map(String::from).unwrap_or_default(),
            )));
        }
        Ok(name)
    }

    fn read_quoted(&mut self) -> Result<String> {
        let quote = match self.current_char {
            Some(c @ ('"' | '\'')) => c,
            Some(c) => return Err(self.error(SyntaxError::UnexpectedCharacter(c))),
            None => return Err(self.error(SyntaxError::UnexpectedEof)),
        };
        self.advance();
        let mut value = String::new();
        loop {
            match self.current_char {
                None => return Err(self.error(SyntaxError::UnterminatedString)),
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(value);
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }
}

/// Decodes the predefined XML entities plus numeric character references.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        match after.find(';') {
            Some(end) => {
                let entity = &after[1..end];
                match entity {
                    "lt" => out.push('<'),
                    "gt" => out.push('>'),
                    "amp" => out.push('&'),
                    "apos" => out.push('\''),
                    "quot" => out.push('"'),
                    _ => {
                        let decoded = entity
                            .strip_prefix("#x")
                            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                            .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                            .and_then(char::from_u32);
                        match decoded {
                            Some(c) => out.push(c),
                            None => {
                                out.push('&');
                                out.push_str(entity);
                                out.push(';');
                            }
                        }
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = &after[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
