//! DTD declaration scanner.
//!
//! Turns raw DTD text into a flat mapping of element name to content-model
//! string plus the ordered attribute declarations, resolving parameter
//! entities and stripping comments along the way.

use std::collections::HashMap;

use crate::error::{Error, GrammarError, Result};

/// One `<!ATTLIST>` entry: name, declared type and default rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: String,
    pub declared_type: String,
    pub default_rule: String,
}

/// Flat output of the scanner: content models and attributes per element,
/// parameter entities already substituted.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    pub elements: HashMap<String, String>,
    pub attributes: HashMap<String, Vec<AttributeSpec>>,
}

impl Declarations {
    pub fn content_model(&self, tagname: &str) -> Option<&str> {
        self.elements.get(tagname).map(String::as_str)
    }

    pub fn attributes_of(&self, tagname: &str) -> &[AttributeSpec] {
        self.attributes.get(tagname).map_or(&[], Vec::as_slice)
    }
}

/// Parses raw DTD text into [`Declarations`].
pub fn parse(dtd: &str) -> Result<Declarations> {
    let cleaned = strip_comments(dtd);

    let mut elements: HashMap<String, String> = HashMap::new();
    let mut entities: HashMap<String, String> = HashMap::new();
    let mut attributes: HashMap<String, Vec<AttributeSpec>> = HashMap::new();

    for (word, body) in scan_declarations(&cleaned)? {
        match word.as_str() {
            "ELEMENT" => {
                let (name, model) = parse_element(&strip_eol(&body))?;
                elements.insert(name, model);
            }
            "ENTITY" => {
                let (name, replacement) = parse_entity(&strip_eol(&body))?;
                entities.insert(name, replacement);
            }
            "ATTLIST" => {
                let (name, specs) = parse_attlist(&body)?;
                attributes.entry(name).or_default().extend(specs);
            }
            other => {
                return Err(Error::grammar(GrammarError::UnsupportedDeclaration(
                    other.to_string(),
                )))
            }
        }
    }

    // Parameter entities are substituted textually into the content models
    // before any compilation happens.
    for model in elements.values_mut() {
        for (name, replacement) in &entities {
            let reference = format!("{};", name);
            if model.contains(&reference) {
                *model = model.replace(&reference, replacement);
            }
        }
    }

    Ok(Declarations {
        elements,
        attributes,
    })
}

/// Removes `<!-- ... -->` comments, non-greedy and multiline.
fn strip_comments(dtd: &str) -> String {
    let mut out = String::with_capacity(dtd.len());
    let mut rest = dtd;
    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 4..];
        match after.find("-->") {
            Some(end) => rest = &after[end + 3..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

fn strip_eol(value: &str) -> String {
    value.replace(['\n', '\r'], "")
}

/// Scans for `<!WORD ...>` declarations and returns `(WORD, body)` pairs.
/// Anything outside such declarations is ignored.
fn scan_declarations(text: &str) -> Result<Vec<(String, String)>> {
    let chars: Vec<char> = text.chars().collect();
    let mut declarations = Vec::new();
    let mut position = 0;

    while position < chars.len() {
        if chars[position] != '<' || chars.get(position + 1) != Some(&'!') {
            position += 1;
            continue;
        }
        let mut cursor = position + 2;
        let mut word = String::new();
        while let Some(c) = chars.get(cursor) {
            if c.is_ascii_uppercase() {
                word.push(*c);
                cursor += 1;
            } else {
                break;
            }
        }
        if word.is_empty() {
            position += 1;
            continue;
        }
        let mut body = String::new();
        let mut closed = false;
        while let Some(c) = chars.get(cursor) {
            if *c == '>' {
                closed = true;
                cursor += 1;
                break;
            }
            body.push(*c);
            cursor += 1;
        }
        if !closed {
            return Err(Error::grammar(GrammarError::MalformedElement(format!(
                "<!{}{}",
                word, body
            ))));
        }
        declarations.push((word, body));
        position = cursor;
    }

    Ok(declarations)
}

/// Parses an ELEMENT body into `(name, content model)`. The outer
/// parentheses of the model are stripped; `EMPTY` and similar bare models
/// come back as-is. All spaces are removed from the model.
fn parse_element(body: &str) -> Result<(String, String)> {
    let trimmed = body.trim_start();
    let name_end = trimmed
        .find(|c: char| c == '(' || c.is_whitespace())
        .ok_or_else(|| Error::grammar(GrammarError::MalformedElement(body.to_string())))?;
    let name = &trimmed[..name_end];
    if name.is_empty() {
        return Err(Error::grammar(GrammarError::MalformedElement(
            body.to_string(),
        )));
    }
    let rest = trimmed[name_end..].trim_start();

    // Strip the outer parentheses only when they wrap the whole model;
    // a trailing repetition marker as in `(#PCDATA|a)*` must survive.
    let model = match matching_close(rest) {
        Some(close) if close == rest.len() - 1 => &rest[1..close],
        _ => rest,
    };
    if model.is_empty() {
        return Err(Error::grammar(GrammarError::MalformedElement(
            body.to_string(),
        )));
    }
    if model.matches('(').count() != model.matches(')').count() {
        return Err(Error::grammar(GrammarError::UnbalancedParens(
            body.to_string(),
        )));
    }
    Ok((name.to_string(), model.replace(' ', "")))
}

/// The byte index of the parenthesis matching a leading `(`, if any.
fn matching_close(model: &str) -> Option<usize> {
    if !model.starts_with('(') {
        return None;
    }
    let mut depth = 0usize;
    for (index, c) in model.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses an ENTITY body into `(%name, replacement)`.
fn parse_entity(body: &str) -> Result<(String, String)> {
    let trimmed = body.trim_start();
    if !trimmed.starts_with('%') {
        return Err(Error::grammar(GrammarError::MalformedEntity(
            body.to_string(),
        )));
    }
    let open = trimmed
        .find('"')
        .ok_or_else(|| Error::grammar(GrammarError::MalformedEntity(body.to_string())))?;
    let close = trimmed.rfind('"').unwrap_or(open);
    if close <= open {
        return Err(Error::grammar(GrammarError::MalformedEntity(
            body.to_string(),
        )));
    }
    let name = trimmed[..open].replace(' ', "");
    let replacement = trimmed[open + 1..close].replace(' ', "");
    Ok((name, replacement))
}

/// Parses an ATTLIST body: the element name followed by
/// `(name, type, default)` triples. An element may carry several ATTLIST
/// declarations, the caller accumulates them.
fn parse_attlist(body: &str) -> Result<(String, Vec<AttributeSpec>)> {
    let flattened = strip_eol(body);
    let tokens: Vec<&str> = flattened.split_whitespace().collect();
    let (name, attr_tokens) = tokens
        .split_first()
        .ok_or_else(|| Error::grammar(GrammarError::MalformedAttlist(body.to_string())))?;
    if attr_tokens.len() % 3 != 0 {
        return Err(Error::grammar(GrammarError::MalformedAttlist(
            body.to_string(),
        )));
    }
    let specs = attr_tokens
        .chunks(3)
        .filter_map(|chunk| match chunk {
            [attr_name, attr_type, default_rule] => Some(AttributeSpec {
                name: (*attr_name).to_string(),
                declared_type: (*attr_type).to_string(),
                default_rule: (*default_rule).to_string(),
            }),
            _ => None,
        })
        .collect();
    Ok(((*name).to_string(), specs))
}
