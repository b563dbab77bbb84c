//! Minimal xpath-style lookup over a document arena.
//!
//! Supports the path subset the tree API needs: absolute (`/a/b`) and
//! relative (`a/b`) location paths, the descendant axis (`//b`), the `*`
//! wildcard and 1-based positional predicates (`[2]`).

use crate::error::{Error, Result, TreeError};
use crate::xml::document::{XmlDocument, XmlNodeId};

/// Evaluates `expr` from `context` and returns matching element ids in
/// document order.
pub fn evaluate(doc: &XmlDocument, context: XmlNodeId, expr: &str) -> Result<Vec<XmlNodeId>> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(Error::tree(TreeError::UnsupportedOperation(
            "empty xpath expression".to_string(),
        )));
    }

    let (mut current, remainder): (Vec<XmlNodeId>, &str) = if let Some(rest) =
        trimmed.strip_prefix("//")
    {
        // The descendant axis searches the whole document.
        (doc.root().into_iter().collect(), rest)
    } else if let Some(rest) = trimmed.strip_prefix('/') {
        // Absolute path: the first step must name the document root.
        let (step, rest) = split_step(rest);
        let step = parse_step(step)?;
        let root: Vec<XmlNodeId> = doc
            .root()
            .into_iter()
            .filter(|id| step.matches(doc, *id))
            .collect();
        (apply_predicate(root, &step), rest)
    } else {
        (vec![context], trimmed)
    };

    if trimmed.starts_with("//") {
        // Apply the first step on the descendant-or-self axis.
        let (step, rest) = split_step(remainder);
        let step = parse_step(step)?;
        let mut matched = Vec::new();
        for id in &current {
            collect_descendants(doc, *id, &step, true, &mut matched);
        }
        current = apply_predicate(matched, &step);
        return walk_steps(doc, current, rest);
    }

    walk_steps(doc, current, remainder)
}

fn walk_steps(doc: &XmlDocument, mut current: Vec<XmlNodeId>, path: &str) -> Result<Vec<XmlNodeId>> {
    let mut rest = path;
    while !rest.is_empty() {
        if let Some(descendant_rest) = rest.strip_prefix('/') {
            if let Some(deep_rest) = descendant_rest.strip_prefix('/') {
                let (step, next) = split_step(deep_rest);
                let step = parse_step(step)?;
                let mut matched = Vec::new();
                for id in &current {
                    collect_descendants(doc, *id, &step, false, &mut matched);
                }
                current = apply_predicate(matched, &step);
                rest = next;
                continue;
            }
            rest = descendant_rest;
            continue;
        }
        let (step, next) = split_step(rest);
        let step = parse_step(step)?;
        let mut matched = Vec::new();
        for id in &current {
            for child in doc.element_children(*id) {
                if step.matches(doc, child) {
                    matched.push(child);
                }
            }
        }
        current = apply_predicate(matched, &step);
        rest = next;
    }
    Ok(current)
}

struct Step {
    name: String,
    position: Option<usize>,
}

impl Step {
    fn matches(&self, doc: &XmlDocument, id: XmlNodeId) -> bool {
        self.name == "*" || doc.tag(id) == Some(self.name.as_str())
    }
}

fn split_step(path: &str) -> (&str, &str) {
    match path.find('/') {
        Some(pos) => (&path[..pos], &path[pos..]),
        None => (path, ""),
    }
}

fn parse_step(step: &str) -> Result<Step> {
    if step.is_empty() {
        return Err(Error::tree(TreeError::UnsupportedOperation(
            "empty xpath step".to_string(),
        )));
    }
    match step.find('[') {
        Some(open) => {
            let close = step.rfind(']').unwrap_or(step.len());
            let index: usize = step
                .get(open + 1..close)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| {
                    Error::tree(TreeError::UnsupportedOperation(format!(
                        "unsupported xpath predicate in '{}'",
                        step
                    )))
                })?;
            Ok(Step {
                name: step[..open].to_string(),
                position: Some(index),
            })
        }
        None => Ok(Step {
            name: step.to_string(),
            position: None,
        }),
    }
}

fn apply_predicate(matched: Vec<XmlNodeId>, step: &Step) -> Vec<XmlNodeId> {
    match step.position {
        // Positions are 1-based.
        Some(position) => matched
            .into_iter()
            .nth(position.saturating_sub(1))
            .into_iter()
            .collect(),
        None => matched,
    }
}

fn collect_descendants(
    doc: &XmlDocument,
    id: XmlNodeId,
    step: &Step,
    include_self: bool,
    out: &mut Vec<XmlNodeId>,
) {
    if include_self && step.matches(doc, id) {
        out.push(id);
    }
    for child in doc.element_children(id) {
        if step.matches(doc, child) {
            out.push(child);
        }
        collect_descendants(doc, child, step, false, out);
    }
}
