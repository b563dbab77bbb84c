//! Content-model parser.
//!
//! Turns one content-model string such as `a,(b|c)+,d?` into an ordered
//! list of child specifications carrying the required/repeatable flags and,
//! for parenthesized alternations, the set of alternatives.

/// One child slot in a content model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSpec {
    /// The child tagname, or the synthetic `_`-joined name of an alternation.
    pub name: String,
    pub required: bool,
    pub repeatable: bool,
    /// Non-empty only when this slot is a parenthesized choice; `name` is
    /// then never itself a real tag.
    pub alternatives: Vec<ContentSpec>,
}

impl ContentSpec {
    pub fn is_choice(&self) -> bool {
        !self.alternatives.is_empty()
    }
}

/// Parses a whole content-model string. The caller is expected to have
/// handled the `#PCDATA`/`EMPTY` leaf models already.
pub fn parse_specs(model: &str) -> Vec<ContentSpec> {
    split_top_level(model)
        .into_iter()
        .map(|token| parse_token(&token))
        .collect()
}

/// Splits on commas that are not nested inside parentheses.
fn split_top_level(model: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in model.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                tokens.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() || tokens.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn parse_token(token: &str) -> ContentSpec {
    let mut name = token;
    let mut required = true;
    let mut repeatable = false;
    if let Some(stripped) = token.strip_suffix('+') {
        name = stripped;
        repeatable = true;
    } else if let Some(stripped) = token.strip_suffix('*') {
        name = stripped;
        repeatable = true;
        required = false;
    } else if let Some(stripped) = token.strip_suffix('?') {
        name = stripped;
        required = false;
    }

    if !name.contains('|') {
        return ContentSpec {
            name: name.to_string(),
            required,
            repeatable,
            alternatives: Vec::new(),
        };
    }

    // A parenthesized alternation: each alternative is forced required, and
    // inherits the repeatable flag of the enclosing slot.
    let inner = name.replace(['(', ')'], "");
    let names: Vec<&str> = inner.split('|').collect();
    let alternatives = names
        .iter()
        .map(|alt| ContentSpec {
            name: (*alt).to_string(),
            required: true,
            repeatable,
            alternatives: Vec::new(),
        })
        .collect();
    ContentSpec {
        name: names.join("_"),
        required,
        repeatable,
        alternatives,
    }
}

/// Detects the "mixed content" shape `(#PCDATA|a|b)*` and rewrites it into
/// the optional trailing-children model `a?,b?`. Returns the rewritten model
/// together with the empty-leaf flag, or `None` when the model is not mixed.
/// This heuristic matches exactly one DTD shape and is deliberately not
/// extended to deeper or reordered patterns.
pub fn rewrite_mixed(model: &str) -> Option<(String, bool)> {
    let specs = parse_specs(model);
    let first = specs.first()?;
    let head = first.alternatives.first()?;
    if head.name != "#PCDATA" && head.name != "EMPTY" {
        return None;
    }
    let is_empty = head.name == "EMPTY";
    let mut rewritten = model.replace("#PCDATA|", "").replace("EMPTY|", "");
    rewritten = rewritten.replace('|', "?,");
    // Drop the surrounding parentheses and the trailing repetition marker,
    // then make the last alternative optional like the others.
    let chars: Vec<char> = rewritten.chars().collect();
    if chars.len() > 2 {
        rewritten = chars[1..chars.len() - 2].iter().collect::<String>() + "?";
    } else {
        rewritten = String::new();
    }
    Some((rewritten, is_empty))
}
