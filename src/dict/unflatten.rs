//! Flat parameter unflattening.
//!
//! Form submissions arrive as flat `key=value` pairs where the key is a
//! colon-joined path like `movie:characters:1:character:_value`. This module
//! rebuilds the nested shape: intermediate maps for named segments, and a
//! collapse of purely-numeric-keyed maps into sequences with `Null` gaps so
//! sparse indices keep their positions.

use crate::dict::value::{DictMap, DictValue};

/// Unflattens colon-joined keys into nested data. Values are stripped of
/// surrounding whitespace; later duplicate keys win.
pub fn unflatten_params<'a, I>(params: I) -> DictValue
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut root = DictMap::new();
    for (key, value) in params {
        insert_path(&mut root, key, value.trim());
    }
    collapse_numeric(DictValue::Map(root))
}

fn insert_path(map: &mut DictMap, key: &str, value: &str) {
    let mut current = map;
    let mut segments = key.split(':').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment, DictValue::text(value));
            return;
        }
        let slot = current.entry_or_null(segment);
        if !matches!(slot, DictValue::Map(_)) {
            *slot = DictValue::Map(DictMap::new());
        }
        let DictValue::Map(next) = slot else {
            unreachable!()
        };
        current = next;
    }
}

/// Rewrites every map whose keys are all numeric into a sequence, padding
/// skipped indices with `Null`.
fn collapse_numeric(value: DictValue) -> DictValue {
    match value {
        DictValue::Map(map) => {
            let all_numeric =
                !map.is_empty() && map.keys().all(|key| key.parse::<usize>().is_ok());
            if all_numeric {
                let mut indexed: Vec<(usize, DictValue)> = map
                    .iter_sorted()
                    .map(|(key, sub)| {
                        (key.parse::<usize>().unwrap_or(0), collapse_numeric(sub.clone()))
                    })
                    .collect();
                indexed.sort_by_key(|(index, _)| *index);
                let mut seq = Vec::new();
                for (index, sub) in indexed {
                    while seq.len() < index {
                        seq.push(DictValue::Null);
                    }
                    seq.push(sub);
                }
                DictValue::Seq(seq)
            } else {
                DictValue::Map(
                    map.iter_sorted()
                        .map(|(key, sub)| (key.to_string(), collapse_numeric(sub.clone())))
                        .collect(),
                )
            }
        }
        DictValue::Seq(seq) => DictValue::Seq(seq.into_iter().map(collapse_numeric).collect()),
        other => other,
    }
}
