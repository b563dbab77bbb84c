//! High-level entry points.
//!
//! Ties the layers together: fetch and compile a DTD, parse an XML
//! document, build the runtime tree, and hand back [`Node`] handles ready
//! for editing.

use std::path::Path;
use std::rc::Rc;

use tracing::{debug, info, instrument};

use crate::dict::value::DictValue;
use crate::dtd::source::Dtd;
use crate::error::{ConfigError, Error, IoError, Result, SyntaxError};
use crate::tree::node::{Node, WriteOptions};
use crate::tree::path;
use crate::xml::reader;

/// Creates a bare tree rooted at `tagname`, declared by `dtd`.
#[instrument(skip(dtd))]
pub fn create(tagname: &str, dtd: &Dtd) -> Result<Node> {
    let schema = dtd.schema()?;
    let node = Node::root(&schema, tagname)?;
    node.update_root_info(|info| {
        info.dtd_url = dtd.url.clone();
        info.dtd_str = dtd.text.clone();
    });
    Ok(node)
}

/// Loads an XML file, resolving its DTD from the DOCTYPE. Relative DTD
/// paths resolve against the file's directory. With `validate` the
/// document is checked against the compiled schema before any tree is
/// built, so invalid input is rejected instead of normalized on output.
#[instrument]
pub fn load_file(filename: &str, validate: bool) -> Result<Node> {
    debug!("loading xml file");
    let content = read_file(filename)?;
    load_document(&content, None, Some(filename), validate)
}

/// Loads an XML string; the DOCTYPE must name the DTD.
pub fn load_string(content: &str, validate: bool) -> Result<Node> {
    load_document(content, None, None, validate)
}

/// Loads an XML string against an explicitly supplied DTD, ignoring any
/// DOCTYPE in the document.
pub fn load_string_with_dtd(content: &str, dtd: &Dtd, validate: bool) -> Result<Node> {
    load_document(content, Some(dtd), None, validate)
}

fn load_document(
    content: &str,
    dtd: Option<&Dtd>,
    filename: Option<&str>,
    validate: bool,
) -> Result<Node> {
    let doc = Rc::new(reader::parse(content)?);

    let dtd = match dtd {
        Some(dtd) => dtd.clone(),
        None => {
            let doctype = doc
                .doctype
                .as_ref()
                .ok_or_else(|| Error::config(ConfigError::MissingDtd))?;
            let mut dtd = Dtd::from_url(doctype.system_url());
            if let Some(base) = filename.and_then(|f| Path::new(f).parent()) {
                dtd = dtd.with_base_path(base);
            }
            dtd
        }
    };
    let schema = dtd.schema()?;
    if validate {
        crate::validate::validate_document(&doc, &schema)?;
    }

    let root_id = doc
        .root()
        .ok_or_else(|| Error::syntax(SyntaxError::UnexpectedEof))?;
    let root_tag = doc
        .tag(root_id)
        .ok_or_else(|| Error::syntax(SyntaxError::UnexpectedEof))?
        .to_string();

    info!(root = %root_tag, "building tree");
    let node = Node::root(&schema, &root_tag)?;
    node.load_from_xml(&doc, root_id)?;
    node.update_root_info(|rooted| {
        rooted.filename = filename.map(String::from);
        rooted.dtd_url = dtd.url.clone();
        rooted.dtd_str = dtd.text.clone();
        rooted.encoding = doc.encoding.clone();
    });
    Ok(node)
}

/// Rebuilds an XML file from submitted nested data and writes it back.
///
/// The reserved `_xml_encoding` and `_xml_dtd_url` keys override the
/// corresponding document settings; the rest of the data must hold exactly
/// one top-level key, the root tagname. Without an override the file's own
/// DOCTYPE supplies the DTD.
#[instrument(skip(data))]
pub fn update(filename: &str, data: &DictValue, validate_output: bool) -> Result<Node> {
    let content = read_file(filename)?;
    let doc = reader::parse(&content)?;

    let mut data = data.clone();
    let (encoding_override, dtd_url_override) = match &mut data {
        DictValue::Map(map) => (
            map.remove("_xml_encoding")
                .and_then(|v| v.as_text().map(str::to_string)),
            map.remove("_xml_dtd_url")
                .and_then(|v| v.as_text().map(str::to_string)),
        ),
        _ => (None, None),
    };

    let dtd_url = match dtd_url_override {
        Some(url) => url,
        None => doc
            .doctype
            .as_ref()
            .ok_or_else(|| Error::config(ConfigError::MissingDtd))?
            .system_url()
            .to_string(),
    };
    let mut dtd = Dtd::from_url(dtd_url);
    if let Some(base) = Path::new(filename).parent() {
        dtd = dtd.with_base_path(base);
    }
    let schema = dtd.schema()?;

    let map = data
        .as_map()
        .ok_or_else(|| Error::config(ConfigError::BadData("expected a map".to_string())))?;
    if map.len() != 1 {
        return Err(Error::config(ConfigError::BadData(
            "expected exactly one root key".to_string(),
        )));
    }
    let root_tag = map.keys().next().unwrap_or_default().to_string();

    info!(root = %root_tag, "rebuilding tree from submitted data");
    let node = Node::root(&schema, &root_tag)?;
    node.load_from_dict(&data, false)?;
    node.update_root_info(|info| {
        info.filename = Some(filename.to_string());
        info.dtd_url = dtd.url.clone();
        info.encoding = encoding_override.or_else(|| doc.encoding.clone());
    });
    node.write(&WriteOptions {
        validate: validate_output,
        ..WriteOptions::default()
    })?;
    Ok(node)
}

/// Resolves a colon-separated string id into a (possibly vivified) node of
/// a fresh tree, optionally populated from `data` first.
pub fn get_obj_from_str_id(str_id: &str, dtd: &Dtd, data: Option<&DictValue>) -> Result<Node> {
    let schema = dtd.schema()?;
    path::resolve_str_id(&schema, str_id, data)
}

/// Extracts the nested data addressed by `element_id` out of flat submitted
/// parameters, keyed by the id's last segment.
pub fn get_element_data<'a, I>(element_id: &str, params: I) -> DictValue
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut value = crate::dict::unflatten::unflatten_params(params);
    for segment in element_id.split(':') {
        value = match (&value, segment.parse::<usize>()) {
            (DictValue::Seq(seq), Ok(index)) => {
                seq.get(index).cloned().unwrap_or(DictValue::Null)
            }
            (DictValue::Map(map), _) => map.get(segment).cloned().unwrap_or(DictValue::Null),
            _ => DictValue::Null,
        };
    }
    let last = element_id.rsplit(':').next().unwrap_or(element_id);
    let mut out = crate::dict::value::DictMap::new();
    out.insert(last, value);
    DictValue::Map(out)
}

pub(crate) fn read_file(filename: &str) -> Result<String> {
    std::fs::read_to_string(filename).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::io(IoError::FileNotFound(filename.to_string())),
        std::io::ErrorKind::PermissionDenied => {
            Error::io(IoError::PermissionDenied(filename.to_string()))
        }
        _ => Error::io(IoError::ReadError(e.to_string())),
    })
}
