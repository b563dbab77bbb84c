#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use dtdtree::test_utils::*;
use dtdtree::validate::validate_document;
use dtdtree::xml::reader;
use dtdtree::Dtd;

fn check(xml: &str, dtd: &str) -> dtdtree::Result<()> {
    let doc = reader::parse(xml).unwrap();
    let schema = compile_schema(dtd);
    validate_document(&doc, &schema)
}

#[test]
fn valid_documents_pass() {
    check(MOVIE_XML, MOVIE_DTD).unwrap();
}

#[test]
fn undeclared_root_elements_are_rejected() {
    let xml = "<director>C</director>";
    let err = check(xml, MOVIE_DTD).unwrap_err();
    assert!(err.to_string().contains("No declaration for element director"));
}

#[test]
fn misordered_children_are_rejected() {
    let xml = "<movie>\
<realisator><name>C</name><firstname>J</firstname></realisator>\
<title>t</title>\
<characters><character>c</character></characters>\
</movie>";
    let err = check(xml, MOVIE_DTD).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("does not follow the DTD"));
    assert!(message.contains("title,realisator,characters,resume?,critique*"));
}

#[test]
fn loading_rejects_invalid_documents_by_default() {
    let xml = "<movie>\n\
<realisator><name>C</name><firstname>J</firstname></realisator>\n\
<title>t</title>\n\
<characters><character>c</character></characters>\n\
</movie>";
    let dtd = Dtd::from_text(MOVIE_DTD);

    let err = dtdtree::load_string_with_dtd(xml, &dtd, true).unwrap_err();
    assert!(err.to_string().contains("does not follow the DTD"));
    assert!(err.location().is_some());

    // Opting out loads the document; output is normalized to schema order.
    let tree = dtdtree::load_string_with_dtd(xml, &dtd, false).unwrap();
    let output = tree.to_xml_string().unwrap();
    let title = output.find("<title>").unwrap();
    let realisator = output.find("<realisator>").unwrap();
    assert!(title < realisator);
}

#[test]
fn missing_required_children_are_rejected() {
    let xml = "<movie><title>t</title></movie>";
    let err = check(xml, MOVIE_DTD).unwrap_err();
    assert!(err.to_string().contains("Element movie"));
}

#[test]
fn required_lists_need_at_least_one_item() {
    let xml = "<movie>\
<title>t</title>\
<realisator><name>C</name><firstname>J</firstname></realisator>\
<characters></characters>\
</movie>";
    let err = check(xml, MOVIE_DTD).unwrap_err();
    assert!(err.to_string().contains("Element characters"));
}

#[test]
fn errors_carry_the_source_line() {
    let xml = "<movie>\n  <title>t</title>\n  <unknown/>\n</movie>";
    let err = check(xml, MOVIE_DTD).unwrap_err();
    // The content model check fires on the movie element at line 1.
    assert!(err.location().is_some());
}

#[test]
fn undeclared_attributes_are_rejected() {
    let xml = "<movie director=\"C\">\
<title>t</title>\
<realisator><name>C</name><firstname>J</firstname></realisator>\
<characters><character>c</character></characters>\
</movie>";
    let err = check(xml, MOVIE_DTD).unwrap_err();
    assert!(err
        .to_string()
        .contains("No declaration for attribute director"));
}

#[test]
fn required_attributes_must_be_present() {
    let dtd = r#"
<!ELEMENT movie (#PCDATA)>
<!ATTLIST movie lang CDATA #REQUIRED>
"#;
    let err = check("<movie>t</movie>", dtd).unwrap_err();
    assert!(err
        .to_string()
        .contains("missing required attribute lang"));
    check("<movie lang=\"en\">t</movie>", dtd).unwrap();
}

#[test]
fn text_inside_containers_is_rejected() {
    let xml = "<movie>stray\
<title>t</title>\
<realisator><name>C</name><firstname>J</firstname></realisator>\
<characters><character>c</character></characters>\
</movie>";
    let err = check(xml, MOVIE_DTD).unwrap_err();
    assert!(err.to_string().contains("must not contain text"));
}

#[test]
fn choices_accept_exactly_one_alternative() {
    let ok = "<contact><fullname>Ada</fullname><phone>555</phone></contact>";
    check(ok, CONTACT_DTD).unwrap();

    let both = "<contact><fullname>Ada</fullname><address>B</address><phone>555</phone></contact>";
    let err = check(both, CONTACT_DTD).unwrap_err();
    assert!(err.to_string().contains("Element contact"));
}
