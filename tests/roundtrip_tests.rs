#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use dtdtree::test_utils::*;
use dtdtree::Dtd;

#[test]
fn loaded_documents_serialize_back() {
    let tree = load(MOVIE_XML, MOVIE_DTD);
    assert_eq!(tree.serialize().unwrap(), MOVIE_XML);
}

#[test]
fn doctype_is_written_when_the_dtd_has_a_url() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE note SYSTEM "note.dtd">
<note>hi</note>
"#;
    let dtd = "<!ELEMENT note (#PCDATA)>";
    let tree =
        dtdtree::load_string_with_dtd(xml, &Dtd::from_text(dtd), true).unwrap();
    // The explicit DTD has no url, so the DOCTYPE is dropped on output.
    assert!(!tree.serialize().unwrap().contains("DOCTYPE"));

    tree.update_root_info(|info| info.dtd_url = Some("note.dtd".to_string()));
    let output = tree.serialize().unwrap();
    assert!(output.contains("<!DOCTYPE note SYSTEM \"note.dtd\">"));
}

#[test]
fn bare_trees_materialize_required_children_transiently() {
    let movie = create("movie", MOVIE_DTD);
    let output = movie.serialize().unwrap();
    assert_eq!(
        output,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<movie>
  <title></title>
  <realisator>
    <name></name>
    <firstname></firstname>
  </realisator>
  <characters>
    <character></character>
  </characters>
</movie>
"#
    );
    // Nothing was attached to the tree.
    assert!(movie.get("title").is_none());
    assert!(movie.get("characters").is_none());
}

#[test]
fn comments_survive_the_round_trip() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<movie>
  <!-- the title -->
  <title>Titanic</title>
  <realisator>
    <name>Cameron</name>
    <firstname>James</firstname>
  </realisator>
  <characters>
    <character>Jack</character>
  </characters>
</movie>
"#;
    let tree = load(xml, MOVIE_DTD);
    assert_eq!(
        tree.get("title").unwrap().comment(),
        Some(" the title ".to_string())
    );
    assert_eq!(tree.serialize().unwrap(), xml);
}

#[test]
fn preceding_comment_runs_join_with_newlines() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<movie>
  <!--one-->
  <!--two-->
  <title>Titanic</title>
  <realisator><name>C</name><firstname>J</firstname></realisator>
  <characters><character>Jack</character></characters>
</movie>
"#;
    let tree = load(xml, MOVIE_DTD);
    assert_eq!(
        tree.get("title").unwrap().comment(),
        Some("one\ntwo".to_string())
    );
}

#[test]
fn comment_line_endings_are_normalized() {
    let movie = create("movie", MOVIE_DTD);
    let title = movie.add_text("title", "Titanic").unwrap();
    title.set_comment(Some("line one\r\nline two\rline three".to_string()));
    let output = movie.to_xml_string().unwrap();
    assert!(output.contains("<!--line one\nline two\nline three-->"));
    assert!(!output.contains('\r'));
}

#[test]
fn trailing_comments_attach_only_when_nothing_follows() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<movie>
  <title>Titanic</title>
  <realisator><name>C</name><firstname>J</firstname></realisator>
  <characters><character>Jack</character></characters>
  <critique>fine</critique>
  <!--tail-->
</movie>
"#;
    let tree = load(xml, MOVIE_DTD);
    let critique = tree.findall("critique")[0].clone();
    assert_eq!(critique.comment(), Some("tail".to_string()));
    // The comment before characters' close belongs to critique, not title.
    assert_eq!(tree.get("title").unwrap().comment(), None);
}

#[test]
fn id_attributes_round_trip() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<movie idmovie="m42">
  <title>Titanic</title>
  <realisator>
    <name>Cameron</name>
    <firstname>James</firstname>
  </realisator>
  <characters>
    <character idcharacter="c1">Jack</character>
  </characters>
</movie>
"#;
    let tree = load(xml, MOVIE_DTD);
    assert_eq!(tree.attribute("idmovie"), Some("m42".to_string()));
    assert_eq!(tree.serialize().unwrap(), xml);
}

#[test]
fn repeated_children_keep_order_and_source_lines() {
    let xml = "<movie><title>t</title>\
<realisator><name>n</name><firstname>f</firstname></realisator>\n\
<characters>\n\
<character>first</character>\n\
<character>second</character>\n\
</characters></movie>";
    let tree = load(xml, MOVIE_DTD);
    let wrapper = tree.get("characters").unwrap().get("character").unwrap();
    let items = wrapper.items();
    assert_eq!(items[0].text(), Some("first".to_string()));
    assert_eq!(items[1].text(), Some("second".to_string()));
    assert_eq!(items[0].sourceline(), Some(3));
    assert_eq!(items[1].sourceline(), Some(4));
}

#[test]
fn cdata_is_kept_verbatim() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<movie>
  <title>Titanic</title>
  <realisator><name>C</name><firstname>J</firstname></realisator>
  <characters><character>Jack</character></characters>
  <resume><![CDATA[line1
line2 & <raw>]]></resume>
</movie>
"#;
    let tree = load(xml, MOVIE_DTD);
    let resume = tree.get("resume").unwrap();
    assert!(resume.is_cdata());
    assert_eq!(resume.text(), Some("line1\nline2 & <raw>".to_string()));
    let output = tree.serialize().unwrap();
    assert!(output.contains("<resume><![CDATA[line1\nline2 & <raw>]]></resume>"));
}

#[test]
fn line_endings_are_normalized_outside_cdata() {
    let movie = create("movie", MOVIE_DTD);
    let characters = movie.add("characters").unwrap();
    characters
        .add_text("character", "one\r\ntwo\rthree")
        .unwrap();
    let output = movie.to_xml_string().unwrap();
    assert!(output.contains("<character>one\ntwo\nthree</character>"));
}

#[test]
fn empty_leaves_self_close() {
    let contact = create("contact", CONTACT_DTD);
    contact.add_text("fullname", "Ada").unwrap();
    contact.add_text("address", "Broadway").unwrap();
    contact.add("separator").unwrap();
    let output = contact.to_xml_string().unwrap();
    assert_eq!(
        output,
        "<contact>\n  <fullname>Ada</fullname>\n  <address>Broadway</address>\n  <separator/>\n</contact>\n"
    );
}

#[test]
fn special_characters_are_escaped() {
    let movie = create("movie", MOVIE_DTD);
    movie.add_attribute("idmovie", "a\"b&c").unwrap();
    let characters = movie.add("characters").unwrap();
    characters.add_text("character", "Tom & <Jerry>").unwrap();
    let output = movie.to_xml_string().unwrap();
    assert!(output.contains("<movie idmovie=\"a&quot;b&amp;c\">"));
    assert!(output.contains("<character>Tom &amp; &lt;Jerry&gt;</character>"));
}

#[test]
fn escaped_text_round_trips_through_the_reader() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<movie>
  <title>Tom &amp; &lt;Jerry&gt; &#33;</title>
  <realisator><name>C</name><firstname>J</firstname></realisator>
  <characters><character>Jack</character></characters>
</movie>
"#;
    let tree = load(xml, MOVIE_DTD);
    assert_eq!(
        tree.get("title").unwrap().text(),
        Some("Tom & <Jerry> !".to_string())
    );
}

#[test]
fn xpath_maps_back_to_tree_nodes() {
    let tree = load(MOVIE_XML, MOVIE_DTD);

    let characters = tree.xpath("//character").unwrap();
    assert_eq!(characters.len(), 2);
    assert_eq!(characters[0].text(), Some("Jack Dawson".to_string()));

    let titles = tree.xpath("/movie/title").unwrap();
    assert_eq!(titles.len(), 1);
    assert_eq!(titles[0].text(), Some("Titanic".to_string()));

    let second = tree.xpath("//character[2]").unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].text(), Some("Rose DeWitt".to_string()));
}

#[test]
fn xpath_needs_an_xml_backed_tree() {
    let movie = create("movie", MOVIE_DTD);
    let err = movie.xpath("//character").unwrap_err();
    assert!(err.to_string().contains("loaded from XML"));
}

#[test]
fn write_creates_the_file_and_validates() {
    use dtdtree::WriteOptions;

    let movie = create("movie", MOVIE_DTD);
    movie.add_text("title", "Titanic").unwrap();
    movie.add("realisator").unwrap();
    let realisator = movie.get("realisator").unwrap();
    realisator.add_text("name", "Cameron").unwrap();
    realisator.add_text("firstname", "James").unwrap();
    let characters = movie.add("characters").unwrap();
    characters.add_text("character", "Jack").unwrap();

    let path = tmp_file_path("write-validate.xml");
    movie
        .write(&WriteOptions {
            filename: Some(path.to_string_lossy().into_owned()),
            dtd_str: Some(MOVIE_DTD.to_string()),
            validate: true,
            ..WriteOptions::default()
        })
        .unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(written.contains("<title>Titanic</title>"));
    std::fs::remove_file(&path).ok();
}

#[test]
fn write_requires_a_filename_and_a_dtd() {
    use dtdtree::WriteOptions;

    let movie = create("movie", MOVIE_DTD);
    let err = movie.write(&WriteOptions::default()).unwrap_err();
    assert!(err.to_string().contains("No filename given"));

    let tree = dtdtree::load_string_with_dtd(
        "<movie><title>t</title><realisator><name>n</name><firstname>f</firstname></realisator><characters><character>c</character></characters></movie>",
        &Dtd::from_text(MOVIE_DTD),
        true,
    )
    .unwrap();
    // load_string_with_dtd records the dtd text, so only the filename is
    // missing here.
    let err = tree.write(&WriteOptions::default()).unwrap_err();
    assert!(err.to_string().contains("No filename given"));
}
