#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use dtdtree::test_utils::*;
use dtdtree::{get_element_data, unflatten_params, DictValue};

#[test]
fn flat_params_populate_a_tree() {
    let data = unflatten_params([
        ("movie:title:_value", "Titanic"),
        ("movie:characters:character:0:_value", "Jack"),
        ("movie:characters:character:2:_value", "Rose"),
    ]);

    let movie = create("movie", MOVIE_DTD);
    movie.load_from_dict(&data, false).unwrap();

    assert_eq!(
        movie.get("title").unwrap().text(),
        Some("Titanic".to_string())
    );
    let wrapper = movie.get("characters").unwrap().get("character").unwrap();
    // The gap at index 1 stays a placeholder.
    assert_eq!(wrapper.entry_count(), 3);
    assert_eq!(wrapper.items().len(), 2);
    assert_eq!(
        wrapper.entry_at(2).unwrap().text(),
        Some("Rose".to_string())
    );
    assert!(wrapper.entry_at(1).is_none());
}

#[test]
fn metadata_keys_set_attributes_and_comments() {
    let data = unflatten_params([
        ("movie:_attrs:idmovie", "m1"),
        ("movie:title:_value", "Titanic"),
        ("movie:title:_comment", "the title"),
    ]);

    let movie = create("movie", MOVIE_DTD);
    movie.load_from_dict(&data, false).unwrap();
    assert_eq!(movie.attribute("idmovie"), Some("m1".to_string()));
    assert_eq!(
        movie.get("title").unwrap().comment(),
        Some("the title".to_string())
    );
}

#[test]
fn skip_extra_drops_metadata() {
    let data = unflatten_params([
        ("movie:_attrs:idmovie", "m1"),
        ("movie:title:_value", "Titanic"),
        ("movie:title:_comment", "the title"),
    ]);

    let movie = create("movie", MOVIE_DTD);
    movie.load_from_dict(&data, true).unwrap();
    assert_eq!(movie.attribute("idmovie"), None);
    let title = movie.get("title").unwrap();
    assert_eq!(title.comment(), None);
    assert_eq!(title.text(), Some("Titanic".to_string()));
}

#[test]
fn choice_data_names_its_alternative() {
    let data = unflatten_params([
        ("contact:fullname:_value", "Ada"),
        ("contact:phone:_value", "555"),
    ]);

    let contact = create("contact", CONTACT_DTD);
    contact.load_from_dict(&data, false).unwrap();
    let phone = contact.get("phone").unwrap();
    assert_eq!(phone.text(), Some("555".to_string()));
    assert!(!contact.is_addable("address"));
}

#[test]
fn repeatable_choice_entries_name_their_alternatives() {
    let data = unflatten_params([
        ("contact:fullname:_value", "Ada"),
        ("contact:address:_value", "Broadway"),
        ("contact:list__email_fax:0:email:_value", "a@b.c"),
        ("contact:list__email_fax:1:fax:_value", "123"),
    ]);

    let contact = create("contact", CONTACT_DTD);
    contact.load_from_dict(&data, false).unwrap();
    let wrapper = contact.get("list__email_fax").unwrap();
    let tags: Vec<String> = wrapper.items().iter().map(|item| item.tagname()).collect();
    assert_eq!(tags, vec!["email", "fax"]);
}

#[test]
fn absent_and_null_values_are_no_ops() {
    let movie = create("movie", MOVIE_DTD);
    movie.load_from_dict(&DictValue::Null, false).unwrap();
    let data = unflatten_params([("other_root:title:_value", "x")]);
    movie.load_from_dict(&data, false).unwrap();
    assert!(movie.get("title").is_none());
}

#[test]
fn cdata_flag_survives_the_dict_bridge() {
    let data = unflatten_params([
        ("movie:resume:_value", "raw <stuff>"),
        ("movie:resume:_cdata", "true"),
    ]);
    let movie = create("movie", MOVIE_DTD);
    movie.load_from_dict(&data, false).unwrap();
    let resume = movie.get("resume").unwrap();
    assert!(resume.is_cdata());
    let output = movie.to_xml_string().unwrap();
    assert!(output.contains("<resume><![CDATA[raw <stuff>]]></resume>"));
}

#[test]
fn element_data_is_extracted_by_id() {
    let params = [
        ("movie:title:_value", "Titanic"),
        ("movie:characters:character:0:_value", "Jack"),
    ];
    let extracted = get_element_data("movie:title", params);
    let map = extracted.as_map().unwrap();
    let title = map.get("title").unwrap().as_map().unwrap();
    assert_eq!(title.get("_value").unwrap().as_text(), Some("Titanic"));

    let extracted = get_element_data("movie:characters:character:0", params);
    let map = extracted.as_map().unwrap();
    let entry = map.get("0").unwrap().as_map().unwrap();
    assert_eq!(entry.get("_value").unwrap().as_text(), Some("Jack"));
}
