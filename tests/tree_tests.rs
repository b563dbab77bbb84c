#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use dtdtree::dtd::NodeKind;
use dtdtree::error::ErrorKind;
use dtdtree::test_utils::*;

#[test]
fn add_and_get_plain_children() {
    let movie = create("movie", MOVIE_DTD);
    let title = movie.add("title").unwrap();
    assert_eq!(title.tagname(), "title");
    assert!(title.is_leaf());
    assert!(movie.get("title").unwrap().ptr_eq(&title));
    assert!(movie.get("resume").is_none());
}

#[test]
fn adding_a_plain_child_twice_fails() {
    let movie = create("movie", MOVIE_DTD);
    movie.add("title").unwrap();
    let err = movie.add("title").unwrap_err();
    assert_eq!(err.to_string(), "Error: title is already defined");
}

#[test]
fn adding_an_unknown_child_fails() {
    let movie = create("movie", MOVIE_DTD);
    let err = movie.add("director").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Tree(_)));
    assert!(err.to_string().contains("Invalid child director"));
}

#[test]
fn list_items_append_and_insert() {
    let movie = create("movie", MOVIE_DTD);
    let characters = movie.add("characters").unwrap();
    let jack = characters.add_text("character", "Jack").unwrap();
    let rose = characters.add_text("character", "Rose").unwrap();
    let cal = characters.add_at("character", 1).unwrap();
    cal.set_text("Cal").unwrap();

    let wrapper = characters.get("character").unwrap();
    assert!(wrapper.is_list());
    assert_eq!(wrapper.kind(), NodeKind::List);
    assert_eq!(wrapper.tagname(), "list__character");

    let texts: Vec<String> = wrapper
        .items()
        .iter()
        .filter_map(|item| item.text())
        .collect();
    assert_eq!(texts, vec!["Jack", "Cal", "Rose"]);
    assert_eq!(jack.position(), Some(0));
    assert_eq!(cal.position(), Some(1));
    assert_eq!(rose.position(), Some(2));
}

#[test]
fn list_wrapper_is_addressable_by_synthetic_name() {
    let movie = create("movie", MOVIE_DTD);
    let characters = movie.add("characters").unwrap();
    let wrapper = characters.add("list__character").unwrap();
    assert!(wrapper.is_wrapper());
    // Adding through the wrapper delegates to the parent element.
    let item = wrapper.add("character").unwrap();
    assert_eq!(item.position(), Some(0));
}

#[test]
fn choice_alternatives_are_exclusive() {
    let contact = create("contact", CONTACT_DTD);
    let address = contact.add_text("address", "Broadway").unwrap();

    let err = contact.add("phone").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Error: address is defined so you can't add phone"
    );

    // Re-adding the chosen alternative hands back the same node.
    let again = contact.add("address").unwrap();
    assert!(again.ptr_eq(&address));

    assert!(contact.is_addable("address"));
    assert!(!contact.is_addable("phone"));
}

#[test]
fn deleting_the_chosen_alternative_removes_the_choice() {
    let contact = create("contact", CONTACT_DTD);
    let address = contact.add("address").unwrap();
    address.delete().unwrap();

    assert!(contact.get("address").is_none());
    assert!(contact.get("choice__address_phone").is_none());
    // The deleted alternative is fully detached, like a deleted list item.
    assert!(address.parent().is_none());
    // Both alternatives become addable again.
    assert!(contact.is_addable("phone"));
    let phone = contact.add("phone").unwrap();
    assert_eq!(phone.tagname(), "phone");
}

#[test]
fn repeatable_choices_accept_mixed_alternatives() {
    let contact = create("contact", CONTACT_DTD);
    contact.add_text("email", "a@b.c").unwrap();
    contact.add_text("fax", "123").unwrap();
    contact.add_text("email", "d@e.f").unwrap();

    let wrapper = contact.get("list__email_fax").unwrap();
    let tags: Vec<String> = wrapper.items().iter().map(|item| item.tagname()).collect();
    assert_eq!(tags, vec!["email", "fax", "email"]);
}

#[test]
fn deleting_a_list_item_shifts_positions() {
    let movie = create("movie", MOVIE_DTD);
    let characters = movie.add("characters").unwrap();
    characters.add_text("character", "Jack").unwrap();
    let rose = characters.add_text("character", "Rose").unwrap();
    let cal = characters.add_text("character", "Cal").unwrap();

    rose.delete().unwrap();
    assert_eq!(cal.position(), Some(1));
    assert!(rose.parent().is_none());
}

#[test]
fn the_root_cannot_be_deleted() {
    let movie = create("movie", MOVIE_DTD);
    let err = movie.delete().unwrap_err();
    assert!(err.to_string().contains("Can't delete the root element"));
}

#[test]
fn deleting_a_plain_child_frees_its_slot() {
    let movie = create("movie", MOVIE_DTD);
    let title = movie.add("title").unwrap();
    assert!(!movie.is_addable("title"));
    title.delete().unwrap();
    assert!(movie.is_addable("title"));
    assert!(movie.get("title").is_none());
}

#[test]
fn text_values_are_leaf_only() {
    let movie = create("movie", MOVIE_DTD);
    let err = movie.set_text("oops").unwrap_err();
    assert!(err
        .to_string()
        .contains("Can't set value to non text element movie"));

    let characters = movie.add("characters").unwrap();
    let err = characters.add_text("list__character", "oops").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Tree(_)));
}

#[test]
fn empty_leaves_refuse_values() {
    let contact = create("contact", CONTACT_DTD);
    let separator = contact.add("separator").unwrap();
    assert!(separator.is_empty_leaf());
    separator.set_text("").unwrap();
    let err = separator.set_text("x").unwrap_err();
    assert!(err
        .to_string()
        .contains("forbidden to have a value to an EMPTY tag separator"));
}

#[test]
fn attributes_must_be_declared() {
    let movie = create("movie", MOVIE_DTD);
    movie.add_attribute("idmovie", "m1").unwrap();
    assert_eq!(movie.attribute("idmovie"), Some("m1".to_string()));
    movie.add_attribute("idmovie", "m2").unwrap();
    assert_eq!(movie.attribute("idmovie"), Some("m2".to_string()));

    let err = movie.add_attribute("director", "x").unwrap_err();
    assert!(err
        .to_string()
        .contains("Invalid attribute name director for movie"));
}

#[test]
fn get_or_add_pads_lists_with_placeholders() {
    let movie = create("movie", MOVIE_DTD);
    let characters = movie.add("characters").unwrap();
    let wrapper = characters.add("list__character").unwrap();

    let err = wrapper.get_or_add("character", None).unwrap_err();
    assert!(err.to_string().contains("index is required"));

    let third = wrapper.get_or_add("character", Some(2)).unwrap();
    assert_eq!(third.position(), Some(2));
    assert_eq!(wrapper.entry_count(), 3);
    assert_eq!(wrapper.items().len(), 1);

    // A placeholder index is replaced by a real item.
    let first = wrapper.get_or_add("character", Some(0)).unwrap();
    assert_eq!(first.position(), Some(0));
    assert_eq!(wrapper.entry_count(), 3);
    assert_eq!(wrapper.items().len(), 2);

    // An occupied index hands back the existing item.
    let again = wrapper.get_or_add("character", Some(2)).unwrap();
    assert!(again.ptr_eq(&third));
}

#[test]
fn walk_flattens_wrappers() {
    let tree = load(MOVIE_XML, MOVIE_DTD);
    let tags: Vec<String> = tree.walk().iter().map(|node| node.tagname()).collect();
    assert_eq!(
        tags,
        vec![
            "title",
            "realisator",
            "name",
            "firstname",
            "characters",
            "character",
            "character"
        ]
    );
    assert_eq!(tree.findall("character").len(), 2);
}

#[test]
fn string_ids_round_trip() {
    let tree = load(MOVIE_XML, MOVIE_DTD);
    let characters = tree.get("characters").unwrap();
    let second = characters.get("character").unwrap().items()[1].clone();
    assert_eq!(
        second.str_id(),
        "movie:characters:list__character:1:character"
    );
    assert_eq!(tree.get("title").unwrap().str_id(), "movie:title");
}
