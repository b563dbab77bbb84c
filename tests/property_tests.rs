#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use proptest::{collection::vec, prelude::*};

use dtdtree::dtd::grammar;
use dtdtree::test_utils::*;
use dtdtree::unflatten_params;

// Strategy for generating valid element names
fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}"
}

// Strategy for plain leaf text without markup characters
fn text_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!&<>'\"]{0,40}"
}

proptest! {
    #[test]
    fn generated_grammars_parse(names in vec(name_strategy(), 1..8)) {
        let mut dtd = String::new();
        let children = names
            .iter()
            .map(|name| format!("{}*", name))
            .collect::<Vec<_>>()
            .join(",");
        dtd.push_str(&format!("<!ELEMENT root ({})>\n", children));
        for name in &names {
            dtd.push_str(&format!("<!ELEMENT {} (#PCDATA)>\n", name));
        }

        let decls = grammar::parse(&dtd).unwrap();
        prop_assert!(decls.content_model("root").is_some());
        for name in &names {
            prop_assert_eq!(decls.content_model(name), Some("#PCDATA"));
        }
    }

    #[test]
    fn leaf_text_survives_serialization(text in text_strategy()) {
        let movie = create("movie", MOVIE_DTD);
        let characters = movie.add("characters").unwrap();
        characters.add_text("character", &text).unwrap();

        let output = movie.serialize().unwrap();
        let reloaded = load(&output, MOVIE_DTD);
        let wrapper = reloaded.get("characters").unwrap().get("character").unwrap();
        prop_assert_eq!(wrapper.items()[0].text(), Some(text));
    }

    #[test]
    fn unflatten_preserves_every_key(
        entries in vec((name_strategy(), "[a-zA-Z0-9 ]{0,20}"), 1..10)
    ) {
        // Indexed keys so generated names cannot collide.
        let params: Vec<(String, String)> = entries
            .iter()
            .enumerate()
            .map(|(i, (name, value))| (format!("root:{}_{}", name, i), value.clone()))
            .collect();
        let data = unflatten_params(
            params.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        );
        let root = data.as_map().unwrap().get("root").unwrap().as_map().unwrap();
        for (i, (name, value)) in entries.iter().enumerate() {
            let key = format!("{}_{}", name, i);
            prop_assert_eq!(
                root.get(&key).unwrap().as_text(),
                Some(value.trim())
            );
        }
    }

    #[test]
    fn eol_normalization_is_idempotent(text in "[a-z\r\n ]{0,60}") {
        use dtdtree::xml::writer::update_eol;

        let once = update_eol(&text);
        prop_assert!(!once.contains('\r'));
        prop_assert_eq!(update_eol(&once), once.clone());
    }

    #[test]
    fn list_indices_stay_consistent(count in 1usize..12) {
        let movie = create("movie", MOVIE_DTD);
        let characters = movie.add("characters").unwrap();
        for i in 0..count {
            characters.add_text("character", &format!("c{}", i)).unwrap();
        }
        let wrapper = characters.get("character").unwrap();
        prop_assert_eq!(wrapper.items().len(), count);
        for (i, item) in wrapper.items().iter().enumerate() {
            prop_assert_eq!(item.position(), Some(i));
        }
    }
}
