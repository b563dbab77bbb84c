//! Test grammars and documents.

/// A small movie catalog grammar exercising entities, attributes, required
/// and repeatable children.
pub const MOVIE_DTD: &str = r#"
<!ENTITY % person "name, firstname">
<!ELEMENT movie (title, realisator, characters, resume?, critique*)>
<!ELEMENT title (#PCDATA)>
<!ELEMENT realisator (%person;)>
<!ELEMENT name (#PCDATA)>
<!ELEMENT firstname (#PCDATA)>
<!ELEMENT characters (character+)>
<!ELEMENT character (#PCDATA)>
<!ELEMENT resume (#PCDATA)>
<!ELEMENT critique (#PCDATA)>
<!ATTLIST movie idmovie ID #IMPLIED>
<!ATTLIST character idcharacter ID #IMPLIED>
"#;

pub const MOVIE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<movie>
  <title>Titanic</title>
  <realisator>
    <name>Cameron</name>
    <firstname>James</firstname>
  </realisator>
  <characters>
    <character>Jack Dawson</character>
    <character>Rose DeWitt</character>
  </characters>
</movie>
"#;

/// A grammar with a choice, a repeatable choice and an EMPTY leaf.
pub const CONTACT_DTD: &str = r#"
<!ELEMENT contact (fullname, (address|phone), (email|fax)*, separator?)>
<!ELEMENT fullname (#PCDATA)>
<!ELEMENT address (#PCDATA)>
<!ELEMENT phone (#PCDATA)>
<!ELEMENT email (#PCDATA)>
<!ELEMENT fax (#PCDATA)>
<!ELEMENT separator EMPTY>
"#;

/// Mixed-content grammar: `text` stays a leaf and its siblings become
/// optional trailing children.
pub const MIXED_DTD: &str = r#"
<!ELEMENT note (text)>
<!ELEMENT text (#PCDATA|bold|italic)*>
<!ELEMENT bold (#PCDATA)>
<!ELEMENT italic (#PCDATA)>
"#;

/// A self-referencing grammar; compilation must terminate.
pub const RECURSIVE_DTD: &str = r#"
<!ELEMENT section (title, section*)>
<!ELEMENT title (#PCDATA)>
"#;
