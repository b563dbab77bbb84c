//! Error handling types for the crate
//!
//! This module provides custom error types that give detailed information
//! about grammar, tree and document failures, including source line
//! information where available.

use std::{error::Error as StdError, fmt};

/// Main error type for all operations
#[derive(Debug)]
pub struct Error {
    /// The specific kind of error
    kind: ErrorKind,
    /// Location where the error occurred
    location: Option<Location>,
    /// Source error that caused this error
    source: Option<Box<dyn StdError>>,
    /// Additional context for the error
    context: Option<String>,
}

/// Represents a location in the input text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Top-level error categories
#[derive(Debug, Clone)]
pub enum ErrorKind {
    Io(IoError),
    Grammar(GrammarError),
    GrammarValidation(GrammarValidationError),
    Syntax(SyntaxError),
    Tree(TreeError),
    Document(DocumentError),
    Config(ConfigError),
}

/// DTD grammar parsing errors
#[derive(Debug, Clone)]
pub enum GrammarError {
    /// Declaration word other than ELEMENT, ATTLIST or ENTITY
    UnsupportedDeclaration(String),
    /// Unparsable ELEMENT declaration body
    MalformedElement(String),
    /// Unparsable ENTITY declaration body
    MalformedEntity(String),
    /// ATTLIST token count is not a multiple of 3 after the element name
    MalformedAttlist(String),
    /// Content model with unbalanced parentheses
    UnbalancedParens(String),
    /// Requested root tag is not declared by the grammar
    UnknownElement(String),
}

/// Structural DTD problems found while validating a grammar
#[derive(Debug, Clone)]
pub enum GrammarValidationError {
    /// Two ID-typed attributes declared on one element
    DuplicateIdAttribute { element: String, attribute: String },
    /// A content model references an element that is never declared
    UndeclaredChild { element: String, child: String },
}

/// XML document syntax errors
#[derive(Debug, Clone)]
pub enum SyntaxError {
    /// Reached end of input unexpectedly
    UnexpectedEof,
    /// Found an unexpected character in the input
    UnexpectedCharacter(char),
    /// Comment without a closing `-->`
    UnterminatedComment,
    /// CDATA section without a closing `]]>`
    UnterminatedCData,
    /// Attribute value without a closing quote
    UnterminatedString,
    /// Closing tag does not match the open element
    MismatchedClosingTag { expected: String, found: String },
    /// Invalid element or attribute name
    InvalidName(String),
    /// Malformed XML or DOCTYPE declaration
    BadDeclaration(String),
}

/// Tree mutation errors
#[derive(Debug, Clone)]
pub enum TreeError {
    /// The tagname is not addressable from this node
    InvalidChild(String),
    /// Re-adding a non-repeatable child, or a conflicting choice alternative
    AlreadyDefined { existing: String, requested: String },
    /// A text value was supplied to a non-leaf node
    NotATextElement(String),
    /// Text assigned to an EMPTY-typed leaf
    ForbiddenValue(String),
    /// The document root cannot be deleted
    CannotDeleteRoot,
    /// Operation requires an XML-backed tree
    UnsupportedOperation(String),
    /// Attribute name not declared for this element
    InvalidAttribute { element: String, attribute: String },
    /// get_or_add on a list requires an index
    MissingIndex(String),
    /// A str_id path segment could not be resolved
    BadPath(String),
}

/// Document-against-DTD validation errors
#[derive(Debug, Clone)]
pub enum DocumentError {
    /// Element not declared by the grammar
    UndeclaredElement(String),
    /// Attribute not declared for its element
    UndeclaredAttribute { element: String, attribute: String },
    /// A #REQUIRED attribute is missing
    MissingAttribute { element: String, attribute: String },
    /// Child sequence does not match the content model
    Invalid {
        element: String,
        expected: String,
        found: String,
    },
    /// Text content inside an element-only container
    UnexpectedText(String),
}

/// Configuration errors for write/update operations
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// No filename given and none recorded on the root
    MissingFilename,
    /// No DTD url or DTD text available
    MissingDtd,
    /// Submitted data does not contain exactly one root key
    BadData(String),
}

/// IO operation errors
#[derive(Debug, Clone)]
pub enum IoError {
    /// File not found
    FileNotFound(String),
    /// Permission denied
    PermissionDenied(String),
    /// Error reading from a file
    ReadError(String),
    /// Error writing to a file
    WriteError(String),
    /// HTTP fetch failure
    HttpError(String),
    /// HTTP fetch timed out
    Timeout(String),
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            location: None,
            source: None,
            context: None,
        }
    }

    pub fn grammar(err: GrammarError) -> Self {
        Self::new(ErrorKind::Grammar(err))
    }

    pub fn grammar_validation(err: GrammarValidationError) -> Self {
        Self::new(ErrorKind::GrammarValidation(err))
    }

    pub fn syntax(err: SyntaxError) -> Self {
        Self::new(ErrorKind::Syntax(err))
    }

    pub fn tree(err: TreeError) -> Self {
        Self::new(ErrorKind::Tree(err))
    }

    pub fn document(err: DocumentError) -> Self {
        Self::new(ErrorKind::Document(err))
    }

    pub fn config(err: ConfigError) -> Self {
        Self::new(ErrorKind::Config(err))
    }

    pub fn io(err: IoError) -> Self {
        Self::new(ErrorKind::Io(err))
    }

    pub fn with_location(mut self, line: usize, column: usize) -> Self {
        self.location = Some(Location { line, column });
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.location = Some(Location { line, column: 1 });
        self
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base_error = match &self.kind {
            ErrorKind::Io(err) => err.to_string(),
            ErrorKind::Grammar(err) => err.to_string(),
            ErrorKind::GrammarValidation(err) => err.to_string(),
            ErrorKind::Syntax(err) => err.to_string(),
            ErrorKind::Tree(err) => err.to_string(),
            ErrorKind::Document(err) => err.to_string(),
            ErrorKind::Config(err) => err.to_string(),
        };

        if let Some(loc) = &self.location {
            write!(
                f,
                "at line {}, column {}: {}",
                loc.line, loc.column, base_error
            )?;
        } else {
            write!(f, "Error: {}", base_error)?;
        }

        if let Some(ctx) = &self.context {
            write!(f, "\nContext: {}", ctx)?;
        }

        if let Some(source) = &self.source {
            write!(f, "\nCaused by: {}", source)?;
        }

        Ok(())
    }
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedDeclaration(word) => write!(f, "{} is not supported", word),
            Self::MalformedElement(v) => write!(f, "Error parsing element {}", v),
            Self::MalformedEntity(v) => write!(f, "Error parsing entity {}", v),
            Self::MalformedAttlist(v) => write!(f, "Error parsing attribute list {}", v),
            Self::UnbalancedParens(v) => write!(f, "Unbalanced parenthesis {}", v),
            Self::UnknownElement(tag) => {
                write!(f, "Bad root tag {}, it's not supported by the dtd", tag)
            }
        }
    }
}

impl fmt::Display for GrammarValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateIdAttribute { element, attribute } => write!(
                f,
                "Element {} has more than one ID attribute: {}",
                element, attribute
            ),
            Self::UndeclaredChild { element, child } => write!(
                f,
                "Element {} references undeclared element {}",
                element, child
            ),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "Unexpected end of file"),
            Self::UnexpectedCharacter(c) => write!(f, "Unexpected character '{}'", c),
            Self::UnterminatedComment => write!(f, "Unterminated comment"),
            Self::UnterminatedCData => write!(f, "Unterminated CDATA section"),
            Self::UnterminatedString => write!(f, "Unterminated attribute value"),
            Self::MismatchedClosingTag { expected, found } => write!(
                f,
                "Expected closing tag </{}>, found </{}>",
                expected, found
            ),
            Self::InvalidName(name) => write!(f, "Invalid name: '{}'", name),
            Self::BadDeclaration(decl) => write!(f, "Malformed declaration: {}", decl),
        }
    }
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChild(tag) => write!(f, "Invalid child {}", tag),
            Self::AlreadyDefined { existing, requested } => {
                if existing == requested {
                    write!(f, "{} is already defined", existing)
                } else {
                    write!(f, "{} is defined so you can't add {}", existing, requested)
                }
            }
            Self::NotATextElement(tag) => {
                write!(f, "Can't set value to non text element {}", tag)
            }
            Self::ForbiddenValue(tag) => {
                write!(f, "It's forbidden to have a value to an EMPTY tag {}", tag)
            }
            Self::CannotDeleteRoot => write!(f, "Can't delete the root element"),
            Self::UnsupportedOperation(msg) => write!(f, "Unsupported operation: {}", msg),
            Self::InvalidAttribute { element, attribute } => {
                write!(f, "Invalid attribute name {} for {}", attribute, element)
            }
            Self::MissingIndex(tag) => {
                write!(f, "Parameter index is required to access {}", tag)
            }
            Self::BadPath(path) => write!(f, "Unresolvable path segment {}", path),
        }
    }
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UndeclaredElement(tag) => {
                write!(f, "No declaration for element {}", tag)
            }
            Self::UndeclaredAttribute { element, attribute } => write!(
                f,
                "No declaration for attribute {} of element {}",
                attribute, element
            ),
            Self::MissingAttribute { element, attribute } => write!(
                f,
                "Element {} is missing required attribute {}",
                element, attribute
            ),
            Self::Invalid {
                element,
                expected,
                found,
            } => write!(
                f,
                "Element {} content does not follow the DTD, expecting ({}), got ({})",
                element, expected, found
            ),
            Self::UnexpectedText(tag) => {
                write!(f, "Element {} must not contain text", tag)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFilename => write!(f, "No filename given"),
            Self::MissingDtd => write!(f, "No dtd given"),
            Self::BadData(msg) => write!(f, "Bad data: {}", msg),
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileNotFound(path) => write!(f, "File not found: {}", path),
            Self::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            Self::ReadError(msg) => write!(f, "Read error: {}", msg),
            Self::WriteError(msg) => write!(f, "Write error: {}", msg),
            Self::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            Self::Timeout(url) => write!(f, "Timed out fetching {}", url),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(Box::as_ref)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
