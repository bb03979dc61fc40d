use miette::Diagnostic as _;
use std::fmt::{self, Display};
use std::panic::Location;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The top-level error returned by the convenience entry points.
#[derive(Error, Debug, miette::Diagnostic)]
pub enum DesignError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Design(#[from] Diagnostics),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while loading an [`EvalConfig`](crate::config::EvalConfig).
#[derive(Error, Debug, miette::Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}")]
    #[diagnostic(code(config::io), help("Check that the file exists and is readable."))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON configuration: {0}")]
    #[diagnostic(code(config::json))]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML configuration: {0}")]
    #[diagnostic(code(config::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported config format {extension:?}")]
    #[diagnostic(
        code(config::unsupported_format),
        help("Use a file ending in .json, .yaml or .yml.")
    )]
    UnsupportedFormat { extension: String },
}

/// Everything that can go wrong while a design is evaluated, finalized or validated.
///
/// None of these abort evaluation: they are recorded as [`Diagnostic`]s and
/// reported together once the run completes.
#[derive(Error, Debug, miette::Diagnostic, Clone, PartialEq)]
pub enum DslError {
    #[error("{kind} {name:?} is defined twice")]
    #[diagnostic(
        code(design::defined_twice),
        help("Each name may only be defined once; the second definition was ignored.")
    )]
    DefinedTwice { kind: String, name: String },

    #[error("invalid use of {dsl}")]
    #[diagnostic(
        code(design::incompatible_use),
        help("This builder is not supported in the current definition context.")
    )]
    IncompatibleUse { dsl: String },

    #[error("cannot use {actual} as {expected} in call to {dsl}")]
    #[diagnostic(code(design::invalid_argument))]
    InvalidArgument {
        dsl: String,
        expected: String,
        actual: String,
    },

    #[error("too many arguments in call to {dsl}")]
    #[diagnostic(code(design::too_many_arguments))]
    TooManyArguments { dsl: String },

    #[error("invalid {dsl} validation: attribute must be {expected} (but type is {actual})")]
    #[diagnostic(
        code(design::incompatible_validation),
        help("The validation rule does not apply to values of this type.")
    )]
    IncompatibleValidation {
        dsl: String,
        expected: String,
        actual: String,
    },

    #[error("invalid value in call to {dsl}: {message}")]
    #[diagnostic(code(design::invalid_value))]
    InvalidValue { dsl: String, message: String },

    #[error("unknown type {name:?}")]
    #[diagnostic(
        code(design::unknown_type),
        help("Define a type or media type with this name or identifier.")
    )]
    UnknownType { name: String },

    #[error("unknown trait {name:?}")]
    #[diagnostic(code(design::unknown_trait))]
    UnknownTrait { name: String },

    #[error("no response template named {name:?}")]
    #[diagnostic(code(design::unknown_template))]
    UnknownTemplate { name: String },

    #[error("{message}")]
    #[diagnostic(code(design::validation))]
    Validation { message: String },

    #[error("too many generated build steps after {generations} generations, infinite loop?")]
    #[diagnostic(
        code(design::too_many_generations),
        help("A build routine keeps queueing new definitions.")
    )]
    TooManyGenerations { generations: usize },
}

impl DslError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        DslError::Validation {
            message: message.into(),
        }
    }
}

/// Where a definition was written: the user's call site, not the engine's.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    /// Placeholder used when no call site is available.
    #[must_use]
    pub fn unknown() -> Self {
        SourceLocation {
            file: "<unknown>".to_string(),
            line: 0,
            column: 0,
        }
    }

    /// Builds a location from a captured caller, stripping `root` from the file path when it is a prefix.
    #[must_use]
    pub fn from_caller(location: &Location<'_>, root: Option<&Path>) -> Self {
        let file = match root {
            Some(root) => Path::new(location.file())
                .strip_prefix(root)
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|_| location.file().to_string()),
            None => location.file().to_string(),
        };
        SourceLocation {
            file,
            line: location.line(),
            column: location.column(),
        }
    }
}

impl From<&Location<'_>> for SourceLocation {
    fn from(location: &Location<'_>) -> Self {
        SourceLocation::from_caller(location, None)
    }
}

impl Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file, self.line)
    }
}

/// A recorded error together with the definition being built and the call site.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub error: DslError,
    pub context: Option<String>,
    pub location: SourceLocation,
}

impl Diagnostic {
    #[must_use]
    pub fn new(error: DslError, context: Option<String>, location: SourceLocation) -> Self {
        Diagnostic {
            error,
            context,
            location,
        }
    }

    /// The message with its context suffix, without the location prefix.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// `<file>: <line>: <message>`
    #[must_use]
    pub fn render(&self) -> String {
        format!("{}: {}", self.location, self)
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{} in {}", self.error, context),
            None => write!(f, "{} (top level)", self.error),
        }
    }
}

impl std::error::Error for Diagnostic {}

impl miette::Diagnostic for Diagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.error.code()
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.error.help()
    }
}

/// Accumulates diagnostics across a run. Recording never aborts evaluation.
#[derive(Error, Debug, miette::Diagnostic, Clone, Default, PartialEq)]
#[error("design evaluation failed with {} error(s)", .entries.len())]
#[diagnostic(
    code(design::failed),
    help("Fix the reported definitions; no model is produced while errors remain.")
)]
pub struct Diagnostics {
    #[related]
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        log::trace!("recorded diagnostic: {}", diagnostic.render());
        self.entries.push(diagnostic);
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.entries.is_empty()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// One line per diagnostic, in recording order.
    #[must_use]
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(Diagnostic::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
