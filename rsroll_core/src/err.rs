//! Errors and results.

// anyhow {

/// [`anyhow::Error`]
pub type AnyErr = anyhow::Error;

/// [`anyhow::Result`] with `T` if ok, [`AnyErr`]([`anyhow::Error`]) if error.
pub type AnyResult<T> = anyhow::Result<T>;

// anyhow }

// std::io {

/// [`std::io::Error`]
pub type IoErr = std::io::Error;

/// [`std::io::ErrorKind`]
pub type IoErrKind = std::io::ErrorKind;

/// [`std::io::Result`] with `T` if ok.
pub type IoResult<T> = std::io::Result<T>;

// std::io }

// thiserror {

/// Fatal build failures. Anything recoverable is a
/// [`Warning`](crate::diag::Warning) instead and never aborts a phase.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
  #[error("You must supply at least one entry module")]
  MissingEntries,

  #[error("Duplicate entry name {0:?}")]
  DuplicateEntryName(String),

  #[error("Could not resolve entry module {0:?}")]
  UnresolvedEntry(String),

  #[error("Could not resolve {specifier:?} from {importer:?}")]
  UnresolvedImport { specifier: String, importer: String },

  #[error("Could not load {id:?} (imported by {importer:?}): {source}")]
  Load {
    id: String,
    importer: String,
    #[source]
    source: AnyErr,
  },

  #[error("Parse failure in {id}:{line}:{column}: {message}")]
  Parse {
    id: String,
    line: u32,
    column: u32,
    message: String,
  },

  #[error("Plugin {plugin:?} failed in hook {hook:?}: {source}")]
  Plugin {
    plugin: String,
    hook: &'static str,
    #[source]
    source: AnyErr,
  },

  #[error("{0}")]
  Deprecation(String),

  #[error("Unable to find module {0:?}")]
  UnknownModule(String),

  #[error("Build cancelled")]
  Cancelled,
}

/// [`Result`] with `T` if ok, [`BuildError`] if error.
pub type BuildResult<T> = Result<T, BuildError>;

// thiserror }
