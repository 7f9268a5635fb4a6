use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kernel load failed: {0}")]
    Load(LoadError),

    #[error("Argument `{arg}` out of range for a 32-bit call: {value}")]
    OutOfRange { arg: &'static str, value: i64 },

    #[error("Domain backend failed: {0}")]
    Domain(DomainFailure),

    #[error("A domain backend is already installed")]
    BackendAlreadyInstalled,

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Invalid benchmark: {0}")]
    InvalidBenchmark(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why the kernel could not be resolved. Cloneable so a failed
/// initialization can be cached and reported on every later call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    Open { path: String, reason: String },
    Symbol { name: &'static str, reason: String },
    AbiMismatch { expected: u32, found: u32 },
    Unsupported(&'static str),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Open { path, reason } => write!(f, "cannot open {path}: {reason}"),
            LoadError::Symbol { name, reason } => {
                write!(f, "cannot resolve symbol `{name}`: {reason}")
            }
            LoadError::AbiMismatch { expected, found } => {
                write!(f, "ABI version {found} does not match expected {expected}")
            }
            LoadError::Unsupported(what) => write!(f, "{what} is not supported on this platform"),
        }
    }
}

impl From<LoadError> for Error {
    fn from(err: LoadError) -> Self {
        Error::Load(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainFailure {
    Overflow,
    NegativeInput,
    /// Backend-specific failure that carries no detail across the ABI.
    Backend,
}

impl fmt::Display for DomainFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainFailure::Overflow => f.write_str("result overflows a 32-bit integer"),
            DomainFailure::NegativeInput => f.write_str("input must be non-negative"),
            DomainFailure::Backend => f.write_str("backend error"),
        }
    }
}

impl From<DomainFailure> for Error {
    fn from(failure: DomainFailure) -> Self {
        Error::Domain(failure)
    }
}

/// Status codes returned across the C ABI. Values are stable.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 0,
    NullOutput = 1,
    Overflow = 2,
    NegativeInput = 3,
    Backend = 4,
}

impl Status {
    pub fn from_code(code: i32) -> Option<Status> {
        match code {
            0 => Some(Status::Ok),
            1 => Some(Status::NullOutput),
            2 => Some(Status::Overflow),
            3 => Some(Status::NegativeInput),
            4 => Some(Status::Backend),
            _ => None,
        }
    }

    /// Maps a non-ok status to the failure it reports. Unknown codes from a
    /// foreign kernel are treated as opaque backend failures.
    pub fn failure(code: i32) -> Option<DomainFailure> {
        match Status::from_code(code) {
            Some(Status::Ok) => None,
            Some(Status::Overflow) => Some(DomainFailure::Overflow),
            Some(Status::NegativeInput) => Some(DomainFailure::NegativeInput),
            Some(Status::NullOutput) | Some(Status::Backend) | None => {
                Some(DomainFailure::Backend)
            }
        }
    }
}

impl From<DomainFailure> for Status {
    fn from(failure: DomainFailure) -> Self {
        match failure {
            DomainFailure::Overflow => Status::Overflow,
            DomainFailure::NegativeInput => Status::NegativeInput,
            DomainFailure::Backend => Status::Backend,
        }
    }
}
