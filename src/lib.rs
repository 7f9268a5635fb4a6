pub mod bench;
pub mod binding;
pub mod config;
pub mod domain;
pub mod error;
pub mod handle;
pub mod kernel;
pub mod log;
pub mod reference;

pub use bench::{compare, measure, measure_concurrent, verify, Comparison, Measurement, Report};
pub use binding::Binding;
pub use config::{BenchConfig, KernelConfig, SourceKind};
pub use domain::{active_backend, install_backend, DomainBackend, IterativeFib};
pub use error::{DomainFailure, Error, LoadError, Result, Status};
pub use handle::{Kernel, KernelSource, KERNEL_ENV, KERNEL_INTERNAL_BACKEND};
pub use kernel::ABI_VERSION;
