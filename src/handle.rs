use std::os::raw::c_int;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{DomainFailure, Error, LoadError, Result, Status};
use crate::kernel;

pub const KERNEL_ENV: &str = "CALLBENCH_KERNEL";

pub const KERNEL_INTERNAL_BACKEND: &str = "kernel-internal";

type AddFn = extern "C" fn(c_int, c_int) -> c_int;
type FibFn = extern "C" fn(c_int) -> c_int;
type CheckedFn = unsafe extern "C" fn(c_int, *mut c_int) -> c_int;
#[cfg(not(target_os = "windows"))]
type VersionFn = extern "C" fn() -> u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelSource {
    Linked,
    Dynamic { path: PathBuf },
}

impl KernelSource {
    pub fn from_env() -> Self {
        match std::env::var_os(KERNEL_ENV) {
            Some(path) if !path.is_empty() => KernelSource::Dynamic {
                path: PathBuf::from(path),
            },
            _ => KernelSource::Linked,
        }
    }
}

impl std::fmt::Display for KernelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelSource::Linked => f.write_str("linked"),
            KernelSource::Dynamic { path } => write!(f, "dynamic ({})", path.display()),
        }
    }
}

pub struct Kernel {
    add: AddFn,
    fib: FibFn,
    domain_fib: CheckedFn,
    source: KernelSource,
    // Keeps the resolved function pointers valid. Never unloaded while the
    // Kernel is alive.
    #[cfg(not(target_os = "windows"))]
    _library: Option<libloading::Library>,
}

impl Kernel {
    pub fn linked() -> Self {
        Self {
            add: kernel::add,
            fib: kernel::fib,
            domain_fib: kernel::domain_fib_checked,
            source: KernelSource::Linked,
            #[cfg(not(target_os = "windows"))]
            _library: None,
        }
    }

    #[cfg(not(target_os = "windows"))]
    pub fn open(path: impl AsRef<Path>) -> std::result::Result<Self, LoadError> {
        let path = path.as_ref();
        crate::log::debug!("opening kernel library {}", path.display());

        // SAFETY: loading runs the library's initializers; the caller vouches
        // that the path names a kernel library.
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| LoadError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let version: VersionFn = unsafe { resolve(&library, "callbench_abi_version")? };
        let found = version();
        if found != kernel::ABI_VERSION {
            return Err(LoadError::AbiMismatch {
                expected: kernel::ABI_VERSION,
                found,
            });
        }

        let add: AddFn = unsafe { resolve(&library, "add")? };
        let fib: FibFn = unsafe { resolve(&library, "fib")? };
        let domain_fib: CheckedFn = unsafe { resolve(&library, "domain_fib_checked")? };

        Ok(Self {
            add,
            fib,
            domain_fib,
            source: KernelSource::Dynamic {
                path: path.to_path_buf(),
            },
            _library: Some(library),
        })
    }

    #[cfg(target_os = "windows")]
    pub fn open(_path: impl AsRef<Path>) -> std::result::Result<Self, LoadError> {
        Err(LoadError::Unsupported("dynamic kernel loading"))
    }

    pub fn from_source(source: &KernelSource) -> std::result::Result<Self, LoadError> {
        match source {
            KernelSource::Linked => Ok(Self::linked()),
            KernelSource::Dynamic { path } => Self::open(path),
        }
    }

    pub fn source(&self) -> &KernelSource {
        &self.source
    }

    /// Name of the domain backend behind `domain_fib`. A dynamically opened
    /// kernel carries its own backend slot, which host-side
    /// `install_backend` never reaches, so it is reported as
    /// kernel-internal.
    pub fn backend_name(&self) -> &str {
        match self.source {
            KernelSource::Linked => crate::domain::active_backend().name(),
            KernelSource::Dynamic { .. } => KERNEL_INTERNAL_BACKEND,
        }
    }

    pub fn add(&self, a: i32, b: i32) -> i32 {
        (self.add)(a, b)
    }

    pub fn fib(&self, n: i32) -> i32 {
        (self.fib)(n)
    }

    pub fn domain_fib(&self, n: i32) -> std::result::Result<i32, DomainFailure> {
        let mut out: c_int = 0;
        // SAFETY: `out` is a live local; the export writes at most one c_int.
        let code = unsafe { (self.domain_fib)(n, &mut out) };
        match Status::failure(code) {
            None => Ok(out),
            Some(failure) => Err(failure),
        }
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel").field("source", &self.source).finish()
    }
}

/// # Safety
/// `T` must be the exact function pointer type of the exported symbol.
#[cfg(not(target_os = "windows"))]
unsafe fn resolve<T: Copy>(
    library: &libloading::Library,
    name: &'static str,
) -> std::result::Result<T, LoadError> {
    library
        .get::<T>(name.as_bytes())
        .map(|symbol| *symbol)
        .map_err(|e| LoadError::Symbol {
            name,
            reason: e.to_string(),
        })
}

static HANDLE: OnceLock<std::result::Result<Kernel, LoadError>> = OnceLock::new();

/// Initializes the process-wide kernel from `source`. The first call decides
/// the outcome, success or failure, for the rest of the process; later calls
/// return that same outcome.
pub fn init(source: &KernelSource) -> Result<&'static Kernel> {
    let mut initialized_here = false;
    let outcome = HANDLE.get_or_init(|| {
        initialized_here = true;
        let outcome = Kernel::from_source(source);
        match &outcome {
            Ok(kernel) => crate::log::info!("kernel ready: {}", kernel.source()),
            Err(err) => crate::log::warning!("kernel load failed: {err}"),
        }
        outcome
    });

    if !initialized_here {
        if let Ok(kernel) = outcome {
            if kernel.source() != source {
                crate::log::warning!(
                    "kernel already initialized from {}, ignoring {}",
                    kernel.source(),
                    source
                );
            }
        }
    }

    outcome.as_ref().map_err(|err| Error::Load(err.clone()))
}

pub fn global() -> Result<&'static Kernel> {
    match HANDLE.get() {
        Some(outcome) => outcome.as_ref().map_err(|err| Error::Load(err.clone())),
        None => init(&KernelSource::from_env()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linked_kernel_calls() {
        let kernel = Kernel::linked();
        assert_eq!(kernel.add(1, 3), 4);
        assert_eq!(kernel.fib(7), 13);
        assert_eq!(kernel.domain_fib(7), Ok(13));
        assert_eq!(kernel.source(), &KernelSource::Linked);
        assert_eq!(kernel.backend_name(), crate::domain::active_backend().name());
    }

    #[test]
    fn test_domain_failure_is_distinguishable() {
        let kernel = Kernel::linked();
        assert_eq!(kernel.domain_fib(-1), Err(DomainFailure::NegativeInput));
        assert_eq!(kernel.domain_fib(60), Err(DomainFailure::Overflow));
    }

    #[test]
    fn test_open_missing_library() {
        let err = Kernel::open("/nonexistent/libkernel.so").unwrap_err();
        match err {
            LoadError::Open { path, .. } => assert_eq!(path, "/nonexistent/libkernel.so"),
            LoadError::Unsupported(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_source_display() {
        assert_eq!(KernelSource::Linked.to_string(), "linked");
        let dynamic = KernelSource::Dynamic {
            path: PathBuf::from("/tmp/libk.so"),
        };
        assert_eq!(dynamic.to_string(), "dynamic (/tmp/libk.so)");
    }
}
