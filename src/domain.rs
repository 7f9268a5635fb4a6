use std::sync::OnceLock;

use crate::error::{DomainFailure, Error, Result};

pub trait DomainBackend: Send + Sync {
    fn name(&self) -> &str;

    fn fib(&self, n: i32) -> std::result::Result<i32, DomainFailure>;
}

/// Default backend: evaluates Fibonacci with a counting loop and reports
/// overflow instead of wrapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct IterativeFib;

impl DomainBackend for IterativeFib {
    fn name(&self) -> &str {
        "iterative"
    }

    fn fib(&self, n: i32) -> std::result::Result<i32, DomainFailure> {
        if n < 0 {
            return Err(DomainFailure::NegativeInput);
        }
        if n < 2 {
            return Ok(n);
        }

        let (mut fib1, mut fib2) = (1i32, 1i32);
        let mut fibonacci = fib1;
        let mut i = 2;
        while i < n {
            fibonacci = fib1.checked_add(fib2).ok_or(DomainFailure::Overflow)?;
            fib1 = fib2;
            fib2 = fibonacci;
            i += 1;
        }
        Ok(fibonacci)
    }
}

pub struct BackendSlot {
    backend: OnceLock<Box<dyn DomainBackend>>,
}

impl BackendSlot {
    pub const fn new() -> Self {
        Self {
            backend: OnceLock::new(),
        }
    }

    pub fn install(&self, backend: Box<dyn DomainBackend>) -> Result<()> {
        self.backend
            .set(backend)
            .map_err(|_| Error::BackendAlreadyInstalled)
    }

    /// Falls back to `IterativeFib` if nothing was installed before first use.
    pub fn get(&self) -> &dyn DomainBackend {
        self.backend
            .get_or_init(|| Box::new(IterativeFib) as Box<dyn DomainBackend>)
            .as_ref()
    }
}

impl Default for BackendSlot {
    fn default() -> Self {
        Self::new()
    }
}

static ACTIVE: BackendSlot = BackendSlot::new();

/// Installs the backend used by this image's kernel exports. Must happen
/// before the first `domain_fib` call; afterwards the slot is sealed. A
/// kernel opened with `Kernel::open` has its own slot and is unaffected.
pub fn install_backend(backend: Box<dyn DomainBackend>) -> Result<()> {
    ACTIVE.install(backend)?;
    crate::log::info!("domain backend `{}` installed", ACTIVE.get().name());
    Ok(())
}

pub fn active_backend() -> &'static dyn DomainBackend {
    ACTIVE.get()
}
