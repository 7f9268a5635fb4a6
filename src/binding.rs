use crate::error::{Error, Result};
use crate::handle::{self, Kernel};

#[derive(Debug, Clone, Copy)]
pub struct Binding<'k> {
    kernel: &'k Kernel,
}

impl<'k> Binding<'k> {
    pub fn new(kernel: &'k Kernel) -> Self {
        Self { kernel }
    }

    pub fn kernel(&self) -> &'k Kernel {
        self.kernel
    }

    /// `a + b` with 32-bit wraparound inside the kernel.
    pub fn add(&self, a: i64, b: i64) -> Result<i64> {
        let a = narrow("a", a)?;
        let b = narrow("b", b)?;
        Ok(i64::from(self.kernel.add(a, b)))
    }

    /// Only `n >= 0` is meaningful; negative input is passed through as is.
    pub fn fib(&self, n: i64) -> Result<i64> {
        let n = narrow("n", n)?;
        Ok(i64::from(self.kernel.fib(n)))
    }

    pub fn domain_fib(&self, n: i64) -> Result<i64> {
        let n = narrow("n", n)?;
        let value = self.kernel.domain_fib(n)?;
        Ok(i64::from(value))
    }
}

impl Binding<'static> {
    pub fn global() -> Result<Self> {
        handle::global().map(Binding::new)
    }
}

fn narrow(arg: &'static str, value: i64) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::OutOfRange { arg, value })
}

pub fn add(a: i64, b: i64) -> Result<i64> {
    Binding::global()?.add(a, b)
}

pub fn fib(n: i64) -> Result<i64> {
    Binding::global()?.fib(n)
}

pub fn domain_fib(n: i64) -> Result<i64> {
    Binding::global()?.domain_fib(n)
}
