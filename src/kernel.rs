// Exports take and return C ints by value and must never panic.

use std::os::raw::c_int;

use crate::domain;
use crate::error::Status;

/// Bumped whenever an export's signature or status codes change.
pub const ABI_VERSION: u32 = 1;

#[no_mangle]
pub extern "C" fn callbench_abi_version() -> u32 {
    ABI_VERSION
}

/// Two's-complement addition; overflow wraps.
#[no_mangle]
pub extern "C" fn add(a: c_int, b: c_int) -> c_int {
    a.wrapping_add(b)
}

/// Naive recursive Fibonacci. Only defined for `n >= 0`; a negative `n` is
/// returned unchanged and must not be relied upon.
#[no_mangle]
pub extern "C" fn fib(n: c_int) -> c_int {
    fibonacci(n)
}

fn fibonacci(n: c_int) -> c_int {
    if n < 2 {
        return n;
    }

    fibonacci(n - 1).wrapping_add(fibonacci(n - 2))
}

/// Fibonacci computed by the active domain backend. Returns 0 when the
/// backend fails; use `domain_fib_checked` to tell failures apart.
#[no_mangle]
pub extern "C" fn domain_fib(n: c_int) -> c_int {
    domain::active_backend().fib(n).unwrap_or(0)
}

/// Fibonacci computed by the active domain backend, reporting failures.
///
/// # Safety
/// - `out` must be null or valid for a write of one `c_int`
///
/// # Returns
/// `Status::Ok` (0) with the result written to `out`, or a non-zero status.
#[no_mangle]
pub unsafe extern "C" fn domain_fib_checked(n: c_int, out: *mut c_int) -> c_int {
    if out.is_null() {
        return Status::NullOutput as c_int;
    }

    match domain::active_backend().fib(n) {
        Ok(value) => {
            *out = value;
            Status::Ok as c_int
        }
        Err(failure) => Status::from(failure) as c_int,
    }
}
