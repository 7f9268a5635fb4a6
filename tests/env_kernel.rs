// Runs in its own binary: it sets the kernel environment variable before the
// process-wide handle is first touched.

use callbench::{handle, Error, LoadError, KERNEL_ENV};

#[test]
fn test_global_handle_follows_env() {
    let path = "/nonexistent/env/libcallbench.so";
    std::env::set_var(KERNEL_ENV, path);

    match handle::global() {
        Err(Error::Load(LoadError::Open { path: opened, .. })) => assert_eq!(opened, path),
        Err(Error::Load(LoadError::Unsupported(_))) => {}
        other => panic!("expected the env kernel to be opened, got {other:?}"),
    }
}
