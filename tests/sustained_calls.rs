// Kept in its own test binary so resident memory isn't disturbed by other
// tests running in parallel threads.

use callbench::{handle, Binding, KernelSource};

const CALLS: u32 = 1_000_000;

#[cfg(target_os = "linux")]
fn resident_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * 4096)
}

#[cfg(not(target_os = "linux"))]
fn resident_bytes() -> Option<u64> {
    None
}

#[test]
fn test_million_sequential_fib_calls() {
    let kernel = handle::init(&KernelSource::Linked).unwrap();
    let binding = Binding::new(kernel);

    // Warm up so lazy runtime allocations land before the baseline.
    for _ in 0..1000 {
        assert_eq!(binding.fib(7).unwrap(), 13);
    }
    let before = resident_bytes();

    for i in 0..CALLS {
        let value = binding.fib(std::hint::black_box(7)).unwrap();
        assert_eq!(value, 13, "call {i} returned {value}");
    }

    if let (Some(before), Some(after)) = (before, resident_bytes()) {
        let growth = after.saturating_sub(before);
        assert!(
            growth < 4 * 1024 * 1024,
            "resident memory grew by {growth} bytes over {CALLS} calls"
        );
    }
}
