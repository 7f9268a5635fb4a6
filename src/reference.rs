/// Wraps at 32 bits like the kernel's `add`. Inputs are expected to be in
/// `i32` range already.
pub fn add(a: i64, b: i64) -> i64 {
    i64::from((a as i32).wrapping_add(b as i32))
}

pub fn fib(n: i64) -> i64 {
    if n < 2 {
        return n;
    }

    fib(n - 1) + fib(n - 2)
}

pub fn fib_iterative(n: u32) -> i64 {
    let (mut prev, mut curr) = (0i64, 1i64);
    for _ in 0..n {
        let next = prev + curr;
        prev = curr;
        curr = next;
    }
    prev
}
