use serde::Serialize;
use std::fmt::Write as _;
use std::hint::black_box;
use std::time::{Duration, Instant};

use crate::binding::Binding;
use crate::config::BenchConfig;
use crate::error::{Error, Result};
use crate::reference;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub name: String,
    pub iterations: u64,
    pub total_ns: u64,
    pub per_call_ns: f64,
    pub checksum: i64,
}

impl Measurement {
    fn new(name: &str, iterations: u64, elapsed: Duration, checksum: i64) -> Self {
        let total_ns = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        Self {
            name: name.to_string(),
            iterations,
            total_ns,
            per_call_ns: total_ns as f64 / iterations as f64,
            checksum,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub label: String,
    /// Native per-call time minus host per-call time. Negative when the
    /// native side is faster.
    pub overhead_ns: f64,
    pub native: Measurement,
    pub host: Measurement,
}

impl Comparison {
    pub fn results_agree(&self) -> bool {
        self.native.checksum == self.host.checksum
    }
}

pub fn measure<F>(name: &str, iterations: u64, mut f: F) -> Result<Measurement>
where
    F: FnMut() -> Result<i64>,
{
    if iterations == 0 {
        return Err(Error::InvalidBenchmark(format!(
            "{name}: iterations must be at least 1"
        )));
    }

    let mut checksum = 0i64;
    let start = Instant::now();
    for _ in 0..iterations {
        let value = f()?;
        checksum = checksum.wrapping_add(black_box(value));
    }
    let elapsed = start.elapsed();

    Ok(Measurement::new(name, iterations, elapsed, black_box(checksum)))
}

pub fn compare<N, H>(label: &str, iterations: u64, native: N, host: H) -> Result<Comparison>
where
    N: FnMut() -> Result<i64>,
    H: FnMut() -> Result<i64>,
{
    let native = measure(&format!("native {label}"), iterations, native)?;
    let host = measure(&format!("host {label}"), iterations, host)?;
    crate::log::debug!(
        "{label}: native {:.1} ns/call, host {:.1} ns/call",
        native.per_call_ns,
        host.per_call_ns
    );

    Ok(Comparison {
        label: label.to_string(),
        overhead_ns: native.per_call_ns - host.per_call_ns,
        native,
        host,
    })
}

pub fn measure_concurrent<F>(
    name: &str,
    threads: usize,
    iterations: u64,
    f: F,
) -> Result<Vec<Measurement>>
where
    F: Fn(usize) -> Result<i64> + Sync,
{
    if threads == 0 {
        return Err(Error::InvalidBenchmark(format!(
            "{name}: threads must be at least 1"
        )));
    }

    let f = &f;
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|t| {
                scope.spawn(move || measure(&format!("{name}#{t}"), iterations, || f(t)))
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub kernel: String,
    pub backend: String,
    pub iterations: u64,
    pub threads: usize,
    pub concurrent_consistent: bool,
    pub comparisons: Vec<Comparison>,
    pub concurrent: Vec<Measurement>,
}

impl Report {
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "kernel: {}  backend: {}", self.kernel, self.backend);
        let _ = writeln!(
            out,
            "iterations: {}  threads: {}",
            self.iterations, self.threads
        );
        let _ = writeln!(
            out,
            "{:<16} {:>14} {:>14} {:>14}",
            "call", "native ns", "host ns", "overhead ns"
        );
        for comparison in &self.comparisons {
            let _ = writeln!(
                out,
                "{:<16} {:>14.2} {:>14.2} {:>14.2}{}",
                comparison.label,
                comparison.native.per_call_ns,
                comparison.host.per_call_ns,
                comparison.overhead_ns,
                if comparison.results_agree() { "" } else { "  MISMATCH" }
            );
        }
        for measurement in &self.concurrent {
            let _ = writeln!(
                out,
                "{:<16} {:>14.2}",
                measurement.name, measurement.per_call_ns
            );
        }
        out
    }
}

pub fn run(config: &BenchConfig, binding: &Binding<'_>) -> Result<Report> {
    config.validate()?;

    let [a, b] = config.add_inputs;
    let n = config.fib_input;
    let iterations = config.iterations;
    crate::log::info!("running suite: {iterations} iterations, {} threads", config.threads);

    let comparisons = vec![
        compare(
            &format!("add({a}, {b})"),
            iterations,
            || binding.add(black_box(a), black_box(b)),
            || Ok(reference::add(black_box(a), black_box(b))),
        )?,
        compare(
            &format!("fib({n})"),
            iterations,
            || binding.fib(black_box(n)),
            || Ok(reference::fib(black_box(n))),
        )?,
        compare(
            &format!("domain_fib({n})"),
            iterations,
            || binding.domain_fib(black_box(n)),
            || Ok(reference::fib(black_box(n))),
        )?,
    ];

    let mut concurrent = Vec::new();
    let mut concurrent_consistent = true;
    if config.threads > 1 {
        let input_for = |t: usize| (n + t as i64) % (n + 1);
        concurrent = measure_concurrent("fib", config.threads, iterations, |t| {
            binding.fib(black_box(input_for(t)))
        })?;

        for (t, measurement) in concurrent.iter().enumerate() {
            let expected = reference::fib(input_for(t)).wrapping_mul(iterations as i64);
            if measurement.checksum != expected {
                crate::log::warning!(
                    "{}: checksum {} != expected {expected}",
                    measurement.name,
                    measurement.checksum
                );
                concurrent_consistent = false;
            }
        }
    }

    Ok(Report {
        kernel: binding.kernel().source().to_string(),
        backend: binding.kernel().backend_name().to_string(),
        iterations,
        threads: config.threads,
        concurrent_consistent,
        comparisons,
        concurrent,
    })
}

/// Returns a description of every failed check; empty means the kernel
/// agrees with the reference.
pub fn verify(binding: &Binding<'_>) -> Vec<String> {
    let mut failures = Vec::new();

    check(&mut failures, "add(1, 3)", 4, binding.add(1, 3));
    check(&mut failures, "add(-7, 7)", 0, binding.add(-7, 7));
    check(&mut failures, "fib(0)", 0, binding.fib(0));
    check(&mut failures, "fib(1)", 1, binding.fib(1));
    check(&mut failures, "fib(7)", 13, binding.fib(7));

    for n in 2..=20i64 {
        if let Some(failure) = check_recurrence(
            n,
            binding.fib(n - 1),
            binding.fib(n - 2),
            binding.fib(n),
        ) {
            failures.push(failure);
        }
    }

    for n in 0..=20u32 {
        let expected = reference::fib_iterative(n);
        check(
            &mut failures,
            &format!("domain_fib({n})"),
            expected,
            binding.domain_fib(n as i64),
        );
    }

    failures
}

fn check(failures: &mut Vec<String>, what: &str, expected: i64, actual: Result<i64>) {
    match actual {
        Ok(value) if value == expected => {}
        Ok(value) => failures.push(format!("{what}: expected {expected}, got {value}")),
        Err(err) => failures.push(format!("{what}: expected {expected}, got error: {err}")),
    }
}

fn check_recurrence(
    n: i64,
    prev1: Result<i64>,
    prev2: Result<i64>,
    actual: Result<i64>,
) -> Option<String> {
    let what = format!("fib({n}) recurrence");
    match (prev1, prev2) {
        (Ok(a), Ok(b)) => {
            let mut failures = Vec::new();
            check(&mut failures, &what, a + b, actual);
            failures.pop()
        }
        (Err(err), _) | (_, Err(err)) => Some(format!("{what}: operand failed: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Kernel;

    #[test]
    fn test_measure_consumes_every_result() {
        let mut calls = 0;
        let measurement = measure("count", 10, || {
            calls += 1;
            Ok(calls)
        })
        .unwrap();

        assert_eq!(measurement.iterations, 10);
        assert_eq!(measurement.checksum, 55);
        assert!(measurement.per_call_ns >= 0.0);
    }

    #[test]
    fn test_measure_rejects_zero_iterations() {
        assert!(matches!(
            measure("none", 0, || Ok(1)),
            Err(Error::InvalidBenchmark(_))
        ));
    }

    #[test]
    fn test_measure_stops_on_error() {
        let result = measure("fails", 5, || {
            Err(Error::OutOfRange {
                arg: "n",
                value: i64::MAX,
            })
        });
        assert!(matches!(result, Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn test_compare_agrees() {
        let kernel = Kernel::linked();
        let binding = Binding::new(&kernel);
        let comparison = compare(
            "fib(7)",
            100,
            || binding.fib(7),
            || Ok(reference::fib(7)),
        )
        .unwrap();

        assert!(comparison.results_agree());
        assert_eq!(comparison.native.checksum, 1300);
        assert_eq!(
            comparison.overhead_ns,
            comparison.native.per_call_ns - comparison.host.per_call_ns
        );
    }

    #[test]
    fn test_measure_concurrent_per_thread_inputs() {
        let measurements = measure_concurrent("square", 4, 10, |t| Ok((t * t) as i64)).unwrap();
        let checksums: Vec<i64> = measurements.iter().map(|m| m.checksum).collect();
        assert_eq!(checksums, vec![0, 10, 40, 90]);
        assert_eq!(measurements[2].name, "square#2");
    }

    #[test]
    fn test_run_suite() {
        let kernel = Kernel::linked();
        let binding = Binding::new(&kernel);
        let config = BenchConfig {
            iterations: 50,
            threads: 3,
            ..BenchConfig::default()
        };

        let report = run(&config, &binding).unwrap();
        assert_eq!(report.comparisons.len(), 3);
        assert!(report.comparisons.iter().all(Comparison::results_agree));
        assert_eq!(report.concurrent.len(), 3);
        assert!(report.concurrent_consistent);
        assert_eq!(report.kernel, "linked");

        let rendered = report.render();
        assert!(rendered.contains("fib(7)"));
        assert!(!rendered.contains("MISMATCH"));

        let toml = report.to_toml().unwrap();
        assert!(toml.contains("iterations = 50"));
    }

    #[test]
    fn test_verify_linked_kernel() {
        let kernel = Kernel::linked();
        let failures = verify(&Binding::new(&kernel));
        assert!(failures.is_empty(), "{failures:?}");
    }

    #[test]
    fn test_run_add_agrees_at_wraparound() {
        let kernel = Kernel::linked();
        let binding = Binding::new(&kernel);
        let config = BenchConfig {
            iterations: 10,
            add_inputs: [i32::MAX as i64, 1],
            ..BenchConfig::default()
        };

        let report = run(&config, &binding).unwrap();
        let add = &report.comparisons[0];
        assert!(add.results_agree(), "{add:?}");
        assert_eq!(add.native.checksum, i32::MIN as i64 * 10);
    }

    #[test]
    fn test_run_reports_linked_backend() {
        let kernel = Kernel::linked();
        let config = BenchConfig {
            iterations: 1,
            ..BenchConfig::default()
        };
        let report = run(&config, &Binding::new(&kernel)).unwrap();
        assert_eq!(report.backend, crate::domain::active_backend().name());
    }

    #[test]
    fn test_recurrence_records_operand_errors() {
        let failed = || {
            Err(Error::OutOfRange {
                arg: "n",
                value: i64::MAX,
            })
        };

        let failure = check_recurrence(5, failed(), Ok(2), Ok(5)).unwrap();
        assert!(failure.starts_with("fib(5) recurrence: operand failed"));
        assert!(check_recurrence(5, Ok(3), failed(), Ok(5)).is_some());
        assert!(check_recurrence(5, Ok(3), Ok(2), Ok(5)).is_none());
        assert_eq!(
            check_recurrence(5, Ok(3), Ok(2), Ok(6)).unwrap(),
            "fib(5) recurrence: expected 5, got 6"
        );
    }
}
