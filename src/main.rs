use clap::{Parser, Subcommand};
use std::path::PathBuf;

use callbench::log::{self, Level};
use callbench::{bench, handle, BenchConfig, Binding, KernelSource};

#[derive(Parser)]
#[command(name = "callbench")]
#[command(about = "Measure native call overhead against in-process equivalents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark suite (default command)
    #[command(alias = "r")]
    Run {
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        iterations: Option<u64>,

        #[arg(short, long)]
        threads: Option<usize>,

        /// Shared library to load instead of the linked-in kernel
        #[arg(short, long)]
        kernel: Option<PathBuf>,

        /// Print the report as TOML
        #[arg(long)]
        toml: bool,

        #[arg(short, long)]
        verbose: bool,
    },

    /// Load the kernel and check its results against the reference
    Check {
        #[arg(short, long)]
        kernel: Option<PathBuf>,
    },

    Info,
}

fn main() {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Run {
        config: None,
        iterations: None,
        threads: None,
        kernel: None,
        toml: false,
        verbose: false,
    });

    match command {
        Commands::Run {
            config,
            iterations,
            threads,
            kernel,
            toml,
            verbose,
        } => {
            let mut bench_config = match config {
                Some(path) => match BenchConfig::from_file(&path) {
                    Ok(config) => config,
                    Err(e) => {
                        eprintln!("❌ Failed to load {}: {e}", path.display());
                        std::process::exit(1);
                    }
                },
                None => BenchConfig::default(),
            };

            if let Some(iterations) = iterations {
                bench_config.iterations = iterations;
            }
            if let Some(threads) = threads {
                bench_config.threads = threads;
            }
            if let Some(path) = kernel {
                bench_config = bench_config.with_kernel_path(path);
            }
            bench_config.verbose |= verbose;

            if bench_config.verbose {
                log::set_verbosity(Level::Debug);
            }

            let source = match bench_config.kernel.source() {
                Ok(source) => source,
                Err(e) => {
                    eprintln!("❌ {e}");
                    std::process::exit(1);
                }
            };
            let binding = load(&source);

            if bench_config.verbose {
                println!("🚀 Running call benchmarks against {source}...");
            }

            match bench::run(&bench_config, &binding) {
                Ok(report) => {
                    if toml {
                        match report.to_toml() {
                            Ok(text) => print!("{text}"),
                            Err(e) => {
                                eprintln!("❌ Failed to serialize report: {e}");
                                std::process::exit(1);
                            }
                        }
                    } else {
                        print!("{}", report.render());
                    }

                    let agree = report.comparisons.iter().all(|c| c.results_agree());
                    if !agree || !report.concurrent_consistent {
                        eprintln!("⚠️  Native and host results disagree");
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("❌ Benchmark failed: {e}");
                    std::process::exit(1);
                }
            }
        }

        Commands::Check { kernel } => {
            let source = match kernel {
                Some(path) => KernelSource::Dynamic { path },
                None => KernelSource::from_env(),
            };
            let binding = load(&source);

            println!("📦 Kernel: {source}");
            let failures = bench::verify(&binding);
            if failures.is_empty() {
                println!("✅ All checks passed");
            } else {
                for failure in &failures {
                    println!("  ❌ {failure}");
                }
                eprintln!("{} check(s) failed", failures.len());
                std::process::exit(1);
            }
        }

        Commands::Info => {
            println!("Callbench v{}", env!("CARGO_PKG_VERSION"));
            println!("Kernel ABI version: {}", callbench::ABI_VERSION);
            let source = KernelSource::from_env();
            let backend = match source {
                KernelSource::Linked => callbench::active_backend().name(),
                KernelSource::Dynamic { .. } => handle::KERNEL_INTERNAL_BACKEND,
            };
            println!("Kernel source: {source}");
            println!("Domain backend: {backend}");
            println!();
            println!("Commands:");
            println!("  run    Run the benchmark suite (default)");
            println!("  check  Verify kernel results against the reference");
            println!("  info   Show version and configuration");
        }
    }
}

fn load(source: &KernelSource) -> Binding<'static> {
    match handle::init(source) {
        Ok(kernel) => Binding::new(kernel),
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    }
}
