use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::handle::KernelSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub iterations: u64,
    pub threads: usize,
    pub add_inputs: [i64; 2],
    pub fib_input: i64,
    pub verbose: bool,
    pub kernel: KernelConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub source: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Linked,
    Dynamic,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 100_000,
            threads: 1,
            add_inputs: [1, 3],
            fib_input: 7,
            verbose: false,
            kernel: KernelConfig::default(),
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Linked,
            path: None,
        }
    }
}

/// Largest `n` whose Fibonacci number fits in `i32`.
pub const MAX_FIB_INPUT: i64 = 46;

impl BenchConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: BenchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(Error::Config("iterations must be at least 1".to_string()));
        }
        if self.threads == 0 {
            return Err(Error::Config("threads must be at least 1".to_string()));
        }
        if !(0..=MAX_FIB_INPUT).contains(&self.fib_input) {
            return Err(Error::Config(format!(
                "fib_input must be in 0..={MAX_FIB_INPUT}, got {}",
                self.fib_input
            )));
        }
        self.kernel.source()?;
        Ok(())
    }

    pub fn with_kernel_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.kernel = KernelConfig {
            source: SourceKind::Dynamic,
            path: Some(path.into()),
        };
        self
    }
}

impl KernelConfig {
    pub fn source(&self) -> Result<KernelSource> {
        match (self.source, &self.path) {
            (SourceKind::Linked, _) => Ok(KernelSource::Linked),
            (SourceKind::Dynamic, Some(path)) => Ok(KernelSource::Dynamic { path: path.clone() }),
            (SourceKind::Dynamic, None) => Err(Error::Config(
                "kernel.path is required when kernel.source = \"dynamic\"".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BenchConfig::parse("").unwrap();
        assert_eq!(config, BenchConfig::default());
        assert_eq!(config.add_inputs, [1, 3]);
        assert_eq!(config.fib_input, 7);
        assert_eq!(config.kernel.source().unwrap(), KernelSource::Linked);
    }

    #[test]
    fn test_partial_override() {
        let config = BenchConfig::parse(
            r#"
iterations = 500
fib_input = 10

[kernel]
source = "dynamic"
path = "/opt/kernel/libcallbench.so"
"#,
        )
        .unwrap();

        assert_eq!(config.iterations, 500);
        assert_eq!(config.fib_input, 10);
        assert_eq!(config.threads, 1);
        assert_eq!(
            config.kernel.source().unwrap(),
            KernelSource::Dynamic {
                path: PathBuf::from("/opt/kernel/libcallbench.so")
            }
        );
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            BenchConfig::parse("iterations = 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            BenchConfig::parse("threads = 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            BenchConfig::parse("[kernel]\nsource = \"dynamic\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            BenchConfig::parse("iterations = \"many\""),
            Err(Error::TomlParse(_))
        ));
    }

    #[test]
    fn test_fib_input_bounds() {
        let config = BenchConfig::parse("fib_input = 46").unwrap();
        assert_eq!(config.fib_input, MAX_FIB_INPUT);

        assert!(matches!(
            BenchConfig::parse("fib_input = 47"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            BenchConfig::parse("fib_input = -1"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_with_kernel_path() {
        let config = BenchConfig::default().with_kernel_path("/tmp/libk.so");
        assert_eq!(config.kernel.source, SourceKind::Dynamic);
        assert!(config.validate().is_ok());
    }
}
