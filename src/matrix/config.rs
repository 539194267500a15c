//! Configuration and system parameters for the saxpy3 engine

use std::sync::OnceLock;

use crate::constants::{
    COSTLY, DEFAULT_CHUNK, FINE_WORK, GUSTAVSON_DIVISOR, MWORK_ALPHA, MWORK_BETA, NTASKS_PER_THREAD,
};
use crate::error::{SaxpyError, SaxpyResult};

/// System parameters for performance tuning
#[derive(Debug, Clone)]
pub struct SystemParameters {
    /// Upper bound on the number of threads for one multiplication
    pub n_threads: usize,
}

impl Default for SystemParameters {
    fn default() -> Self {
        Self {
            n_threads: num_cpus::get(), // Use all available cores
        }
    }
}

/// Caller hint for the per-task accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxbMethod {
    /// Gustavson when the hash table would reach `cvlen / 16`, else Hash
    #[default]
    Default,
    /// Always use a dense Gustavson table
    Gustavson,
    /// Prefer hash tables; Gustavson only once the table reaches `cvlen`
    Hash,
}

impl AxbMethod {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" | "auto" => Some(AxbMethod::Default),
            "gustavson" | "gus" => Some(AxbMethod::Gustavson),
            "hash" => Some(AxbMethod::Hash),
            _ => None,
        }
    }
}

/// Thresholds of the task partitioner and the mask economy
#[derive(Debug, Clone)]
pub struct TaskTuning {
    /// Initial tasks per thread
    pub ntasks_per_thread: usize,
    /// A column is costly above `costly * target_task_size` flops
    pub costly: f64,
    /// Fine tasks target `target_task_size / fine_work` flops
    pub fine_work: f64,
    /// Discard a sparse mask below `mwork_alpha * mask_work` flops
    pub mwork_alpha: f64,
    /// Use a dense mask in place below `mwork_beta * cvlen * cvdim` flops
    pub mwork_beta: f64,
    /// Default method switches to Gustavson at `cvlen / gustavson_divisor`
    pub gustavson_divisor: usize,
}

impl Default for TaskTuning {
    fn default() -> Self {
        Self {
            ntasks_per_thread: NTASKS_PER_THREAD,
            costly: COSTLY,
            fine_work: FINE_WORK,
            mwork_alpha: MWORK_ALPHA,
            mwork_beta: MWORK_BETA,
            gustavson_divisor: GUSTAVSON_DIVISOR,
        }
    }
}

/// Which numeric tiers the dispatcher may try
#[derive(Debug, Clone)]
pub struct DispatchControl {
    /// Try the registered just-in-time backend first
    pub jit: bool,
    /// Try the compiled specialized kernels
    pub specialized: bool,
}

impl Default for DispatchControl {
    fn default() -> Self {
        Self {
            jit: true,
            specialized: cfg!(feature = "specialized-kernels"),
        }
    }
}

/// Lock-free capabilities of the running platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformAtomics {
    /// Widest value, in bits, that can be updated with compare-and-swap
    pub max_bits: usize,
}

impl PlatformAtomics {
    /// Queried once per process
    pub fn get() -> PlatformAtomics {
        static ATOMICS: OnceLock<PlatformAtomics> = OnceLock::new();
        *ATOMICS.get_or_init(detect_atomics)
    }

    pub fn supports_bits(&self, bits: usize) -> bool {
        bits <= self.max_bits
    }
}

fn detect_atomics() -> PlatformAtomics {
    #[cfg(target_has_atomic = "64")]
    {
        return PlatformAtomics { max_bits: 64 };
    }

    #[allow(unreachable_code)]
    PlatformAtomics { max_bits: 0 }
}

/// Configuration for one multiplication
#[derive(Debug, Clone)]
pub struct SaxpyConfig {
    /// System parameters for performance tuning
    pub system: SystemParameters,

    /// Work per thread used by the thread-count heuristic
    pub chunk: f64,

    /// Partitioner and mask thresholds
    pub tuning: TaskTuning,

    /// Accumulator hint
    pub method: AxbMethod,

    /// Enabled numeric tiers
    pub dispatch: DispatchControl,

    /// Allow compare-and-swap accumulation in fine tasks
    pub atomics: bool,

    /// Skip products for entries that already hold the terminal value
    pub terminal_exit: bool,

    /// Refuse workspaces larger than this many bytes
    pub workspace_limit: Option<usize>,
}

impl Default for SaxpyConfig {
    fn default() -> Self {
        Self {
            system: SystemParameters::default(),
            chunk: DEFAULT_CHUNK,
            tuning: TaskTuning::default(),
            method: AxbMethod::Default,
            dispatch: DispatchControl::default(),
            atomics: true,
            terminal_exit: true,
            workspace_limit: None,
        }
    }
}

impl SaxpyConfig {
    /// Default configuration with overrides from the environment
    ///
    /// Reads `SAXPY3_NTHREADS`, `SAXPY3_METHOD` and `SAXPY3_CHUNK`; values
    /// that do not parse are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = env_parse::<usize>("SAXPY3_NTHREADS").filter(|&n| n > 0) {
            config.system.n_threads = n;
        }
        if let Some(method) = std::env::var("SAXPY3_METHOD").ok().as_deref().and_then(AxbMethod::parse) {
            config.method = method;
        }
        if let Some(chunk) = env_parse::<f64>("SAXPY3_CHUNK").filter(|&c| c > 0.0) {
            config.chunk = chunk;
        }
        config
    }

    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.system.n_threads = n_threads;
        self
    }

    pub fn with_chunk(mut self, chunk: f64) -> Self {
        self.chunk = chunk;
        self
    }

    pub fn with_method(mut self, method: AxbMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_workspace_limit(mut self, bytes: usize) -> Self {
        self.workspace_limit = Some(bytes);
        self
    }

    pub fn validate(&self) -> SaxpyResult<()> {
        if self.system.n_threads == 0 {
            return Err(SaxpyError::invalid_input("n_threads must be at least 1"));
        }
        if !(self.chunk > 0.0) {
            return Err(SaxpyError::invalid_input("chunk must be positive"));
        }
        let t = &self.tuning;
        if t.ntasks_per_thread == 0 || t.gustavson_divisor == 0 {
            return Err(SaxpyError::invalid_input(
                "ntasks_per_thread and gustavson_divisor must be at least 1",
            ));
        }
        if !(t.costly > 0.0 && t.fine_work > 0.0) {
            return Err(SaxpyError::invalid_input("costly and fine_work must be positive"));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SaxpyConfig::default();
        assert_eq!(config.chunk, 65_536.0);
        assert_eq!(config.tuning.ntasks_per_thread, 2);
        assert_eq!(config.method, AxbMethod::Default);
        assert!(config.system.n_threads >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_nonsense() {
        assert!(SaxpyConfig::default().with_threads(0).validate().is_err());
        assert!(SaxpyConfig::default().with_chunk(0.0).validate().is_err());
        assert!(SaxpyConfig::default().with_chunk(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(AxbMethod::parse("Hash"), Some(AxbMethod::Hash));
        assert_eq!(AxbMethod::parse("gustavson"), Some(AxbMethod::Gustavson));
        assert_eq!(AxbMethod::parse("bogus"), None);
    }

    #[test]
    fn test_platform_atomics_is_stable() {
        assert_eq!(PlatformAtomics::get(), PlatformAtomics::get());
    }
}
