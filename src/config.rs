use crate::error::{Error, Result};
use crate::executor::PanicStrategy;

const MAX_THREADS: usize = 1024;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Pool name, used in log components.
    pub name: String,
    /// Worker count; `None` means one per logical CPU.
    pub num_threads: Option<usize>,
    pub verbose: bool,
    pub stack_size: Option<usize>,
    pub thread_name_prefix: String,
    pub panic_strategy: PanicStrategy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "pool".to_string(),
            num_threads: None,
            verbose: false,
            stack_size: Some(2 * 1024 * 1024),
            thread_name_prefix: "pool-worker".to_string(),
            panic_strategy: PanicStrategy::default(),
        }
    }
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_threads {
            if n == 0 {
                return Err(Error::config("num_threads must be > 0"));
            }
            if n > MAX_THREADS {
                return Err(Error::config(format!(
                    "num_threads too large (max {})",
                    MAX_THREADS
                )));
            }
        }

        if self.name.is_empty() {
            return Err(Error::config("pool name must not be empty"));
        }

        if self.stack_size == Some(0) {
            return Err(Error::config("stack_size must be > 0"));
        }

        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }
}

#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn build(self) -> Result<PoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
