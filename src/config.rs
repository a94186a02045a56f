//! Configuration options for interpreter sessions.

use std::time::Duration;

/// Configuration options for creating a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct Options {
    /// Wall-clock limit for a single script invocation.
    /// Enforced via an engine instruction hook.
    /// Default: None (scripts run to completion)
    pub script_timeout: Option<Duration>,

    /// How many VM instructions run between timeout checks.
    /// Only consulted when `script_timeout` is set.
    /// Default: 1000
    pub instruction_hook_interval: u32,

    /// Maximum nesting depth for command invocations issued from scripts.
    /// A call at the limit is rejected with a runtime error before it
    /// reaches the dispatcher.
    /// Default: None (depth is tracked but unbounded)
    pub max_command_depth: Option<u32>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            script_timeout: None,
            instruction_hook_interval: 1000,
            max_command_depth: None,
        }
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-invocation time limit.
    pub fn script_timeout(mut self, timeout: Duration) -> Self {
        self.script_timeout = Some(timeout);
        self
    }

    /// Sets the instruction count between timeout checks.
    pub fn instruction_hook_interval(mut self, interval: u32) -> Self {
        self.instruction_hook_interval = interval;
        self
    }

    /// Sets the maximum command-call nesting depth.
    pub fn max_command_depth(mut self, depth: u32) -> Self {
        self.max_command_depth = Some(depth);
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.instruction_hook_interval == 0 {
            return Err(crate::Error::invalid_argument(
                "instruction_hook_interval must be > 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = Options::default();
        assert!(opts.script_timeout.is_none());
        assert!(opts.max_command_depth.is_none());
        assert_eq!(opts.instruction_hook_interval, 1000);
    }

    #[test]
    fn test_options_builder() {
        let opts = Options::new()
            .script_timeout(Duration::from_secs(5))
            .instruction_hook_interval(500)
            .max_command_depth(8);

        assert_eq!(opts.script_timeout, Some(Duration::from_secs(5)));
        assert_eq!(opts.instruction_hook_interval, 500);
        assert_eq!(opts.max_command_depth, Some(8));
    }

    #[test]
    fn test_options_validation() {
        let mut opts = Options::default();
        assert!(opts.validate().is_ok());

        opts.instruction_hook_interval = 0;
        assert!(opts.validate().is_err());
    }
}
