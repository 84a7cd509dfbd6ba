//! # Engine Configuration

use std::time::Duration;

/// Tuning knobs for [`crate::SaleOrchestrator`].
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use mercado_sales::EngineConfig;
///
/// let config = EngineConfig::default()
///     .stock_write_retries(3)
///     .operation_timeout(Some(Duration::from_secs(5)));
/// assert_eq!(config.stock_write_retries, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How many times a conditional stock write is retried after a
    /// conflict before the operation fails.
    /// Default: 5
    pub stock_write_retries: u32,

    /// Deadline for a whole create/update/delete, lock waits included.
    /// `None` disables it.
    /// Default: 30 seconds
    pub operation_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            stock_write_retries: 5,
            operation_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl EngineConfig {
    pub fn stock_write_retries(mut self, retries: u32) -> Self {
        self.stock_write_retries = retries;
        self
    }

    pub fn operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }
}
