//! Fallbacks for logging options left out of the config file and `PDC_MCP_LOGGING__*`

use super::LogRotationKind;
use tracing::Level;

/// Request outcomes are logged at INFO, query text at DEBUG
pub(super) const fn level() -> Level {
    Level::INFO
}

/// Only consulted when `logging.path` points at a log directory
pub(super) const fn rotation() -> LogRotationKind {
    LogRotationKind::Hourly
}
