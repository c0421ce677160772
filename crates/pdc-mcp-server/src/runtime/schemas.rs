//! Schemas for config fields whose types don't implement `JsonSchema`

use std::collections::HashMap;

use schemars::JsonSchema;

/// `headers`: extra header names and values sent to the PDC API
pub(super) fn header_map(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
    HashMap::<String, String>::json_schema(generator)
}

/// `logging.level`: the names accepted by `tracing::Level`'s parser
pub(super) fn level(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
    /// Log level
    #[derive(JsonSchema)]
    #[schemars(rename_all = "lowercase")]
    #[allow(dead_code)]
    enum Level {
        Trace,
        Debug,
        Info,
        Warn,
        Error,
    }

    Level::json_schema(generator)
}
