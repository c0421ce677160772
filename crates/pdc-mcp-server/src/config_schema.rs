//! Prints the JSON Schema of the PDC MCP Server YAML config, for editor validation

// Only `runtime::Config` and its field types are needed here
#![allow(unused_imports, dead_code)]

use anyhow::Context;
use schemars::schema_for;

mod runtime;

fn main() -> anyhow::Result<()> {
    let schema = schema_for!(runtime::Config);
    println!(
        "{}",
        serde_json::to_string_pretty(&schema).context("Failed to serialize the config schema")?
    );
    Ok(())
}
