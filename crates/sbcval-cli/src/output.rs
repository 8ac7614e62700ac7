use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;

use crate::commands::CommandResult;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct Document<'a> {
    command: &'static str,
    data: &'a Value,
    warnings: &'a [String],
}

pub fn render(result: &CommandResult, pretty: bool) -> Result<(), CliError> {
    let document = Document {
        command: result.command,
        data: &result.data,
        warnings: &result.warnings,
    };
    let payload = if pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{payload}")?;
    Ok(())
}
