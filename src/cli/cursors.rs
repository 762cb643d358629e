//! Cursors command: show where each symbol would resume

use clap::Args;
use serde_json::json;
use std::sync::Arc;

use super::{CliError, OutputFormat};
use crate::config::ConfigArgs;
use crate::resume::{Cursor, CursorResolver, ResumeError};
use crate::sink::JsonLinesSink;

/// Cursors subcommand
#[derive(Debug, Args)]
pub struct CursorsCommand {
    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    pub format: OutputFormat,
}

impl CursorsCommand {
    /// Execute the cursors command
    ///
    /// Every symbol is resolved even if an earlier one fails; the first
    /// failure is returned after all results are printed.
    pub async fn execute(
        &self,
        config: &ConfigArgs,
    ) -> Result<Vec<(String, Result<Cursor, ResumeError>)>, CliError> {
        let symbols = config.symbol_list()?;
        let start = config.start_time()?;

        let sink = Arc::new(JsonLinesSink::new(config.data_dir.clone()));
        let resolver = CursorResolver::new(sink, start);

        let mut results = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let cursor = resolver.resolve(&symbol).await;
            results.push((symbol, cursor));
        }

        self.print(&results)?;

        if let Some(position) = results.iter().position(|(_, r)| r.is_err()) {
            let (_, result) = results.swap_remove(position);
            if let Err(e) = result {
                return Err(e.into());
            }
        }
        Ok(results)
    }

    fn print(&self, results: &[(String, Result<Cursor, ResumeError>)]) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Human => {
                for (symbol, result) in results {
                    match result {
                        Ok(cursor) => println!("{symbol:<32} {cursor}"),
                        Err(e) => println!("{symbol:<32} ERROR {e}"),
                    }
                }
            }
            OutputFormat::Json => {
                let entries: Vec<_> = results
                    .iter()
                    .map(|(symbol, result)| match result {
                        Ok(cursor) => json!({ "symbol": symbol, "cursor": cursor.to_string() }),
                        Err(e) => json!({ "symbol": symbol, "error": e.to_string() }),
                    })
                    .collect();
                let text = serde_json::to_string_pretty(&entries)
                    .map_err(|e| CliError::Output(e.to_string()))?;
                println!("{text}");
            }
        }
        Ok(())
    }
}
