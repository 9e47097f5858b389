// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use clap::Parser;
use csv::Writer;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process;
use storefront_ledger::{Command, Engine, EngineConfig, EngineContext, Outcome, TransactionRecord};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Storefront Ledger - Replay a command script against a fresh engine
///
/// Reads one JSON command per line and writes the resulting account report
/// as CSV to stdout. Rejected commands are logged and skipped.
#[derive(Parser, Debug)]
#[command(name = "storefront-ledger")]
#[command(about = "Replays storefront commands and reports account balances", long_about = None)]
struct Args {
    /// Path to a JSON-lines command script
    ///
    /// Example line: {"op":"deposit","account":"ada","amount":1000}
    /// A line may bind the id it creates with "as":"name"; later lines
    /// refer to it as "@name".
    #[arg(value_name = "SCRIPT")]
    script: PathBuf,

    /// TOML engine configuration
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Also write every committed transaction as CSV to this file
    #[arg(long, value_name = "FILE")]
    journal: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };
    let engine = Engine::new(EngineContext::new(config));

    let file = match File::open(&args.script) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening script '{}': {}", args.script.display(), e);
            process::exit(1);
        }
    };

    let summary = match run_script(&engine, BufReader::new(file)) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Error reading script: {}", e);
            process::exit(1);
        }
    };
    info!(
        applied = summary.applied,
        rejected = summary.rejected,
        malformed = summary.malformed,
        "script replayed"
    );

    if let Some(path) = &args.journal {
        let result = File::create(path)
            .map_err(csv::Error::from)
            .and_then(|file| write_journal(&engine.transaction_log().drain_feed(), file));
        if let Err(e) = result {
            eprintln!("Error writing journal '{}': {}", path.display(), e);
            process::exit(1);
        }
    }

    if let Err(e) = write_accounts(&engine, io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Counts of what happened to each script line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScriptSummary {
    pub applied: usize,
    /// Parsed but refused by the engine.
    pub rejected: usize,
    /// Not valid JSON, not a known command, or an unbound alias.
    pub malformed: usize,
}

/// Replays a JSON-lines script.
///
/// Blank lines and lines starting with `#` are ignored. Each command runs on
/// its own; a failing command never stops the replay.
///
/// # Errors
///
/// Returns an I/O error only if the reader itself fails.
pub fn run_script<R: BufRead>(engine: &Engine, reader: R) -> io::Result<ScriptSummary> {
    let mut summary = ScriptSummary::default();
    let mut aliases: HashMap<String, String> = HashMap::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (command, alias) = match parse_line(trimmed, &aliases) {
            Ok(parsed) => parsed,
            Err(reason) => {
                warn!(line = line_no, %reason, "skipping malformed line");
                summary.malformed += 1;
                continue;
            }
        };

        let op = command.name();
        match engine.execute(command) {
            Ok(outcome) => {
                summary.applied += 1;
                if let (Some(alias), Some(id)) = (alias, created_id(&outcome)) {
                    aliases.insert(alias, id);
                }
            }
            Err(e) => {
                warn!(line = line_no, op, code = e.code(), error = %e, "command rejected");
                summary.rejected += 1;
            }
        }
    }

    Ok(summary)
}

fn parse_line(line: &str, aliases: &HashMap<String, String>) -> Result<(Command, Option<String>), String> {
    let mut value: Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
    let alias = match value.as_object_mut().and_then(|object| object.remove("as")) {
        None => None,
        Some(Value::String(name)) => Some(name),
        Some(_) => return Err("\"as\" must be a string".into()),
    };
    substitute_aliases(&mut value, aliases)?;
    let command = serde_json::from_value(value).map_err(|e| e.to_string())?;
    Ok((command, alias))
}

/// Replaces every `"@name"` string with the id bound to `name`.
fn substitute_aliases(value: &mut Value, aliases: &HashMap<String, String>) -> Result<(), String> {
    match value {
        Value::String(text) => {
            if let Some(name) = text.strip_prefix('@') {
                let id = aliases.get(name).ok_or_else(|| format!("unbound alias @{name}"))?;
                *text = id.clone();
            }
        }
        Value::Array(items) => {
            for item in items {
                substitute_aliases(item, aliases)?;
            }
        }
        Value::Object(fields) => {
            for field in fields.values_mut() {
                substitute_aliases(field, aliases)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// The id a command created, if any, for alias binding.
fn created_id(outcome: &Outcome) -> Option<String> {
    match outcome {
        Outcome::Account { account } => Some(account.to_string()),
        Outcome::Submitted { product } => Some(product.to_string()),
        Outcome::Purchase { request } => Some(request.id.to_string()),
        Outcome::Transaction { transaction } => Some(transaction.id.to_string()),
        Outcome::FilterSaved { filter } => Some(filter.to_string()),
        _ => None,
    }
}

/// Write account states to a CSV writer
///
/// # CSV Format
///
/// Columns: `account, display_name, balance, transactions, pro, pro_expiry, wishlist`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_accounts<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for account in engine.accounts() {
        wtr.serialize(account.as_ref())?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write transaction records, one row each, in the order given.
pub fn write_journal<W: Write>(records: &[TransactionRecord], writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use storefront_ledger::{AccountId, RequestStatus};

    const SETUP: &str = r#"
{"op":"register","identity":{"uid":"sam","display_name":"Sam","email":"sam@example.com"}}
{"op":"register","identity":{"uid":"bea","display_name":"Bea","email":"bea@example.com"}}
{"op":"submit_product","owner":"sam","as":"icons","submission":{"kind":"download","details":{"title":"Icons","description":"","price":300,"category":"design"},"file_url":"https://cdn.example.com/i.zip","file_size_bytes":10}}
{"op":"approve_product","product":"@icons"}
{"op":"deposit","account":"bea","amount":1000}
"#;

    fn replay(script: &str) -> (Engine, ScriptSummary) {
        let engine = Engine::default();
        let summary = run_script(&engine, Cursor::new(script)).unwrap();
        (engine, summary)
    }

    #[test]
    fn aliases_link_created_ids() {
        let script = format!(
            "{SETUP}{}\n",
            r#"{"op":"create_wallet_purchase","account":"bea","product":"@icons","as":"order"}"#
        );
        let (engine, summary) = replay(&script);

        assert_eq!(summary.applied, 6);
        assert_eq!(summary.rejected, 0);
        let requests = engine.requests_for(&AccountId::new("bea")).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].status, RequestStatus::Approved);
        assert_eq!(engine.balance(&AccountId::new("bea")).unwrap(), 700);
    }

    #[test]
    fn rejected_commands_are_skipped() {
        let script = format!(
            "{SETUP}{}\n{}\n",
            r#"{"op":"withdraw","account":"bea","amount":5000}"#,
            r#"{"op":"withdraw","account":"bea","amount":100}"#
        );
        let (engine, summary) = replay(&script);
        assert_eq!(summary.rejected, 1);
        assert_eq!(engine.balance(&AccountId::new("bea")).unwrap(), 900);
    }

    #[test]
    fn malformed_lines_are_counted_not_fatal() {
        let script = "# comment\n\nnot json\n{\"op\":\"teleport\"}\n{\"op\":\"approve_product\",\"product\":\"@missing\"}\n";
        let (engine, summary) = replay(script);
        assert_eq!(summary.malformed, 3);
        assert_eq!(summary.applied, 0);
        assert!(engine.accounts().is_empty());
    }

    #[test]
    fn write_accounts_to_csv() {
        let (engine, _) = replay(SETUP);
        let mut output = Vec::new();
        write_accounts(&engine, &mut output).unwrap();

        let output = String::from_utf8(output).unwrap();
        let mut lines = output.lines();
        assert_eq!(
            lines.next(),
            Some("account,display_name,balance,transactions,pro,pro_expiry,wishlist")
        );
        assert_eq!(lines.next(), Some("bea,Bea,10.00,1,false,,0"));
        assert_eq!(lines.next(), Some("sam,Sam,0.00,0,false,,0"));
    }

    #[test]
    fn journal_lists_committed_records() {
        let (engine, _) = replay(SETUP);
        let mut output = Vec::new();
        write_journal(&engine.transaction_log().drain_feed(), &mut output).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("id,account,amount,kind,description,created_at"));
        assert!(output.contains(",bea,1000,deposit,Wallet deposit,"));
        assert!(engine.transaction_log().drain_feed().is_empty());
    }
}
