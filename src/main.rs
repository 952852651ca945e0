//! `fa-gateway`: sends one request to the XML gateway and prints the reply as JSON.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `CONFIG` names the JSON configuration file (default `config.json`)
//! - `RUST_LOG` controls log verbosity; logs go to stderr

mod telemetry;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use serde::Serialize;
use std::path::PathBuf;

use first_american_xml::config::GatewayConfig;
use first_american_xml::gateway::Gateway;
use first_american_xml::operation::Operation;
use first_american_xml::xml::RequestFields;

#[derive(Parser, Debug)]
#[command(name = "fa-gateway")]
#[command(about = "Send transactions to the First American XML gateway")]
struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send any operation with the given fields
    Send {
        /// Operation name, e.g. `sale`, `settle` or `cim_sale_and_save`
        operation: Operation,
        /// Request fields as KEY=VALUE
        #[arg(value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Search the transaction database
    Query {
        #[arg(value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Void transactions by reference number
    Void {
        #[arg(required = true)]
        reference_numbers: Vec<String>,
    },
    /// Look up a stored customer
    CimQuery { cim_ref_num: String },
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    telemetry::init();

    let cli_args = CliArgs::parse();
    let config = GatewayConfig::load_from_path(&cli_args.config)?;
    tracing::info!(api_url = %config.api_url(), "Using gateway");
    let gateway = Gateway::new(&config);

    match cli_args.command {
        Command::Send { operation, fields } => {
            let fields: RequestFields = fields.into_iter().collect();
            match operation.batch_layout() {
                Some(layout) => print_json(&gateway.send_batch(operation, fields, layout).await?)?,
                None => print_json(&gateway.send(operation, fields).await?)?,
            }
        }
        Command::Query { fields } => {
            let fields: RequestFields = fields.into_iter().collect();
            print_json(&gateway.query(fields).await?)?;
        }
        Command::Void { reference_numbers } => {
            print_json(&gateway.void(reference_numbers).await?)?;
        }
        Command::CimQuery { cim_ref_num } => {
            print_json(&gateway.cim_query(&cim_ref_num).await?)?;
        }
    }

    Ok(())
}
