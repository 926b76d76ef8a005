//! AgriTrace command-line tools
//!
//! `predict` runs the harvest prediction heuristic over a JSON request read
//! from a file or stdin. `wallet` queries and funds the configured AgriPay
//! wallet.

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use agritrace_backend::config::Config;
use agritrace_backend::external::agripay::{
    AgriPayClient, PaymentGateway, PurchaseRequest, TopUpRequest, TransactionQuery,
};
use agritrace_backend::services::prediction;
use agritrace_backend::telemetry;
use shared::{validate_condition_readings, validate_positive, PredictionRequest};

#[derive(Parser)]
#[command(name = "agritrace-predict", about = "AgriTrace harvest prediction and wallet tools")]
struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Predict a harvest date from a JSON request
    Predict {
        /// Request file; reads stdin when omitted or "-"
        input: Option<PathBuf>,

        /// Evaluation date (YYYY-MM-DD); defaults to the request's as_of, then today
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Query or fund the AgriPay wallet
    Wallet {
        #[command(subcommand)]
        command: WalletCommand,
    },
}

#[derive(Subcommand)]
enum WalletCommand {
    /// Show the wallet balance
    Balance,
    /// List recent wallet transactions
    Transactions {
        /// Filter by type (topup, purchase, withdraw)
        #[arg(long = "type")]
        transaction_type: Option<String>,

        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Add funds to the wallet
    Topup {
        #[arg(long)]
        amount: Decimal,

        #[arg(long)]
        description: Option<String>,
    },
    /// Withdraw funds from the wallet
    Withdraw {
        #[arg(long)]
        amount: Decimal,

        /// Wallet password
        #[arg(long, env = "AGRIPAY_PASSWORD")]
        password: String,
    },
}

fn positive_amount(amount: Decimal) -> anyhow::Result<Decimal> {
    validate_positive(amount).map_err(|msg| anyhow::anyhow!("Invalid amount: {}", msg))?;
    Ok(amount)
}

fn read_request(input: Option<PathBuf>) -> anyhow::Result<PredictionRequest> {
    let raw = match input {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("Invalid prediction request")
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::load().context("Failed to load configuration")?;
    telemetry::init(&config.logging);

    let opts = Opts::parse();
    match opts.command {
        Command::Predict {
            input,
            as_of,
            pretty,
        } => {
            let mut request = read_request(input)?;
            if let Some(conditions) = &request.conditions {
                validate_condition_readings(conditions)
                    .map_err(|e| anyhow::anyhow!("Invalid conditions: {}", e))?;
            }
            if as_of.is_some() {
                request.as_of = as_of;
            }

            let today = Utc::now().date_naive();
            let result = prediction::evaluate(&request, today, &config.prediction);
            tracing::info!(
                crop_type = %request.crop_type,
                predicted = %result.predicted_date,
                confidence = result.confidence,
                "Prediction complete"
            );
            print_json(&result, pretty)?;
        }
        Command::Wallet { command } => {
            let client = AgriPayClient::new(&config.agripay, None)
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            match command {
                WalletCommand::Balance => {
                    let balance = client
                        .get_balance()
                        .await
                        .map_err(|e| anyhow::anyhow!("Error getting balance: {}", e))?;
                    print_json(&balance, true)?;
                }
                WalletCommand::Transactions {
                    transaction_type,
                    limit,
                } => {
                    let query = TransactionQuery {
                        transaction_type,
                        limit,
                        ..Default::default()
                    };
                    let history = client
                        .get_transactions(&query)
                        .await
                        .map_err(|e| anyhow::anyhow!("Error getting transactions: {}", e))?;
                    print_json(&history, true)?;
                }
                WalletCommand::Topup {
                    amount,
                    description,
                } => {
                    let request = TopUpRequest {
                        amount: positive_amount(amount)?,
                        description,
                        reference: None,
                    };
                    let receipt = client
                        .topup(request)
                        .await
                        .map_err(|e| anyhow::anyhow!("Top-up failed: {}", e))?;
                    tracing::info!(amount = %amount, "Wallet topped up");
                    print_json(&receipt, true)?;
                }
                WalletCommand::Withdraw { amount, password } => {
                    let request = PurchaseRequest {
                        amount: positive_amount(amount)?,
                        password,
                        description: Some("AgriTrace wallet withdrawal".to_string()),
                        reference: None,
                    };
                    let receipt = client
                        .withdraw(request)
                        .await
                        .map_err(|e| anyhow::anyhow!("Withdrawal failed: {}", e))?;
                    tracing::info!(amount = %amount, "Wallet withdrawal made");
                    print_json(&receipt, true)?;
                }
            }
        }
    }

    Ok(())
}
