use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use easyfolio_api::{AppConfig, AppState};
use easyfolio_brokerage::{BrokerageConfig, EasyEquitiesClient};
use colored::{ColoredString, Colorize};
use easyfolio_core::analytics::compute_profit_loss;
use easyfolio_core::*;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "easyfolio")]
#[command(about = "EasyEquities portfolio API server and command-line client")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// EasyEquities username
    #[arg(long, env = "EASYEQUITIES_USERNAME", hide_env_values = true)]
    username: Option<String>,

    /// EasyEquities password
    #[arg(long, env = "EASYEQUITIES_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// EasyEquities platform URL
    #[arg(long, env = "EASYEQUITIES_BASE_URL", default_value = "https://platform.easyequities.io")]
    base_url: String,

    /// Timeout for each request to the platform, in seconds
    #[arg(long, default_value = "30")]
    upstream_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Server {
        /// Bind address
        #[arg(short, long, default_value = "0.0.0.0:8000")]
        bind: String,

        /// Treat ',' in currency values as an error instead of a thousands separator
        #[arg(long, env = "EASYFOLIO_STRICT_CURRENCY")]
        strict_currency: bool,
    },

    /// Account operations
    Accounts {
        #[command(subcommand)]
        command: AccountCommands,
    },

    /// Instrument operations
    Instruments {
        #[command(subcommand)]
        command: InstrumentCommands,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// List all accounts
    List,
    /// Show account valuations
    Valuations {
        #[arg(short, long)]
        account_id: String,
    },
    /// Show account transactions
    Transactions {
        #[arg(short, long)]
        account_id: String,
    },
    /// Show account holdings
    Holdings {
        #[arg(short, long)]
        account_id: String,

        /// Include share counts
        #[arg(short = 's', long)]
        include_shares: bool,
    },
    /// Show profit/loss per holding (all accounts unless one is given)
    ProfitLoss {
        #[arg(short, long)]
        account_id: Option<String>,
    },
}

#[derive(Subcommand)]
enum InstrumentCommands {
    /// Show historical prices
    Prices {
        /// Contract code (e.g. EQU.ZA.SYGJP)
        contract_code: String,

        /// Time period (ONE_MONTH, THREE_MONTHS, SIX_MONTHS, ONE_YEAR, MAX)
        #[arg(short, long, default_value = "ONE_MONTH")]
        period: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the variables may come from the environment.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let client = connect(&cli).await?;

    match cli.command {
        Commands::Server {
            bind,
            strict_currency,
        } => {
            let config = AppConfig {
                separator_policy: if strict_currency {
                    SeparatorPolicy::SpacesOnly
                } else {
                    SeparatorPolicy::SpacesAndCommas
                },
            };
            easyfolio_api::start_server(AppState::new(Arc::new(client), config), &bind).await?;
        }
        Commands::Accounts { command } => match command {
            AccountCommands::List => {
                println!("\nAvailable Accounts:");
                for account in client.accounts().await? {
                    println!("- {} (ID: {})", account.name, account.id);
                }
            }
            AccountCommands::Valuations { account_id } => {
                println!("\nAccount Valuations:");
                print_json(&client.valuations(&account_id).await?)?;
            }
            AccountCommands::Transactions { account_id } => {
                println!("\nAccount Transactions:");
                print_json(&client.transactions(&account_id).await?)?;
            }
            AccountCommands::Holdings {
                account_id,
                include_shares,
            } => {
                let mut holdings = client.holdings(&account_id).await?;
                if !include_shares {
                    holdings.iter_mut().for_each(|h| h.shares = None);
                }
                println!("\nAccount Holdings:");
                print_json(&holdings)?;
            }
            AccountCommands::ProfitLoss { account_id } => {
                show_profit_loss(&client, account_id.as_deref()).await?;
            }
        },
        Commands::Instruments { command } => match command {
            InstrumentCommands::Prices {
                contract_code,
                period,
            } => {
                let period: Period = period.parse()?;
                let prices = client.historical_prices(&contract_code, period).await?;
                println!("\nHistorical Prices for {} ({}):", contract_code, period.upstream_value());
                print_json(&prices)?;
            }
        },
    }

    Ok(())
}

/// Sign in with the configured credentials.
async fn connect(cli: &Cli) -> Result<EasyEquitiesClient> {
    let (username, password) = match (cli.username.as_deref(), cli.password.as_deref()) {
        (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u, p),
        _ => bail!(
            "EASYEQUITIES_USERNAME and EASYEQUITIES_PASSWORD must be set in the environment or .env file"
        ),
    };

    let config = BrokerageConfig {
        base_url: cli.base_url.trim_end_matches('/').to_string(),
        timeout_secs: cli.upstream_timeout_secs,
    };
    tracing::debug!(base_url = %config.base_url, "Connecting to EasyEquities");
    Ok(EasyEquitiesClient::connect(config, username, password).await?)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn show_profit_loss(client: &dyn BrokerageClient, only_account: Option<&str>) -> Result<()> {
    let accounts = client.accounts().await?;

    for account in accounts
        .iter()
        .filter(|a| only_account.map_or(true, |id| a.id == id))
    {
        println!("\n# {}", account.name);
        let mut holdings = match client.holdings(&account.id).await {
            Ok(holdings) => holdings,
            Err(e) => {
                println!("Error fetching holdings for account {}: {}\n", account.name, e);
                continue;
            }
        };
        println!("Found {} holdings", holdings.len());
        holdings.sort_by_key(|h| h.name.to_lowercase());

        let policy = SeparatorPolicy::SpacesAndCommas;
        let mut valued = Vec::with_capacity(holdings.len());

        for holding in holdings {
            let perf = match compute_profit_loss(std::slice::from_ref(&holding), policy) {
                Ok(perf) => perf,
                Err(e) => {
                    println!("- {}: Error processing holding: {}", holding.name, e);
                    continue;
                }
            };

            println!(
                "- {}: Valuation: {}, {}",
                holding.name,
                format_currency(perf.currency, perf.total_current_value),
                coloured_change(
                    perf.currency,
                    perf.total_profit_loss,
                    perf.total_profit_loss_percentage
                )
            );
            valued.push(holding);
        }

        match compute_profit_loss(&valued, policy) {
            Ok(totals) if totals.total_purchase_value > Decimal::ZERO => println!(
                "\nTotal for {}: {}",
                account.name,
                coloured_change(
                    totals.currency,
                    totals.total_profit_loss,
                    totals.total_profit_loss_percentage
                )
            ),
            Ok(_) => {}
            Err(e) => println!("\nTotal for {}: {}", account.name, e),
        }
    }

    Ok(())
}

/// Gains in green, losses in red.
fn coloured_change(currency: char, amount: Decimal, percentage: Decimal) -> ColoredString {
    let text = signed_change(currency, amount, percentage);
    if amount >= Decimal::ZERO {
        text.green()
    } else {
        text.red()
    }
}

/// `+R12.00 (4.00%)` / `-R3.50 (-1.20%)`.
fn signed_change(currency: char, amount: Decimal, percentage: Decimal) -> String {
    let sign = if amount >= Decimal::ZERO { '+' } else { '-' };
    format!(
        "{}{} ({:.2}%)",
        sign,
        format_currency(currency, amount.abs()),
        percentage.round_dp(2)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signed_change() {
        assert_eq!(signed_change('R', dec!(12), dec!(4)), "+R12.00 (4.00%)");
        assert_eq!(signed_change('$', dec!(-3.5), dec!(-1.2)), "-$3.50 (-1.20%)");
    }

    #[test]
    fn test_coloured_change_keeps_text() {
        let loss = coloured_change('R', dec!(-2), dec!(-50));
        assert_eq!(&*loss, "-R2.00 (-50.00%)");
        assert_eq!(loss.fgcolor(), Some(colored::Color::Red));

        let gain = coloured_change('R', dec!(3), dec!(1));
        assert_eq!(gain.fgcolor(), Some(colored::Color::Green));
    }

    #[test]
    fn test_cli_parses_include_shares() {
        let cli = Cli::try_parse_from(["easyfolio", "accounts", "holdings", "-a", "42", "-s"]).unwrap();
        match cli.command {
            Commands::Accounts {
                command:
                    AccountCommands::Holdings {
                        account_id,
                        include_shares,
                    },
            } => {
                assert_eq!(account_id, "42");
                assert!(include_shares);
            }
            _ => panic!("Expected holdings command"),
        }
    }

    #[test]
    fn test_cli_parses_profit_loss_without_account() {
        let cli = Cli::try_parse_from(["easyfolio", "accounts", "profit-loss"]).unwrap();
        match cli.command {
            Commands::Accounts {
                command: AccountCommands::ProfitLoss { account_id },
            } => assert!(account_id.is_none()),
            _ => panic!("Expected profit-loss command"),
        }
    }

    #[test]
    fn test_cli_period_defaults_to_one_month() {
        let cli = Cli::try_parse_from(["easyfolio", "instruments", "prices", "EQU.ZA.SYGJP"]).unwrap();
        match cli.command {
            Commands::Instruments {
                command: InstrumentCommands::Prices { period, .. },
            } => assert_eq!(period.parse::<Period>(), Ok(Period::OneMonth)),
            _ => panic!("Expected prices command"),
        }
    }
}
