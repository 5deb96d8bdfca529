use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use finhub_core::calc;
use finhub_core::config::Settings;
use finhub_core::portfolio::Portfolio;
use finhub_core::services::Services;
use finhub_core::time::local_today;

#[derive(Debug, Parser)]
#[command(name = "finhub", about = "Finance dashboard from the terminal")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// FX and crypto quotes.
    Market,
    /// Translated business headlines.
    News,
    /// Economic events for the coming week.
    Calendar,
    /// Explain a financial term.
    Term { term: String },
    #[command(subcommand)]
    Calc(CalcCommand),
    Portfolio {
        /// JSON file holding the asset list.
        #[arg(long, default_value = "portfolio.json")]
        store: PathBuf,
        #[command(subcommand)]
        action: PortfolioCommand,
    },
}

/// Rates are percentages (7 means 7%).
#[derive(Debug, Subcommand)]
enum CalcCommand {
    Compound {
        #[arg(long)]
        principal: f64,
        #[arg(long)]
        rate: f64,
        #[arg(long)]
        years: f64,
    },
    Mortgage {
        #[arg(long)]
        principal: f64,
        #[arg(long)]
        rate: f64,
        #[arg(long)]
        years: f64,
    },
    Roi {
        #[arg(long)]
        initial: f64,
        #[arg(long = "final")]
        final_value: f64,
    },
    Cagr {
        #[arg(long)]
        initial: f64,
        #[arg(long = "final")]
        final_value: f64,
        #[arg(long)]
        years: f64,
    },
    Retirement {
        #[arg(long)]
        monthly_expense: f64,
    },
}

#[derive(Debug, Subcommand)]
enum PortfolioCommand {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: f64,
        #[arg(long, default_value_t = 1.0)]
        quantity: f64,
    },
    Remove { id: String },
    Total,
    /// Ask the model for a short review of the holdings.
    Analyze,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    tracing::debug!(command = ?args.command, "running");
    if let Err(err) = run(args.command, &settings).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "command failed");
        return Err(err);
    }
    Ok(())
}

async fn run(command: Command, settings: &Settings) -> anyhow::Result<()> {
    match command {
        Command::Market => {
            let snap = Services::from_settings(settings)?.market.snapshot().await;
            print_json(&snap)
        }
        Command::News => {
            let feed = Services::from_settings(settings)?
                .news
                .latest(local_today())
                .await;
            print_json(&feed)
        }
        Command::Calendar => {
            let snap = Services::from_settings(settings)?
                .calendar
                .upcoming(local_today())
                .await;
            print_json(&snap)
        }
        Command::Term { term } => {
            let lookup = Services::from_settings(settings)?.glossary.lookup(&term).await;
            print_json(&lookup.into_answer(&term))
        }
        Command::Calc(calc) => run_calc(calc),
        Command::Portfolio { store, action } => run_portfolio(&store, action, settings).await,
    }
}

fn run_calc(command: CalcCommand) -> anyhow::Result<()> {
    let (label, value) = match command {
        CalcCommand::Compound {
            principal,
            rate,
            years,
        } => (
            "future value",
            calc::compound_growth(principal, rate / 100.0, years),
        ),
        CalcCommand::Mortgage {
            principal,
            rate,
            years,
        } => (
            "monthly payment",
            calc::mortgage_monthly_payment(principal, rate / 100.0, years),
        ),
        CalcCommand::Roi {
            initial,
            final_value,
        } => ("ROI %", calc::roi(initial, final_value).map(|r| r * 100.0)),
        CalcCommand::Cagr {
            initial,
            final_value,
            years,
        } => (
            "CAGR %",
            calc::cagr(initial, final_value, years).map(|r| r * 100.0),
        ),
        CalcCommand::Retirement { monthly_expense } => (
            "retirement target",
            calc::retirement_target(monthly_expense),
        ),
    };
    let value = value.context("all inputs must be positive numbers")?;
    println!("{label}: {value:.2}");
    Ok(())
}

async fn run_portfolio(
    store: &Path,
    action: PortfolioCommand,
    settings: &Settings,
) -> anyhow::Result<()> {
    let mut portfolio = load_portfolio(store)?;
    match action {
        PortfolioCommand::List => {
            if portfolio.is_empty() {
                println!("no assets in {}", store.display());
            }
            for asset in portfolio.list() {
                println!(
                    "{}\t{}\t{:.2} x {}",
                    asset.id, asset.name, asset.price, asset.quantity
                );
            }
        }
        PortfolioCommand::Add {
            name,
            price,
            quantity,
        } => {
            let id = portfolio.add(&name, price, quantity)?.id.clone();
            save_portfolio(store, &portfolio)?;
            tracing::info!(%id, name = %name, store = %store.display(), "asset added");
            println!("added {id}");
        }
        PortfolioCommand::Remove { id } => {
            let removed = portfolio
                .remove(&id)
                .with_context(|| format!("no asset with id {id}"))?;
            save_portfolio(store, &portfolio)?;
            tracing::info!(%id, name = %removed.name, store = %store.display(), "asset removed");
            println!("removed {}", removed.name);
        }
        PortfolioCommand::Total => println!("total cost: {:.2}", portfolio.total_cost()),
        PortfolioCommand::Analyze => {
            let services = Services::from_settings(settings)?;
            println!("{}", services.advisor.analyze(portfolio.list()).await?);
        }
    }
    Ok(())
}

fn load_portfolio(path: &Path) -> anyhow::Result<Portfolio> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Portfolio::from_json(&raw).with_context(|| format!("reading {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no portfolio file yet; starting empty");
            Ok(Portfolio::new())
        }
        Err(e) => Err(e).with_context(|| format!("open {} failed", path.display())),
    }
}

fn save_portfolio(path: &Path, portfolio: &Portfolio) -> anyhow::Result<()> {
    std::fs::write(path, portfolio.to_json()?)
        .with_context(|| format!("write {} failed", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
