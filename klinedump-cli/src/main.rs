//! klinedump CLI: mirror public market-data archives into a local tree.
//!
//! Commands:
//! - `dump`: plan and fetch missing archives for one or more tickers
//! - `plan`: print what `dump` would fetch for one ticker, as JSON
//! - `delete-outdated`: delete daily files already covered by monthly files
//! - `list tickers|periods`: show the local inventory
//! - `path`: print the local path of one period
//! - `inspect`: summarize a local kline file

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use klinedump_core::domain::{parse_day, AssetClass, DataType, Frequency, Granularity, Period};
use klinedump_core::kline::{read_klines, summarize};
use klinedump_core::logging::LogContext;
use klinedump_runner::{DumpOptions, Dumper, DumperConfig};

#[derive(Parser)]
#[command(name = "klinedump", about = "Incremental mirror of Binance public data archives")]
struct Cli {
    /// TOML config file; flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug output on stdout.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(flatten)]
    dataset: DatasetArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DatasetArgs {
    /// Local root for the asset class.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// spot, um or cm.
    #[arg(long, global = true)]
    asset_class: Option<AssetClass>,

    /// aggTrades, klines, trades, indexPriceKlines, markPriceKlines, premiumIndexKlines or metrics.
    #[arg(long, global = true)]
    data_type: Option<DataType>,

    /// Candle interval for kline data types (1m, 1h, 1d, ...).
    #[arg(long, global = true)]
    frequency: Option<Frequency>,
}

#[derive(Args)]
struct RangeArgs {
    /// First day (YYYY-MM-DD). Defaults to the earliest published day.
    #[arg(long, value_parser = parse_day)]
    start: Option<NaiveDate>,

    /// Last day (YYYY-MM-DD). Defaults to yesterday (UTC).
    #[arg(long, value_parser = parse_day)]
    end: Option<NaiveDate>,

    /// Re-download periods already present locally.
    #[arg(long, default_value_t = false)]
    update_existing: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan and fetch missing archives.
    Dump {
        /// Tickers to dump. Without any, every listed symbol in the quote asset.
        tickers: Vec<String>,

        #[command(flatten)]
        range: RangeArgs,

        /// Quote asset used for discovery.
        #[arg(long)]
        quote_asset: Option<String>,

        /// Tickers to skip.
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,

        /// Upper bound on the number of tickers.
        #[arg(long)]
        max_tickers: Option<usize>,

        /// Worker threads across tickers.
        #[arg(long)]
        threads: Option<usize>,

        /// Prune superseded daily files afterwards.
        #[arg(long, default_value_t = false)]
        delete_outdated: bool,

        /// Print the summary as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the fetch plan for one ticker without downloading anything.
    Plan {
        ticker: String,

        #[command(flatten)]
        range: RangeArgs,
    },
    /// Delete daily files whose month is present as a monthly file.
    DeleteOutdated,
    /// Local inventory.
    List {
        #[command(subcommand)]
        what: ListCommand,
    },
    /// Local path of one period (YYYY-MM or YYYY-MM-DD).
    Path {
        ticker: String,
        #[arg(value_parser = Period::parse)]
        period: Period,
    },
    /// Summarize a local kline CSV file.
    Inspect { file: PathBuf },
}

#[derive(Subcommand)]
enum ListCommand {
    /// Tickers with local data.
    Tickers {
        #[arg(long, default_value = "daily")]
        granularity: Granularity,
    },
    /// Periods present locally for one ticker.
    Periods {
        ticker: String,
        #[arg(long, default_value = "daily")]
        granularity: Granularity,
    },
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => DumperConfig::load(path)?,
        None => DumperConfig::default(),
    };
    apply_dataset_args(&mut config, &cli.dataset);
    if cli.verbose {
        config.logging.verbose = true;
    }

    match cli.command {
        Commands::Dump {
            tickers,
            range,
            quote_asset,
            exclude,
            max_tickers,
            threads,
            delete_outdated,
            json,
        } => {
            if let Some(quote) = quote_asset {
                config.quote_asset = quote;
            }
            if !exclude.is_empty() {
                config.exclude = exclude;
            }
            config.max_tickers = max_tickers.or(config.max_tickers);
            config.threads = threads.or(config.threads);
            config.delete_outdated |= delete_outdated;
            let opts = DumpOptions {
                tickers: (!tickers.is_empty()).then_some(tickers),
                ..range_options(&range)
            };
            run_dump(config, &opts, json)
        }
        Commands::Plan { ticker, range } => {
            let dumper = build(config)?;
            let plan = dumper.plan(&ticker, &range_options(&range))?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::DeleteOutdated => {
            let dumper = build(config)?;
            let deletion = dumper.delete_outdated_daily()?;
            for (ticker, count) in &deletion.deleted {
                println!("{ticker}: {count} daily files deleted");
            }
            for (path, reason) in &deletion.failed {
                eprintln!("could not delete {}: {reason}", path.display());
            }
            Ok(exit_code(deletion.failed.is_empty()))
        }
        Commands::List { what } => {
            let dumper = build_offline(config)?;
            match what {
                ListCommand::Tickers { granularity } => {
                    for ticker in dumper.list_local_tickers(granularity)? {
                        println!("{ticker}");
                    }
                }
                ListCommand::Periods { ticker, granularity } => {
                    for period in dumper.list_local_periods(&ticker, granularity)? {
                        println!("{period}");
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Path { ticker, period } => {
            let dumper = build_offline(config)?;
            println!("{}", dumper.local_path_for(&ticker, period)?.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Inspect { file } => {
            let rows = read_klines(&file)?;
            match summarize(&rows) {
                Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                None => bail!("{} holds no rows", file.display()),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn apply_dataset_args(config: &mut DumperConfig, args: &DatasetArgs) {
    if let Some(asset_class) = args.asset_class {
        config.asset_class = asset_class;
        // The default root follows the asset class unless one is given.
        if args.root.is_none() && config.root == DumperConfig::default().root {
            config.root = PathBuf::from("data").join(asset_class.as_str());
        }
    }
    if let Some(root) = &args.root {
        config.root = root.clone();
    }
    if let Some(data_type) = args.data_type {
        config.data_type = data_type;
    }
    if let Some(frequency) = args.frequency {
        config.frequency = frequency;
    }
}

fn range_options(range: &RangeArgs) -> DumpOptions {
    DumpOptions {
        tickers: None,
        date_start: range.start,
        date_end: range.end,
        update_existing: range.update_existing.then_some(true),
    }
}

fn init_logging(config: &DumperConfig) -> Result<LogContext> {
    let mut logging = config.logging.clone();
    if logging.log_dir.is_none() {
        logging.log_dir = config.root.parent().map(|p| p.to_path_buf());
    }
    Ok(LogContext::init(&logging)?.clone())
}

fn build(config: DumperConfig) -> Result<Dumper> {
    let log = init_logging(&config)?;
    Dumper::from_config(config, log).context("failed to set up the dumper")
}

/// Local-only commands log to stdout only.
fn build_offline(config: DumperConfig) -> Result<Dumper> {
    let mut logging = config.logging.clone();
    logging.log_dir = None;
    let log = LogContext::init(&logging)?.clone();
    Dumper::from_config(config, log).context("failed to set up the dumper")
}

fn run_dump(config: DumperConfig, opts: &DumpOptions, json: bool) -> Result<ExitCode> {
    let dumper = build(config)?;
    let summary = dumper.plan_and_fetch(opts)?;

    let statistics = summary.statistics();
    if json {
        println!("{}", serde_json::to_string_pretty(&statistics)?);
    } else {
        statistics.log();
    }

    for (ticker, err) in &summary.failures {
        eprintln!("{ticker}: {err}");
    }
    for (ticker, report) in &summary.reports {
        for failed in &report.failed {
            eprintln!("{ticker}: {} failed: {}", failed.archive, failed.error);
        }
    }
    if let Some(deletion) = &summary.deletion {
        tracing::info!("{} outdated daily files deleted", deletion.total_deleted());
    }
    Ok(exit_code(summary.all_succeeded()))
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
