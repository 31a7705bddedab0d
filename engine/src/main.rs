// Engine main entry point: analyse a batch of symbols replayed from CSV files
use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use engine::config::settings::EngineSettings;
use engine::data::session::CsvReplaySession;
use engine::services::autofib_service::AutoFibService;
use engine::services::report;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "autofib", about = "Automatic Fibonacci retracement signals")]
struct Cli {
    /// JSON settings file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding one <SYMBOL>.csv per symbol
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Comma-separated symbols
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,

    #[arg(long)]
    bars_back: Option<usize>,

    #[arg(long)]
    start_bar: Option<usize>,

    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Write one JSON result per symbol here
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[arg(long, default_value_t = ',')]
    delimiter: char,
}

impl Cli {
    fn settings(&self) -> anyhow::Result<EngineSettings> {
        let mut settings = match &self.config {
            Some(path) => EngineSettings::load_from_file(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            None => EngineSettings::default(),
        };
        if !self.symbols.is_empty() {
            settings.symbols = self.symbols.clone();
        }
        if let Some(bars_back) = self.bars_back {
            settings.fibonacci.bars_back = bars_back;
        }
        if let Some(start_bar) = self.start_bar {
            settings.fibonacci.start_bar = start_bar;
        }
        if let Some(timeout) = self.timeout_secs {
            settings.session.acquisition_timeout_secs = timeout;
        }
        if self.output_dir.is_some() {
            settings.output_dir = self.output_dir.clone();
        }
        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = cli.settings()?;
    if !cli.delimiter.is_ascii() {
        anyhow::bail!("delimiter must be a single ASCII character");
    }

    info!(
        symbols = ?settings.symbols,
        data_dir = %cli.data_dir.display(),
        "Starting Auto Fibonacci run"
    );

    let session =
        Arc::new(CsvReplaySession::new(cli.data_dir.clone()).with_delimiter(cli.delimiter as u8));
    let service = Arc::new(AutoFibService::new(session, &settings));
    let outcomes = service.run_batch(settings.symbols.clone()).await;

    for outcome in &outcomes {
        let now = Utc::now();
        match &outcome.result {
            Ok(result) => {
                print!("{}", report::render_text(&outcome.symbol, result, now));
                if let Some(dir) = &settings.output_dir {
                    let json = report::render_json(&outcome.symbol, result, now)?;
                    if let Err(e) = report::save_json(dir, &outcome.symbol, &json, now) {
                        error!(
                            symbol = %outcome.symbol,
                            error_detail = %e,
                            "Could not persist result"
                        );
                    }
                }
            }
            Err(e) => println!("Error analyzing {}: {}", outcome.symbol, e),
        }
    }

    let failures = outcomes.iter().filter(|outcome| outcome.is_failure()).count();
    info!(total = outcomes.len(), failures, "Done");
    if !outcomes.is_empty() && failures == outcomes.len() {
        anyhow::bail!("no symbol could be analysed ({} failed)", failures);
    }
    Ok(())
}
