mod cli;
mod config;
mod errors;
mod processing;

use clap::Parser;
use std::io::Write;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::Config;
use errors::CliError;

#[cfg(target_os = "windows")]
use mimalloc::MiMalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> std::result::Result<(), CliError> {
    // Logs go to stderr, stdout is reserved for the report.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Cli::parse();

    let conf = std::fs::File::open(&args.config).map_err(|e| CliError::Io {
        source: e.to_string(),
        path: Some(args.config.to_string_lossy().to_string()),
    })?;
    let mut config: Config =
        serde_json::from_reader(conf).map_err(|e| CliError::ParseError { msg: e.to_string() })?;

    if let Some(input) = args.input {
        config.input = Some(input);
    }
    let Some(input) = config.input.clone() else {
        return Err(CliError::Config {
            source: "No input provided, please provide one in either the config file or with the --input flag".to_string(),
        });
    };
    config.validate()?;
    info!("Parsed configuration: {:#?}", config);

    let st = std::time::Instant::now();
    let records = processing::read_traces(&input)?;
    info!(
        "Loaded {} traces from {} in {:?}",
        records.len(),
        input.display(),
        st.elapsed()
    );

    let report = processing::process(records, &config)?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    let written = if args.pretty {
        serde_json::to_writer_pretty(&mut handle, &report)
    } else {
        serde_json::to_writer(&mut handle, &report)
    };
    written.map_err(|e| CliError::ParseError { msg: e.to_string() })?;
    writeln!(handle).map_err(|e| CliError::Io {
        source: e.to_string(),
        path: None,
    })?;
    Ok(())
}
