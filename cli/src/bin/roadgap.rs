use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use roadgap::{AnalysisConfig, Validator};
use roadgap_cli::{ConfigOverrides, issue_lines, resolve_config, severity_summary, write_corrected, write_report};
use std::{fs, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect endpoint gaps in a WKT road network
    Analyze {
        /// Text file containing LINESTRING geometries
        #[arg(short, long)]
        input: PathBuf,
        /// Analysis settings (.toml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Fractional digits used for node identity
        #[arg(long)]
        precision: Option<u32>,
        /// Expected share of outliers for the anomaly model
        #[arg(long)]
        contamination: Option<f64>,
        /// Write the network with all fixes applied to this file
        #[arg(long)]
        corrected: Option<PathBuf>,
        /// Write the full JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print the JSON schema of the configuration file
    Schema,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            config,
            precision,
            contamination,
            corrected,
            report,
        } => {
            let overrides = ConfigOverrides {
                precision,
                contamination,
            };
            let config = resolve_config(config.as_deref(), &overrides)?;
            let text = fs::read_to_string(&input)?;

            info!("Analyzing {}", input.display());
            let analysis = Validator::from_config(config)?.analyze(&text)?;

            for warning in &analysis.warnings {
                warn!("{}", warning);
            }
            for line in issue_lines(&analysis) {
                println!("{}", line);
            }
            println!("{}", severity_summary(&analysis));

            if let Some(path) = corrected {
                write_corrected(&analysis, &path)?;
                info!("Corrected network written to {}", path.display());
            }
            if let Some(path) = report {
                write_report(&analysis, &path)?;
                info!("Report written to {}", path.display());
            }
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&AnalysisConfig::schema())?);
        }
    }

    Ok(())
}
