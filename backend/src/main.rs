//! IPQS validation CLI - validate contact list email addresses
//!
//! # Commands
//!
//! ```bash
//! ipqs-validation inspect leads.xlsx                    # Email column, duplicates
//! ipqs-validation validate leads.xlsx --account acme    # Full run, writes downloads
//! ipqs-validation status 994454                         # Status of one job
//! ipqs-validation history --account acme                # Prior batches for an account
//! ipqs-validation serve                                 # Start HTTP server (port 3000)
//! ```
//!
//! Every command except `inspect` reads its settings from the environment
//! (`.env` is loaded if present).

use clap::{Parser, Subcommand, ValueEnum};
use ipqs_validation::{
    api::types::PreviewResponse,
    audit::sink_from_settings,
    export::{session_downloads, write_csv},
    fetch_history, load_file, run,
    server::{start_server, AppState},
    validation::excerpt_table,
    ExportFormat, IpqsClient, JobStatus, Phase, Settings, StatusResponse, ValidationApi, ValidationSession,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ipqs-validation")]
#[command(about = "Validate contact list email addresses through IPQS bulk validation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Xlsx,
    Csv,
}

impl From<OutputFormat> for ExportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Xlsx => ExportFormat::Xlsx,
            OutputFormat::Csv => ExportFormat::Csv,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Load a file and report its email column and duplicates
    Inspect {
        /// Input CSV or XLSX file
        input: PathBuf,

        /// Write the preview as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Full run: dedupe, submit, poll, label, write downloads
    Validate {
        /// Input CSV or XLSX file
        input: PathBuf,

        /// Account name (batch name prefix)
        #[arg(short, long)]
        account: String,

        /// Directory for the generated files
        #[arg(short = 'd', long, default_value = ".")]
        out_dir: PathBuf,

        /// Output file format
        #[arg(short, long, value_enum, default_value = "xlsx")]
        format: OutputFormat,

        /// Give up after this many polls (0 = never), overrides the environment
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Delay between polls in milliseconds, overrides the environment
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Save the final session as JSON
        #[arg(long)]
        session: Option<PathBuf>,
    },

    /// Show the status of a submitted job
    Status {
        /// Job (CSV) id
        job_id: String,
    },

    /// List prior batches for an account and fetch finished results
    History {
        /// Account name (batch name prefix)
        #[arg(short, long)]
        account: String,

        /// Write finished results as CSV files into this directory
        #[arg(short = 'd', long)]
        out_dir: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect { input, output } => cmd_inspect(&input, output.as_deref()),

        Commands::Validate {
            input,
            account,
            out_dir,
            format,
            max_attempts,
            interval_ms,
            session,
        } => {
            cmd_validate(
                &input,
                &account,
                &out_dir,
                format.into(),
                max_attempts,
                interval_ms,
                session.as_deref(),
            )
            .await
        }

        Commands::Status { job_id } => cmd_status(&job_id).await,

        Commands::History { account, out_dir } => cmd_history(&account, out_dir.as_deref()).await,

        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("upload.csv")
        .to_string()
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn cmd_inspect(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Inspecting: {}", input.display());

    let loaded = load_file(input)?;
    let preview = PreviewResponse::new(&file_name(input), &loaded);

    if let Some(ref encoding) = loaded.encoding {
        eprintln!("   Encoding: {}", encoding);
    }
    if let Some(d) = loaded.delimiter {
        eprintln!("   Delimiter: '{}'", format_delimiter(d));
    }
    eprintln!("   Rows: {}", preview.row_count);
    eprintln!("   Columns: {}", preview.columns.join(", "));

    match preview.email_column {
        Some(ref column) => eprintln!("   Email column: {}", column),
        None => eprintln!("   ⚠️  No email column found (expected one of: Work Email, Email, Email Address)"),
    }

    if !preview.duplicates.is_empty() {
        eprintln!(
            "\n⚠️  Total {} duplicate email addresses found:",
            preview.duplicates.rows.len()
        );
        for row in preview.duplicates.rows.iter().take(20) {
            eprintln!("   {:>5}  {}", row.index, row.email);
        }
    }
    eprintln!("\n📊 {} unique email addresses to submit", preview.unique_emails);

    if let Some(path) = output {
        fs::write(path, serde_json::to_string_pretty(&preview)?)?;
        eprintln!("💾 Preview written to: {}", path.display());
    }

    Ok(())
}

async fn cmd_validate(
    input: &Path,
    account: &str,
    out_dir: &Path,
    format: ExportFormat,
    max_attempts: Option<u32>,
    interval_ms: Option<u64>,
    session_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    let client = IpqsClient::from_settings(&settings)?;
    let audit = sink_from_settings(&settings)?;

    let mut policy = settings.poll;
    if let Some(max) = max_attempts {
        policy.max_attempts = (max > 0).then_some(max);
    }
    if let Some(ms) = interval_ms {
        policy.interval = Duration::from_millis(ms);
    }

    eprintln!("📄 Processing: {}", input.display());
    let name = file_name(input);
    let loaded = load_file(input)?;
    let session = ValidationSession::prepare(account, &name, &loaded)?;
    eprintln!("   Batch: {}", session.batch_name);
    eprintln!("   Rows: {} ({} unique emails)", session.table.len(), session.batch.len());

    let session = run(&client, audit.as_ref(), session, &policy).await?;

    if let Some(path) = session_path {
        fs::write(path, serde_json::to_string_pretty(&session)?)?;
        eprintln!("💾 Session saved to: {}", path.display());
    }

    let downloads = session_downloads(&session, chrono::Local::now().date_naive(), format)?;
    if !downloads.is_empty() {
        fs::create_dir_all(out_dir)?;
    }
    for download in &downloads {
        let path = out_dir.join(&download.file_name);
        fs::write(&path, &download.bytes)?;
        eprintln!("💾 Saved: {}", path.display());
    }

    match &session.phase {
        Phase::Finished { .. } if session.is_success() => {
            eprintln!("\n✨ Done!");
            Ok(())
        }
        Phase::Finished { .. } => match &session.result_error {
            Some(e) => Err(format!("job finished but results could not be downloaded: {}", e).into()),
            None => Err("job finished without a result file".into()),
        },
        Phase::Failed { reason } => Err(reason.clone().into()),
        Phase::TimedOut { attempts } => Err(format!("no terminal status after {} polls", attempts).into()),
        phase => Err(format!("run stopped while {}", phase).into()),
    }
}

async fn cmd_status(job_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    let client = IpqsClient::from_settings(&settings)?;

    let response: StatusResponse = client.poll_status(job_id).await?;
    if !response.success {
        return Err(format!("status check rejected: {}", response.message).into());
    }

    let status = response.status.clone().unwrap_or_else(|| JobStatus::Unknown(String::new()));
    let (message, percent) = status.progress();
    println!("🔎 Job {}: {} [{}%]", job_id, status, percent);
    println!("   {}", message);
    if let Some(link) = response.download_link() {
        println!("   Download: {}", link);
    }

    Ok(())
}

async fn cmd_history(account: &str, out_dir: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    let client = IpqsClient::from_settings(&settings)?;

    let entries = fetch_history(&client, account).await?;

    for entry in &entries {
        println!("{:<12} {:<16} {}", entry.csv_id, entry.status.as_str(), entry.file_name);
    }

    if let Some(dir) = out_dir {
        fs::create_dir_all(dir)?;
        for (csv_id, records) in entries
            .iter()
            .filter_map(|e| e.records.as_ref().map(|r| (&e.csv_id, r)))
        {
            let path = dir.join(format!("{}.csv", csv_id));
            fs::write(&path, write_csv(&excerpt_table(records))?)?;
            eprintln!("💾 Saved: {}", path.display());
        }
    }

    Ok(())
}

async fn cmd_serve(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    let state = AppState::from_settings(&settings)?;
    start_server(port, state).await
}
