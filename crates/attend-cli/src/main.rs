use anyhow::{bail, Context, Result};
use attend_core::report::{write_daily_csv, write_total_csv};
use attend_core::{DateRange, EnrollOutcome, IdentifyOutcome, NewIdentity, Report};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod encoder;
mod engine;

use config::Config;
use engine::spawn_engine;

const MIN_TOLERANCE: f32 = 0.30;
const MAX_TOLERANCE: f32 = 0.70;

#[derive(Parser)]
#[command(name = "attend", about = "Face recognition attendance and work-hour reports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll an employee from a face photo
    Enroll {
        /// Unique employee code
        #[arg(short, long)]
        code: String,
        /// Full name
        #[arg(short, long)]
        name: String,
        /// Department
        #[arg(short, long, default_value = "")]
        department: String,
        /// Photo containing the employee's face
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Identify faces and record attendance for each match
    Identify {
        /// Images to identify, processed in order
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Match tolerance (lower = stricter)
        #[arg(short, long, value_parser = parse_tolerance)]
        tolerance: Option<f32>,
    },
    /// List enrolled employees
    List,
    /// Remove an enrolled employee (their attendance history is kept)
    Remove {
        /// Employee id
        id: i64,
    },
    /// Daily and total work-hour report
    Report {
        /// First day, inclusive (YYYY-MM-DD); defaults to the first of this month
        #[arg(long)]
        start: Option<String>,
        /// Last day, inclusive (YYYY-MM-DD); defaults to today
        #[arg(long)]
        end: Option<String>,
        /// Ignore the default range and report every recorded day
        #[arg(long, conflicts_with_all = ["start", "end"])]
        all: bool,
        /// Write the daily table as CSV
        #[arg(long)]
        daily_csv: Option<PathBuf>,
        /// Write the per-employee totals as CSV
        #[arg(long)]
        total_csv: Option<PathBuf>,
    },
}

fn parse_tolerance(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|e| format!("{e}"))?;
    if !(MIN_TOLERANCE..=MAX_TOLERANCE).contains(&value) {
        return Err(format!("tolerance must be between {MIN_TOLERANCE:.2} and {MAX_TOLERANCE:.2}"));
    }
    Ok(value)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    tracing::debug!(
        data_dir = %config.data_dir.display(),
        db = %config.db_path.display(),
        encoder = %config.encoder_program,
        "configuration loaded"
    );

    // Validate report dates before touching the encoder or database.
    let range = match &cli.command {
        Commands::Report { start, end, all, .. } => Some(report_range(start, end, *all)?),
        _ => None,
    };

    let engine = spawn_engine(&config).context("failed to start attendance engine")?;

    match cli.command {
        Commands::Enroll {
            code,
            name,
            department,
            image,
        } => {
            let identity = NewIdentity::new(&code, &name, &department);
            match engine.enroll(identity, image).await? {
                EnrollOutcome::Enrolled { id } => println!("Enrolled {name} ({code}) as id {id}"),
                EnrollOutcome::NoFace => bail!("no face detected in the photo; try another image"),
                EnrollOutcome::DuplicateCode(code) => {
                    bail!("employee code {code} is already enrolled")
                }
            }
        }
        Commands::Identify { images, tolerance } => {
            let tolerance = tolerance.unwrap_or(config.tolerance);
            for image in images {
                let outcome = engine.identify(image.clone(), tolerance).await?;
                print_identify(&image, &outcome);
            }
        }
        Commands::List => {
            let identities = engine.list().await?;
            if identities.is_empty() {
                println!("No employees enrolled");
            }
            for r in identities {
                println!(
                    "{:>5}  {:<12} {:<28} {:<16} {}",
                    r.id,
                    r.code,
                    r.display_name,
                    r.department,
                    r.created_at.format("%Y-%m-%d")
                );
            }
        }
        Commands::Remove { id } => {
            if engine.remove(id).await? {
                println!("Removed employee {id}");
            } else {
                bail!("no employee with id {id}");
            }
        }
        Commands::Report {
            daily_csv,
            total_csv,
            ..
        } => {
            let range = range.unwrap_or_default();
            let report = engine.report(range).await?;
            print_report(&report);
            if let Some(path) = daily_csv {
                export(&path, |out| write_daily_csv(out, &report.daily_rows(), config.csv_bom))?;
            }
            if let Some(path) = total_csv {
                export(&path, |out| write_total_csv(out, &report.total_rows(), config.csv_bom))?;
            }
        }
    }

    Ok(())
}

fn report_range(start: &Option<String>, end: &Option<String>, all: bool) -> Result<DateRange> {
    if all {
        return Ok(DateRange::all());
    }
    if start.is_none() && end.is_none() {
        return Ok(DateRange::current_month(chrono::Local::now().date_naive()));
    }
    Ok(DateRange::parse(start.as_deref(), end.as_deref())?)
}

fn print_identify(image: &Path, outcome: &IdentifyOutcome) {
    match outcome {
        IdentifyOutcome::Matched { name, code, distance, event, .. } => println!(
            "{}: recorded {name} ({code}) at {} (distance={distance:.3})",
            image.display(),
            event.timestamp.format("%Y-%m-%d %H:%M:%S")
        ),
        IdentifyOutcome::Unknown { closest: Some(d) } => println!(
            "{}: unknown person (closest distance={d:.3}); enroll them first",
            image.display()
        ),
        IdentifyOutcome::Unknown { closest: None } => {
            println!("{}: unknown person (no employees enrolled)", image.display())
        }
        IdentifyOutcome::NoFace => {
            println!("{}: no face detected; try again", image.display())
        }
    }
}

fn print_report(report: &Report) {
    println!("Report for {}", report.range);
    if report.is_empty() {
        println!("No attendance in the selected range");
        return;
    }

    println!();
    println!(
        "{:>5}  {:<24} {:<14} {:<10} {:<8} {:<8} {:>5} {:>7}",
        "id", "name", "department", "date", "in", "out", "scans", "hours"
    );
    for row in report.daily_rows() {
        println!(
            "{:>5}  {:<24} {:<14} {:<10} {:<8} {:<8} {:>5} {:>7.2}",
            row.identity_id,
            row.name.as_deref().unwrap_or("-"),
            row.department.as_deref().unwrap_or("-"),
            row.date,
            &row.first_in[11..],
            &row.last_out[11..],
            row.scan_count,
            row.hours
        );
    }

    println!();
    println!(
        "{:>5}  {:<24} {:<14} {:>5} {:>9} {:>6}",
        "id", "name", "department", "days", "hours", "scans"
    );
    for row in report.total_rows() {
        println!(
            "{:>5}  {:<24} {:<14} {:>5} {:>9.2} {:>6}",
            row.identity_id,
            row.name.as_deref().unwrap_or("-"),
            row.department.as_deref().unwrap_or("-"),
            row.distinct_day_count,
            row.total_hours,
            row.total_scan_count
        );
    }
}

fn export<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(BufWriter<File>) -> Result<(), attend_core::report::ReportError>,
{
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write(BufWriter::new(file)).with_context(|| format!("write {}", path.display()))?;
    println!("Saved {}", path.display());
    Ok(())
}
