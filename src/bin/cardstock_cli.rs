//! Cardstock CLI - batch card rendering from a member CSV
//!
//! Prints one summary line per record to stdout
//! Returns non-zero on fatal setup errors or an aborted run

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use cardstock::{
    BannerImage, BatchOptions, CardConfig, MemberRecord, RunLogger, run_batch_with_options,
};

#[derive(Parser)]
#[command(name = "cardstock-cli")]
#[command(about = "Render membership ID cards into per-member PDF files")]
struct Cli {
    /// CSV of member records with a header row:
    /// member_id, name, membership, adults, children
    data_file: PathBuf,

    /// Banner image: PNG/JPEG path or a data: URI
    banner_image: String,

    /// Output directory, created if absent
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Year shown on the "Annual Member {year}" line
    #[arg(short, long)]
    year: Option<String>,

    /// Render on this many worker threads
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Write a JSON-line run log to this file
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Also write a PNG preview next to each PDF
    #[arg(long)]
    preview: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = CardConfig::default();
    if let Some(year) = cli.year {
        config.year = year;
    }

    let records = match read_records(&cli.data_file) {
        Ok(records) => records,
        Err(message) => {
            eprintln!("error: {message}");
            return ExitCode::from(2);
        }
    };

    let banner = match BannerImage::open(&cli.banner_image) {
        Ok(banner) => banner,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };

    let logger = match &cli.log {
        Some(path) => match RunLogger::create(path) {
            Ok(logger) => Some(logger),
            Err(err) => {
                eprintln!("error: cannot create run log {}: {err}", path.display());
                return ExitCode::from(2);
            }
        },
        None => None,
    };

    let options = BatchOptions {
        workers: cli.workers.unwrap_or(0),
        preview: cli.preview,
        logger,
    };
    let summary =
        match run_batch_with_options(&records, &config, &banner, &cli.output_dir, &options) {
            Ok(summary) => summary,
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::from(2);
            }
        };

    for entry in &summary.entries {
        match (&entry.output, &entry.detail) {
            (Some(path), _) => {
                println!("{} {} {}", entry.status.as_str(), entry.identifier, path.display())
            }
            (None, Some(detail)) => {
                println!("{} {} ({detail})", entry.status.as_str(), entry.identifier)
            }
            (None, None) => println!("{} {}", entry.status.as_str(), entry.identifier),
        }
    }
    println!(
        "rendered {} / duplicates {} / invalid {} / failed {}",
        summary.rendered(),
        summary.duplicates(),
        summary.invalid(),
        summary.failed()
    );

    if let Some(reason) = &summary.aborted {
        eprintln!("error: run aborted: {reason}");
        return ExitCode::from(2);
    }
    ExitCode::SUCCESS
}

// Header row picks the columns; quoted fields may carry commas and doubled
// quotes; extra columns are ignored. Rows with blank required fields still
// become records, and the batch marks them invalid.
fn read_records(path: &Path) -> Result<Vec<MemberRecord>, String> {
    let text = fs::read_to_string(path)
        .map_err(|err| format!("cannot read {}: {err}", path.display()))?;
    let mut lines = text.lines();
    let header = lines
        .next()
        .ok_or_else(|| format!("{} is empty", path.display()))?;
    let columns = parse_csv_line(header);
    let find = |name: &str| {
        columns
            .iter()
            .position(|column| column.trim().eq_ignore_ascii_case(name))
    };
    let id_col = find("member_id")
        .ok_or_else(|| format!("{} is missing a member_id column", path.display()))?;
    let name_col =
        find("name").ok_or_else(|| format!("{} is missing a name column", path.display()))?;
    let membership_col = find("membership");
    let adults_col = find("adults");
    let children_col = find("children");

    let mut records = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields = parse_csv_line(line);
        let field = |index: usize| fields.get(index).map(|s| s.trim()).unwrap_or("");
        let opt_field = |index: Option<usize>| index.map(field).unwrap_or("");
        records.push(MemberRecord::new(
            field(id_col),
            field(name_col),
            opt_field(membership_col),
            opt_field(adults_col).parse().unwrap_or(0),
            opt_field(children_col).parse().unwrap_or(0),
        ));
    }
    Ok(records)
}

fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}
