//! Extract command - save the images of one PDF into a directory.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use pdfimg_core::{ExtractionReport, Extractor, NamingScheme, OutputFormat};

use super::config::load_config;

/// Arguments for extracting images.
#[derive(Args)]
pub struct ExtractArgs {
    /// PDF file to read
    pdf: Option<PathBuf>,

    /// Existing directory the images are written to
    output_dir: Option<PathBuf>,

    /// Output image format (default: png)
    format: Option<String>,

    /// How image files are named
    #[arg(short, long, value_enum)]
    naming: Option<Naming>,

    /// Replace images that already exist in the output directory
    #[arg(long)]
    overwrite: bool,

    /// Password for encrypted PDFs
    #[arg(long)]
    password: Option<String>,

    /// Only process the first N pages
    #[arg(long)]
    max_pages: Option<usize>,

    /// Do not look for images inside form XObjects
    #[arg(long)]
    no_forms: bool,

    /// Fail on images that cannot be decoded instead of skipping them
    #[arg(long)]
    strict: bool,

    /// Also write summary.csv into the output directory
    #[arg(long)]
    summary: bool,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Naming {
    /// Page-{page}-Image-{index}.{ext}
    PageIndex,
    /// Random hex identifiers
    Random,
}

impl From<Naming> for NamingScheme {
    fn from(naming: Naming) -> Self {
        match naming {
            Naming::PageIndex => NamingScheme::PageIndex,
            Naming::Random => NamingScheme::Random,
        }
    }
}

pub fn run(args: ExtractArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();

    let (Some(pdf), Some(output_dir)) = (&args.pdf, &args.output_dir) else {
        print_usage();
        return Ok(());
    };

    if !pdf.is_file() {
        println!("The specified pdf path does not exist");
        return Ok(());
    }

    if !output_dir.is_dir() {
        println!("The specified output directory does not exist");
        return Ok(());
    }

    // Command-line arguments override the config file
    let mut config = load_config(config_path)?;
    if let Some(format) = &args.format {
        config.output.format = format.clone();
    }
    if let Some(naming) = args.naming {
        config.output.naming = naming.into();
    }
    if args.overwrite {
        config.output.overwrite = true;
    }
    if let Some(password) = &args.password {
        config.pdf.password = password.clone();
    }
    if let Some(max_pages) = args.max_pages {
        config.pdf.max_pages = max_pages;
    }
    if args.no_forms {
        config.pdf.include_forms = false;
    }
    if args.strict {
        config.pdf.skip_undecodable = false;
    }

    info!("Extracting images from {}", pdf.display());

    let extractor = Extractor::new(config);
    let document = extractor.open(pdf)?;

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(u64::from(document.page_count()))
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} page {pos}/{len}")?
            .progress_chars("##-"),
    );

    let report = extractor.extract_document(&document, output_dir, |_, total| {
        pb.set_length(u64::from(total));
        pb.inc(1);
    })?;
    drop(document);

    pb.finish_and_clear();

    if args.summary {
        let summary_path = output_dir.join("summary.csv");
        write_summary(&summary_path, &report)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    println!("Images extracted.");
    println!(
        "{} {} images from {} pages as {}, {} skipped",
        style("✓").green(),
        style(report.saved.len()).green(),
        report.pages,
        report.format,
        report.skipped.len()
    );

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

fn print_usage() {
    println!();
    println!("Usage: pdfimg <PDF> <OUTPUT_DIR> [FORMAT]");
    println!();
    println!("The default image format is {}.", OutputFormat::default());
    println!(
        "Supported values are {}",
        OutputFormat::supported_names().join(", ")
    );
    println!();
}

fn write_summary(path: &Path, report: &ExtractionReport) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "page",
        "index",
        "file",
        "width",
        "height",
        "filter",
        "status",
        "reason",
    ])?;

    for saved in &report.saved {
        let file = saved.path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        wtr.write_record([
            saved.page.to_string().as_str(),
            saved.index.to_string().as_str(),
            file,
            saved.width.to_string().as_str(),
            saved.height.to_string().as_str(),
            saved.filter.as_deref().unwrap_or(""),
            "saved",
            "",
        ])?;
    }

    for skipped in &report.skipped {
        wtr.write_record([
            skipped.page.to_string().as_str(),
            "",
            skipped.item.as_str(),
            "",
            "",
            "",
            "skipped",
            skipped.reason.as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
