mod db;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use exam_extract::pdf::{DirAssetWriter, LopdfBackend, PdfBackend};
use exam_extract::pipeline::classify_document;
use exam_extract::{DocumentResult, ExamType, ExtractOptions, Extractor, Page, Subject, TracingSink};

#[derive(Parser)]
#[command(name = "exam_extract", about = "Split JEE/NEET question papers into questions and diagrams")]
struct Cli {
    /// History database
    #[arg(long, env = "EXAM_DB", default_value = db::DEFAULT_DB_PATH, global = true)]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract questions and diagrams from a PDF
    Extract {
        pdf: PathBuf,
        /// Directory for diagram PNGs
        #[arg(short, long, default_value = "diagrams")]
        out: PathBuf,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
        /// Record the run in the history database
        #[arg(long)]
        save: bool,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Detect exam type and subject only
    Classify {
        pdf: PathBuf,
        #[arg(long, default_value = "3")]
        header_pages: usize,
    },
    /// List recorded runs
    History {
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Show the questions of a recorded run
    Show { run_id: i64 },
}

#[derive(Args)]
struct OptionArgs {
    /// Minimum diagram width and height, in page units
    #[arg(long, default_value = "50")]
    min_size: f32,
    /// Render resolution for diagrams
    #[arg(long, default_value = "200")]
    dpi: u32,
    /// Only process the first N pages (0 = all)
    #[arg(long, default_value = "30")]
    max_pages: usize,
    /// Pages used for subject detection (0 = all)
    #[arg(long, default_value = "3")]
    header_pages: usize,
}

impl From<OptionArgs> for ExtractOptions {
    fn from(a: OptionArgs) -> Self {
        ExtractOptions {
            min_image_size: a.min_size,
            render_dpi: a.dpi,
            max_pages: (a.max_pages > 0).then_some(a.max_pages),
            header_pages: a.header_pages,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract { pdf, out, json, save, options } => {
            let result = Extractor::new(LopdfBackend)
                .with_options(options.into())
                .run(&pdf, &DirAssetWriter::new(&out), &TracingSink)
                .with_context(|| format!("extracting {}", pdf.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_summary(&result);
            }

            if save {
                let conn = db::connect(&cli.db)?;
                db::init_schema(&conn)?;
                let run_id = db::save_run(
                    &conn,
                    &pdf.to_string_lossy(),
                    &out.to_string_lossy(),
                    &result,
                )?;
                println!("Saved as run #{}", run_id);
            }
            Ok(())
        }
        Commands::Classify { pdf, header_pages } => {
            let (exam_type, subject) = classify_only(&pdf, header_pages)?;
            println!("Exam:    {}", exam_type);
            println!("Subject: {}", subject);
            Ok(())
        }
        Commands::History { limit } => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_runs(&conn, limit)?;
            if rows.is_empty() {
                println!("No runs recorded. Use 'extract --save' first.");
                return Ok(());
            }

            println!(
                "{:>4} | {:<32} | {:<7} | {:<11} | {:>5} | {:>3} | {:>4} | {:<19}",
                "#", "PDF", "Exam", "Subject", "Pages", "Qs", "Imgs", "When"
            );
            println!("{}", "-".repeat(105));
            for r in &rows {
                println!(
                    "{:>4} | {:<32} | {:<7} | {:<11} | {:>5} | {:>3} | {:>4} | {:<19}",
                    r.id,
                    truncate(&r.pdf_path, 32),
                    r.exam_type,
                    r.subject,
                    r.page_count,
                    r.question_count,
                    r.image_count,
                    truncate(&r.created_at, 19),
                );
            }
            Ok(())
        }
        Commands::Show { run_id } => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let questions = db::fetch_questions(&conn, run_id)?;
            if questions.is_empty() {
                println!("Run #{} not found or has no questions.", run_id);
                return Ok(());
            }
            for q in &questions {
                println!("[{}] {}", q.label, q.text);
                for d in &q.diagrams {
                    println!("    diagram: {}", d);
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

/// Text-only pass: no diagrams are rendered or written.
fn classify_only(pdf: &Path, header_pages: usize) -> anyhow::Result<(ExamType, Subject)> {
    let document = LopdfBackend
        .open(pdf)
        .with_context(|| format!("opening {}", pdf.display()))?;
    let pages = document
        .pages()
        .iter()
        .map(|p| {
            Ok(Page {
                page_number: p.number(),
                text: p.extract_text()?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(classify_document(&pages, header_pages))
}

fn print_summary(result: &DocumentResult) {
    println!(
        "{} | {} | {} pages | {} questions | {} diagrams",
        result.exam_type,
        result.subject,
        result.page_count,
        result.questions.len(),
        result.image_count
    );
    println!("{:>4} | {:<12} | {:>4} | {:<60}", "#", "Label", "Imgs", "Text");
    println!("{}", "-".repeat(90));
    for q in &result.questions {
        let text = q.text.replace('\n', " ");
        println!(
            "{:>4} | {:<12} | {:>4} | {:<60}",
            q.number,
            truncate(&q.label, 12),
            q.diagram_asset_paths.len(),
            truncate(&text, 60)
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
