//! coref - coreference evaluation and decoding CLI
//!
//! # Usage
//!
//! ```bash
//! # Score predicted clusters against gold (one JSON doc per line)
//! coref eval --pred pred.jsonl --gold gold.jsonl
//!
//! # Same, machine readable, clusters under a custom prefix
//! coref eval --pred pred.jsonl --gold gold.jsonl --prefix coref_head_clusters --format json
//!
//! # Decode a dumped score matrix into clusters
//! coref decode --input scores.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::LevelFilter;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use coref::eval::{CorefEvaluation, Metric};
use coref::{ClusterAssembler, Error, MentionIndexer, Result, NO_ANTECEDENT};
use coref_core::{Doc, MentionClusters};

// ============================================================================
// CLI Structure
// ============================================================================

/// Coreference evaluation and decoding
#[derive(Parser, Debug)]
#[command(name = "coref", version, about)]
struct Cli {
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Less logging (-q warnings, -qq errors)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score predicted clusters against gold clusters (B³, MUC, CEAFe)
    Eval(EvalArgs),
    /// Decode an antecedent score matrix into clusters
    Decode(DecodeArgs),
}

#[derive(clap::Args, Debug)]
struct EvalArgs {
    /// Predicted docs, one JSON object per line
    #[arg(long)]
    pred: PathBuf,

    /// Gold docs, one JSON object per line, paired with --pred by line
    #[arg(long)]
    gold: PathBuf,

    /// Span group prefix the clusters are stored under
    #[arg(long, default_value = "coref_clusters")]
    prefix: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,
}

#[derive(clap::Args, Debug)]
struct DecodeArgs {
    /// JSON file with `scores` and `antecedents`
    #[arg(long)]
    input: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Aligned table
    #[default]
    Human,
    /// JSON object
    Json,
}

// ============================================================================
// Input / Output Types
// ============================================================================

/// Dumped scorer output. `null` scores are masked (`-inf`), `null`
/// antecedents are padding.
#[derive(Debug, Deserialize)]
struct DecodeInput {
    scores: Vec<Vec<Option<f32>>>,
    antecedents: Vec<Vec<Option<usize>>>,
}

#[derive(Debug, Serialize)]
struct EvalReport {
    documents: usize,
    prefix: String,
    #[serde(flatten)]
    scores: CorefEvaluation,
}

// ============================================================================
// Main
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Eval(args) => cmd_eval(args),
        Commands::Decode(args) => cmd_decode(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Level forced by `-v`/`-q`; `None` leaves `RUST_LOG` in charge.
fn level_override(verbose: u8, quiet: u8) -> Option<LevelFilter> {
    match (quiet, verbose) {
        (0, 0) => None,
        (0, 1) => Some(LevelFilter::Debug),
        (0, _) => Some(LevelFilter::Trace),
        (1, _) => Some(LevelFilter::Warn),
        _ => Some(LevelFilter::Error),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    if let Some(level) = level_override(verbose, quiet) {
        builder.filter_level(level);
    }
    let _ = builder.try_init();
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_eval(args: EvalArgs) -> Result<()> {
    let predicted = read_docs(&args.pred)?;
    let gold = read_docs(&args.gold)?;
    if predicted.len() != gold.len() {
        return Err(Error::invalid_input(format!(
            "{} predicted docs but {} gold docs",
            predicted.len(),
            gold.len()
        )));
    }
    log::info!("evaluating {} documents under '{}'", predicted.len(), args.prefix);

    let documents: Vec<(MentionClusters, MentionClusters)> = predicted
        .iter()
        .zip(&gold)
        .map(|(p, g)| (p.spans.clusters(&args.prefix), g.spans.clusters(&args.prefix)))
        .collect();
    let scores = CorefEvaluation::compute_corpus(&documents);

    match args.format {
        OutputFormat::Human => print_table(&scores, documents.len()),
        OutputFormat::Json => {
            let report = EvalReport {
                documents: documents.len(),
                prefix: args.prefix,
                scores,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn cmd_decode(args: DecodeArgs) -> Result<()> {
    let input: DecodeInput = serde_json::from_str(&fs::read_to_string(&args.input)?)?;
    let (scores, antecedents) = to_matrices(&input)?;

    let mentions = MentionIndexer::new().head_mentions(scores.nrows());
    let clusters = ClusterAssembler::new().decode(&mentions, scores.view(), antecedents.view())?;
    log::info!("{} mentions -> {} clusters", mentions.len(), clusters.len());

    println!("{}", serde_json::to_string_pretty(&clusters)?);
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn read_docs(path: &Path) -> Result<Vec<Doc>> {
    let content = fs::read_to_string(path)?;
    let mut docs = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let doc: Doc = serde_json::from_str(line).map_err(|e| {
            Error::invalid_input(format!("{}:{}: {}", path.display(), line_no + 1, e))
        })?;
        docs.push(doc);
    }
    log::debug!("read {} docs from {}", docs.len(), path.display());
    Ok(docs)
}

fn to_matrices(input: &DecodeInput) -> Result<(Array2<f32>, Array2<usize>)> {
    let rows = input.scores.len();
    if input.antecedents.len() != rows {
        return Err(Error::invalid_input(format!(
            "{} score rows but {} antecedent rows",
            rows,
            input.antecedents.len()
        )));
    }
    let k = input.antecedents.first().map_or(0, Vec::len);

    let mut scores = Array2::<f32>::zeros((rows, k + 1));
    let mut antecedents = Array2::<usize>::from_elem((rows, k), NO_ANTECEDENT);
    for (m, (score_row, ante_row)) in input.scores.iter().zip(&input.antecedents).enumerate() {
        if score_row.len() != k + 1 || ante_row.len() != k {
            return Err(Error::invalid_input(format!(
                "row {}: expected {} scores and {} antecedents, got {} and {}",
                m,
                k + 1,
                k,
                score_row.len(),
                ante_row.len()
            )));
        }
        for (j, s) in score_row.iter().enumerate() {
            scores[[m, j]] = s.unwrap_or(f32::NEG_INFINITY);
        }
        for (j, a) in ante_row.iter().enumerate() {
            antecedents[[m, j]] = a.unwrap_or(NO_ANTECEDENT);
        }
    }
    Ok((scores, antecedents))
}

fn print_table(eval: &CorefEvaluation, documents: usize) {
    println!("Documents: {}", documents);
    println!();
    println!("{:<10} {:>8} {:>8} {:>8}", "Metric", "P", "R", "F1");
    println!("{}", "-".repeat(37));
    for metric in Metric::ALL {
        let s = eval.get(metric);
        println!(
            "{:<10} {:>7.2}% {:>7.2}% {:>7.2}%",
            metric.name(),
            s.precision * 100.0,
            s.recall * 100.0,
            s.f1 * 100.0
        );
    }
    println!("{}", "-".repeat(37));
    println!(
        "{:<10} {:>7.2}% {:>7.2}% {:>7.2}%",
        "Average",
        eval.average.precision * 100.0,
        eval.average.recall * 100.0,
        eval.average.f1 * 100.0
    );
}
