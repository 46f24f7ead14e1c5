use crate::cost_model::UnitCostModel;
use crate::join::{HistogramJoin, JoinResultElement, JoinStats, NaiveJoin};
use crate::parsing::{tree_to_string, LabelDict, TreeOutput};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use itertools::Itertools;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::exit;
use std::time::Instant;

mod cost_model;
mod indexing;
mod join;
mod lb;
mod parsing;
mod ted;
mod ub;
mod validation;

/// Tree similarity join utility
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Dataset file of trees in bracket notation
    #[arg(short, long, value_name = "FILE")]
    dataset_path: PathBuf,
    /// outputs only the result pairs
    #[arg(short, default_value_t = false)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum JoinVariant {
    /// Verifies every pair exactly, no filtering
    Naive,
    /// Histogram filters, upper bound admission, exact verification
    Histogram,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs a similarity join over the dataset
    Join {
        /// Join variant to execute
        #[arg(value_enum)]
        variant: JoinVariant,
        /// Distance threshold
        #[arg()]
        threshold: f64,
        /// output path for result pairs
        #[arg(long)]
        output: Option<PathBuf>,
        /// Optional real results path - will output precision
        #[arg(long)]
        results_path: Option<PathBuf>,
    },
    /// Sweeps thresholds 1 to 15 and compares result counts against the
    /// bolzano reference counts
    Golden {
        /// Join variant to execute
        #[arg(value_enum)]
        variant: JoinVariant,
    },
}

/// Result set sizes of the bolzano dataset for thresholds 1 to 15.
const BOLZANO_RESULTS: [usize; 15] = [
    9, 37, 61, 109, 196, 344, 476, 596, 704, 840, 946, 1138, 1356, 1498, 1692,
];

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let mut cmd = Cli::command();

    if !cli.dataset_path.exists() || !cli.dataset_path.is_file() {
        cmd.error(
            ErrorKind::InvalidValue,
            "Path does not exists or is not a valid file!",
        )
        .exit();
    }
    let mut label_dict = LabelDict::new();
    let trees = match parsing::parse_dataset(&cli.dataset_path, &mut label_dict) {
        Ok(trees) => trees,
        Err(e) => {
            eprintln!("Got unexpected error: {}", e);
            exit(1);
        }
    };
    if !cli.quiet {
        println!("Parsed {} trees", trees.len());
    }

    match cli.command {
        Commands::Join {
            variant,
            threshold,
            output,
            results_path,
        } => {
            let start = Instant::now();
            let (results, stats) = run_join(variant, &trees, &label_dict, threshold)?;
            let duration = start.elapsed();

            if !cli.quiet {
                println!(
                    "{variant:?} join at threshold {threshold} took: {}ms",
                    duration.as_millis()
                );
                println!("Result pairs: {}", results.len());
                print_stats(&stats);
            }

            if let Some(results_path) = results_path {
                let (correct, extra, precision) =
                    validation::get_precision(&results, &results_path, threshold)?;
                println!("Correct pairs;Extra pairs;Precision");
                println!("{correct};{extra};{precision}");
                let missing = validation::missing_pairs(&results, &results_path, threshold)?;
                if !missing.is_empty() {
                    println!("Missing {} reference pairs, printing them in bracket", missing.len());
                    write_file(
                        PathBuf::from("./missing-pairs.bracket"),
                        &missing
                            .iter()
                            .map(|(t1, t2)| {
                                format!(
                                    "\"{}\",\"{}\"",
                                    tree_to_string(&trees[*t1], &label_dict, TreeOutput::BracketNotation),
                                    tree_to_string(&trees[*t2], &label_dict, TreeOutput::BracketNotation)
                                )
                            })
                            .collect_vec(),
                    )?;
                    println!("Printing missing pairs in graphviz");
                    write_file(
                        PathBuf::from("./missing-pairs.graphviz"),
                        &missing
                            .iter()
                            .map(|(t1, t2)| {
                                format!(
                                    "{}{}\n-------------------------\n",
                                    tree_to_string(&trees[*t1], &label_dict, TreeOutput::Graphviz),
                                    tree_to_string(&trees[*t2], &label_dict, TreeOutput::Graphviz)
                                )
                            })
                            .collect_vec(),
                    )?;
                }
            }

            if let Some(output) = output {
                write_results(output, &results)?;
            }
        }
        Commands::Golden { variant } => {
            for (i, expected) in BOLZANO_RESULTS.iter().enumerate() {
                let threshold = (i + 1) as f64;
                let start = Instant::now();
                let (results, _) = run_join(variant, &trees, &label_dict, threshold)?;
                if !cli.quiet {
                    println!(
                        "threshold {threshold}: {} pairs in {}ms",
                        results.len(),
                        start.elapsed().as_millis()
                    );
                }
                if results.len() != *expected {
                    eprintln!(
                        "Incorrect join result for threshold {threshold}: {} instead of {expected}",
                        results.len()
                    );
                    exit(-1);
                }
            }
            println!("All thresholds match the reference counts");
        }
    }

    Ok(())
}

fn run_join(
    variant: JoinVariant,
    trees: &[parsing::ParsedTree],
    label_dict: &LabelDict,
    threshold: f64,
) -> Result<(Vec<JoinResultElement>, JoinStats), anyhow::Error> {
    match variant {
        JoinVariant::Naive => {
            let mut join = NaiveJoin::new(UnitCostModel);
            let results = join.execute_join(trees, label_dict, threshold)?;
            Ok((results, join.stats()))
        }
        JoinVariant::Histogram => {
            let mut join = HistogramJoin::new(UnitCostModel);
            let results = join.execute_join(trees, label_dict, threshold)?;
            Ok((results, join.stats()))
        }
    }
}

fn print_stats(stats: &JoinStats) {
    println!("Pre-candidates: {}", stats.pre_candidates);
    println!("Inverted list lookups: {}", stats.il_lookups);
    println!("Inverted list size: {}", stats.inverted_list_size);
    println!("Verification subproblems: {}", stats.subproblem_count);
}

fn write_results(
    file_name: impl AsRef<Path>,
    results: &[JoinResultElement],
) -> Result<(), std::io::Error> {
    let mut lines = vec!["t1,t2,ted".to_owned()];
    lines.extend(
        results
            .iter()
            .map(|r| format!("{},{},{}", r.tree_id_1, r.tree_id_2, r.ted)),
    );
    write_file(file_name, &lines)
}

fn write_file<T>(file_name: impl AsRef<Path>, data: &[T]) -> Result<(), std::io::Error>
where
    T: Display,
{
    let f = File::options()
        .create(true)
        .write(true)
        .truncate(true)
        .open(file_name.as_ref())?;
    let mut w = BufWriter::new(f);

    for d in data.iter() {
        writeln!(w, "{d}")?;
    }
    Ok(())
}
