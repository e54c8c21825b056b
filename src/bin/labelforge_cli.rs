//! LabelForge CLI - Bridge interface for the presentation layer
//!
//! Commands: add, remove, search, clear-custom, regenerate
//! Outputs JSON to stdout, logs to stderr
//! Returns non-zero on operation failure

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use labelforge_core::{
    pipeline::ArtifactPaths, Config, CustomBarcodeRecord, DataLayout, ItemRecord, LabelPipeline,
};

#[derive(Parser, Debug)]
#[command(name = "labelforge-cli")]
#[command(about = "LabelForge CLI - Barcode Catalog & Print Label Compositor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Root directory holding the CSV stores and artifact directories
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Optional JSON config file (label template + fetch settings)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add an entry: fetch its barcode, compose its label, append the row
    Add {
        #[arg(short, long)]
        name: String,

        /// Item description; the custom collection has no description column
        #[arg(short = 'e', long, default_value = "", conflicts_with = "custom")]
        description: String,

        #[arg(short, long)]
        barcode: String,

        /// Target the custom-barcode collection instead of items
        #[arg(long)]
        custom: bool,
    },

    /// Remove an entry and its artifacts
    Remove {
        #[arg(short, long)]
        name: String,

        #[arg(long)]
        custom: bool,
    },

    /// Search a collection; empty query lists everything
    Search {
        query: Option<String>,

        #[arg(long)]
        custom: bool,
    },

    /// Empty the custom-barcode collection and its artifacts
    ClearCustom,

    /// Re-produce every row's artifacts
    Regenerate {
        #[arg(long)]
        custom: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!(r#"{{"error": "Failed to load config: {}"}}"#, e);
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    let layout = DataLayout::under(&cli.data_dir);
    let pipeline = match LabelPipeline::open_http(&config, layout) {
        Ok(p) => p,
        Err(e) => {
            eprintln!(r#"{{"error": "Failed to open catalog: {}"}}"#, e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Add {
            name,
            description,
            barcode,
            custom,
        } => {
            let result = if custom {
                pipeline
                    .add_custom(&name, &barcode)
                    .map(|r| serde_json::to_value(&r).unwrap_or_default())
            } else {
                pipeline
                    .add_item(&name, &description, &barcode)
                    .map(|r| serde_json::to_value(&r).unwrap_or_default())
            };
            match result {
                Ok(record) => {
                    let output = serde_json::json!({
                        "success": true,
                        "record": record,
                    });
                    println!("{}", serde_json::to_string_pretty(&output).unwrap());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    let output = serde_json::json!({
                        "success": false,
                        "error": e.to_string(),
                    });
                    println!("{}", serde_json::to_string(&output).unwrap());
                    ExitCode::from(2)
                }
            }
        }

        Commands::Remove { name, custom } => {
            let result = if custom {
                pipeline.delete_custom(&name)
            } else {
                pipeline.delete_item(&name)
            };
            match result {
                Ok(outcome) => {
                    let output = serde_json::json!({
                        "success": true,
                        "outcome": outcome,
                    });
                    println!("{}", serde_json::to_string_pretty(&output).unwrap());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    println!(r#"{{"success": false, "error": "{}"}}"#, e);
                    ExitCode::from(2)
                }
            }
        }

        Commands::Search { query, custom } => {
            let query = query.unwrap_or_default();
            let result = if custom {
                pipeline
                    .search_custom(&query)
                    .map(|records| custom_results(&pipeline, &records))
            } else {
                pipeline
                    .search_items(&query)
                    .map(|records| item_results(&pipeline, &records))
            };
            match result {
                Ok(results) => {
                    println!("{}", serde_json::to_string_pretty(&results).unwrap());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    println!(r#"{{"error": "{}"}}"#, e);
                    ExitCode::from(2)
                }
            }
        }

        Commands::ClearCustom => match pipeline.clear_custom() {
            Ok(cleared) => {
                let output = serde_json::json!({
                    "success": true,
                    "cleared": cleared,
                });
                println!("{}", serde_json::to_string_pretty(&output).unwrap());
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!(r#"{{"success": false, "error": "{}"}}"#, e);
                ExitCode::from(2)
            }
        },

        Commands::Regenerate { custom } => {
            let result = if custom {
                pipeline.regenerate_custom()
            } else {
                pipeline.regenerate_items()
            };
            match result {
                Ok(report) => {
                    let success = report.failed.is_empty();
                    let output = serde_json::json!({
                        "success": success,
                        "report": report,
                    });
                    println!("{}", serde_json::to_string_pretty(&output).unwrap());
                    if success {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2)
                    }
                }
                Err(e) => {
                    println!(r#"{{"success": false, "error": "{}"}}"#, e);
                    ExitCode::from(2)
                }
            }
        }
    }
}

/// Attach artifact paths the way the presentation layer consumes them:
/// present paths as strings, absent artifacts as null.
fn artifact_json(paths: &ArtifactPaths) -> (serde_json::Value, serde_json::Value) {
    let barcode = if paths.barcode.exists() {
        serde_json::json!(paths.barcode)
    } else {
        serde_json::Value::Null
    };
    let label = if paths.label.exists() {
        serde_json::json!(paths.label)
    } else {
        serde_json::Value::Null
    };
    (barcode, label)
}

fn item_results(pipeline: &LabelPipeline, records: &[ItemRecord]) -> Vec<serde_json::Value> {
    records
        .iter()
        .map(|r| {
            let (barcode, label) = artifact_json(&pipeline.item_artifacts(&r.artifact_id));
            serde_json::json!({
                "name": r.display_name,
                "description": r.description,
                "barcode": r.barcode_value,
                "artifactId": r.artifact_id,
                "barcodeImage": barcode,
                "labelImage": label,
            })
        })
        .collect()
}

fn custom_results(
    pipeline: &LabelPipeline,
    records: &[CustomBarcodeRecord],
) -> Vec<serde_json::Value> {
    records
        .iter()
        .map(|r| {
            let (barcode, label) = artifact_json(&pipeline.custom_artifacts(&r.artifact_id));
            serde_json::json!({
                "name": r.display_name,
                "barcode": r.barcode_value,
                "artifactId": r.artifact_id,
                "barcodeImage": barcode,
                "labelImage": label,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_custom_rejects_description() {
        let err = Cli::try_parse_from([
            "labelforge-cli",
            "add",
            "--name",
            "Shelf Tag",
            "--barcode",
            "42",
            "--description",
            "not allowed",
            "--custom",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_add_item_accepts_description() {
        let cli = Cli::try_parse_from([
            "labelforge-cli",
            "add",
            "--name",
            "Widget A",
            "--barcode",
            "500",
            "--description",
            "a small widget",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Add { custom: false, .. }));
    }
}
