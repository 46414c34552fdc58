//! Query command - search for documents.

use crate::app::App;
use crate::OutputFormat;
use shelf_core::{Config, Document, QueryEngine};
use std::time::Instant;

/// Run the query command.
pub fn run(
    config: Config,
    file_name: &str,
    root: &str,
    exact_path: bool,
    limit: Option<usize>,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let app = App::new(config)?;

    let start = Instant::now();
    let Some(mut results) = search(&app, file_name, root, exact_path)? else {
        return Ok(());
    };
    let elapsed = start.elapsed();
    let total = results.len();
    if let Some(limit) = limit {
        results.truncate(limit);
    }

    match output {
        OutputFormat::Text => {
            for document in &results {
                println!("{}", format_document(document));
            }

            eprintln!();
            eprintln!(
                "Found {} results in {:.3}ms",
                total,
                elapsed.as_secs_f64() * 1000.0
            );
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    Ok(())
}

/// Search the existing index. Returns `None` when there is nothing to
/// search yet; queries never create an index.
fn search(
    app: &App,
    file_name: &str,
    root: &str,
    exact_path: bool,
) -> anyhow::Result<Option<Vec<Document>>> {
    if !app.index_exists() {
        eprintln!("No index found. Run 'shelf index' first.");
        return Ok(None);
    }

    let store = app.open_store()?;
    if store.is_empty() {
        eprintln!("Index is empty. Run 'shelf index' first.");
        return Ok(None);
    }

    let results = QueryEngine::new(&store, &app.root).search(root, file_name, exact_path)?;
    Ok(Some(results))
}

fn format_document(document: &Document) -> String {
    format!(
        "{}  ({}, {} KB, {})",
        document.path_with_file_name,
        document.file_type,
        document.file_size,
        document.last_modified.format("%Y-%m-%d %H:%M")
    )
}
