//! Index command - bring the index in line with the watched root.

use crate::app::App;
use shelf_core::{Config, IndexStore, ReconcileMode};
use std::time::Instant;

/// Run the index command.
pub fn run(config: Config, force: bool) -> anyhow::Result<()> {
    let app = App::new(config)?;

    if force && app.index_exists() {
        IndexStore::remove(&app.index_dir)?;
        println!("Existing index discarded.");
    }

    let collection = app.open_collection()?;
    if collection.is_fresh() {
        println!("Building index of {}...", app.root.display());
    } else {
        println!("Reconciling index with {}...", app.root.display());
    }
    println!();

    let start = Instant::now();
    let report = collection.run_startup()?;
    let elapsed = start.elapsed();
    let stats = collection.stats();

    println!("Indexing complete!");
    println!("  Scanned:     {}", report.scanned);
    println!("  Added:       {}", report.added);
    if report.mode == ReconcileMode::Incremental {
        println!("  Reindexed:   {}", report.reindexed);
        println!("  Removed:     {}", report.removed);
        println!("  Unchanged:   {}", report.unchanged);
    }
    if report.skipped > 0 {
        println!("  Skipped:     {} (see log for details)", report.skipped);
    }
    println!("  Documents:   {}", stats.documents);
    println!("  Time:        {:.2}s", elapsed.as_secs_f64());

    Ok(())
}
