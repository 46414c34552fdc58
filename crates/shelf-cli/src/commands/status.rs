//! Status command - show index status and statistics.

use crate::app::App;
use shelf_core::Config;

/// Run the status command.
pub fn run(config: Config) -> anyhow::Result<()> {
    let app = App::new(config)?;

    println!("Shelf Index Status");
    println!("==================");
    println!();

    if !app.index_exists() {
        println!("No index found. Run 'shelf index' to build the index.");
        return Ok(());
    }

    let store = app.open_store()?;
    let stats = store.stats();

    println!("Summary:");
    println!("  Documents:       {}", stats.documents);
    println!(
        "  Total size:      {} KB ({:.2} MB)",
        stats.total_kilobytes,
        stats.total_kilobytes as f64 / 1000.0
    );
    println!("  Commit:          {}", stats.commit_id);
    println!("  Index version:   {}", stats.version);

    if let Some(committed) = stats.last_commit {
        println!(
            "  Last commit:     {}",
            committed.format("%Y-%m-%d %H:%M:%S")
        );
    }

    println!();
    println!("Watched root:   {}", app.root.display());
    println!("Data directory: {}", app.index_dir.display());

    Ok(())
}
