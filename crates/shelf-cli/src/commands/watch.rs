//! Watch command - keep the index in step with filesystem changes.

use crate::app::App;
use shelf_core::{ChannelEventConsumer, Config, EventConsumer, EventMessage, EventOutcome};
use shelf_watch::NotifyWatcher;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Run the watch command.
pub fn run(config: Config) -> anyhow::Result<()> {
    let app = App::new(config)?;
    let collection = app.open_collection()?;

    // Start the pass and the watcher together; changes made while the pass
    // runs queue in the channel and are applied once it finishes.
    let startup = collection.spawn_startup()?;

    let (consumer, receiver) = ChannelEventConsumer::new();
    let consumer: Arc<dyn EventConsumer> = Arc::new(consumer);

    let handle = match NotifyWatcher::start(collection.watched_root(), consumer) {
        Ok(handle) => handle,
        Err(e) if e.is_watch_limit() => {
            eprintln!("⚠ Cannot watch {} ({})", app.root.display(), e);
            eprintln!("  Raise fs.inotify.max_user_watches or watch a smaller directory");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    println!("✓ Watching {}", handle.root().display());

    println!("Indexing {}...", app.root.display());
    let report = startup.wait()?;
    println!("{}", report);

    println!();
    println!("Monitoring for changes...");
    println!("Press Ctrl+C to stop.");

    loop {
        match receiver.recv() {
            Ok(EventMessage::Event(event)) => match collection.on_filesystem_event(&event) {
                Ok(EventOutcome::Applied) => info!(event = %event, "Index updated"),
                Ok(EventOutcome::Ignored) => debug!(event = %event, "Event ignored"),
                Ok(EventOutcome::Skipped) => {
                    warn!(event = %event, "File could not be indexed")
                }
                Err(e) => warn!(event = %event, error = %e, "Failed to apply event"),
            },
            Ok(EventMessage::Error(e)) => {
                error!(error = %e, "Watch error");
            }
            Err(_) => {
                // Channel closed, watcher stopped
                break;
            }
        }
    }

    handle.stop();
    println!("Monitoring stopped.");
    Ok(())
}
