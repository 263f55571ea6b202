//! Archive a single video page
//!
//! This example demonstrates the core functionality of archiver-dl:
//! - Loading configuration (or using defaults)
//! - Creating a downloader instance and starting its intake loop
//! - Registering a task group
//! - Adding a task to the queue
//! - Monitoring progress through events
//!
//! Usage:
//!
//! ```text
//! cargo run --example archive_video -- <video-url> <audio-url> <destination> [config.json]
//! ```

use archiver_dl::{ArchiveDownloader, Config, Event, Task, UrlPair};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let (Some(video), Some(audio), Some(destination)) = (args.next(), args.next(), args.next())
    else {
        eprintln!("usage: archive_video <video-url> <audio-url> <destination> [config.json]");
        std::process::exit(2);
    };
    let config = match args.next() {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    // Create downloader instance
    let downloader = ArchiveDownloader::new(config)?;
    downloader.start_queue_processor()?;

    // Subscribe to events
    let mut events = downloader.subscribe();

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    downloader
        .register_task_group("demo", 1, move |completion| {
            done_tx.send(completion).ok();
        })
        .await?;

    downloader
        .add_task(
            Task::new(
                "demo page",
                UrlPair::single(video),
                UrlPair::single(audio),
                destination,
            )
            .in_group("demo"),
        )
        .await?;

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::TaskStarted { title } => println!("⬇ Started: {title}"),
                Event::TaskComplete { title, path } => {
                    println!("✓ {title} merged into {}", path.display())
                }
                Event::TaskSkipped { title, path } => {
                    println!("↷ {title} skipped, {} already exists", path.display())
                }
                Event::TaskFailed { title, stage, error } => {
                    println!("✗ {title} failed during {stage:?}: {error}")
                }
                _ => {}
            }
        }
    });

    let completion = done_rx.await?;
    println!("Group complete, output in {}", completion.output_dir.display());

    downloader.shutdown().await?;
    Ok(())
}
