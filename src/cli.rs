use std::io::Write;
use std::sync::Arc;

use crate::book::sample_books;
use crate::config::AppConfig;
use crate::errors::Result;
use crate::facade::Bookstore;
use crate::report::{render_ndjson, render_text};
use crate::seeder::reset_and_load;
use crate::store::{DocumentStore, MemoryStore, MongoStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Replace the collection with the sample books.
    Seed,
    /// Run the query demo against the current contents.
    Queries { json: bool },
    /// Seed, then run the query demo.
    Demo { json: bool },
}

/// Connects to MongoDB, or builds an in-process store when `memory` is set.
///
/// # Errors
/// `Connection` when the server cannot be reached.
pub async fn open_store(cfg: &AppConfig, memory: bool) -> Result<Arc<dyn DocumentStore>> {
    if memory {
        log::info!("using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = MongoStore::connect(&cfg.store).await?;
    Ok(Arc::new(store))
}

async fn seed(store: &dyn DocumentStore, out: &mut dyn Write) -> Result<()> {
    let books = sample_books();
    let inserted = reset_and_load(store, &books).await?;
    writeln!(out, "{inserted} books were successfully inserted into the database")?;
    for (i, b) in books.iter().enumerate() {
        writeln!(out, "{}. \"{}\" by {} ({})", i + 1, b.title, b.author, b.published_year)?;
    }
    Ok(())
}

async fn queries(store: Arc<dyn DocumentStore>, json: bool, out: &mut dyn Write) -> Result<()> {
    let mut bookstore = Bookstore::new(store);
    let report = bookstore.run_all().await?;
    let text = if json { render_ndjson(&report)? } else { render_text(&report) };
    out.write_all(text.as_bytes())?;
    Ok(())
}

/// Executes `cmd`, writing user-facing output to `out`.
///
/// # Errors
/// The first connection, seed or query error.
pub async fn run(cfg: &AppConfig, memory: bool, cmd: Command, out: &mut dyn Write) -> Result<()> {
    let store = open_store(cfg, memory).await?;
    run_with_store(store, memory, cmd, out).await
}

/// Executes `cmd` against an already opened store, which is closed afterwards.
/// `seed_first` loads the sample books before `queries`.
///
/// # Errors
/// The first seed or query error.
pub async fn run_with_store(
    store: Arc<dyn DocumentStore>,
    seed_first: bool,
    cmd: Command,
    out: &mut dyn Write,
) -> Result<()> {
    match cmd {
        Command::Seed => {
            let r = seed(store.as_ref(), out).await;
            let closed = store.close().await;
            r?;
            closed
        }
        Command::Queries { json } => {
            if seed_first {
                reset_and_load(store.as_ref(), &sample_books()).await?;
            }
            queries(store, json, out).await
        }
        Command::Demo { json } => {
            if let Err(e) = seed(store.as_ref(), out).await {
                if let Err(close_err) = store.close().await {
                    log::warn!("closing {} store after failed seed: {close_err}", store.backend_name());
                }
                return Err(e);
            }
            queries(store, json, out).await
        }
    }
}
