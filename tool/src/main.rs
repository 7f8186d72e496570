use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use routecache::{CacheFormat, CacheStore, RouteEntry, RouteIndex};
use tracing_subscriber::{fmt, EnvFilter};

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "routecache")]
#[command(about = "Inspect and repair route cache files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the nested route tree and its size
    Inspect {
        #[arg(long)]
        cache: PathBuf,
        /// json or bincode; guessed from the extension when omitted
        #[arg(long)]
        format: Option<CacheFormat>,
        /// Emit the document as JSON instead of an indented tree
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Report keys stored more than once
    Validate {
        #[arg(long)]
        cache: PathBuf,
        #[arg(long)]
        format: Option<CacheFormat>,
        /// Remove the duplicates and rewrite the file
        #[arg(long, default_value_t = false)]
        fix: bool,
    },
    /// Look up a single key without touching any content source
    Lookup {
        #[arg(long)]
        cache: PathBuf,
        #[arg(long)]
        format: Option<CacheFormat>,
        #[arg(long)]
        key: String,
        /// Use containment matching
        #[arg(long, default_value_t = false)]
        compat: bool,
    },
    /// Rewrite a cache file in another format
    Convert {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        format: CacheFormat,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { cache, format, json } => {
            let index = load(&store_for(&cache, format))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&index.routes)?);
            } else {
                print!("{}", render_tree(&index));
                println!("{} entries, {} roots", index.len(), index.routes.len());
            }
            Ok(())
        }
        Commands::Validate { cache, format, fix } => {
            let store = store_for(&cache, format);
            let mut index = load(&store)?;
            let findings = if fix { index.dedup() } else { index.duplicates() };
            for (key, count) in &findings {
                println!("{count} entries were found in the route cache for '{key}'");
            }
            if findings.is_empty() {
                println!("no duplicate keys");
            } else if fix {
                store.save(&index)?;
                tracing::info!(path = %cache.display(), removed_keys = findings.len(), "duplicates removed");
            }
            Ok(())
        }
        Commands::Lookup { cache, format, key, compat } => {
            let index = load(&store_for(&cache, format))?;
            match index.find(&key, compat) {
                Some(entry) => println!("{} -> {}", entry.key, entry.content_id),
                None => println!("{key}: not found"),
            }
            Ok(())
        }
        Commands::Convert { input, output, format } => {
            let index = load(&store_for(&input, None))?;
            CacheStore::new(&output, format).save(&index)?;
            tracing::info!(input = %input.display(), output = %output.display(), %format, entries = index.len(), "converted route cache");
            Ok(())
        }
    }
}

fn guess_format(path: &Path) -> CacheFormat {
    match path.extension().and_then(|s| s.to_str()) {
        Some("bin" | "bincode") => CacheFormat::Bincode,
        _ => CacheFormat::Json,
    }
}

fn store_for(path: &Path, format: Option<CacheFormat>) -> CacheStore {
    CacheStore::new(path, format.unwrap_or_else(|| guess_format(path)))
}

fn load(store: &CacheStore) -> Result<RouteIndex> {
    store.load()?.ok_or_else(|| anyhow!("no route cache at {}", store.path().display()))
}

fn render_tree(index: &RouteIndex) -> String {
    fn walk(out: &mut String, entries: &[RouteEntry], depth: usize) {
        for entry in entries {
            let _ = writeln!(out, "{:indent$}{} -> {}", "", entry.key, entry.content_id, indent = depth * 2);
            walk(out, &entry.children, depth + 1);
        }
    }
    let mut out = String::new();
    walk(&mut out, &index.routes, 0);
    out
}
