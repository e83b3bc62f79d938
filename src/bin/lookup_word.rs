//! Look up one word in a vector library and print its reconstructed vector.
//!
//! Usage:
//! ```bash
//! cargo run --bin lookup-word -- ./en-library cat
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use veclib::LibraryReader;

#[derive(Debug, Parser)]
#[command(name = "lookup-word", version, about)]
struct Args {
    /// Library directory produced by build-vector-library.
    library: PathBuf,

    /// Word to look up.
    word: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    if !args.library.is_dir() {
        return Err(format!("{} is not a directory", args.library.display()).into());
    }

    let store = Arc::new(veclib::local(&args.library)?);
    let reader = LibraryReader::open(store, "").await?;

    let Some(entry) = reader.get(&args.word).await? else {
        println!("{:?} not found", args.word);
        return Ok(ExitCode::FAILURE);
    };

    println!("Entry: {}", entry.word);
    println!("Vector scaling: {}", entry.scale);
    println!("Vector data: {:?}", entry.codes);
    println!("Reconstituted vector: {:?}", reader.reconstruct(&entry));

    Ok(ExitCode::SUCCESS)
}
