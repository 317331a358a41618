//! # hangsms CLI
//!
//! Command-line interface for the hangsms library.

use std::path::Path;
use std::process;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hangsms::cli::Args;
use hangsms::fetch::HttpMediaFetcher;
use hangsms::normalize;
use hangsms::output::write_backup_file;
use hangsms::BackupError;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hangsms=warn")),
        )
        .with_target(false)
        .init();

    if let Err(e) = run() {
        eprintln!("❌ Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), BackupError> {
    let total_start = Instant::now();
    let args = Args::parse();

    println!("📦 hangsms v{}", env!("CARGO_PKG_VERSION"));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📂 Input:   {}", args.input);
    println!("💾 Output:  {}", args.output);
    println!();

    println!("⏳ Parsing Hangouts data...");
    let parse_start = Instant::now();
    let export = normalize::parse_file(Path::new(&args.input), &args.phone_number)?;
    println!(
        "   Found {} conversations ({:.2}s)",
        export.conversations.len(),
        parse_start.elapsed().as_secs_f64()
    );

    println!("💾 Writing SMS backup XML...");
    let write_start = Instant::now();
    let fetcher = HttpMediaFetcher::new()?;
    let stats = write_backup_file(
        Path::new(&args.output),
        &export.conversations,
        export.self_gaia_id.as_ref(),
        &fetcher,
    )?;
    println!("   Written in {:.2}s", write_start.elapsed().as_secs_f64());

    println!();
    println!("✅ Done! Output saved to {}", args.output);
    println!();
    println!("📊 Summary:");
    println!("   Threads:   {}", stats.threads);
    println!("   SMS:       {}", stats.sms);
    println!("   MMS:       {}", stats.mms);
    if stats.skipped_messages > 0 {
        println!("   Skipped:   {} messages", stats.skipped_messages);
    }
    if stats.skipped_attachments > 0 {
        println!("   Skipped:   {} attachments", stats.skipped_attachments);
    }
    println!();
    println!("⚡ Total time: {:.2}s", total_start.elapsed().as_secs_f64());

    Ok(())
}
