//! `keepfetch fetch` – download a list of files from one host.

use anyhow::{bail, Context, Result};
use keepfetch_core::config::KeepfetchConfig;
use keepfetch_core::throughput::Throughput;
use keepfetch_core::{
    ConnectionPool, Connector, PoolOptions, RunReport, TaskOutcome, TcpConnector,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::manifest::{self, Entry};

const PROGRESS_INTERVAL_MS: u64 = 500;
const MIB: f64 = 1_048_576.0;

#[derive(Debug)]
pub struct FetchArgs {
    pub urls: Vec<String>,
    pub manifest: Option<PathBuf>,
    pub dest_dir: PathBuf,
    pub connections: Option<usize>,
    pub plain: bool,
    pub json: bool,
}

pub async fn run_fetch(cfg: &KeepfetchConfig, args: FetchArgs) -> Result<()> {
    let entries = collect_entries(&args)?;
    let sources: Vec<String> = entries.iter().map(|e| e.url.clone()).collect();
    let destinations: Vec<PathBuf> = entries.into_iter().map(|e| e.destination).collect();
    let max_connections = args.connections.unwrap_or(cfg.max_connections);
    let options = PoolOptions::from(cfg);
    let throughput = Arc::new(Throughput::new());
    let show_progress = !args.json;

    let report = if args.plain {
        let pool =
            ConnectionPool::with_connector(&sources, &destinations, max_connections, TcpConnector)?
                .with_options(options)
                .with_throughput(Arc::clone(&throughput));
        drive(pool, &throughput, show_progress).await
    } else {
        let pool = ConnectionPool::new(&sources, &destinations, max_connections)?
            .with_options(options)
            .with_throughput(Arc::clone(&throughput));
        drive(pool, &throughput, show_progress).await
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.summary())?);
    } else {
        print_summary(&report);
    }

    if let Some(reason) = report.skipped {
        bail!("nothing downloaded: {}", reason);
    }
    if !report.is_complete_success() {
        let incomplete = report
            .records
            .iter()
            .filter(|r| !matches!(r.outcome, TaskOutcome::Written { partial: false, .. }))
            .count();
        bail!(
            "{} of {} download(s) did not complete",
            incomplete,
            report.records.len()
        );
    }
    Ok(())
}

/// Positional URLs first (saved under `dest_dir`), then manifest entries.
fn collect_entries(args: &FetchArgs) -> Result<Vec<Entry>> {
    let mut entries = Vec::with_capacity(args.urls.len());
    for url in &args.urls {
        entries.push(Entry {
            url: url.clone(),
            destination: manifest::default_destination(url, &args.dest_dir)?,
        });
    }
    if let Some(path) = &args.manifest {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        entries.extend(manifest::parse_manifest(&text, &args.dest_dir)?);
    }
    if entries.is_empty() {
        bail!("no URLs given (pass URLs or --manifest FILE)");
    }
    Ok(entries)
}

/// Run the pool, printing received bytes and rate every interval.
async fn drive<C: Connector>(
    pool: ConnectionPool<C>,
    throughput: &Throughput,
    show_progress: bool,
) -> RunReport {
    let run = pool.run();
    tokio::pin!(run);
    let mut ticker = tokio::time::interval(Duration::from_millis(PROGRESS_INTERVAL_MS));
    // First tick completes immediately.
    ticker.tick().await;
    let mut last = throughput.snapshot();

    loop {
        tokio::select! {
            report = &mut run => return report,
            _ = ticker.tick(), if show_progress => {
                let now = throughput.snapshot();
                println!(
                    "  {:.1} MiB received  {:.2} MiB/s  ",
                    now.bytes as f64 / MIB,
                    now.rate_since(&last) / MIB
                );
                last = now;
            }
        }
    }
}

fn print_summary(report: &RunReport) {
    let summary = report.summary();
    if let Some(reason) = &summary.skipped {
        println!("Nothing downloaded: {}", reason);
        return;
    }
    println!(
        "{} written, {} dropped, {} failed ({} task(s), {} connection(s), {:.1} MiB in {:.1}s)",
        summary.written,
        summary.dropped,
        summary.failed,
        summary.total,
        summary.connections_opened,
        summary.bytes_received as f64 / MIB,
        summary.elapsed_secs
    );
    for task in summary.tasks.iter().filter(|t| t.error.is_some()) {
        println!(
            "  [{}] {} -> {}: {}",
            task.status,
            task.source,
            task.destination,
            task.error.as_deref().unwrap_or_default()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(urls: &[&str], manifest: Option<PathBuf>, dest_dir: PathBuf) -> FetchArgs {
        FetchArgs {
            urls: urls.iter().map(|s| s.to_string()).collect(),
            manifest,
            dest_dir,
            connections: None,
            plain: false,
            json: false,
        }
    }

    #[test]
    fn collect_entries_merges_urls_and_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let manifest = tmp.path().join("list.txt");
        std::fs::write(&manifest, "https://h.example/m.bin saved/m.bin\n").unwrap();

        let entries = collect_entries(&args(
            &["https://h.example/a.bin"],
            Some(manifest),
            tmp.path().to_path_buf(),
        ))
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].destination, tmp.path().join("a.bin"));
        assert_eq!(entries[1].url, "https://h.example/m.bin");
        assert_eq!(entries[1].destination, tmp.path().join("saved/m.bin"));
    }

    #[test]
    fn collect_entries_requires_something() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(collect_entries(&args(&[], None, tmp.path().to_path_buf())).is_err());
    }

    #[test]
    fn collect_entries_missing_manifest_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.txt");
        let err = collect_entries(&args(&[], Some(missing), tmp.path().to_path_buf())).unwrap_err();
        assert!(format!("{:#}", err).contains("reading manifest"));
    }
}
