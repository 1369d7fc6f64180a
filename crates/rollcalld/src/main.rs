use anyhow::Result;
use tracing_subscriber::EnvFilter;

use rollcalld::config::Config;
use rollcalld::gallery;
use rollcalld::ledger::AttendanceLedger;
use rollcalld::pipeline::{self, FramePipeline};
use rollcalld::protocol::{StdioSink, StdioSource};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("rollcalld starting");

    let config = Config::from_env();
    let ledger = AttendanceLedger::open(&config.ledger_path, config.cutoff_time)?;

    let stdin = std::io::stdin();
    let mut source = StdioSource::new(stdin.lock());

    let entries = source.handshake();
    tracing::info!(
        gallery_dir = %config.gallery_dir.display(),
        enrollments = entries.len(),
        "encoding gallery"
    );
    let known = gallery::build_gallery(entries);
    tracing::info!(identities = known.len(), "system ready, blink to verify");

    let mut pipeline = FramePipeline::new(&config, known, ledger);
    let mut sink = StdioSink::new(std::io::stdout());

    pipeline::run_session(&mut pipeline, source, &mut sink);

    tracing::info!(recorded = pipeline.ledger().len(), "rollcalld shutting down");
    Ok(())
}
