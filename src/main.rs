use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use voiceclip::{PlatformClass, Recorder, RecorderConfig, SynthRuntime};

/// Record a clip through the synthetic capture runtime and write it to disk.
#[derive(Debug, Parser)]
#[command(name = "voiceclip", version)]
struct Args {
    /// Recording length in seconds
    #[arg(long, default_value_t = 3)]
    seconds: u64,

    /// Output file for the finished artifact
    #[arg(long, default_value = "clip.wav")]
    out: PathBuf,

    /// Platform capture profile
    #[arg(long, value_enum, default_value = "desktop")]
    platform: PlatformClass,

    /// Config file (without extension), e.g. "config/voiceclip"
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => RecorderConfig::load(path)
            .with_context(|| format!("Failed to load config from {path}"))?,
        None => RecorderConfig::default(),
    };

    let recorder = Recorder::new(Arc::new(SynthRuntime::default()), args.platform, config);

    recorder.start().await.context("Failed to start recording")?;

    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    ticker.tick().await;
    for _ in 0..args.seconds * 2 {
        ticker.tick().await;
        info!(
            "recording... {:.1}s, level {:.2}",
            recorder.elapsed_ms() as f64 / 1000.0,
            recorder.input_level()
        );
    }

    let preview = recorder
        .stop_and_get_result()
        .await
        .context("Recording produced no result")?;

    std::fs::write(&args.out, preview.data())
        .with_context(|| format!("Failed to write {}", args.out.display()))?;

    info!(
        "Wrote {} ({} bytes, ~{}s, {})",
        args.out.display(),
        preview.size(),
        preview.duration_seconds(),
        preview.mime_type()
    );

    Ok(())
}
