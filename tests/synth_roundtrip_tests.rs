// End-to-end recording through the synthetic runtime: the assembled chunks
// must form a decodable WAV artifact whose duration survives the probe.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use voiceclip::{PlatformClass, Recorder, RecorderConfig, SynthRuntime};

#[tokio::test]
async fn test_synth_recording_roundtrip() -> Result<()> {
    let recorder = Recorder::new(
        Arc::new(SynthRuntime::default()),
        PlatformClass::Desktop,
        RecorderConfig::default(),
    );

    recorder.start().await?;
    assert!(recorder.is_recording());
    tokio::time::sleep(Duration::from_millis(400)).await;

    let preview = recorder
        .stop_and_get_result()
        .await
        .expect("synth recording should finalize");

    assert_eq!(preview.mime_type(), "audio/wav");
    assert!(preview.size() > 44, "artifact should carry audio payload");
    assert!(preview.duration_seconds() >= 1);
    assert!(!recorder.is_recording());

    // The concatenated chunks must be a well-formed WAV file on disk.
    let dir = TempDir::new()?;
    let path = dir.path().join("clip.wav");
    std::fs::write(&path, preview.data())?;

    let reader = hound::WavReader::open(&path)?;
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 44_100);
    assert!(reader.duration() > 0, "decoded WAV should contain frames");

    Ok(())
}

#[tokio::test]
async fn test_synth_level_meter_reports_signal() -> Result<()> {
    let recorder = Recorder::new(
        Arc::new(SynthRuntime::default()),
        PlatformClass::Mobile,
        RecorderConfig::default(),
    );

    recorder.start().await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let level = recorder.input_level();
    assert!(
        level > 0.0 && level <= 1.0,
        "tone should register on the meter, got {level}"
    );

    recorder.stop_and_get_result().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(recorder.input_level(), 0.0);

    Ok(())
}
