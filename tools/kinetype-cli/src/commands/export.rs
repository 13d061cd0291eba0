//! Export the test pattern to a video file.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use kinetype_common::config::{AppConfig, QualityPreset};
use kinetype_export::{EncoderService, ExportSettings, Exporter, FfmpegEncoder, TestPatternEngine};
use kinetype_export_model::progress::ExportProgress;

use crate::RangeArgs;

pub struct ExportOptions {
    pub range: RangeArgs,
    pub output: PathBuf,
    pub audio: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub quality: Option<QualityPreset>,
    pub overlays: bool,
    pub work_dir: Option<PathBuf>,
}

pub async fn run(config: AppConfig, options: ExportOptions) -> anyhow::Result<()> {
    let mut spec = super::spec_from_range(&options.range, &config.export, &options.output)
        .with_overlays(options.overlays);
    if let Some(quality) = options.quality {
        spec = spec.with_quality(quality);
    }
    if let Some(audio) = &options.audio {
        spec = spec.with_audio(audio);
    }

    let encoder = FfmpegEncoder::new(&config.encoder);
    if !encoder.is_available().await {
        return Err(anyhow::anyhow!(
            "ffmpeg not found at {}. Install ffmpeg or set encoder.ffmpeg_path in {}",
            config.encoder.ffmpeg_path.display(),
            AppConfig::path().display()
        ));
    }

    let mut settings = ExportSettings::from(&config.export);
    if let Some(concurrency) = options.concurrency {
        settings.encode_concurrency = concurrency.max(1);
    }
    if options.work_dir.is_some() {
        settings.work_dir = options.work_dir;
    }

    let exporter = Arc::new(Exporter::new(
        Arc::new(TestPatternEngine::new()),
        Arc::new(encoder),
        settings,
    ));
    let estimate = exporter.estimate(&spec)?;

    println!("Exporting test pattern");
    println!("  Output: {}", spec.output_path.display());
    println!(
        "  Range: {}ms - {}ms @ {}fps ({} frames)",
        spec.start_ms, spec.end_ms, spec.fps, estimate.total_frames
    );
    println!("  Resolution: {}x{}", spec.width, spec.height);
    println!(
        "  Batches: {} x {} frames, quality {}",
        estimate.batch_count,
        spec.batch_size,
        spec.quality.as_str()
    );
    if let Some(audio) = spec.audio_track() {
        println!("  Audio: {}", audio.display());
    }

    let interrupt = tokio::spawn({
        let exporter = exporter.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, cancelling export");
                exporter.cancel();
            }
        }
    });

    let result = exporter.start(spec, print_progress).await;
    interrupt.abort();

    match result {
        Ok(path) => {
            println!("\nExport complete: {}", path.display());
            Ok(())
        }
        Err(failure) if failure.error.is_cancelled() => {
            println!("\nExport cancelled");
            Ok(())
        }
        Err(failure) => {
            println!();
            if let Some(last) = &failure.last_progress {
                println!("  Stopped during {} at {:.1}%", last.phase.as_str(), last.percent);
            }
            Err(anyhow::Error::new(failure).context("Export failed"))
        }
    }
}

fn print_progress(p: ExportProgress) {
    let counts = match (p.current, p.total) {
        (Some(current), Some(total)) => format!(" ({current}/{total})"),
        _ => String::new(),
    };
    print!("\r  Progress: {:5.1}% {}{}      ", p.percent, p.phase.as_str(), counts);
    std::io::stdout().flush().ok();
}
