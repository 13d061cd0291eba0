//! Check encoder availability.

use kinetype_common::config::AppConfig;
use kinetype_export::{EncoderService, FfmpegEncoder};

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Kinetype System Check");
    println!("{}", "=".repeat(50));

    let encoder = FfmpegEncoder::new(&config.encoder);
    let ffmpeg_ok = encoder.is_available().await;
    if ffmpeg_ok {
        println!(
            "[OK] Encoder: {} ({})",
            encoder.name(),
            config.encoder.ffmpeg_path.display()
        );
    } else {
        println!(
            "[FAIL] Encoder: {} not runnable at {}",
            encoder.name(),
            config.encoder.ffmpeg_path.display()
        );
    }

    let config_path = AppConfig::path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[INFO] Config: using defaults ({} not found)", config_path.display());
    }

    let work_dir = config
        .export
        .work_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    println!("[OK] Working directory root: {}", work_dir.display());

    println!();
    if ffmpeg_ok {
        println!("All required capabilities are available. Kinetype is ready.");
    } else {
        println!("ffmpeg is required for export. Install it or set encoder.ffmpeg_path.");
    }
    Ok(())
}
