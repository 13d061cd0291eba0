//! Frame, batch and memory estimate for an export range.

use kinetype_common::config::AppConfig;
use kinetype_export::estimate;

use crate::RangeArgs;

pub fn run(config: &AppConfig, range: RangeArgs, json: bool) -> anyhow::Result<()> {
    let spec = super::spec_from_range(&range, &config.export, "estimate.mp4");
    let est = estimate(&spec)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&est)?);
        return Ok(());
    }

    println!(
        "Range: {}ms - {}ms @ {}fps, {}x{}",
        spec.start_ms, spec.end_ms, spec.fps, spec.width, spec.height
    );
    println!("  Frames: {}", est.total_frames);
    println!("  Frame size: {:.2} MiB", mib(est.frame_bytes));
    println!(
        "  Batches: {} x {} frames ({:.1} MiB raw per batch)",
        est.batch_count,
        spec.batch_size,
        mib(est.peak_memory_per_batch)
    );
    if est.recommended_batch_size != spec.batch_size {
        println!("  Recommended batch size: {}", est.recommended_batch_size);
    }
    Ok(())
}

fn mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
