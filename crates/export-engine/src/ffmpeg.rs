//! ffmpeg-backed encoder service.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context};
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use kinetype_common::config::{EncoderConfig, QualityPreset};

use crate::encoder::{ConcatRequest, EncoderService, SegmentRequest};

/// Name of the concat-demuxer list written next to the segments.
const CONCAT_LIST_NAME: &str = "segments.ffconcat";

/// Encoder service that shells out to `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    extra_args: Vec<String>,
}

impl FfmpegEncoder {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            extra_args: config.extra_args.clone(),
        }
    }

    async fn run(&self, args: &[String]) -> anyhow::Result<()> {
        tracing::debug!(ffmpeg = %self.ffmpeg.display(), args = ?args, "Running ffmpeg");
        let mut child = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.ffmpeg.display()))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                match stderr.read_to_end(&mut buf).await {
                    Ok(_) => String::from_utf8_lossy(&buf).into_owned(),
                    Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
                }
            })
        });

        let status = child.wait().await.context("Failed to wait on ffmpeg")?;
        let stderr_output = match stderr_task {
            Some(task) => task
                .await
                .unwrap_or_else(|_| "<failed to join stderr reader>".to_string()),
            None => String::new(),
        };

        if !status.success() {
            bail!("ffmpeg failed (status {}): {}", status, stderr_output.trim());
        }
        Ok(())
    }
}

#[async_trait]
impl EncoderService for FfmpegEncoder {
    async fn encode_image_sequence(&self, request: SegmentRequest) -> anyhow::Result<PathBuf> {
        if request.frames.is_empty() {
            bail!("batch {} has no frames", request.batch.index);
        }
        if request.frames.len() as u64 != request.batch.len() {
            bail!(
                "batch {} covers {} frames but {} files were given",
                request.batch.index,
                request.batch.len(),
                request.frames.len()
            );
        }

        let args = segment_args(&request, &self.extra_args);
        self.run(&args).await?;
        ensure_non_empty(&request.output).await?;
        Ok(request.output)
    }

    async fn concatenate_segments(&self, request: ConcatRequest) -> anyhow::Result<PathBuf> {
        let Some(first) = request.segments.first() else {
            bail!("no segments to concatenate");
        };
        let list_dir = first.parent().unwrap_or_else(|| Path::new("."));
        let list_path = list_dir.join(CONCAT_LIST_NAME);
        tokio::fs::write(&list_path, concat_list(&request.segments))
            .await
            .with_context(|| format!("Failed to write {}", list_path.display()))?;

        let args = concat_args(&request, &list_path);
        self.run(&args).await?;
        ensure_non_empty(&request.output).await?;
        Ok(request.output)
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

async fn ensure_non_empty(path: &Path) -> anyhow::Result<()> {
    let meta = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("ffmpeg reported success but {} is missing", path.display()))?;
    if meta.len() == 0 {
        bail!("ffmpeg wrote an empty file at {}", path.display());
    }
    Ok(())
}

fn common_args() -> Vec<String> {
    vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-nostats".to_string(),
    ]
}

fn quality_args(quality: QualityPreset) -> Vec<String> {
    let (preset, crf) = match quality {
        QualityPreset::Draft => ("veryfast", "28"),
        QualityPreset::Standard => ("medium", "20"),
        QualityPreset::High => ("slow", "16"),
    };
    vec![
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        preset.to_string(),
        "-crf".to_string(),
        crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ]
}

fn segment_args(request: &SegmentRequest, extra_args: &[String]) -> Vec<String> {
    let mut args = common_args();
    args.extend([
        "-framerate".to_string(),
        request.fps.to_string(),
        "-start_number".to_string(),
        request.batch.start.to_string(),
        "-i".to_string(),
        request.frame_pattern.display().to_string(),
        "-frames:v".to_string(),
        request.batch.len().to_string(),
        "-s".to_string(),
        format!("{}x{}", request.width, request.height),
    ]);
    args.append(&mut quality_args(request.quality));
    args.extend([
        "-r".to_string(),
        request.fps.to_string(),
        "-an".to_string(),
    ]);
    args.extend(extra_args.iter().cloned());
    args.push(request.output.display().to_string());
    args
}

fn concat_args(request: &ConcatRequest, list_path: &Path) -> Vec<String> {
    let mut args = common_args();
    args.extend([
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list_path.display().to_string(),
    ]);

    if let Some(audio) = &request.audio {
        args.push("-i".to_string());
        args.push(audio.display().to_string());
    }

    args.extend([
        "-map".to_string(),
        "0:v:0".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
    ]);

    if request.audio.is_some() {
        args.extend([
            "-map".to_string(),
            "1:a:0".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
        ]);
    }

    args.extend(["-t".to_string(), format!("{:.6}", request.duration_secs)]);
    let muxer = muxer_for(&request.output);
    // faststart relocates the moov atom, which only ISO-BMFF muxers have.
    if matches!(muxer, Some("mp4" | "mov")) {
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    }
    if let Some(format) = muxer {
        args.push("-f".to_string());
        args.push(format.to_string());
    }
    args.push(request.output.display().to_string());
    args
}

fn muxer_for(path: &Path) -> Option<&'static str> {
    match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
        "mp4" | "m4v" => Some("mp4"),
        "mov" => Some("mov"),
        "mkv" => Some("matroska"),
        _ => None,
    }
}

fn concat_list(segments: &[PathBuf]) -> String {
    let mut list = String::from("ffconcat version 1.0\n");
    for segment in segments {
        let escaped = segment.display().to_string().replace('\'', r"'\''");
        list.push_str(&format!("file '{escaped}'\n"));
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinetype_export_model::batch::Batch;

    fn request() -> SegmentRequest {
        SegmentRequest {
            batch: Batch {
                index: 1,
                start: 150,
                end: 300,
            },
            frames: Vec::new(),
            frame_pattern: PathBuf::from("/work/frames/frame_%06d.png"),
            fps: 30,
            width: 1280,
            height: 720,
            quality: QualityPreset::Draft,
            output: PathBuf::from("/work/segments/segment_0001.mp4"),
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_segment_args_address_batch_range() {
        let args = segment_args(&request(), &[]);
        assert_eq!(value_after(&args, "-start_number"), Some("150"));
        assert_eq!(value_after(&args, "-frames:v"), Some("150"));
        assert_eq!(value_after(&args, "-framerate"), Some("30"));
        assert_eq!(value_after(&args, "-preset"), Some("veryfast"));
        assert_eq!(value_after(&args, "-pix_fmt"), Some("yuv420p"));
        assert_eq!(args.last().unwrap(), "/work/segments/segment_0001.mp4");
    }

    #[test]
    fn test_extra_args_precede_output() {
        let extra = vec!["-tune".to_string(), "animation".to_string()];
        let args = segment_args(&request(), &extra);
        let n = args.len();
        assert_eq!(&args[n - 3..n - 1], &extra[..]);
    }

    #[test]
    fn test_concat_args_without_audio_copy_video_only() {
        let req = ConcatRequest {
            segments: vec![PathBuf::from("/w/segment_0000.mp4")],
            audio: None,
            duration_secs: 10.0,
            output: PathBuf::from("/out/.song.abc.partial.mp4"),
        };
        let args = concat_args(&req, Path::new("/w/segments.ffconcat"));
        assert_eq!(value_after(&args, "-c:v"), Some("copy"));
        assert!(!args.iter().any(|a| a == "1:a:0"));
        assert_eq!(value_after(&args, "-t"), Some("10.000000"));
        assert_eq!(args[args.len() - 2], "mp4");
        assert_eq!(value_after(&args, "-movflags"), Some("+faststart"));
    }

    #[test]
    fn test_concat_args_with_audio_maps_second_input() {
        let req = ConcatRequest {
            segments: vec![PathBuf::from("/w/segment_0000.mp4")],
            audio: Some(PathBuf::from("/music/song.mp3")),
            duration_secs: 4.5,
            output: PathBuf::from("/out/video.mkv"),
        };
        let args = concat_args(&req, Path::new("/w/segments.ffconcat"));
        let inputs: Vec<&str> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "-i")
            .map(|(i, _)| args[i + 1].as_str())
            .collect();
        assert_eq!(inputs, vec!["/w/segments.ffconcat", "/music/song.mp3"]);
        assert!(args.iter().any(|a| a == "1:a:0"));
        assert_eq!(args[args.len() - 2], "matroska");
        assert!(!args.iter().any(|a| a == "-movflags"));
    }

    #[test]
    fn test_concat_list_preserves_order_and_escapes_quotes() {
        let list = concat_list(&[
            PathBuf::from("/w/segment_0000.mp4"),
            PathBuf::from("/w/it's/segment_0001.mp4"),
        ]);
        let lines: Vec<&str> = list.lines().collect();
        assert_eq!(lines[0], "ffconcat version 1.0");
        assert_eq!(lines[1], "file '/w/segment_0000.mp4'");
        assert_eq!(lines[2], r"file '/w/it'\''s/segment_0001.mp4'");
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let encoder = FfmpegEncoder::new(&EncoderConfig {
            ffmpeg_path: PathBuf::from("/nonexistent/kinetype-ffmpeg"),
            extra_args: Vec::new(),
        });
        assert!(!encoder.is_available().await);
    }
}
