//! Child-process audio plumbing: ffmpeg transcoding between Telegram voice
//! notes and raw audio, plus WAV framing.

use std::process::{Output, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::BotError;

/// Run `command` with `input` on stdin and collect its output.
///
/// Stdin is fed from its own task: a child that fills its stdout pipe before
/// reading all of its input would otherwise stall both sides.
pub async fn run_piped(mut command: Command, input: &[u8]) -> std::io::Result<Output> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| std::io::Error::other("child stdin unavailable"))?;
    let input = input.to_vec();
    let writer = tokio::spawn(async move {
        let result = stdin.write_all(&input).await;
        drop(stdin); // close stdin to signal EOF
        result
    });

    let output = child.wait_with_output().await?;

    if let Ok(Err(e)) = writer.await {
        // A broken pipe here just means the child exited early; the exit status tells the story.
        tracing::debug!("child stdin write ended early: {}", e);
    }

    Ok(output)
}

/// Pipe `input` through ffmpeg and collect stdout.
async fn run_ffmpeg(ffmpeg: &str, args: &[&str], input: &[u8]) -> Result<Vec<u8>, BotError> {
    let mut command = Command::new(ffmpeg);
    command
        .args(["-hide_banner", "-loglevel", "error", "-i", "pipe:0"])
        .args(args);

    let output = run_piped(command, input)
        .await
        .map_err(|e| BotError::Transcode(format!("failed to run {}: {}", ffmpeg, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BotError::Transcode(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}

/// Convert OGG/Opus audio to PCM f32 16kHz mono.
pub async fn ogg_to_pcm(ffmpeg: &str, ogg_data: &[u8]) -> Result<Vec<f32>, BotError> {
    let raw = run_ffmpeg(
        ffmpeg,
        &["-f", "f32le", "-acodec", "pcm_f32le", "-ar", "16000", "-ac", "1", "pipe:1"],
        ogg_data,
    )
    .await?;
    Ok(f32le_samples(&raw))
}

/// Convert WAV to OGG/Opus for Telegram voice messages.
pub async fn wav_to_ogg(ffmpeg: &str, wav_data: &[u8]) -> Result<Vec<u8>, BotError> {
    run_ffmpeg(ffmpeg, &["-acodec", "libopus", "-f", "ogg", "pipe:1"], wav_data).await
}

/// Decode little-endian f32 samples. A trailing partial sample is dropped.
pub fn f32le_samples(raw: &[u8]) -> Vec<f32> {
    raw.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Convert raw PCM (s16le) bytes into a proper WAV file in memory.
pub fn pcm_to_wav(pcm: &[u8], sample_rate: u32, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    let data_size = pcm.len() as u32;
    let byte_rate = sample_rate * channels as u32 * bits_per_sample as u32 / 8;
    let block_align = channels * bits_per_sample / 8;
    let file_size = 36 + data_size;

    let mut wav = Vec::with_capacity(44 + pcm.len());
    // RIFF header
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&file_size.to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    // fmt chunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());
    // data chunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    wav.extend_from_slice(pcm);

    wav
}
