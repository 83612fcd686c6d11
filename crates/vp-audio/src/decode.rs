use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::AnalysisError;
use crate::waveform::Waveform;

/// Decode a two-microphone recording into a [`Waveform`].
///
/// Channel 0 becomes microphone 1 and channel 1 microphone 2; further
/// channels are ignored. Samples keep their native rate, with no downmix and
/// no resampling, since the delay model works in absolute sample time.
///
/// # Errors
/// Returns an error if the file cannot be opened or decoded, has fewer than
/// two channels, or does not declare a sample rate.
///
/// # Example
/// ```no_run
/// use vp_audio::decode::decode_stereo;
/// let wave = decode_stereo("roadside.wav").unwrap();
/// println!("{} s @ {} Hz", wave.duration_secs(), wave.sample_rate());
/// ```
pub fn decode_stereo(path: impl AsRef<Path>) -> Result<Waveform> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Cannot open audio file: {}", path.display()))?;
    let mss = MediaSourceStream::new(
        Box::new(file),
        symphonia::core::io::MediaSourceStreamOptions::default(),
    );

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AnalysisError::Decode(format!("cannot probe {}: {e}", path.display())))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| AnalysisError::Decode(format!("no audio track in {}", path.display())))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .context("Audio track does not declare a sample rate")?;
    let channels = track
        .codec_params
        .channels
        .map_or(1, symphonia::core::audio::Channels::count);
    if channels < 2 {
        return Err(AnalysisError::ChannelLayout(format!(
            "{} has {channels} channel(s), two microphones are required",
            path.display()
        ))
        .into());
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AnalysisError::Decode(format!("no decoder for {}: {e}", path.display())))?;

    let track_id = track.id;
    let mut left: Vec<f64> = Vec::new();
    let mut right: Vec<f64> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut max_sample_frames: usize = 0;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::warn!("Audio decode packet error: {e}");
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("Audio decode frame error: {e}");
                continue;
            }
        };

        let spec = *decoded.spec();
        let num_frames = decoded.capacity();
        // Reuse SampleBuffer: only reallocate if this packet is bigger than current capacity
        if sample_buf.is_none() || num_frames > max_sample_frames {
            sample_buf = Some(SampleBuffer::<f32>::new(num_frames as u64, spec));
            max_sample_frames = num_frames;
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        for frame in buf.samples().chunks_exact(channels) {
            left.push(f64::from(frame[0]));
            right.push(f64::from(frame[1]));
        }
    }

    log::info!(
        "Decoded {} stereo samples @ {}Hz from {}",
        left.len(),
        sample_rate,
        path.display()
    );

    Ok(Waveform::new(left, right, sample_rate)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};

    /// 16-bit PCM WAV with one `Vec` per channel, written interleaved.
    fn write_wav(path: &Path, channels: &[Vec<i16>], sample_rate: u32) {
        let spec = WavSpec {
            channels: channels.len() as u16,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for i in 0..channels[0].len() {
            for ch in channels {
                writer.write_sample(ch[i]).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn stereo_channels_kept_apart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pass.wav");
        let left: Vec<i16> = (0..4800).map(|i| ((i % 100) * 100) as i16).collect();
        let right: Vec<i16> = left.iter().map(|s| -s).collect();
        write_wav(&path, &[left.clone(), right], 48_000);

        let wave = decode_stereo(&path).unwrap();
        assert_eq!(wave.sample_rate(), 48_000);
        assert_eq!(wave.len(), 4800);
        for i in [0, 1, 57, 4799] {
            let expected = f64::from(left[i]) / 32768.0;
            assert!((wave.left()[i] - expected).abs() < 1e-6, "left {i}");
            assert!((wave.right()[i] + expected).abs() < 1e-6, "right {i}");
        }
    }

    #[test]
    fn mono_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, &[vec![0; 480]], 48_000);

        let err = decode_stereo(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::ChannelLayout(_))
        ));
    }

    #[test]
    fn garbage_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.bin");
        std::fs::write(&path, [0x13u8; 1024]).unwrap();

        let err = decode_stereo(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::Decode(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = decode_stereo("/nonexistent/roadside.wav").unwrap_err();
        assert!(err.to_string().contains("roadside.wav"));
    }
}
