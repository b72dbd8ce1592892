use eyre::Result;
use hound::{SampleFormat, WavReader};
use std::path::Path;

/// Reads a WAV file into mono f32 samples in [-1, 1], returning the file's
/// native sample rate. Multi-channel audio is channel-averaged.
pub fn read_wav<P: AsRef<Path>>(file_path: P) -> Result<(Vec<f32>, u32)> {
    let mut reader = WavReader::open(file_path)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
    };

    let mono = if spec.channels > 1 {
        downmix(&samples, spec.channels as usize)
    } else {
        samples
    };
    Ok((mono, spec.sample_rate))
}

fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Nearest-sample resampling. Good enough for speech models; callers wanting
/// band-limited quality should resample upstream.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (samples.len() as f64 * ratio) as usize;
    let mut resampled = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let source_index = ((i as f64 / ratio) as usize).min(samples.len() - 1);
        resampled.push(samples[source_index]);
    }
    resampled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_is_identity_at_equal_rates() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&samples, 16_000, 16_000), samples);
    }

    #[test]
    fn downsampling_halves_the_length() {
        let samples: Vec<f32> = (0..1_000).map(|i| i as f32).collect();
        let resampled = resample(&samples, 32_000, 16_000);
        assert_eq!(resampled.len(), 500);
        assert_eq!(resampled[0], 0.0);
        assert_eq!(resampled[1], 2.0);
    }

    #[test]
    fn stereo_is_averaged_to_mono() {
        let mono = downmix(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn wav_roundtrip_reads_back_int16() {
        let path = std::env::temp_dir().join("diarize_rs_wav_roundtrip.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for value in [0i16, 16_384, -16_384, 32_767] {
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();

        let (samples, rate) = read_wav(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(rate, 16_000);
        assert_eq!(samples.len(), 4);
        assert!(samples[0].abs() < 1e-6);
        assert!((samples[1] - 0.5).abs() < 1e-4);
        assert!((samples[2] + 0.5).abs() < 1e-4);
        assert!(samples[3] <= 1.0);
    }
}
