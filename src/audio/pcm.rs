//! PCM16 encoding of captured float samples for the wire format

use base64::Engine;

/// Full-scale value used when converting normalised floats to PCM16
pub const PCM16_SCALE: f32 = 32767.0;

/// Convert one normalised sample to PCM16
///
/// Values outside [-1, 1] are clamped. NaN encodes as silence.
pub fn sample_to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * PCM16_SCALE) as i16
}

/// Encode float samples as PCM16 bytes in the platform's native byte order
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&sample_to_pcm16(sample).to_ne_bytes());
    }
    bytes
}

/// Decode native-order PCM16 bytes back to normalised floats
///
/// A trailing odd byte is ignored.
pub fn decode_pcm16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_ne_bytes([pair[0], pair[1]]) as f32 / PCM16_SCALE)
        .collect()
}

/// Encode samples and wrap them in the base64 text envelope used by `input_audio_buffer.append`
pub fn encode_base64_pcm16(samples: &[f32]) -> String {
    base64::engine::general_purpose::STANDARD.encode(encode_pcm16(samples))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: f32 = 1.0 / PCM16_SCALE;
    // One quantization step plus f32 representation error
    const TOLERANCE: f32 = STEP + f32::EPSILON;

    #[test]
    fn out_of_range_samples_clamp_to_boundaries() {
        let upper = encode_pcm16(&[1.0]);
        let lower = encode_pcm16(&[-1.0]);
        for i in 1..200 {
            let over = 1.0 + i as f32 * 0.37;
            assert_eq!(encode_pcm16(&[over]), upper, "sample {}", over);
            assert_eq!(encode_pcm16(&[-over]), lower, "sample {}", -over);
        }
        assert_eq!(encode_pcm16(&[f32::INFINITY]), upper);
        assert_eq!(encode_pcm16(&[f32::NEG_INFINITY]), lower);
    }

    #[test]
    fn in_range_samples_survive_round_trip_within_one_step() {
        let inputs: Vec<f32> = (-1000..=1000).map(|i| i as f32 / 1000.0).collect();
        let decoded = decode_pcm16(&encode_pcm16(&inputs));
        assert_eq!(decoded.len(), inputs.len());
        for (input, output) in inputs.iter().zip(decoded.iter()) {
            assert!(
                (input - output).abs() <= TOLERANCE,
                "input {} decoded to {}",
                input,
                output
            );
        }
    }

    #[test]
    fn small_values_round_trip() {
        for &sample in &[0.0f32, STEP, -STEP, 0.5 * STEP, 1e-7, -0.999_99] {
            let decoded = decode_pcm16(&encode_pcm16(&[sample]));
            assert!((decoded[0] - sample).abs() <= TOLERANCE);
        }
    }

    #[test]
    fn encoding_uses_native_byte_order() {
        let bytes = encode_pcm16(&[0.5, -0.25]);
        assert_eq!(bytes.len(), 4);
        assert_eq!(i16::from_ne_bytes([bytes[0], bytes[1]]), 16383);
        assert_eq!(i16::from_ne_bytes([bytes[2], bytes[3]]), -8191);
    }

    #[test]
    fn nan_encodes_as_silence() {
        assert_eq!(sample_to_pcm16(f32::NAN), 0);
    }

    #[test]
    fn base64_envelope_decodes_to_pcm_bytes() {
        let samples = [0.1, -0.2, 0.3];
        let text = encode_base64_pcm16(&samples);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(text)
            .unwrap();
        assert_eq!(bytes, encode_pcm16(&samples));
    }

    #[test]
    fn empty_input_encodes_to_nothing() {
        assert!(encode_pcm16(&[]).is_empty());
        assert!(decode_pcm16(&[7]).is_empty());
    }
}
