//! Generated media payloads for tests; nothing is read from disk.
use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{ImageFormat, Rgb, RgbImage};

/// Standard padded base64, as a client would send it.
pub fn b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// A PNG with a diagonal colour gradient.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    });
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encoding an in-memory PNG");
    bytes
}

/// 16-bit PCM WAV with interleaved `samples`.
pub fn wav_bytes(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("WAV header");
        for s in samples {
            writer.write_sample(*s).expect("WAV sample");
        }
        writer.finalize().expect("WAV finalize");
    }
    cursor.into_inner()
}

/// Mono sine tone at half scale.
pub fn tone_wav_bytes(freq_hz: f32, seconds: f32, sample_rate: u32) -> Vec<u8> {
    let n = (seconds * sample_rate as f32) as usize;
    let samples: Vec<i16> = (0..n)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            ((2.0 * std::f32::consts::PI * freq_hz * t).sin() * 16_000.0) as i16
        })
        .collect();
    wav_bytes(&samples, sample_rate, 1)
}

/// A word-level tokenizer definition with `<start>`/`<end>` wrapping, whose
/// end token has the highest id (as in the CLIP vocabulary).
///
/// Ids: `<pad>` 0, `<unk>` 1, words 2.., `<start>` `vocab_size - 2`,
/// `<end>` `vocab_size - 1`.
pub fn tiny_tokenizer_json(words: &[&str], vocab_size: u32) -> String {
    let mut vocab = serde_json::Map::new();
    vocab.insert("<pad>".into(), 0.into());
    vocab.insert("<unk>".into(), 1.into());
    for (i, w) in words.iter().enumerate() {
        vocab.insert((*w).to_string(), (i as u32 + 2).into());
    }
    let start = vocab_size - 2;
    let end = vocab_size - 1;
    vocab.insert("<start>".into(), start.into());
    vocab.insert("<end>".into(), end.into());

    let special = |id: &str| serde_json::json!({"SpecialToken": {"id": id, "type_id": 0}});
    let seq = |id: &str| serde_json::json!({"Sequence": {"id": id, "type_id": 0}});
    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": {
            "type": "TemplateProcessing",
            "single": [special("<start>"), seq("A"), special("<end>")],
            "pair": [special("<start>"), seq("A"), seq("B"), special("<end>")],
            "special_tokens": {
                "<start>": {"id": "<start>", "ids": [start], "tokens": ["<start>"]},
                "<end>": {"id": "<end>", "ids": [end], "tokens": ["<end>"]}
            }
        },
        "decoder": null,
        "model": {"type": "WordLevel", "vocab": vocab, "unk_token": "<unk>"}
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_fixture_decodes() {
        let img = image::load_from_memory(&png_bytes(40, 30)).unwrap();
        assert_eq!((img.width(), img.height()), (40, 30));
    }

    #[test]
    fn tone_fixture_has_expected_length() {
        let bytes = tone_wav_bytes(440.0, 0.5, 8_000);
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.len(), 4_000);
    }
}
