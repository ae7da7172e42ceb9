//! Static registry of the supported recognition models.

use crate::error::{Error, Result};

/// How raw audio must be chunked before the recognizer accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingPolicy {
    /// Every resampled block is forwarded as-is, one feed call per block.
    StreamingPassthrough,
    /// The recognizer only accepts complete fixed-size windows; partial
    /// windows stay buffered until enough samples arrive.
    FixedWindowCtc,
}

/// Which files the recognizer binds to, by role.
#[derive(Debug, Clone, Copy)]
pub enum EngineLayout {
    Transducer {
        encoder: &'static str,
        decoder: &'static str,
        joiner: &'static str,
    },
    CtcSingleFile {
        model: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    /// Path prefix the model's files are fetched under, relative to the
    /// asset base URL.
    pub remote_dir: &'static str,
    pub files: &'static [&'static str],
    pub sample_rate: u32,
    pub framing: FramingPolicy,
    pub layout: EngineLayout,
    /// Models whose layout carries a dedicated encoder stage hold back
    /// trailing context; the session flushes it by feeding a second of
    /// silence after every block and re-reading the partial text.
    pub tail_padded_flush: bool,
}

pub const SUPPORTED_MODELS: &[ModelDescriptor] = &[
    ModelDescriptor {
        id: "vosk",
        name: "Vosk Zipformer (int8)",
        remote_dir: "ru-asr-vosk-i8/",
        files: &[
            "encoder.int8.onnx",
            "decoder.onnx",
            "joiner.int8.onnx",
            "tokens.txt",
        ],
        sample_rate: 16000,
        framing: FramingPolicy::StreamingPassthrough,
        layout: EngineLayout::Transducer {
            encoder: "encoder.int8.onnx",
            decoder: "decoder.onnx",
            joiner: "joiner.int8.onnx",
        },
        tail_padded_flush: true,
    },
    ModelDescriptor {
        id: "t1",
        name: "T-One CTC",
        remote_dir: "ru-asr-t1/",
        files: &["model.onnx", "tokens.txt"],
        sample_rate: 8000,
        framing: FramingPolicy::FixedWindowCtc,
        layout: EngineLayout::CtcSingleFile {
            model: "model.onnx",
        },
        tail_padded_flush: false,
    },
];

/// Look up a model by identifier.
pub fn describe(model_id: &str) -> Result<&'static ModelDescriptor> {
    SUPPORTED_MODELS
        .iter()
        .find(|m| m.id == model_id)
        .ok_or_else(|| Error::UnknownModel(model_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_known_models() {
        let vosk = describe("vosk").unwrap();
        assert_eq!(vosk.sample_rate, 16000);
        assert_eq!(vosk.framing, FramingPolicy::StreamingPassthrough);
        assert!(vosk.tail_padded_flush);
        assert!(matches!(vosk.layout, EngineLayout::Transducer { .. }));

        let t1 = describe("t1").unwrap();
        assert_eq!(t1.sample_rate, 8000);
        assert_eq!(t1.framing, FramingPolicy::FixedWindowCtc);
        assert!(!t1.tail_padded_flush);
        assert_eq!(t1.files.len(), 2);
    }

    #[test]
    fn test_describe_unknown_model() {
        let err = describe("whisper-large").unwrap_err();
        assert!(matches!(err, Error::UnknownModel(ref id) if id == "whisper-large"));
    }

    #[test]
    fn test_layout_files_are_listed_as_assets() {
        for model in SUPPORTED_MODELS {
            match model.layout {
                EngineLayout::Transducer {
                    encoder,
                    decoder,
                    joiner,
                } => {
                    for role in [encoder, decoder, joiner] {
                        assert!(model.files.contains(&role));
                    }
                }
                EngineLayout::CtcSingleFile { model: file } => {
                    assert!(model.files.contains(&file));
                }
            }
        }
    }
}
