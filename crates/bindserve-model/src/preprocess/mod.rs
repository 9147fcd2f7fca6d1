//! Turn decoded request payloads into model-ready tensors.
pub mod audio;
pub mod fbank;
pub mod resample;
pub mod text;
pub mod vision;

pub use audio::{AudioPreprocessor, Waveform, clip_timepoints, decode_wav};
pub use fbank::{FbankOptions, kaldi_fbank};
pub use resample::resample;
pub use text::{TextPreprocessor, TokenBatch};
pub use vision::VisionPreprocessor;
