use tracing::Level;
use tracing_subscriber::filter::LevelFilter;

pub mod fixtures;
pub mod stub;

pub use fixtures::{b64, png_bytes, tiny_tokenizer_json, tone_wav_bytes, wav_bytes};
pub use stub::StubModel;

/// Scoped subscriber for the calling test only.
pub fn init_test_tracing(
    level: impl Into<LevelFilter> + Into<Level> + Copy,
) -> tracing::subscriber::DefaultGuard {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = tracing_subscriber::filter::Targets::new()
        .with_target("bindserve", level)
        .with_target("bindserve_core", level)
        .with_target("bindserve_model", level)
        .with_target("tokenizers", Level::ERROR)
        .with_target("hf_hub", Level::WARN);

    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_level(true)
        .without_time()
        .pretty();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .set_default()
}
