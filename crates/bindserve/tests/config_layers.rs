use std::collections::HashMap;
use std::io::Write;

use bindserve::{ServeConfig, Variant};
use bindserve_model::DevicePreference;

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn toml_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn defaults_without_sources() {
    let config = ServeConfig::load_with_env(None, HashMap::new()).unwrap();
    assert_eq!(config, ServeConfig::default());
}

#[test]
fn file_values_are_read() {
    let file = toml_file(
        r#"
variant = "legacy"
batch_size = 4

[device]
preference = "cpu"

[weights]
path = "weights/imagebind.safetensors"
"#,
    );
    let config = ServeConfig::load_with_env(Some(file.path()), HashMap::new()).unwrap();
    assert_eq!(config.variant, Variant::Legacy);
    assert_eq!(config.batch_size, 4);
    assert_eq!(config.device.preference, DevicePreference::Cpu);
    assert!(config.device.allow_fallback);
    assert_eq!(
        config.weights.path.as_deref(),
        Some(std::path::Path::new("weights/imagebind.safetensors"))
    );
}

#[test]
fn environment_overrides_file() {
    let file = toml_file("batch_size = 4\n[device]\npreference = \"cpu\"\n");
    let vars = env(&[
        ("BINDSERVE__BATCH_SIZE", "16"),
        ("BINDSERVE__DEVICE__PREFERENCE", "cuda"),
        ("BINDSERVE__DEVICE__ALLOW_FALLBACK", "false"),
        ("UNRELATED__BATCH_SIZE", "2"),
    ]);
    let config = ServeConfig::load_with_env(Some(file.path()), vars).unwrap();
    assert_eq!(config.batch_size, 16);
    assert_eq!(config.device.preference, DevicePreference::Cuda);
    assert!(!config.device.allow_fallback);
}

#[test]
fn nested_model_settings_can_be_overridden() {
    let file = toml_file("[model.text]\ncontext_length = 32\n");
    let config = ServeConfig::load_with_env(Some(file.path()), HashMap::new()).unwrap();
    assert_eq!(config.model.text.context_length, 32);
    assert_eq!(config.model.out_embed_dim, 1024);
}

#[test]
fn missing_file_is_fatal() {
    let err = ServeConfig::load_with_env(
        Some(std::path::Path::new("/no/such/bindserve.toml")),
        HashMap::new(),
    )
    .unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn malformed_values_are_fatal() {
    let vars = env(&[("BINDSERVE__VARIANT", "streaming")]);
    let err = ServeConfig::load_with_env(None, vars).unwrap_err();
    assert!(err.is_fatal());
}
