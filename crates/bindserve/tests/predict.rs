use std::sync::Arc;

use bindserve::{Predictor, Variant, predict_legacy, predict_serializable};
use bindserve_core::{Modality, ModelHandle};
use bindserve_error::{Error, InferenceError, InputError};
use bindserve_test_utils::{StubModel, b64, init_test_tracing, png_bytes, tone_wav_bytes};
use serde_json::{Value, json};
use tracing::Level;

const DIM: usize = 32;

fn stub() -> ModelHandle<StubModel> {
    ModelHandle::new(StubModel::new(DIM))
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[test]
fn single_text_item() {
    let _t = init_test_tracing(Level::DEBUG);
    let handle = stub();
    let out = predict_serializable(&handle, &json!({"text": ["a cat"]})).unwrap();

    assert_eq!(out.modalities().collect::<Vec<_>>(), vec![Modality::Text]);
    let text = out.get(Modality::Text).unwrap();
    assert_eq!(text.len(), 1);
    assert_eq!(text[0].len(), DIM);
    assert!((norm(&text[0]) - 1.0).abs() < 1e-4);
    assert_eq!(handle.model().calls(), 1);
}

#[test]
fn text_and_vision_share_one_call() {
    let handle = stub();
    let out = predict_serializable(
        &handle,
        &json!({"text": ["a", "b"], "vision": ["aGVsbG8="]}),
    )
    .unwrap();

    assert_eq!(out.len(), 2);
    assert_eq!(out.get(Modality::Text).unwrap().len(), 2);
    assert_eq!(out.get(Modality::Vision).unwrap().len(), 1);
    assert_eq!(handle.model().calls(), 1);
}

#[test]
fn all_modalities_with_real_media() {
    let handle = stub();
    let raw = json!({
        "audio": [b64(&tone_wav_bytes(440.0, 0.5, 16_000))],
        "vision": [b64(&png_bytes(8, 8)), b64(&png_bytes(4, 6))],
        "text": ["a dog barking"],
    });
    let out = predict_serializable(&handle, &raw).unwrap();
    assert_eq!(out.get(Modality::Audio).unwrap().len(), 1);
    assert_eq!(out.get(Modality::Vision).unwrap().len(), 2);
    assert_eq!(out.get(Modality::Text).unwrap().len(), 1);
}

#[test]
fn output_keys_serialize_as_modality_names() {
    let handle = Arc::new(stub());
    let predictor = Predictor::quiet(handle, Variant::Serializable);
    let out = predictor.predict(json!({"vision": ["aGVsbG8="]})).unwrap();

    let object = out.as_object().unwrap();
    assert_eq!(object.keys().collect::<Vec<_>>(), vec!["vision"]);
    assert_eq!(object["vision"][0].as_array().unwrap().len(), DIM);
}

#[test]
fn invalid_base64_is_rejected_before_the_model() {
    let handle = stub();
    let err = predict_serializable(&handle, &json!({"vision": ["not-base64-!!"]})).unwrap_err();

    assert!(err.is_client_error());
    assert!(matches!(
        err,
        Error::Input(InputError::InvalidEncoding { ref key, index: 0 }) if key == "vision"
    ));
    assert_eq!(handle.model().calls(), 0);
}

#[test]
fn unknown_key_is_rejected() {
    let handle = stub();
    let err = predict_serializable(&handle, &json!({"text": ["a"], "depth": ["b"]})).unwrap_err();
    assert!(matches!(err, Error::Input(InputError::UnknownKey { ref key, .. }) if key == "depth"));
    assert_eq!(handle.model().calls(), 0);
}

#[test]
fn non_list_value_is_a_type_mismatch() {
    let handle = stub();
    let err = predict_serializable(&handle, &json!({"text": "a cat"})).unwrap_err();
    assert!(matches!(err, Error::Input(InputError::TypeMismatch { .. })));
}

#[test]
fn empty_requests_skip_the_model() {
    let handle = stub();

    let out = predict_serializable(&handle, &json!({})).unwrap();
    assert!(out.is_empty());

    let out = predict_serializable(&handle, &json!({"text": [], "audio": []})).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out.get(Modality::Text), Some(&[][..]));
    assert_eq!(out.get(Modality::Audio), Some(&[][..]));

    assert_eq!(handle.model().calls(), 0);
}

#[test]
fn empty_and_populated_modalities_mix() {
    let handle = stub();
    let out = predict_serializable(&handle, &json!({"text": ["a"], "vision": []})).unwrap();
    assert_eq!(out.get(Modality::Text).unwrap().len(), 1);
    assert_eq!(out.get(Modality::Vision), Some(&[][..]));
    assert_eq!(handle.model().calls(), 1);
}

#[test]
fn repeated_requests_are_deterministic() {
    let handle = stub();
    let raw = json!({"text": ["same input"]});
    let a = predict_serializable(&handle, &raw).unwrap();
    let b = predict_serializable(&handle, &raw).unwrap();
    assert_eq!(a, b);
}

#[test]
fn legacy_preserves_input_order() {
    let handle = stub();
    let together = predict_legacy(&handle, &json!(["first", "second", "third"])).unwrap();
    assert_eq!(together.len(), 3);

    for (i, text) in ["first", "second", "third"].iter().enumerate() {
        let alone = predict_legacy(&handle, &json!([text])).unwrap();
        assert_eq!(alone[0], together[i]);
    }
}

#[test]
fn legacy_matches_serializable_text() {
    let handle = stub();
    let legacy = predict_legacy(&handle, &json!(["a cat"])).unwrap();
    let modern = predict_serializable(&handle, &json!({"text": ["a cat"]})).unwrap();
    assert_eq!(legacy.as_slice(), modern.get(Modality::Text).unwrap());
}

#[test]
fn legacy_rejects_non_lists() {
    let handle = stub();
    for raw in [json!("a cat"), json!({"text": ["a"]}), json!(["a", 1])] {
        let err = predict_legacy(&handle, &raw).unwrap_err();
        assert!(err.is_client_error(), "{raw} should be rejected");
    }
    assert_eq!(handle.model().calls(), 0);
}

#[test]
fn legacy_empty_list_skips_the_model() {
    let handle = stub();
    assert!(predict_legacy(&handle, &json!([])).unwrap().is_empty());
    assert_eq!(handle.model().calls(), 0);
}

#[test]
fn string_payload_is_invalid_shape() {
    let handle = Arc::new(stub());
    let predictor = Predictor::quiet(Arc::clone(&handle), Variant::Serializable);
    let err = predictor.predict(json!("a cat")).unwrap_err();
    assert!(matches!(err, Error::Input(InputError::InvalidShape { .. })));
    assert_eq!(handle.model().calls(), 0);
}

#[test]
fn model_failures_propagate_as_inference_errors() {
    let handle = Arc::new(ModelHandle::new(StubModel::failing(DIM, "device lost")));
    let predictor = Predictor::quiet(handle, Variant::Legacy);
    let err = predictor.predict(json!(["a cat"])).unwrap_err();

    assert!(!err.is_client_error());
    assert!(matches!(err, Error::Inference(InferenceError::Tensor(ref m)) if m == "device lost"));
}

#[test]
fn legacy_predictor_returns_a_json_list() {
    let predictor = Predictor::quiet(Arc::new(stub()), Variant::Legacy);
    let out = predictor.predict(json!(["x", "y"])).unwrap();
    let rows = out.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.as_array().map(Vec::len) == Some(DIM)));
}

#[test]
fn predictor_is_shareable_across_threads() {
    let predictor = Predictor::quiet(Arc::new(stub()), Variant::Serializable);
    let workers: Vec<_> = (0..4)
        .map(|i| {
            let predictor = predictor.clone();
            std::thread::spawn(move || predictor.predict(json!({"text": [format!("item {i}")]})))
        })
        .collect();
    for worker in workers {
        let out: Value = worker.join().unwrap().unwrap();
        assert_eq!(out["text"].as_array().unwrap().len(), 1);
    }
    assert_eq!(predictor.handle().model().calls(), 4);
}
