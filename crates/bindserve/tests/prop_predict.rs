use bindserve::{predict_legacy, predict_serializable};
use bindserve_core::{Modality, ModelHandle};
use bindserve_test_utils::StubModel;
use proptest::prelude::*;
use serde_json::json;

proptest! {
    #[test]
    fn one_vector_per_text(texts in prop::collection::vec(".{0,24}", 0..12)) {
        let handle = ModelHandle::new(StubModel::new(8));

        let legacy = predict_legacy(&handle, &json!(texts)).unwrap();
        prop_assert_eq!(legacy.len(), texts.len());

        let modern = predict_serializable(&handle, &json!({"text": texts})).unwrap();
        let vectors = modern.get(Modality::Text).unwrap();
        prop_assert_eq!(vectors, legacy.as_slice());
        prop_assert!(vectors.iter().all(|v| v.len() == 8));
    }

    #[test]
    fn output_keys_mirror_input_keys(
        text in prop::option::of(prop::collection::vec("[a-z ]{1,8}", 0..3)),
        vision in prop::option::of(prop::collection::vec(prop::collection::vec(any::<u8>(), 1..16), 0..3)),
    ) {
        let handle = ModelHandle::new(StubModel::new(4));
        let mut raw = serde_json::Map::new();
        let mut expected = Vec::new();
        if let Some(text) = &text {
            raw.insert("text".into(), json!(text));
            expected.push(Modality::Text);
        }
        if let Some(vision) = &vision {
            let encoded: Vec<String> = vision.iter().map(|b| bindserve_test_utils::b64(b)).collect();
            raw.insert("vision".into(), json!(encoded));
            expected.push(Modality::Vision);
        }

        let out = predict_serializable(&handle, &raw.into()).unwrap();
        prop_assert_eq!(out.modalities().collect::<Vec<_>>(), expected);
    }
}
