use base64::{Engine as _, engine::general_purpose::STANDARD};
use bindserve_core::{Modality, validate, validate_legacy};
use bindserve_error::InputError;
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        "[a-zA-Z0-9+/=!-]{0,12}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec(
                (prop::sample::select(vec!["text", "vision", "audio", "depth"]), inner),
                0..3
            )
            .prop_map(|entries| {
                let map: Map<String, Value> =
                    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
                Value::Object(map)
            }),
        ]
    })
}

proptest! {
    #[test]
    fn string_lists_validate_as_text(texts in prop::collection::vec(".{0,16}", 0..8)) {
        let input = validate(&json!({ "text": texts.clone() })).unwrap();
        prop_assert_eq!(input.texts().unwrap(), texts.as_slice());
        prop_assert_eq!(input.len(), 1);
    }

    #[test]
    fn any_key_outside_the_modality_set_is_rejected(
        key in "[a-z_]{1,12}".prop_filter("not a modality", |k| Modality::from_key(k).is_none())
    ) {
        let mut raw = json!({ "text": ["ok"] });
        raw[key.as_str()] = json!([]);
        let err = validate(&raw).unwrap_err();
        prop_assert_eq!(err.key(), Some(key.as_str()));
        let is_unknown_key = matches!(err, InputError::UnknownKey { .. });
        prop_assert!(is_unknown_key);
    }

    #[test]
    fn encoded_payloads_decode_to_original_bytes(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..48), 0..4)
    ) {
        let encoded: Vec<String> = payloads.iter().map(|p| STANDARD.encode(p)).collect();
        let input = validate(&json!({ "audio": encoded })).unwrap();
        prop_assert_eq!(input.audio_clips().unwrap(), payloads.as_slice());
    }

    #[test]
    fn non_string_element_is_a_type_mismatch_even_among_bad_base64(
        bad in "[!@#$%^&*]{1,8}",
        position in 0usize..4,
    ) {
        let mut items: Vec<Value> = vec![Value::from(bad); 4];
        items[position] = json!(42);
        let err = validate(&json!({ "vision": items })).unwrap_err();
        let is_type_mismatch = matches!(err, InputError::TypeMismatch { ref key, .. } if key == "vision");
        prop_assert!(is_type_mismatch);
    }

    #[test]
    fn first_undecodable_item_is_named_for_either_binary_key(
        key in prop::sample::select(vec!["vision", "audio"]),
        bad in "[!@#$%^&*]{1,8}",
        position in 0usize..4,
    ) {
        let mut items: Vec<Value> = vec![Value::from(STANDARD.encode(b"ok")); 4];
        items[position] = Value::from(bad);
        let err = validate(&json!({ key: items })).unwrap_err();
        prop_assert_eq!(err, InputError::InvalidEncoding { key: key.to_string(), index: position });
    }

    #[test]
    fn validation_is_deterministic(value in arb_json()) {
        prop_assert_eq!(validate(&value), validate(&value));
        prop_assert_eq!(validate_legacy(&value), validate_legacy(&value));
    }

    #[test]
    fn non_objects_fail_on_shape_first(value in arb_json().prop_filter("not an object", |v| !v.is_object())) {
        let is_shape = matches!(validate(&value), Err(InputError::InvalidShape { .. }));
        prop_assert!(is_shape);
    }
}
