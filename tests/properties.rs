use proptest::prelude::*;
use serde_json::{Map, Value};

use form_concierge::domain::conversation::{QuestionPlanner, ResponseExtractor};
use form_concierge::domain::form::{get_nested_value, set_nested_value, FieldType, FormField};

fn arb_field_type() -> impl Strategy<Value = FieldType> {
    prop_oneof![
        Just(FieldType::TextInput),
        Just(FieldType::Email),
        Just(FieldType::Tel),
        Just(FieldType::NumberInput),
        Just(FieldType::MultilineInput),
        Just(FieldType::DropDown),
        Just(FieldType::Checkbox),
        Just(FieldType::DateInput),
        Just(FieldType::RadioGroup),
    ]
}

fn arb_fields() -> impl Strategy<Value = Vec<FormField>> {
    prop::collection::vec(arb_field_type(), 0..12).prop_map(|types| {
        types
            .into_iter()
            .enumerate()
            .map(|(i, t)| FormField::new(format!("f{i}"), format!("field{i}"), t))
            .collect()
    })
}

fn arb_object() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(
        "[a-z][a-zA-Z0-9]{0,8}",
        prop_oneof![
            "[a-zA-Z0-9 @.]{0,16}".prop_map(Value::from),
            any::<i32>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            Just(Value::Null),
        ],
        1..6,
    )
    .prop_map(|entries| entries.into_iter().collect())
}

fn arb_path() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z]{1,6}", 1..4).prop_map(|segments| segments.join("."))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn batches_respect_size_and_never_mix_complex_fields(
        fields in arb_fields(),
        batch_size in 1usize..5,
    ) {
        let batch = QuestionPlanner::new(batch_size).select_next_fields(&fields);

        prop_assert!(batch.len() <= batch_size);
        prop_assert_eq!(batch.is_empty(), fields.is_empty());

        let complex = batch.iter().filter(|f| f.field_type.is_complex()).count();
        prop_assert!(complex == 0 || batch.len() == 1);

        // A batch is always a prefix of the candidates.
        for (picked, candidate) in batch.iter().zip(fields.iter()) {
            prop_assert_eq!(&picked.id, &candidate.id);
        }
    }

    #[test]
    fn wrapped_objects_recover_like_bare_ones(
        object in arb_object(),
        before in "[a-zA-Z ,.:]{0,40}",
        after in "[a-zA-Z ,.:]{0,40}",
    ) {
        let bare = Value::Object(object.clone()).to_string();

        let fenced = format!("```json\n{}\n```", bare);
        let prose = format!("{} {} {}", before, bare, after);

        prop_assert_eq!(ResponseExtractor::extract(&bare).unwrap(), object.clone());
        prop_assert_eq!(ResponseExtractor::extract(&fenced).unwrap(), object.clone());
        prop_assert_eq!(ResponseExtractor::extract(&prose).unwrap(), object);
    }

    #[test]
    fn nested_writes_are_idempotent(path in arb_path(), value in any::<i64>()) {
        let mut once = Value::Null;
        prop_assert!(set_nested_value(&mut once, &path, Value::from(value)));

        let mut twice = once.clone();
        prop_assert!(set_nested_value(&mut twice, &path, Value::from(value)));

        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(get_nested_value(&once, &path), Some(&Value::from(value)));
    }
}
