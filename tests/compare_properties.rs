//! Property tests for payload normalisation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

use vault_migrator::compare::{compare_key_backups, compare_kv, EXCLUDED_POLICY_FIELDS};
use vault_migrator::store::KeyBackup;

fn backup(policy: Value) -> KeyBackup {
    let document = json!({"policy": policy, "archived_keys": {"keys": [{"key": "bWF0ZXJpYWw="}]}});
    KeyBackup::new("signing", STANDARD.encode(document.to_string()))
}

fn base_policy() -> Map<String, Value> {
    let mut policy = Map::new();
    policy.insert("name".to_string(), json!("signing"));
    policy.insert("type".to_string(), json!(2));
    policy.insert("latest_version".to_string(), json!(1));
    policy
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z0-9]{0,12}".prop_map(Value::from),
    ]
}

proptest! {
    #[test]
    fn excluded_fields_never_affect_equality(
        left in proptest::collection::vec(proptest::option::of(scalar()), 5),
        right in proptest::collection::vec(proptest::option::of(scalar()), 5),
    ) {
        let mut source = base_policy();
        let mut destination = base_policy();
        for (i, field) in EXCLUDED_POLICY_FIELDS.iter().enumerate() {
            if let Some(value) = &left[i] {
                source.insert(field.to_string(), value.clone());
            }
            if let Some(value) = &right[i] {
                destination.insert(field.to_string(), value.clone());
            }
        }

        let comparison =
            compare_key_backups(&backup(Value::Object(source)), &backup(Value::Object(destination)))
                .unwrap();
        prop_assert!(comparison.matches());
    }

    #[test]
    fn other_policy_fields_are_significant(
        field in "[a-z_]{1,16}",
        left in scalar(),
        right in scalar(),
    ) {
        prop_assume!(!EXCLUDED_POLICY_FIELDS.contains(&field.as_str()));
        prop_assume!(left != right);

        let mut source = base_policy();
        let mut destination = base_policy();
        source.insert(field.clone(), left);
        destination.insert(field, right);

        let comparison =
            compare_key_backups(&backup(Value::Object(source)), &backup(Value::Object(destination)))
                .unwrap();
        prop_assert!(!comparison.matches());
    }

    #[test]
    fn kv_comparison_ignores_field_order(
        entries in proptest::collection::btree_map("[a-z]{1,8}", scalar(), 2..8),
    ) {
        let forward: Map<String, Value> = entries.clone().into_iter().collect();
        let reversed: Map<String, Value> = entries.into_iter().rev().collect();

        let forward_raw = Value::Object(forward.clone()).to_string();
        let reversed_raw = Value::Object(reversed.clone()).to_string();
        prop_assert_ne!(forward_raw, reversed_raw);
        prop_assert!(compare_kv(&Value::Object(forward), &Value::Object(reversed)).matches());
    }
}
