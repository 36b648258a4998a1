use std::collections::BTreeMap;

use snafu::{OptionExt, ensure};

use crate::{
    AttributePath, Payload, Result, ShapeMismatchSnafu, Type, Value, ValueState, infer_from_json,
    value::describe_payload,
};

/// Replaces every null leaf of `value` with an unknown value of the same type.
///
/// This is used to mark the attributes of a planned object which the remote
/// system will only assign when the object is applied. Known leaves are
/// returned unchanged and containers keep their elements, attributes and
/// entries. Applying the function twice yields the same result as applying it
/// once.
///
/// - A null primitive becomes unknown.
/// - A null or unknown list, set or tuple is returned as is. A known one is
///   rebuilt from its recursed elements.
/// - A null object or map becomes unknown. A known one is rebuilt from its
///   recursed attributes or entries.
/// - A value at a [`Primitive::Dynamic`](crate::Primitive::Dynamic) position is recursed with its own
///   type. Opaque JSON is expanded with [`infer_from_json`] first, so that
///   its null leaves are reached too.
///
/// Fails with [`Error::ShapeMismatch`](crate::Error::ShapeMismatch) if the
/// value does not match `ty`.
pub fn deep_unknown(ty: &Type, value: &Value, path: &AttributePath) -> Result<Value> {
    ensure!(
        ty.accepts(value.ty()),
        ShapeMismatchSnafu {
            path: path.clone(),
            expected: ty.to_string(),
            found: value.ty().to_string(),
        }
    );

    if let Some(Payload::Dynamic(json)) = value.payload() {
        return deep_unknown(ty, &infer_from_json(json), path);
    }

    if ty.is_dynamic() && !value.ty().is_dynamic() {
        return deep_unknown(value.ty(), value, path);
    }

    let payload = match (ty, value.state()) {
        (Type::Primitive(_), ValueState::Null) => return Ok(Value::unknown(value.ty().clone())),
        (Type::Primitive(_), _) => return Ok(value.clone()),

        (Type::List(_) | Type::Set(_) | Type::Tuple(_), ValueState::Null | ValueState::Unknown) => {
            return Ok(value.clone());
        }

        (Type::Object(_) | Type::Map(_), ValueState::Null) => {
            return Ok(Value::unknown(value.ty().clone()));
        }
        (Type::Object(_) | Type::Map(_), ValueState::Unknown) => return Ok(value.clone()),

        (_, ValueState::Known(payload)) => payload,
    };

    let mismatch = || ShapeMismatchSnafu {
        path: path.clone(),
        expected: ty.to_string(),
        found: describe_payload(payload),
    };

    let payload = match (ty, payload) {
        (Type::List(elem) | Type::Set(elem), Payload::Elements(elements)) => Payload::Elements(
            elements
                .iter()
                .enumerate()
                .map(|(i, element)| deep_unknown(elem, element, &path.with_element_key_int(i)))
                .collect::<Result<Vec<_>>>()?,
        ),
        (Type::Tuple(types), Payload::Elements(elements)) => {
            ensure!(types.len() == elements.len(), mismatch());
            Payload::Elements(
                types
                    .iter()
                    .zip(elements)
                    .enumerate()
                    .map(|(i, (ty, element))| {
                        deep_unknown(ty, element, &path.with_element_key_int(i))
                    })
                    .collect::<Result<Vec<_>>>()?,
            )
        }
        (Type::Object(types), Payload::Attributes(attributes)) => Payload::Attributes(
            attributes
                .iter()
                .map(|(name, attribute)| {
                    let path = path.with_attribute_name(name);
                    let ty = types.get(name).context(ShapeMismatchSnafu {
                        path: path.clone(),
                        expected: "no attribute",
                        found: attribute.ty().to_string(),
                    })?;
                    Ok((name.clone(), deep_unknown(ty, attribute, &path)?))
                })
                .collect::<Result<BTreeMap<_, _>>>()?,
        ),
        (Type::Map(elem), Payload::Attributes(entries)) => Payload::Attributes(
            entries
                .iter()
                .map(|(key, entry)| {
                    let entry = deep_unknown(elem, entry, &path.with_element_key_string(key))?;
                    Ok((key.clone(), entry))
                })
                .collect::<Result<BTreeMap<_, _>>>()?,
        ),
        _ => return mismatch().fail(),
    };

    Ok(Value::from_parts(value.ty().clone(), payload))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::Error;

    fn metadata_type() -> Type {
        Type::object([
            ("name", Type::STRING),
            ("namespace", Type::STRING),
            ("labels", Type::object([("app", Type::STRING)])),
        ])
    }

    fn manifest_type() -> Type {
        Type::object([
            ("kind", Type::STRING),
            ("apiVersion", Type::STRING),
            ("metadata", metadata_type()),
        ])
    }

    fn manifest() -> Value {
        Value::object([
            ("kind", Value::string("ConfigMap")),
            ("apiVersion", Value::string("v1")),
            (
                "metadata",
                Value::object([
                    ("name", Value::string("foo")),
                    ("namespace", Value::null(Type::STRING)),
                    ("labels", Value::null(Type::object([("app", Type::STRING)]))),
                ]),
            ),
        ])
    }

    fn run(ty: &Type, value: &Value) -> Value {
        deep_unknown(ty, value, &AttributePath::new()).expect("value matches its type")
    }

    #[rstest]
    #[case(Type::STRING)]
    #[case(Type::NUMBER)]
    #[case(Type::BOOL)]
    #[case(Type::DYNAMIC)]
    fn null_primitive_becomes_unknown(#[case] ty: Type) {
        assert_eq!(run(&ty, &Value::null(ty.clone())), Value::unknown(ty));
    }

    #[rstest]
    #[case(Value::string("foo"))]
    #[case(Value::number(3))]
    #[case(Value::bool(false))]
    #[case(Value::unknown(Type::STRING))]
    fn non_null_primitive_is_unchanged(#[case] value: Value) {
        assert_eq!(run(&value.ty().clone(), &value), value);
    }

    #[test]
    fn nested_namespace() {
        let ty = Type::object([("name", Type::object([("namespace", Type::STRING)]))]);
        let value = Value::object([(
            "name",
            Value::object([("namespace", Value::null(Type::STRING))]),
        )]);

        let expected = Value::object([(
            "name",
            Value::object([("namespace", Value::unknown(Type::STRING))]),
        )]);
        assert_eq!(run(&ty, &value), expected);
    }

    #[test]
    fn manifest_with_computed_attributes() {
        let expected = Value::object([
            ("kind", Value::string("ConfigMap")),
            ("apiVersion", Value::string("v1")),
            (
                "metadata",
                Value::object([
                    ("name", Value::string("foo")),
                    ("namespace", Value::unknown(Type::STRING)),
                    (
                        "labels",
                        Value::unknown(Type::object([("app", Type::STRING)])),
                    ),
                ]),
            ),
        ]);

        assert_eq!(run(&manifest_type(), &manifest()), expected);
    }

    #[test]
    fn idempotent() {
        let once = run(&manifest_type(), &manifest());
        let twice = run(&manifest_type(), &once);
        assert_eq!(once, twice);
    }

    #[rstest]
    #[case(Value::null(Type::list(Type::STRING)))]
    #[case(Value::unknown(Type::set(Type::NUMBER)))]
    #[case(Value::null(Type::Tuple(vec![Type::STRING])))]
    fn absent_sequences_are_unchanged(#[case] value: Value) {
        assert_eq!(run(&value.ty().clone(), &value), value);
    }

    #[test]
    fn list_elements_keep_order_and_count() {
        let list = Value::list(
            Type::STRING,
            vec![
                Value::string("a"),
                Value::null(Type::STRING),
                Value::string("c"),
            ],
        )
        .expect("valid list");

        let result = run(list.ty(), &list);
        let elements = result.elements().expect("list stays known");
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0], Value::string("a"));
        assert!(elements[1].is_unknown());
        assert_eq!(elements[2], Value::string("c"));
    }

    #[rstest]
    #[case::tuple(Value::tuple(vec![
        Value::string("a"),
        Value::null(Type::NUMBER),
        Value::null(Type::object([("app", Type::STRING)])),
    ]))]
    #[case::set(Value::set(
        Type::STRING,
        vec![Value::string("a"), Value::null(Type::STRING), Value::string("c")],
    ).expect("valid set"))]
    fn known_sequences_keep_order_and_count(#[case] value: Value) {
        let once = run(value.ty(), &value);
        assert_eq!(once.ty(), value.ty());

        let before = value.elements().expect("sequence is known");
        let after = once.elements().expect("sequence stays known");
        assert_eq!(after.len(), before.len());
        for (before, after) in before.iter().zip(after) {
            assert_eq!(after.ty(), before.ty());
            if before.is_null() {
                assert!(after.is_unknown());
            } else {
                assert_eq!(after, before);
            }
        }

        assert_eq!(run(value.ty(), &once), once);
    }

    #[test]
    fn tuple_length_mismatch() {
        let ty = Type::Tuple(vec![Type::STRING, Type::NUMBER]);
        let value = Value::from_parts(
            ty.clone(),
            Payload::Elements(vec![Value::string("a")]),
        );
        let path = AttributePath::new().with_attribute_name("ports");

        let err = deep_unknown(&ty, &value, &path).expect_err("tuple is missing an element");
        assert_eq!(
            err,
            Error::ShapeMismatch {
                path,
                expected: "tuple[string, number]".to_owned(),
                found: "sequence of 1 elements".to_owned(),
            }
        );
    }

    #[test]
    fn map_keys_are_not_invented() {
        let map = Value::map(
            Type::STRING,
            [("a", Value::null(Type::STRING)), ("b", Value::string("b"))],
        )
        .expect("valid map");

        let result = run(map.ty(), &map);
        let entries = result.attributes().expect("map stays known");
        assert_eq!(entries.len(), 2);
        assert!(entries["a"].is_unknown());
        assert_eq!(entries["b"], Value::string("b"));
    }

    #[test]
    fn null_map_becomes_unknown() {
        let ty = Type::map(Type::STRING);
        assert_eq!(run(&ty, &Value::null(ty.clone())), Value::unknown(ty));
    }

    #[test]
    fn dynamic_position_is_recursed() {
        let ty = Type::object([("manifest", Type::DYNAMIC)]);
        let value = Value::object([("manifest", manifest())]);

        let result = run(&ty, &value);
        let namespace = result
            .attribute("manifest")
            .and_then(|manifest| manifest.attribute("metadata"))
            .and_then(|metadata| metadata.attribute("namespace"))
            .expect("namespace is declared");
        assert!(namespace.is_unknown());
    }

    #[test]
    fn opaque_json_is_expanded() {
        let ty = Type::object([("spec", Type::DYNAMIC)]);
        let value = Value::object([(
            "spec",
            Value::dynamic(serde_json::json!({
                "replicas": 3,
                "selector": null,
                "ports": [{ "name": "http", "port": null }],
            })),
        )]);

        let once = run(&ty, &value);
        let spec = once.attribute("spec").expect("spec is declared");
        assert_eq!(spec.attribute("replicas"), Some(&Value::number(3)));
        assert!(spec.attribute("selector").is_some_and(Value::is_unknown));

        let ports = spec
            .attribute("ports")
            .and_then(Value::elements)
            .expect("ports stay known");
        assert_eq!(ports.len(), 1);
        assert_eq!(
            ports[0].attribute("name").and_then(Value::as_str),
            Some("http")
        );
        assert!(ports[0].attribute("port").is_some_and(Value::is_unknown));

        assert_eq!(run(&ty, &once), once);
    }

    #[test]
    fn shape_mismatch() {
        let err = deep_unknown(
            &Type::object([("name", Type::STRING)]),
            &Value::string("foo"),
            &AttributePath::new().with_attribute_name("metadata"),
        )
        .expect_err("a string is not an object");

        assert_eq!(
            err,
            Error::ShapeMismatch {
                path: AttributePath::new().with_attribute_name("metadata"),
                expected: "object{name: string}".to_owned(),
                found: "string".to_owned(),
            }
        );
    }
}
