use std::collections::BTreeMap;

use serde_json::{Map, Number};
use snafu::{OptionExt, ensure};

use crate::{
    AttributePath, InvalidNumberSnafu, Payload, Primitive, Result, ShapeMismatchSnafu, Type,
    UnknownValueSnafu, Value, ValueState,
};

/// Morphs a dynamic JSON document into a [`Value`] of type `ty`.
///
/// Object attributes missing from `json` are filled with null values, so the
/// resulting object always carries the full declared attribute set. JSON keys
/// without a declared attribute are rejected. String positions also accept
/// numbers and booleans (rendered as text) and number positions accept numeric
/// strings, which is how int-or-string fields arrive from the API server.
pub fn from_json(ty: &Type, json: &serde_json::Value, path: &AttributePath) -> Result<Value> {
    use serde_json::Value as Json;

    let mismatch = || ShapeMismatchSnafu {
        path: path.clone(),
        expected: ty.to_string(),
        found: describe_json(json),
    };

    let value = match (ty, json) {
        (_, Json::Null) => Value::null(ty.clone()),
        (Type::Primitive(Primitive::Dynamic), json) => Value::dynamic(json.clone()),
        (Type::Primitive(Primitive::String), Json::String(value)) => Value::string(value.clone()),
        (Type::Primitive(Primitive::String), Json::Number(value)) => Value::string(value.to_string()),
        (Type::Primitive(Primitive::String), Json::Bool(value)) => Value::string(value.to_string()),
        (Type::Primitive(Primitive::Number), Json::Number(value)) => Value::number(value.clone()),
        (Type::Primitive(Primitive::Number), Json::String(input)) => {
            let number: Number = input.parse().ok().context(InvalidNumberSnafu {
                path: path.clone(),
                input: input.clone(),
            })?;
            Value::number(number)
        }
        (Type::Primitive(Primitive::Bool), Json::Bool(value)) => Value::bool(*value),
        (Type::List(elem) | Type::Set(elem), Json::Array(items)) => {
            let elements = items
                .iter()
                .enumerate()
                .map(|(i, item)| from_json(elem, item, &path.with_element_key_int(i)))
                .collect::<Result<Vec<_>>>()?;
            Value::from_parts(ty.clone(), Payload::Elements(elements))
        }
        (Type::Tuple(types), Json::Array(items)) => {
            ensure!(types.len() == items.len(), mismatch());
            let elements = types
                .iter()
                .zip(items)
                .enumerate()
                .map(|(i, (ty, item))| from_json(ty, item, &path.with_element_key_int(i)))
                .collect::<Result<Vec<_>>>()?;
            Value::from_parts(ty.clone(), Payload::Elements(elements))
        }
        (Type::Object(types), Json::Object(fields)) => {
            if let Some((unexpected, field)) = fields.iter().find(|(key, _)| !types.contains_key(*key))
            {
                return ShapeMismatchSnafu {
                    path: path.with_attribute_name(unexpected),
                    expected: "no attribute",
                    found: describe_json(field),
                }
                .fail();
            }

            let attributes = types
                .iter()
                .map(|(name, ty)| {
                    let path = path.with_attribute_name(name);
                    let value = match fields.get(name) {
                        Some(field) => from_json(ty, field, &path)?,
                        None => Value::null(ty.clone()),
                    };
                    Ok((name.clone(), value))
                })
                .collect::<Result<BTreeMap<_, _>>>()?;
            Value::from_parts(ty.clone(), Payload::Attributes(attributes))
        }
        (Type::Map(elem), Json::Object(fields)) => {
            let entries = fields
                .iter()
                .map(|(key, field)| {
                    let value = from_json(elem, field, &path.with_element_key_string(key))?;
                    Ok((key.clone(), value))
                })
                .collect::<Result<BTreeMap<_, _>>>()?;
            Value::from_parts(ty.clone(), Payload::Attributes(entries))
        }
        _ => return mismatch().fail(),
    };

    Ok(value)
}

/// Morphs a JSON document into a [`Value`] whose type is inferred from the
/// document itself.
///
/// Objects become [`Type::Object`], arrays become [`Type::Tuple`] and `null`
/// becomes a null [`Primitive::Dynamic`]. This is how a host decodes a value
/// declared as dynamic.
pub fn infer_from_json(json: &serde_json::Value) -> Value {
    use serde_json::Value as Json;

    match json {
        Json::Null => Value::null(Type::DYNAMIC),
        Json::Bool(value) => Value::bool(*value),
        Json::Number(value) => Value::number(value.clone()),
        Json::String(value) => Value::string(value.clone()),
        Json::Array(items) => Value::tuple(items.iter().map(infer_from_json).collect()),
        Json::Object(fields) => Value::object(
            fields
                .iter()
                .map(|(name, field)| (name.clone(), infer_from_json(field))),
        ),
    }
}

/// Morphs a [`Value`] back into a JSON document.
///
/// Null object attributes are omitted. Unknown values cannot be represented
/// in JSON and are rejected.
pub fn to_json(value: &Value, path: &AttributePath) -> Result<serde_json::Value> {
    use serde_json::Value as Json;

    let payload = match value.state() {
        ValueState::Null => return Ok(Json::Null),
        ValueState::Unknown => return UnknownValueSnafu { path: path.clone() }.fail(),
        ValueState::Known(payload) => payload,
    };

    let json = match payload {
        Payload::String(value) => Json::String(value.clone()),
        Payload::Number(value) => Json::Number(value.clone()),
        Payload::Bool(value) => Json::Bool(*value),
        Payload::Dynamic(value) => value.clone(),
        Payload::Elements(elements) => Json::Array(
            elements
                .iter()
                .enumerate()
                .map(|(i, element)| to_json(element, &path.with_element_key_int(i)))
                .collect::<Result<Vec<_>>>()?,
        ),
        Payload::Attributes(attributes) => {
            let is_object = matches!(value.ty(), Type::Object(_));
            let mut fields = Map::new();
            for (name, attribute) in attributes {
                if is_object && attribute.is_null() {
                    continue;
                }
                let path = if is_object {
                    path.with_attribute_name(name)
                } else {
                    path.with_element_key_string(name)
                };
                fields.insert(name.clone(), to_json(attribute, &path)?);
            }
            Json::Object(fields)
        }
    };

    Ok(json)
}

fn describe_json(json: &serde_json::Value) -> String {
    use serde_json::Value as Json;

    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
    .to_owned()
}
