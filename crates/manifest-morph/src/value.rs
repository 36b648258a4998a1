use std::collections::BTreeMap;

use serde_json::Number;
use snafu::ensure;

use crate::{AttributePath, Primitive, Result, ShapeMismatchSnafu, Step, Type};

/// The payload of a known [`Value`]. Its shape is dictated by the value's [`Type`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    String(String),
    Number(Number),
    Bool(bool),

    /// Arbitrary JSON stored at a [`Primitive::Dynamic`] position.
    Dynamic(serde_json::Value),

    /// Elements of a list, set or tuple, in order.
    Elements(Vec<Value>),

    /// Attributes of an object or entries of a map.
    Attributes(BTreeMap<String, Value>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueState {
    Known(Payload),
    Null,

    /// The value will be determined by a later computation or the remote system.
    Unknown,
}

/// A node of a value tree together with its [`Type`].
///
/// A value can only be constructed with a payload matching its type, see
/// [`Value::known`]. Object payloads always carry the full declared attribute
/// set, absent attributes are stored as [`ValueState::Null`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Value {
    ty: Type,
    state: ValueState,
}

/// The result of [`Value::walk`].
#[derive(Debug)]
pub struct Walk<'v, 'p> {
    /// The deepest value reached.
    pub value: &'v Value,

    /// The steps which could not be followed, empty if the full path was walked.
    pub remaining: &'p [Step],
}

impl Value {
    pub fn null(ty: Type) -> Self {
        Self {
            ty,
            state: ValueState::Null,
        }
    }

    pub fn unknown(ty: Type) -> Self {
        Self {
            ty,
            state: ValueState::Unknown,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self {
            ty: Type::STRING,
            state: ValueState::Known(Payload::String(value.into())),
        }
    }

    pub fn number(value: impl Into<Number>) -> Self {
        Self {
            ty: Type::NUMBER,
            state: ValueState::Known(Payload::Number(value.into())),
        }
    }

    pub fn bool(value: bool) -> Self {
        Self {
            ty: Type::BOOL,
            state: ValueState::Known(Payload::Bool(value)),
        }
    }

    pub fn dynamic(value: serde_json::Value) -> Self {
        Self {
            ty: Type::DYNAMIC,
            state: ValueState::Known(Payload::Dynamic(value)),
        }
    }

    /// Builds a known object whose type is derived from the attribute values.
    pub fn object<I, K>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, Self)>,
        K: Into<String>,
    {
        let attributes: BTreeMap<String, Self> = attributes
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();
        let ty = Type::Object(
            attributes
                .iter()
                .map(|(name, value)| (name.clone(), value.ty.clone()))
                .collect(),
        );

        Self {
            ty,
            state: ValueState::Known(Payload::Attributes(attributes)),
        }
    }

    /// Builds a known tuple whose type is derived from the elements.
    pub fn tuple(elements: Vec<Self>) -> Self {
        let ty = Type::Tuple(elements.iter().map(|value| value.ty.clone()).collect());

        Self {
            ty,
            state: ValueState::Known(Payload::Elements(elements)),
        }
    }

    pub fn list(elem: Type, elements: Vec<Self>) -> Result<Self> {
        Self::known(Type::list(elem), Payload::Elements(elements))
    }

    pub fn set(elem: Type, elements: Vec<Self>) -> Result<Self> {
        Self::known(Type::set(elem), Payload::Elements(elements))
    }

    pub fn map<I, K>(elem: Type, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Self)>,
        K: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(key, value)| (key.into(), value))
            .collect();
        Self::known(Type::map(elem), Payload::Attributes(entries))
    }

    /// Builds a known value, checking that `payload` matches `ty`.
    pub fn known(ty: Type, payload: Payload) -> Result<Self> {
        check_payload(&ty, &payload, &AttributePath::new())?;
        Ok(Self {
            ty,
            state: ValueState::Known(payload),
        })
    }

    /// Reassembles a value from parts that are already known to match.
    pub(crate) fn from_parts(ty: Type, payload: Payload) -> Self {
        Self {
            ty,
            state: ValueState::Known(payload),
        }
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn state(&self) -> &ValueState {
        &self.state
    }

    pub fn is_null(&self) -> bool {
        matches!(self.state, ValueState::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.state, ValueState::Unknown)
    }

    pub fn is_known(&self) -> bool {
        matches!(self.state, ValueState::Known(_))
    }

    pub fn payload(&self) -> Option<&Payload> {
        match &self.state {
            ValueState::Known(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.payload() {
            Some(Payload::String(value)) => Some(value),
            Some(Payload::Dynamic(serde_json::Value::String(value))) => Some(value),
            _ => None,
        }
    }

    /// Returns the attributes (or entries) of a known object or map.
    pub fn attributes(&self) -> Option<&BTreeMap<String, Self>> {
        match self.payload() {
            Some(Payload::Attributes(attributes)) => Some(attributes),
            _ => None,
        }
    }

    pub fn elements(&self) -> Option<&[Self]> {
        match self.payload() {
            Some(Payload::Elements(elements)) => Some(elements),
            _ => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Self> {
        self.attributes().and_then(|attributes| attributes.get(name))
    }

    /// Follows `path` as far as possible.
    ///
    /// Walking stops at null or unknown values, at steps that do not apply to
    /// the current type and at missing attributes, elements or keys. The steps
    /// that were not followed are returned in [`Walk::remaining`].
    pub fn walk<'v, 'p>(&'v self, path: &'p AttributePath) -> Walk<'v, 'p> {
        let mut current = self;

        for (i, step) in path.steps().iter().enumerate() {
            let next = match (&current.ty, current.payload(), step) {
                (Type::Object(_), Some(Payload::Attributes(attributes)), Step::AttributeName(name))
                | (Type::Map(_), Some(Payload::Attributes(attributes)), Step::ElementKeyString(name)) => {
                    attributes.get(name)
                }
                (
                    Type::List(_) | Type::Set(_) | Type::Tuple(_),
                    Some(Payload::Elements(elements)),
                    Step::ElementKeyInt(index),
                ) => elements.get(*index),
                _ => None,
            };

            match next {
                Some(value) => current = value,
                None => {
                    return Walk {
                        value: current,
                        remaining: &path.steps()[i..],
                    };
                }
            }
        }

        Walk {
            value: current,
            remaining: &[],
        }
    }
}

fn check_payload(ty: &Type, payload: &Payload, path: &AttributePath) -> Result<()> {
    let mismatch = || ShapeMismatchSnafu {
        path: path.clone(),
        expected: ty.to_string(),
        found: describe_payload(payload),
    };

    match (ty, payload) {
        (Type::Primitive(Primitive::String), Payload::String(_))
        | (Type::Primitive(Primitive::Number), Payload::Number(_))
        | (Type::Primitive(Primitive::Bool), Payload::Bool(_))
        | (Type::Primitive(Primitive::Dynamic), Payload::Dynamic(_)) => Ok(()),
        (Type::List(elem) | Type::Set(elem), Payload::Elements(elements)) => {
            for (i, element) in elements.iter().enumerate() {
                check_value_type(elem, element, &path.with_element_key_int(i))?;
            }
            Ok(())
        }
        (Type::Tuple(types), Payload::Elements(elements)) => {
            ensure!(types.len() == elements.len(), mismatch());
            for (i, (ty, element)) in types.iter().zip(elements).enumerate() {
                check_value_type(ty, element, &path.with_element_key_int(i))?;
            }
            Ok(())
        }
        (Type::Object(types), Payload::Attributes(attributes)) => {
            ensure!(
                types.len() == attributes.len()
                    && types.keys().all(|name| attributes.contains_key(name)),
                mismatch()
            );
            for (name, ty) in types {
                if let Some(attribute) = attributes.get(name) {
                    check_value_type(ty, attribute, &path.with_attribute_name(name))?;
                }
            }
            Ok(())
        }
        (Type::Map(elem), Payload::Attributes(entries)) => {
            for (key, entry) in entries {
                check_value_type(elem, entry, &path.with_element_key_string(key))?;
            }
            Ok(())
        }
        _ => mismatch().fail(),
    }
}

fn check_value_type(declared: &Type, value: &Value, path: &AttributePath) -> Result<()> {
    ensure!(
        declared.accepts(&value.ty),
        ShapeMismatchSnafu {
            path: path.clone(),
            expected: declared.to_string(),
            found: value.ty.to_string(),
        }
    );
    Ok(())
}

pub(crate) fn describe_payload(payload: &Payload) -> String {
    match payload {
        Payload::String(_) => "string".to_owned(),
        Payload::Number(_) => "number".to_owned(),
        Payload::Bool(_) => "bool".to_owned(),
        Payload::Dynamic(_) => "dynamic".to_owned(),
        Payload::Elements(elements) => format!("sequence of {} elements", elements.len()),
        Payload::Attributes(attributes) => format!("mapping of {} entries", attributes.len()),
    }
}
