use std::{collections::BTreeMap, fmt::Display};

/// Leaf types of a [`Type`] tree.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Primitive {
    String,
    Number,
    Bool,

    /// Opaque type which accepts any value.
    ///
    /// It is used for schema positions that preserve unknown fields and as
    /// the placeholder for self-referential schema definitions.
    Dynamic,
}

/// A static type tree. Types are immutable and compared structurally.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Type {
    Primitive(Primitive),
    List(Box<Type>),
    Tuple(Vec<Type>),
    Set(Box<Type>),
    Object(BTreeMap<String, Type>),
    Map(Box<Type>),
}

impl Type {
    pub const STRING: Self = Self::Primitive(Primitive::String);
    pub const NUMBER: Self = Self::Primitive(Primitive::Number);
    pub const BOOL: Self = Self::Primitive(Primitive::Bool);
    pub const DYNAMIC: Self = Self::Primitive(Primitive::Dynamic);

    pub fn list(elem: Self) -> Self {
        Self::List(Box::new(elem))
    }

    pub fn set(elem: Self) -> Self {
        Self::Set(Box::new(elem))
    }

    pub fn map(elem: Self) -> Self {
        Self::Map(Box::new(elem))
    }

    pub fn object<I, K>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, Self)>,
        K: Into<String>,
    {
        Self::Object(
            attributes
                .into_iter()
                .map(|(name, ty)| (name.into(), ty))
                .collect(),
        )
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Primitive(Primitive::Dynamic))
    }

    /// Returns `true` if a value of type `other` may be stored where `self`
    /// is declared.
    ///
    /// This is structural equality, except that [`Primitive::Dynamic`]
    /// accepts every type at any depth.
    pub fn accepts(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Primitive(Primitive::Dynamic), _) => true,
            (Self::Primitive(a), Self::Primitive(b)) => a == b,
            (Self::List(a), Self::List(b))
            | (Self::Set(a), Self::Set(b))
            | (Self::Map(a), Self::Map(b)) => a.accepts(b),
            (Self::Tuple(a), Self::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.accepts(b))
            }
            (Self::Object(a), Self::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(name, ty)| b.get(name).is_some_and(|other| ty.accepts(other)))
            }
            _ => false,
        }
    }
}

impl Display for Primitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Bool => write!(f, "bool"),
            Self::Dynamic => write!(f, "dynamic"),
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primitive(primitive) => write!(f, "{primitive}"),
            Self::List(elem) => write!(f, "list[{elem}]"),
            Self::Set(elem) => write!(f, "set[{elem}]"),
            Self::Map(elem) => write!(f, "map[{elem}]"),
            Self::Tuple(elems) => {
                write!(f, "tuple[")?;
                for (i, elem) in elems.iter().enumerate() {
                    let prefix = match i {
                        0 => "",
                        _ => ", ",
                    };
                    write!(f, "{prefix}{elem}")?;
                }
                write!(f, "]")
            }
            Self::Object(attributes) => {
                write!(f, "object{{")?;
                for (i, (name, ty)) in attributes.iter().enumerate() {
                    let prefix = match i {
                        0 => "",
                        _ => ", ",
                    };
                    write!(f, "{prefix}{name}: {ty}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
