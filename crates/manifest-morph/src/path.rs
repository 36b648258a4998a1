use std::fmt::Display;

/// A single step into a [`Value`](crate::Value) tree.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Step {
    /// Selects an object attribute.
    AttributeName(String),

    /// Selects a map entry.
    ElementKeyString(String),

    /// Selects a list, set or tuple element.
    ElementKeyInt(usize),
}

/// Points at a node inside a value tree, for example `manifest.metadata.namespace`.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq)]
pub struct AttributePath(Vec<Step>);

impl AttributePath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn with_attribute_name(&self, name: impl Into<String>) -> Self {
        self.with_step(Step::AttributeName(name.into()))
    }

    pub fn with_element_key_string(&self, key: impl Into<String>) -> Self {
        self.with_step(Step::ElementKeyString(key.into()))
    }

    pub fn with_element_key_int(&self, index: usize) -> Self {
        self.with_step(Step::ElementKeyInt(index))
    }

    fn with_step(&self, step: Step) -> Self {
        let mut steps = self.0.clone();
        steps.push(step);
        Self(steps)
    }
}

impl FromIterator<Step> for AttributePath {
    fn from_iter<T: IntoIterator<Item = Step>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Display for AttributePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }

        for (i, step) in self.0.iter().enumerate() {
            match step {
                Step::AttributeName(name) if i == 0 => write!(f, "{name}")?,
                Step::AttributeName(name) => write!(f, ".{name}")?,
                Step::ElementKeyString(key) => write!(f, "[{key:?}]")?,
                Step::ElementKeyInt(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}
