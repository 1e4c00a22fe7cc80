use serde::{Deserialize, Serialize};

pub const DEFAULT_CLASSES: [&str; 2] = ["face", "doc_quad"];

/// Ordered class names. The number of classes C is `len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassLabels(Vec<String>);

impl Default for ClassLabels {
    fn default() -> Self {
        Self::new(&DEFAULT_CLASSES)
    }
}

impl ClassLabels {
    pub fn new(names: &[&str]) -> Self {
        Self(names.iter().map(|x| x.to_string()).collect())
    }

    pub fn from_vec(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn name(&self, class_id: usize) -> String {
        self.0
            .get(class_id)
            .cloned()
            .unwrap_or(format!("class_{}", class_id))
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }
}
