use serde::{Deserialize, Serialize};

/// Confidence threshold override for a single class.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelThreshold {
    pub id: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub threshold: f32,
}

impl LabelThreshold {
    pub fn new(id: usize, threshold: f32) -> Self {
        Self {
            id,
            label: None,
            threshold,
        }
    }

    /// A score passes when it is strictly greater than the threshold.
    pub fn check_conf(&self, conf: f32) -> bool {
        conf > self.threshold
    }
}

/// Default confidence threshold plus explicit per-class overrides.
///
/// Replaces a hard-coded lower threshold for one class with a data-driven mapping, e.g.
/// `ClassThresholds::new(0.3).with_class(1, 0.25)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassThresholds {
    pub default: f32,
    #[serde(default)]
    pub per_class: Vec<LabelThreshold>,
}

impl Default for ClassThresholds {
    fn default() -> Self {
        Self {
            default: 0.3,
            per_class: vec![],
        }
    }
}

impl ClassThresholds {
    pub fn new(default: f32) -> Self {
        Self {
            default,
            per_class: vec![],
        }
    }

    /// Sets (or replaces) the threshold for `class_id`.
    pub fn with_class(mut self, class_id: usize, threshold: f32) -> Self {
        match self.per_class.iter_mut().find(|x| x.id == class_id) {
            Some(existing) => existing.threshold = threshold,
            None => self.per_class.push(LabelThreshold::new(class_id, threshold)),
        }
        self
    }

    pub fn get(&self, class_id: usize) -> f32 {
        self.per_class
            .iter()
            .find(|x| x.id == class_id)
            .map(|x| x.threshold)
            .unwrap_or(self.default)
    }

    pub fn passes(&self, class_id: usize, score: f32) -> bool {
        score > self.get(class_id)
    }

    /// All thresholds, default included.
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        std::iter::once(self.default).chain(self.per_class.iter().map(|x| x.threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_class_override() {
        let t = ClassThresholds::new(0.3).with_class(1, 0.25);
        assert_eq!(t.get(0), 0.3);
        assert_eq!(t.get(1), 0.25);
        assert_eq!(t.get(7), 0.3);
        assert!(t.passes(1, 0.26));
        assert!(!t.passes(0, 0.26));
        // Strictly greater.
        assert!(!t.passes(0, 0.3));
    }

    #[test]
    fn override_replaces_existing() {
        let t = ClassThresholds::new(0.3).with_class(1, 0.25).with_class(1, 0.1);
        assert_eq!(t.per_class.len(), 1);
        assert_eq!(t.get(1), 0.1);
    }

    #[test]
    fn deserializes_without_overrides() {
        let t: ClassThresholds = serde_json::from_str(r#"{"default": 0.6}"#).unwrap();
        assert_eq!(t, ClassThresholds::new(0.6));
    }
}
