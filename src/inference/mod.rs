//! Inference collaborator boundary
//!
//! The pipeline hands a [`FeatureTensor`] to an [`InferenceAdapter`] and gets
//! back a 4-way probability vector in the fixed class order
//! Healthy, Asthma, COPD, COVID-19. How inference runs is the adapter's
//! business; the pipeline never retries a failed call.

mod serving;

pub use serving::ServingAdapter;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analysis::FeatureTensor;
use crate::error::InferenceError;

/// Cough classes in model output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoughClass {
    Healthy,
    Asthma,
    #[serde(rename = "COPD")]
    Copd,
    #[serde(rename = "COVID-19")]
    Covid19,
}

impl CoughClass {
    /// All classes, indexed by model output position.
    pub const ALL: [CoughClass; 4] = [
        CoughClass::Healthy,
        CoughClass::Asthma,
        CoughClass::Copd,
        CoughClass::Covid19,
    ];

    pub fn index(self) -> usize {
        match self {
            CoughClass::Healthy => 0,
            CoughClass::Asthma => 1,
            CoughClass::Copd => 2,
            CoughClass::Covid19 => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            CoughClass::Healthy => "Healthy",
            CoughClass::Asthma => "Asthma",
            CoughClass::Copd => "COPD",
            CoughClass::Covid19 => "COVID-19",
        }
    }
}

impl fmt::Display for CoughClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Class probabilities as returned by the model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    values: [f32; 4],
}

impl ClassProbabilities {
    /// Validate a raw model output row.
    ///
    /// Rejects anything other than exactly four finite, non-negative values.
    pub fn from_slice(values: &[f32]) -> Result<Self, InferenceError> {
        if values.len() != CoughClass::ALL.len() {
            return Err(InferenceError::InvalidOutput {
                reason: format!("expected 4 class scores, got {}", values.len()),
            });
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(InferenceError::InvalidOutput {
                reason: format!("class score {} is not a probability", bad),
            });
        }
        let mut out = [0.0f32; 4];
        out.copy_from_slice(values);
        Ok(Self { values: out })
    }

    pub fn get(&self, class: CoughClass) -> f32 {
        self.values[class.index()]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Highest-scoring class; ties resolve to the earlier class.
    pub fn top(&self) -> (CoughClass, f32) {
        let mut best = (CoughClass::Healthy, self.values[0]);
        for class in CoughClass::ALL.iter().skip(1) {
            let score = self.values[class.index()];
            if score > best.1 {
                best = (*class, score);
            }
        }
        best
    }
}

/// Anything that can turn a feature tensor into class probabilities
///
/// Implementations must be shareable across request threads.
pub trait InferenceAdapter: Send + Sync {
    /// Short name for logs and health output.
    fn name(&self) -> &str;

    fn infer(&self, features: &FeatureTensor) -> Result<ClassProbabilities, InferenceError>;
}

/// Placeholder used when no backend endpoint is configured
///
/// Every prediction fails with `InferenceError::NotConfigured`, so feature
/// extraction stays usable without a model server.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredAdapter;

impl InferenceAdapter for UnconfiguredAdapter {
    fn name(&self) -> &str {
        "unconfigured"
    }

    fn infer(&self, _features: &FeatureTensor) -> Result<ClassProbabilities, InferenceError> {
        Err(InferenceError::NotConfigured)
    }
}
