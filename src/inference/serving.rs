// ServingAdapter - TensorFlow Serving REST predict client
//
// Request:  POST {endpoint}
//           {"signature_name": "serving_default", "instances": [tensor]}
// Response: {"predictions": [[p0, p1, p2, p3]]}            (row format)
//        or {"outputs": {"output_0": [[p0, p1, p2, p3]]}}  (columnar, named)
//        or {"outputs": [[p0, p1, p2, p3]]}                (columnar, single)

use std::time::{Duration, Instant};

use log::{debug, info};
use serde_json::{json, Value};

use super::{ClassProbabilities, InferenceAdapter};
use crate::analysis::FeatureTensor;
use crate::error::InferenceError;

pub const SIGNATURE_NAME: &str = "serving_default";
pub const OUTPUT_KEY: &str = "output_0";

/// Blocking HTTP client for a model served behind TF-Serving's REST API
///
/// Must be constructed and dropped outside an async runtime; call
/// `infer` from a blocking thread.
pub struct ServingAdapter {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl ServingAdapter {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, InferenceError> {
        let endpoint = endpoint.into();
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| InferenceError::Unavailable {
                details: format!("failed to build HTTP client: {}", err),
            })?;
        info!(
            "[ServingAdapter] Using endpoint {} (timeout {:?})",
            endpoint, timeout
        );
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(features: &FeatureTensor) -> Value {
        json!({
            "signature_name": SIGNATURE_NAME,
            "instances": [features.to_nested()],
        })
    }
}

/// Pull the first probability row out of a predict response.
pub(crate) fn parse_response(body: &Value) -> Result<ClassProbabilities, InferenceError> {
    let rows = body
        .get("predictions")
        .or_else(|| match body.get("outputs") {
            Some(Value::Object(map)) => map.get(OUTPUT_KEY),
            other => other,
        })
        .ok_or_else(|| InferenceError::InvalidOutput {
            reason: format!("response has neither 'predictions' nor 'outputs.{}'", OUTPUT_KEY),
        })?;

    let row = rows
        .as_array()
        .and_then(|rows| rows.first())
        .and_then(Value::as_array)
        .ok_or_else(|| InferenceError::InvalidOutput {
            reason: "expected a batch of probability rows".to_string(),
        })?;

    let values = row
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| InferenceError::InvalidOutput {
                reason: format!("non-numeric class score {}", v),
            })
        })
        .collect::<Result<Vec<f32>, _>>()?;

    ClassProbabilities::from_slice(&values)
}

impl InferenceAdapter for ServingAdapter {
    fn name(&self) -> &str {
        "tf-serving"
    }

    fn infer(&self, features: &FeatureTensor) -> Result<ClassProbabilities, InferenceError> {
        let started = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .json(&Self::request_body(features))
            .send()
            .map_err(|err| InferenceError::Unavailable {
                details: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InferenceError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().map_err(|err| InferenceError::InvalidOutput {
            reason: format!("response is not JSON: {}", err),
        })?;

        debug!(
            "[ServingAdapter] Predict round-trip {:?}",
            started.elapsed()
        );
        parse_response(&body)
    }
}
