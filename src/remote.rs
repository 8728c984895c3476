//! Prediction sources: the local mock extrapolator and the remote model API.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::{Frame, NowcastError, NowcastResult, Sequence, extrapolate::extrapolate};

/// Produces `horizon` predicted frames from the observed `inputs`.
pub trait Predictor {
    fn predict(&self, inputs: &[Frame], horizon: u32, variable: &str) -> NowcastResult<Sequence>;
}

#[derive(Clone, Debug)]
pub struct MockPredictor {
    pub decode_timeout: Duration,
}

impl Predictor for MockPredictor {
    fn predict(&self, inputs: &[Frame], horizon: u32, _variable: &str) -> NowcastResult<Sequence> {
        extrapolate(inputs, horizon, self.decode_timeout)
    }
}

#[derive(serde::Serialize)]
struct PredictRequest<'a> {
    frames: &'a [Frame],
    horizon: u32,
    variable: &'a str,
}

/// `POST {endpoint}/predict` with `{ frames, horizon, variable }`, expecting
/// `{ predictions: [...] }` back.
#[derive(Clone, Debug)]
pub struct RemotePredictor {
    client: Client,
    url: String,
}

impl RemotePredictor {
    pub fn new(endpoint: &str, timeout: Duration) -> NowcastResult<Self> {
        let endpoint = normalize_endpoint(endpoint);
        if endpoint.is_empty() {
            return Err(NowcastError::validation("endpoint must not be empty"));
        }
        let client = Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: format!("{endpoint}/predict"),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Predictor for RemotePredictor {
    #[tracing::instrument(skip(self, inputs), fields(url = %self.url, n_inputs = inputs.len()))]
    fn predict(&self, inputs: &[Frame], horizon: u32, variable: &str) -> NowcastResult<Sequence> {
        let body = PredictRequest {
            frames: inputs,
            horizon,
            variable,
        };
        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(NowcastError::RemoteCall {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes()?;
        parse_predictions(&bytes)
    }
}

/// Strip one trailing `/` so `{endpoint}/predict` never doubles the slash.
pub fn normalize_endpoint(endpoint: &str) -> &str {
    let endpoint = endpoint.trim();
    endpoint.strip_suffix('/').unwrap_or(endpoint)
}

pub fn parse_predictions(body: &[u8]) -> NowcastResult<Sequence> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| NowcastError::malformed(format!("invalid JSON: {e}")))?;
    let Some(items) = value.get("predictions").and_then(|p| p.as_array()) else {
        return Err(NowcastError::malformed("missing predictions array"));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| -> NowcastResult<Frame> {
            let url = item.as_str().ok_or_else(|| {
                NowcastError::malformed(format!("prediction {i} is not a string"))
            })?;
            Frame::from_data_url(url)
                .map_err(|e| NowcastError::malformed(format!("prediction {i}: {e}")))
        })
        .collect()
}
