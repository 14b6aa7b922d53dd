use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of `POST /predict`. Non-finite floats and `None` integers both
/// serialize as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRequest {
    pub longitude: f64,
    pub latitude: f64,
    pub housing_median_age: Option<i64>,
    pub median_income: f64,
    pub rooms_per_household: f64,
    pub bedrooms_per_room: f64,
    pub population_per_household: f64,
    pub households: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PredictionResponse {
    pub predicted_price: f64,
}

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("prediction service answered with status {0}")]
    Status(StatusCode),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("could not encode request body: {0}")]
    EncodeRequest(serde_json::Error),

    #[error("prediction worker panicked")]
    WorkerPanicked,
}

/// One request/response exchange with the prediction service.
pub trait PredictionTransport: Send + Sync {
    fn predict(&self, request: &PredictionRequest) -> Result<f64, PredictionError>;
}

pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    /// Timeouts and connection handling are left at the client defaults.
    pub fn new(base_url: &str) -> Result<Self, PredictionError> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: predict_endpoint(base_url),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

pub fn predict_endpoint(base_url: &str) -> String {
    format!("{}/predict", base_url.trim_end_matches('/'))
}

impl PredictionTransport for HttpTransport {
    fn predict(&self, request: &PredictionRequest) -> Result<f64, PredictionError> {
        let body = serde_json::to_vec(request).map_err(PredictionError::EncodeRequest)?;

        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()?;

        // body of a failed response is never read
        let status = resp.status();
        if !status.is_success() {
            return Err(PredictionError::Status(status));
        }

        let bytes = resp.bytes()?;
        let json = serde_json::from_slice::<PredictionResponse>(&bytes)?;

        Ok(json.predicted_price)
    }
}
