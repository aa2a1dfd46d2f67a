use super::error::ClientError;
use crate::config::ClientConfig;
use crate::protocol::{UpdateRequest, UpdateResponse};

/// `POST /update` with a new message.
pub async fn publish(
    http: &reqwest::Client,
    config: &ClientConfig,
    message: &str,
) -> Result<UpdateResponse, ClientError> {
    let body = UpdateRequest {
        message: message.to_string(),
    };
    let resp = http
        .post(config.url("/update"))
        .json(&body)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(ClientError::from_reqwest)?;
    resp.json().await.map_err(ClientError::from_reqwest)
}
