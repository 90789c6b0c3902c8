//! HTTP [`PeerClient`] over `reqwest`.
//!
//! `POST {peer}/message` with the envelope as JSON body, `GET {peer}/health`
//! for probes.

use crate::domain::{HealthInfo, TransportConfig, TransportError};
use crate::ports::PeerClient;
use async_trait::async_trait;
use reqwest::Client;
use shared_types::{PeerAddress, WireMessage};
use std::time::Duration;

pub struct HttpPeerClient {
    client: Client,
    request_timeout: Duration,
    health_timeout: Duration,
}

impl HttpPeerClient {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| TransportError::Codec(e.to_string()))?;

        Ok(Self {
            client,
            request_timeout: config.request_timeout(),
            health_timeout: config.health_timeout(),
        })
    }

    fn map_error(peer: &PeerAddress, timeout: Duration, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout {
                peer: peer.clone(),
                after_ms: timeout.as_millis() as u64,
            }
        } else if error.is_decode() {
            TransportError::Codec(error.to_string())
        } else {
            TransportError::Unreachable {
                peer: peer.clone(),
                reason: error.to_string(),
            }
        }
    }

    fn check_status(
        peer: &PeerAddress,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(TransportError::Rejected {
                peer: peer.clone(),
                reason: format!("HTTP {status}"),
            })
        }
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn send_message(
        &self,
        peer: &PeerAddress,
        message: &WireMessage,
    ) -> Result<(), TransportError> {
        let response = self
            .client
            .post(format!("{}/message", peer.as_str()))
            .timeout(self.request_timeout)
            .json(message)
            .send()
            .await
            .map_err(|e| Self::map_error(peer, self.request_timeout, e))?;

        Self::check_status(peer, response)?;
        Ok(())
    }

    async fn health(&self, peer: &PeerAddress) -> Result<HealthInfo, TransportError> {
        let response = self
            .client
            .get(format!("{}/health", peer.as_str()))
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| Self::map_error(peer, self.health_timeout, e))?;

        Self::check_status(peer, response)?
            .json::<HealthInfo>()
            .await
            .map_err(|e| TransportError::Codec(e.to_string()))
    }
}
