//! Notification sink client for optimisation completions.

use serde::Serialize;
use tracing::debug;

use skyroute_core::models::Point;

use crate::error::Error;

/// Channel optimisation completions are published on.
pub const ROUTES_CHANNEL: &str = "default/routes";

/// The `data` payload of a `routeOptimised` event. Mirrors the assess
/// response shape plus the record id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteOptimisedData {
    pub id: String,
    pub route: Vec<Point>,
    pub route_distance: f64,
    pub population_impact: f64,
    pub noise_impact_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_risk: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_risk: Option<f64>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    channel: &'a str,
    events: Vec<String>,
}

/// POSTs event envelopes to the notification sink.
#[derive(Clone)]
pub struct EventPublisher {
    client: reqwest::Client,
    domain: String,
    api_key: String,
}

impl EventPublisher {
    pub fn new(domain: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            domain,
            api_key,
        }
    }

    /// Publishing is disabled when no sink domain is configured.
    pub fn is_configured(&self) -> bool {
        !self.domain.is_empty()
    }

    pub async fn publish_route_optimised(&self, data: &RouteOptimisedData) -> Result<(), Error> {
        let event = serde_json::to_string(&serde_json::json!({
            "type": "routeOptimised",
            "data": data,
        }))
        .map_err(|err| Error::PublishFailed(err.to_string()))?;

        let envelope = Envelope {
            channel: ROUTES_CHANNEL,
            events: vec![event],
        };

        let url = format!("https://{}/events", self.domain);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&envelope)
            .send()
            .await
            .map_err(|err| Error::PublishFailed(err.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::PublishFailed(format!(
                "sink returned {}",
                response.status()
            )));
        }

        debug!(route_id = %data.id, "published routeOptimised event");
        Ok(())
    }
}
