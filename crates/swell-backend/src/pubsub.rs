//! Pub/Sub backlog measurement.
//!
//! Pub/Sub does not expose queue depth directly; Cloud Monitoring
//! does, as per-subscription time series. For each subscription this
//! collector queries the undelivered and outstanding message metrics
//! over the last minute and sums the most recent point of every
//! returned series.
//!
//! Authentication follows the service-account JWT grant: the
//! credentials file's private key signs a short-lived assertion which
//! is exchanged at the token endpoint for a bearer token.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::collector::{BacklogCollector, CollectorError};
use crate::snapshot::MetricsSnapshot;

const UNDELIVERED_METRIC: &str =
    "pubsub.googleapis.com/subscription/num_undelivered_messages";
const OUTSTANDING_METRIC: &str =
    "pubsub.googleapis.com/subscription/num_outstanding_messages";
const MONITORING_SCOPE: &str = "https://www.googleapis.com/auth/monitoring.read";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

pub struct PubSubCollector {
    http: reqwest::Client,
    credentials_file: String,
    project: String,
    subscription_ids: Vec<String>,
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Serialize)]
struct TokenClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl PubSubCollector {
    pub fn new(credentials_file: &str, project: &str, subscription_ids: Vec<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials_file: credentials_file.to_string(),
            project: project.to_string(),
            subscription_ids,
        }
    }

    async fn access_token(&self) -> Result<String, CollectorError> {
        let auth = |m: String| CollectorError::Auth(m);

        let raw = tokio::fs::read_to_string(&self.credentials_file)
            .await
            .map_err(|e| auth(format!("reading {}: {e}", self.credentials_file)))?;
        let key: ServiceAccountKey = serde_json::from_str(&raw)
            .map_err(|e| auth(format!("parsing {}: {e}", self.credentials_file)))?;

        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            iss: &key.client_email,
            scope: MONITORING_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let signer = jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| auth(format!("service account private key: {e}")))?;
        let assertion = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256),
            &claims,
            &signer,
        )
        .map_err(|e| auth(format!("signing token assertion: {e}")))?;

        let resp = self
            .http
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| auth(format!("token exchange: {e}")))?;
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| auth(format!("token response: {e}")))?;
        Ok(token.access_token)
    }

    async fn subscription_backlog(
        &self,
        token: &str,
        subscription_id: &str,
    ) -> Result<u64, CollectorError> {
        let end = Utc::now();
        let start = end - chrono::Duration::minutes(1);
        let filter = format!(
            "(metric.type=\"{UNDELIVERED_METRIC}\" OR metric.type=\"{OUTSTANDING_METRIC}\") \
             AND resource.label.subscription_id=\"{subscription_id}\""
        );
        let start_time = start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end_time = end.to_rfc3339_opts(SecondsFormat::Secs, true);
        let url = format!(
            "https://monitoring.googleapis.com/v3/projects/{}/timeSeries",
            self.project
        );

        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("filter", filter.as_str()),
                ("interval.startTime", start_time.as_str()),
                ("interval.endTime", end_time.as_str()),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| CollectorError::Request(format!("pubsub {subscription_id}: {e}")))?;

        let body: serde_json::Value = resp.json().await.map_err(|e| {
            CollectorError::MalformedResponse(format!("pubsub {subscription_id}: {e}"))
        })?;
        latest_points_total(&body).map_err(|m| {
            CollectorError::MalformedResponse(format!("pubsub {subscription_id}: {m}"))
        })
    }
}

#[async_trait]
impl BacklogCollector for PubSubCollector {
    async fn collect(&self) -> Result<MetricsSnapshot, CollectorError> {
        let token = self.access_token().await?;
        let mut total = 0u64;
        for subscription_id in &self.subscription_ids {
            total += self.subscription_backlog(&token, subscription_id).await?;
        }
        Ok(MetricsSnapshot::from_backlog(total))
    }
}

/// Sum the most recent point of every time series in a
/// `timeSeries.list` response. An absent `timeSeries` field means no
/// data in the window, which reads as an empty backlog.
fn latest_points_total(body: &serde_json::Value) -> Result<u64, String> {
    let series = match body.get("timeSeries") {
        None => return Ok(0),
        Some(s) => s
            .as_array()
            .ok_or_else(|| "timeSeries is not an array".to_string())?,
    };

    let mut total = 0u64;
    for ts in series {
        let value = ts
            .pointer("/points/0/value")
            .ok_or_else(|| "time series has no points".to_string())?;
        // int64 values arrive as decimal strings in the JSON mapping.
        let n = if let Some(v) = value.get("int64Value") {
            v.as_str()
                .and_then(|s| s.parse::<u64>().ok())
                .or_else(|| v.as_u64())
                .ok_or_else(|| "int64Value is not a count".to_string())?
        } else if let Some(v) = value.get("doubleValue").and_then(serde_json::Value::as_f64) {
            v.max(0.0) as u64
        } else {
            return Err("time series point has no numeric value".to_string());
        };
        total += n;
    }
    Ok(total)
}
