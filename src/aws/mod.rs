//! Minimal blocking AWS client.
//!
//! Requests are signed with SigV4 and sent through a shared `ureq` agent.
//! Only the handful of calls the labeler needs are implemented on top:
//! S3 listing/download, Rekognition `DetectLabels`, DynamoDB `PutItem`.

pub mod credentials;
pub mod sigv4;

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

pub use credentials::Credentials;

use crate::config::AwsSettings;
use sigv4::{RequestParts, SigningTime};

/// A request before signing. `path` is already URI-encoded.
#[derive(Clone, Debug)]
pub struct AwsRequest<'a> {
    pub service: &'a str,
    pub method: &'a str,
    pub endpoint: &'a Url,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: &'a [u8],
}

#[derive(Clone)]
pub struct AwsClient {
    agent: ureq::Agent,
    credentials: Credentials,
    region: String,
    endpoint_override: Option<Url>,
}

impl AwsClient {
    /// Resolves credentials and builds the HTTP agent from settings.
    pub fn from_settings(settings: &AwsSettings) -> Result<Self> {
        let credentials = Credentials::resolve(settings.profile.as_deref())
            .context("resolve aws credentials")?;
        let endpoint_override = settings
            .endpoint_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .context("parse endpoint_url")?;
        let agent = ureq::AgentBuilder::new().timeout(settings.timeout).build();
        log::debug!(
            "aws client region={} key_id={} endpoint_override={:?}",
            settings.region,
            credentials.access_key_id,
            settings.endpoint_url
        );
        Ok(Self {
            agent,
            credentials,
            region: settings.region.clone(),
            endpoint_override,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint_override(&self) -> Option<&Url> {
        self.endpoint_override.as_ref()
    }

    /// Regional endpoint for a service, or the override when configured.
    pub fn service_endpoint(&self, service: &str) -> Result<Url> {
        if let Some(url) = &self.endpoint_override {
            return Ok(url.clone());
        }
        Url::parse(&format!("https://{}.{}.amazonaws.com", service, self.region))
            .with_context(|| format!("build {} endpoint", service))
    }

    /// Signs and sends a request. Non-2xx responses become errors carrying
    /// the service's error body.
    pub fn send(&self, request: &AwsRequest<'_>) -> Result<ureq::Response> {
        let host = host_header(request.endpoint)?;
        let url = request_url(request.endpoint, &host, &request.path, &request.query)?;

        let parts = RequestParts {
            method: request.method,
            host: &host,
            path: &request.path,
            query: &request.query,
            headers: &request.headers,
            payload: request.body,
        };
        let signed = sigv4::sign(
            &parts,
            &self.credentials,
            &self.region,
            request.service,
            &SigningTime::now(),
        )?;

        let mut http = self.agent.request_url(request.method, &url);
        for (name, value) in request.headers.iter().chain(signed.iter()) {
            http = http.set(name, value);
        }
        log::debug!("{} {} {}", request.service, request.method, url);

        match http.send_bytes(request.body) {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(anyhow!(
                    "{} {} {} returned status {}: {}",
                    request.service,
                    request.method,
                    request.path,
                    code,
                    body.trim()
                ))
            }
            Err(e) => Err(anyhow!("{} request to {} failed: {}", request.service, url, e)),
        }
    }

    /// Calls an `application/x-amz-json-*` operation and decodes the reply.
    pub fn call_json<T: DeserializeOwned>(
        &self,
        service: &str,
        json_version: &str,
        target: &str,
        payload: &Value,
    ) -> Result<T> {
        let endpoint = self.service_endpoint(service)?;
        let body = serde_json::to_vec(payload)?;
        let request = AwsRequest {
            service,
            method: "POST",
            endpoint: &endpoint,
            path: "/".to_string(),
            query: Vec::new(),
            headers: vec![
                (
                    "content-type".to_string(),
                    format!("application/x-amz-json-{}", json_version),
                ),
                ("x-amz-target".to_string(), target.to_string()),
            ],
            body: &body,
        };
        let response = self.send(&request)?;
        let text = response
            .into_string()
            .with_context(|| format!("read {} response", target))?;
        serde_json::from_str(&text).with_context(|| format!("decode {} response", target))
    }
}

/// Request URL for a signed path. Fails when URL parsing would rewrite the
/// path, since the server would then see a different canonical request.
fn request_url(
    endpoint: &Url,
    host: &str,
    path: &str,
    query: &[(String, String)],
) -> Result<Url> {
    let query = sigv4::canonical_query(query);
    let raw = if query.is_empty() {
        format!("{}://{}{}", endpoint.scheme(), host, path)
    } else {
        format!("{}://{}{}?{}", endpoint.scheme(), host, path, query)
    };
    let url = Url::parse(&raw).with_context(|| format!("invalid request url {}", raw))?;
    if url.path() != path {
        return Err(anyhow!(
            "request path {} would be sent as {}",
            path,
            url.path()
        ));
    }
    Ok(url)
}

/// `host[:port]` as it appears in the `Host` header.
fn host_header(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("endpoint {} has no host", url))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
