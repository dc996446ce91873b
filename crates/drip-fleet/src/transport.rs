//! Authenticated HTTP transport for one session

use std::fmt::Write as _;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, Request, StatusCode};
use serde::Serialize;
use tracing::info;

use crate::config::FleetConfig;
use crate::error::{FleetError, Result};

pub const AGENT_USER_AGENT: &str = "dripdripgo";
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";
pub const LICENSE_KEY_HEADER: &str = "x-license-key";
pub const APP_NAME_HEADER: &str = "x-app-name";

/// Who a request is sent as
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub app_name: &'a str,
    pub auth_token: Option<&'a str>,
}

/// Fully read response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Builds and sends requests against the configured API root
pub struct Transport {
    client: Client,
    config: Arc<FleetConfig>,
}

impl Transport {
    pub fn new(config: Arc<FleetConfig>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client, config })
    }

    /// Build a JSON POST to `path` carrying the headers `credentials` call for
    pub fn build_post(&self, path: &str, body: Vec<u8>, credentials: Credentials<'_>) -> Result<Request> {
        let request = self
            .client
            .request(Method::POST, self.config.endpoint(path))
            .headers(self.headers(credentials)?)
            .body(body)
            .build()?;
        Ok(request)
    }

    fn headers(&self, credentials: Credentials<'_>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(AGENT_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        match credentials.auth_token {
            Some(token) => {
                headers.insert(AUTH_TOKEN_HEADER, header_value(token)?);
            }
            None => {
                headers.insert(LICENSE_KEY_HEADER, header_value(&self.config.license_key)?);
                headers.insert(APP_NAME_HEADER, header_value(credentials.app_name)?);
            }
        }

        Ok(headers)
    }

    /// Serialize `body` and POST it
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        credentials: Credentials<'_>,
    ) -> Result<RawResponse> {
        let bytes = serde_json::to_vec(body)?;
        let request = self.build_post(path, bytes, credentials)?;
        self.execute(request).await
    }

    /// Send a request and read the whole body
    pub async fn execute(&self, request: Request) -> Result<RawResponse> {
        if self.config.debug {
            info!("{}", dump_request(&request));
        }

        let response = self.client.execute(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        let raw = RawResponse {
            status,
            headers,
            body,
        };

        if self.config.debug {
            info!("{}", dump_response(&raw));
        }

        Ok(raw)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| FleetError::Config(e.to_string()))
}

fn dump_request(request: &Request) -> String {
    let mut out = format!("{} {} HTTP/1.1\n", request.method(), request.url());
    write_headers(&mut out, request.headers());
    if let Some(body) = request.body().and_then(|b| b.as_bytes()) {
        out.push('\n');
        out.push_str(&String::from_utf8_lossy(body));
    }
    out
}

fn dump_response(response: &RawResponse) -> String {
    let mut out = format!("HTTP/1.1 {}\n", response.status);
    write_headers(&mut out, &response.headers);
    out.push('\n');
    out.push_str(&String::from_utf8_lossy(&response.body));
    out
}

fn write_headers(out: &mut String, headers: &HeaderMap) {
    for (name, value) in headers {
        let _ = writeln!(out, "{}: {}", name, value.to_str().unwrap_or("<binary>"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> Transport {
        let config = FleetConfig {
            license_key: "lk-123".to_string(),
            api_root: "http://127.0.0.1:9/agent/v1".to_string(),
            ..Default::default()
        };
        Transport::new(Arc::new(config)).unwrap()
    }

    #[test]
    fn test_unauthenticated_headers() {
        let request = transport()
            .build_post(
                "/init",
                b"{}".to_vec(),
                Credentials {
                    app_name: "guava1",
                    auth_token: None,
                },
            )
            .unwrap();

        let headers = request.headers();
        assert_eq!(request.url().as_str(), "http://127.0.0.1:9/agent/v1/init");
        assert_eq!(headers[LICENSE_KEY_HEADER], "lk-123");
        assert_eq!(headers[APP_NAME_HEADER], "guava1");
        assert!(headers.get(AUTH_TOKEN_HEADER).is_none());
        assert_eq!(headers[USER_AGENT], AGENT_USER_AGENT);
        assert_eq!(headers[ACCEPT], "application/json");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_authenticated_headers() {
        let request = transport()
            .build_post(
                "/v7/data",
                b"{}".to_vec(),
                Credentials {
                    app_name: "guava1",
                    auth_token: Some("T"),
                },
            )
            .unwrap();

        let headers = request.headers();
        assert_eq!(headers[AUTH_TOKEN_HEADER], "T");
        assert!(headers.get(LICENSE_KEY_HEADER).is_none());
        assert!(headers.get(APP_NAME_HEADER).is_none());
        assert_eq!(headers[USER_AGENT], AGENT_USER_AGENT);
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        let result = transport().build_post(
            "/v7/data",
            Vec::new(),
            Credentials {
                app_name: "guava1",
                auth_token: Some("bad\ntoken"),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_dump_request_includes_body() {
        let request = transport()
            .build_post(
                "/init",
                br#"{"pid":1}"#.to_vec(),
                Credentials {
                    app_name: "guava1",
                    auth_token: None,
                },
            )
            .unwrap();
        let dump = dump_request(&request);
        assert!(dump.starts_with("POST http://127.0.0.1:9/agent/v1/init"));
        assert!(dump.contains("x-app-name: guava1"));
        assert!(dump.ends_with(r#"{"pid":1}"#));
    }
}
