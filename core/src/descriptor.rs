//! Request descriptors: the value that identifies one logical fetch.
//!
//! Descriptors compare by value, so two descriptors built independently from
//! the same target, method, body and headers are equal. `FetchHook` relies on
//! that to run exactly once per distinct descriptor.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::BaseUrl;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest};

pub type Headers = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestDescriptor {
    /// Relative path or absolute URL. `None` or empty means "do not fetch".
    pub target: Option<String>,
    pub method: HttpMethod,
    pub body: Option<Value>,
    pub headers: Headers,
}

impl RequestDescriptor {
    /// The idle descriptor.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, target)
    }

    pub fn new(method: HttpMethod, target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            method,
            body: None,
            headers: Headers::new(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Header names are stored lowercase, so a later header replaces an
    /// earlier one regardless of case.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers.extend(
            headers
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value)),
        );
        self
    }

    /// Attach `Authorization: Bearer <token>`.
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("authorization", format!("Bearer {token}"))
    }

    pub fn is_idle(&self) -> bool {
        self.target.as_deref().map_or(true, |t| t.trim().is_empty())
    }

    /// Resolve into a concrete request, or `None` for an idle descriptor.
    pub fn to_request(&self, base: &BaseUrl) -> Result<Option<HttpRequest>, ApiError> {
        let Some(target) = self.target.as_deref().filter(|t| !t.trim().is_empty()) else {
            return Ok(None);
        };

        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let body = match &self.body {
            Some(body) => {
                let encoded = serde_json::to_string(body)
                    .map_err(|e| ApiError::Serialization(e.to_string()))?;
                if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
                    headers.push(("content-type".to_string(), "application/json".to_string()));
                }
                Some(encoded)
            }
            None => None,
        };

        Ok(Some(HttpRequest {
            method: self.method,
            url: base.resolve(target),
            headers,
            body,
        }))
    }
}

/// Headers carrying a bearer token.
pub fn bearer_headers(token: &str) -> Headers {
    Headers::from([("authorization".to_string(), format!("Bearer {token}"))])
}
