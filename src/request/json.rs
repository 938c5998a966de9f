//! Generic JSON request payload.

use std::marker::PhantomData;
use serde::de::DeserializeOwned;
use url::Url;

use crate::request::base::Payload;
use crate::request::types::{RequestType, RetCode};

/// A request whose response body is a JSON document of type `T`.
pub struct JsonPayload<T> {
    name: String,
    request_type: RequestType,
    scheme: String,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    _output: PhantomData<fn() -> T>,
}

impl<T> JsonPayload<T> {
    pub fn new(name: impl Into<String>, request_type: RequestType, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            request_type,
            scheme: "https".to_string(),
            path: path.into(),
            query: Vec::new(),
            body: None,
            _output: PhantomData,
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl<T: DeserializeOwned + Send + 'static> Payload for JsonPayload<T> {
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    fn request_type(&self) -> RequestType {
        self.request_type
    }

    fn url(&self, hostname: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("{}://{}", self.scheme, hostname))?;
        url.set_path(&self.path);
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        Ok(url)
    }

    fn body(&self) -> Option<Vec<u8>> {
        if !self.request_type.has_body() {
            return None;
        }
        self.body.as_ref().and_then(|b| serde_json::to_vec(b).ok())
    }

    fn content_type(&self) -> Option<&str> {
        self.body.as_ref().map(|_| "application/json")
    }

    fn parse(&self, data: &[u8]) -> Result<T, RetCode> {
        serde_json::from_slice(data).map_err(|e| {
            tracing::debug!(request = %self.name, error = %e, "Response is not valid JSON for this request");
            RetCode::IncorrectJson
        })
    }
}
