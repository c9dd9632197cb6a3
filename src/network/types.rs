//! Request identity and response payload types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status used for opaque responses whose real status is unknown.
pub const OPAQUE_STATUS: u16 = 0;

// == Request Identity ==
/// What a request is, for matching and cache keying purposes.
///
/// `url` is the absolute URL (scheme, host, path and query). `method` is
/// stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestIdentity {
    pub method: String,
    pub url: String,
}

impl RequestIdentity {
    /// Creates an identity for an explicit method.
    pub fn new(method: impl AsRef<str>, url: impl Into<String>) -> Self {
        Self {
            method: method.as_ref().to_ascii_uppercase(),
            url: url.into(),
        }
    }

    /// Shorthand for a GET identity.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Key under which responses for this request are cached.
    pub fn cache_key(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

// == Response ==
/// A complete response: status, headers and body bytes.
///
/// Only complete responses are ever represented, so nothing partial can
/// reach a cache store. Headers keep their order and repeats (`set-cookie`);
/// the body is persisted as base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default, with = "base64_body")]
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Builder-style header append. Names are lower-cased.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append_header(name, value);
        self
    }

    pub fn append_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers
            .push((name.into().to_ascii_lowercase(), value.into()));
    }

    /// First value of header `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_opaque(&self) -> bool {
        self.status == OPAQUE_STATUS
    }
}

mod base64_body {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_uppercases_method() {
        let id = RequestIdentity::new("get", "https://example.com/api/x");
        assert_eq!(id.method, "GET");
        assert_eq!(id.cache_key(), "GET https://example.com/api/x");
    }

    #[test]
    fn test_distinct_methods_have_distinct_keys() {
        let get = RequestIdentity::get("https://example.com/a");
        let head = RequestIdentity::new("HEAD", "https://example.com/a");
        assert_ne!(get.cache_key(), head.cache_key());
    }

    #[test]
    fn test_response_header_names_lowercased() {
        let resp = Response::new(200, "ok").with_header("Content-Type", "text/plain");
        assert_eq!(resp.headers, vec![("content-type".to_string(), "text/plain".to_string())]);
        assert_eq!(resp.header("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(resp.header("etag"), None);
    }

    #[test]
    fn test_repeated_headers_survive_serialization() {
        let resp = Response::new(200, "ok")
            .with_header("Set-Cookie", "a=1")
            .with_header("Set-Cookie", "b=2");

        let json = serde_json::to_string(&resp).unwrap();
        let back: Response = serde_json::from_str(&json).unwrap();

        let cookies: Vec<&str> = back
            .headers
            .iter()
            .filter(|(name, _)| name == "set-cookie")
            .map(|(_, value)| value.as_str())
            .collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_body_is_serialized_as_base64() {
        let resp = Response::new(200, vec![0u8, 159, 146, 150]);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["body"], "AJ+Slg==");

        let back: Response = serde_json::from_value(json).unwrap();
        assert_eq!(back.body, vec![0u8, 159, 146, 150]);
    }

    #[test]
    fn test_missing_body_and_headers_default_to_empty() {
        let resp: Response = serde_json::from_str(r#"{"status": 204}"#).unwrap();
        assert!(resp.body.is_empty());
        assert!(resp.headers.is_empty());
    }

    #[test]
    fn test_invalid_base64_body_is_rejected() {
        assert!(serde_json::from_str::<Response>(r#"{"status": 200, "body": "***"}"#).is_err());
    }

    #[test]
    fn test_opaque_status() {
        assert!(Response::new(OPAQUE_STATUS, Vec::new()).is_opaque());
        assert!(!Response::new(200, Vec::new()).is_opaque());
    }
}
