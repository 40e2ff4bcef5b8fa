//! HTTP request plumbing for the coordinator REST surface.

use std::collections::HashMap;

/// A simple structure to represent an HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub method: String, // "GET" or "POST"
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "POST".to_string(),
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

const API_KEY: &str = "api_key";
const STREAM_AUTH_TYPE: &str = "stream-auth-type";
const HEADER_AUTHORIZATION: &str = "Authorization";
/// URL marker identifying video-service endpoints.
const VIDEO_ENDPOINT_MARKER: &str = "video";

/// Adds token authentication to outbound REST requests.
///
/// Requests against video endpoints get the `api_key` query parameter;
/// every request gets the `Authorization` header (current token from the
/// provider) and the `stream-auth-type` header.
pub struct AuthInterceptor {
    api_key: String,
    auth_type: String,
    token: Box<dyn Fn() -> String + Send + Sync>,
}

impl AuthInterceptor {
    pub fn new(
        api_key: impl Into<String>,
        token: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            auth_type: "jwt".to_string(),
            token: Box::new(token),
        }
    }

    pub fn with_auth_type(mut self, auth_type: impl Into<String>) -> Self {
        self.auth_type = auth_type.into();
        self
    }

    pub fn intercept(&self, request: HttpRequest) -> HttpRequest {
        let url = if request.url.contains(VIDEO_ENDPOINT_MARKER) {
            let separator = if request.url.contains('?') { '&' } else { '?' };
            format!(
                "{}{}{}={}",
                request.url,
                separator,
                API_KEY,
                urlencoding::encode(&self.api_key)
            )
        } else {
            request.url.clone()
        };

        HttpRequest { url, ..request }
            .with_header(HEADER_AUTHORIZATION, (self.token)())
            .with_header(STREAM_AUTH_TYPE, self.auth_type.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interceptor() -> AuthInterceptor {
        AuthInterceptor::new("key123", || "token-abc".to_string())
    }

    #[test]
    fn video_endpoints_get_the_api_key_query_param() {
        let request = interceptor().intercept(HttpRequest::get("https://video.example.com/call"));
        assert_eq!(request.url, "https://video.example.com/call?api_key=key123");
    }

    #[test]
    fn existing_query_strings_are_extended() {
        let request =
            interceptor().intercept(HttpRequest::get("https://video.example.com/call?limit=5"));
        assert_eq!(
            request.url,
            "https://video.example.com/call?limit=5&api_key=key123"
        );
    }

    #[test]
    fn non_video_endpoints_keep_their_url() {
        let request = interceptor().intercept(HttpRequest::get("https://chat.example.com/msg"));
        assert_eq!(request.url, "https://chat.example.com/msg");
    }

    #[test]
    fn all_requests_carry_auth_headers() {
        let request = interceptor().intercept(HttpRequest::post("https://chat.example.com/msg"));
        assert_eq!(
            request.headers.get("Authorization").map(String::as_str),
            Some("token-abc")
        );
        assert_eq!(
            request.headers.get("stream-auth-type").map(String::as_str),
            Some("jwt")
        );
    }

    #[test]
    fn api_key_value_is_url_encoded() {
        let interceptor = AuthInterceptor::new("k e&y", || "t".to_string());
        let request = interceptor.intercept(HttpRequest::get("https://video.example.com/x"));
        assert!(request.url.ends_with("api_key=k%20e%26y"));
    }
}
