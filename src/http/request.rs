//! URL parsing stage.
//!
//! Decorates every request with a [`ParsedUrl`] so downstream stages and
//! handlers read a decoded query instead of re-parsing the raw URI.

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use url::form_urlencoded;

/// Parsed and query-decoded view of the request URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedUrl {
    pub path: String,
    /// Raw query string, without the leading `?`.
    pub search: Option<String>,
    /// Decoded query pairs in request order; repeated keys are kept.
    pub query: Vec<(String, String)>,
}

impl ParsedUrl {
    pub fn from_uri(uri: &axum::http::Uri) -> Self {
        let search = uri.query().map(str::to_string);
        let query = search
            .as_deref()
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        Self {
            path: uri.path().to_string(),
            search,
            query,
        }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.query
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl<S> FromRequestParts<S> for ParsedUrl
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ParsedUrl>()
            .cloned()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "URL parsing stage missing"))
    }
}

pub async fn parse_url(mut req: Request<Body>, next: Next) -> Response {
    let parsed = ParsedUrl::from_uri(req.uri());
    req.extensions_mut().insert(parsed);
    next.run(req).await
}
