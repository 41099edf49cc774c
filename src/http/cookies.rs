//! Service-location cookies.
//!
//! Every response advertises where the sibling platform services live. The
//! cookie set is derived entirely from configuration, so it is rendered once
//! into header values and appended per response.

use axum::{
    body::Body,
    extract::State,
    http::{header::SET_COOKIE, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::sync::Arc;
use url::Url;

use crate::config::AppConfig;

/// Bytes escaped in cookie values: everything a browser's
/// `decodeURIComponent` expects encoded.
const COOKIE_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Error building the cookie set from configuration.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    #[error("invalid app host url {url:?}: {source}")]
    AppHostUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("app host url {0:?} has no host")]
    MissingHost(String),
    #[error("cookie {name} cannot be sent as a header")]
    InvalidHeader { name: &'static str },
}

/// Pre-rendered `Set-Cookie` values for the service-location cookies.
#[derive(Debug, Clone)]
pub struct LocationCookies {
    values: Arc<[HeaderValue]>,
}

impl LocationCookies {
    pub fn from_config(config: &AppConfig) -> Result<Self, CookieError> {
        let hosts = &config.hosts;
        let app_url = Url::parse(&hosts.app).map_err(|source| CookieError::AppHostUrl {
            url: hosts.app.clone(),
            source,
        })?;
        // Url drops a default port; keep it when the configured url spells it out.
        let port = app_url
            .port()
            .or_else(|| explicit_port(&hosts.app).and(app_url.port_or_known_default()));
        let app_host = match (app_url.host_str(), port) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(CookieError::MissingHost(hosts.app.clone())),
        };

        let pairs: [(&'static str, &str); 11] = [
            ("webida.host", &app_host),
            ("webida.appHostUrl", &hosts.app),
            ("webida.authHostUrl", &hosts.auth),
            ("webida.fsHostUrl", &hosts.fs),
            ("webida.buildHostUrl", &hosts.build),
            ("webida.ntfHostUrl", &hosts.ntf),
            ("webida.corsHostUrl", &hosts.cors),
            ("webida.connHostUrl", &hosts.conn),
            ("webida.monHostUrl", &hosts.mon),
            ("webida.deploy.type", &config.deploy.kind),
            ("webida.deploy.pathPrefix", &config.deploy.path_prefix),
        ];

        let domain = config.cookie_domain();
        let values = pairs
            .iter()
            .map(|(name, value)| {
                let encoded = utf8_percent_encode(value, COOKIE_VALUE);
                HeaderValue::from_str(&format!("{name}={encoded}; Domain={domain}; Path=/"))
                    .map_err(|_| CookieError::InvalidHeader { name: *name })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            values: values.into(),
        })
    }

    pub fn values(&self) -> &[HeaderValue] {
        &self.values
    }
}

/// Port written in the authority of `raw`, if any.
fn explicit_port(raw: &str) -> Option<&str> {
    let rest = raw.split_once("://").map_or(raw, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let authority = authority.rsplit_once('@').map_or(authority, |(_, a)| a);
    authority
        .rsplit_once(':')
        .map(|(_, port)| port)
        .filter(|port| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
}

pub async fn set_location_cookies(
    State(cookies): State<LocationCookies>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    for value in cookies.values() {
        headers.append(SET_COOKIE, value.clone());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(config: &AppConfig) -> Vec<String> {
        LocationCookies::from_config(config)
            .unwrap()
            .values()
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn renders_every_cookie_in_order() {
        let cookies = rendered(&AppConfig::default());
        let names: Vec<_> = cookies
            .iter()
            .map(|c| c.split('=').next().unwrap())
            .collect();

        assert_eq!(
            names,
            [
                "webida.host",
                "webida.appHostUrl",
                "webida.authHostUrl",
                "webida.fsHostUrl",
                "webida.buildHostUrl",
                "webida.ntfHostUrl",
                "webida.corsHostUrl",
                "webida.connHostUrl",
                "webida.monHostUrl",
                "webida.deploy.type",
                "webida.deploy.pathPrefix",
            ]
        );
    }

    #[test]
    fn host_cookie_keeps_port_and_values_are_encoded() {
        let cookies = rendered(&AppConfig::default());
        assert_eq!(cookies[0], "webida.host=localhost%3A5001; Domain=localhost; Path=/");
        assert_eq!(
            cookies[1],
            "webida.appHostUrl=http%3A%2F%2Flocalhost%3A5001; Domain=localhost; Path=/"
        );
    }

    #[test]
    fn domain_attribute_follows_reverse_proxy_mode() {
        let mut config = AppConfig {
            domain: "webida.org".to_string(),
            ..AppConfig::default()
        };
        assert!(rendered(&config).iter().all(|c| c.contains("; Domain=webida.org;")));

        config.use_reverse_proxy = true;
        assert!(rendered(&config).iter().all(|c| c.contains("; Domain=.webida.org;")));
    }

    #[test]
    fn values_decode_like_uri_components() {
        let mut config = AppConfig::default();
        config.deploy.path_prefix = "my apps/(beta)~".to_string();

        let cookies = rendered(&config);
        assert_eq!(
            cookies[10],
            "webida.deploy.pathPrefix=my%20apps%2F(beta)~; Domain=localhost; Path=/"
        );
    }

    #[test]
    fn host_cookie_keeps_explicit_default_port() {
        let mut config = AppConfig::default();
        config.hosts.app = "http://webida.test:80/".to_string();
        assert!(rendered(&config)[0].starts_with("webida.host=webida.test%3A80;"));

        config.hosts.app = "http://webida.test/".to_string();
        assert!(rendered(&config)[0].starts_with("webida.host=webida.test;"));
    }

    #[test]
    fn explicit_port_reads_the_authority_only() {
        assert_eq!(explicit_port("http://user:pw@host:80/a:1"), Some("80"));
        assert_eq!(explicit_port("http://[::1]/"), None);
        assert_eq!(explicit_port("http://[::1]:8080"), Some("8080"));
        assert_eq!(explicit_port("http://host/x?y=z:9"), None);
    }

    #[test]
    fn rejects_unparsable_app_url() {
        let mut config = AppConfig::default();
        config.hosts.app = "::not-a-url".to_string();
        assert!(matches!(
            LocationCookies::from_config(&config),
            Err(CookieError::AppHostUrl { .. })
        ));
    }
}
