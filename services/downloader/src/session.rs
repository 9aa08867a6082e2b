//! HTTP session that carries Earthdata Login credentials across redirects.
//!
//! Protected assets answer the first request with a redirect to the identity
//! provider, which authenticates the user and redirects back with a session
//! cookie. reqwest drops the `Authorization` header on cross-host redirects,
//! so redirects are followed by hand: credentials go on the first hop and on
//! every hop to the identity provider, and the cookie store carries the
//! session back to the asset host.

use std::time::Duration;

use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::{Client, Response, Url};
use tracing::{debug, instrument};

use crate::auth::Credentials;
use crate::error::FetchError;

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

pub struct AuthenticatedSession {
    client: Client,
    credentials: Credentials,
    auth_host: String,
}

impl AuthenticatedSession {
    pub fn new(
        credentials: Credentials,
        auth_host: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .redirect(Policy::none())
            .cookie_store(true)
            .tcp_nodelay(true)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            credentials,
            auth_host: auth_host.into(),
        })
    }

    pub fn auth_host(&self) -> &str {
        &self.auth_host
    }

    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    fn sends_credentials(&self, url: &Url, hop: usize) -> bool {
        hop == 0
            || url
                .host_str()
                .is_some_and(|host| host.eq_ignore_ascii_case(&self.auth_host))
    }

    /// GET `url`, following redirects, and return the final response.
    ///
    /// Non-success statuses are returned as-is; only transport problems and
    /// redirect loops are errors here.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get(&self, url: &Url) -> Result<Response, FetchError> {
        let mut current = url.clone();

        for hop in 0..=MAX_REDIRECTS {
            let mut request = self.client.get(current.clone());
            if self.sends_credentials(&current, hop) {
                request = request.basic_auth(
                    self.credentials.username(),
                    Some(self.credentials.password()),
                );
            }

            let response = request
                .send()
                .await
                .map_err(|source| FetchError::Transport {
                    url: url.to_string(),
                    source,
                })?;

            if !response.status().is_redirection() {
                return Ok(response);
            }

            let next = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|location| current.join(location).ok());

            match next {
                Some(next) => {
                    debug!(hop, status = response.status().as_u16(), to = %next, "Following redirect");
                    current = next;
                }
                None => return Ok(response),
            }
        }

        Err(FetchError::TooManyRedirects {
            url: url.to_string(),
            limit: MAX_REDIRECTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::EARTHDATA_LOGIN_HOST;

    fn session() -> AuthenticatedSession {
        AuthenticatedSession::new(
            Credentials::new("user", "pw"),
            EARTHDATA_LOGIN_HOST,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_credentials_on_first_hop_and_auth_host_only() {
        let session = session();
        let asset = Url::parse("https://e4ftl01.cr.usgs.gov/VIIRS/a.h5").unwrap();
        let login = Url::parse("https://urs.earthdata.nasa.gov/oauth/authorize").unwrap();
        let other = Url::parse("https://cdn.example/a.h5").unwrap();

        assert!(session.sends_credentials(&asset, 0));
        assert!(session.sends_credentials(&login, 1));
        assert!(session.sends_credentials(&login, 4));
        assert!(!session.sends_credentials(&asset, 2));
        assert!(!session.sends_credentials(&other, 1));
    }
}
