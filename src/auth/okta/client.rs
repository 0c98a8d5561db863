use crate::auth::{
    okta::model::{AuthnResult, Group},
    transport::{JsonResponse, RetryPolicy, VendorError, VendorTransport},
};
use regex::Regex;
use reqwest::header::{HeaderMap, AUTHORIZATION, LINK};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};
use url::Url;

/// HTTP client for the Okta authn and users APIs.
#[derive(Clone, Debug)]
pub struct OktaClient {
    transport: VendorTransport,
    api_key: SecretString,
}

impl OktaClient {
    /// # Errors
    /// Returns an error if `base_url` is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: SecretString, retry: RetryPolicy) -> Result<Self, VendorError> {
        Ok(Self {
            transport: VendorTransport::new(base_url, retry)?,
            api_key,
        })
    }

    /// Primary authentication with username and password.
    ///
    /// # Errors
    /// Returns an error if Okta rejects the request or cannot be reached.
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AuthnResult, VendorError> {
        let url = self.transport.endpoint("/api/v1/authn")?;

        let payload = json!({
            "username": username,
            "password": password.expose_secret(),
        });

        let response = self
            .transport
            .send("okta.authn", self.transport.client().post(url).json(&payload))
            .await?;

        decode(response)
    }

    /// Verify a factor. Without a passcode this sends the SMS/call code or the
    /// push notification, with one it checks the code.
    ///
    /// # Errors
    /// Returns an error if Okta rejects the request or cannot be reached.
    #[instrument(skip(self, state_token, pass_code))]
    pub async fn verify_factor(
        &self,
        factor_id: &str,
        state_token: &str,
        pass_code: Option<&str>,
    ) -> Result<AuthnResult, VendorError> {
        let url = self
            .transport
            .endpoint_with("/api/v1/authn/factors/", &[factor_id, "verify"])?;

        let mut payload = Map::new();
        payload.insert("stateToken".to_string(), json!(state_token));
        if let Some(pass_code) = pass_code {
            payload.insert("passCode".to_string(), json!(pass_code));
        }

        let response = self
            .transport
            .send(
                "okta.verify_factor",
                self.transport
                    .client()
                    .post(url)
                    .json(&Value::Object(payload)),
            )
            .await?;

        decode(response)
    }

    /// List every group of a user, following `Link` pagination.
    ///
    /// # Errors
    /// Returns an error if any page fails or a next link leaves the Okta origin.
    #[instrument(skip(self))]
    pub async fn list_user_groups(&self, user_id: &str) -> Result<Vec<Group>, VendorError> {
        let mut url = self
            .transport
            .endpoint_with("/api/v1/users/", &[user_id, "groups"])?;
        let mut groups = Vec::new();

        loop {
            let request = self
                .transport
                .client()
                .get(url.clone())
                .header(AUTHORIZATION, format!("SSWS {}", self.api_key.expose_secret()));

            let response = self.transport.send("okta.list_user_groups", request).await?;
            let next = next_link(&response.headers)?;

            let page: Vec<Group> = decode(response)?;
            debug!(count = page.len(), "fetched Okta group page");
            groups.extend(page);

            match next {
                Some(next) if self.transport.is_same_origin(&next) => url = next,
                Some(next) => {
                    return Err(VendorError::Decode(format!(
                        "pagination link points outside Okta: {next}"
                    )))
                }
                None => break,
            }
        }

        Ok(groups)
    }
}

fn decode<T: DeserializeOwned>(response: JsonResponse) -> Result<T, VendorError> {
    serde_json::from_value(response.body).map_err(|e| VendorError::Decode(e.to_string()))
}

/// URL of the `rel="next"` entry of a `Link` header.
fn next_link(headers: &HeaderMap) -> Result<Option<Url>, VendorError> {
    let re = Regex::new(r#"<([^>]+)>\s*;\s*rel="next""#)
        .map_err(|e| VendorError::Decode(e.to_string()))?;

    for value in headers.get_all(LINK) {
        let Ok(value) = value.to_str() else {
            continue;
        };

        if let Some(captures) = re.captures(value) {
            let url = Url::parse(&captures[1])
                .map_err(|e| VendorError::Decode(format!("invalid pagination link: {e}")))?;
            return Ok(Some(url));
        }
    }

    Ok(None)
}
