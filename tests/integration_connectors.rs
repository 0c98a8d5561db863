use anyhow::{bail, ensure, Result};
use cerberus::auth::{
    self, okta::OktaConfig, onelogin::OneLoginConfig, transport::RetryPolicy, AuthConfig,
    AuthError, AuthStatus, ProviderConfig,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::{collections::BTreeSet, net::TcpListener, time::Duration};
use wiremock::{
    matchers::{body_json, body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn config() -> AuthConfig {
    AuthConfig::new()
        .with_response_timeout(Duration::from_secs(5))
        .with_push_poll_interval(Duration::from_millis(1))
        .with_retry(RetryPolicy::new(3, Duration::from_millis(1)))
}

fn okta_user() -> Value {
    json!({ "id": "00u1", "profile": { "login": "jane@example.com" } })
}

#[tokio::test]
async fn okta_sms_login() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/authn"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "MFA_REQUIRED",
            "stateToken": "st1",
            "_embedded": {
                "user": okta_user(),
                "factors": [
                    { "id": "sms1", "factorType": "sms", "provider": "OKTA", "status": "ACTIVE" },
                    { "id": "q1", "factorType": "question", "provider": "OKTA", "status": "ACTIVE" }
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    // The code submission is more specific, so it is mounted first.
    Mock::given(method("POST"))
        .and(path("/api/v1/authn/factors/sms1/verify"))
        .and(body_partial_json(json!({ "passCode": "123456" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "SUCCESS",
            "_embedded": { "user": okta_user() }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/authn/factors/sms1/verify"))
        .and(body_json(json!({ "stateToken": "st1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "MFA_CHALLENGE",
            "stateToken": "st1",
            "factorResult": "CHALLENGE",
            "_embedded": { "user": okta_user() }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = auth::connector(
        ProviderConfig::Okta(OktaConfig::new(
            server.uri(),
            SecretString::from("api-key".to_string()),
        )),
        config(),
    )?;

    let password = SecretString::from("hunter2".to_string());
    let response = connector.authenticate("jane@example.com", &password).await?;
    ensure!(response.status() == AuthStatus::MfaRequired);

    let devices = &response.data().devices;
    ensure!(devices.len() == 1, "unsupported factors must be dropped");
    ensure!(devices[0].name == "Okta Text Message Code");
    ensure!(devices[0].requires_trigger);

    let state_token = response.data().state_token.clone().unwrap_or_default();
    let challenge = connector.trigger_challenge(&state_token, &devices[0].id).await?;
    ensure!(challenge.status() == AuthStatus::MfaChallenge);

    let done = connector.mfa_check(&state_token, &devices[0].id, "123456").await?;
    ensure!(done.is_success());
    ensure!(done.data().user_id == "00u1");

    let body = serde_json::to_value(&done)?;
    ensure!(body == json!({
        "status": "SUCCESS",
        "data": { "user_id": "00u1", "username": "jane@example.com" }
    }));
    Ok(())
}

#[tokio::test]
async fn okta_survives_transient_outage() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/authn"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/authn"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "SUCCESS",
            "_embedded": { "user": okta_user() }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let connector = auth::connector(
        ProviderConfig::Okta(OktaConfig::new(
            server.uri(),
            SecretString::from("api-key".to_string()),
        )),
        config(),
    )?;

    let password = SecretString::from("hunter2".to_string());
    let response = connector.authenticate("jane@example.com", &password).await?;
    ensure!(response.is_success());
    Ok(())
}

#[tokio::test]
async fn onelogin_login_and_groups() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-1",
            "expires_in": 36000
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/1/login/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": { "error": false, "code": 200, "type": "success", "message": "Success" },
            "data": [{
                "status": "Authenticated",
                "user": { "id": 42, "username": "jane", "email": "jane@example.com" }
            }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/1/users/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": { "error": false, "code": 200, "type": "success", "message": "Success" },
            "data": [{ "id": 42, "member_of": "CN=Admins,OU=Groups;;CN=Ops,OU=Groups" }]
        })))
        .mount(&server)
        .await;

    let connector = auth::connector(
        ProviderConfig::OneLogin(OneLoginConfig::new(
            server.uri(),
            "client-id",
            SecretString::from("client-secret".to_string()),
            "example",
        )),
        config(),
    )?;

    let password = SecretString::from("hunter2".to_string());
    let response = connector.authenticate("jane", &password).await?;
    ensure!(response.is_success());

    let groups = connector.get_groups(response.data()).await?;
    ensure!(groups == BTreeSet::from(["Admins".to_string(), "Ops".to_string()]));

    match connector.trigger_push("st1", "1").await {
        Err(AuthError::NotImplemented { .. }) => Ok(()),
        other => bail!("expected NotImplemented, got {other:?}"),
    }
}
