use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use log::{debug, info, warn};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::WidgetError;
use crate::types::{Credentials, TokenInfo};

pub const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const SCOPES: &str = "user-read-playback-state user-modify-playback-state";

/// Fixed relay polling cadence. Deliberately not exponential: the relay sees
/// one tiny GET every two seconds for at most one authorization attempt.
pub const RELAY_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Hard bound on one authorization attempt. The browser flow either finishes
/// within this window or the attempt is abandoned.
pub const RELAY_POLL_DEADLINE: Duration = Duration::from_secs(300);

/// Ephemeral state for a single authorization attempt. Discarded once the
/// exchange succeeds or the flow is abandoned.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub code_verifier: String,
    pub session_id: String,
}

impl AuthSession {
    pub fn begin() -> Self {
        Self {
            code_verifier: generate_verifier(),
            session_id: Uuid::new_v4().to_string(),
        }
    }
}

/// URL-safe random verifier with 32 bytes of entropy.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// base64url(SHA-256(verifier)) with padding stripped. Always 43 characters.
pub fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Authorization URL opened in the user's browser. The `state` parameter
/// carries the session id so the relay can be polled for the code later;
/// the redirect target is a remote relay, not a local callback listener.
pub fn authorize_url(creds: &Credentials, session: &AuthSession) -> String {
    let challenge = code_challenge(&session.code_verifier);
    format!(
        "{}?client_id={}&response_type=code&redirect_uri={}&scope={}&code_challenge_method=S256&code_challenge={}&state={}",
        AUTHORIZE_URL,
        urlencoding::encode(&creds.client_id),
        urlencoding::encode(&creds.redirect_uri),
        urlencoding::encode(SCOPES),
        urlencoding::encode(&challenge),
        urlencoding::encode(&session.session_id),
    )
}

pub fn check_code_url(creds: &Credentials, session: &AuthSession) -> String {
    format!(
        "{}/check-code?id={}",
        creds.redirect_uri.trim_end_matches('/'),
        urlencoding::encode(&session.session_id),
    )
}

/// One relay poll classified: `200 {code}` is done, `404` means the user has
/// not finished in the browser yet, anything else is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayPoll {
    Code(String),
    Pending,
    Failed(String),
}

pub fn classify_relay_response(status: u16, body: &str) -> RelayPoll {
    match status {
        200 => match serde_json::from_str::<serde_json::Value>(body) {
            Ok(json) => match json.get("code").and_then(|v| v.as_str()) {
                Some(code) if !code.is_empty() => RelayPoll::Code(code.to_string()),
                _ => RelayPoll::Failed("no code in relay response".into()),
            },
            Err(e) => RelayPoll::Failed(format!("unreadable relay response: {}", e)),
        },
        404 => RelayPoll::Pending,
        other => RelayPoll::Failed(format!("relay returned HTTP {}", other)),
    }
}

pub fn parse_token_response(success: bool, body: &str) -> Result<TokenInfo, WidgetError> {
    if !success {
        return Err(WidgetError::TokenExchangeFailed);
    }
    match serde_json::from_str::<TokenInfo>(body) {
        Ok(token) if !token.access_token.is_empty() => Ok(token),
        _ => Err(WidgetError::TokenExchangeFailed),
    }
}

/// Browser-based PKCE authorization against the provider, with the code
/// retrieved from the remote relay.
pub struct PkceAuthFlow {
    http: reqwest::Client,
    creds: Credentials,
}

impl PkceAuthFlow {
    pub fn new(creds: Credentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            creds,
        }
    }

    /// Starts an authorization attempt. The returned URL must be opened in
    /// the user's browser.
    pub fn begin(&self) -> (AuthSession, String) {
        let session = AuthSession::begin();
        let url = authorize_url(&self.creds, &session);
        (session, url)
    }

    /// Polls the relay until it hands over the code, the attempt hits the
    /// deadline, or `cancel` fires. Transport errors are not terminal; the
    /// relay may simply be waking up.
    pub async fn poll_for_code(
        &self,
        session: &AuthSession,
        cancel: &CancellationToken,
    ) -> Result<String, WidgetError> {
        let url = check_code_url(&self.creds, session);
        let deadline = tokio::time::Instant::now() + RELAY_POLL_DEADLINE;
        debug!("Polling relay at {}", url);

        loop {
            if cancel.is_cancelled() {
                return Err(WidgetError::AuthFailed("authorization cancelled".into()));
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(WidgetError::AuthFailed("authorization timed out".into()));
            }

            match self.http.get(&url).send().await {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    match classify_relay_response(status, &body) {
                        RelayPoll::Code(code) => {
                            info!("Received authorization code from relay");
                            return Ok(code);
                        }
                        RelayPoll::Pending => {
                            debug!("Code not ready yet, continuing to poll");
                        }
                        RelayPoll::Failed(reason) => {
                            return Err(WidgetError::AuthFailed(reason));
                        }
                    }
                }
                Err(e) => warn!("Relay poll transport error: {}", e),
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(WidgetError::AuthFailed("authorization cancelled".into()));
                }
                _ = tokio::time::sleep(RELAY_POLL_INTERVAL) => {}
            }
        }
    }

    /// Exchanges the code for a token at the provider's token endpoint.
    pub async fn exchange(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<TokenInfo, WidgetError> {
        let params = [
            ("client_id", self.creds.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.creds.redirect_uri.as_str()),
            ("code_verifier", verifier),
        ];

        let resp = self.http.post(TOKEN_URL).form(&params).send().await?;
        let success = resp.status().is_success();
        let body = resp.text().await.unwrap_or_default();
        let token = parse_token_response(success, &body)?;
        info!("Token exchange succeeded");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_creds() -> Credentials {
        Credentials {
            client_id: "client-123".into(),
            redirect_uri: "https://relay.example.com/callback".into(),
        }
    }

    #[test]
    fn challenge_is_deterministic_and_43_chars() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let a = code_challenge(verifier);
        let b = code_challenge(verifier);
        assert_eq!(a, b);
        assert_eq!(a.len(), 43);
        assert!(!a.contains('='));
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn known_challenge_vector() {
        // RFC 7636 appendix B.
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn verifier_is_urlsafe_with_enough_entropy() {
        let v = generate_verifier();
        // 32 random bytes encode to 43 unpadded base64url characters.
        assert_eq!(v.len(), 43);
        assert!(v
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(generate_verifier(), generate_verifier());
    }

    #[test]
    fn authorize_url_carries_pkce_params() {
        let creds = test_creds();
        let session = AuthSession::begin();
        let url = authorize_url(&creds, &session);

        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains(&format!(
            "code_challenge={}",
            code_challenge(&session.code_verifier)
        )));
        assert!(url.contains(&format!("state={}", session.session_id)));
    }

    #[test]
    fn check_code_url_targets_relay() {
        let creds = Credentials {
            client_id: "client-123".into(),
            redirect_uri: "https://relay.example.com/callback/".into(),
        };
        let session = AuthSession::begin();
        let url = check_code_url(&creds, &session);
        assert_eq!(
            url,
            format!(
                "https://relay.example.com/callback/check-code?id={}",
                session.session_id
            )
        );
    }

    #[test]
    fn relay_classification() {
        assert_eq!(
            classify_relay_response(200, r#"{"code": "abc"}"#),
            RelayPoll::Code("abc".into())
        );
        assert_eq!(classify_relay_response(404, ""), RelayPoll::Pending);
        assert!(matches!(
            classify_relay_response(200, r#"{"status": "waiting"}"#),
            RelayPoll::Failed(_)
        ));
        assert!(matches!(
            classify_relay_response(500, "boom"),
            RelayPoll::Failed(_)
        ));
    }

    #[test]
    fn token_response_parsing() {
        let body = r#"{
            "access_token": "tok",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "ref",
            "scope": "user-read-playback-state"
        }"#;
        let token = parse_token_response(true, body).unwrap();
        assert_eq!(token.access_token, "tok");
        assert_eq!(token.refresh_token.as_deref(), Some("ref"));

        assert!(matches!(
            parse_token_response(true, r#"{"error": "invalid_grant"}"#),
            Err(WidgetError::TokenExchangeFailed)
        ));
        assert!(matches!(
            parse_token_response(false, body),
            Err(WidgetError::TokenExchangeFailed)
        ));
    }

    #[tokio::test]
    async fn cancelled_poll_stops_quickly() {
        let flow = PkceAuthFlow::new(Credentials {
            client_id: "client-123".into(),
            // Unroutable per RFC 5737; the transport error path keeps polling
            // until the token is cancelled.
            redirect_uri: "http://192.0.2.1:9".into(),
        });
        let session = AuthSession::begin();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            flow.poll_for_code(&session, &cancel),
        )
        .await
        .expect("poll must return promptly once cancelled");
        assert!(matches!(result, Err(WidgetError::AuthFailed(_))));
    }
}
