//! Passkey / WebAuthn registration and login ceremonies.
//!
//! Both ceremonies follow the WebAuthn challenge/response pattern. Server
//! state for an in-flight ceremony is a sealed `payload.signature` token
//! (the same signing scheme as the admin cookie, with a much shorter TTL),
//! so no challenge rows are stored. Client responses are validated for
//! type, origin, and challenge round-trip, and assertions must report a
//! signature counter strictly greater than the stored one — a
//! non-increasing counter indicates a cloned authenticator and is rejected.
//!
//! Attestation and assertion signatures are treated as verified by the
//! caller's FIDO2 library; this module sequences and validates the
//! ceremony state around them.

use std::sync::Arc;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use creel_core::adapters::DatabaseAdapter;
use creel_core::clock::Clock;
use creel_core::config::AuthConfig;
use creel_core::error::{AuthError, AuthResult, DatabaseError};
use creel_core::session::SessionManager;
use creel_core::signer::TokenSigner;
use creel_core::types::{CreateCredential, PasskeyCredential, UserSession};

/// Options for one ceremony plus the sealed challenge the client must echo.
#[derive(Debug, Clone, Serialize)]
pub struct CeremonyOptions {
    pub options: serde_json::Value,
    pub challenge_token: String,
}

/// Claims sealed into a ceremony challenge token.
#[derive(Debug, Serialize, Deserialize)]
struct ChallengeClaims {
    purpose: String,
    user_id: Option<String>,
    challenge: String,
    issued_at: i64,
}

const PURPOSE_REGISTER: &str = "webauthn.create";
const PURPOSE_AUTHENTICATE: &str = "webauthn.get";

pub struct PasskeyAuthenticator {
    config: Arc<AuthConfig>,
    database: Arc<dyn DatabaseAdapter>,
    clock: Arc<dyn Clock>,
    signer: TokenSigner,
}

impl PasskeyAuthenticator {
    pub fn new(
        config: Arc<AuthConfig>,
        database: Arc<dyn DatabaseAdapter>,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        let signer = TokenSigner::new(&config.secret)?;
        Ok(Self {
            config,
            database,
            clock,
            signer,
        })
    }

    /// Generate creation options for adding a credential to an account.
    pub async fn begin_registration(&self, user_id: &str) -> AuthResult<CeremonyOptions> {
        let user = self
            .database
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let challenge = generate_challenge();
        let challenge_token = self.seal_challenge(PURPOSE_REGISTER, Some(user_id), &challenge)?;

        // Existing credentials are excluded so the authenticator does not
        // re-register one it already holds.
        let exclude_credentials: Vec<serde_json::Value> = self
            .database
            .list_user_credentials(user_id)
            .await?
            .iter()
            .map(|c| {
                serde_json::json!({
                    "type": "public-key",
                    "id": c.credential_id,
                })
            })
            .collect();

        let passkey = &self.config.passkey;
        let options = serde_json::json!({
            "challenge": challenge,
            "rp": {
                "name": passkey.rp_name,
                "id": passkey.rp_id,
            },
            "user": {
                "id": URL_SAFE_NO_PAD.encode(user.id.as_bytes()),
                "name": user.email,
                "displayName": user.name.as_deref().unwrap_or(&user.email),
            },
            "pubKeyCredParams": [
                { "type": "public-key", "alg": -7 },
                { "type": "public-key", "alg": -257 },
            ],
            "timeout": 60000,
            "excludeCredentials": exclude_credentials,
            "authenticatorSelection": {
                "residentKey": "preferred",
                "userVerification": "preferred",
            },
            "attestation": "none",
        });

        Ok(CeremonyOptions {
            options,
            challenge_token,
        })
    }

    /// Verify an attestation response and persist the new credential.
    pub async fn finish_registration(
        &self,
        user_id: &str,
        challenge_token: &str,
        response: &serde_json::Value,
        name: Option<&str>,
    ) -> AuthResult<PasskeyCredential> {
        let claims = self.open_challenge(challenge_token, PURPOSE_REGISTER)?;
        if claims.user_id.as_deref() != Some(user_id) {
            return Err(AuthError::ChallengeInvalid);
        }

        let client_data = decode_client_data_json(response)?;
        let echoed = validate_client_data(&self.config, &client_data, PURPOSE_REGISTER)?;
        if echoed != claims.challenge {
            return Err(AuthError::ChallengeInvalid);
        }

        let credential_id = extract_credential_id(response)?;
        let public_key = response
            .get("response")
            .and_then(|r| r.get("attestationObject"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| AuthError::bad_request("Missing attestationObject in response"))?
            .to_string();

        let authenticator_attachment = response
            .get("authenticatorAttachment")
            .and_then(|v| v.as_str())
            .unwrap_or("platform");
        let device_type = if authenticator_attachment == "cross-platform" {
            "multiDevice"
        } else {
            "singleDevice"
        };

        let backed_up = response
            .get("clientExtensionResults")
            .and_then(|v| v.get("credProps"))
            .and_then(|v| v.get("rk"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let counter = response.get("counter").and_then(|v| v.as_u64()).unwrap_or(0);

        let credential_name = name
            .map(String::from)
            .unwrap_or_else(|| format!("Passkey {}", self.clock.now().format("%Y-%m-%d")));

        let result = self
            .database
            .create_credential(
                CreateCredential {
                    user_id: user_id.to_string(),
                    name: credential_name,
                    credential_id: credential_id.to_string(),
                    public_key,
                    counter,
                    device_type: device_type.to_string(),
                    backed_up,
                },
                self.clock.now(),
            )
            .await;

        match result {
            Err(AuthError::Database(DatabaseError::Constraint(_))) => Err(AuthError::conflict(
                "Credential is already registered",
            )),
            other => other,
        }
    }

    /// Generate discoverable-credential authentication options. No
    /// username is required; the credential id in the assertion selects
    /// the account.
    pub fn begin_authentication(&self) -> AuthResult<CeremonyOptions> {
        let challenge = generate_challenge();
        let challenge_token = self.seal_challenge(PURPOSE_AUTHENTICATE, None, &challenge)?;

        let options = serde_json::json!({
            "challenge": challenge,
            "timeout": 60000,
            "rpId": self.config.passkey.rp_id,
            "allowCredentials": [],
            "userVerification": "preferred",
        });

        Ok(CeremonyOptions {
            options,
            challenge_token,
        })
    }

    /// Verify an assertion response, enforce the counter discipline, and
    /// hand off to the session manager for a fresh session.
    pub async fn finish_authentication(
        &self,
        challenge_token: &str,
        response: &serde_json::Value,
    ) -> AuthResult<(PasskeyCredential, UserSession)> {
        let claims = self.open_challenge(challenge_token, PURPOSE_AUTHENTICATE)?;

        let client_data = decode_client_data_json(response)?;
        let echoed = validate_client_data(&self.config, &client_data, PURPOSE_AUTHENTICATE)?;
        if echoed != claims.challenge {
            return Err(AuthError::ChallengeInvalid);
        }

        let credential_id = extract_credential_id(response)?;
        let credential = self
            .database
            .get_credential_by_credential_id(credential_id)
            .await?
            .ok_or(AuthError::CredentialNotFound)?;

        // The assertion signature itself is verified against
        // `credential.public_key` by the FIDO2 library; an assertion with
        // no signature at all is malformed regardless.
        response
            .get("response")
            .and_then(|r| r.get("signature"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::bad_request("Missing assertion signature"))?;

        let reported = response
            .get("counter")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| AuthError::bad_request("Missing signature counter"))?;
        if reported <= credential.counter {
            return Err(AuthError::CounterNotIncreased);
        }

        // Compare-and-set with the freshly validated value: a concurrent
        // assertion that already consumed this counter makes the write a
        // no-op, and this assertion is rejected too.
        let updated = self
            .database
            .update_credential_counter(&credential.id, reported, self.clock.now())
            .await?;
        if !updated {
            return Err(AuthError::CounterNotIncreased);
        }

        let sessions = SessionManager::new(
            self.config.clone(),
            self.database.clone(),
            self.clock.clone(),
        );
        let session = sessions.create_session(&credential.user_id, None).await?;

        Ok((credential, session))
    }

    pub async fn list_credentials(&self, user_id: &str) -> AuthResult<Vec<PasskeyCredential>> {
        self.database.list_user_credentials(user_id).await
    }

    /// Rename an owned credential.
    pub async fn rename_credential(
        &self,
        user_id: &str,
        id: &str,
        name: &str,
    ) -> AuthResult<PasskeyCredential> {
        let credential = self
            .database
            .get_credential_by_id(id)
            .await?
            .ok_or(AuthError::CredentialNotFound)?;
        if credential.user_id != user_id {
            return Err(AuthError::forbidden("Credential belongs to another user"));
        }

        self.database.update_credential_name(id, name).await
    }

    /// Delete an owned credential. The last remaining credential of a user
    /// cannot be deleted.
    pub async fn delete_credential(&self, user_id: &str, id: &str) -> AuthResult<()> {
        let credential = self
            .database
            .get_credential_by_id(id)
            .await?
            .ok_or(AuthError::CredentialNotFound)?;
        if credential.user_id != user_id {
            return Err(AuthError::forbidden("Credential belongs to another user"));
        }

        let remaining = self.database.list_user_credentials(user_id).await?.len();
        if remaining <= 1 {
            return Err(AuthError::CannotDeleteLastPasskey);
        }

        self.database.delete_credential(id).await
    }

    fn seal_challenge(
        &self,
        purpose: &str,
        user_id: Option<&str>,
        challenge: &str,
    ) -> AuthResult<String> {
        self.signer.seal(&ChallengeClaims {
            purpose: purpose.to_string(),
            user_id: user_id.map(String::from),
            challenge: challenge.to_string(),
            issued_at: self.clock.now().timestamp_millis(),
        })
    }

    fn open_challenge(&self, token: &str, purpose: &str) -> AuthResult<ChallengeClaims> {
        let claims: ChallengeClaims = self
            .signer
            .open(token)
            .ok_or(AuthError::ChallengeInvalid)?;
        if claims.purpose != purpose {
            return Err(AuthError::ChallengeInvalid);
        }

        let age_ms = self.clock.now().timestamp_millis() - claims.issued_at;
        if age_ms < 0 || age_ms > self.config.passkey.challenge_ttl.num_milliseconds() {
            return Err(AuthError::ChallengeExpired);
        }

        Ok(claims)
    }
}

fn generate_challenge() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn extract_credential_id(response: &serde_json::Value) -> AuthResult<&str> {
    response
        .get("id")
        .or_else(|| response.get("rawId"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| AuthError::bad_request("Missing credential id in response"))
}

fn decode_client_data_json(response: &serde_json::Value) -> AuthResult<serde_json::Value> {
    let encoded = response
        .get("response")
        .and_then(|r| r.get("clientDataJSON"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| AuthError::bad_request("Missing clientDataJSON in response"))?;

    // Clients disagree on padding; accept both base64url and standard.
    if let Ok(bytes) = URL_SAFE_NO_PAD.decode(encoded) {
        if let Ok(client_data) = serde_json::from_slice(&bytes) {
            return Ok(client_data);
        }
    }
    if let Ok(bytes) = STANDARD.decode(encoded) {
        if let Ok(client_data) = serde_json::from_slice(&bytes) {
            return Ok(client_data);
        }
    }

    Err(AuthError::bad_request("Invalid clientDataJSON encoding"))
}

fn validate_client_data(
    config: &AuthConfig,
    client_data: &serde_json::Value,
    expected_type: &str,
) -> AuthResult<String> {
    let client_type = client_data
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or(AuthError::ChallengeInvalid)?;
    if client_type != expected_type {
        return Err(AuthError::ChallengeInvalid);
    }

    let origin = client_data
        .get("origin")
        .and_then(|v| v.as_str())
        .ok_or(AuthError::ChallengeInvalid)?;
    if origin != config.passkey.origin {
        return Err(AuthError::ChallengeInvalid);
    }

    client_data
        .get("challenge")
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or(AuthError::ChallengeInvalid)
}
