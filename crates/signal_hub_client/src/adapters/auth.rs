//! crates/signal_hub_client/src/adapters/auth.rs
//!
//! Auth adapter: implements the `AuthGateway` port against the hosted
//! service's token endpoints, and fans its own transitions out as
//! `AuthEvent`s so the session store can react uniformly to sign-ins the
//! UI initiated and to ones the shell detected (e.g. a recovery link).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use signal_hub_core::domain::{AuthEvent, Identity, SignUpMetadata};
use signal_hub_core::ports::{AuthEventStream, AuthGateway, GatewayError, GatewayResult};

use super::http::{self, HttpGateway};

const EVENT_BUFFER: usize = 16;

pub struct RestAuthGateway {
    http: Arc<HttpGateway>,
    events: broadcast::Sender<AuthEvent>,
}

#[derive(Deserialize)]
struct UserPayload {
    id: Uuid,
    email: Option<String>,
}

impl UserPayload {
    fn into_identity(self) -> Identity {
        Identity {
            user_id: self.id,
            email: self.email.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct SessionPayload {
    access_token: String,
    user: UserPayload,
}

impl RestAuthGateway {
    pub fn new(http: Arc<HttpGateway>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self { http, events }
    }

    /// Called by the application shell when it detects a password-recovery
    /// link; subscribers see it as any other auth notification.
    pub fn notify_password_recovery(&self, identity: Identity) {
        self.emit(AuthEvent::PasswordRecovery(identity));
    }

    fn emit(&self, event: AuthEvent) {
        // A send error only means nobody is subscribed yet.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl AuthGateway for RestAuthGateway {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> GatewayResult<Identity> {
        let body = json!({
            "email": email,
            "password": password,
            "data": {
                "name": metadata.name,
                "university": metadata.university,
                "student_number": metadata.student_number,
            },
        });
        let response = self
            .http
            .execute(self.http.client().post(self.http.auth_url("signup")).json(&body))
            .await?;
        let value: serde_json::Value = response.json().await.map_err(http::network)?;

        if value.get("access_token").is_some() {
            let session: SessionPayload = serde_json::from_value(value).map_err(http::decode)?;
            self.http.set_access_token(Some(session.access_token));
            let identity = session.user.into_identity();
            self.emit(AuthEvent::SignedIn(identity.clone()));
            Ok(identity)
        } else {
            // No session yet: email confirmation is pending. The identity
            // exists remotely, but nothing is signed in.
            debug!("Sign-up accepted with confirmation pending");
            let user: UserPayload = serde_json::from_value(value).map_err(http::decode)?;
            Ok(user.into_identity())
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<Identity> {
        let body = json!({ "email": email, "password": password });
        let response = self
            .http
            .execute(
                self.http
                    .client()
                    .post(self.http.auth_url("token"))
                    .query(&[("grant_type", "password")])
                    .json(&body),
            )
            .await?;
        let session: SessionPayload = response.json().await.map_err(http::network)?;
        self.http.set_access_token(Some(session.access_token));
        let identity = session.user.into_identity();
        self.emit(AuthEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        if self.http.has_access_token() {
            let result = self
                .http
                .execute(self.http.client().post(self.http.auth_url("logout")))
                .await;
            match result {
                Ok(_) => {}
                // An already-expired session is still a successful sign-out.
                Err(GatewayError::Auth(_)) => {}
                Err(err) => return Err(err),
            }
        }
        self.http.set_access_token(None);
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    async fn reset_password(&self, email: &str) -> GatewayResult<()> {
        self.http
            .execute(
                self.http
                    .client()
                    .post(self.http.auth_url("recover"))
                    .json(&json!({ "email": email })),
            )
            .await?;
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> GatewayResult<()> {
        self.http
            .execute(
                self.http
                    .client()
                    .put(self.http.auth_url("user"))
                    .json(&json!({ "password": new_password })),
            )
            .await?;
        Ok(())
    }

    async fn subscribe(&self) -> GatewayResult<AuthEventStream> {
        let receiver = self.events.subscribe();
        let stream = futures::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    // A slow subscriber skips missed events and keeps going.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        let stream: AuthEventStream = Box::pin(stream);
        Ok(stream)
    }
}
