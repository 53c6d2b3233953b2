use reqwest::Method;
use tracing::{debug, info, warn};

use super::{ApiClient, ApiError};
use crate::models::{AccessToken, Session, SignInRequest, SignInResponse, UserProfile};

impl ApiClient {
    /// Signs in with email and password and installs the returned session.
    ///
    /// A 401 here means bad credentials (`ApiError::InvalidCredentials`) and
    /// never triggers a token refresh.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let request = self
            .request(Method::POST, self.endpoints().signin.clone())
            .json(&SignInRequest { email, password })?;
        let payload: SignInResponse = self.send_json(request).await?;

        let token = AccessToken::new(payload.access_token).ok_or_else(|| {
            ApiError::Serialization("sign-in response carried no access token".into())
        })?;
        self.install_token(token.clone()).await;

        let session = Session::new(payload.user, Some(token));
        self.session().set_session(session.clone()).await;

        info!(
            event_name = "auth.signin.success",
            event_domain = "auth",
            user_id = session
                .user
                .as_ref()
                .and_then(|u| u.id.as_deref())
                .unwrap_or("unknown"),
            "user signed in"
        );
        Ok(session)
    }

    /// Fetches the current user's profile and caches it in the session.
    ///
    /// A failure leaves the session as it is; signing out stays an explicit
    /// user action.
    pub async fn me(&self) -> Result<UserProfile, ApiError> {
        let path = self.endpoints().me.clone();
        match self.get::<UserProfile>(&path).await {
            Ok(user) => {
                self.session().set_user(Some(user.clone())).await;
                Ok(user)
            }
            Err(e) => {
                debug!("Profile fetch failed, keeping the current session: {}", e);
                Err(e)
            }
        }
    }

    /// Tells the backend to end the session, then clears local state.
    /// Never fails: a failed logout call is logged.
    pub async fn logout(&self) {
        let request = self.request(Method::POST, self.endpoints().logout.clone());
        if let Err(e) = self.send(request).await {
            warn!(
                event_name = "auth.logout.failed",
                event_domain = "auth",
                "Logout call failed; clearing the local session anyway: {}",
                e
            );
        }
        self.clear_local_session().await;
        info!(event_name = "auth.logout", event_domain = "auth", "user signed out");
    }

    /// Clears the in-memory session and default authorization right away and
    /// sends the logout call from a detached task.
    ///
    /// The persisted entry is removed by that task, so a request issued in
    /// between may still pick up the old token from storage.
    pub fn logout_background(&self) {
        let token = self.default_token().or_else(|| self.session().token());
        self.set_default_token(None);
        self.session().clear_cached();

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime available; logout call and storage cleanup skipped");
                return;
            }
        };

        let client = self.clone();
        handle.spawn(async move {
            client.session().remove_persisted().await;

            let mut request = client.request(Method::POST, client.endpoints().logout.clone());
            if let Some(token) = &token {
                request = request.bearer(token);
            }
            match client.send(request).await {
                Ok(_) => info!(
                    event_name = "auth.logout",
                    event_domain = "auth",
                    "user signed out"
                ),
                Err(e) => warn!(
                    event_name = "auth.logout.failed",
                    event_domain = "auth",
                    "Background logout call failed: {}",
                    e
                ),
            }
        });
    }

    async fn clear_local_session(&self) {
        self.session().clear().await;
        self.set_default_token(None);
    }
}
