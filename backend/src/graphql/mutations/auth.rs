use super::prelude::*;
use crate::gmp::{Connector, Credentials};
use crate::graphql::auth::{JwtSecret, issue_token};
use crate::services::SessionStore;

#[derive(Default)]
pub struct AuthMutations;

#[Object]
impl AuthMutations {
    /// Log in with gvmd credentials
    ///
    /// No authentication required. Failed logins are reported in the result,
    /// not as errors.
    async fn login(
        &self,
        ctx: &Context<'_>,
        username: String,
        password: String,
    ) -> Result<LoginResult> {
        let connector = ctx.data::<Arc<dyn Connector>>()?;
        let sessions = ctx.data::<Arc<SessionStore>>()?;
        let secret = ctx.data::<JwtSecret>()?;

        let credentials = Credentials::new(username, password);
        let client = connector.connect(None);

        match client.authenticate(&credentials).await {
            Ok(_) => {
                let session = sessions.create(credentials);
                let token = issue_token(secret, session.id, session.username())?;
                tracing::info!(
                    session_id = %session.id,
                    username = session.username(),
                    "User logged in"
                );
                Ok(LoginResult {
                    ok: true,
                    token: Some(token),
                    expires_at: Some(session.expires_at),
                    error: None,
                })
            }
            Err(e) => {
                tracing::warn!(
                    username = %credentials.username,
                    error = %e,
                    "Login failed"
                );
                Ok(LoginResult {
                    ok: false,
                    token: None,
                    expires_at: None,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    /// End the current session
    async fn logout(&self, ctx: &Context<'_>) -> Result<LogoutResult> {
        let user = ctx.auth_user()?;
        let sessions = ctx.data::<Arc<SessionStore>>()?;

        let ok = sessions.remove(user.session_id);
        tracing::debug!(session_id = %user.session_id, "User logged out");
        Ok(LogoutResult { ok })
    }
}
