use super::prelude::*;

#[derive(Default)]
pub struct SessionQueries;

#[Object]
impl SessionQueries {
    /// The user of the current session
    async fn current_user(&self, ctx: &Context<'_>) -> Result<CurrentUser> {
        let user = ctx.auth_user()?;
        Ok(CurrentUser {
            username: user.username.clone(),
            session_expires: user.expires_at,
        })
    }
}
