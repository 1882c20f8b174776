use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::account::{ChangePassword, LoginCredentials, SignupData, UpdateProfile, User};
use crate::api::AccountApi;
use crate::error::{TodoError, TodoResult};
use crate::session::SessionProvider;

/// Service layer for authentication and profile management
///
/// Tokens and the cached profile live in the [`SessionProvider`] shared with
/// the REST client, so a successful login authorizes every later request.
#[derive(Clone)]
pub struct AccountService<A: AccountApi> {
    api: Arc<A>,
    session: Arc<dyn SessionProvider>,
}

impl<A: AccountApi> AccountService<A> {
    pub fn new(api: A, session: Arc<dyn SessionProvider>) -> Self {
        Self::from_shared(Arc::new(api), session)
    }

    pub fn from_shared(api: Arc<A>, session: Arc<dyn SessionProvider>) -> Self {
        Self { api, session }
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.token().is_some()
    }

    /// Log in, store the token pair and cache the profile.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: LoginCredentials) -> TodoResult<User> {
        credentials.validate()?;

        let tokens = self.api.login(credentials).await?;
        self.session.set_session(&tokens)?;

        match self.refresh_user().await {
            Ok(user) => {
                info!(user_id = user.id, "Logged in");
                Ok(user)
            }
            Err(err) => {
                warn!(error = %err, "Profile fetch after login failed, discarding tokens");
                self.session.clear_session()?;
                Err(err)
            }
        }
    }

    /// Register a new account and log straight into it.
    #[instrument(skip(self, data), fields(email = %data.email))]
    pub async fn signup(&self, data: SignupData) -> TodoResult<User> {
        data.validate()?;

        let created = self.api.signup(data.to_request()).await?;
        info!(user_id = created.id, "Account created");

        self.login(data.credentials()).await
    }

    pub fn logout(&self) -> TodoResult<()> {
        info!("Logged out");
        self.session.clear_session()
    }

    /// Re-validate a stored session at startup.
    ///
    /// A rejected token clears the session and yields `None`; any other
    /// failure is returned and the session is kept.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> TodoResult<Option<User>> {
        if !self.is_authenticated() {
            return Ok(None);
        }

        match self.refresh_user().await {
            Ok(user) => Ok(Some(user)),
            Err(err) if err.is_unauthenticated() => {
                warn!(error = %err, "Stored session rejected, clearing it");
                self.session.clear_session()?;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Fetch the profile and update the cached copy.
    pub async fn refresh_user(&self) -> TodoResult<User> {
        let user = self.api.profile().await?;
        self.session.set_user(&user)?;
        Ok(user)
    }

    #[instrument(skip(self, changes))]
    pub async fn update_profile(&self, changes: UpdateProfile) -> TodoResult<User> {
        changes.validate()?;
        if changes
            .profile_image
            .as_ref()
            .is_some_and(|image| image.bytes.is_empty())
        {
            return Err(TodoError::Validation("Profile image is empty".to_string()));
        }

        let user = self.api.update_profile(changes).await?;
        self.session.set_user(&user)?;
        info!(user_id = user.id, "Profile updated");
        Ok(user)
    }

    /// Change the password; returns the server's acknowledgement message.
    #[instrument(skip(self, request))]
    pub async fn change_password(&self, request: ChangePassword) -> TodoResult<String> {
        request.validate()?;

        let response = self.api.change_password(request).await?;
        info!("Password changed");
        Ok(response.detail)
    }
}
