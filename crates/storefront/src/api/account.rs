//! Customer authentication and profile endpoints.

use reqwest::Method;
use tracing::instrument;

use super::types::{AuthResponse, Credentials, PasswordChange, ProfileUpdate, Registration, User};
use super::{AccessToken, ApiClient, ApiError};

impl ApiClient {
    /// Exchange email and password for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] or [`ApiError::Rejected`] for bad
    /// credentials, depending on the backend.
    #[instrument(skip(self, credentials))]
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        let builder = self
            .request(Method::POST, "/api/auth/login", None)
            .json(credentials);
        self.send(builder).await
    }

    /// Create an account. The backend logs the new customer in.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] if the email is taken or input is invalid.
    #[instrument(skip(self, registration))]
    pub async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError> {
        let builder = self
            .request(Method::POST, "/api/auth/register", None)
            .json(registration);
        self.send(builder).await
    }

    /// The logged-in customer's profile.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] if the token expired.
    #[instrument(skip(self, token))]
    pub async fn profile(&self, token: &AccessToken) -> Result<User, ApiError> {
        self.send(self.request(Method::GET, "/api/users/profile", Some(token)))
            .await
    }

    /// Update name, phone and address.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or input is rejected.
    #[instrument(skip(self, token, update))]
    pub async fn update_profile(
        &self,
        token: &AccessToken,
        update: &ProfileUpdate,
    ) -> Result<User, ApiError> {
        let builder = self
            .request(Method::PUT, "/api/users/profile", Some(token))
            .json(update);
        self.send(builder).await
    }

    /// Change the password.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] if the current password is wrong.
    #[instrument(skip(self, token, change))]
    pub async fn change_password(
        &self,
        token: &AccessToken,
        change: &PasswordChange,
    ) -> Result<(), ApiError> {
        let builder = self
            .request(Method::PUT, "/api/users/change-password", Some(token))
            .json(change);
        self.send_unit(builder).await
    }
}
