//! Permission gating.
//!
//! [`AuthorizationGate`] turns a provider's raw [`AuthorizationStatus`] into
//! a decision: proceed, prompt the user, or fail with a typed
//! [`AuthorizationError`].

use async_trait::async_trait;
use homehub_core::logging::targets;

use crate::error::{AuthorizationError, PlatformError};
use crate::model::AuthorizationStatus;

/// A platform service whose use requires the user's permission.
#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    /// Current grant, read synchronously.
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Show the permission prompt and wait for the answer.
    ///
    /// Returns `true` when full access was granted.
    async fn request_access(&self) -> Result<bool, PlatformError>;
}

/// What [`AuthorizationGate::verify`] does for a status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Proceed,
    Prompt,
    Refuse(AuthorizationError),
}

impl Verdict {
    pub fn for_status(status: AuthorizationStatus) -> Self {
        match status {
            AuthorizationStatus::NotDetermined => Self::Prompt,
            AuthorizationStatus::FullAccess => Self::Proceed,
            AuthorizationStatus::Restricted => Self::Refuse(AuthorizationError::Restricted),
            AuthorizationStatus::Denied => Self::Refuse(AuthorizationError::Denied),
            AuthorizationStatus::WriteOnly => {
                Self::Refuse(AuthorizationError::insufficient_grant())
            }
            AuthorizationStatus::Unknown => Self::Refuse(AuthorizationError::Unknown),
        }
    }
}

/// Authorization policy for one gated capability.
pub struct AuthorizationGate<'a, P: AuthorizationProvider + ?Sized> {
    provider: &'a P,
    capability: &'static str,
}

impl<'a, P: AuthorizationProvider + ?Sized> AuthorizationGate<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            capability: "calendar",
        }
    }

    /// Name the capability in log output.
    pub fn with_capability(mut self, capability: &'static str) -> Self {
        self.capability = capability;
        self
    }

    pub fn current_status(&self) -> AuthorizationStatus {
        self.provider.authorization_status()
    }

    pub fn is_full_access(&self) -> bool {
        self.current_status().is_full_access()
    }

    pub fn is_write_only_or_full_access(&self) -> bool {
        self.current_status().is_write_only_or_full_access()
    }

    /// Prompt the user. A platform failure while prompting becomes
    /// [`AuthorizationError::Unknown`].
    pub async fn request_access(&self) -> Result<bool, AuthorizationError> {
        match self.provider.request_access().await {
            Ok(granted) => {
                tracing::debug!(
                    target: targets::AUTHORIZATION,
                    capability = self.capability,
                    granted,
                    "access prompt answered"
                );
                Ok(granted)
            }
            Err(error) => {
                tracing::warn!(
                    target: targets::AUTHORIZATION,
                    capability = self.capability,
                    %error,
                    "access prompt failed"
                );
                Err(AuthorizationError::Unknown)
            }
        }
    }

    /// Apply the policy to the current status, prompting if undetermined.
    #[tracing::instrument(
        skip_all,
        target = "homehub::authorization",
        name = "authorization.verify",
        fields(capability = self.capability)
    )]
    pub async fn verify(&self) -> Result<bool, AuthorizationError> {
        let status = self.current_status();
        match Verdict::for_status(status) {
            Verdict::Proceed => Ok(true),
            Verdict::Prompt => self.request_access().await,
            Verdict::Refuse(error) => {
                tracing::debug!(
                    target: targets::AUTHORIZATION,
                    %status,
                    %error,
                    "access refused"
                );
                Err(error)
            }
        }
    }
}
