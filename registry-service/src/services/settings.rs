use serde::Serialize;
use std::sync::Arc;

use super::{AccountDirectory, AuthorizationResolver, Resolution, ServiceError, SettingsContext};
use crate::models::{Account, EmailAddr, Principal, ProfileChange, SubjectRef};

/// Outcome of a guarded settings operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<T> {
    RedirectToAuthentication,
    RedirectToSelf { login: String },
    Done(T),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProfileView {
    #[serde(flatten)]
    pub context: SettingsContext,
    pub emails: Vec<EmailAddr>,
}

/// Single choke point for settings reads and writes: nothing is read or
/// changed until the resolver grants access.
#[derive(Clone)]
pub struct SettingsGuard {
    resolver: AuthorizationResolver,
    directory: Arc<dyn AccountDirectory>,
}

impl SettingsGuard {
    pub fn new(directory: Arc<dyn AccountDirectory>, org_list_limit: u32) -> Self {
        Self {
            resolver: AuthorizationResolver::new(directory.clone(), org_list_limit),
            directory,
        }
    }

    pub async fn view(
        &self,
        principal: Option<&Principal>,
        target: &SubjectRef,
    ) -> Result<Guarded<SettingsContext>, ServiceError> {
        Ok(match self.resolver.resolve(principal, target).await? {
            Resolution::RedirectToAuthentication => Guarded::RedirectToAuthentication,
            Resolution::RedirectToSelf { login } => Guarded::RedirectToSelf { login },
            Resolution::Granted(context) => Guarded::Done(context),
        })
    }

    /// Settings context plus the subject's e-mail addresses. Organizations
    /// have none, and a directory that refuses to list them yields none.
    pub async fn profile(
        &self,
        principal: Option<&Principal>,
        target: &SubjectRef,
    ) -> Result<Guarded<ProfileView>, ServiceError> {
        let context = match self.view(principal, target).await? {
            Guarded::Done(context) => context,
            Guarded::RedirectToAuthentication => return Ok(Guarded::RedirectToAuthentication),
            Guarded::RedirectToSelf { login } => return Ok(Guarded::RedirectToSelf { login }),
        };

        let emails = if context.user.is_organization {
            Vec::new()
        } else {
            match self.directory.list_emails(context.user.uid).await {
                Ok(emails) => emails,
                Err(ServiceError::Forbidden(_)) => Vec::new(),
                Err(e) => return Err(e),
            }
        };

        Ok(Guarded::Done(ProfileView { context, emails }))
    }

    /// Applies one profile change after authorization, returning the
    /// subject's state after the change.
    pub async fn apply(
        &self,
        principal: Option<&Principal>,
        target: &SubjectRef,
        change: ProfileChange,
    ) -> Result<Guarded<Account>, ServiceError> {
        let context = match self.view(principal, target).await? {
            Guarded::Done(context) => context,
            Guarded::RedirectToAuthentication => return Ok(Guarded::RedirectToAuthentication),
            Guarded::RedirectToSelf { login } => return Ok(Guarded::RedirectToSelf { login }),
        };

        let account = self
            .directory
            .apply_profile_change(context.user.uid, &change)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("user or organization {} not found", context.user.login))
            })?;

        tracing::info!(
            subject = %account.login,
            field = change.field(),
            "Profile updated"
        );
        Ok(Guarded::Done(account))
    }
}
