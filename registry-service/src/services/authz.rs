//! Who may view or edit a user's or organization's settings.
//!
//! Every call re-reads memberships from the directory; nothing is cached
//! between requests.

use serde::Serialize;
use std::sync::Arc;

use super::{AccountDirectory, ServiceError};
use crate::models::{Account, OrgMembership, Principal, SubjectRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationResult {
    pub subject: Account,
    pub allowed: bool,
    pub reason: String,
}

/// The decision procedure over already-fetched membership data.
pub fn decide(
    principal: &Principal,
    subject: &Account,
    memberships: &[OrgMembership],
) -> AuthorizationResult {
    let (allowed, reason) = if principal.uid == subject.uid {
        (true, "self")
    } else if !subject.is_organization {
        (false, "a different user")
    } else {
        match memberships.iter().find(|m| m.org.uid == subject.uid) {
            Some(membership) if membership.is_admin() => (true, "organization admin"),
            Some(_) => (false, "organization member without admin role"),
            None => (false, "not a member of the organization"),
        }
    };

    AuthorizationResult {
        subject: subject.clone(),
        allowed,
        reason: reason.to_string(),
    }
}

/// What the principal may see once access to a subject is granted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SettingsContext {
    pub user: Account,
    /// The subject followed by every organization the principal belongs to.
    pub orgs_and_self: Vec<Account>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No principal: the caller must log in first.
    RedirectToAuthentication,
    /// The route used the self alias; it must be reissued for this login.
    RedirectToSelf { login: String },
    Granted(SettingsContext),
}

#[derive(Clone)]
pub struct AuthorizationResolver {
    directory: Arc<dyn AccountDirectory>,
    org_list_limit: u32,
}

impl AuthorizationResolver {
    pub fn new(directory: Arc<dyn AccountDirectory>, org_list_limit: u32) -> Self {
        Self {
            directory,
            org_list_limit,
        }
    }

    pub async fn resolve(
        &self,
        principal: Option<&Principal>,
        target: &SubjectRef,
    ) -> Result<Resolution, ServiceError> {
        let Some(principal) = principal else {
            return Ok(Resolution::RedirectToAuthentication);
        };

        let login = match target {
            SubjectRef::Me => {
                return Ok(Resolution::RedirectToSelf {
                    login: principal.login.clone(),
                })
            }
            SubjectRef::Login(login) => login,
        };

        let subject = self
            .directory
            .find_account(login)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user or organization {login} not found")))?;

        let memberships = self.memberships(principal).await?;
        let result = decide(principal, &subject, &memberships);

        if !result.allowed {
            tracing::warn!(
                principal = %principal.login,
                subject = %subject.login,
                reason = %result.reason,
                "Settings access denied"
            );
            return Err(if subject.is_organization {
                ServiceError::Forbidden("only a user or an org admin can view/edit profile".to_string())
            } else {
                ServiceError::Unauthorized("must be logged in as the requested user".to_string())
            });
        }

        let mut orgs_and_self = vec![subject.clone()];
        orgs_and_self.extend(
            memberships
                .into_iter()
                .map(|membership| membership.org)
                .filter(|org| org.uid != subject.uid),
        );

        Ok(Resolution::Granted(SettingsContext {
            user: subject,
            orgs_and_self,
        }))
    }

    /// Fresh membership list; a backend without organization support counts
    /// as zero organizations.
    async fn memberships(&self, principal: &Principal) -> Result<Vec<OrgMembership>, ServiceError> {
        match self
            .directory
            .list_orgs(principal.uid, self.org_list_limit)
            .await
        {
            Ok(memberships) => Ok(memberships),
            Err(ServiceError::Unimplemented(reason)) => {
                tracing::debug!(%reason, "Organization listing unavailable, treating as none");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}
