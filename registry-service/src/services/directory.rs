use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::ServiceError;
use crate::models::{Account, EmailAddr, MemberRole, OrgMembership, ProfileChange, SshPublicKey};

/// Source of truth for accounts, organization memberships, e-mail addresses
/// and SSH keys.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn find_account(&self, login: &str) -> Result<Option<Account>, ServiceError>;

    /// Organizations the user belongs to, bounded by `limit`. May fail with
    /// `Unimplemented` when the backend has no organization support.
    async fn list_orgs(
        &self,
        member_uid: i64,
        limit: u32,
    ) -> Result<Vec<OrgMembership>, ServiceError>;

    /// Sets one profile field, returning the updated account or `None` when
    /// the account does not exist.
    async fn apply_profile_change(
        &self,
        uid: i64,
        change: &ProfileChange,
    ) -> Result<Option<Account>, ServiceError>;

    async fn list_emails(&self, uid: i64) -> Result<Vec<EmailAddr>, ServiceError>;

    async fn list_keys(&self, uid: i64) -> Result<Vec<SshPublicKey>, ServiceError>;
    async fn add_key(&self, uid: i64, name: &str, key: &str)
        -> Result<SshPublicKey, ServiceError>;
    async fn delete_key(&self, uid: i64, key_id: &str) -> Result<(), ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError>;
}

#[derive(Default)]
struct DirectoryState {
    accounts: Vec<Account>,
    // (org uid, member uid, role)
    memberships: Vec<(i64, i64, MemberRole)>,
    emails: HashMap<i64, Vec<EmailAddr>>,
    hidden_emails: HashSet<i64>,
    keys: Vec<(i64, SshPublicKey)>,
}

/// In-process directory used by tests and local development.
pub struct MemoryDirectory {
    state: Mutex<DirectoryState>,
    orgs_supported: bool,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DirectoryState::default()),
            orgs_supported: true,
        }
    }

    /// A directory whose backend reports organization listing as
    /// unimplemented.
    pub fn without_org_support() -> Self {
        Self {
            orgs_supported: false,
            ..Self::new()
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, DirectoryState>, ServiceError> {
        self.state
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Directory mutex poisoned: {}", e)))
    }

    pub fn add_account(&self, account: Account) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        state.accounts.retain(|existing| existing.uid != account.uid);
        state.accounts.push(account);
        Ok(())
    }

    pub fn add_membership(
        &self,
        org_uid: i64,
        member_uid: i64,
        role: MemberRole,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        state
            .memberships
            .retain(|(org, member, _)| !(*org == org_uid && *member == member_uid));
        state.memberships.push((org_uid, member_uid, role));
        Ok(())
    }

    pub fn remove_membership(&self, org_uid: i64, member_uid: i64) -> Result<(), ServiceError> {
        self.lock()?
            .memberships
            .retain(|(org, member, _)| !(*org == org_uid && *member == member_uid));
        Ok(())
    }

    pub fn add_email(&self, uid: i64, email: EmailAddr) -> Result<(), ServiceError> {
        self.lock()?.emails.entry(uid).or_default().push(email);
        Ok(())
    }

    /// Makes e-mail listing for `uid` fail with `Forbidden`.
    pub fn hide_emails(&self, uid: i64) -> Result<(), ServiceError> {
        self.lock()?.hidden_emails.insert(uid);
        Ok(())
    }

    pub fn account(&self, uid: i64) -> Result<Option<Account>, ServiceError> {
        Ok(self.lock()?.accounts.iter().find(|a| a.uid == uid).cloned())
    }
}

#[async_trait]
impl AccountDirectory for MemoryDirectory {
    async fn find_account(&self, login: &str) -> Result<Option<Account>, ServiceError> {
        Ok(self
            .lock()?
            .accounts
            .iter()
            .find(|account| account.login == login)
            .cloned())
    }

    async fn list_orgs(
        &self,
        member_uid: i64,
        limit: u32,
    ) -> Result<Vec<OrgMembership>, ServiceError> {
        if !self.orgs_supported {
            return Err(ServiceError::Unimplemented(
                "organizations are not supported by this directory".to_string(),
            ));
        }
        let state = self.lock()?;
        let memberships = state
            .memberships
            .iter()
            .filter(|(_, member, _)| *member == member_uid)
            .filter_map(|(org_uid, _, role)| {
                state
                    .accounts
                    .iter()
                    .find(|account| account.uid == *org_uid && account.is_organization)
                    .map(|org| OrgMembership {
                        org: org.clone(),
                        role: *role,
                    })
            })
            .take(limit as usize)
            .collect();
        Ok(memberships)
    }

    async fn apply_profile_change(
        &self,
        uid: i64,
        change: &ProfileChange,
    ) -> Result<Option<Account>, ServiceError> {
        let mut state = self.lock()?;
        Ok(state
            .accounts
            .iter_mut()
            .find(|account| account.uid == uid)
            .map(|account| {
                change.apply_to(account);
                account.clone()
            }))
    }

    async fn list_emails(&self, uid: i64) -> Result<Vec<EmailAddr>, ServiceError> {
        let state = self.lock()?;
        if state.hidden_emails.contains(&uid) {
            return Err(ServiceError::Forbidden(
                "e-mail addresses are not visible".to_string(),
            ));
        }
        Ok(state.emails.get(&uid).cloned().unwrap_or_default())
    }

    async fn list_keys(&self, uid: i64) -> Result<Vec<SshPublicKey>, ServiceError> {
        Ok(self
            .lock()?
            .keys
            .iter()
            .filter(|(owner, _)| *owner == uid)
            .map(|(_, key)| key.clone())
            .collect())
    }

    async fn add_key(
        &self,
        uid: i64,
        name: &str,
        key: &str,
    ) -> Result<SshPublicKey, ServiceError> {
        let key = SshPublicKey {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            key: key.to_string(),
        };
        self.lock()?.keys.push((uid, key.clone()));
        Ok(key)
    }

    async fn delete_key(&self, uid: i64, key_id: &str) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        let before = state.keys.len();
        state
            .keys
            .retain(|(owner, key)| !(*owner == uid && key.id == key_id));
        if state.keys.len() == before {
            return Err(ServiceError::NotFound(format!("SSH key {key_id} not found")));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.lock().map(|_| ())
    }
}
