use serde::{Deserialize, Serialize};

/// Path segment that stands for the authenticated principal.
pub const SELF_ALIAS: &str = ".me";

/// A user or organization whose settings can be viewed or edited.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub uid: i64,
    pub login: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub is_organization: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Member,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrgMembership {
    pub org: Account,
    pub role: MemberRole,
}

impl OrgMembership {
    pub fn is_admin(&self) -> bool {
        self.role == MemberRole::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailAddr {
    pub email: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub primary: bool,
}

/// The subject named in a settings route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectRef {
    Me,
    Login(String),
}

impl SubjectRef {
    pub fn parse(segment: &str) -> Self {
        if segment == SELF_ALIAS {
            SubjectRef::Me
        } else {
            SubjectRef::Login(segment.to_string())
        }
    }
}

/// A single-field profile mutation. Each change is applied to the account
/// store as one atomic field set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileChange {
    Name(String),
    AvatarUrl(String),
}

impl ProfileChange {
    pub fn field(&self) -> &'static str {
        match self {
            ProfileChange::Name(_) => "name",
            ProfileChange::AvatarUrl(_) => "avatar_url",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            ProfileChange::Name(value) | ProfileChange::AvatarUrl(value) => value,
        }
    }

    pub fn apply_to(&self, account: &mut Account) {
        match self {
            ProfileChange::Name(name) => account.name = name.clone(),
            ProfileChange::AvatarUrl(url) => account.avatar_url = url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_ref_recognizes_alias() {
        assert_eq!(SubjectRef::parse(".me"), SubjectRef::Me);
        assert_eq!(
            SubjectRef::parse("alice"),
            SubjectRef::Login("alice".to_string())
        );
        assert_eq!(SubjectRef::parse("me"), SubjectRef::Login("me".to_string()));
    }

    #[test]
    fn test_profile_change_sets_single_field() {
        let mut account = Account {
            uid: 1,
            login: "alice".to_string(),
            name: "Alice".to_string(),
            avatar_url: String::new(),
            is_organization: false,
        };
        ProfileChange::AvatarUrl("https://img".to_string()).apply_to(&mut account);
        assert_eq!(account.name, "Alice");
        assert_eq!(account.avatar_url, "https://img");
    }
}
