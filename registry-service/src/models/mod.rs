pub mod account;
pub mod client;
pub mod principal;
pub mod public_key;
pub mod ssh_key;

pub use account::{
    Account, EmailAddr, MemberRole, OrgMembership, ProfileChange, SubjectRef, SELF_ALIAS,
};
pub use client::{
    ClientDraft, ClientPage, ClientPatch, ClientType, ListCursor, LoginPolicy, Metadata,
    RegisteredClient, ALLOW_LOGINS_KEY,
};
pub use principal::{CallerIdentity, Principal};
pub use public_key::{Jwk, PublicKeyDocument};
pub use ssh_key::SshPublicKey;
