//! Command implementations behind the `registered-clients` binary. Each
//! command maps onto one [`RegisteredClients`] operation and writes its
//! report to `out`, so it runs the same against a local registry or a
//! remote server.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use std::io::Write;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::models::{
    CallerIdentity, ClientDraft, ClientPatch, ClientType, LoginPolicy, Metadata,
    RegisteredClient, ALLOW_LOGINS_KEY,
};
use crate::services::{for_each_page, IdentityKey, RegisteredClients};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create (register) an API client
    Create(CreateArgs),
    /// List registered API clients
    #[command(alias = "ls")]
    List(ListArgs),
    /// Show registered API clients by ID
    Get(IdsArgs),
    /// Show the registered API client the ID key authenticates as
    Current,
    /// Update a registered API client
    Update(UpdateArgs),
    /// Delete registered API clients
    #[command(alias = "rm")]
    Delete(IdsArgs),
}

#[derive(Args, Debug, Default)]
pub struct CreateArgs {
    #[arg(long, default_value = "")]
    pub client_name: String,

    #[arg(long, default_value = "")]
    pub client_uri: String,

    #[arg(long)]
    pub redirect_uri: Option<String>,

    #[arg(long, default_value = "")]
    pub description: String,

    /// ServerType, AgentType or OtherType
    #[arg(long = "type", default_value = "ServerType")]
    pub client_type: String,

    /// Set to 'all' to allow any user to log in through this client
    #[arg(long)]
    pub allow_logins: Option<LoginPolicy>,
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Show full details
    #[arg(short, long)]
    pub detail: bool,
}

#[derive(Args, Debug, Default)]
pub struct IdsArgs {
    #[arg(value_name = "CLIENT-ID")]
    pub ids: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct UpdateArgs {
    #[arg(value_name = "CLIENT-ID")]
    pub id: String,

    #[arg(long)]
    pub client_name: Option<String>,

    #[arg(long)]
    pub client_uri: Option<String>,

    #[arg(long)]
    pub redirect_uri: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Set to 'all' to allow any user to log in through this client
    #[arg(long)]
    pub allow_logins: Option<LoginPolicy>,
}

impl UpdateArgs {
    pub fn patch(&self) -> ClientPatch {
        let patch = ClientPatch {
            client_name: self.client_name.clone(),
            client_uri: self.client_uri.clone(),
            redirect_uris: self.redirect_uri.clone().map(|uri| vec![uri]),
            description: self.description.clone(),
            metadata: Metadata::new(),
        };
        match self.allow_logins {
            Some(policy) => patch.with_login_policy(policy),
            None => patch,
        }
    }
}

pub async fn create<W: Write>(
    registry: &dyn RegisteredClients,
    args: &CreateArgs,
    id_key_file: &Path,
    out: &mut W,
) -> Result<RegisteredClient> {
    // Reject a bad type before touching the key file or the server.
    let client_type: ClientType = args.client_type.parse()?;

    let key = IdentityKey::load(id_key_file)?;
    tracing::info!(path = %id_key_file.display(), "Using public key from file");

    let mut metadata = Metadata::new();
    if let Some(policy) = args.allow_logins {
        metadata.insert(ALLOW_LOGINS_KEY.to_string(), policy.as_str().to_string());
    }

    let draft = ClientDraft {
        id: key.id().to_string(),
        client_name: args.client_name.clone(),
        client_uri: args.client_uri.clone(),
        redirect_uris: args.redirect_uri.iter().cloned().collect(),
        description: args.description.clone(),
        client_type: client_type.as_str().to_string(),
        jwks: key.marshal_jwks()?,
        metadata,
    };

    let client = registry.create(draft).await?;
    tracing::info!(client_id = %client.id, "Registered API client");
    print_client(out, &client)?;
    Ok(client)
}

/// Prints every registered client, page by page. Returns false when
/// `cancel` fired before the last page.
pub async fn list<W: Write + Send>(
    registry: &dyn RegisteredClients,
    args: &ListArgs,
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<bool> {
    let now = Utc::now();
    let mut written = Ok(());

    let complete = for_each_page(registry, 0, cancel, |page| {
        for client in &page.clients {
            if written.is_err() {
                return;
            }
            written = if args.detail {
                print_client(&mut *out, client)
            } else {
                writeln!(
                    out,
                    "{:<48}   {:<20}",
                    client.id,
                    time_ago(client.created_at, now)
                )
                .context("failed to write client listing")
            };
        }
    })
    .await?;

    written?;
    Ok(complete)
}

pub async fn get<W: Write>(
    registry: &dyn RegisteredClients,
    args: &IdsArgs,
    out: &mut W,
) -> Result<()> {
    for id in &args.ids {
        let client = registry.get(id).await?;
        print_client(out, &client)?;
    }
    Ok(())
}

pub async fn current<W: Write>(
    registry: &dyn RegisteredClients,
    caller: &CallerIdentity,
    out: &mut W,
) -> Result<RegisteredClient> {
    let client = registry.get_current(caller).await?;
    print_client(out, &client)?;
    Ok(client)
}

/// Only the given flags change; the login policy is left alone unless
/// `--allow-logins` is passed.
pub async fn update<W: Write>(
    registry: &dyn RegisteredClients,
    args: &UpdateArgs,
    out: &mut W,
) -> Result<RegisteredClient> {
    let client = registry.update(&args.id, args.patch()).await?;
    writeln!(out, "{}: updated", client.id)?;
    Ok(client)
}

/// Stops at the first failure; IDs before it stay deleted.
pub async fn delete<W: Write>(
    registry: &dyn RegisteredClients,
    args: &IdsArgs,
    out: &mut W,
) -> Result<()> {
    for id in &args.ids {
        registry.delete(id).await?;
        writeln!(out, "{id}: deleted")?;
    }
    Ok(())
}

pub fn print_client<W: Write + ?Sized>(out: &mut W, client: &RegisteredClient) -> Result<()> {
    let json = serde_json::to_string_pretty(client)?;
    writeln!(out, "{json}").context("failed to write client")
}

/// Coarse, human-readable age such as "3 days ago".
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    if secs < 0 {
        return "in the future".to_string();
    }

    let (count, unit) = match secs {
        0..=59 => return "just now".to_string(),
        60..=3_599 => (secs / 60, "minute"),
        3_600..=86_399 => (secs / 3_600, "hour"),
        86_400..=2_591_999 => (secs / 86_400, "day"),
        2_592_000..=31_535_999 => (secs / 2_592_000, "month"),
        _ => (secs / 31_536_000, "year"),
    };

    if count == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_time_ago_buckets() {
        let now = Utc::now();
        assert_eq!(time_ago(now, now), "just now");
        assert_eq!(time_ago(now - Duration::seconds(90), now), "1 minute ago");
        assert_eq!(time_ago(now - Duration::hours(5), now), "5 hours ago");
        assert_eq!(time_ago(now - Duration::days(1), now), "1 day ago");
        assert_eq!(time_ago(now - Duration::days(65), now), "2 months ago");
        assert_eq!(time_ago(now - Duration::days(800), now), "2 years ago");
        assert_eq!(time_ago(now + Duration::hours(1), now), "in the future");
    }

    #[test]
    fn test_update_patch_leaves_policy_alone_by_default() {
        let args = UpdateArgs {
            id: "abc".to_string(),
            description: Some("new".to_string()),
            ..Default::default()
        };
        let patch = args.patch();
        assert!(patch.metadata.is_empty());
        assert_eq!(patch.description.as_deref(), Some("new"));
        assert!(patch.redirect_uris.is_none());
    }

    #[test]
    fn test_update_patch_sets_policy_and_single_redirect() {
        let args = UpdateArgs {
            id: "abc".to_string(),
            redirect_uri: Some("https://example.com/cb".to_string()),
            allow_logins: Some(LoginPolicy::All),
            ..Default::default()
        };
        let patch = args.patch();
        assert_eq!(
            patch.metadata.get(ALLOW_LOGINS_KEY).map(String::as_str),
            Some("all")
        );
        assert_eq!(
            patch.redirect_uris,
            Some(vec!["https://example.com/cb".to_string()])
        );
    }
}
