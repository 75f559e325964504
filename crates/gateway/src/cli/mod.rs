//! `contextcache` CLI: a `clap` derive tree dispatching either to the HTTP
//! server (`serve`) or to a thin `reqwest` client hitting `cc_gateway::api`'s
//! routes.

pub mod client;
pub mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;
use uuid::Uuid;

use client::Client;
use config::ClientConfig;

#[derive(Parser)]
#[command(name = "contextcache", version, about = "ContextCache gateway and client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP gateway (default when no subcommand is given).
    Serve,
    /// Check server liveness.
    Health,
    /// Request a magic login link and save the resulting session locally is
    /// not supported over HTTP; this issues the link for the given email.
    Login { email: String },
    #[command(subcommand)]
    Projects(ProjectsCommand),
    #[command(subcommand)]
    Mem(MemCommand),
    /// Search a project's memories.
    Recall {
        project_id: Uuid,
        query: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        format: Option<String>,
    },
    /// Show today's usage against quota.
    Usage,
    #[command(subcommand)]
    Invites(InvitesCommand),
    #[command(subcommand)]
    Waitlist(WaitlistCommand),
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Subcommand)]
pub enum ProjectsCommand {
    List {
        #[arg(long)]
        org_id: Option<Uuid>,
    },
    Create {
        #[arg(long)]
        org_id: Option<Uuid>,
        name: String,
    },
}

#[derive(Subcommand)]
pub enum MemCommand {
    Add {
        project_id: Uuid,
        #[arg(long = "type")]
        kind: String,
        #[arg(long)]
        source: String,
        #[arg(long)]
        title: Option<String>,
        content: String,
        #[arg(long)]
        tag: Vec<String>,
    },
    List {
        project_id: Uuid,
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
}

#[derive(Subcommand)]
pub enum InvitesCommand {
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    Create {
        email: String,
        #[arg(long)]
        notes: Option<String>,
    },
    Revoke { id: Uuid },
}

#[derive(Subcommand)]
pub enum WaitlistCommand {
    List {
        #[arg(long)]
        status: Option<String>,
    },
    Approve { id: Uuid },
    Reject { id: Uuid },
    Join {
        email: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        company: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AdminCommand {
    Users {
        #[arg(long)]
        email: Option<String>,
    },
    SetUnlimited { user_id: Uuid, unlimited: bool },
    Stats,
    RecallLogs { project_id: Uuid },
}

/// Reads the server's `toml` config from `CC_CONFIG` (default
/// `contextcache.toml`), falling back to built-in defaults when the file is
/// absent.
pub fn load_server_config() -> anyhow::Result<(cc_domain::Config, PathBuf)> {
    let path = std::env::var("CC_CONFIG").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("contextcache.toml"));
    let config = if path.exists() {
        let raw = std::fs::read_to_string(&path)?;
        toml::from_str(&raw)?
    } else {
        cc_domain::Config::default()
    };
    Ok((config, path))
}

/// Runs a client subcommand against the configured server and translates
/// the result into a process exit code, per `spec.md` §6.1's table.
pub async fn run_client_command(command: Command) -> i32 {
    let client_config = match ClientConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };
    let client = Client::new(client_config.resolved());

    let result = dispatch(&client, command).await;
    match result {
        Ok(Some(value)) => {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
            0
        }
        Ok(None) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code
        }
    }
}

async fn dispatch(client: &Client, command: Command) -> Result<Option<serde_json::Value>, client::CliError> {
    match command {
        Command::Serve => unreachable!("serve is handled before dispatch"),
        Command::Health => client.get("/health").await.map(Some),
        Command::Login { email } => client.post("/auth/request-link", json!({ "email": email })).await.map(Some),
        Command::Projects(cmd) => match cmd {
            ProjectsCommand::List { org_id } => {
                let org_id = resolve_org_id(client, org_id)?;
                client.get(&format!("/projects?org_id={org_id}")).await.map(Some)
            }
            ProjectsCommand::Create { org_id, name } => {
                let org_id = resolve_org_id(client, org_id)?;
                client.post("/projects", json!({ "org_id": org_id, "name": name })).await.map(Some)
            }
        },
        Command::Mem(cmd) => match cmd {
            MemCommand::Add { project_id, kind, source, title, content, tag } => {
                client
                    .post(
                        &format!("/projects/{project_id}/memories"),
                        json!({ "type": kind, "source": source, "title": title, "content": content, "tags": tag }),
                    )
                    .await
                    .map(Some)
            }
            MemCommand::List { project_id, limit, offset } => client.get(&format!("/projects/{project_id}/memories?limit={limit}&offset={offset}")).await.map(Some),
        },
        Command::Recall { project_id, query, limit, format } => {
            let mut path = format!("/projects/{project_id}/recall?q={}", urlencode(&query));
            if let Some(limit) = limit {
                path.push_str(&format!("&limit={limit}"));
            }
            if let Some(format) = format {
                path.push_str(&format!("&format={format}"));
            }
            client.get(&path).await.map(Some)
        }
        Command::Usage => client.get("/me/usage").await.map(Some),
        Command::Invites(cmd) => match cmd {
            InvitesCommand::List { status, email } => {
                let mut path = "/admin/invites?".to_string();
                if let Some(status) = status {
                    path.push_str(&format!("status={status}&"));
                }
                if let Some(email) = email {
                    path.push_str(&format!("email_q={}", urlencode(&email)));
                }
                client.get(&path).await.map(Some)
            }
            InvitesCommand::Create { email, notes } => client.post("/admin/invites", json!({ "email": email, "notes": notes })).await.map(Some),
            InvitesCommand::Revoke { id } => client.post(&format!("/admin/invites/{id}/revoke"), json!({})).await.map(Some),
        },
        Command::Waitlist(cmd) => match cmd {
            WaitlistCommand::List { status } => {
                let path = match status {
                    Some(s) => format!("/admin/waitlist?status={s}"),
                    None => "/admin/waitlist".to_string(),
                };
                client.get(&path).await.map(Some)
            }
            WaitlistCommand::Approve { id } => client.post(&format!("/admin/waitlist/{id}/approve"), json!({})).await.map(Some),
            WaitlistCommand::Reject { id } => client.post(&format!("/admin/waitlist/{id}/reject"), json!({})).await.map(Some),
            WaitlistCommand::Join { email, name, company } => client.post("/waitlist/join", json!({ "email": email, "name": name, "company": company })).await.map(Some),
        },
        Command::Admin(cmd) => match cmd {
            AdminCommand::Users { email } => {
                let path = match email {
                    Some(e) => format!("/admin/users?email={}", urlencode(&e)),
                    None => "/admin/users".to_string(),
                };
                client.get(&path).await.map(Some)
            }
            AdminCommand::SetUnlimited { user_id, unlimited } => client.post(&format!("/admin/users/{user_id}/set-unlimited"), json!({ "unlimited": unlimited })).await.map(Some),
            AdminCommand::Stats => client.get("/admin/stats").await.map(Some),
            AdminCommand::RecallLogs { project_id } => client.get(&format!("/admin/recall-logs?project_id={project_id}")).await.map(Some),
        },
    }
}

fn resolve_org_id(client: &Client, explicit: Option<Uuid>) -> Result<Uuid, client::CliError> {
    explicit
        .or_else(|| client.org_id().and_then(|s| Uuid::parse_str(s).ok()))
        .ok_or_else(|| client::CliError { exit_code: 3, message: "no org_id given and CC_ORG_ID is not set".to_string() })
}

fn urlencode(value: &str) -> String {
    value.chars().flat_map(|c| if c.is_ascii_alphanumeric() || "-_.~".contains(c) { vec![c] } else { format!("%{:02X}", c as u32).chars().collect() }).collect()
}
