use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single typed knowledge item captured in a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub project_id: Uuid,
    #[serde(rename = "type")]
    pub kind: MemoryType,
    pub source: MemorySource,
    pub title: Option<String>,
    pub content: String,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
    /// Relevance score assigned by RecallEngine. `None` for recency-ordered rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank_score: Option<f64>,
}

/// Canonical grouping order used by PackAssembler's `text` format.
pub const MEMORY_TYPE_ORDER: [MemoryType; 9] = [
    MemoryType::Decision,
    MemoryType::Finding,
    MemoryType::Definition,
    MemoryType::Note,
    MemoryType::Link,
    MemoryType::Todo,
    MemoryType::Chat,
    MemoryType::Doc,
    MemoryType::Code,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Decision,
    Finding,
    Definition,
    Note,
    Link,
    Todo,
    Chat,
    Doc,
    Code,
}

impl MemoryType {
    /// Group header title used by the `text` pack format, e.g. "Decisions".
    pub fn title_plural(self) -> &'static str {
        match self {
            MemoryType::Decision => "Decisions",
            MemoryType::Finding => "Findings",
            MemoryType::Definition => "Definitions",
            MemoryType::Note => "Notes",
            MemoryType::Link => "Links",
            MemoryType::Todo => "Todos",
            MemoryType::Chat => "Chats",
            MemoryType::Doc => "Docs",
            MemoryType::Code => "Codes",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MemoryType::Decision => "decision",
            MemoryType::Finding => "finding",
            MemoryType::Definition => "definition",
            MemoryType::Note => "note",
            MemoryType::Link => "link",
            MemoryType::Todo => "todo",
            MemoryType::Chat => "chat",
            MemoryType::Doc => "doc",
            MemoryType::Code => "code",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "decision" => Ok(MemoryType::Decision),
            "finding" => Ok(MemoryType::Finding),
            "definition" => Ok(MemoryType::Definition),
            "note" => Ok(MemoryType::Note),
            "link" => Ok(MemoryType::Link),
            "todo" => Ok(MemoryType::Todo),
            "chat" => Ok(MemoryType::Chat),
            "doc" => Ok(MemoryType::Doc),
            "code" => Ok(MemoryType::Code),
            other => Err(crate::error::Error::validation(format!(
                "unknown memory type '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    Manual,
    Chatgpt,
    Claude,
    Cursor,
    Codex,
    Api,
}

impl MemorySource {
    pub fn as_str(self) -> &'static str {
        match self {
            MemorySource::Manual => "manual",
            MemorySource::Chatgpt => "chatgpt",
            MemorySource::Claude => "claude",
            MemorySource::Cursor => "cursor",
            MemorySource::Codex => "codex",
            MemorySource::Api => "api",
        }
    }
}

impl fmt::Display for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemorySource {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(MemorySource::Manual),
            "chatgpt" => Ok(MemorySource::Chatgpt),
            "claude" => Ok(MemorySource::Claude),
            "cursor" => Ok(MemorySource::Cursor),
            "codex" => Ok(MemorySource::Codex),
            "api" => Ok(MemorySource::Api),
            other => Err(crate::error::Error::validation(format!(
                "unknown memory source '{other}'"
            ))),
        }
    }
}

/// Recognized metadata keys; anything else is rejected at validation time.
pub const RECOGNIZED_METADATA_KEYS: [&str; 4] = ["url", "file_path", "language", "model"];

/// Unvalidated input for `MemoryService::create`. Field shape is checked and
/// canonicalized before it becomes a [`Memory`].
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryCard {
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub is_admin: bool,
    pub is_unlimited: bool,
    pub is_disabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgRole {
    Member,
    Admin,
}

impl OrgRole {
    pub fn as_str(self) -> &'static str {
        match self {
            OrgRole::Member => "member",
            OrgRole::Admin => "admin",
        }
    }
}

impl FromStr for OrgRole {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(OrgRole::Member),
            "admin" => Ok(OrgRole::Admin),
            other => Err(crate::error::Error::validation(format!(
                "unknown org role '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgMembership {
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub role: OrgRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub prefix: String,
    /// SHA-256 digest of the full secret. Never the plaintext.
    pub hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invite {
    pub id: Uuid,
    pub email: String,
    pub token: String,
    pub created_by: Uuid,
    pub notes: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Invite {
    pub fn is_consumable(&self, now: DateTime<Utc>) -> bool {
        self.accepted_at.is_none() && self.revoked_at.is_none() && self.expires_at > now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistStatus {
    Pending,
    Approved,
    Rejected,
}

impl WaitlistStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WaitlistStatus::Pending => "pending",
            WaitlistStatus::Approved => "approved",
            WaitlistStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for WaitlistStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WaitlistStatus::Pending),
            "approved" => Ok(WaitlistStatus::Approved),
            "rejected" => Ok(WaitlistStatus::Rejected),
            other => Err(crate::error::Error::validation(format!(
                "unknown waitlist status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub use_case: Option<String>,
    pub source: Option<String>,
    pub status: WaitlistStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageEventType {
    MemoryCreated,
    RecallQuery,
    ProjectCreated,
}

impl UsageEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            UsageEventType::MemoryCreated => "memory_created",
            UsageEventType::RecallQuery => "recall_query",
            UsageEventType::ProjectCreated => "project_created",
        }
    }
}

impl fmt::Display for UsageEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UsageEventType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory_created" => Ok(UsageEventType::MemoryCreated),
            "recall_query" => Ok(UsageEventType::RecallQuery),
            "project_created" => Ok(UsageEventType::ProjectCreated),
            other => Err(crate::error::Error::validation(format!(
                "unknown usage event type '{other}'"
            ))),
        }
    }
}

/// A single per-user per-day per-event counter. `day` is `yyyy-mm-dd`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageDay {
    pub user_id: Uuid,
    pub day: String,
    pub event_type: UsageEventType,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub project_id: Uuid,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    /// User id, or the literal string "system".
    pub actor: String,
    pub event_data: BTreeMap<String, serde_json::Value>,
    pub prev_hash: String,
    pub current_hash: String,
}

/// All-zero digest used as `prev_hash` for the first event in a project's chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";
const _: () = assert!(GENESIS_HASH.len() == 64);


/// A single-use magic-link login token. Distinct from [`Invite`]: a login
/// link authenticates an existing user back into a session, it never
/// creates a user or grants org access on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginLink {
    pub id: Uuid,
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl LoginLink {
    pub fn is_consumable(&self, now: DateTime<Utc>) -> bool {
        self.consumed_at.is_none() && self.expires_at > now
    }
}

/// Resolved identity of the caller making a request, produced by the identity perimeter.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user: User,
    pub org_id: Option<Uuid>,
    pub auth_kind: AuthKind,
    pub is_admin: bool,
    pub is_unlimited: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    Session,
    ApiKey,
}
