use thiserror::Error;

/// Discord's blurple, used when the dashboard sends an unparsable color.
pub const DEFAULT_EMBED_COLOR: u32 = 0x5865F2;

#[derive(Debug, Error, PartialEq)]
#[error("invalid action parameters: {0}")]
pub struct InvalidAction(pub String);

/// One unit of deferred work submitted by the dashboard.
///
/// Constructors validate the dashboard's string inputs up front, so a
/// malformed submission is rejected before it ever enters the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    CreateEmbedMessage(EmbedMessage),
    CreateReactionRoleMessage(ReactionRoleMessage),
    CreateRoleButtonMessage(RoleButtonMessage),
    WarnMember(WarnRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbedMessage {
    pub channel_id: u64,
    pub title: String,
    pub body: String,
    pub color: u32,
    pub image_url: Option<String>,
    pub mention: Option<Mention>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mention {
    Everyone,
    Here,
}

impl Mention {
    pub fn as_text(&self) -> &'static str {
        match self {
            Mention::Everyone => "@everyone",
            Mention::Here => "@here",
        }
    }
}

/// An `emoji -> role name` or `button label -> role name` pairing.
#[derive(Debug, Clone, PartialEq)]
pub struct RolePair {
    pub key: String,
    pub role_name: String,
}

impl RolePair {
    /// Parses `key:Role Name,...` lists.
    pub fn parse_list(input: &str) -> Result<Vec<RolePair>, InvalidAction> {
        parse_pairs(input)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReactionRoleMessage {
    pub channel_id: u64,
    pub content: String,
    pub pairs: Vec<RolePair>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleButtonMessage {
    pub channel_id: u64,
    pub content: String,
    pub pairs: Vec<RolePair>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WarnRequest {
    pub member_id: u64,
    pub reason: String,
}

impl Action {
    pub fn create_embed_message(
        channel_id: u64,
        title: &str,
        body: &str,
        color: Option<&str>,
        image_url: Option<&str>,
        mention: Option<&str>,
    ) -> Result<Self, InvalidAction> {
        if title.trim().is_empty() {
            return Err(InvalidAction("embed title must not be empty".into()));
        }
        if body.trim().is_empty() {
            return Err(InvalidAction("embed body must not be empty".into()));
        }
        Ok(Action::CreateEmbedMessage(EmbedMessage {
            channel_id,
            title: title.to_string(),
            body: body.to_string(),
            color: color.map_or(DEFAULT_EMBED_COLOR, parse_color),
            image_url: image_url.map(str::to_string),
            mention: mention.and_then(parse_mention),
        }))
    }

    pub fn create_reaction_role_message(
        channel_id: u64,
        content: &str,
        pairs: &str,
    ) -> Result<Self, InvalidAction> {
        Ok(Action::CreateReactionRoleMessage(ReactionRoleMessage {
            channel_id,
            content: content.to_string(),
            pairs: parse_pairs(pairs)?,
        }))
    }

    pub fn create_role_button_message(
        channel_id: u64,
        content: &str,
        pairs: &str,
    ) -> Result<Self, InvalidAction> {
        Ok(Action::CreateRoleButtonMessage(RoleButtonMessage {
            channel_id,
            content: content.to_string(),
            pairs: parse_pairs(pairs)?,
        }))
    }

    pub fn warn_member(member_id: u64, reason: &str) -> Result<Self, InvalidAction> {
        if reason.trim().is_empty() {
            return Err(InvalidAction("warn reason must not be empty".into()));
        }
        Ok(Action::WarnMember(WarnRequest {
            member_id,
            reason: reason.to_string(),
        }))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::CreateEmbedMessage(_) => "create-embed-message",
            Action::CreateReactionRoleMessage(_) => "create-reaction-role-message",
            Action::CreateRoleButtonMessage(_) => "create-role-button-message",
            Action::WarnMember(_) => "warn-member",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind())
    }
}

/// An action waiting in (or drained from) the queue.
#[derive(Debug, Clone)]
pub struct QueuedAction {
    pub action: Action,
    pub submitted_by: String,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub attempts: u32,
}

impl QueuedAction {
    pub fn new(action: Action, submitted_by: impl Into<String>) -> Self {
        Self {
            action,
            submitted_by: submitted_by.into(),
            submitted_at: chrono::Utc::now(),
            attempts: 0,
        }
    }
}

/// Parses `key:Role Name,key:Role Name,...` lists.
fn parse_pairs(input: &str) -> Result<Vec<RolePair>, InvalidAction> {
    let mut pairs = Vec::new();
    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, role_name) = part
            .split_once(':')
            .ok_or_else(|| InvalidAction(format!("`{}` is not of the form key:role", part)))?;
        let (key, role_name) = (key.trim(), role_name.trim());
        if key.is_empty() || role_name.is_empty() {
            return Err(InvalidAction(format!(
                "`{}` is not of the form key:role",
                part
            )));
        }
        pairs.push(RolePair {
            key: key.to_string(),
            role_name: role_name.to_string(),
        });
    }
    if pairs.is_empty() {
        return Err(InvalidAction("no key:role pairs given".into()));
    }
    Ok(pairs)
}

/// `#RRGGBB` (leading `#` optional). Unparsable input falls back to the
/// default, matching how the dashboard always behaved.
fn parse_color(input: &str) -> u32 {
    u32::from_str_radix(input.trim().trim_start_matches('#'), 16)
        .ok()
        .filter(|c| *c <= 0xFFFFFF)
        .unwrap_or(DEFAULT_EMBED_COLOR)
}

fn parse_mention(input: &str) -> Option<Mention> {
    match input.trim().trim_start_matches('@') {
        "everyone" => Some(Mention::Everyone),
        "here" => Some(Mention::Here),
        _ => None,
    }
}
