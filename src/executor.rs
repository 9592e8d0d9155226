use crate::action::{
    Action, EmbedMessage, QueuedAction, ReactionRoleMessage, RoleButtonMessage, RolePair,
    WarnRequest,
};
use crate::store::Store;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("transient failure: {0}")]
    Transient(String),
}

/// Interprets one queued action against the live session.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, queued: &QueuedAction) -> Result<(), ExecuteError>;
}

/// [`ActionExecutor`] over the live Discord HTTP session.
///
/// Side effects are not transactional: when the platform call succeeds but
/// the following save fails, the in-memory document keeps the mutation and
/// the next successful save carries it to the remote store.
pub struct DiscordExecutor {
    http: Arc<serenity::Http>,
    guild_id: serenity::GuildId,
    store: Arc<Mutex<Store>>,
}

impl DiscordExecutor {
    pub fn new(
        http: Arc<serenity::Http>,
        guild_id: serenity::GuildId,
        store: Arc<Mutex<Store>>,
    ) -> Self {
        Self {
            http,
            guild_id,
            store,
        }
    }

    async fn create_embed_message(&self, embed: &EmbedMessage) -> Result<(), ExecuteError> {
        let mut create = serenity::CreateEmbed::new()
            .title(embed.title.clone())
            .description(format_body(&embed.body))
            .colour(serenity::Colour::new(embed.color));
        if let Some(url) = &embed.image_url {
            create = create.image(url.clone());
        }

        let mut message = serenity::CreateMessage::new().embed(create);
        if let Some(mention) = &embed.mention {
            message = message.content(mention.as_text());
        }

        channel(embed.channel_id)?
            .send_message(&*self.http, message)
            .await
            .map_err(|e| platform_error("sending embed", e))?;

        let mut store = self.store.lock().await;
        store
            .document_mut()
            .log(format!("dashboard embed sent to channel {}", embed.channel_id));
        store.save_logged("Dashboard embed").await;
        Ok(())
    }

    async fn create_reaction_role_message(
        &self,
        request: &ReactionRoleMessage,
    ) -> Result<(), ExecuteError> {
        // Resolve everything before the first side effect.
        let roles = self.resolve_roles(&request.pairs).await?;
        let reactions = parse_reactions(&request.pairs)?;

        let sent = channel(request.channel_id)?
            .send_message(
                &*self.http,
                serenity::CreateMessage::new().content(request.content.clone()),
            )
            .await
            .map_err(|e| platform_error("sending reaction role message", e))?;

        self.react_and_map(&sent, &request.pairs, &roles, &reactions, "Create reaction roles")
            .await
    }

    /// Attaches emoji -> role mappings to an existing message, extending any
    /// mappings it already carries.
    pub async fn attach_reaction_roles(
        &self,
        channel_id: u64,
        message_id: u64,
        pairs: &[RolePair],
    ) -> Result<(), ExecuteError> {
        let roles = self.resolve_roles(pairs).await?;
        let reactions = parse_reactions(pairs)?;

        let message = channel(channel_id)?
            .message(&*self.http, serenity::MessageId::new(message_id))
            .await
            .map_err(|e| platform_error("fetching message", e))?;

        self.react_and_map(&message, pairs, &roles, &reactions, "Add reaction roles")
            .await
    }

    async fn react_and_map(
        &self,
        message: &serenity::Message,
        pairs: &[RolePair],
        roles: &HashMap<String, u64>,
        reactions: &[serenity::ReactionType],
        description: &str,
    ) -> Result<(), ExecuteError> {
        let mut failure = None;
        {
            let mut store = self.store.lock().await;
            for (pair, reaction) in pairs.iter().zip(reactions) {
                if let Err(e) = message.react(&*self.http, reaction.clone()).await {
                    failure = Some(platform_error("adding reaction", e));
                    break;
                }
                let role_id = roles[pair.role_name.as_str()];
                store
                    .document_mut()
                    .map_reaction_role(message.id.get(), &emoji_key(reaction), role_id);
            }
            store
                .document_mut()
                .log(format!("reaction roles mapped on message {}", message.id));
            store.save_logged(description).await;
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn create_role_button_message(
        &self,
        request: &RoleButtonMessage,
    ) -> Result<(), ExecuteError> {
        if request.pairs.len() > 25 {
            return Err(ExecuteError::InvalidInput(
                "at most 25 role buttons per message".into(),
            ));
        }
        let roles = self.resolve_roles(&request.pairs).await?;

        // Five buttons per action row.
        let rows = request
            .pairs
            .chunks(5)
            .map(|chunk| {
                serenity::CreateActionRow::Buttons(
                    chunk
                        .iter()
                        .map(|pair| {
                            serenity::CreateButton::new(format!(
                                "rolebtn:{}",
                                roles[pair.role_name.as_str()]
                            ))
                            .label(pair.key.clone())
                            .style(serenity::ButtonStyle::Primary)
                        })
                        .collect(),
                )
            })
            .collect::<Vec<_>>();

        let sent = channel(request.channel_id)?
            .send_message(
                &*self.http,
                serenity::CreateMessage::new()
                    .content(request.content.clone())
                    .components(rows),
            )
            .await
            .map_err(|e| platform_error("sending role button message", e))?;

        let buttons: HashMap<String, String> = request
            .pairs
            .iter()
            .map(|pair| {
                (
                    pair.key.clone(),
                    roles[pair.role_name.as_str()].to_string(),
                )
            })
            .collect();

        let mut store = self.store.lock().await;
        store.document_mut().map_role_buttons(sent.id.get(), buttons);
        store
            .document_mut()
            .log(format!("role button message {} created", sent.id));
        store.save_logged("Create role buttons").await;
        Ok(())
    }

    async fn warn_member(
        &self,
        request: &WarnRequest,
        issued_by: &str,
    ) -> Result<(), ExecuteError> {
        if request.member_id == 0 {
            return Err(ExecuteError::NotFound("member 0 does not exist".into()));
        }
        let member_id = serenity::UserId::new(request.member_id);
        self.http
            .get_member(self.guild_id, member_id)
            .await
            .map_err(|e| platform_error("resolving member", e))?;

        let uid = request.member_id.to_string();
        let mut store = self.store.lock().await;
        store
            .document_mut()
            .add_warn(&uid, issued_by, &request.reason);
        store.document_mut().log(format!(
            "warn: user={} by={} reason={}",
            uid, issued_by, request.reason
        ));
        store.save_logged("New warn").await;
        Ok(())
    }

    async fn resolve_roles(
        &self,
        pairs: &[RolePair],
    ) -> Result<HashMap<String, u64>, ExecuteError> {
        let guild_roles = self
            .http
            .get_guild_roles(self.guild_id)
            .await
            .map_err(|e| platform_error("listing guild roles", e))?;

        let mut resolved = HashMap::new();
        for pair in pairs {
            let role = guild_roles
                .iter()
                .find(|role| role.name == pair.role_name)
                .ok_or_else(|| {
                    ExecuteError::NotFound(format!("role `{}` does not exist", pair.role_name))
                })?;
            resolved.insert(pair.role_name.clone(), role.id.get());
        }
        Ok(resolved)
    }
}

#[async_trait]
impl ActionExecutor for DiscordExecutor {
    async fn execute(&self, queued: &QueuedAction) -> Result<(), ExecuteError> {
        match &queued.action {
            Action::CreateEmbedMessage(embed) => self.create_embed_message(embed).await,
            Action::CreateReactionRoleMessage(request) => {
                self.create_reaction_role_message(request).await
            }
            Action::CreateRoleButtonMessage(request) => {
                self.create_role_button_message(request).await
            }
            Action::WarnMember(request) => self.warn_member(request, &queued.submitted_by).await,
        }
    }
}

fn parse_reactions(pairs: &[RolePair]) -> Result<Vec<serenity::ReactionType>, ExecuteError> {
    pairs
        .iter()
        .map(|pair| {
            serenity::ReactionType::try_from(pair.key.as_str()).map_err(|_| {
                ExecuteError::InvalidInput(format!("`{}` is not a valid emoji", pair.key))
            })
        })
        .collect()
}

fn channel(id: u64) -> Result<serenity::ChannelId, ExecuteError> {
    if id == 0 {
        return Err(ExecuteError::NotFound("channel 0 does not exist".into()));
    }
    Ok(serenity::ChannelId::new(id))
}

/// Stable key a reaction is stored (and later looked up) under: custom
/// emojis by id, unicode emojis literally.
pub fn emoji_key(reaction: &serenity::ReactionType) -> String {
    match reaction {
        serenity::ReactionType::Custom { id, .. } => id.to_string(),
        serenity::ReactionType::Unicode(emoji) => emoji.clone(),
        other => other.to_string(),
    }
}

/// Candidate lookup keys for a reaction, most specific first. Custom emojis
/// fall back to their name so documents keyed by name keep working.
pub fn emoji_keys(reaction: &serenity::ReactionType) -> Vec<String> {
    match reaction {
        serenity::ReactionType::Custom { id, name, .. } => {
            let mut keys = vec![id.to_string()];
            if let Some(name) = name {
                keys.push(name.clone());
            }
            keys
        }
        other => vec![emoji_key(other)],
    }
}

fn platform_error(context: &str, e: serenity::Error) -> ExecuteError {
    if let serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response)) = &e {
        match response.status_code.as_u16() {
            403 => return ExecuteError::Forbidden(format!("{}: {}", context, e)),
            404 => return ExecuteError::NotFound(format!("{}: {}", context, e)),
            _ => {}
        }
    }
    ExecuteError::Transient(format!("{}: {}", context, e))
}

/// The dashboard's embed body convention: literal `\n` line breaks, dash or
/// dot bullets normalized, blank line between paragraphs.
fn format_body(body: &str) -> String {
    body.replace("\\n", "\n")
        .replace("- ", "● ")
        .replace("• ", "● ")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_formatting_normalizes_bullets_and_breaks() {
        let formatted = format_body("Rules\\n- be kind\\n• no spam");
        assert_eq!(formatted, "Rules\n\n● be kind\n\n● no spam");
    }

    #[test]
    fn unicode_emoji_key_is_literal() {
        let reaction = serenity::ReactionType::Unicode("🔥".to_string());
        assert_eq!(emoji_key(&reaction), "🔥");
        assert_eq!(emoji_keys(&reaction), vec!["🔥".to_string()]);
    }

    #[test]
    fn custom_emoji_keys_are_id_then_name() {
        let reaction = serenity::ReactionType::Custom {
            animated: false,
            id: serenity::EmojiId::new(42),
            name: Some("blob".to_string()),
        };
        assert_eq!(
            emoji_keys(&reaction),
            vec!["42".to_string(), "blob".to_string()]
        );
    }
}
