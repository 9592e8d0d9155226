use linked_hash_set::LinkedHashSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// XP granted per message before the rate divisor is applied.
pub const BASE_XP: i64 = 15;
/// How many recent message bodies are kept per user for repeat detection.
pub const MESSAGE_HISTORY: usize = 5;

/// The single guild document persisted to the remote store.
///
/// Every mutation happens against this in-memory value first; the whole
/// document is then flushed to the remote store (see [`crate::store::Store`]).
/// Field names match the JSON layout of the persisted file.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    /// Cumulative experience points per user id.
    pub xp: HashMap<String, i64>,
    /// Last announced level per user id, cached to detect level-ups.
    pub level: HashMap<String, i64>,
    /// Warning records per user id, oldest first.
    pub warns: HashMap<String, Vec<WarnEntry>>,
    /// message id -> emoji key -> role id
    pub reaction_roles: HashMap<String, HashMap<String, String>>,
    /// message id -> button label -> role id
    pub role_buttons: HashMap<String, HashMap<String, String>>,
    /// level (as string) -> role id granted on reaching it
    pub level_roles: HashMap<String, String>,
    /// command name -> channels it is allowed in (empty = everywhere)
    pub command_channels: HashMap<String, LinkedHashSet<u64>>,
    /// Channels where non-staff may not post links.
    pub blocked_links_channels: LinkedHashSet<u64>,
    pub config: GuildConfig,
    /// Append-only diagnostic records.
    pub logs: Vec<LogEntry>,
    /// Recent message bodies per user id, bounded to [`MESSAGE_HISTORY`].
    pub last_messages_content: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildConfig {
    pub welcome_channel: Option<u64>,
    pub welcome_message: Option<String>,
    pub welcome_background: Option<String>,
    pub levelup_channel: Option<u64>,
    /// Divisor applied to [`BASE_XP`]. Higher values slow leveling down.
    pub xp_rate: i64,
    pub modlog_channel: Option<u64>,
}

impl Default for GuildConfig {
    fn default() -> Self {
        Self {
            welcome_channel: None,
            welcome_message: None,
            welcome_background: None,
            levelup_channel: None,
            xp_rate: 3,
            modlog_channel: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarnEntry {
    /// Who issued the warning.
    pub by: String,
    pub reason: String,
    pub ts: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub ts: String,
    pub entry: String,
}

/// Level reached with `xp` points. Level 1 is the floor.
pub fn xp_to_level(xp: i64) -> i64 {
    let lvl = (xp.max(0) as f64 / 100.0).powf(0.6) as i64 + 1;
    lvl.max(1)
}

impl Document {
    /// Grants message XP to `user_id` and returns the new level if the user
    /// just leveled up.
    pub fn award_xp(&mut self, user_id: &str) -> Option<i64> {
        let gain = (BASE_XP / self.config.xp_rate.max(1)).max(1);
        let xp = self.xp.entry(user_id.to_string()).or_insert(0);
        *xp += gain;
        let xp = *xp;

        let level = xp_to_level(xp);
        let previous = self.level.get(user_id).copied().unwrap_or(1);
        if level > previous {
            self.level.insert(user_id.to_string(), level);
            Some(level)
        } else {
            None
        }
    }

    pub fn add_warn(&mut self, user_id: &str, by: &str, reason: &str) {
        self.warns
            .entry(user_id.to_string())
            .or_default()
            .push(WarnEntry {
                by: by.to_string(),
                reason: reason.to_string(),
                ts: chrono::Utc::now().to_rfc3339(),
            });
    }

    /// Records a message body for repeat detection. Returns `true` when the
    /// message repeats the previous one (and is therefore not recorded).
    pub fn record_message(&mut self, user_id: &str, content: &str) -> bool {
        let history = self
            .last_messages_content
            .entry(user_id.to_string())
            .or_default();
        if history.last().map_or(false, |last| last == content) {
            return true;
        }
        history.push(content.to_string());
        if history.len() > MESSAGE_HISTORY {
            history.remove(0);
        }
        false
    }

    pub fn map_reaction_role(&mut self, message_id: u64, emoji_key: &str, role_id: u64) {
        self.reaction_roles
            .entry(message_id.to_string())
            .or_default()
            .insert(emoji_key.to_string(), role_id.to_string());
    }

    /// Removes one emoji mapping. Drops the message entry once empty.
    pub fn unmap_reaction_role(&mut self, message_id: &str, emoji_key: &str) -> bool {
        match self.reaction_roles.get_mut(message_id) {
            Some(mapping) => {
                let removed = mapping.remove(emoji_key).is_some();
                if mapping.is_empty() {
                    self.reaction_roles.remove(message_id);
                }
                removed
            }
            None => false,
        }
    }

    pub fn map_role_buttons(&mut self, message_id: u64, buttons: HashMap<String, String>) {
        self.role_buttons.insert(message_id.to_string(), buttons);
    }

    /// Looks the reaction up under each key in order. Callers pass a custom
    /// emoji's id first and its name second.
    pub fn reaction_role(&self, message_id: u64, keys: &[String]) -> Option<u64> {
        let mapping = self.reaction_roles.get(&message_id.to_string())?;
        keys.iter()
            .find_map(|key| mapping.get(key)?.parse().ok().filter(|&id| id != 0))
    }

    pub fn log(&mut self, entry: impl Into<String>) {
        self.logs.push(LogEntry {
            ts: chrono::Utc::now().to_rfc3339(),
            entry: entry.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_curve_starts_at_one() {
        assert_eq!(xp_to_level(0), 1);
        assert_eq!(xp_to_level(-50), 1);
        assert_eq!(xp_to_level(99), 1);
        assert_eq!(xp_to_level(100), 2);
    }

    #[test]
    fn level_curve_is_monotonic() {
        let mut previous = 0;
        for xp in (0..100_000).step_by(50) {
            let level = xp_to_level(xp);
            assert!(level >= previous);
            previous = level;
        }
    }

    #[test]
    fn xp_gain_has_a_floor_of_one() {
        let mut doc = Document::default();
        doc.config.xp_rate = 100;
        doc.award_xp("1");
        assert_eq!(doc.xp["1"], 1);
    }

    #[test]
    fn award_xp_reports_level_ups_once() {
        let mut doc = Document::default();
        doc.config.xp_rate = 1;

        let mut announced = Vec::new();
        // 15 XP per message crosses 100 XP on the 7th message.
        for _ in 0..7 {
            if let Some(level) = doc.award_xp("42") {
                announced.push(level);
            }
        }
        assert_eq!(announced, vec![2]);
        assert_eq!(doc.level["42"], 2);
    }

    #[test]
    fn message_history_is_bounded() {
        let mut doc = Document::default();
        for i in 0..10 {
            assert!(!doc.record_message("7", &format!("msg {}", i)));
        }
        let history = &doc.last_messages_content["7"];
        assert_eq!(history.len(), MESSAGE_HISTORY);
        assert_eq!(history[0], "msg 5");
    }

    #[test]
    fn repeated_message_is_flagged_not_recorded() {
        let mut doc = Document::default();
        assert!(!doc.record_message("7", "hello"));
        assert!(doc.record_message("7", "hello"));
        assert_eq!(doc.last_messages_content["7"].len(), 1);
    }

    #[test]
    fn warns_append_in_order() {
        let mut doc = Document::default();
        doc.add_warn("123", "mod", "spam");
        doc.add_warn("123", "mod", "links");
        let warns = &doc.warns["123"];
        assert_eq!(warns.len(), 2);
        assert_eq!(warns[0].reason, "spam");
        assert_eq!(warns[1].reason, "links");
    }

    #[test]
    fn mapping_extends_an_existing_message() {
        let mut doc = Document::default();
        doc.map_reaction_role(1, "🔥", 10);
        doc.map_reaction_role(1, "🎉", 20);
        assert_eq!(doc.reaction_role(1, &["🔥".to_string()]), Some(10));
        assert_eq!(doc.reaction_role(1, &["🎉".to_string()]), Some(20));
    }

    #[test]
    fn custom_emoji_lookup_falls_back_to_the_name() {
        let mut doc = Document::default();
        // Documents written by older deployments key custom emojis by name.
        doc.map_reaction_role(1, "party_parrot", 10);
        let keys = vec!["123456".to_string(), "party_parrot".to_string()];
        assert_eq!(doc.reaction_role(1, &keys), Some(10));
    }

    #[test]
    fn emoji_id_takes_precedence_over_the_name() {
        let mut doc = Document::default();
        doc.map_reaction_role(1, "123456", 10);
        doc.map_reaction_role(1, "party_parrot", 20);
        let keys = vec!["123456".to_string(), "party_parrot".to_string()];
        assert_eq!(doc.reaction_role(1, &keys), Some(10));
    }

    #[test]
    fn unmap_reaction_role_drops_empty_messages() {
        let mut doc = Document::default();
        doc.map_reaction_role(1, "🔥", 10);
        assert!(doc.unmap_reaction_role("1", "🔥"));
        assert!(!doc.reaction_roles.contains_key("1"));
        assert!(!doc.unmap_reaction_role("1", "🔥"));
    }
}
