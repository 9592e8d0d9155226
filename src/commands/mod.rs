pub mod config;
pub mod levels;
pub mod moderation;
pub mod owner;
pub mod roles;

use crate::discord::{Data, Error};

pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        levels::rank(),
        levels::top(),
        levels::xp_rate(),
        levels::levelup_channel(),
        levels::level_role(),
        moderation::warn(),
        moderation::warns(),
        moderation::block_links(),
        roles::reactionrole(),
        roles::role_buttons(),
        config::welcome_channel(),
        config::welcome_message(),
        config::welcome_image(),
        config::modlog_channel(),
        config::command_channel(),
        owner::savedata(),
        owner::queue(),
        owner::announce(),
        owner::quit(),
    ]
}
