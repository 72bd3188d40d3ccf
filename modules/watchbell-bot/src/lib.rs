pub mod commands;
pub mod sender;
pub mod web;

pub use commands::{CommandContext, CommandHandler};
pub use sender::DiscordSender;
