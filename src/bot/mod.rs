pub mod commands;
pub mod handlers;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::dptree;
use teloxide::prelude::*;

/// Build the teloxide update handler tree.
pub fn build_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    let command_handler = Update::filter_message()
        .filter_command::<commands::BotCommand>()
        .endpoint(commands::handle_command);

    let message_handler = Update::filter_message()
        .endpoint(handlers::handle_message);

    dptree::entry()
        .branch(command_handler)
        .branch(message_handler)
}
