use std::sync::Arc;

use poise::serenity_prelude::{self as serenity, FullEvent};
use tracing::{debug, error, info};

use crate::bot::data::Data;
use crate::bot::error::Error;
use crate::handlers::{interaction, voice_state};

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &FullEvent,
    _framework: poise::FrameworkContext<'_, Arc<Data>, Error>,
    data: &Arc<Data>,
) -> Result<(), Error> {
    match event {
        FullEvent::Ready { data_about_bot, .. } => {
            info!(
                "Bot ready as {} in {} guilds",
                data_about_bot.user.name,
                data_about_bot.guilds.len()
            );
        }

        FullEvent::VoiceStateUpdate { old, new } => {
            if let Err(e) = voice_state::handle_voice_state_update(ctx, data, old.as_ref(), new).await {
                error!("Voice state handler error: {:?}", e);
            }
        }

        FullEvent::InteractionCreate { interaction } => {
            // Commands and autocomplete belong to poise
            match interaction {
                serenity::Interaction::Component(_) | serenity::Interaction::Modal(_) => {
                    if let Err(e) = interaction::handle_interaction(ctx, data, interaction).await {
                        error!("Component/Modal interaction handler error: {:?}", e);
                    }
                }
                _ => {}
            }
        }

        FullEvent::GuildDelete { incomplete, .. } => {
            debug!("Guild {} removed", incomplete.id);
            if data.voice.dispose(ctx, &data.node, incomplete.id).await {
                info!("Dropped voice session of departed guild {}", incomplete.id);
            }
        }

        _ => {}
    }

    Ok(())
}
