use std::sync::Arc;

use serenity::all::{
    ComponentInteraction, Context, CreateInteractionResponse, CreateInteractionResponseMessage,
    Interaction, ModalInteraction,
};
use tracing::{debug, error};

use crate::bot::data::Data;
use crate::bot::error::Error;
use crate::constants::embeds;
use crate::services::ui::engine::{CUSTOM_ID_PREFIX, STALE_MESSAGE};

pub async fn handle_interaction(
    ctx: &Context,
    data: &Arc<Data>,
    interaction: &Interaction,
) -> Result<(), Error> {
    match interaction {
        Interaction::Component(component) => {
            handle_component(ctx, data, component).await?;
        }
        Interaction::Modal(modal) => {
            handle_modal(ctx, data, modal).await?;
        }
        _ => {
            debug!("Unhandled interaction type: {:?}", interaction.kind());
        }
    }

    Ok(())
}

async fn handle_component(
    ctx: &Context,
    data: &Arc<Data>,
    component: &ComponentInteraction,
) -> Result<(), Error> {
    let custom_id = &component.data.custom_id;
    debug!("Component interaction: {}", custom_id);

    // Components from before a restart, or from other bots' layouts
    if !custom_id.starts_with(CUSTOM_ID_PREFIX) {
        return send_component_error(ctx, component, STALE_MESSAGE).await;
    }

    // View errors are answered inside the engine; what reaches here is transport failure
    if let Err(e) = data.ui.dispatch_component(ctx, data, component).await {
        error!("Component interaction error for {}: {:?}", custom_id, e);
    }

    Ok(())
}

async fn handle_modal(
    ctx: &Context,
    data: &Arc<Data>,
    modal: &ModalInteraction,
) -> Result<(), Error> {
    let custom_id = &modal.data.custom_id;
    debug!("Modal submission: {}", custom_id);

    if !custom_id.starts_with(CUSTOM_ID_PREFIX) {
        return send_modal_error(ctx, modal, STALE_MESSAGE).await;
    }

    if let Err(e) = data.ui.dispatch_modal(ctx, data, modal).await {
        error!("Modal submission error for {}: {:?}", custom_id, e);
    }

    Ok(())
}

fn error_response(message: &str) -> CreateInteractionResponse {
    let embed = embeds::error_embed().description(message);
    CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .embed(embed)
            .ephemeral(true),
    )
}

/// Send an ephemeral error message for a component interaction
pub async fn send_component_error(
    ctx: &Context,
    component: &ComponentInteraction,
    message: &str,
) -> Result<(), Error> {
    component.create_response(ctx, error_response(message)).await?;
    Ok(())
}

/// Send an ephemeral error message for a modal interaction
pub async fn send_modal_error(
    ctx: &Context,
    modal: &ModalInteraction,
    message: &str,
) -> Result<(), Error> {
    modal.create_response(ctx, error_response(message)).await?;
    Ok(())
}
