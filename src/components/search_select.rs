use async_trait::async_trait;
use serenity::all::{
    ChannelId, CreateActionRow, CreateEmbed, CreateSelectMenu, CreateSelectMenuKind,
    CreateSelectMenuOption, GuildId, UserId,
};

use crate::bot::error::Error;
use crate::constants::embeds;
use crate::constants::timeouts::format_millis;
use crate::services::audio::controller::{self, PlayOutcome};
use crate::services::audio::Track;
use crate::services::ui::{Admission, Effect, SessionView, UiEvent, ViewContext};
use crate::utils::formatting::truncate;

/// Discord limit for option labels and descriptions
const OPTION_TEXT_LIMIT: usize = 100;

/// Menu of search results; picking one queues it
pub struct SearchSelectView {
    query: String,
    choices: Vec<Track>,
    guild_id: GuildId,
    text_channel: ChannelId,
    picked: Option<PlayOutcome>,
}

impl SearchSelectView {
    pub fn new(query: impl Into<String>, choices: Vec<Track>, guild_id: GuildId, text_channel: ChannelId) -> Self {
        Self {
            query: query.into(),
            choices,
            guild_id,
            text_channel,
            picked: None,
        }
    }
}

pub fn choice_label(index: usize, track: &Track) -> String {
    truncate(&format!("{}. {}", index + 1, track.title()), OPTION_TEXT_LIMIT)
}

pub fn choice_description(track: &Track) -> String {
    let source = if track.is_youtube() { "YouTube" } else { "SoundCloud" };
    truncate(
        &format!("{} · {} · {}", source, track.author(), format_millis(track.length_ms())),
        OPTION_TEXT_LIMIT,
    )
}

#[async_trait]
impl SessionView for SearchSelectView {
    fn name(&self) -> &'static str {
        "search"
    }

    fn render(&self) -> CreateEmbed {
        if let Some(outcome) = &self.picked {
            return controller::queued_embed(outcome);
        }

        let lines: Vec<String> = self
            .choices
            .iter()
            .enumerate()
            .map(|(i, t)| {
                format!(
                    "`{}.` {} `{}`",
                    i + 1,
                    truncate(t.title(), 70),
                    format_millis(t.length_ms())
                )
            })
            .collect();
        embeds::music_embed()
            .title(format!("Results for \"{}\"", truncate(&self.query, 80)))
            .description(lines.join("\n"))
    }

    fn components(&self, disabled: bool) -> Vec<CreateActionRow> {
        if self.picked.is_some() || self.choices.is_empty() {
            return Vec::new();
        }
        let options = self
            .choices
            .iter()
            .enumerate()
            .map(|(i, t)| {
                CreateSelectMenuOption::new(choice_label(i, t), i.to_string())
                    .description(choice_description(t))
            })
            .collect();

        vec![CreateActionRow::SelectMenu(
            CreateSelectMenu::new("ui:search:pick", CreateSelectMenuKind::String { options })
                .placeholder("Choose a track")
                .disabled(disabled),
        )]
    }

    fn admit(&self, user: UserId, owner: UserId, _event: &UiEvent) -> Admission {
        if user == owner {
            Admission::Commit
        } else {
            Admission::Reject("Run the search yourself to pick a track.".to_string())
        }
    }

    async fn handle(&mut self, event: UiEvent, cx: &ViewContext<'_>) -> Result<Effect, Error> {
        if event.action() != "search:pick" {
            return Ok(Effect::Nothing);
        }
        let Some(track) = event
            .first_value()
            .and_then(|v| v.parse::<usize>().ok())
            .and_then(|i| self.choices.get(i).cloned())
        else {
            return Ok(Effect::Nothing);
        };

        let session = controller::connect(cx.ctx, cx.data, self.guild_id, event.user, self.text_channel).await?;
        let outcome = controller::enqueue(cx.data, &session, track).await?;
        self.picked = Some(outcome);
        Ok(Effect::Close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::audio::track::test_track;

    #[test]
    fn test_option_text_fits_discord_limits() {
        let mut track = test_track("x", 90_000, false);
        track.info.title = "t".repeat(300);
        assert!(choice_label(0, &track).chars().count() <= OPTION_TEXT_LIMIT);
        assert!(choice_label(0, &track).starts_with("1. ttt"));
        assert!(choice_description(&track).ends_with("1:30"));
    }

    #[test]
    fn test_owner_only() {
        let view = SearchSelectView::new("q", Vec::new(), GuildId::new(1), ChannelId::new(2));
        let event = UiEvent {
            user: UserId::new(2),
            user_name: "bob".into(),
            kind: crate::services::ui::EventKind::Button {
                action: "search:pick".into(),
            },
        };
        assert!(matches!(
            view.admit(UserId::new(2), UserId::new(1), &event),
            Admission::Reject(_)
        ));
        assert!(view.components(false).is_empty());
    }
}
