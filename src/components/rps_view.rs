use async_trait::async_trait;
use serenity::all::{ButtonStyle, CreateActionRow, CreateButton, CreateEmbed, UserId};

use crate::bot::error::Error;
use crate::constants::embeds;
use crate::constants::emojis::Emojis;
use crate::db::queries::games;
use crate::services::games::rps::{Move, RpsError, RpsGame, RpsResult};
use crate::services::ui::{Effect, EndReason, Reply, SessionView, UiEvent, ViewContext};
use crate::utils::formatting::mention_user;

pub const GAME_NAME: &str = "rps";

const MOVES: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

fn rps_error(e: RpsError) -> Error {
    match e {
        RpsError::NotAPlayer | RpsError::AlreadyPlayed => Error::permission(e.to_string()),
        RpsError::GameOver => Error::domain(e.to_string()),
    }
}

/// Moves stay hidden until both players picked
pub struct RpsView {
    game: RpsGame,
    emojis: Emojis,
}

impl RpsView {
    pub fn new(challenger: UserId, opponent: Option<UserId>, emojis: Emojis) -> Self {
        let game = match opponent {
            Some(opponent) => RpsGame::with_players(vec![challenger.get(), opponent.get()]),
            None => RpsGame::new(),
        };
        Self { game, emojis }
    }

    fn emoji(&self, mv: Move) -> &'static str {
        match mv {
            Move::Rock => self.emojis.rock,
            Move::Paper => self.emojis.paper,
            Move::Scissors => self.emojis.scissors,
        }
    }

    fn description(&self) -> String {
        match self.game.result() {
            None => match self.game.moves().first() {
                Some((user, _)) => format!(
                    "{} has picked. Waiting for an opponent...",
                    mention_user(UserId::new(*user))
                ),
                None => "Pick your move!".to_string(),
            },
            Some(result) => {
                let picks: Vec<String> = self
                    .game
                    .moves()
                    .iter()
                    .map(|(user, mv)| {
                        format!(
                            "{} {} **{}**",
                            mention_user(UserId::new(*user)),
                            self.emoji(*mv),
                            mv.name()
                        )
                    })
                    .collect();
                let verdict = match result {
                    RpsResult::Draw => "It's a draw.".to_string(),
                    RpsResult::Winner(id) => format!("{} wins!", mention_user(UserId::new(id))),
                };
                format!("{}\n\n{}", picks.join("\n"), verdict)
            }
        }
    }
}

#[async_trait]
impl SessionView for RpsView {
    fn name(&self) -> &'static str {
        GAME_NAME
    }

    fn render(&self) -> CreateEmbed {
        let base = if self.game.is_over() {
            embeds::success_embed()
        } else {
            embeds::standard_embed()
        };
        base.title("Rock, Paper, Scissors").description(self.description())
    }

    fn components(&self, disabled: bool) -> Vec<CreateActionRow> {
        let locked = disabled || self.game.is_over();
        vec![CreateActionRow::Buttons(
            MOVES
                .iter()
                .map(|mv| {
                    CreateButton::new(format!("ui:rps:{}", mv.id()))
                        .label(mv.name())
                        .emoji(Emojis::reaction(self.emoji(*mv)))
                        .style(ButtonStyle::Secondary)
                        .disabled(locked)
                })
                .collect(),
        )]
    }

    async fn handle(&mut self, event: UiEvent, _cx: &ViewContext<'_>) -> Result<Effect, Error> {
        let Some(mv) = event.action().strip_prefix("rps:").and_then(Move::from_id) else {
            return Ok(Effect::Nothing);
        };

        match self.game.play(event.user.get(), mv).map_err(rps_error)? {
            Some(_) => Ok(Effect::Close),
            None => Ok(Effect::UpdateAndReply(Reply::ephemeral(
                embeds::info_embed().description(format!("You picked {} {}.", self.emoji(mv), mv.name())),
            ))),
        }
    }

    async fn finish(&mut self, _reason: EndReason, cx: &ViewContext<'_>) -> Result<(), Error> {
        let Some(result) = self.game.result() else {
            return Ok(());
        };
        let [(p1, _), (p2, _)] = self.game.moves() else {
            return Ok(());
        };

        let winner = match result {
            RpsResult::Draw => None,
            RpsResult::Winner(id) => Some(id as i64),
        };
        games::insert_twoplayer(
            &cx.data.pool,
            cx.message_id.get() as i64,
            GAME_NAME,
            *p1 as i64,
            *p2 as i64,
            winner,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_move_stays_hidden() {
        let mut view = RpsView::new(UserId::new(1), None, Emojis::default());
        view.game.play(1, Move::Rock).unwrap();
        let text = view.description();
        assert!(text.contains("Waiting"));
        assert!(!text.contains("Rock"));
    }

    #[test]
    fn test_result_reveals_both_moves() {
        let mut view = RpsView::new(UserId::new(1), Some(UserId::new(2)), Emojis::default());
        view.game.play(1, Move::Rock).unwrap();
        view.game.play(2, Move::Paper).unwrap();
        let text = view.description();
        assert!(text.contains("**Rock**"));
        assert!(text.contains("**Paper**"));
        assert!(text.ends_with("<@2> wins!"));
    }

    #[test]
    fn test_playing_twice_is_rejected() {
        assert_eq!(
            rps_error(RpsError::AlreadyPlayed).kind(),
            crate::bot::error::ErrorKind::Permission
        );
    }
}
