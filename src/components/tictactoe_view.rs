use async_trait::async_trait;
use serenity::all::{ButtonStyle, CreateActionRow, CreateButton, CreateEmbed, UserId};
use tracing::debug;

use crate::bot::error::Error;
use crate::constants::embeds;
use crate::constants::emojis::Emojis;
use crate::db::queries::games;
use crate::services::games::tictactoe::{Mark, MoveError, Outcome, TicTacToe};
use crate::services::ui::{Effect, EndReason, SessionView, UiEvent, ViewContext};
use crate::utils::formatting::mention_user;

pub const GAME_NAME: &str = "tictactoe";

/// `ttt:<row>:<col>`
pub fn parse_cell(action: &str) -> Option<(usize, usize)> {
    let mut parts = action.strip_prefix("ttt:")?.split(':');
    let row = parts.next()?.parse().ok()?;
    let col = parts.next()?.parse().ok()?;
    if parts.next().is_some() || row > 2 || col > 2 {
        return None;
    }
    Some((row, col))
}

fn move_error(e: MoveError) -> Error {
    match e {
        MoveError::NotAPlayer | MoveError::NotYourTurn => Error::permission(e.to_string()),
        _ => Error::domain(e.to_string()),
    }
}

pub struct TicTacToeView {
    game: TicTacToe,
    emojis: Emojis,
}

impl TicTacToeView {
    /// With an opponent only the two of them can take a side; otherwise the first two clickers
    pub fn new(challenger: UserId, opponent: Option<UserId>, emojis: Emojis) -> Self {
        let game = match opponent {
            Some(opponent) => TicTacToe::with_players(vec![challenger.get(), opponent.get()]),
            None => TicTacToe::new(),
        };
        Self { game, emojis }
    }

    pub fn game(&self) -> &TicTacToe {
        &self.game
    }

    fn symbol(&self, mark: Mark) -> &'static str {
        match mark {
            Mark::X => self.emojis.cross,
            Mark::O => self.emojis.circle,
        }
    }

    fn seat_line(&self, mark: Mark) -> String {
        let who = self
            .game
            .player(mark)
            .map(|id| mention_user(UserId::new(id)))
            .unwrap_or_else(|| "*open seat*".to_string());
        format!("{} {}", self.symbol(mark), who)
    }

    fn status(&self) -> String {
        match self.game.outcome() {
            Some(Outcome::Win(mark)) => match self.game.player(mark) {
                Some(id) => format!("{} {} wins!", self.symbol(mark), mention_user(UserId::new(id))),
                None => format!("{} wins!", self.symbol(mark)),
            },
            Some(Outcome::Draw) => "It's a draw.".to_string(),
            None => {
                let turn = self.game.turn();
                match self.game.player(turn) {
                    Some(id) => format!("{}'s turn ({})", mention_user(UserId::new(id)), self.symbol(turn)),
                    None => format!("Waiting for someone to play {}", self.symbol(turn)),
                }
            }
        }
    }
}

#[async_trait]
impl SessionView for TicTacToeView {
    fn name(&self) -> &'static str {
        GAME_NAME
    }

    fn render(&self) -> CreateEmbed {
        let base = if self.game.is_over() {
            embeds::success_embed()
        } else {
            embeds::standard_embed()
        };
        base.title("Tic-Tac-Toe").description(format!(
            "{}\n{}\n\n{}",
            self.seat_line(Mark::X),
            self.seat_line(Mark::O),
            self.status()
        ))
    }

    fn components(&self, disabled: bool) -> Vec<CreateActionRow> {
        let locked = disabled || self.game.is_over();
        (0..3)
            .map(|row| {
                let cells = (0..3)
                    .map(|col| {
                        let button = CreateButton::new(format!("ui:ttt:{}:{}", row, col));
                        match self.game.cell(row, col) {
                            Some(mark) => button
                                .emoji(Emojis::reaction(self.symbol(mark)))
                                .style(ButtonStyle::Secondary)
                                .disabled(true),
                            None => button
                                .label("\u{2800}")
                                .style(ButtonStyle::Primary)
                                .disabled(locked),
                        }
                    })
                    .collect();
                CreateActionRow::Buttons(cells)
            })
            .collect()
    }

    async fn handle(&mut self, event: UiEvent, _cx: &ViewContext<'_>) -> Result<Effect, Error> {
        let Some((row, col)) = parse_cell(event.action()) else {
            return Ok(Effect::Nothing);
        };

        match self.game.play(event.user.get(), row, col).map_err(move_error)? {
            Some(_) => Ok(Effect::Close),
            None => Ok(Effect::Update),
        }
    }

    async fn finish(&mut self, reason: EndReason, cx: &ViewContext<'_>) -> Result<(), Error> {
        let (Some(x), Some(o)) = (self.game.player(Mark::X), self.game.player(Mark::O)) else {
            return Ok(());
        };
        if !self.game.is_over() {
            debug!("Tic-Tac-Toe on {} abandoned ({:?})", cx.message_id, reason);
            return Ok(());
        }

        games::insert_twoplayer(
            &cx.data.pool,
            cx.message_id.get() as i64,
            GAME_NAME,
            x as i64,
            o as i64,
            self.game.winner_id().map(|id| id as i64),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell("ttt:0:2"), Some((0, 2)));
        assert_eq!(parse_cell("ttt:3:0"), None);
        assert_eq!(parse_cell("ttt:1"), None);
        assert_eq!(parse_cell("ttt:1:1:1"), None);
        assert_eq!(parse_cell("rps:rock"), None);
    }

    #[test]
    fn test_board_has_three_rows() {
        let view = TicTacToeView::new(UserId::new(1), None, Emojis::default());
        assert_eq!(view.components(false).len(), 3);
    }

    #[test]
    fn test_status_follows_the_game() {
        let mut view = TicTacToeView::new(UserId::new(1), Some(UserId::new(2)), Emojis::default());
        assert!(view.status().starts_with("Waiting"));

        view.game.play(1, 0, 0).unwrap();
        assert!(view.status().contains("Waiting"));
        view.game.play(2, 1, 1).unwrap();
        assert!(view.status().starts_with("<@1>'s turn"));
    }

    #[test]
    fn test_wrong_turn_is_a_permission_error() {
        let err = move_error(MoveError::NotYourTurn);
        assert_eq!(err.kind(), crate::bot::error::ErrorKind::Permission);
        assert_eq!(move_error(MoveError::Occupied).kind(), crate::bot::error::ErrorKind::Domain);
    }
}
