//! Wordle and Letterle sessions.
//!
//! Wordle guesses are typed into a dialog and checked against the dictionary;
//! Letterle guesses are picked from a menu of letters not tried yet. In solo
//! mode only the owner commits, everyone else can suggest.

use async_trait::async_trait;
use serenity::all::{
    ButtonStyle, CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter, CreateSelectMenu,
    CreateSelectMenuKind, CreateSelectMenuOption, UserId,
};
use sqlx::SqlitePool;
use tracing::info;

use crate::bot::error::Error;
use crate::constants::embeds;
use crate::constants::emojis::Emojis;
use crate::db::queries::games;
use crate::services::dictionary;
use crate::services::games::wordle::{GuessError, GuessRecord, LetterStatus, Variant, WordleGame};
use crate::services::ui::{
    Admission, Effect, EndReason, ModalField, ModalSpec, Reply, SessionView, UiEvent, ViewContext,
};
use crate::utils::formatting::mention_user;

const MAX_SUGGESTIONS: usize = 10;
/// Discord caps select menus at 25 options
const MAX_MENU_OPTIONS: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub word: String,
    pub by: UserId,
    pub by_name: String,
}

pub struct WordleView {
    game: WordleGame,
    owner: UserId,
    owner_name: String,
    solo: bool,
    emojis: Emojis,
    suggestions: Vec<Suggestion>,
    /// Outcome row key, the hosting message id once the session started
    game_id: Option<i64>,
}

impl WordleView {
    pub fn new(game: WordleGame, owner: UserId, owner_name: impl Into<String>, solo: bool, emojis: Emojis) -> Self {
        Self {
            game,
            owner,
            owner_name: owner_name.into(),
            solo,
            emojis,
            suggestions: Vec::new(),
            game_id: None,
        }
    }

    pub fn game(&self) -> &WordleGame {
        &self.game
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    /// Guess made before the message exists; counts as turn one
    pub fn opening_guess(&mut self, guess: &str) -> Result<(), Error> {
        self.game
            .guess(guess, self.owner.get())
            .map_err(guess_error)?;
        Ok(())
    }

    /// Queue a non-owner's guess for the owner to pick. Returns false for duplicates.
    pub fn record_suggestion(&mut self, guess: &str, by: UserId, by_name: &str) -> Result<bool, GuessError> {
        let word = self.game.check_guess(guess)?;
        if self.suggestions.iter().any(|s| s.word == word) {
            return Ok(false);
        }
        if self.suggestions.len() == MAX_SUGGESTIONS {
            self.suggestions.remove(0);
        }
        self.suggestions.push(Suggestion {
            word,
            by,
            by_name: by_name.to_string(),
        });
        Ok(true)
    }

    async fn commit(&mut self, guess: &str, by: UserId, cx: &ViewContext<'_>) -> Result<Effect, Error> {
        let word = self.game.check_guess(guess).map_err(guess_error)?;

        if self.game.variant() == Variant::Wordle && !cx.data.dictionary.is_valid(&word).await? {
            return Err(Error::domain(format!("`{}` is not in the dictionary", word)));
        }

        self.game.guess(&word, by.get()).map_err(guess_error)?;
        self.suggestions.retain(|s| s.word != word);
        self.persist(&cx.data.pool).await?;

        if self.game.is_over() {
            Ok(Effect::Close)
        } else {
            Ok(Effect::Update)
        }
    }

    async fn persist(&self, pool: &SqlitePool) -> Result<(), Error> {
        if let Some(id) = self.game_id {
            games::update_singleplayer(
                pool,
                id,
                self.game.attempts_left() as i64,
                self.game.outcome(),
            )
            .await?;
        }
        Ok(())
    }

    fn title(&self) -> String {
        match self.game.variant() {
            Variant::Wordle => format!("Wordle ({} letters)", self.game.word_length()),
            Variant::Letterle => "Letterle".to_string(),
        }
    }

    fn board(&self) -> String {
        let history = self.game.history();
        if history.is_empty() {
            return "No guesses yet.".to_string();
        }

        match self.game.variant() {
            Variant::Wordle => history
                .iter()
                .map(|record| {
                    let mut line = guess_line(&self.emojis, record);
                    if record.by != self.owner.get() {
                        line.push_str(&format!(" ({})", mention_user(UserId::new(record.by))));
                    }
                    line
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Variant::Letterle => history
                .iter()
                .map(|record| guess_line(&self.emojis, record))
                .collect::<Vec<_>>()
                .join("  "),
        }
    }

    fn guess_row(&self, disabled: bool) -> CreateActionRow {
        let mut buttons = Vec::new();
        if self.game.variant() == Variant::Wordle {
            buttons.push(
                CreateButton::new("ui:wordle:guess")
                    .label("Guess")
                    .style(ButtonStyle::Primary)
                    .disabled(disabled),
            );
        }
        buttons.push(
            CreateButton::new("ui:wordle:giveup")
                .label("Give up")
                .style(ButtonStyle::Danger)
                .disabled(disabled),
        );
        CreateActionRow::Buttons(buttons)
    }

    fn letter_menu(&self, disabled: bool) -> Option<CreateActionRow> {
        let options: Vec<CreateSelectMenuOption> = self
            .game
            .unused_letters()
            .into_iter()
            .take(MAX_MENU_OPTIONS)
            .map(|c| CreateSelectMenuOption::new(c.to_string(), c.to_string()))
            .collect();
        if options.is_empty() {
            return None;
        }

        Some(CreateActionRow::SelectMenu(
            CreateSelectMenu::new("ui:letterle:pick", CreateSelectMenuKind::String { options })
                .placeholder("Pick a letter")
                .disabled(disabled),
        ))
    }

    fn suggestion_menu(&self, disabled: bool) -> Option<CreateActionRow> {
        if self.suggestions.is_empty() {
            return None;
        }
        let options = self
            .suggestions
            .iter()
            .enumerate()
            .map(|(i, s)| {
                CreateSelectMenuOption::new(s.word.clone(), i.to_string())
                    .description(format!("Suggested by {}", s.by_name))
            })
            .collect();

        Some(CreateActionRow::SelectMenu(
            CreateSelectMenu::new("ui:wordle:suggestion", CreateSelectMenuKind::String { options })
                .placeholder("Use a suggestion")
                .disabled(disabled),
        ))
    }

    fn is_owner_only(action: &str) -> bool {
        matches!(action, "wordle:giveup" | "wordle:suggestion")
    }
}

fn guess_error(e: GuessError) -> Error {
    Error::domain(e.to_string())
}

/// `🟩🟨⬛⬛⬛ CRANE`
pub fn guess_line(emojis: &Emojis, record: &GuessRecord) -> String {
    let squares: String = record.result.iter().map(|s| emojis.status(*s)).collect();
    format!("{} `{}`", squares, record.word)
}

/// Letters grouped by their best status so far, best first
pub fn keyboard_lines(emojis: &Emojis, game: &WordleGame) -> String {
    [
        LetterStatus::Green,
        LetterStatus::Yellow,
        LetterStatus::Black,
        LetterStatus::Unused,
    ]
    .iter()
    .filter_map(|status| {
        let letters: Vec<String> = game
            .keyboard()
            .iter()
            .filter(|(_, s)| *s == status)
            .map(|(c, _)| c.to_string())
            .collect();
        (!letters.is_empty()).then(|| format!("{} {}", emojis.status(*status), letters.join(" ")))
    })
    .collect::<Vec<_>>()
    .join("\n")
}

#[async_trait]
impl SessionView for WordleView {
    fn name(&self) -> &'static str {
        self.game.variant().game_name()
    }

    fn render(&self) -> CreateEmbed {
        let base = match self.game.outcome() {
            Some(true) => embeds::success_embed(),
            Some(false) => embeds::error_embed(),
            None => embeds::standard_embed(),
        };

        let mut description = self.board();
        match self.game.outcome() {
            Some(true) => description.push_str(&format!(
                "\n\nSolved in {} {}!",
                self.game.history().len(),
                if self.game.history().len() == 1 { "guess" } else { "guesses" }
            )),
            Some(false) => description.push_str(&format!(
                "\n\nThe answer was **{}**.",
                self.game.secret()
            )),
            None => {}
        }

        let mut embed = base
            .title(self.title())
            .description(description)
            .field("Keyboard", keyboard_lines(&self.emojis, &self.game), false);

        if self.solo && !self.suggestions.is_empty() && !self.game.is_over() {
            let lines: Vec<String> = self
                .suggestions
                .iter()
                .map(|s| format!("`{}` from {}", s.word, s.by_name))
                .collect();
            embed = embed.field("Suggestions", embeds::bullet_list(&lines), false);
        }

        let mode = if self.solo { "Solo" } else { "Everyone can guess" };
        embed.footer(CreateEmbedFooter::new(format!(
            "{} · {} · Attempts left: {}",
            self.owner_name,
            mode,
            self.game.attempts_left()
        )))
    }

    fn components(&self, disabled: bool) -> Vec<CreateActionRow> {
        if self.game.is_over() {
            return match self.game.variant() {
                Variant::Wordle => vec![CreateActionRow::Buttons(vec![CreateButton::new_link(
                    dictionary::public_page(self.game.secret()),
                )
                .label("Definition")])],
                Variant::Letterle => Vec::new(),
            };
        }

        let mut rows = Vec::new();
        if self.game.variant() == Variant::Letterle {
            rows.extend(self.letter_menu(disabled));
        }
        if self.solo {
            rows.extend(self.suggestion_menu(disabled));
        }
        rows.push(self.guess_row(disabled));
        rows
    }

    fn admit(&self, user: UserId, owner: UserId, event: &UiEvent) -> Admission {
        if user == owner {
            return Admission::Commit;
        }
        if Self::is_owner_only(event.action()) {
            return Admission::Reject("Only the player who started this game can do that.".to_string());
        }
        if self.solo {
            Admission::Suggest
        } else {
            Admission::Commit
        }
    }

    fn modal_for(&self, event: &UiEvent) -> Option<ModalSpec> {
        if event.action() != "wordle:guess" {
            return None;
        }
        let len = self.game.word_length() as u16;
        Some(
            ModalSpec::new("wordle:submit", "Your guess").field(
                ModalField::short("guess", &format!("{}-letter word", len))
                    .placeholder("Type your guess")
                    .length(len, len),
            ),
        )
    }

    async fn started(&mut self, cx: &ViewContext<'_>) -> Result<(), Error> {
        let id = cx.message_id.get() as i64;
        self.game_id = Some(id);
        games::insert_singleplayer(
            &cx.data.pool,
            id,
            self.game.variant().game_name(),
            self.owner.get() as i64,
            self.game.attempts_left() as i64,
        )
        .await?;
        if self.game.is_over() {
            self.persist(&cx.data.pool).await?;
        }
        Ok(())
    }

    async fn handle(&mut self, event: UiEvent, cx: &ViewContext<'_>) -> Result<Effect, Error> {
        match event.action() {
            "wordle:submit" => {
                let guess = event.field("guess").unwrap_or_default().to_string();
                self.commit(&guess, event.user, cx).await
            }
            "letterle:pick" => {
                let letter = event.first_value().unwrap_or_default().to_string();
                self.commit(&letter, event.user, cx).await
            }
            "wordle:suggestion" => {
                let picked = event
                    .first_value()
                    .and_then(|v| v.parse::<usize>().ok())
                    .and_then(|i| self.suggestions.get(i).cloned());
                match picked {
                    Some(suggestion) => self.commit(&suggestion.word, suggestion.by, cx).await,
                    None => Ok(Effect::Nothing),
                }
            }
            "wordle:giveup" => {
                self.game.forfeit();
                self.persist(&cx.data.pool).await?;
                info!("{} gave up on {} game {:?}", self.owner, self.name(), self.game_id);
                Ok(Effect::Close)
            }
            _ => Ok(Effect::Nothing),
        }
    }

    async fn suggest(&mut self, event: UiEvent, _cx: &ViewContext<'_>) -> Result<Effect, Error> {
        let guess = match event.action() {
            "wordle:submit" => event.field("guess"),
            "letterle:pick" => event.first_value(),
            _ => None,
        };
        let Some(guess) = guess else {
            return Ok(Effect::Nothing);
        };

        let added = self
            .record_suggestion(guess, event.user, &event.user_name)
            .map_err(guess_error)?;
        if !added {
            return Ok(Effect::Reply(Reply::ephemeral(
                embeds::info_embed().description("Someone already suggested that."),
            )));
        }

        Ok(Effect::UpdateAndReply(Reply::ephemeral(
            embeds::success_embed().description(format!(
                "Suggestion sent. {} decides whether to use it.",
                self.owner_name
            )),
        )))
    }

    async fn finish(&mut self, reason: EndReason, cx: &ViewContext<'_>) -> Result<(), Error> {
        if reason != EndReason::Completed {
            self.game.forfeit();
        }
        self.persist(&cx.data.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ui::EventKind;

    fn view(solo: bool) -> WordleView {
        WordleView::new(
            WordleGame::wordle("ALLOY").unwrap(),
            UserId::new(1),
            "alice",
            solo,
            Emojis::default(),
        )
    }

    fn button(user: u64, action: &str) -> UiEvent {
        UiEvent {
            user: UserId::new(user),
            user_name: "someone".into(),
            kind: EventKind::Button {
                action: action.into(),
            },
        }
    }

    #[test]
    fn test_solo_mode_admission() {
        let v = view(true);
        let owner = UserId::new(1);
        assert_eq!(v.admit(owner, owner, &button(1, "wordle:guess")), Admission::Commit);
        assert_eq!(v.admit(UserId::new(2), owner, &button(2, "wordle:guess")), Admission::Suggest);
        assert!(matches!(
            v.admit(UserId::new(2), owner, &button(2, "wordle:giveup")),
            Admission::Reject(_)
        ));
    }

    #[test]
    fn test_open_mode_lets_anyone_guess() {
        let v = view(false);
        assert_eq!(
            v.admit(UserId::new(2), UserId::new(1), &button(2, "wordle:guess")),
            Admission::Commit
        );
    }

    #[test]
    fn test_suggestions_do_not_advance_the_game() {
        let mut v = view(true);
        assert!(v.record_suggestion("crane", UserId::new(2), "bob").unwrap());
        assert!(!v.record_suggestion("CRANE", UserId::new(3), "carol").unwrap());
        assert_eq!(v.suggestions().len(), 1);
        assert_eq!(v.game().history().len(), 0);
        assert_eq!(v.game().attempts_left(), 6);

        assert!(v.record_suggestion("cat", UserId::new(2), "bob").is_err());
    }

    #[test]
    fn test_suggestion_list_is_bounded() {
        let mut v = view(true);
        for i in 0..(MAX_SUGGESTIONS + 2) {
            let word: String = std::iter::repeat((b'A' + i as u8) as char).take(5).collect();
            v.record_suggestion(&word, UserId::new(2), "bob").unwrap();
        }
        assert_eq!(v.suggestions().len(), MAX_SUGGESTIONS);
        assert_eq!(v.suggestions()[0].word, "CCCCC");
    }

    #[test]
    fn test_opening_guess_counts_as_turn_one() {
        let mut v = WordleView::new(
            WordleGame::letterle('K').unwrap(),
            UserId::new(1),
            "alice",
            true,
            Emojis::default(),
        );
        v.opening_guess("a").unwrap();
        assert_eq!(v.game().history().len(), 1);
        assert_eq!(v.game().attempts_left(), 23);
        assert!(v.opening_guess("a").is_err());
    }

    #[test]
    fn test_guess_modal_matches_word_length() {
        let v = view(true);
        let spec = v.modal_for(&button(1, "wordle:guess")).unwrap();
        assert_eq!(spec.action, "wordle:submit");
        assert_eq!(spec.fields[0].min_length, Some(5));
        assert_eq!(spec.fields[0].max_length, Some(5));
        assert!(v.modal_for(&button(1, "wordle:giveup")).is_none());
    }

    #[test]
    fn test_render_helpers() {
        let emojis = Emojis::default();
        let mut game = WordleGame::wordle("ALLOY").unwrap();
        let record = game.guess("LLAMA", 1).unwrap().clone();
        assert_eq!(guess_line(&emojis, &record), "🟨🟩🟨⬛⬛ `LLAMA`");

        let keyboard = keyboard_lines(&emojis, &game);
        assert!(keyboard.starts_with("🟩 L\n🟨 A\n⬛ M"));
    }

    #[test]
    fn test_finished_game_keeps_only_the_definition_link() {
        let mut v = view(true);
        v.opening_guess("alloy").unwrap();
        assert!(v.game().is_won());
        assert_eq!(v.components(true).len(), 1);
    }
}
