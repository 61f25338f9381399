use poise::serenity_prelude::User;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::commands::reply;
use crate::components::paginator::{paginate, pages_from_lines};
use crate::components::rps_view::{self, RpsView};
use crate::components::tictactoe_view::{self, TicTacToeView};
use crate::components::wordle_view::WordleView;
use crate::constants::embeds;
use crate::constants::timeouts::GAME_TIMEOUT;
use crate::db::models::{GameTally, LeaderboardEntry};
use crate::db::queries::games;
use crate::services::games::wordle::{Variant, WordleGame, MAX_WORD_LENGTH, MIN_WORD_LENGTH};
use crate::services::games::words::random_letter;
use crate::utils::formatting::{format_number, mention_user};

const DEFAULT_WORD_LENGTH: u8 = 5;
const LEADERBOARD_SIZE: i64 = 10;
const LEADERBOARD_PAGE: usize = 5;

/// Play a minigame or look at the records
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    aliases("mg"),
    subcommands("tictactoe", "rockpaperscissor", "wordle", "letterle", "stats"),
    subcommand_required,
    category = "Minigames"
)]
pub async fn minigame(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

fn check_opponent(ctx: Context<'_>, opponent: Option<&User>) -> Result<(), Error> {
    match opponent {
        Some(user) if user.id == ctx.author().id => Err(Error::invocation("You can't challenge yourself")),
        Some(user) if user.bot => Err(Error::invocation("Bots don't play games")),
        _ => Ok(()),
    }
}

/// Tic-Tac-Toe; without an opponent the first other player to click takes O
#[poise::command(slash_command, prefix_command, guild_only, aliases("ttt"))]
pub async fn tictactoe(
    ctx: Context<'_>,
    #[description = "Who to play against"] opponent: Option<User>,
) -> Result<(), Error> {
    check_opponent(ctx, opponent.as_ref())?;
    let view = TicTacToeView::new(
        ctx.author().id,
        opponent.map(|u| u.id),
        ctx.data().emojis.clone(),
    );
    ctx.data().ui.start(ctx, Box::new(view), GAME_TIMEOUT).await?;
    Ok(())
}

/// Rock, paper, scissors
#[poise::command(slash_command, prefix_command, guild_only, aliases("rps"))]
pub async fn rockpaperscissor(
    ctx: Context<'_>,
    #[description = "Who to play against"] opponent: Option<User>,
) -> Result<(), Error> {
    check_opponent(ctx, opponent.as_ref())?;
    let view = RpsView::new(
        ctx.author().id,
        opponent.map(|u| u.id),
        ctx.data().emojis.clone(),
    );
    ctx.data().ui.start(ctx, Box::new(view), GAME_TIMEOUT).await?;
    Ok(())
}

/// Guess the word in six tries
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn wordle(
    ctx: Context<'_>,
    #[description = "Word length (3-8)"]
    #[min = 3]
    #[max = 8]
    letters: Option<u8>,
    #[description = "Only you can guess; others may suggest (default on)"] solo: Option<bool>,
    #[description = "Your first guess"] first_guess: Option<String>,
) -> Result<(), Error> {
    let len = letters.unwrap_or(DEFAULT_WORD_LENGTH) as usize;
    if !(MIN_WORD_LENGTH..=MAX_WORD_LENGTH).contains(&len) {
        return Err(Error::invocation(format!(
            "Word length must be between {} and {}",
            MIN_WORD_LENGTH, MAX_WORD_LENGTH
        )));
    }
    ctx.defer().await?;

    let secret = ctx.data().words.random_word(len).await?;
    let game = WordleGame::wordle(&secret).map_err(|e| Error::custom(e.to_string()))?;
    let mut view = WordleView::new(
        game,
        ctx.author().id,
        ctx.author().name.clone(),
        solo.unwrap_or(true),
        ctx.data().emojis.clone(),
    );

    if let Some(guess) = first_guess {
        let word = view
            .game()
            .check_guess(&guess)
            .map_err(|e| Error::invocation(e.to_string()))?;
        if !ctx.data().dictionary.is_valid(&word).await? {
            return Err(Error::domain(format!("`{}` is not in the dictionary", word)));
        }
        view.opening_guess(&word)?;
    }

    ctx.data().ui.start(ctx, Box::new(view), GAME_TIMEOUT).await?;
    Ok(())
}

/// Guess the letter; the opening guess is random unless you give one
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn letterle(
    ctx: Context<'_>,
    #[description = "Only you can guess; others may suggest (default on)"] solo: Option<bool>,
    #[description = "Your first letter"] first_guess: Option<String>,
) -> Result<(), Error> {
    let game = WordleGame::letterle(random_letter()).map_err(|e| Error::custom(e.to_string()))?;
    let mut view = WordleView::new(
        game,
        ctx.author().id,
        ctx.author().name.clone(),
        solo.unwrap_or(true),
        ctx.data().emojis.clone(),
    );

    let opening = match first_guess {
        Some(guess) => guess,
        None => random_letter().to_string(),
    };
    view.opening_guess(&opening)
        .map_err(|e| Error::invocation(e.to_string()))?;

    ctx.data().ui.start(ctx, Box::new(view), GAME_TIMEOUT).await?;
    Ok(())
}

/// Game records
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    subcommands("stats_all", "stats_user", "stats_wordle", "stats_letterle"),
    subcommand_required
)]
pub async fn stats(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

pub fn tally_line(tally: &GameTally) -> String {
    format!(
        "**{}**: {} played, {} won, {} lost",
        display_name(&tally.game_name),
        format_number(tally.played),
        format_number(tally.wins),
        format_number(tally.losses)
    )
}

pub fn leaderboard_lines(entries: &[LeaderboardEntry]) -> Vec<String> {
    entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            format!(
                "`{}.` {} {} wins in {} games",
                i + 1,
                mention_user(poise::serenity_prelude::UserId::new(e.user_id as u64)),
                e.wins,
                e.played
            )
        })
        .collect()
}

fn display_name(game_name: &str) -> &str {
    match game_name {
        "wordle" => "Wordle",
        "letterle" => "Letterle",
        name if name == tictactoe_view::GAME_NAME => "Tic-Tac-Toe",
        name if name == rps_view::GAME_NAME => "Rock, Paper, Scissors",
        other => other,
    }
}

/// Totals across everyone
#[poise::command(slash_command, prefix_command, guild_only, rename = "all")]
pub async fn stats_all(ctx: Context<'_>) -> Result<(), Error> {
    let pool = &ctx.data().pool;
    let single = games::singleplayer_totals(pool).await?;
    let double = games::twoplayer_totals(pool).await?;

    let mut lines: Vec<String> = single.iter().map(tally_line).collect();
    lines.extend(double.iter().map(|t| {
        format!(
            "**{}**: {} played, {} draws",
            display_name(&t.game_name),
            format_number(t.played),
            format_number(t.draws)
        )
    }));
    if lines.is_empty() {
        lines.push("No games played yet.".to_string());
    }

    reply(
        ctx,
        embeds::standard_embed()
            .title("Minigame Stats")
            .description(lines.join("\n")),
    )
    .await
}

/// One player's record
#[poise::command(slash_command, prefix_command, guild_only, rename = "user")]
pub async fn stats_user(
    ctx: Context<'_>,
    #[description = "Player (defaults to you)"] user: Option<User>,
) -> Result<(), Error> {
    let user = user.as_ref().unwrap_or_else(|| ctx.author());
    let tallies = games::user_tallies(&ctx.data().pool, user.id.get() as i64).await?;

    let description = if tallies.is_empty() {
        format!("{} hasn't played anything yet.", mention_user(user.id))
    } else {
        tallies.iter().map(tally_line).collect::<Vec<_>>().join("\n")
    };

    let mut embed = embeds::standard_embed()
        .title(format!("Stats for {}", user.name))
        .description(description);
    if let Some(avatar) = user.avatar_url() {
        embed = embed.thumbnail(avatar);
    }
    reply(ctx, embed).await
}

async fn leaderboard(ctx: Context<'_>, variant: Variant) -> Result<(), Error> {
    let name = variant.game_name();
    let entries = games::leaderboard(&ctx.data().pool, name, LEADERBOARD_SIZE).await?;
    if entries.is_empty() {
        return Err(Error::domain(format!("Nobody has played {} yet", display_name(name))));
    }

    let title = format!("{} Leaderboard", display_name(name));
    let pages = pages_from_lines(&title, &leaderboard_lines(&entries), LEADERBOARD_PAGE, embeds::standard_embed);
    paginate(ctx, pages).await
}

/// Top Wordle players
#[poise::command(slash_command, prefix_command, guild_only, rename = "wordle")]
pub async fn stats_wordle(ctx: Context<'_>) -> Result<(), Error> {
    leaderboard(ctx, Variant::Wordle).await
}

/// Top Letterle players
#[poise::command(slash_command, prefix_command, guild_only, rename = "letterle")]
pub async fn stats_letterle(ctx: Context<'_>) -> Result<(), Error> {
    leaderboard(ctx, Variant::Letterle).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_line() {
        let tally = GameTally {
            game_name: "wordle".into(),
            played: 1200,
            wins: 700,
            losses: 500,
        };
        assert_eq!(tally_line(&tally), "**Wordle**: 1,200 played, 700 won, 500 lost");
    }

    #[test]
    fn test_leaderboard_lines_are_ranked() {
        let entries = vec![
            LeaderboardEntry { user_id: 7, wins: 3, played: 4 },
            LeaderboardEntry { user_id: 9, wins: 1, played: 5 },
        ];
        let lines = leaderboard_lines(&entries);
        assert_eq!(lines[0], "`1.` <@7> 3 wins in 4 games");
        assert!(lines[1].starts_with("`2.` <@9>"));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(display_name("tictactoe"), "Tic-Tac-Toe");
        assert_eq!(display_name("rps"), "Rock, Paper, Scissors");
        assert_eq!(display_name("chess"), "chess");
    }
}
