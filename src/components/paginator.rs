use async_trait::async_trait;
use serenity::all::{ButtonStyle, CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter, UserId};

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::emojis::Emojis;
use crate::constants::timeouts::PAGINATOR_TIMEOUT;
use crate::services::ui::{Admission, Effect, SessionView, UiEvent, ViewContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    First,
    Previous,
    Next,
    Last,
}

impl Nav {
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "page:first" => Some(Nav::First),
            "page:prev" => Some(Nav::Previous),
            "page:next" => Some(Nav::Next),
            "page:last" => Some(Nav::Last),
            _ => None,
        }
    }
}

/// Page index arithmetic, clamped to `0..len`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    index: usize,
    len: usize,
}

impl Pager {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn at_start(&self) -> bool {
        self.index == 0
    }

    pub fn at_end(&self) -> bool {
        self.index + 1 >= self.len
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.index + 1, self.len.max(1))
    }

    /// Returns whether the page changed
    pub fn navigate(&mut self, nav: Nav) -> bool {
        let last = self.len.saturating_sub(1);
        let target = match nav {
            Nav::First => 0,
            Nav::Previous => self.index.saturating_sub(1),
            Nav::Next => (self.index + 1).min(last),
            Nav::Last => last,
        };
        let changed = target != self.index;
        self.index = target;
        changed
    }
}

/// Browse a list of embeds one at a time
pub struct PaginatorView {
    pages: Vec<CreateEmbed>,
    pager: Pager,
    emojis: Emojis,
}

impl PaginatorView {
    pub fn new(pages: Vec<CreateEmbed>, emojis: Emojis) -> Self {
        let pager = Pager::new(pages.len());
        Self {
            pages,
            pager,
            emojis,
        }
    }
}

#[async_trait]
impl SessionView for PaginatorView {
    fn name(&self) -> &'static str {
        "paginator"
    }

    fn render(&self) -> CreateEmbed {
        self.pages
            .get(self.pager.index())
            .cloned()
            .unwrap_or_default()
            .footer(CreateEmbedFooter::new(format!("Page {}", self.pager.label())))
    }

    fn components(&self, disabled: bool) -> Vec<CreateActionRow> {
        let nav = |id: &str, symbol: &str, off: bool| {
            CreateButton::new(format!("ui:{}", id))
                .emoji(Emojis::reaction(symbol))
                .style(ButtonStyle::Secondary)
                .disabled(disabled || off)
        };

        vec![CreateActionRow::Buttons(vec![
            nav("page:first", self.emojis.first, self.pager.at_start()),
            nav("page:prev", self.emojis.previous, self.pager.at_start()),
            CreateButton::new("ui:page:label")
                .label(self.pager.label())
                .style(ButtonStyle::Primary)
                .disabled(true),
            nav("page:next", self.emojis.next, self.pager.at_end()),
            nav("page:last", self.emojis.last, self.pager.at_end()),
        ])]
    }

    fn admit(&self, user: UserId, owner: UserId, _event: &UiEvent) -> Admission {
        if user == owner {
            Admission::Commit
        } else {
            Admission::Reject("Only the person who ran the command can turn pages.".to_string())
        }
    }

    async fn handle(&mut self, event: UiEvent, _cx: &ViewContext<'_>) -> Result<Effect, Error> {
        match Nav::from_action(event.action()) {
            Some(nav) if self.pager.navigate(nav) => Ok(Effect::Update),
            _ => Ok(Effect::Nothing),
        }
    }
}

/// Send the pages as a paginated reply, or a plain embed when there is only one
pub async fn paginate(ctx: Context<'_>, pages: Vec<CreateEmbed>) -> Result<(), Error> {
    match pages.len() {
        0 => Err(Error::domain("Nothing to show")),
        1 => {
            let page = pages.into_iter().next().unwrap_or_default();
            ctx.send(poise::CreateReply::default().embed(page)).await?;
            Ok(())
        }
        _ => {
            let view = PaginatorView::new(pages, ctx.data().emojis.clone());
            ctx.data()
                .ui
                .start(ctx, Box::new(view), PAGINATOR_TIMEOUT)
                .await?;
            Ok(())
        }
    }
}

/// Split lines into embeds of at most `per_page` lines each
pub fn pages_from_lines(
    title: &str,
    lines: &[String],
    per_page: usize,
    base: impl Fn() -> CreateEmbed,
) -> Vec<CreateEmbed> {
    lines
        .chunks(per_page.max(1))
        .map(|chunk| base().title(title).description(chunk.join("\n")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_clamps() {
        let mut pager = Pager::new(3);
        assert!(pager.at_start());
        assert!(!pager.navigate(Nav::Previous));
        assert_eq!(pager.index(), 0);

        assert!(pager.navigate(Nav::Next));
        assert!(pager.navigate(Nav::Next));
        assert!(pager.at_end());
        assert!(!pager.navigate(Nav::Next));
        assert_eq!(pager.index(), 2);
        assert_eq!(pager.label(), "3/3");
    }

    #[test]
    fn test_first_and_last_jump() {
        let mut pager = Pager::new(10);
        assert!(pager.navigate(Nav::Last));
        assert_eq!(pager.index(), 9);
        assert!(pager.navigate(Nav::First));
        assert_eq!(pager.index(), 0);
        assert!(!pager.navigate(Nav::First));
    }

    #[test]
    fn test_single_page_is_both_ends() {
        let pager = Pager::new(1);
        assert!(pager.at_start());
        assert!(pager.at_end());
        assert_eq!(pager.label(), "1/1");
    }

    #[test]
    fn test_nav_actions() {
        assert_eq!(Nav::from_action("page:first"), Some(Nav::First));
        assert_eq!(Nav::from_action("page:last"), Some(Nav::Last));
        assert_eq!(Nav::from_action("page:label"), None);
    }

    #[test]
    fn test_pages_from_lines() {
        let lines: Vec<String> = (1..=25).map(|i| format!("line {}", i)).collect();
        let pages = pages_from_lines("Queue", &lines, 10, CreateEmbed::new);
        assert_eq!(pages.len(), 3);
    }
}
