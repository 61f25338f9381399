use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serenity::all::{ChannelId, Context, CreateActionRow, CreateEmbed, MessageId, UserId};

use crate::bot::data::Data;
use crate::bot::error::Error;
use crate::services::ui::effect::{Effect, ModalSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Button { action: String },
    Select { action: String, values: Vec<String> },
    Modal { action: String, values: HashMap<String, String> },
}

impl EventKind {
    pub fn action(&self) -> &str {
        match self {
            EventKind::Button { action }
            | EventKind::Select { action, .. }
            | EventKind::Modal { action, .. } => action,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UiEvent {
    pub user: UserId,
    pub user_name: String,
    pub kind: EventKind,
}

impl UiEvent {
    pub fn action(&self) -> &str {
        self.kind.action()
    }

    pub fn first_value(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Select { values, .. } => values.first().map(String::as_str),
            EventKind::Modal { values, .. } => values.values().next().map(String::as_str),
            EventKind::Button { .. } => None,
        }
    }

    pub fn field(&self, id: &str) -> Option<&str> {
        match &self.kind {
            EventKind::Modal { values, .. } => values.get(id).map(String::as_str),
            _ => None,
        }
    }
}

/// Who may act on a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The event mutates state
    Commit,
    /// The event is recorded as a suggestion, state does not advance
    Suggest,
    Reject(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Completed,
    Timeout,
    Stopped,
}

/// Everything a view needs from the outside world while handling an event
pub struct ViewContext<'a> {
    pub ctx: &'a Context,
    pub data: &'a Arc<Data>,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

/// State and rendering of one interactive message
#[async_trait]
pub trait SessionView: Send + Sync {
    fn name(&self) -> &'static str;

    fn render(&self) -> CreateEmbed;

    /// Component rows. With `disabled` every non-link component must be disabled.
    fn components(&self, disabled: bool) -> Vec<CreateActionRow>;

    fn admit(&self, _user: UserId, _owner: UserId, _event: &UiEvent) -> Admission {
        Admission::Commit
    }

    /// Dialog to open instead of handling the event directly
    fn modal_for(&self, _event: &UiEvent) -> Option<ModalSpec> {
        None
    }

    /// Called once the message exists and the session is registered
    async fn started(&mut self, _cx: &ViewContext<'_>) -> Result<(), Error> {
        Ok(())
    }

    async fn handle(&mut self, event: UiEvent, cx: &ViewContext<'_>) -> Result<Effect, Error>;

    async fn suggest(&mut self, _event: UiEvent, _cx: &ViewContext<'_>) -> Result<Effect, Error> {
        Ok(Effect::Nothing)
    }

    /// Finalizer: flush outcomes before the last render
    async fn finish(&mut self, _reason: EndReason, _cx: &ViewContext<'_>) -> Result<(), Error> {
        Ok(())
    }
}

/// One interaction per user per interval
#[derive(Debug, Default)]
pub struct CooldownTable {
    last: HashMap<UserId, Instant>,
}

impl CooldownTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the interaction, or returns how long the user still has to wait
    pub fn check(&mut self, user: UserId, now: Instant, interval: Duration) -> Result<(), Duration> {
        if let Some(last) = self.last.get(&user) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < interval {
                return Err(interval - elapsed);
            }
        }
        self.last.insert(user, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_per_user() {
        let mut table = CooldownTable::new();
        let interval = Duration::from_secs(2);
        let start = Instant::now();
        let alice = UserId::new(1);
        let bob = UserId::new(2);

        assert!(table.check(alice, start, interval).is_ok());
        let wait = table
            .check(alice, start + Duration::from_millis(500), interval)
            .unwrap_err();
        assert_eq!(wait, Duration::from_millis(1500));

        assert!(table.check(bob, start + Duration::from_millis(500), interval).is_ok());
        assert!(table.check(alice, start + Duration::from_secs(2), interval).is_ok());
    }

    #[test]
    fn test_rejected_interaction_does_not_reset_window() {
        let mut table = CooldownTable::new();
        let interval = Duration::from_secs(2);
        let start = Instant::now();
        let alice = UserId::new(1);

        table.check(alice, start, interval).unwrap();
        table.check(alice, start + Duration::from_secs(1), interval).unwrap_err();
        assert!(table.check(alice, start + Duration::from_secs(2), interval).is_ok());
    }

    #[test]
    fn test_event_accessors() {
        let mut values = HashMap::new();
        values.insert("guess".to_string(), "crane".to_string());
        let event = UiEvent {
            user: UserId::new(1),
            user_name: "alice".into(),
            kind: EventKind::Modal {
                action: "guess".into(),
                values,
            },
        };
        assert_eq!(event.action(), "guess");
        assert_eq!(event.field("guess"), Some("crane"));
        assert_eq!(event.first_value(), Some("crane"));
    }
}
