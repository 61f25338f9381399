//! Hosts the interactive sessions attached to bot messages.
//!
//! Sessions are keyed by message id. Each one sits behind its own async mutex
//! so interactions on the same message run one at a time in arrival order,
//! while different messages proceed independently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serenity::all::{
    ActionRowComponent, ChannelId, ComponentInteraction, ComponentInteractionDataKind, Context,
    CreateInteractionResponse, CreateInteractionResponseFollowup, CreateInteractionResponseMessage,
    EditInteractionResponse, EditMessage, MessageId, ModalInteraction, UserId,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::bot::data::{Context as PoiseContext, Data};
use crate::bot::error::{Error, ErrorKind};
use crate::constants::embeds;
use crate::constants::timeouts::MODAL_TIMEOUT;
use crate::services::ui::effect::{Effect, ModalSpec, Reply};
use crate::services::ui::session::{
    Admission, CooldownTable, EndReason, EventKind, SessionView, UiEvent, ViewContext,
};

/// Every component owned by the engine carries this custom id prefix
pub const CUSTOM_ID_PREFIX: &str = "ui:";
const MODAL_PREFIX: &str = "ui:modal:";

pub const STALE_MESSAGE: &str = "This interaction has been disabled.";
const MODAL_EXPIRED: &str = "This dialog has expired, please open it again.";

struct UiSession {
    channel_id: ChannelId,
    message_id: MessageId,
    owner: UserId,
    timeout: Duration,
    last_interaction: Instant,
    cooldowns: CooldownTable,
    /// When each user was last shown a dialog
    pending_modals: HashMap<UserId, Instant>,
    view: Box<dyn SessionView>,
}

impl UiSession {
    fn view_context<'a>(&self, ctx: &'a Context, data: &'a Arc<Data>) -> ViewContext<'a> {
        ViewContext {
            ctx,
            data,
            channel_id: self.channel_id,
            message_id: self.message_id,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_interaction) >= self.timeout
    }

    /// Decide whether an event reaches the view. Rejections leave the session untouched.
    fn gate(&mut self, event: &UiEvent, now: Instant, cooldown: Duration) -> Gate {
        let user = event.user;

        if let EventKind::Modal { .. } = event.kind {
            let opened = self.pending_modals.remove(&user);
            if !opened.is_some_and(|at| now.saturating_duration_since(at) < MODAL_TIMEOUT) {
                return Gate::Reject(MODAL_EXPIRED.to_string());
            }
        } else if let Err(wait) = self.cooldowns.check(user, now, cooldown) {
            return Gate::Reject(format!("Slow down! Try again in {:.1}s.", wait.as_secs_f32()));
        }

        self.last_interaction = now;

        let admission = self.view.admit(user, self.owner, event);
        if let Admission::Reject(message) = &admission {
            return Gate::Reject(message.clone());
        }

        if let Some(spec) = self.view.modal_for(event) {
            self.pending_modals.insert(user, now);
            return Gate::OpenModal(spec);
        }

        Gate::Run(admission)
    }
}

#[derive(Debug)]
enum Gate {
    Reject(String),
    OpenModal(ModalSpec),
    /// `Commit` goes to `handle`, `Suggest` to `suggest`
    Run(Admission),
}

/// The interaction being answered, component click or modal submission
enum Source<'a> {
    Component(&'a ComponentInteraction),
    Modal(&'a ModalInteraction),
}

impl Source<'_> {
    async fn respond(&self, ctx: &Context, response: CreateInteractionResponse) -> Result<(), Error> {
        match self {
            Source::Component(i) => i.create_response(ctx, response).await?,
            Source::Modal(i) => i.create_response(ctx, response).await?,
        }
        Ok(())
    }

    async fn defer(&self, ctx: &Context) -> Result<(), Error> {
        self.respond(ctx, CreateInteractionResponse::Acknowledge).await
    }

    async fn edit(&self, ctx: &Context, edit: EditInteractionResponse) -> Result<(), Error> {
        match self {
            Source::Component(i) => i.edit_response(ctx, edit).await?,
            Source::Modal(i) => i.edit_response(ctx, edit).await?,
        };
        Ok(())
    }

    async fn followup(&self, ctx: &Context, reply: Reply) -> Result<(), Error> {
        let followup = CreateInteractionResponseFollowup::new()
            .embed(reply.embed)
            .ephemeral(reply.ephemeral);
        match self {
            Source::Component(i) => i.create_followup(ctx, followup).await?,
            Source::Modal(i) => i.create_followup(ctx, followup).await?,
        };
        Ok(())
    }

    /// Immediate ephemeral answer, used before anything was deferred
    async fn reject(&self, ctx: &Context, message: &str) -> Result<(), Error> {
        self.respond(
            ctx,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(message)
                    .ephemeral(true),
            ),
        )
        .await
    }
}

pub struct UiEngine {
    sessions: DashMap<u64, Arc<Mutex<UiSession>>>,
    cooldown: Duration,
}

impl UiEngine {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            cooldown,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn is_active(&self, message_id: MessageId) -> bool {
        self.sessions.contains_key(&message_id.get())
    }

    /// Reply to a command with the view and register it as a session
    pub async fn start(
        &self,
        ctx: PoiseContext<'_>,
        view: Box<dyn SessionView>,
        timeout: Duration,
    ) -> Result<MessageId, Error> {
        let reply = poise::CreateReply::default()
            .embed(view.render())
            .components(view.components(false));
        let handle = ctx.send(reply).await?;
        let message = handle.message().await?;

        self.attach(
            ctx.serenity_context(),
            ctx.data(),
            message.channel_id,
            message.id,
            ctx.author().id,
            view,
            timeout,
        )
        .await?;

        Ok(message.id)
    }

    /// Register a view for a message that already shows its first render
    #[allow(clippy::too_many_arguments)]
    pub async fn attach(
        &self,
        ctx: &Context,
        data: &Arc<Data>,
        channel_id: ChannelId,
        message_id: MessageId,
        owner: UserId,
        view: Box<dyn SessionView>,
        timeout: Duration,
    ) -> Result<(), Error> {
        let mut session = UiSession {
            channel_id,
            message_id,
            owner,
            timeout,
            last_interaction: Instant::now(),
            cooldowns: CooldownTable::new(),
            pending_modals: HashMap::new(),
            view,
        };

        let cx = session.view_context(ctx, data);
        session.view.started(&cx).await?;

        debug!(
            "Attached {} session to message {} (owner {})",
            session.view.name(),
            message_id,
            owner
        );
        self.sessions
            .insert(message_id.get(), Arc::new(Mutex::new(session)));
        Ok(())
    }

    fn session(&self, message_id: u64) -> Option<Arc<Mutex<UiSession>>> {
        self.sessions.get(&message_id).map(|entry| entry.value().clone())
    }

    /// Unregister a session; later interactions on its message are stale
    fn detach(&self, message_id: MessageId) -> Option<Arc<Mutex<UiSession>>> {
        self.sessions.remove(&message_id.get()).map(|(_, entry)| entry)
    }

    pub async fn dispatch_component(
        &self,
        ctx: &Context,
        data: &Arc<Data>,
        component: &ComponentInteraction,
    ) -> Result<(), Error> {
        let source = Source::Component(component);
        let Some(action) = component.data.custom_id.strip_prefix(CUSTOM_ID_PREFIX) else {
            return source.reject(ctx, STALE_MESSAGE).await;
        };

        let kind = match &component.data.kind {
            ComponentInteractionDataKind::StringSelect { values } => EventKind::Select {
                action: action.to_string(),
                values: values.clone(),
            },
            _ => EventKind::Button {
                action: action.to_string(),
            },
        };

        let event = UiEvent {
            user: component.user.id,
            user_name: component.user.name.clone(),
            kind,
        };

        self.dispatch(ctx, data, component.message.id, event, source).await
    }

    pub async fn dispatch_modal(
        &self,
        ctx: &Context,
        data: &Arc<Data>,
        modal: &ModalInteraction,
    ) -> Result<(), Error> {
        let source = Source::Modal(modal);
        let Some((message_id, action)) = parse_modal_id(&modal.data.custom_id) else {
            return source.reject(ctx, STALE_MESSAGE).await;
        };

        let mut values = HashMap::new();
        for row in &modal.data.components {
            for component in &row.components {
                if let ActionRowComponent::InputText(input) = component {
                    values.insert(
                        input.custom_id.clone(),
                        input.value.clone().unwrap_or_default(),
                    );
                }
            }
        }

        let event = UiEvent {
            user: modal.user.id,
            user_name: modal.user.name.clone(),
            kind: EventKind::Modal {
                action: action.to_string(),
                values,
            },
        };

        self.dispatch(ctx, data, MessageId::new(message_id), event, source)
            .await
    }

    async fn dispatch(
        &self,
        ctx: &Context,
        data: &Arc<Data>,
        message_id: MessageId,
        event: UiEvent,
        source: Source<'_>,
    ) -> Result<(), Error> {
        let Some(entry) = self.session(message_id.get()) else {
            return source.reject(ctx, STALE_MESSAGE).await;
        };

        let mut session = entry.lock().await;
        // The sweeper may have closed it while we waited for the lock
        if !self.is_active(message_id) {
            return source.reject(ctx, STALE_MESSAGE).await;
        }

        let admission = match session.gate(&event, Instant::now(), self.cooldown) {
            Gate::Reject(message) => return source.reject(ctx, &message).await,
            Gate::OpenModal(spec) => {
                let modal = spec.build(modal_id(message_id, &spec.action));
                return source.respond(ctx, CreateInteractionResponse::Modal(modal)).await;
            }
            Gate::Run(admission) => admission,
        };

        source.defer(ctx).await?;

        let cx = session.view_context(ctx, data);
        let name = session.view.name();
        let result = match admission {
            Admission::Suggest => session.view.suggest(event, &cx).await,
            _ => session.view.handle(event, &cx).await,
        };

        let effect = match result {
            Ok(effect) => effect,
            Err(e) => {
                if e.kind() == ErrorKind::Fatal {
                    error!("{} session on message {} failed: {:?}", name, message_id, e);
                } else {
                    debug!("{} session rejected event: {}", name, e);
                }
                Effect::Reply(Reply::ephemeral(embeds::domain_error(e.to_string())))
            }
        };

        match effect {
            Effect::Update => self.render(ctx, &source, &session, false).await?,
            Effect::Reply(reply) => source.followup(ctx, reply).await?,
            Effect::UpdateAndReply(reply) => {
                self.render(ctx, &source, &session, false).await?;
                source.followup(ctx, reply).await?;
            }
            Effect::Close => {
                self.detach(message_id);
                if let Err(e) = session.view.finish(EndReason::Completed, &cx).await {
                    error!("{} finalizer failed: {:?}", name, e);
                }
                self.render(ctx, &source, &session, true).await?;
                debug!("{} session on message {} completed", name, message_id);
            }
            Effect::Nothing => {}
        }

        Ok(())
    }

    async fn render(
        &self,
        ctx: &Context,
        source: &Source<'_>,
        session: &UiSession,
        disabled: bool,
    ) -> Result<(), Error> {
        source
            .edit(
                ctx,
                EditInteractionResponse::new()
                    .embed(session.view.render())
                    .components(session.view.components(disabled)),
            )
            .await
    }

    /// Close a session from outside: finalizer, then one last edit with disabled components
    pub async fn stop(
        &self,
        ctx: &Context,
        data: &Arc<Data>,
        message_id: MessageId,
        reason: EndReason,
    ) -> Result<bool, Error> {
        let Some(entry) = self.detach(message_id) else {
            return Ok(false);
        };

        let mut session = entry.lock().await;
        let cx = session.view_context(ctx, data);
        let name = session.view.name();
        if let Err(e) = session.view.finish(reason, &cx).await {
            error!("{} finalizer failed: {:?}", name, e);
        }

        session
            .channel_id
            .edit_message(
                ctx,
                session.message_id,
                EditMessage::new()
                    .embed(session.view.render())
                    .components(session.view.components(true)),
            )
            .await?;

        debug!("{} session on message {} ended ({:?})", name, message_id, reason);
        Ok(true)
    }

    /// Stop every live session, used on shutdown so game outcomes are flushed
    pub async fn stop_all(&self, ctx: &Context, data: &Arc<Data>) {
        let ids: Vec<u64> = self.sessions.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Err(e) = self.stop(ctx, data, MessageId::new(id), EndReason::Stopped).await {
                warn!("Failed to stop session on message {}: {:?}", id, e);
            }
        }
    }

    /// Ids of sessions idle past their timeout. Busy sessions are skipped.
    fn expired(&self, now: Instant) -> Vec<u64> {
        self.sessions
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .try_lock()
                    .map(|session| session.is_expired(now))
                    .unwrap_or(false)
            })
            .map(|entry| *entry.key())
            .collect()
    }
}

/// Periodically time out idle sessions
pub fn spawn_sweeper(ctx: Context, data: Arc<Data>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            for id in data.ui.expired(Instant::now()) {
                match data
                    .ui
                    .stop(&ctx, &data, MessageId::new(id), EndReason::Timeout)
                    .await
                {
                    Ok(true) => debug!("Session on message {} timed out", id),
                    Ok(false) => {}
                    Err(e) => warn!("Failed to close timed out session {}: {:?}", id, e),
                }
            }
        }
    });
    info!("Started UI session sweeper");
}

fn modal_id(message_id: MessageId, action: &str) -> String {
    format!("{}{}:{}", MODAL_PREFIX, message_id.get(), action)
}

/// `ui:modal:<message id>:<action>`
fn parse_modal_id(custom_id: &str) -> Option<(u64, &str)> {
    let rest = custom_id.strip_prefix(MODAL_PREFIX)?;
    let (id, action) = rest.split_once(':')?;
    let id = id.parse::<u64>().ok().filter(|id| *id != 0)?;
    Some((id, action))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serenity::all::{CreateActionRow, CreateEmbed};

    use super::*;
    use crate::services::ui::effect::ModalField;

    const OWNER: UserId = UserId::new(1);
    const GUEST: UserId = UserId::new(2);
    const TIMEOUT: Duration = Duration::from_secs(60);
    const COOLDOWN: Duration = Duration::from_secs(2);

    /// Owner commits, everyone else suggests; "open" asks for a dialog
    #[derive(Default)]
    struct SoloView {
        admitted: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SessionView for SoloView {
        fn name(&self) -> &'static str {
            "solo"
        }

        fn render(&self) -> CreateEmbed {
            CreateEmbed::new()
        }

        fn components(&self, _disabled: bool) -> Vec<CreateActionRow> {
            Vec::new()
        }

        fn admit(&self, user: UserId, owner: UserId, _event: &UiEvent) -> Admission {
            self.admitted.fetch_add(1, Ordering::SeqCst);
            if user == owner {
                Admission::Commit
            } else {
                Admission::Suggest
            }
        }

        fn modal_for(&self, event: &UiEvent) -> Option<ModalSpec> {
            (event.action() == "open").then(|| ModalSpec {
                action: "submit".into(),
                title: "Guess".into(),
                fields: vec![ModalField::short("guess", "Guess")],
            })
        }

        async fn handle(&mut self, _event: UiEvent, _cx: &ViewContext<'_>) -> Result<Effect, Error> {
            Ok(Effect::Update)
        }
    }

    fn ui_session(view: SoloView, started: Instant) -> UiSession {
        UiSession {
            channel_id: ChannelId::new(10),
            message_id: MessageId::new(20),
            owner: OWNER,
            timeout: TIMEOUT,
            last_interaction: started,
            cooldowns: CooldownTable::new(),
            pending_modals: HashMap::new(),
            view: Box::new(view),
        }
    }

    fn button(user: UserId, action: &str) -> UiEvent {
        UiEvent {
            user,
            user_name: "someone".into(),
            kind: EventKind::Button {
                action: action.into(),
            },
        }
    }

    fn submission(user: UserId) -> UiEvent {
        UiEvent {
            user,
            user_name: "someone".into(),
            kind: EventKind::Modal {
                action: "submit".into(),
                values: HashMap::from([("guess".to_string(), "crane".to_string())]),
            },
        }
    }

    #[test]
    fn test_cooldown_rejection_leaves_session_untouched() {
        let admitted = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();
        let mut session = ui_session(
            SoloView {
                admitted: admitted.clone(),
            },
            start,
        );

        let first = start + Duration::from_secs(1);
        assert!(matches!(
            session.gate(&button(OWNER, "go"), first, COOLDOWN),
            Gate::Run(Admission::Commit)
        ));
        assert_eq!(admitted.load(Ordering::SeqCst), 1);

        let too_soon = first + Duration::from_millis(500);
        assert!(matches!(
            session.gate(&button(OWNER, "go"), too_soon, COOLDOWN),
            Gate::Reject(message) if message.starts_with("Slow down")
        ));
        assert_eq!(admitted.load(Ordering::SeqCst), 1);
        assert_eq!(session.last_interaction, first);
    }

    #[test]
    fn test_solo_guest_event_is_a_suggestion() {
        let start = Instant::now();
        let mut session = ui_session(SoloView::default(), start);

        assert!(matches!(
            session.gate(&button(GUEST, "go"), start, COOLDOWN),
            Gate::Run(Admission::Suggest)
        ));
        assert!(matches!(
            session.gate(&button(OWNER, "go"), start, COOLDOWN),
            Gate::Run(Admission::Commit)
        ));
    }

    #[test]
    fn test_dialog_submission_needs_an_open_dialog() {
        let start = Instant::now();
        let mut session = ui_session(SoloView::default(), start);

        assert!(matches!(
            session.gate(&submission(OWNER), start, COOLDOWN),
            Gate::Reject(message) if message == MODAL_EXPIRED
        ));

        match session.gate(&button(OWNER, "open"), start, COOLDOWN) {
            Gate::OpenModal(spec) => assert_eq!(spec.action, "submit"),
            other => panic!("expected a dialog, got {:?}", other),
        }
        // Submissions bypass the click cooldown
        let soon = start + Duration::from_millis(100);
        assert!(matches!(
            session.gate(&submission(OWNER), soon, COOLDOWN),
            Gate::Run(Admission::Commit)
        ));
        // One submission per opened dialog
        assert!(matches!(
            session.gate(&submission(OWNER), soon, COOLDOWN),
            Gate::Reject(_)
        ));
    }

    #[test]
    fn test_stale_dialog_is_rejected() {
        let start = Instant::now();
        let mut session = ui_session(SoloView::default(), start);
        assert!(matches!(
            session.gate(&button(OWNER, "open"), start, COOLDOWN),
            Gate::OpenModal(_)
        ));

        let late = start + MODAL_TIMEOUT;
        assert!(matches!(
            session.gate(&submission(OWNER), late, COOLDOWN),
            Gate::Reject(_)
        ));
    }

    #[tokio::test]
    async fn test_expired_skips_busy_sessions() {
        let engine = UiEngine::new(COOLDOWN);
        let start = Instant::now();
        engine
            .sessions
            .insert(1, Arc::new(Mutex::new(ui_session(SoloView::default(), start))));
        engine
            .sessions
            .insert(2, Arc::new(Mutex::new(ui_session(SoloView::default(), start))));
        let fresh = start + Duration::from_secs(30);
        let mut recent = ui_session(SoloView::default(), start);
        recent.last_interaction = fresh;
        engine.sessions.insert(3, Arc::new(Mutex::new(recent)));

        assert!(engine.expired(fresh).is_empty());

        let busy = engine.session(2).unwrap();
        let _guard = busy.lock().await;

        let later = start + TIMEOUT;
        assert_eq!(engine.expired(later), vec![1]);
    }

    #[test]
    fn test_detached_session_is_stale() {
        let engine = UiEngine::new(COOLDOWN);
        let message = MessageId::new(7);
        engine.sessions.insert(
            message.get(),
            Arc::new(Mutex::new(ui_session(SoloView::default(), Instant::now()))),
        );
        assert!(engine.is_active(message));

        assert!(engine.detach(message).is_some());
        assert!(!engine.is_active(message));
        assert!(engine.session(message.get()).is_none());
        assert!(engine.detach(message).is_none());
        assert!(engine.is_empty());
    }

    #[test]
    fn test_modal_id_round_trip() {
        let id = modal_id(MessageId::new(42), "guess");
        assert_eq!(id, "ui:modal:42:guess");
        assert_eq!(parse_modal_id(&id), Some((42, "guess")));
    }

    #[test]
    fn test_modal_id_rejects_foreign_ids() {
        assert_eq!(parse_modal_id("topic_123"), None);
        assert_eq!(parse_modal_id("ui:modal:abc:guess"), None);
        assert_eq!(parse_modal_id("ui:modal:0:guess"), None);
        assert_eq!(parse_modal_id("ui:guess"), None);
    }

    #[test]
    fn test_engine_starts_empty() {
        let engine = UiEngine::new(Duration::from_secs(2));
        assert!(engine.is_empty());
        assert!(!engine.is_active(MessageId::new(1)));
        assert!(engine.expired(Instant::now()).is_empty());
    }
}
