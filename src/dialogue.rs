use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::action::{ActionDispatcher, HostCommand};
use crate::menu::template::render_or_fallback;
use crate::menu::{filter_options, OptionNode, QuestionNode, Registry, ROOT_ID};
use crate::session::SessionData;

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Bot,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    fn new(speaker: Speaker, text: String) -> Self {
        Self {
            speaker,
            text,
            timestamp: Utc::now(),
        }
    }
}

impl std::fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let who = match self.speaker {
            Speaker::Bot => "Assistant",
            Speaker::User => "You",
        };
        write!(f, "[{who}]: {}", self.text)
    }
}

/// One accepted selection: where the user was and what they picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub question_id: String,
    pub option_id: String,
}

// ---------------------------------------------------------------------------
// Engine configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Render queued bot messages immediately. Hosts that show a typing
    /// indicator turn this off and call `render_pending` themselves.
    pub auto_render: bool,
    /// How long a host should show the typing indicator. Cosmetic only.
    pub typing_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_render: true,
            typing_delay: Duration::from_millis(400),
        }
    }
}

/// Outcome of a selection or back request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A bot message was still being produced; nothing happened.
    Ignored,
    /// The option is not offered on the current question; nothing happened.
    Rejected,
    /// Accepted, dialogue stays on the same question.
    Stayed,
    /// Accepted, dialogue moved to another question.
    Moved { to: String },
}

// ---------------------------------------------------------------------------
// Dialogue engine
// ---------------------------------------------------------------------------

pub struct DialogueEngine<'r> {
    registry: &'r Registry,
    dispatcher: &'r ActionDispatcher,
    config: EngineConfig,
    session: SessionData,
    current_question_id: String,
    transcript: Vec<TranscriptEntry>,
    history: Vec<HistoryEntry>,
    /// Question whose bot message is queued but not yet in the transcript.
    pending: Option<String>,
    outbox: Vec<HostCommand>,
}

impl<'r> DialogueEngine<'r> {
    pub fn new(
        registry: &'r Registry,
        dispatcher: &'r ActionDispatcher,
        session: SessionData,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            config,
            session,
            current_question_id: ROOT_ID.into(),
            transcript: Vec::new(),
            history: Vec::new(),
            pending: None,
            outbox: Vec::new(),
        }
    }

    /// Seed the root question on first open. Reopening an engine that
    /// already has a transcript changes nothing.
    pub fn open(&mut self) {
        if !self.transcript.is_empty() || self.pending.is_some() {
            return;
        }
        info!("Dialogue opened");
        self.current_question_id = ROOT_ID.into();
        self.enqueue(ROOT_ID.into());
    }

    pub fn select_option(&mut self, option_id: &str) -> Selection {
        if self.is_awaiting_render() {
            debug!("Ignoring '{option_id}' while a message is being rendered");
            return Selection::Ignored;
        }

        let registry = self.registry;
        let node = registry.get(&self.current_question_id);
        let Some(option) = filter_options(node, &self.session)
            .into_iter()
            .find(|o| o.id == option_id)
        else {
            warn!(
                "Option '{option_id}' is not offered on '{}'. Rejecting selection.",
                node.id
            );
            return Selection::Rejected;
        };

        self.transcript
            .push(TranscriptEntry::new(Speaker::User, option.label.clone()));
        self.history.push(HistoryEntry {
            question_id: node.id.clone(),
            option_id: option.id.clone(),
        });

        if let Some(name) = &option.action {
            self.run_action(name);
        }

        match &option.next_id {
            Some(next) => {
                info!("Transition: {} -> {} (via '{}')", node.id, next, option.id);
                self.current_question_id = next.clone();
                self.enqueue(next.clone());
                Selection::Moved { to: next.clone() }
            }
            None => {
                debug!("Option '{}' keeps the dialogue on '{}'", option.id, node.id);
                Selection::Stayed
            }
        }
    }

    /// Return to the semantic parent of the question being left. With no
    /// history the dialogue goes to the root.
    pub fn go_back(&mut self) -> Selection {
        if self.is_awaiting_render() {
            debug!("Ignoring back while a message is being rendered");
            return Selection::Ignored;
        }

        let registry = self.registry;
        let leaving = registry.get(&self.current_question_id);
        let target = match self.history.pop() {
            Some(entry) => {
                debug!(
                    "Back from '{}' (entered via '{}' on '{}')",
                    leaving.id, entry.option_id, entry.question_id
                );
                leaving.back_target.clone()
            }
            None => ROOT_ID.to_string(),
        };

        info!("Back: {} -> {}", leaving.id, target);
        self.current_question_id = target.clone();
        self.enqueue(target.clone());
        Selection::Moved { to: target }
    }

    pub fn reset(&mut self) {
        info!("Dialogue reset");
        self.transcript.clear();
        self.history.clear();
        self.outbox.clear();
        self.pending = None;
        self.current_question_id = ROOT_ID.into();
        self.open();
    }

    /// Render the queued bot message, if any, into the transcript.
    pub fn render_pending(&mut self) -> Option<&TranscriptEntry> {
        let id = self.pending.take()?;
        let node = self.registry.get(&id);
        let text = render_or_fallback(&node.id, &node.message, &self.session);
        self.transcript.push(TranscriptEntry::new(Speaker::Bot, text));
        self.transcript.last()
    }

    /// Host pushes refreshed data between renders.
    pub fn update_session(&mut self, fresh: SessionData) {
        debug!("Session data refreshed");
        self.session.refresh(fresh);
    }

    /// Options the user may pick right now. Empty while a bot message is
    /// still pending.
    pub fn offered_options(&self) -> Vec<&'r OptionNode> {
        if self.is_awaiting_render() {
            return Vec::new();
        }
        let registry: &'r Registry = self.registry;
        filter_options(registry.get(&self.current_question_id), &self.session)
    }

    /// Drain the host commands raised since the last call.
    pub fn take_commands(&mut self) -> Vec<HostCommand> {
        std::mem::take(&mut self.outbox)
    }

    pub fn current_question_id(&self) -> &str {
        &self.current_question_id
    }

    pub fn current_question(&self) -> &'r QuestionNode {
        let registry: &'r Registry = self.registry;
        registry.get(&self.current_question_id)
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn session(&self) -> &SessionData {
        &self.session
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_awaiting_render(&self) -> bool {
        self.pending.is_some()
    }

    fn run_action(&mut self, name: &str) {
        let dispatch = self.dispatcher.dispatch(name, &self.session);
        if dispatch.is_empty() {
            return;
        }
        if !dispatch.patch.is_empty() {
            debug!(
                "Merging {} field(s) from '{name}': {:?}",
                dispatch.patch.fields().len(),
                dispatch.patch
            );
            self.session.merge(dispatch.patch);
        }
        if let Some(command) = dispatch.command {
            info!("Host command from '{name}': {command:?}");
            self.outbox.push(command);
        }
    }

    fn enqueue(&mut self, question_id: String) {
        self.pending = Some(question_id);
        if self.config.auto_render {
            self.render_pending();
        }
    }
}
