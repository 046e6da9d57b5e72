//! The Engine: unified API for Commgate.
//!
//! The Engine brings together the principal directory, rule store, message
//! log, and the policy components into one interface for the collaborators
//! around it: messaging asks it whether a send may pass, recipient search
//! asks it who is reachable, and administration manages rules through
//! [`RuleLifecycle`].

use std::collections::HashSet;
use std::sync::Arc;

use commgate_core::{
    DeliveryStatus, GroupId, MessageRecord, NewMessage, Page, Principal, PrincipalId,
};
use commgate_policy::{authorize, authorize_self, Decision, Evaluator, Operation, Resolver};
use commgate_store::Store;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::lifecycle::RuleLifecycle;

/// Filters for searching reachable recipients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientSearch {
    /// Case-insensitive substring of name or email.
    pub text: Option<String>,
    pub group: Option<GroupId>,
    pub page: Option<Page>,
}

impl RecipientSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn group(mut self, group: GroupId) -> Self {
        self.group = Some(group);
        self
    }

    pub fn page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    fn matches(&self, principal: &Principal) -> bool {
        let text = self.text.as_deref().filter(|t| !t.trim().is_empty());
        text.map_or(true, |t| principal.matches_text(t.trim()))
            && self.group.map_or(true, |g| principal.group_id == g)
    }
}

/// The main Engine struct.
///
/// Holds no rule state of its own; every call reads current rows from the
/// store, which is how rule expiry takes effect without a sweeper.
pub struct Engine<S: Store> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S: Store> Engine<S> {
    /// Create a new engine over `store`.
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Rule administration.
    pub fn lifecycle(&self) -> RuleLifecycle<'_, S> {
        RuleLifecycle::new(self.store.as_ref(), &self.config)
    }

    fn evaluator(&self) -> Evaluator<'_, S, S> {
        Evaluator::new(self.store.as_ref(), self.store.as_ref())
    }

    fn resolver(&self) -> Resolver<'_, S, S> {
        Resolver::new(self.store.as_ref(), self.store.as_ref())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Evaluation
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `sender` may message `receiver` at `now`.
    ///
    /// A denial is a successful result with `allowed == false`.
    pub async fn evaluate(
        &self,
        sender: PrincipalId,
        receiver: PrincipalId,
        now: i64,
    ) -> Result<Decision> {
        Ok(self.evaluator().evaluate(sender, receiver, now).await?)
    }

    /// [`evaluate`](Self::evaluate) on behalf of `actor`, who may only ask
    /// about their own sends.
    pub async fn evaluate_as(
        &self,
        actor: &Principal,
        sender: PrincipalId,
        receiver: PrincipalId,
        now: i64,
    ) -> Result<Decision> {
        authorize(actor, Operation::Evaluate)?;
        authorize_self(actor, sender)?;
        self.evaluate(sender, receiver, now).await
    }

    /// Every principal `sender` may message at `now`, excluding the sender.
    pub async fn communicable(&self, sender: PrincipalId, now: i64) -> Result<HashSet<PrincipalId>> {
        Ok(self.resolver().communicable(sender, now).await?)
    }

    /// [`communicable`](Self::communicable) on behalf of `actor`, scoped to
    /// their own reachability.
    pub async fn communicable_as(
        &self,
        actor: &Principal,
        sender: PrincipalId,
        now: i64,
    ) -> Result<HashSet<PrincipalId>> {
        authorize(actor, Operation::Communicable)?;
        authorize_self(actor, sender)?;
        self.communicable(sender, now).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Messaging
    // ─────────────────────────────────────────────────────────────────────────

    /// Attempt a send from `actor` to `receiver` and record the outcome.
    ///
    /// A blocked message is still recorded and returned; its `reason` says
    /// why.
    ///
    /// # Returns
    /// - The recorded message, sent or blocked.
    /// - `NotFound` if the receiver does not exist.
    /// - `InvalidArgument` if `actor` is the receiver.
    pub async fn send_message(
        &self,
        actor: &Principal,
        receiver: PrincipalId,
        subject: Option<String>,
        body: impl Into<String>,
        now: i64,
    ) -> Result<MessageRecord> {
        authorize(actor, Operation::SendMessage)?;

        let receiver = self
            .store
            .get_principal(receiver)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("receiver {}", receiver)))?;

        if receiver.id == actor.id {
            return Err(EngineError::InvalidArgument(
                "cannot send a message to yourself".into(),
            ));
        }

        let decision = self
            .evaluator()
            .evaluate_principals(actor, &receiver, now)
            .await?;

        let (status, reason) = if decision.allowed {
            (DeliveryStatus::Sent, None)
        } else {
            (DeliveryStatus::Blocked, Some(decision.reason.to_string()))
        };

        let record = self
            .store
            .record_message(NewMessage {
                sender_id: actor.id,
                receiver_id: receiver.id,
                subject,
                body: body.into(),
                status,
                reason,
                sent_at: now,
            })
            .await?;

        tracing::info!(
            message = %record.id,
            sender = %actor.id,
            receiver = %receiver.id,
            status = %record.status,
            "dispatched message"
        );
        Ok(record)
    }

    /// Messages `actor` has sent, newest first.
    pub async fn sent_messages(
        &self,
        actor: &Principal,
        page: Option<Page>,
    ) -> Result<Vec<MessageRecord>> {
        authorize(actor, Operation::ReadMessages)?;
        Ok(self.store.list_sent(actor.id, self.config.page(page)).await?)
    }

    /// Messages addressed to `actor`, newest first.
    pub async fn received_messages(
        &self,
        actor: &Principal,
        page: Option<Page>,
    ) -> Result<Vec<MessageRecord>> {
        authorize(actor, Operation::ReadMessages)?;
        Ok(self
            .store
            .list_received(actor.id, self.config.page(page))
            .await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Recipient search
    // ─────────────────────────────────────────────────────────────────────────

    /// Principals `actor` may message at `now` that match `search`, ordered
    /// by id.
    pub async fn search_recipients(
        &self,
        actor: &Principal,
        search: &RecipientSearch,
        now: i64,
    ) -> Result<Vec<Principal>> {
        authorize(actor, Operation::SearchRecipients)?;

        let reachable = self.resolver().communicable_principals(actor.id, now).await?;
        let page = self.config.page(search.page);
        Ok(page.apply(reachable.into_iter().filter(|p| search.matches(p))))
    }
}

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
