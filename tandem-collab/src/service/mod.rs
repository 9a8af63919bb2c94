//! Client-side synchronization service.
//!
//! A [`Service`] owns one replica of a document:
//!
//! ```text
//!   server_text ──submitted──► (in flight) ──local──► view_text
//!        ▲                                               │
//!        └── acknowledged / external records     typing, undo, redo
//! ```
//!
//! Each public operation runs a pure transition over the current
//! [`ServiceState`] snapshot, swaps in the result, bumps the state version
//! and then emits the produced [`ServiceEvent`]s.

pub mod history;
pub mod queue;
pub mod snapshot;
pub mod state;
pub mod view_log;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tandem_core::{Changeset, Selection};

use crate::config::ServiceConfig;
use crate::error::{CollabError, Result};
use crate::events::{Event, EventBus, SubscriptionId};
use crate::facade::ServerFacade;
use crate::record::{AuthorId, HeadRecord, LocalRecord, Revision, ServerRecord, SubmittedRecord};

pub use history::{HistoryEntry, HistoryMode, ViewEntry};
pub use snapshot::{ServiceSnapshot, SCHEMA_VERSION};
pub use state::ServiceState;

use state::{Context, Direction, Transition};

/// Notifications from a [`Service`], delivered after the state they
/// describe is in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    Reset { revision: Revision },
    /// The view text changed by `changeset`.
    ViewChanged { changeset: Changeset },
    SelectionChanged(Selection),
    LocalChanged { have_local: bool },
    SubmittedChanges(SubmittedRecord),
    ChangesAcknowledged { revision: Revision },
    ServerRevisionChanged { revision: Revision },
    /// The gap of missing revisions, `None` once closed.
    MissingRevisions(Option<(Revision, Revision)>),
    HistoryChanged { can_undo: bool, can_redo: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceEventKind {
    Reset,
    ViewChanged,
    SelectionChanged,
    LocalChanged,
    SubmittedChanges,
    ChangesAcknowledged,
    ServerRevisionChanged,
    MissingRevisions,
    HistoryChanged,
}

impl Event for ServiceEvent {
    type Kind = ServiceEventKind;

    fn kind(&self) -> ServiceEventKind {
        match self {
            ServiceEvent::Reset { .. } => ServiceEventKind::Reset,
            ServiceEvent::ViewChanged { .. } => ServiceEventKind::ViewChanged,
            ServiceEvent::SelectionChanged(_) => ServiceEventKind::SelectionChanged,
            ServiceEvent::LocalChanged { .. } => ServiceEventKind::LocalChanged,
            ServiceEvent::SubmittedChanges(_) => ServiceEventKind::SubmittedChanges,
            ServiceEvent::ChangesAcknowledged { .. } => ServiceEventKind::ChangesAcknowledged,
            ServiceEvent::ServerRevisionChanged { .. } => ServiceEventKind::ServerRevisionChanged,
            ServiceEvent::MissingRevisions(_) => ServiceEventKind::MissingRevisions,
            ServiceEvent::HistoryChanged { .. } => ServiceEventKind::HistoryChanged,
        }
    }
}

/// Derived flags, cached per state version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedState {
    pub version: u64,
    pub have_local: bool,
    pub have_submitted: bool,
    pub can_submit_changes: bool,
    pub can_undo: bool,
    pub can_redo: bool,
    pub history_size: usize,
    pub view_length: usize,
    pub missing_revisions: Option<(Revision, Revision)>,
}

type HistoryPredicate = Box<dyn Fn(&ServerRecord) -> bool + Send + Sync>;

pub struct Service {
    author_id: AuthorId,
    config: ServiceConfig,
    state: Arc<ServiceState>,
    version: u64,
    computed: Mutex<Option<Arc<ComputedState>>>,
    events: EventBus<ServiceEvent>,
    facade: Option<Arc<dyn ServerFacade>>,
    is_history: HistoryPredicate,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("author_id", &self.author_id)
            .field("version", &self.version)
            .field("state", &self.state)
            .field("facade", &self.facade.is_some())
            .finish()
    }
}

impl Service {
    /// A replica of an empty document at revision 0.
    pub fn new(author_id: AuthorId, config: ServiceConfig) -> Self {
        Self::from_state(author_id, config, ServiceState::default())
    }

    /// A replica resuming from `head`.
    pub fn with_head(author_id: AuthorId, config: ServiceConfig, head: &HeadRecord) -> Self {
        let mut service = Self::new(author_id, config);
        service.reset(head);
        service
    }

    fn from_state(author_id: AuthorId, config: ServiceConfig, state: ServiceState) -> Self {
        Self {
            author_id,
            config,
            state: Arc::new(state),
            version: 0,
            computed: Mutex::new(None),
            events: EventBus::new(),
            facade: None,
            is_history: Box::new(move |record| record.author_id == author_id),
        }
    }

    /// Replaces the default "same author" test deciding which external
    /// records become undo entries.
    pub fn with_history_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ServerRecord) -> bool + Send + Sync + 'static,
    {
        self.is_history = Box::new(predicate);
        self
    }

    pub fn attach_facade(&mut self, facade: Arc<dyn ServerFacade>) {
        self.facade = Some(facade);
    }

    pub fn author_id(&self) -> AuthorId {
        self.author_id
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn state(&self) -> &ServiceState {
        &self.state
    }

    /// The current immutable snapshot.
    pub fn snapshot(&self) -> Arc<ServiceState> {
        Arc::clone(&self.state)
    }

    /// Bumped on every state change.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn view_text(&self) -> &str {
        self.state.view_text()
    }

    pub fn selection(&self) -> Selection {
        self.state.selection()
    }

    pub fn server_revision(&self) -> Revision {
        self.state.server_revision()
    }

    pub fn server_text(&self) -> &str {
        self.state.server_text()
    }

    pub fn submitted(&self) -> Option<&SubmittedRecord> {
        self.state.submitted()
    }

    pub fn local(&self) -> Option<&LocalRecord> {
        self.state.local()
    }

    pub fn have_local(&self) -> bool {
        self.state.local().is_some()
    }

    pub fn have_submitted(&self) -> bool {
        self.state.submitted().is_some()
    }

    pub fn can_submit_changes(&self) -> bool {
        self.state.can_submit_changes()
    }

    pub fn can_undo(&self) -> bool {
        !self.state.undo_stack().is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.state.redo_stack().is_empty()
    }

    pub fn history_size(&self) -> usize {
        self.state.history_size()
    }

    /// Revisions `[start, end)` that must arrive before buffered ones apply.
    pub fn missing_revisions(&self) -> Option<(Revision, Revision)> {
        self.state.missing_revisions()
    }

    pub fn computed(&self) -> Arc<ComputedState> {
        let mut cached = self.computed.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(computed) = cached.as_ref().filter(|c| c.version == self.version) {
            return Arc::clone(computed);
        }
        let state = &self.state;
        let computed = Arc::new(ComputedState {
            version: self.version,
            have_local: state.local().is_some(),
            have_submitted: state.submitted().is_some(),
            can_submit_changes: state.can_submit_changes(),
            can_undo: !state.undo_stack().is_empty(),
            can_redo: !state.redo_stack().is_empty(),
            history_size: state.history_size(),
            view_length: tandem_core::text::char_len(state.view_text()),
            missing_revisions: state.missing_revisions(),
        });
        *cached = Some(Arc::clone(&computed));
        computed
    }

    // ─── Events ─────────────────────────────────────────────────

    pub fn subscribe<F>(&self, kind: ServiceEventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ServiceEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(kind, handler)
    }

    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ServiceEvent) + Send + Sync + 'static,
    {
        self.events.subscribe_all(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    fn context(&self) -> Context<'_> {
        Context {
            author_id: self.author_id,
            config: &self.config,
            is_history: &*self.is_history,
            facade: self.facade.as_deref(),
        }
    }

    fn commit(&mut self, transition: Transition) {
        let Transition { state, events } = transition;
        if events.is_empty() && state == *self.state {
            return;
        }
        self.state = Arc::new(state);
        self.version += 1;
        for event in events {
            self.events.emit(event);
        }
    }

    // ─── Operations ─────────────────────────────────────────────

    /// Applies a local edit over the current view text.
    ///
    /// `selection` is the caret after the edit; when `None` the current one
    /// follows the edit.
    pub fn add_local_typing(
        &mut self,
        typing: &Changeset,
        selection: Option<Selection>,
        mode: HistoryMode,
    ) -> Result<()> {
        let transition = self
            .state
            .add_local_typing(&self.context(), typing, selection, mode)?;
        self.commit(transition);
        Ok(())
    }

    pub fn set_selection(&mut self, selection: Selection) {
        let transition = self.state.set_selection(selection);
        self.commit(transition);
    }

    /// Moves the local changes in flight. Returns `None` when something is
    /// already in flight or there is nothing to send.
    pub fn submit_changes(&mut self) -> Option<SubmittedRecord> {
        let (transition, submitted) = self.state.submit_changes()?;
        self.commit(transition);
        Some(submitted)
    }

    /// Handles a record broadcast by the server.
    pub fn add_external_typing(&mut self, record: &ServerRecord) -> Result<()> {
        let transition = self.state.receive(&self.context(), record, false)?;
        self.commit(transition);
        Ok(())
    }

    /// Handles the server's answer to this replica's submission.
    pub fn submitted_changes_acknowledged(&mut self, record: &ServerRecord) -> Result<()> {
        let transition = self.state.receive(&self.context(), record, true)?;
        self.commit(transition);
        Ok(())
    }

    /// Returns whether anything was undone.
    pub fn undo(&mut self) -> Result<bool> {
        let (transition, applied) = self.state.step_history(&self.context(), Direction::Undo)?;
        self.commit(transition);
        Ok(applied)
    }

    /// Returns whether anything was redone.
    pub fn redo(&mut self) -> Result<bool> {
        let (transition, applied) = self.state.step_history(&self.context(), Direction::Redo)?;
        self.commit(transition);
        Ok(applied)
    }

    pub fn reset(&mut self, head: &HeadRecord) {
        let transition = self.state.reset(&self.context(), head);
        self.commit(transition);
    }

    /// Feeds every record between the server revision and the facade's
    /// head through [`add_external_typing`](Self::add_external_typing).
    /// Returns the number of records applied.
    pub fn catch_up_to_server(&mut self) -> Result<usize> {
        let facade = self
            .facade
            .clone()
            .ok_or_else(|| CollabError::invalid_state("no server facade attached"))?;

        let head = facade.head();
        let from = self.server_revision() + 1;
        if head.revision < from {
            return Ok(0);
        }
        let records = facade.range(from, head.revision + 1)?;
        for record in &records {
            self.add_external_typing(record)?;
        }
        log::debug!("caught up {} record(s) to revision {}", records.len(), head.revision);
        Ok(records.len())
    }

    // ─── View log ───────────────────────────────────────────────

    /// Index of the current view text in the view log.
    pub fn view_log_index(&self) -> usize {
        self.state.view_log().end()
    }

    /// View text at an earlier log index, if still reconstructable.
    pub fn view_text_at(&self, index: usize) -> Result<Option<String>> {
        self.state.view_log().text_at(index, self.state.view_text())
    }

    /// Everything that changed in the view since `index`, composed.
    pub fn view_changes_since(&self, index: usize) -> Result<Option<Changeset>> {
        self.state.view_log().changes_since(index)
    }

    // ─── Persistence ────────────────────────────────────────────

    pub fn serialize(&self) -> Result<String> {
        ServiceSnapshot::capture(&self.state).to_json()
    }

    pub fn deserialize(author_id: AuthorId, config: ServiceConfig, json: &str) -> Result<Self> {
        let state = ServiceSnapshot::from_json(json)?.restore()?;
        Ok(Self::from_state(author_id, config, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::DocumentRecords;
    use uuid::Uuid;

    fn service() -> Service {
        Service::new(Uuid::new_v4(), ServiceConfig::default())
    }

    fn type_at(service: &mut Service, position: usize, text: &str) {
        let len = tandem_core::text::char_len(service.view_text());
        let typing = Changeset::insertion(len, position, text).unwrap();
        service
            .add_local_typing(&typing, None, HistoryMode::Yes)
            .unwrap();
    }

    /// Reconciles the in-flight submission of `service` and acknowledges it.
    fn round_trip(service: &mut Service, records: &mut DocumentRecords) -> Arc<ServerRecord> {
        let submitted = service.submit_changes().unwrap();
        let outcome = records.reconcile(service.author_id(), &submitted).unwrap();
        let record = Arc::clone(outcome.record());
        service.submitted_changes_acknowledged(&record).unwrap();
        record
    }

    fn external(records: &mut DocumentRecords, position: usize, text: &str) -> Arc<ServerRecord> {
        let head = records.head().clone();
        let len = tandem_core::text::char_len(&head.text);
        let submitted = SubmittedRecord::new(
            head.revision,
            Changeset::insertion(len, position, text).unwrap(),
            Selection::caret(position + tandem_core::text::char_len(text)),
            Selection::caret(position),
        );
        Arc::clone(records.reconcile(Uuid::new_v4(), &submitted).unwrap().record())
    }

    #[test]
    fn test_local_typing_updates_view_and_selection() {
        let mut s = service();
        type_at(&mut s, 0, "hello");

        assert_eq!(s.view_text(), "hello");
        assert_eq!(s.selection(), Selection::caret(5));
        assert!(s.have_local());
        assert!(s.can_submit_changes());
        assert!(s.can_undo());
    }

    #[test]
    fn test_typing_without_visible_change_is_discarded() {
        let mut s = service();
        type_at(&mut s, 0, "ab");
        let version = s.version();

        let replace_same = Changeset::replacement(2, 0, 1, "a").unwrap();
        s.add_local_typing(&replace_same, None, HistoryMode::Yes)
            .unwrap();

        assert_eq!(s.version(), version);
        assert_eq!(s.state().undo_stack().len(), 1);
    }

    #[test]
    fn test_local_dropped_when_it_cancels_out() {
        let mut s = service();
        type_at(&mut s, 0, "x");
        let delete = Changeset::deletion(1, 0, 1).unwrap();
        s.add_local_typing(&delete, None, HistoryMode::No).unwrap();

        assert_eq!(s.view_text(), "");
        assert!(!s.have_local());
        assert!(!s.can_submit_changes());
    }

    #[test]
    fn test_one_submission_in_flight() {
        let mut s = service();
        type_at(&mut s, 0, "a");
        let submitted = s.submit_changes().unwrap();
        assert_eq!(submitted.target_revision, 0);

        type_at(&mut s, 1, "b");
        assert!(s.have_local());
        assert!(s.submit_changes().is_none());
    }

    #[test]
    fn test_acknowledge_advances_server() {
        let mut s = service();
        let mut records = DocumentRecords::new();
        type_at(&mut s, 0, "foo");
        round_trip(&mut s, &mut records);

        assert_eq!(s.server_revision(), 1);
        assert_eq!(s.server_text(), "foo");
        assert!(!s.have_submitted());
        assert_eq!(s.view_text(), "foo");
    }

    #[test]
    fn test_external_rebases_pending_layers() {
        let mut s = service();
        let mut records = DocumentRecords::new();
        type_at(&mut s, 0, "ab");
        round_trip(&mut s, &mut records);

        type_at(&mut s, 2, "S");
        s.submit_changes().unwrap();
        type_at(&mut s, 3, "L");

        let record = external(&mut records, 0, "E");
        s.add_external_typing(&record).unwrap();

        assert_eq!(s.server_text(), "Eab");
        assert_eq!(s.view_text(), "EabSL");
        assert_eq!(s.selection(), Selection::caret(5));
    }

    #[test]
    fn test_external_tie_goes_before_pending_insert() {
        let mut s = service();
        let mut records = DocumentRecords::new();
        type_at(&mut s, 0, "ab");
        round_trip(&mut s, &mut records);

        type_at(&mut s, 1, "L");
        let record = external(&mut records, 1, "E");
        s.add_external_typing(&record).unwrap();

        assert_eq!(s.view_text(), "aELb");
    }

    #[test]
    fn test_ack_by_matching_external() {
        let mut s = service();
        let mut records = DocumentRecords::new();
        type_at(&mut s, 0, "x");
        let submitted = s.submit_changes().unwrap();
        let outcome = records.reconcile(s.author_id(), &submitted).unwrap();

        s.add_external_typing(outcome.record()).unwrap();
        assert!(!s.have_submitted());
        assert_eq!(s.server_text(), "x");
        assert_eq!(s.view_text(), "x");
    }

    #[test]
    fn test_unexpected_ack_is_invalid_state() {
        let mut s = service();
        let mut records = DocumentRecords::new();
        let record = external(&mut records, 0, "x");

        let err = s.submitted_changes_acknowledged(&record).unwrap_err();
        assert!(matches!(err, CollabError::InvalidState(_)));
        assert_eq!(s.server_revision(), 0);
    }

    #[test]
    fn test_out_of_order_records_wait_for_gap() {
        let mut s = service();
        let mut records = DocumentRecords::new();
        let first = external(&mut records, 0, "a");
        let second = external(&mut records, 1, "b");
        let third = external(&mut records, 2, "c");

        s.add_external_typing(&third).unwrap();
        s.add_external_typing(&second).unwrap();
        assert_eq!(s.missing_revisions(), Some((1, 2)));
        assert_eq!(s.view_text(), "");

        s.add_external_typing(&first).unwrap();
        assert_eq!(s.missing_revisions(), None);
        assert_eq!(s.view_text(), "abc");
        assert_eq!(s.server_revision(), 3);

        // Stale redelivery is ignored.
        let version = s.version();
        s.add_external_typing(&second).unwrap();
        assert_eq!(s.version(), version);
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut s = service();
        type_at(&mut s, 0, "hello");
        type_at(&mut s, 5, " world");

        assert!(s.undo().unwrap());
        assert_eq!(s.view_text(), "hello");
        assert_eq!(s.selection(), Selection::caret(5));

        assert!(s.redo().unwrap());
        assert_eq!(s.view_text(), "hello world");
        assert_eq!(s.selection(), Selection::caret(11));

        assert!(s.undo().unwrap());
        assert!(s.undo().unwrap());
        assert_eq!(s.view_text(), "");
        assert!(!s.undo().unwrap());
    }

    #[test]
    fn test_new_typing_clears_redo() {
        let mut s = service();
        type_at(&mut s, 0, "a");
        s.undo().unwrap();
        assert!(s.can_redo());

        type_at(&mut s, 0, "b");
        assert!(!s.can_redo());
    }

    #[test]
    fn test_undo_keeps_external_changes() {
        let mut s = service();
        let mut records = DocumentRecords::new();
        type_at(&mut s, 0, "ab");
        round_trip(&mut s, &mut records);

        type_at(&mut s, 1, "X");
        let record = external(&mut records, 2, "!");
        s.add_external_typing(&record).unwrap();
        assert_eq!(s.view_text(), "aXb!");

        s.undo().unwrap();
        assert_eq!(s.view_text(), "ab!");
        s.redo().unwrap();
        assert_eq!(s.view_text(), "aXb!");
    }

    #[test]
    fn test_merge_folds_into_previous_entry() {
        let mut s = service();
        type_at(&mut s, 0, "a");
        let typing = Changeset::insertion(1, 1, "b").unwrap();
        s.add_local_typing(&typing, None, HistoryMode::Merge)
            .unwrap();

        assert_eq!(s.state().undo_stack().len(), 1);
        s.undo().unwrap();
        assert_eq!(s.view_text(), "");
    }

    #[test]
    fn test_merge_across_external_change() {
        let mut s = service();
        let mut records = DocumentRecords::new();
        type_at(&mut s, 0, "ab");
        round_trip(&mut s, &mut records);

        type_at(&mut s, 0, "X");
        let record = external(&mut records, 2, "E");
        s.add_external_typing(&record).unwrap();
        assert_eq!(s.view_text(), "XaEb");

        let typing = Changeset::insertion(4, 1, "Y").unwrap();
        s.add_local_typing(&typing, None, HistoryMode::Merge)
            .unwrap();
        assert_eq!(s.view_text(), "XYaEb");
        assert_eq!(s.state().undo_stack().len(), 1);

        s.undo().unwrap();
        assert_eq!(s.view_text(), "aEb");
    }

    #[test]
    fn test_no_history_edit_is_not_undone() {
        let mut s = service();
        type_at(&mut s, 0, "ab");
        let typing = Changeset::insertion(2, 2, "!").unwrap();
        s.add_local_typing(&typing, None, HistoryMode::No).unwrap();

        s.undo().unwrap();
        assert_eq!(s.view_text(), "!");
        assert!(!s.can_undo());
    }

    #[test]
    fn test_entry_that_became_no_op_is_skipped() {
        let mut s = service();
        type_at(&mut s, 0, "a");
        type_at(&mut s, 1, "b");
        // Delete "b" outside history: the second entry no longer changes anything.
        let delete = Changeset::deletion(2, 1, 2).unwrap();
        s.add_local_typing(&delete, None, HistoryMode::No).unwrap();
        assert_eq!(s.selection(), Selection::caret(1));

        assert!(s.undo().unwrap());
        assert_eq!(s.view_text(), "");
        assert!(!s.can_undo());
        assert_eq!(s.selection(), Selection::caret(0));

        assert!(s.redo().unwrap());
        assert_eq!(s.view_text(), "a");
        assert_eq!(s.selection(), Selection::caret(1));
    }

    #[test]
    fn test_history_size_is_bounded() {
        let config = ServiceConfig {
            history_size_limit: 5,
            array_cleanup_threshold: 3,
            ..ServiceConfig::default()
        };
        let mut s = Service::new(Uuid::new_v4(), config);
        for i in 0..40 {
            type_at(&mut s, i, "x");
            assert!(s.history_size() <= 8);
        }
        assert!(s.history_size() >= 5);
    }

    #[test]
    fn test_view_log_is_bounded() {
        let config = ServiceConfig {
            view_log_limit: 4,
            array_cleanup_threshold: 2,
            history_size_limit: 2,
            ..ServiceConfig::default()
        };
        let mut s = Service::new(Uuid::new_v4(), config);
        for i in 0..30 {
            type_at(&mut s, i, "x");
            assert!(s.state().view_log().len() <= 6);
        }
        let index = s.view_log_index();
        assert_eq!(s.view_text_at(index - 2).unwrap().unwrap(), "x".repeat(28));
        assert!(s.view_text_at(0).unwrap().is_none());
    }

    #[test]
    fn test_events_follow_commit() {
        let mut s = service();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        s.subscribe_all(move |e| sink.lock().unwrap().push(e.kind()));

        type_at(&mut s, 0, "a");
        s.submit_changes().unwrap();

        let kinds = seen.lock().unwrap().clone();
        assert_eq!(
            kinds,
            vec![
                ServiceEventKind::ViewChanged,
                ServiceEventKind::SelectionChanged,
                ServiceEventKind::LocalChanged,
                ServiceEventKind::HistoryChanged,
                ServiceEventKind::SubmittedChanges,
                ServiceEventKind::LocalChanged,
            ]
        );
    }

    #[test]
    fn test_computed_is_cached_per_version() {
        let mut s = service();
        let first = s.computed();
        assert!(Arc::ptr_eq(&first, &s.computed()));

        type_at(&mut s, 0, "a");
        let second = s.computed();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.have_local);
        assert_eq!(second.view_length, 1);
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut s = service();
        let mut records = DocumentRecords::new();
        type_at(&mut s, 0, "abc");
        round_trip(&mut s, &mut records);
        type_at(&mut s, 3, "d");
        s.submit_changes().unwrap();
        type_at(&mut s, 4, "e");

        let json = s.serialize().unwrap();
        let mut restored =
            Service::deserialize(s.author_id(), ServiceConfig::default(), &json).unwrap();

        assert_eq!(restored.view_text(), "abcde");
        assert_eq!(restored.submitted(), s.submitted());
        assert_eq!(restored.server_revision(), 1);

        assert!(restored.undo().unwrap());
        assert_eq!(restored.view_text(), "abcd");
    }

    #[test]
    fn test_catch_up_requires_facade() {
        let mut s = service();
        assert!(matches!(
            s.catch_up_to_server(),
            Err(CollabError::InvalidState(_))
        ));
    }

    #[test]
    fn test_reset_discards_everything() {
        let mut s = service();
        type_at(&mut s, 0, "local");
        s.reset(&HeadRecord::new(9, "remote"));

        assert_eq!(s.server_revision(), 9);
        assert_eq!(s.view_text(), "remote");
        assert!(!s.have_local());
        assert!(!s.can_undo());
    }

    #[test]
    fn test_undo_server_history_through_pointer() {
        let author = Uuid::new_v4();
        let mut records = DocumentRecords::new();
        for text in ["one", " two"] {
            let head = records.head().clone();
            let len = tandem_core::text::char_len(&head.text);
            let submitted = SubmittedRecord::new(
                head.revision,
                Changeset::insertion(len, len, text).unwrap(),
                Selection::caret(len + tandem_core::text::char_len(text)),
                Selection::caret(len),
            );
            records.reconcile(author, &submitted).unwrap();
        }
        let head = records.head().clone();

        let config = ServiceConfig {
            undo_server_history: true,
            ..ServiceConfig::default()
        };
        let mut s = Service::with_head(author, config, &head);
        s.attach_facade(Arc::new(records));
        assert!(s.can_undo());

        assert!(s.undo().unwrap());
        assert_eq!(s.view_text(), "one");
        assert_eq!(s.selection(), Selection::caret(3));

        assert!(s.undo().unwrap());
        assert_eq!(s.view_text(), "");
        assert!(!s.can_undo());

        assert!(s.redo().unwrap());
        assert_eq!(s.view_text(), "one");
    }
}
