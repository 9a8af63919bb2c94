//! Replica state and its pure transitions.
//!
//! Every transition borrows the current [`ServiceState`], clones it, and
//! returns the next state with the events it produced. A failed
//! transition returns an error and the caller keeps the old snapshot.
//!
//! Tie-break convention: changes already applied on the server win
//! insertion ties. Incoming edits are rebased with `follow(.., true)` past
//! the submitted and local layers, which follow them with `false`, as the
//! server does when it rebases a submission.

use std::iter;

use tandem_core::text::char_len;
use tandem_core::{Bias, Changeset, Selection};

use super::history::{
    annotate_top, cleanup, drop_unreachable_pointers, extend_top, history_size, min_log_index,
    release_log_indexes, HistoryEntry, HistoryMode, ViewEntry,
};
use super::queue::{Incoming, MessageQueue};
use super::view_log::ViewLog;
use super::ServiceEvent;
use crate::config::ServiceConfig;
use crate::error::{CollabError, Result};
use crate::facade::ServerFacade;
use crate::record::{
    AuthorId, HeadRecord, LocalRecord, Revision, ServerRecord, SubmittedRecord,
};

/// Everything a transition may consult besides the state itself.
pub(crate) struct Context<'a> {
    pub author_id: AuthorId,
    pub config: &'a ServiceConfig,
    pub is_history: &'a (dyn Fn(&ServerRecord) -> bool + Send + Sync),
    pub facade: Option<&'a dyn ServerFacade>,
}

pub(crate) struct Transition {
    pub state: ServiceState,
    pub events: Vec<ServiceEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Undo,
    Redo,
}

/// One replica of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceState {
    pub(crate) server_revision: Revision,
    pub(crate) server_text: String,
    pub(crate) submitted: Option<SubmittedRecord>,
    pub(crate) local: Option<LocalRecord>,
    pub(crate) view_text: String,
    pub(crate) selection: Selection,
    pub(crate) view_log: ViewLog,
    pub(crate) undo_stack: Vec<HistoryEntry>,
    pub(crate) redo_stack: Vec<HistoryEntry>,
    pub(crate) queue: MessageQueue,
    pub(crate) missing: Option<(Revision, Revision)>,
}

impl Default for ServiceState {
    fn default() -> Self {
        Self::from_head(&HeadRecord::default())
    }
}

impl ServiceState {
    pub fn from_head(head: &HeadRecord) -> Self {
        Self {
            server_revision: head.revision,
            server_text: head.text.clone(),
            submitted: None,
            local: None,
            view_text: head.text.clone(),
            selection: Selection::caret(0),
            view_log: ViewLog::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            queue: MessageQueue::default(),
            missing: None,
        }
    }

    pub fn server_revision(&self) -> Revision {
        self.server_revision
    }

    pub fn server_text(&self) -> &str {
        &self.server_text
    }

    pub fn submitted(&self) -> Option<&SubmittedRecord> {
        self.submitted.as_ref()
    }

    pub fn local(&self) -> Option<&LocalRecord> {
        self.local.as_ref()
    }

    /// `server_text` with the submitted and local changes applied.
    pub fn view_text(&self) -> &str {
        &self.view_text
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn undo_stack(&self) -> &[HistoryEntry] {
        &self.undo_stack
    }

    pub fn redo_stack(&self) -> &[HistoryEntry] {
        &self.redo_stack
    }

    pub fn view_log(&self) -> &ViewLog {
        &self.view_log
    }

    pub fn missing_revisions(&self) -> Option<(Revision, Revision)> {
        self.missing
    }

    pub fn queued_messages(&self) -> usize {
        self.queue.len()
    }

    pub fn can_submit_changes(&self) -> bool {
        self.submitted.is_none() && self.local.is_some()
    }

    /// The larger of the two stacks' history sizes.
    pub fn history_size(&self) -> usize {
        history_size(&self.undo_stack).max(history_size(&self.redo_stack))
    }

    fn submitted_text(&self) -> Result<String> {
        match &self.submitted {
            Some(submitted) => Ok(submitted.changeset.apply(&self.server_text)?),
            None => Ok(self.server_text.clone()),
        }
    }

    fn stack_mut(&mut self, direction: Direction) -> &mut Vec<HistoryEntry> {
        match direction {
            Direction::Undo => &mut self.undo_stack,
            Direction::Redo => &mut self.redo_stack,
        }
    }

    fn unchanged(&self) -> Transition {
        Transition {
            state: self.clone(),
            events: Vec::new(),
        }
    }

    // ─── Local edits ────────────────────────────────────────────

    pub(crate) fn add_local_typing(
        &self,
        ctx: &Context<'_>,
        typing: &Changeset,
        selection: Option<Selection>,
        mode: HistoryMode,
    ) -> Result<Transition> {
        let view_after = typing.apply(&self.view_text)?;
        let length = typing.output_length();

        if view_after == self.view_text {
            log::debug!("discarding local typing without visible change");
            return Ok(match selection.map(|s| s.clamp(length)) {
                Some(selection) if selection != self.selection => {
                    let mut next = self.clone();
                    next.selection = selection;
                    self.finish(next, Vec::new())
                }
                _ => self.unchanged(),
            });
        }

        let mut next = self.clone();
        let mut events = Vec::new();
        let selection_before = next.selection;
        let selection_after = selection
            .unwrap_or_else(|| selection_before.follow(typing, Bias::Right))
            .clamp(length);

        let (inverse, index) = next.apply_view_change(typing, &mut events)?;
        next.push_local(typing, selection_before, selection_after)?;
        next.selection = selection_after;

        match mode {
            HistoryMode::Yes => {
                next.undo_stack.push(HistoryEntry::View(ViewEntry {
                    changeset: typing.clone(),
                    inverse,
                    selection: selection_after,
                    selection_inverse: selection_before,
                    external: Vec::new(),
                    log_index: Some(index),
                }));
                next.redo_stack.clear();
            }
            HistoryMode::Merge => {
                next.merge_into_top(typing, inverse, selection_before, selection_after, index)?;
                next.redo_stack.clear();
            }
            HistoryMode::No => {
                annotate_top(&mut next.undo_stack, typing);
                annotate_top(&mut next.redo_stack, typing);
            }
        }

        next.cleanup(ctx)?;
        Ok(self.finish(next, events))
    }

    /// Moves the selection without editing.
    pub(crate) fn set_selection(&self, selection: Selection) -> Transition {
        let mut next = self.clone();
        next.selection = selection.clamp(char_len(&next.view_text));
        self.finish(next, Vec::new())
    }

    /// Applies `changeset` to the view and logs it. Returns its inverse
    /// and the log index of the resulting text.
    fn apply_view_change(
        &mut self,
        changeset: &Changeset,
        events: &mut Vec<ServiceEvent>,
    ) -> Result<(Changeset, usize)> {
        let inverse = changeset.inverse(&self.view_text)?;
        self.view_text = changeset.apply(&self.view_text)?;
        let index = self.view_log.push(changeset.clone(), inverse.clone());
        events.push(ServiceEvent::ViewChanged {
            changeset: changeset.clone(),
        });
        Ok((inverse, index))
    }

    /// Composes `changeset` into the local layer, dropping the layer once
    /// it no longer changes anything.
    fn push_local(
        &mut self,
        changeset: &Changeset,
        selection_before: Selection,
        selection_after: Selection,
    ) -> Result<()> {
        let local = match self.local.take() {
            Some(local) => LocalRecord {
                changeset: local.changeset.compose(changeset)?,
                selection: selection_after,
                selection_inverse: local.selection_inverse,
            },
            None => LocalRecord {
                changeset: changeset.clone(),
                selection: selection_after,
                selection_inverse: selection_before,
            },
        };

        let base = self.submitted_text()?;
        self.local = if local.changeset.is_no_op(&base)? {
            None
        } else {
            Some(local)
        };
        Ok(())
    }

    /// Folds `typing` into the newest undo entry, or pushes a new one when
    /// there is nothing to merge into or the merge cannot be reproduced.
    fn merge_into_top(
        &mut self,
        typing: &Changeset,
        typing_inverse: Changeset,
        selection_before: Selection,
        selection_after: Selection,
        index: usize,
    ) -> Result<()> {
        let merged = match self.undo_stack.last() {
            Some(HistoryEntry::View(top)) if top.external.is_empty() => {
                let changeset = top.changeset.compose(typing)?;
                let inverse = typing_inverse.compose(&top.inverse)?;
                Some(ViewEntry {
                    changeset,
                    inverse,
                    selection: selection_after,
                    selection_inverse: top.selection_inverse,
                    external: Vec::new(),
                    log_index: Some(index),
                })
            }
            Some(HistoryEntry::View(top)) => {
                let merged = self.merge_across_external(top, typing, selection_after)?;
                if merged.is_none() {
                    log::warn!("merge across external changes not reproducible, starting a new entry");
                }
                merged
            }
            _ => None,
        };

        match merged {
            Some(entry) => {
                self.undo_stack.pop();
                // Without externals the merged inverse applies to the view directly.
                if entry.external.is_empty() && entry.inverse.is_no_op(&self.view_text)? {
                    log::debug!("merged history entry cancelled out");
                } else {
                    self.undo_stack.push(HistoryEntry::View(entry));
                }
            }
            None => {
                self.undo_stack.push(HistoryEntry::View(ViewEntry {
                    changeset: typing.clone(),
                    inverse: typing_inverse,
                    selection: selection_after,
                    selection_inverse: selection_before,
                    external: Vec::new(),
                    log_index: Some(index),
                }));
            }
        }
        Ok(())
    }

    /// Rebases `typing` to apply right after `top.changeset`, moving the
    /// recorded external changes past it.
    ///
    /// Returns `None` when the text right after `top.changeset` is no longer
    /// known or the rebased pair does not reproduce the current view.
    fn merge_across_external(
        &self,
        top: &ViewEntry,
        typing: &Changeset,
        selection_after: Selection,
    ) -> Result<Option<ViewEntry>> {
        let Some(index) = top.log_index else {
            return Ok(None);
        };
        // The log already holds `typing`, so this rebuilds from before it.
        let Some(text_after_top) = self.view_log.text_at(index, &self.view_text)? else {
            return Ok(None);
        };

        let mut externals = top.external.iter();
        let Some(first) = externals.next() else {
            return Ok(None);
        };
        let mut external = first.clone();
        for next in externals {
            external = external.compose(next)?;
        }

        let external_inverse = external.inverse(&text_after_top)?;
        let rebased_typing = typing.follow(&external_inverse, true)?;
        let rebased_external = external.follow(&rebased_typing, false)?;

        let merged_text = rebased_typing.apply(&text_after_top)?;
        if rebased_external.apply(&merged_text)? != self.view_text {
            return Ok(None);
        }

        Ok(Some(ViewEntry {
            changeset: top.changeset.compose(&rebased_typing)?,
            inverse: rebased_typing
                .inverse(&text_after_top)?
                .compose(&top.inverse)?,
            selection: selection_after,
            selection_inverse: top.selection_inverse,
            external: vec![rebased_external],
            log_index: None,
        }))
    }

    pub(crate) fn submit_changes(&self) -> Option<(Transition, SubmittedRecord)> {
        if !self.can_submit_changes() {
            return None;
        }
        let mut next = self.clone();
        let local = next.local.take()?;
        let submitted = SubmittedRecord::new(
            next.server_revision,
            local.changeset,
            local.selection,
            local.selection_inverse,
        );
        next.submitted = Some(submitted.clone());

        let events = vec![ServiceEvent::SubmittedChanges(submitted.clone())];
        Some((self.finish(next, events), submitted))
    }

    // ─── Server messages ────────────────────────────────────────

    /// Handles a server record, buffering it if earlier revisions are
    /// still missing. `acknowledgement` marks a record the transport
    /// delivered as the answer to this replica's submission.
    pub(crate) fn receive(
        &self,
        ctx: &Context<'_>,
        record: &ServerRecord,
        acknowledgement: bool,
    ) -> Result<Transition> {
        if record.revision <= self.server_revision {
            log::debug!(
                "ignoring stale revision {} (at {})",
                record.revision,
                self.server_revision
            );
            return Ok(self.unchanged());
        }

        let mut next = self.clone();
        let mut events = Vec::new();

        if record.revision > next.server_revision + 1 {
            next.queue.insert(
                Incoming {
                    record: record.clone(),
                    acknowledgement,
                },
                ctx.config.message_queue_limit,
            );
            next.missing = next.queue.gap(next.server_revision);
            log::debug!(
                "buffered revision {}, missing {:?}",
                record.revision,
                next.missing
            );
            return Ok(self.finish(next, events));
        }

        next.apply_incoming(ctx, record, acknowledgement, &mut events)?;
        while let Some(incoming) = next.queue.take_next(next.server_revision + 1) {
            next.apply_incoming(ctx, &incoming.record, incoming.acknowledgement, &mut events)?;
        }
        next.missing = next.queue.gap(next.server_revision);

        next.cleanup(ctx)?;
        Ok(self.finish(next, events))
    }

    fn apply_incoming(
        &mut self,
        ctx: &Context<'_>,
        record: &ServerRecord,
        acknowledgement: bool,
        events: &mut Vec<ServiceEvent>,
    ) -> Result<()> {
        let ours = self
            .submitted
            .as_ref()
            .is_some_and(|s| record.is_copy_of(ctx.author_id, s));

        if ours {
            self.acknowledge(record, events)
        } else if acknowledgement {
            Err(CollabError::invalid_state(format!(
                "revision {} acknowledges a submission this replica is not waiting on",
                record.revision
            )))
        } else {
            self.apply_external(ctx, record, events)
        }
    }

    fn acknowledge(&mut self, record: &ServerRecord, events: &mut Vec<ServiceEvent>) -> Result<()> {
        let Some(submitted) = self.submitted.take() else {
            return Err(CollabError::invalid_state("acknowledgement without a submission"));
        };

        let server_length = char_len(&self.server_text);
        if record.changeset.input_length() != server_length
            || record.changeset.output_length() != submitted.changeset.output_length()
        {
            return Err(CollabError::invalid_state(format!(
                "acknowledged revision {} does not match the submitted changes",
                record.revision
            )));
        }

        self.server_text = record.changeset.apply(&self.server_text)?;
        self.server_revision = record.revision;
        events.push(ServiceEvent::ChangesAcknowledged {
            revision: record.revision,
        });
        Ok(())
    }

    fn apply_external(
        &mut self,
        ctx: &Context<'_>,
        record: &ServerRecord,
        events: &mut Vec<ServiceEvent>,
    ) -> Result<()> {
        let edit = &record.changeset;
        let server_text = edit.apply(&self.server_text)?;

        // Server-applied edits win ties against both pending layers.
        let (submitted, over_submitted) = match &self.submitted {
            Some(s) => (
                Some(SubmittedRecord {
                    changeset: s.changeset.follow(edit, false)?,
                    selection: s.selection.follow(edit, Bias::Left),
                    selection_inverse: s.selection_inverse.follow(edit, Bias::Left),
                    ..s.clone()
                }),
                edit.follow(&s.changeset, true)?,
            ),
            None => (None, edit.clone()),
        };
        let (local, over_view) = match &self.local {
            Some(l) => (
                Some(LocalRecord {
                    changeset: l.changeset.follow(&over_submitted, false)?,
                    selection: l.selection.follow(&over_submitted, Bias::Left),
                    selection_inverse: l.selection_inverse.follow(&over_submitted, Bias::Left),
                }),
                over_submitted.follow(&l.changeset, true)?,
            ),
            None => (None, over_submitted.clone()),
        };

        let history = (ctx.is_history)(record);
        let selection_inverse = self.map_to_view(record.selection_inverse);

        self.server_text = server_text;
        self.server_revision = record.revision;
        self.submitted = submitted;
        self.local = local;
        if let Some(local) = &self.local {
            if local.changeset.is_no_op(&self.submitted_text()?)? {
                self.local = None;
            }
        }

        if over_view.is_identity() {
            return Ok(());
        }

        let (inverse, index) = self.apply_view_change(&over_view, events)?;
        self.selection = self.selection.follow(&over_view, Bias::Left);

        if history {
            let selection = self.map_to_view(record.selection);
            self.undo_stack.push(HistoryEntry::View(ViewEntry {
                changeset: over_view.clone(),
                inverse,
                selection,
                selection_inverse,
                external: Vec::new(),
                log_index: Some(index),
            }));
            annotate_top(&mut self.redo_stack, &over_view);
        } else {
            annotate_top(&mut self.undo_stack, &over_view);
            annotate_top(&mut self.redo_stack, &over_view);
        }
        Ok(())
    }

    /// Maps a selection over `server_text` through the pending layers.
    fn map_to_view(&self, selection: Selection) -> Selection {
        let mut selection = selection;
        if let Some(submitted) = &self.submitted {
            selection = selection.follow(&submitted.changeset, Bias::Left);
        }
        if let Some(local) = &self.local {
            selection = selection.follow(&local.changeset, Bias::Left);
        }
        selection
    }

    // ─── History ────────────────────────────────────────────────

    /// Undoes (or redoes) the newest entry that still changes the view.
    /// Returns the transition and whether anything was applied.
    pub(crate) fn step_history(
        &self,
        ctx: &Context<'_>,
        direction: Direction,
    ) -> Result<(Transition, bool)> {
        let mut next = self.clone();
        let mut events = Vec::new();
        let mut applied = false;

        while let Some(entry) = next.stack_mut(direction).pop() {
            applied = match entry {
                HistoryEntry::View(entry) => next.apply_view_entry(entry, direction, &mut events)?,
                HistoryEntry::ServerPointer {
                    revision,
                    until_revision,
                } => next.apply_server_pointer(ctx, revision, until_revision, &mut events)?,
            };
            if applied {
                break;
            }
        }

        next.cleanup(ctx)?;
        Ok((self.finish(next, events), applied))
    }

    fn apply_view_entry(
        &mut self,
        entry: ViewEntry,
        direction: Direction,
        events: &mut Vec<ServiceEvent>,
    ) -> Result<bool> {
        let (inverse, rebased_external, selection) = entry.rebased_inverse()?;

        if inverse.is_no_op(&self.view_text)? {
            log::debug!("dropping {:?} entry that no longer changes the view", direction);
            let changes = iter::once(entry.changeset).chain(entry.external);
            extend_top(self.stack_mut(direction), changes);
            return Ok(false);
        }

        self.apply_history_change(&inverse, selection, direction, events)?;
        extend_top(self.stack_mut(direction), rebased_external);
        Ok(true)
    }

    /// Applies `changeset` as a local edit and pushes its mirror on the
    /// stack opposite to `direction`.
    fn apply_history_change(
        &mut self,
        changeset: &Changeset,
        selection: Selection,
        direction: Direction,
        events: &mut Vec<ServiceEvent>,
    ) -> Result<()> {
        let selection_before = self.selection;
        let selection = selection.clamp(changeset.output_length());

        let (inverse, index) = self.apply_view_change(changeset, events)?;
        self.push_local(changeset, selection_before, selection)?;
        self.selection = selection;

        let mirror = match direction {
            Direction::Undo => Direction::Redo,
            Direction::Redo => Direction::Undo,
        };
        self.stack_mut(mirror).push(HistoryEntry::View(ViewEntry {
            changeset: changeset.clone(),
            inverse,
            selection,
            selection_inverse: selection_before,
            external: Vec::new(),
            log_index: Some(index),
        }));
        Ok(())
    }

    /// Undoes the newest history record at or below `revision` through the
    /// facade. Re-pushes a pointer to the next older revision while more
    /// history remains.
    fn apply_server_pointer(
        &mut self,
        ctx: &Context<'_>,
        revision: Revision,
        until_revision: Option<Revision>,
        events: &mut Vec<ServiceEvent>,
    ) -> Result<bool> {
        let Some(facade) = ctx.facade else {
            log::warn!("no server facade attached, dropping pointer at revision {}", revision);
            return Ok(false);
        };

        let floor = until_revision.unwrap_or(0);
        let found = facade
            .older_iterable(revision.min(self.server_revision))
            .take_while(|record| record.revision > floor)
            .find(|record| (ctx.is_history)(record.as_ref()));
        let Some(record) = found else {
            log::debug!("no more server history below revision {}", revision);
            return Ok(false);
        };

        let later = match facade.range(record.revision + 1, self.server_revision + 1) {
            Ok(later) => later,
            Err(e) => {
                log::warn!("dropping server pointer at revision {}: {}", revision, e);
                return Ok(false);
            }
        };

        let mut inverse = record.inverse.clone();
        let mut selection = record.selection_inverse;
        let layers = later
            .iter()
            .map(|r| &r.changeset)
            .chain(self.submitted.as_ref().map(|s| &s.changeset))
            .chain(self.local.as_ref().map(|l| &l.changeset));
        for layer in layers {
            inverse = inverse.follow(layer, false)?;
            selection = selection.follow(layer, Bias::Left);
        }

        if record.revision - 1 > floor && facade.has_older_than(record.revision) {
            self.undo_stack.push(HistoryEntry::ServerPointer {
                revision: record.revision - 1,
                until_revision,
            });
        }

        if inverse.is_no_op(&self.view_text)? {
            log::debug!("server revision {} no longer changes the view", record.revision);
            return Ok(false);
        }

        self.apply_history_change(&inverse, selection, Direction::Undo, events)?;
        Ok(true)
    }

    // ─── Lifecycle ──────────────────────────────────────────────

    /// Discards everything and starts over from `head`.
    pub(crate) fn reset(&self, ctx: &Context<'_>, head: &HeadRecord) -> Transition {
        let mut next = Self::from_head(head);
        next.selection = self.selection.clamp(char_len(&head.text));
        // Keep log indexes monotonic across resets.
        next.view_log = ViewLog::starting_at(self.view_log.end());

        if ctx.config.undo_server_history && head.revision > 0 {
            next.undo_stack.push(HistoryEntry::ServerPointer {
                revision: head.revision,
                until_revision: None,
            });
        }

        log::info!(
            "reset to revision {} ({} chars)",
            head.revision,
            char_len(&head.text)
        );

        let mut events = vec![ServiceEvent::Reset {
            revision: head.revision,
        }];
        if next.view_text != self.view_text {
            let length = char_len(&self.view_text);
            // Whole-text replacement; both texts are known so this cannot fail.
            if let Ok(changeset) = Changeset::replacement(length, 0, length, &next.view_text) {
                events.push(ServiceEvent::ViewChanged { changeset });
            }
        }
        self.finish(next, events)
    }

    /// Bounds the stacks and the view log.
    fn cleanup(&mut self, ctx: &Context<'_>) -> Result<()> {
        let limit = ctx.config.history_size_limit;
        let threshold = ctx.config.array_cleanup_threshold;

        let removed = cleanup(&mut self.undo_stack, limit, threshold)
            + cleanup(&mut self.redo_stack, limit, threshold);
        if removed > 0 {
            log::debug!("history cleanup removed {} entries", removed);
        }
        if let Some(facade) = ctx.facade {
            drop_unreachable_pointers(&mut self.undo_stack, facade);
        }

        let log_limit = ctx.config.view_log_limit;
        if self.view_log.len() > log_limit + threshold {
            let target = self.view_log.end() - log_limit;
            let referenced = min_log_index([self.undo_stack.as_slice(), self.redo_stack.as_slice()]);
            let offset = referenced.map_or(target, |r| r.max(target));
            self.view_log.prune_to(offset);
            release_log_indexes(&mut self.undo_stack, offset);
            release_log_indexes(&mut self.redo_stack, offset);
        }

        self.check_invariants()
    }

    fn check_invariants(&self) -> Result<()> {
        let server_length = char_len(&self.server_text);
        let mut layer_length = server_length;
        if let Some(submitted) = &self.submitted {
            if submitted.changeset.input_length() != server_length {
                return Err(CollabError::invalid_state(
                    "submitted changes do not compose with the server text",
                ));
            }
            layer_length = submitted.changeset.output_length();
        }
        if let Some(local) = &self.local {
            if local.changeset.input_length() != layer_length {
                return Err(CollabError::invalid_state(
                    "local changes do not compose with the submitted changes",
                ));
            }
            layer_length = local.changeset.output_length();
        }
        if layer_length != char_len(&self.view_text) {
            return Err(CollabError::invalid_state("view text length drifted"));
        }
        Ok(())
    }

    /// Pairs `next` with `events` plus the change notifications derived
    /// from comparing it with `self`.
    fn finish(&self, next: ServiceState, mut events: Vec<ServiceEvent>) -> Transition {
        if next.server_revision != self.server_revision {
            events.push(ServiceEvent::ServerRevisionChanged {
                revision: next.server_revision,
            });
        }
        if next.selection != self.selection {
            events.push(ServiceEvent::SelectionChanged(next.selection));
        }
        if next.local.is_some() != self.local.is_some() {
            events.push(ServiceEvent::LocalChanged {
                have_local: next.local.is_some(),
            });
        }
        if next.missing != self.missing {
            events.push(ServiceEvent::MissingRevisions(next.missing));
        }
        let can_undo = !next.undo_stack.is_empty();
        let can_redo = !next.redo_stack.is_empty();
        if can_undo != !self.undo_stack.is_empty() || can_redo != !self.redo_stack.is_empty() {
            events.push(ServiceEvent::HistoryChanged { can_undo, can_redo });
        }
        Transition {
            state: next,
            events,
        }
    }
}
