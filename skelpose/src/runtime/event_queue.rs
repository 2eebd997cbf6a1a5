use super::animation_state::{AnimationState, TrackEntryId};
use crate::Event;
use std::collections::VecDeque;

/// Notification delivered to listeners when the queue drains.
#[derive(Clone, Debug, PartialEq)]
pub enum AnimationStateEvent {
    /// The entry became the current entry of its track.
    Start,
    /// Another entry replaced this one as current.
    Interrupt,
    /// The entry will never be applied again.
    End,
    /// The entry is returned to the pool; its id is stale after this.
    Dispose,
    /// A loop iteration or the whole animation finished.
    Complete,
    Event(Event),
}

impl AnimationStateEvent {
    fn kind(&self) -> &'static str {
        match self {
            AnimationStateEvent::Start => "start",
            AnimationStateEvent::Interrupt => "interrupt",
            AnimationStateEvent::End => "end",
            AnimationStateEvent::Dispose => "dispose",
            AnimationStateEvent::Complete => "complete",
            AnimationStateEvent::Event(_) => "event",
        }
    }
}

/// Receives every notification for every track.
///
/// Listeners get mutable access to the state and may call sequencing methods such as
/// [`AnimationState::set_animation`]; notifications those calls raise are delivered later in
/// the same drain.
pub trait AnimationStateListener {
    fn on_event(
        &mut self,
        state: &mut AnimationState,
        entry: TrackEntryId,
        event: &AnimationStateEvent,
    );
}

/// Receives notifications for a single track entry, before the state listeners.
pub trait TrackEntryListener {
    fn on_event(
        &mut self,
        state: &mut AnimationState,
        entry: TrackEntryId,
        event: &AnimationStateEvent,
    );
}

impl<F> AnimationStateListener for F
where
    F: FnMut(&mut AnimationState, TrackEntryId, &AnimationStateEvent),
{
    fn on_event(
        &mut self,
        state: &mut AnimationState,
        entry: TrackEntryId,
        event: &AnimationStateEvent,
    ) {
        self(state, entry, event)
    }
}

impl<F> TrackEntryListener for F
where
    F: FnMut(&mut AnimationState, TrackEntryId, &AnimationStateEvent),
{
    fn on_event(
        &mut self,
        state: &mut AnimationState,
        entry: TrackEntryId,
        event: &AnimationStateEvent,
    ) {
        self(state, entry, event)
    }
}

#[derive(Clone, Debug)]
struct QueuedEvent {
    entry: TrackEntryId,
    event: AnimationStateEvent,
}

/// Notifications collected during `update`/`apply` and delivered in order afterwards.
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    objects: VecDeque<QueuedEvent>,
    /// Set while draining so reentrant drains become no-ops.
    pub(crate) drain_disabled: bool,
    /// Raised by start and end; tells the state to reclassify timelines before the next apply.
    pub(crate) animations_changed: bool,
}

impl EventQueue {
    fn push(&mut self, entry: TrackEntryId, event: AnimationStateEvent) {
        self.objects.push_back(QueuedEvent { entry, event });
    }

    pub(crate) fn start(&mut self, entry: TrackEntryId) {
        self.push(entry, AnimationStateEvent::Start);
        self.animations_changed = true;
    }

    pub(crate) fn interrupt(&mut self, entry: TrackEntryId) {
        self.push(entry, AnimationStateEvent::Interrupt);
    }

    /// Queues `end`; draining it also delivers `dispose` and frees the entry.
    pub(crate) fn end(&mut self, entry: TrackEntryId) {
        self.push(entry, AnimationStateEvent::End);
        self.animations_changed = true;
    }

    pub(crate) fn dispose(&mut self, entry: TrackEntryId) {
        self.push(entry, AnimationStateEvent::Dispose);
    }

    pub(crate) fn complete(&mut self, entry: TrackEntryId) {
        self.push(entry, AnimationStateEvent::Complete);
    }

    pub(crate) fn event(&mut self, entry: TrackEntryId, event: Event) {
        self.push(entry, AnimationStateEvent::Event(event));
    }

    pub(crate) fn clear(&mut self) {
        self.objects.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.objects.len()
    }
}

impl AnimationState {
    /// Delivers queued notifications: the entry's listener first, then the state listeners.
    pub(crate) fn drain(&mut self) {
        if self.queue.drain_disabled {
            return;
        }
        self.queue.drain_disabled = true;

        while let Some(QueuedEvent { entry, event }) = self.queue.objects.pop_front() {
            match event {
                AnimationStateEvent::End => {
                    self.notify(entry, &AnimationStateEvent::End);
                    self.notify(entry, &AnimationStateEvent::Dispose);
                    self.pool.free(entry);
                }
                AnimationStateEvent::Dispose => {
                    self.notify(entry, &AnimationStateEvent::Dispose);
                    self.pool.free(entry);
                }
                event => self.notify(entry, &event),
            }
        }

        self.queue.drain_disabled = false;
    }

    fn notify(&mut self, id: TrackEntryId, event: &AnimationStateEvent) {
        log::trace!("track entry {id:?}: {}", event.kind());

        let entry_listener = self.pool.get_mut(id).and_then(|e| e.listener.take());
        if let Some(mut listener) = entry_listener {
            listener.on_event(self, id, event);
            if let Some(entry) = self.pool.get_mut(id) {
                if entry.listener.is_none() {
                    entry.listener = Some(listener);
                }
            }
        }

        let mut listeners = std::mem::take(&mut self.listeners);
        for listener in &mut listeners {
            listener.on_event(self, id, event);
        }
        listeners.append(&mut self.listeners);
        self.listeners = listeners;
    }
}
