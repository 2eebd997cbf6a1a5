use super::animation::{ANIMATION_STATE_CURRENT, ANIMATION_STATE_SETUP};
use super::bone::wrap_degrees;
use super::event_queue::{AnimationStateListener, EventQueue, TrackEntryListener};
use super::slot_timeline::{AttachmentTimeline, setup_attachment_name};
use super::timeline::{PropertyId, RotateTimeline, Timeline, apply_rotate, signum};
use crate::{Animation, Error, Event, MixBlend, MixDirection, Skeleton, SkeletonData};
use std::collections::{HashMap, HashSet};
use std::ops::{Index, IndexMut};
use std::sync::Arc;

pub const EMPTY_ANIMATION_NAME: &str = "<empty>";

/// How a timeline of a mixing-out entry is applied, decided by [`AnimationState`] whenever the
/// set of playing animations changes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum TimelineMode {
    /// An earlier entry already keys the property: blend normally.
    Subsequent,
    /// First to key the property: blend from the setup pose.
    First,
    /// Like `Subsequent`, but held at full alpha while mixing out.
    HoldSubsequent,
    /// Like `First`, but held at full alpha while mixing out.
    HoldFirst,
    /// Held, fading out over the mix of a later entry that drops the property.
    HoldMix,
}

/// Mix durations between pairs of animations.
#[derive(Clone, Debug)]
pub struct AnimationStateData {
    pub skeleton_data: Arc<SkeletonData>,
    /// Used when no mix is set for a pair.
    pub default_mix: f32,
    mixes: HashMap<(usize, usize), f32>,
}

impl AnimationStateData {
    pub fn new(skeleton_data: Arc<SkeletonData>) -> Self {
        Self {
            skeleton_data,
            default_mix: 0.0,
            mixes: HashMap::new(),
        }
    }

    pub fn set_mix(&mut self, from: &str, to: &str, duration: f32) -> Result<(), Error> {
        let (from, _) = self.skeleton_data.find_animation(from)?;
        let (to, _) = self.skeleton_data.find_animation(to)?;
        self.set_mix_by_index(from, to, duration)
    }

    pub fn set_mix_by_index(&mut self, from: usize, to: usize, duration: f32) -> Result<(), Error> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(Error::invalid_value("mix duration must be finite and >= 0"));
        }
        let count = self.skeleton_data.animations.len();
        if from >= count || to >= count {
            return Err(Error::invalid_value(format!(
                "animation index out of range: {from} -> {to} (count {count})"
            )));
        }
        self.mixes.insert((from, to), duration);
        Ok(())
    }

    /// Mix duration from one animation to another. Animations outside the skeleton data, such as
    /// the empty animation, always use the default mix.
    pub fn mix(&self, from: Option<usize>, to: Option<usize>) -> f32 {
        match (from, to) {
            (Some(from), Some(to)) => self
                .mixes
                .get(&(from, to))
                .copied()
                .unwrap_or(self.default_mix),
            _ => self.default_mix,
        }
    }
}

/// Generational handle to a [`TrackEntry`]. Stale once the entry is disposed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TrackEntryId {
    index: u32,
    generation: u32,
}

/// One scheduled playback of an animation on a track.
pub struct TrackEntry {
    animation: Arc<Animation>,
    animation_index: Option<usize>,
    empty: bool,
    previous: Option<TrackEntryId>,
    next: Option<TrackEntryId>,
    mixing_from: Option<TrackEntryId>,
    mixing_to: Option<TrackEntryId>,
    pub(crate) listener: Option<Box<dyn TrackEntryListener>>,
    track_index: usize,
    pub looped: bool,
    /// Keeps the previous entry's keyed properties at full strength while this entry mixes in.
    pub hold_previous: bool,
    /// Plays backward; events are not fired.
    pub reverse: bool,
    /// Mixes rotations by interpolating the keyed values directly every frame, without the
    /// direction remembered since the mix began.
    pub shortest_rotation: bool,
    /// Events fire while mixing out only below this mix percentage.
    pub event_threshold: f32,
    /// Attachment keys apply while mixing out only below this mix percentage.
    pub mix_attachment_threshold: f32,
    /// Draw order keys apply while mixing out only below this mix percentage.
    pub mix_draw_order_threshold: f32,
    pub animation_start: f32,
    pub animation_end: f32,
    animation_last: f32,
    next_animation_last: f32,
    /// Seconds before playback starts. Consumed before `track_time` advances.
    pub delay: f32,
    pub track_time: f32,
    track_last: f32,
    next_track_last: f32,
    /// Track time at which the track is cleared if nothing is queued after this entry.
    pub track_end: f32,
    pub time_scale: f32,
    pub alpha: f32,
    pub mix_time: f32,
    pub mix_duration: f32,
    interrupt_alpha: f32,
    total_alpha: f32,
    pub mix_blend: MixBlend,
    timeline_mode: Vec<TimelineMode>,
    timeline_hold_mix: Vec<Option<TrackEntryId>>,
    timelines_rotation: Vec<f32>,
}

impl std::fmt::Debug for TrackEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackEntry")
            .field("animation", &self.animation.name)
            .field("track_index", &self.track_index)
            .field("looped", &self.looped)
            .field("delay", &self.delay)
            .field("track_time", &self.track_time)
            .field("track_end", &self.track_end)
            .field("mix_time", &self.mix_time)
            .field("mix_duration", &self.mix_duration)
            .field("mixing_from", &self.mixing_from)
            .field("mixing_to", &self.mixing_to)
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

impl TrackEntry {
    fn new(animation: Arc<Animation>) -> Self {
        let mut entry = Self {
            animation,
            animation_index: None,
            empty: false,
            previous: None,
            next: None,
            mixing_from: None,
            mixing_to: None,
            listener: None,
            track_index: 0,
            looped: false,
            hold_previous: false,
            reverse: false,
            shortest_rotation: false,
            event_threshold: 0.0,
            mix_attachment_threshold: 0.0,
            mix_draw_order_threshold: 0.0,
            animation_start: 0.0,
            animation_end: 0.0,
            animation_last: -1.0,
            next_animation_last: -1.0,
            delay: 0.0,
            track_time: 0.0,
            track_last: -1.0,
            next_track_last: -1.0,
            track_end: f32::MAX,
            time_scale: 1.0,
            alpha: 1.0,
            mix_time: 0.0,
            mix_duration: 0.0,
            interrupt_alpha: 1.0,
            total_alpha: 0.0,
            mix_blend: MixBlend::Replace,
            timeline_mode: Vec::new(),
            timeline_hold_mix: Vec::new(),
            timelines_rotation: Vec::new(),
        };
        entry.animation_end = entry.animation.duration;
        entry
    }

    /// Restores defaults and drops links, keeping buffer capacity for reuse.
    fn reset(&mut self, animation: Arc<Animation>) {
        let mut timeline_mode = std::mem::take(&mut self.timeline_mode);
        let mut timeline_hold_mix = std::mem::take(&mut self.timeline_hold_mix);
        let mut timelines_rotation = std::mem::take(&mut self.timelines_rotation);
        timeline_mode.clear();
        timeline_hold_mix.clear();
        timelines_rotation.clear();
        *self = Self {
            timeline_mode,
            timeline_hold_mix,
            timelines_rotation,
            ..Self::new(animation)
        };
    }

    pub fn animation(&self) -> &Arc<Animation> {
        &self.animation
    }

    /// Index in [`SkeletonData::animations`], or `None` for the empty animation.
    pub fn animation_index(&self) -> Option<usize> {
        self.animation_index
    }

    pub fn is_empty_animation(&self) -> bool {
        self.empty
    }

    pub fn track_index(&self) -> usize {
        self.track_index
    }

    pub fn previous(&self) -> Option<TrackEntryId> {
        self.previous
    }

    pub fn next(&self) -> Option<TrackEntryId> {
        self.next
    }

    pub fn mixing_from(&self) -> Option<TrackEntryId> {
        self.mixing_from
    }

    pub fn mixing_to(&self) -> Option<TrackEntryId> {
        self.mixing_to
    }

    pub fn interrupt_alpha(&self) -> f32 {
        self.interrupt_alpha
    }

    pub fn animation_last(&self) -> f32 {
        self.animation_last
    }

    /// Sets the time events were last fired up to, e.g. to skip events when starting mid-way.
    pub fn set_animation_last(&mut self, animation_last: f32) {
        self.animation_last = animation_last;
        self.next_animation_last = animation_last;
    }

    pub fn track_last(&self) -> f32 {
        self.track_last
    }

    pub fn set_listener(&mut self, listener: impl TrackEntryListener + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    /// Animation time for the current track time, wrapped when looping and clamped otherwise.
    pub fn animation_time(&self) -> f32 {
        if self.looped {
            let duration = self.animation_end - self.animation_start;
            if duration == 0.0 {
                return self.animation_start;
            }
            return self.track_time % duration + self.animation_start;
        }
        (self.track_time + self.animation_start).min(self.animation_end)
    }

    /// Track time at which the next loop or the animation completes.
    pub fn track_complete(&self) -> f32 {
        let duration = self.animation_end - self.animation_start;
        if duration != 0.0 {
            if self.looped {
                return duration * (1.0 + (self.track_time / duration).trunc());
            }
            if self.track_time < duration {
                return duration;
            }
        }
        self.track_time
    }

    /// True once at least one full play of the animation has elapsed.
    pub fn is_complete(&self) -> bool {
        self.track_time >= self.animation_end - self.animation_start
    }

    /// Forgets the rotation directions chosen while mixing, so the next mix picks the shortest
    /// route again.
    pub fn reset_rotation_directions(&mut self) {
        self.timelines_rotation.clear();
    }
}

struct PoolSlot {
    generation: u32,
    live: bool,
    entry: TrackEntry,
}

/// Free-list of track entries. `obtain` and `free` are the only ways entries come and go; freed
/// entries are reset and their ids become stale.
pub struct TrackEntryPool {
    slots: Vec<PoolSlot>,
    free: Vec<usize>,
    empty_animation: Arc<Animation>,
}

impl TrackEntryPool {
    pub fn new(empty_animation: Arc<Animation>) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            empty_animation,
        }
    }

    /// Hands out a reset entry, reusing a freed slot when one is available.
    pub fn obtain(&mut self) -> TrackEntryId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.live = true;
            return TrackEntryId {
                index: index as u32,
                generation: slot.generation,
            };
        }
        let index = self.slots.len();
        self.slots.push(PoolSlot {
            generation: 0,
            live: true,
            entry: TrackEntry::new(Arc::clone(&self.empty_animation)),
        });
        TrackEntryId {
            index: index as u32,
            generation: 0,
        }
    }

    /// Returns the entry to the pool. Returns false for stale ids.
    pub fn free(&mut self, id: TrackEntryId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return false;
        };
        if !slot.live || slot.generation != id.generation {
            return false;
        }
        slot.entry.reset(Arc::clone(&self.empty_animation));
        slot.live = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index as usize);
        true
    }

    pub fn get(&self, id: TrackEntryId) -> Option<&TrackEntry> {
        let slot = self.slots.get(id.index as usize)?;
        (slot.live && slot.generation == id.generation).then_some(&slot.entry)
    }

    pub fn get_mut(&mut self, id: TrackEntryId) -> Option<&mut TrackEntry> {
        let slot = self.slots.get_mut(id.index as usize)?;
        (slot.live && slot.generation == id.generation).then_some(&mut slot.entry)
    }

    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl Index<TrackEntryId> for TrackEntryPool {
    type Output = TrackEntry;

    fn index(&self, id: TrackEntryId) -> &TrackEntry {
        let slot = &self.slots[id.index as usize];
        debug_assert!(slot.live && slot.generation == id.generation, "stale {id:?}");
        &slot.entry
    }
}

impl IndexMut<TrackEntryId> for TrackEntryPool {
    fn index_mut(&mut self, id: TrackEntryId) -> &mut TrackEntry {
        let slot = &mut self.slots[id.index as usize];
        debug_assert!(slot.live && slot.generation == id.generation, "stale {id:?}");
        &mut slot.entry
    }
}

/// Plays, queues and crossfades animations on independent tracks, applying the result to a
/// [`Skeleton`].
pub struct AnimationState {
    data: AnimationStateData,
    tracks: Vec<Option<TrackEntryId>>,
    events: Vec<Event>,
    pub(crate) listeners: Vec<Box<dyn AnimationStateListener>>,
    pub(crate) queue: EventQueue,
    pub(crate) pool: TrackEntryPool,
    property_ids: HashSet<PropertyId>,
    /// Multiplier for every `update` delta.
    pub time_scale: f32,
    unkeyed_state: i32,
    empty_animation: Arc<Animation>,
}

impl AnimationState {
    pub fn new(data: AnimationStateData) -> Self {
        let empty_animation = Arc::new(Animation::with_duration(
            EMPTY_ANIMATION_NAME,
            Vec::new(),
            0.0,
        ));
        Self {
            data,
            tracks: Vec::new(),
            events: Vec::new(),
            listeners: Vec::new(),
            queue: EventQueue::default(),
            pool: TrackEntryPool::new(Arc::clone(&empty_animation)),
            property_ids: HashSet::new(),
            time_scale: 1.0,
            unkeyed_state: 0,
            empty_animation,
        }
    }

    pub fn data(&self) -> &AnimationStateData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut AnimationStateData {
        &mut self.data
    }

    pub fn empty_animation(&self) -> &Arc<Animation> {
        &self.empty_animation
    }

    pub fn pool(&self) -> &TrackEntryPool {
        &self.pool
    }

    /// Current entry per track index; cleared tracks are `None`.
    pub fn tracks(&self) -> &[Option<TrackEntryId>] {
        &self.tracks
    }

    pub fn current(&self, track_index: usize) -> Option<TrackEntryId> {
        self.tracks.get(track_index).copied().flatten()
    }

    pub fn entry(&self, id: TrackEntryId) -> Option<&TrackEntry> {
        self.pool.get(id)
    }

    pub fn entry_mut(&mut self, id: TrackEntryId) -> Option<&mut TrackEntry> {
        self.pool.get_mut(id)
    }

    pub fn add_listener(&mut self, listener: impl AnimationStateListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    /// Discards queued notifications that have not been delivered yet.
    pub fn clear_listener_notifications(&mut self) {
        self.queue.clear();
    }

    /// Advances every track by `delta` seconds, promoting queued entries and finishing mixes.
    pub fn update(&mut self, delta: f32) {
        let delta = delta * self.time_scale;
        for i in 0..self.tracks.len() {
            let Some(current) = self.tracks[i] else {
                continue;
            };
            let c = &mut self.pool[current];
            c.animation_last = c.next_animation_last;
            c.track_last = c.next_track_last;

            let mut current_delta = delta * c.time_scale;
            if c.delay > 0.0 {
                c.delay -= current_delta;
                if c.delay > 0.0 {
                    continue;
                }
                current_delta = -c.delay;
                c.delay = 0.0;
            }

            let (next, track_last, track_end, time_scale) =
                (c.next, c.track_last, c.track_end, c.time_scale);
            let mixing_from = c.mixing_from;
            match next {
                Some(next) => {
                    // Switch once the next entry's delay has passed, keeping leftover time.
                    let next_time = track_last - self.pool[next].delay;
                    if next_time >= 0.0 {
                        let n = &mut self.pool[next];
                        n.delay = 0.0;
                        if time_scale != 0.0 {
                            n.track_time += (next_time / time_scale + delta) * n.time_scale;
                        }
                        self.pool[current].track_time += current_delta;
                        self.set_current(i, next, true);
                        let mut entry = next;
                        while let Some(from) = self.pool[entry].mixing_from {
                            self.pool[entry].mix_time += delta;
                            entry = from;
                        }
                        continue;
                    }
                }
                None => {
                    if track_last >= track_end && mixing_from.is_none() {
                        self.tracks[i] = None;
                        self.queue.end(current);
                        self.clear_next(current);
                        continue;
                    }
                }
            }

            if mixing_from.is_some() && self.update_mixing_from(current, delta) {
                // Every entry in the chain finished mixing out.
                let mut from = self.pool[current].mixing_from.take();
                if let Some(first) = from {
                    self.pool[first].mixing_to = None;
                }
                while let Some(entry) = from {
                    self.queue.end(entry);
                    from = self.pool[entry].mixing_from;
                }
            }
            self.pool[current].track_time += current_delta;
        }
        self.drain();
    }

    /// Advances the mixing-out chain below `to`. Returns true when the whole chain is done.
    fn update_mixing_from(&mut self, to: TrackEntryId, delta: f32) -> bool {
        let Some(from) = self.pool[to].mixing_from else {
            return true;
        };
        let finished = self.update_mixing_from(from, delta);

        let f = &mut self.pool[from];
        f.animation_last = f.next_animation_last;
        f.track_last = f.next_track_last;
        let (from_from, from_interrupt_alpha, from_total_alpha) =
            (f.mixing_from, f.interrupt_alpha, f.total_alpha);

        let t = &self.pool[to];
        let (mix_time, mix_duration) = (t.mix_time, t.mix_duration);
        // mix_time > 0 means `from` was applied at least once.
        if mix_time > 0.0 && mix_time >= mix_duration {
            // A zero total alpha means `from` no longer contributes; zero-length mixes are done
            // after one frame.
            if from_total_alpha == 0.0 || mix_duration == 0.0 {
                let t = &mut self.pool[to];
                t.mixing_from = from_from;
                t.interrupt_alpha = from_interrupt_alpha;
                if let Some(from_from) = from_from {
                    self.pool[from_from].mixing_to = Some(to);
                }
                self.queue.end(from);
            }
            return finished;
        }

        let f = &mut self.pool[from];
        f.track_time += delta * f.time_scale;
        self.pool[to].mix_time += delta;
        false
    }

    /// Poses `skeleton` from every track. Returns true if any entry was applied.
    pub fn apply(&mut self, skeleton: &mut Skeleton) -> bool {
        if self.queue.animations_changed {
            self.animations_changed();
        }

        let mut applied = false;
        for i in 0..self.tracks.len() {
            let Some(current) = self.tracks[i] else {
                continue;
            };
            if self.pool[current].delay > 0.0 {
                continue;
            }
            applied = true;

            // Track 0 is not layered: it never shows earlier poses before its first key.
            let blend = if i == 0 {
                MixBlend::First
            } else {
                self.pool[current].mix_blend
            };

            let mut mix = self.pool[current].alpha;
            if self.pool[current].mixing_from.is_some() {
                mix *= self.apply_mixing_from(current, skeleton, blend);
            } else {
                let c = &self.pool[current];
                if c.track_time >= c.track_end && c.next.is_none() {
                    // Last application: fade to the setup pose.
                    mix = 0.0;
                }
            }

            let c = &self.pool[current];
            let animation_last = c.animation_last;
            let animation_time = c.animation_time();
            let animation = Arc::clone(&c.animation);
            let reverse = c.reverse;
            let apply_time = if reverse {
                animation.duration - animation_time
            } else {
                animation_time
            };
            let mut events = std::mem::take(&mut self.events);
            let mut out = if reverse { None } else { Some(&mut events) };
            let timelines = animation.timelines();

            if (i == 0 && mix == 1.0) || blend == MixBlend::Add {
                for timeline in timelines {
                    match timeline {
                        Timeline::Attachment(t) => {
                            self.apply_attachment_timeline(t, skeleton, apply_time, blend, true)
                        }
                        _ => timeline.apply(
                            skeleton,
                            animation_last,
                            apply_time,
                            out.as_deref_mut(),
                            mix,
                            blend,
                            MixDirection::In,
                        ),
                    }
                }
            } else {
                let c = &mut self.pool[current];
                let timeline_mode = std::mem::take(&mut c.timeline_mode);
                let shortest = c.shortest_rotation;
                let first_frame = !shortest && c.timelines_rotation.len() != timelines.len() * 2;
                if first_frame {
                    c.timelines_rotation.resize(timelines.len() * 2, 0.0);
                }
                let mut rotations = std::mem::take(&mut c.timelines_rotation);

                for (ii, timeline) in timelines.iter().enumerate() {
                    let timeline_blend = match timeline_mode.get(ii) {
                        Some(TimelineMode::Subsequent) => blend,
                        _ => MixBlend::Setup,
                    };
                    match timeline {
                        Timeline::Rotate(t) if !shortest => apply_rotate_timeline(
                            t,
                            skeleton,
                            apply_time,
                            mix,
                            timeline_blend,
                            &mut rotations,
                            ii << 1,
                            first_frame,
                        ),
                        Timeline::Attachment(t) => {
                            self.apply_attachment_timeline(t, skeleton, apply_time, blend, true)
                        }
                        _ => timeline.apply(
                            skeleton,
                            animation_last,
                            apply_time,
                            out.as_deref_mut(),
                            mix,
                            timeline_blend,
                            MixDirection::In,
                        ),
                    }
                }

                let c = &mut self.pool[current];
                c.timeline_mode = timeline_mode;
                c.timelines_rotation = rotations;
            }

            self.events = events;
            self.queue_events(current, animation_time);
            self.events.clear();
            let c = &mut self.pool[current];
            c.next_animation_last = animation_time;
            c.next_track_last = c.track_time;
        }

        // Slots keyed only by mixing-out or not-yet-started timelines go back to their setup
        // attachment.
        let setup_state = self.unkeyed_state + ANIMATION_STATE_SETUP;
        for slot_index in 0..skeleton.slots.len() {
            if skeleton.slots[slot_index].attachment_state == setup_state {
                let name = setup_attachment_name(skeleton, slot_index);
                skeleton.set_attachment_by_name(slot_index, name.as_deref());
            }
        }
        self.unkeyed_state += 2;

        self.drain();
        applied
    }

    /// Applies the chain of entries mixing out below `to`, oldest first. Returns the mix
    /// percentage of `to`.
    fn apply_mixing_from(
        &mut self,
        to: TrackEntryId,
        skeleton: &mut Skeleton,
        blend: MixBlend,
    ) -> f32 {
        let Some(from) = self.pool[to].mixing_from else {
            return 1.0;
        };
        if self.pool[from].mixing_from.is_some() {
            self.apply_mixing_from(from, skeleton, blend);
        }

        let t = &self.pool[to];
        let (to_mix_duration, interrupt_alpha) = (t.mix_duration, t.interrupt_alpha);
        let (mix, blend) = if to_mix_duration == 0.0 {
            // Single frame mix to undo the mixing-from changes; tracks above 0 can't use setup.
            let blend = if blend == MixBlend::First {
                MixBlend::Setup
            } else {
                blend
            };
            (1.0, blend)
        } else {
            let mix = (t.mix_time / to_mix_duration).min(1.0);
            // Track 0 ignores the entry's mix blend.
            let blend = if blend != MixBlend::First {
                self.pool[from].mix_blend
            } else {
                blend
            };
            (mix, blend)
        };

        let f = &self.pool[from];
        let attachments = mix < f.mix_attachment_threshold;
        let draw_order = mix < f.mix_draw_order_threshold;
        let alpha_hold = f.alpha * interrupt_alpha;
        let alpha_mix = alpha_hold * (1.0 - mix);
        let animation_last = f.animation_last;
        let animation_time = f.animation_time();
        let animation = Arc::clone(&f.animation);
        let (apply_time, fire_events) = if f.reverse {
            (animation.duration - animation_time, false)
        } else {
            (animation_time, mix < f.event_threshold)
        };
        let mut events = std::mem::take(&mut self.events);
        let mut out = if fire_events { Some(&mut events) } else { None };
        let timelines = animation.timelines();

        if blend == MixBlend::Add {
            for timeline in timelines {
                timeline.apply(
                    skeleton,
                    animation_last,
                    apply_time,
                    out.as_deref_mut(),
                    alpha_mix,
                    blend,
                    MixDirection::Out,
                );
            }
        } else {
            let f = &mut self.pool[from];
            let timeline_mode = std::mem::take(&mut f.timeline_mode);
            let timeline_hold_mix = std::mem::take(&mut f.timeline_hold_mix);
            let shortest = f.shortest_rotation;
            let first_frame = !shortest && f.timelines_rotation.len() != timelines.len() * 2;
            if first_frame {
                f.timelines_rotation.resize(timelines.len() * 2, 0.0);
            }
            let mut rotations = std::mem::take(&mut f.timelines_rotation);
            let mut total_alpha = 0.0;

            for (i, timeline) in timelines.iter().enumerate() {
                let mut direction = MixDirection::Out;
                let mode = timeline_mode.get(i).copied().unwrap_or(TimelineMode::First);
                let (timeline_blend, alpha) = match mode {
                    TimelineMode::Subsequent => {
                        if !draw_order && matches!(timeline, Timeline::DrawOrder(_)) {
                            continue;
                        }
                        (blend, alpha_mix)
                    }
                    TimelineMode::First => (MixBlend::Setup, alpha_mix),
                    TimelineMode::HoldSubsequent => (blend, alpha_hold),
                    TimelineMode::HoldFirst => (MixBlend::Setup, alpha_hold),
                    TimelineMode::HoldMix => {
                        let hold_mix = timeline_hold_mix
                            .get(i)
                            .copied()
                            .flatten()
                            .and_then(|id| self.pool.get(id));
                        let fade = hold_mix
                            .map(|h| (1.0 - h.mix_time / h.mix_duration).max(0.0))
                            .unwrap_or(1.0);
                        (MixBlend::Setup, alpha_hold * fade)
                    }
                };
                total_alpha += alpha;

                match timeline {
                    Timeline::Rotate(t) if !shortest => apply_rotate_timeline(
                        t,
                        skeleton,
                        apply_time,
                        alpha,
                        timeline_blend,
                        &mut rotations,
                        i << 1,
                        first_frame,
                    ),
                    Timeline::Attachment(t) => self.apply_attachment_timeline(
                        t,
                        skeleton,
                        apply_time,
                        timeline_blend,
                        attachments,
                    ),
                    _ => {
                        if draw_order
                            && matches!(timeline, Timeline::DrawOrder(_))
                            && timeline_blend == MixBlend::Setup
                        {
                            direction = MixDirection::In;
                        }
                        timeline.apply(
                            skeleton,
                            animation_last,
                            apply_time,
                            out.as_deref_mut(),
                            alpha,
                            timeline_blend,
                            direction,
                        );
                    }
                }
            }

            let f = &mut self.pool[from];
            f.timeline_mode = timeline_mode;
            f.timeline_hold_mix = timeline_hold_mix;
            f.timelines_rotation = rotations;
            f.total_alpha = total_alpha;
        }

        self.events = events;
        if to_mix_duration > 0.0 {
            self.queue_events(from, animation_time);
        }
        self.events.clear();
        let f = &mut self.pool[from];
        f.next_animation_last = animation_time;
        f.next_track_last = f.track_time;
        mix
    }

    fn apply_attachment_timeline(
        &self,
        timeline: &AttachmentTimeline,
        skeleton: &mut Skeleton,
        time: f32,
        blend: MixBlend,
        attachments: bool,
    ) {
        let slot_index = timeline.slot_index;
        let Some(slot) = skeleton.slots.get(slot_index) else {
            log::warn!("attachment timeline addresses missing slot {slot_index}");
            return;
        };
        if !skeleton.bones[slot.bone].active {
            return;
        }

        match timeline.keyed_name(time) {
            Some(name) => self.set_attachment(skeleton, slot_index, name, attachments),
            None => {
                if matches!(blend, MixBlend::Setup | MixBlend::First) {
                    let setup = setup_attachment_name(skeleton, slot_index);
                    self.set_attachment(skeleton, slot_index, setup.as_deref(), attachments);
                }
            }
        }

        // Not keyed this pass: restore the setup attachment after all tracks are applied.
        let slot = &mut skeleton.slots[slot_index];
        if slot.attachment_state <= self.unkeyed_state {
            slot.attachment_state = self.unkeyed_state + ANIMATION_STATE_SETUP;
        }
    }

    fn set_attachment(
        &self,
        skeleton: &mut Skeleton,
        slot_index: usize,
        name: Option<&str>,
        attachments: bool,
    ) {
        skeleton.set_attachment_by_name(slot_index, name);
        if attachments {
            skeleton.slots[slot_index].attachment_state =
                self.unkeyed_state + ANIMATION_STATE_CURRENT;
        }
    }

    /// Queues the events collected for `entry` this pass, with `complete` between the events
    /// of the previous loop and those of the new one.
    fn queue_events(&mut self, entry: TrackEntryId, animation_time: f32) {
        let e = &self.pool[entry];
        let (animation_start, animation_end) = (e.animation_start, e.animation_end);
        let duration = animation_end - animation_start;
        let track_last_wrapped = e.track_last % duration;

        let mut i = 0;
        while let Some(event) = self.events.get(i) {
            if event.time < track_last_wrapped {
                break;
            }
            // Outside the played range.
            if event.time <= animation_end {
                self.queue.event(entry, event.clone());
            }
            i += 1;
        }

        let complete = if e.looped {
            duration == 0.0 || track_last_wrapped > e.track_time % duration
        } else {
            animation_time >= animation_end && e.animation_last < animation_end
        };
        if complete {
            self.queue.complete(entry);
        }

        for event in &self.events[i..] {
            if event.time >= animation_start {
                self.queue.event(entry, event.clone());
            }
        }
    }

    /// Ends every track's entries, including queued and mixing-out ones.
    pub fn clear_tracks(&mut self) {
        let old_drain_disabled = self.queue.drain_disabled;
        self.queue.drain_disabled = true;
        for i in 0..self.tracks.len() {
            self.clear_track(i);
        }
        self.tracks.clear();
        self.queue.drain_disabled = old_drain_disabled;
        self.drain();
    }

    /// Ends the track's current entry, its mixing-out chain and everything queued after it.
    pub fn clear_track(&mut self, track_index: usize) {
        let Some(slot) = self.tracks.get(track_index) else {
            log::warn!("clear_track: no track {track_index}");
            return;
        };
        let Some(current) = *slot else {
            return;
        };

        self.queue.end(current);
        self.clear_next(current);
        let mut entry = current;
        while let Some(from) = self.pool[entry].mixing_from {
            self.queue.end(from);
            let e = &mut self.pool[entry];
            e.mixing_from = None;
            e.mixing_to = None;
            entry = from;
        }
        self.tracks[track_index] = None;
        self.drain();
    }

    /// Disposes every entry queued after `entry`.
    pub fn clear_next(&mut self, entry: TrackEntryId) {
        let Some(e) = self.pool.get_mut(entry) else {
            return;
        };
        let mut next = e.next.take();
        while let Some(id) = next {
            self.queue.dispose(id);
            next = self.pool.get(id).and_then(|e| e.next);
        }
    }

    fn set_current(&mut self, index: usize, current: TrackEntryId, interrupt: bool) {
        let from = self.expand_to_index(index);
        self.tracks[index] = Some(current);
        self.pool[current].previous = None;

        if let Some(from) = from {
            if interrupt {
                self.queue.interrupt(from);
            }
            let f = &mut self.pool[from];
            f.mixing_to = Some(current);
            // Reset rotation directions for mixing out, in case the entry was mixed in.
            f.timelines_rotation.clear();
            // Keep the interrupted mix percentage.
            let interrupted = if f.mixing_from.is_some() && f.mix_duration > 0.0 {
                (f.mix_time / f.mix_duration).min(1.0)
            } else {
                1.0
            };
            let c = &mut self.pool[current];
            c.mixing_from = Some(from);
            c.mix_time = 0.0;
            c.interrupt_alpha *= interrupted;
        }
        self.queue.start(current);
    }

    /// Sets the current animation of a track, discarding queued entries. The previous entry
    /// mixes out over the configured mix duration.
    pub fn set_animation(
        &mut self,
        track_index: usize,
        animation_name: &str,
        looped: bool,
    ) -> Result<TrackEntryId, Error> {
        let skeleton_data = Arc::clone(&self.data.skeleton_data);
        let (index, animation) = skeleton_data.find_animation(animation_name)?;
        Ok(self.set_animation_with(track_index, Some(index), Arc::clone(animation), looped))
    }

    pub fn set_animation_by_index(
        &mut self,
        track_index: usize,
        animation_index: usize,
        looped: bool,
    ) -> Result<TrackEntryId, Error> {
        let animation = self.animation_at(animation_index)?;
        Ok(self.set_animation_with(track_index, Some(animation_index), animation, looped))
    }

    fn animation_at(&self, animation_index: usize) -> Result<Arc<Animation>, Error> {
        self.data
            .skeleton_data
            .animations
            .get(animation_index)
            .cloned()
            .ok_or_else(|| {
                Error::invalid_value(format!("animation index out of range: {animation_index}"))
            })
    }

    fn set_animation_with(
        &mut self,
        track_index: usize,
        animation_index: Option<usize>,
        animation: Arc<Animation>,
        looped: bool,
    ) -> TrackEntryId {
        let mut interrupt = true;
        let mut current = self.expand_to_index(track_index);
        if let Some(c) = current {
            if self.pool[c].next_track_last == -1.0 {
                // Never applied: don't mix from it, its mixing-from becomes current again.
                let from = self.pool[c].mixing_from;
                self.tracks[track_index] = from;
                self.queue.interrupt(c);
                self.queue.end(c);
                self.clear_next(c);
                current = from;
                interrupt = false;
            } else {
                self.clear_next(c);
            }
        }
        let entry = self.track_entry(track_index, animation_index, animation, looped, current);
        self.set_current(track_index, entry, interrupt);
        self.drain();
        entry
    }

    /// Queues an animation after the last entry of a track. A `delay <= 0` is relative to the
    /// end of the previous entry, minus the mix duration.
    pub fn add_animation(
        &mut self,
        track_index: usize,
        animation_name: &str,
        looped: bool,
        delay: f32,
    ) -> Result<TrackEntryId, Error> {
        let skeleton_data = Arc::clone(&self.data.skeleton_data);
        let (index, animation) = skeleton_data.find_animation(animation_name)?;
        Ok(self.add_animation_with(track_index, Some(index), Arc::clone(animation), looped, delay))
    }

    pub fn add_animation_by_index(
        &mut self,
        track_index: usize,
        animation_index: usize,
        looped: bool,
        delay: f32,
    ) -> Result<TrackEntryId, Error> {
        let animation = self.animation_at(animation_index)?;
        Ok(self.add_animation_with(track_index, Some(animation_index), animation, looped, delay))
    }

    fn add_animation_with(
        &mut self,
        track_index: usize,
        animation_index: Option<usize>,
        animation: Arc<Animation>,
        looped: bool,
        mut delay: f32,
    ) -> TrackEntryId {
        let mut last = self.expand_to_index(track_index);
        if let Some(mut l) = last {
            while let Some(next) = self.pool[l].next {
                l = next;
            }
            last = Some(l);
        }

        let entry = self.track_entry(track_index, animation_index, animation, looped, last);
        match last {
            None => {
                self.set_current(track_index, entry, true);
                self.drain();
            }
            Some(last) => {
                self.pool[last].next = Some(entry);
                self.pool[entry].previous = Some(last);
                if delay <= 0.0 {
                    delay += self.pool[last].track_complete() - self.pool[entry].mix_duration;
                }
            }
        }
        if let Some(e) = self.pool.get_mut(entry) {
            e.delay = delay;
        }
        entry
    }

    /// Mixes the track out to the setup pose over `mix_duration`.
    pub fn set_empty_animation(&mut self, track_index: usize, mix_duration: f32) -> TrackEntryId {
        let empty = Arc::clone(&self.empty_animation);
        let entry = self.set_animation_with(track_index, None, empty, false);
        if let Some(e) = self.pool.get_mut(entry) {
            e.mix_duration = mix_duration;
            e.track_end = mix_duration;
        }
        entry
    }

    /// Queues a mix out to the setup pose. With `delay <= 0` the mix ends when the previous
    /// entry ends.
    pub fn add_empty_animation(
        &mut self,
        track_index: usize,
        mix_duration: f32,
        delay: f32,
    ) -> TrackEntryId {
        let empty = Arc::clone(&self.empty_animation);
        let entry = self.add_animation_with(track_index, None, empty, false, delay);
        if let Some(e) = self.pool.get_mut(entry) {
            if delay <= 0.0 {
                e.delay += e.mix_duration - mix_duration;
            }
            e.mix_duration = mix_duration;
            e.track_end = mix_duration;
        }
        entry
    }

    /// Mixes every track out to the setup pose.
    pub fn set_empty_animations(&mut self, mix_duration: f32) {
        let old_drain_disabled = self.queue.drain_disabled;
        self.queue.drain_disabled = true;
        for i in 0..self.tracks.len() {
            if let Some(current) = self.tracks[i] {
                let track_index = self.pool[current].track_index;
                self.set_empty_animation(track_index, mix_duration);
            }
        }
        self.queue.drain_disabled = old_drain_disabled;
        self.drain();
    }

    /// Resets rotation directions of every entry, current and mixing out.
    pub fn reset_rotation_directions(&mut self) {
        for i in 0..self.tracks.len() {
            let mut cursor = self.tracks[i];
            while let Some(id) = cursor {
                let e = &mut self.pool[id];
                e.reset_rotation_directions();
                cursor = e.mixing_from;
            }
        }
    }

    fn expand_to_index(&mut self, index: usize) -> Option<TrackEntryId> {
        if index < self.tracks.len() {
            return self.tracks[index];
        }
        self.tracks.resize(index + 1, None);
        None
    }

    fn track_entry(
        &mut self,
        track_index: usize,
        animation_index: Option<usize>,
        animation: Arc<Animation>,
        looped: bool,
        last: Option<TrackEntryId>,
    ) -> TrackEntryId {
        let mix_duration = match last {
            Some(last) => self.data.mix(self.pool[last].animation_index, animation_index),
            None => 0.0,
        };
        let empty = Arc::ptr_eq(&animation, &self.empty_animation);
        let id = self.pool.obtain();
        let e = &mut self.pool[id];
        e.track_index = track_index;
        e.animation_end = animation.duration;
        e.animation = animation;
        e.animation_index = animation_index;
        e.empty = empty;
        e.looped = looped;
        e.mix_duration = mix_duration;
        id
    }

    /// Reclassifies every timeline of every entry, in the order entries are applied.
    fn animations_changed(&mut self) {
        self.queue.animations_changed = false;
        self.property_ids.clear();

        for i in 0..self.tracks.len() {
            let Some(mut entry) = self.tracks[i] else {
                continue;
            };
            while let Some(from) = self.pool[entry].mixing_from {
                entry = from;
            }
            let mut cursor = Some(entry);
            while let Some(id) = cursor {
                let e = &self.pool[id];
                if e.mixing_to.is_none() || e.mix_blend != MixBlend::Add {
                    self.compute_hold(id);
                }
                cursor = self.pool[id].mixing_to;
            }
        }
    }

    /// Returns true if any id was not seen yet.
    fn add_property_ids(&mut self, ids: &[PropertyId]) -> bool {
        let mut added = false;
        for &id in ids {
            added |= self.property_ids.insert(id);
        }
        added
    }

    fn compute_hold(&mut self, id: TrackEntryId) {
        let e = &mut self.pool[id];
        let to = e.mixing_to;
        let animation = Arc::clone(&e.animation);
        let timelines = animation.timelines();
        let mut modes = std::mem::take(&mut e.timeline_mode);
        let mut hold_mix = std::mem::take(&mut e.timeline_hold_mix);
        modes.clear();
        hold_mix.clear();
        hold_mix.resize(timelines.len(), None);

        let hold_previous = to.is_some_and(|to| self.pool[to].hold_previous);
        if hold_previous {
            for timeline in timelines {
                let first = self.add_property_ids(&timeline.property_ids());
                modes.push(if first {
                    TimelineMode::HoldFirst
                } else {
                    TimelineMode::HoldSubsequent
                });
            }
        } else {
            for (i, timeline) in timelines.iter().enumerate() {
                let ids = timeline.property_ids();
                if !self.add_property_ids(&ids) {
                    modes.push(TimelineMode::Subsequent);
                    continue;
                }
                let unheld = matches!(
                    timeline,
                    Timeline::Attachment(_) | Timeline::DrawOrder(_) | Timeline::Event(_)
                );
                let to = match to {
                    Some(to) if !unheld && self.pool[to].animation.has_timeline(&ids) => to,
                    _ => {
                        modes.push(TimelineMode::First);
                        continue;
                    }
                };

                let mut mode = TimelineMode::HoldFirst;
                let mut next = self.pool[to].mixing_to;
                while let Some(n) = next {
                    let ne = &self.pool[n];
                    if ne.animation.has_timeline(&ids) {
                        next = ne.mixing_to;
                        continue;
                    }
                    if ne.mix_duration > 0.0 {
                        mode = TimelineMode::HoldMix;
                        hold_mix[i] = Some(n);
                    }
                    break;
                }
                modes.push(mode);
            }
        }

        let e = &mut self.pool[id];
        e.timeline_mode = modes;
        e.timeline_hold_mix = hold_mix;
    }
}

/// Rotation mixing that remembers, per timeline, the direction and number of turns chosen on the
/// first frame, so later frames keep going the same way instead of flipping at 180 degrees.
#[allow(clippy::too_many_arguments)]
fn apply_rotate_timeline(
    timeline: &RotateTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    timelines_rotation: &mut [f32],
    i: usize,
    first_frame: bool,
) {
    if first_frame {
        timelines_rotation[i] = 0.0;
    }
    if alpha == 1.0 {
        apply_rotate(timeline, skeleton, time, 1.0, blend);
        return;
    }

    let bone_index = timeline.bone_index;
    let Some(bone) = skeleton.bones.get_mut(bone_index) else {
        return;
    };
    if !bone.active {
        return;
    }
    let setup = skeleton.data.bones[bone_index].rotation;

    let (r1, r2) = if time < timeline.curves.first_time() {
        match blend {
            MixBlend::Setup => {
                bone.rotation = setup;
                return;
            }
            MixBlend::First => (bone.rotation, setup),
            MixBlend::Replace | MixBlend::Add => return,
        }
    } else {
        let r1 = if blend == MixBlend::Setup {
            setup
        } else {
            bone.rotation
        };
        (r1, setup + timeline.curve_value(time))
    };

    let diff = wrap_degrees(r2 - r1);
    let total = if diff == 0.0 {
        timelines_rotation[i]
    } else {
        let (mut last_total, last_diff) = if first_frame {
            (0.0, diff)
        } else {
            (timelines_rotation[i], timelines_rotation[i + 1])
        };
        let current = diff > 0.0;
        let mut dir = last_total >= 0.0;
        // Detect a cross at 0, not 180.
        if signum(last_diff) != signum(diff) && last_diff.abs() <= 90.0 {
            // A cross after a full turn is a loop.
            if last_total.abs() > 180.0 {
                last_total += 360.0 * signum(last_total);
            }
            dir = current;
        }
        let mut total = diff + last_total - last_total % 360.0;
        if dir != current {
            total += 360.0 * signum(last_total);
        }
        timelines_rotation[i] = total;
        total
    };
    timelines_rotation[i + 1] = diff;
    bone.rotation = r1 + total * alpha;
}
