use super::timeline::{PropertyId, Timeline};
use crate::{Event, Skeleton};
use std::collections::HashSet;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MixBlend {
    Setup,
    First,
    Replace,
    Add,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MixDirection {
    In,
    Out,
}

pub(crate) const ANIMATION_STATE_CURRENT: i32 = 2;
pub(crate) const ANIMATION_STATE_SETUP: i32 = 1;

/// A named, immutable set of timelines. Timelines are applied in insertion order.
#[derive(Clone, Debug)]
pub struct Animation {
    pub name: String,
    pub duration: f32,
    timelines: Vec<Timeline>,
    timeline_ids: HashSet<PropertyId>,
}

impl Animation {
    /// Builds an animation whose duration is the last key time over all timelines.
    pub fn new(name: impl Into<String>, timelines: Vec<Timeline>) -> Self {
        let duration = timelines
            .iter()
            .map(Timeline::duration)
            .fold(0.0_f32, f32::max);
        Self::with_duration(name, timelines, duration)
    }

    pub fn with_duration(name: impl Into<String>, timelines: Vec<Timeline>, duration: f32) -> Self {
        let timeline_ids = timelines.iter().flat_map(Timeline::property_ids).collect();
        Self {
            name: name.into(),
            duration,
            timelines,
            timeline_ids,
        }
    }

    pub fn timelines(&self) -> &[Timeline] {
        &self.timelines
    }

    /// True if any timeline animates one of `ids`.
    pub fn has_timeline(&self, ids: &[PropertyId]) -> bool {
        ids.iter().any(|id| self.timeline_ids.contains(id))
    }

    /// Applies every timeline at `time`.
    ///
    /// When `looped` is set and the duration is non-zero, both times wrap modulo the duration.
    /// Events keyed in `(last_time, time]` are appended to `events` when given.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        skeleton: &mut Skeleton,
        mut last_time: f32,
        mut time: f32,
        looped: bool,
        mut events: Option<&mut Vec<Event>>,
        alpha: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        if looped && self.duration != 0.0 {
            time %= self.duration;
            if last_time > 0.0 {
                last_time %= self.duration;
            }
        }

        for timeline in &self.timelines {
            timeline.apply(
                skeleton,
                last_time,
                time,
                events.as_deref_mut(),
                alpha,
                blend,
                direction,
            );
        }
    }
}
