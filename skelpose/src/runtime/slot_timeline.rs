use super::curve::{CurveFrames, search};
use crate::{AttachmentData, Event, MixBlend, MixDirection, Skeleton};
use std::sync::Arc;

/// Color keys on a slot. The channel layout depends on the [`crate::Timeline`] variant holding it:
/// `Rgba` (r, g, b, a), `Rgb` (r, g, b), `Alpha` (a), `Rgba2` (r, g, b, a, r2, g2, b2) and
/// `Rgb2` (r, g, b, r2, g2, b2).
#[derive(Clone, Debug)]
pub struct ColorTimeline {
    pub slot_index: usize,
    pub curves: CurveFrames,
}

impl ColorTimeline {
    pub fn rgba(slot_index: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self::with_entries(slot_index, 5, frame_count, bezier_count)
    }

    pub fn rgb(slot_index: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self::with_entries(slot_index, 4, frame_count, bezier_count)
    }

    pub fn alpha(slot_index: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self::with_entries(slot_index, 2, frame_count, bezier_count)
    }

    pub fn rgba2(slot_index: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self::with_entries(slot_index, 8, frame_count, bezier_count)
    }

    pub fn rgb2(slot_index: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self::with_entries(slot_index, 7, frame_count, bezier_count)
    }

    fn with_entries(
        slot_index: usize,
        entries: usize,
        frame_count: usize,
        bezier_count: usize,
    ) -> Self {
        Self {
            slot_index,
            curves: CurveFrames::new(entries, frame_count, bezier_count),
        }
    }

    pub fn set_frame(&mut self, frame: usize, time: f32, channels: &[f32]) {
        self.curves.set_frame(frame, time, channels);
    }

    fn values<const N: usize>(&self, time: f32) -> [f32; N] {
        let i = self.curves.search(time);
        std::array::from_fn(|channel| self.curves.value_at(i, time, channel))
    }
}

fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

fn slot_bone_active(skeleton: &Skeleton, slot_index: usize) -> bool {
    skeleton
        .slots
        .get(slot_index)
        .and_then(|slot| skeleton.bones.get(slot.bone))
        .is_some_and(|bone| bone.active)
}

/// Moves `color` toward `target` by `alpha`, channel by channel, clamping to 0..1.
fn mix_into(color: &mut [f32], target: &[f32], alpha: f32) {
    for (c, t) in color.iter_mut().zip(target) {
        *c = clamp01(*c + (*t - *c) * alpha);
    }
}

pub(crate) fn apply_rgba(
    timeline: &ColorTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    if !slot_bone_active(skeleton, timeline.slot_index) {
        return;
    }
    let setup = skeleton.data.slots[timeline.slot_index].color;
    let slot = &mut skeleton.slots[timeline.slot_index];

    if time < timeline.curves.first_time() {
        match blend {
            MixBlend::Setup => slot.color = setup,
            MixBlend::First => mix_into(&mut slot.color, &setup, alpha),
            MixBlend::Replace | MixBlend::Add => {}
        }
        return;
    }

    let rgba: [f32; 4] = timeline.values(time);
    if alpha == 1.0 {
        slot.color = rgba.map(clamp01);
    } else {
        if blend == MixBlend::Setup {
            slot.color = setup;
        }
        mix_into(&mut slot.color, &rgba, alpha);
    }
}

pub(crate) fn apply_rgb(
    timeline: &ColorTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    if !slot_bone_active(skeleton, timeline.slot_index) {
        return;
    }
    let setup = skeleton.data.slots[timeline.slot_index].color;
    let slot = &mut skeleton.slots[timeline.slot_index];

    if time < timeline.curves.first_time() {
        match blend {
            MixBlend::Setup => slot.color[..3].copy_from_slice(&setup[..3]),
            MixBlend::First => mix_into(&mut slot.color[..3], &setup[..3], alpha),
            MixBlend::Replace | MixBlend::Add => {}
        }
        return;
    }

    let rgb: [f32; 3] = timeline.values(time);
    if alpha == 1.0 {
        mix_into(&mut slot.color[..3], &rgb, 1.0);
    } else {
        if blend == MixBlend::Setup {
            slot.color[..3].copy_from_slice(&setup[..3]);
        }
        mix_into(&mut slot.color[..3], &rgb, alpha);
    }
}

pub(crate) fn apply_alpha(
    timeline: &ColorTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    if !slot_bone_active(skeleton, timeline.slot_index) {
        return;
    }
    let setup = skeleton.data.slots[timeline.slot_index].color[3];
    let slot = &mut skeleton.slots[timeline.slot_index];

    if time < timeline.curves.first_time() {
        match blend {
            MixBlend::Setup => slot.color[3] = setup,
            MixBlend::First => slot.color[3] += (setup - slot.color[3]) * alpha,
            MixBlend::Replace | MixBlend::Add => {}
        }
        return;
    }

    let a = timeline.curves.curve_value(time, 0);
    if alpha == 1.0 {
        slot.color[3] = clamp01(a);
    } else {
        if blend == MixBlend::Setup {
            slot.color[3] = setup;
        }
        slot.color[3] = clamp01(slot.color[3] + (a - slot.color[3]) * alpha);
    }
}

pub(crate) fn apply_rgba2(
    timeline: &ColorTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    if !slot_bone_active(skeleton, timeline.slot_index) {
        return;
    }
    let data = &skeleton.data.slots[timeline.slot_index];
    let (setup_light, setup_dark) = (data.color, data.dark_color);
    let slot = &mut skeleton.slots[timeline.slot_index];

    if time < timeline.curves.first_time() {
        match blend {
            MixBlend::Setup => {
                slot.color = setup_light;
                slot.dark_color = setup_dark;
            }
            MixBlend::First => {
                mix_into(&mut slot.color, &setup_light, alpha);
                for (d, s) in slot.dark_color.iter_mut().zip(setup_dark) {
                    *d += (s - *d) * alpha;
                }
            }
            MixBlend::Replace | MixBlend::Add => {}
        }
        return;
    }

    let v: [f32; 7] = timeline.values(time);
    let (light, dark) = v.split_at(4);
    if alpha == 1.0 {
        mix_into(&mut slot.color, light, 1.0);
        slot.dark_color.copy_from_slice(dark);
    } else {
        if blend == MixBlend::Setup {
            slot.color = setup_light;
            slot.dark_color = setup_dark;
        }
        mix_into(&mut slot.color, light, alpha);
        for (d, k) in slot.dark_color.iter_mut().zip(dark) {
            *d += (*k - *d) * alpha;
        }
    }
}

pub(crate) fn apply_rgb2(
    timeline: &ColorTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    if !slot_bone_active(skeleton, timeline.slot_index) {
        return;
    }
    let data = &skeleton.data.slots[timeline.slot_index];
    let (setup_light, setup_dark) = (data.color, data.dark_color);
    let slot = &mut skeleton.slots[timeline.slot_index];

    if time < timeline.curves.first_time() {
        match blend {
            MixBlend::Setup => {
                slot.color[..3].copy_from_slice(&setup_light[..3]);
                slot.dark_color = setup_dark;
            }
            MixBlend::First => {
                mix_into(&mut slot.color[..3], &setup_light[..3], alpha);
                for (d, s) in slot.dark_color.iter_mut().zip(setup_dark) {
                    *d += (s - *d) * alpha;
                }
            }
            MixBlend::Replace | MixBlend::Add => {}
        }
        return;
    }

    let v: [f32; 6] = timeline.values(time);
    let (light, dark) = v.split_at(3);
    if alpha == 1.0 {
        mix_into(&mut slot.color[..3], light, 1.0);
        slot.dark_color.copy_from_slice(dark);
    } else {
        if blend == MixBlend::Setup {
            slot.color[..3].copy_from_slice(&setup_light[..3]);
            slot.dark_color = setup_dark;
        }
        mix_into(&mut slot.color[..3], light, alpha);
        for (d, k) in slot.dark_color.iter_mut().zip(dark) {
            *d += (*k - *d) * alpha;
        }
    }
}

/// Attachment name keys on a slot; `None` hides the slot.
#[derive(Clone, Debug)]
pub struct AttachmentTimeline {
    pub slot_index: usize,
    pub frames: Vec<f32>,
    pub names: Vec<Option<String>>,
}

impl AttachmentTimeline {
    pub fn new(slot_index: usize, frame_count: usize) -> Self {
        Self {
            slot_index,
            frames: vec![0.0; frame_count],
            names: vec![None; frame_count],
        }
    }

    pub fn set_frame(&mut self, frame: usize, time: f32, name: Option<&str>) {
        self.frames[frame] = time;
        self.names[frame] = name.map(str::to_string);
    }

    /// Attachment keyed at `time`, or `None` before the first key.
    pub(crate) fn keyed_name(&self, time: f32) -> Option<Option<&str>> {
        if self.frames.is_empty() || time < self.frames[0] {
            return None;
        }
        Some(self.names[search(&self.frames, time, 1)].as_deref())
    }
}

pub(crate) fn setup_attachment_name(skeleton: &Skeleton, slot_index: usize) -> Option<String> {
    skeleton.data.slots[slot_index].attachment.clone()
}

pub(crate) fn apply_attachment(
    timeline: &AttachmentTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    if !slot_bone_active(skeleton, timeline.slot_index) {
        return;
    }

    if direction == MixDirection::Out {
        if blend == MixBlend::Setup {
            let setup = setup_attachment_name(skeleton, timeline.slot_index);
            skeleton.set_attachment_by_name(timeline.slot_index, setup.as_deref());
        }
        return;
    }

    match timeline.keyed_name(time) {
        Some(name) => skeleton.set_attachment_by_name(timeline.slot_index, name),
        None => {
            if matches!(blend, MixBlend::Setup | MixBlend::First) {
                let setup = setup_attachment_name(skeleton, timeline.slot_index);
                skeleton.set_attachment_by_name(timeline.slot_index, setup.as_deref());
            }
        }
    }
}

/// Vertex offsets keyed for one vertex attachment. Frames store only the time; each frame's
/// offsets live in `vertices`, and curves map time onto an interpolation percentage.
#[derive(Clone, Debug)]
pub struct DeformTimeline {
    pub slot_index: usize,
    pub attachment: Arc<AttachmentData>,
    pub curves: CurveFrames,
    pub vertices: Vec<Vec<f32>>,
}

impl DeformTimeline {
    pub fn new(
        slot_index: usize,
        attachment: Arc<AttachmentData>,
        frame_count: usize,
        bezier_count: usize,
    ) -> Self {
        Self {
            slot_index,
            attachment,
            curves: CurveFrames::new(1, frame_count, bezier_count),
            vertices: vec![Vec::new(); frame_count],
        }
    }

    pub fn set_frame(&mut self, frame: usize, time: f32, vertices: Vec<f32>) {
        self.curves.set_frame(frame, time, &[]);
        self.vertices[frame] = vertices;
    }

    pub(crate) fn attachment_id(&self) -> u32 {
        self.attachment.timeline_id().unwrap_or(0)
    }
}

pub(crate) fn apply_deform(
    timeline: &DeformTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    mut alpha: f32,
    mut blend: MixBlend,
) {
    if !slot_bone_active(skeleton, timeline.slot_index) {
        return;
    }
    let Some(setup) = timeline.attachment.vertices() else {
        return;
    };
    let slot = &mut skeleton.slots[timeline.slot_index];
    let keyed = slot
        .attachment
        .as_ref()
        .and_then(|a| a.timeline_id())
        .is_some_and(|id| Some(id) == timeline.attachment.timeline_id());
    if !keyed || timeline.vertices.is_empty() {
        return;
    }

    let vertex_count = timeline.vertices[0].len();
    if slot.deform.is_empty() {
        blend = MixBlend::Setup;
    } else if slot.deform.len() != vertex_count {
        alpha = 1.0;
    }
    let weighted = setup.is_weighted();
    let frames = timeline.curves.frames();

    if time < frames[0] {
        match blend {
            MixBlend::Setup => slot.deform.clear(),
            MixBlend::First => {
                if alpha == 1.0 {
                    slot.deform.clear();
                    return;
                }
                slot.deform.resize(vertex_count, 0.0);
                if weighted {
                    let keep = 1.0 - alpha;
                    slot.deform.iter_mut().for_each(|d| *d *= keep);
                } else {
                    for (i, d) in slot.deform.iter_mut().enumerate() {
                        *d += (setup.setup_value(i) - *d) * alpha;
                    }
                }
            }
            MixBlend::Replace | MixBlend::Add => {}
        }
        return;
    }

    slot.deform.resize(vertex_count, 0.0);
    let deform = &mut slot.deform;

    // Past the last key the last offsets are used as is; otherwise interpolate by the curve.
    let last = frames.len() - 1;
    let (prev, next, percent) = if time >= frames[last] {
        (&timeline.vertices[last], &timeline.vertices[last], 0.0)
    } else {
        let frame = search(frames, time, 1);
        (
            &timeline.vertices[frame],
            &timeline.vertices[frame + 1],
            timeline.curves.percent(time, frame),
        )
    };
    let value = |i: usize| prev[i] + (next[i] - prev[i]) * percent;
    let setup_value = |i: usize| if weighted { 0.0 } else { setup.setup_value(i) };

    if alpha == 1.0 {
        if blend == MixBlend::Add {
            for (i, d) in deform.iter_mut().enumerate() {
                *d += value(i) - setup_value(i);
            }
        } else {
            for (i, d) in deform.iter_mut().enumerate() {
                *d = value(i);
            }
        }
        return;
    }

    match blend {
        MixBlend::Setup => {
            for (i, d) in deform.iter_mut().enumerate() {
                let s = setup_value(i);
                *d = s + (value(i) - s) * alpha;
            }
        }
        MixBlend::First | MixBlend::Replace => {
            for (i, d) in deform.iter_mut().enumerate() {
                *d += (value(i) - *d) * alpha;
            }
        }
        MixBlend::Add => {
            for (i, d) in deform.iter_mut().enumerate() {
                *d += (value(i) - setup_value(i)) * alpha;
            }
        }
    }
}

/// Events keyed by time. Several events may share a time.
#[derive(Clone, Debug, Default)]
pub struct EventTimeline {
    pub frames: Vec<f32>,
    pub events: Vec<Event>,
}

impl EventTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event; events must be added in time order.
    pub fn push(&mut self, event: Event) {
        self.frames.push(event.time);
        self.events.push(event);
    }
}

/// Collects events keyed in `(last_time, time]`. When `last_time > time` the animation wrapped:
/// the tail of the previous pass fires first, then the new pass from its start.
pub(crate) fn apply_events(
    timeline: &EventTimeline,
    mut last_time: f32,
    time: f32,
    out: &mut Vec<Event>,
) {
    let frames = &timeline.frames;
    let Some(&last_frame) = frames.last() else {
        return;
    };

    if last_time > time {
        apply_events(timeline, last_time, f32::MAX, out);
        last_time = -1.0;
    } else if last_time >= last_frame {
        return;
    }
    if time < frames[0] {
        return;
    }

    let mut i = if last_time < frames[0] {
        0
    } else {
        let mut i = search(frames, last_time, 1) + 1;
        let frame_time = frames[i];
        while i > 0 && frames[i - 1] == frame_time {
            i -= 1;
        }
        i
    };
    while i < frames.len() && time >= frames[i] {
        out.push(timeline.events[i].clone());
        i += 1;
    }
}

/// Draw order keys. Each key maps draw position to setup slot index; `None` restores setup order.
#[derive(Clone, Debug)]
pub struct DrawOrderTimeline {
    pub frames: Vec<f32>,
    pub draw_orders: Vec<Option<Vec<usize>>>,
}

impl DrawOrderTimeline {
    pub fn new(frame_count: usize) -> Self {
        Self {
            frames: vec![0.0; frame_count],
            draw_orders: vec![None; frame_count],
        }
    }

    pub fn set_frame(&mut self, frame: usize, time: f32, draw_order: Option<Vec<usize>>) {
        self.frames[frame] = time;
        self.draw_orders[frame] = draw_order;
    }
}

fn reset_draw_order(skeleton: &mut Skeleton) {
    for (i, slot) in skeleton.draw_order.iter_mut().enumerate() {
        *slot = i;
    }
}

pub(crate) fn apply_draw_order(
    timeline: &DrawOrderTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    if direction == MixDirection::Out {
        if blend == MixBlend::Setup {
            reset_draw_order(skeleton);
        }
        return;
    }

    if timeline.frames.is_empty() || time < timeline.frames[0] {
        if matches!(blend, MixBlend::Setup | MixBlend::First) {
            reset_draw_order(skeleton);
        }
        return;
    }

    match &timeline.draw_orders[search(&timeline.frames, time, 1)] {
        None => reset_draw_order(skeleton),
        Some(order) => {
            for (slot, &setup_index) in skeleton.draw_order.iter_mut().zip(order) {
                *slot = setup_index;
            }
        }
    }
}
