use super::bone::wrap_degrees;
use super::constraint_timeline::{
    IkConstraintTimeline, PathConstraintMixTimeline, PathConstraintTimeline1,
    TransformConstraintTimeline, apply_ik_constraint_timeline, apply_path_mix_timeline,
    apply_path_position_timeline, apply_path_spacing_timeline,
    apply_transform_constraint_timeline,
};
use super::curve::{CurveFrames, CurveType};
use super::slot_timeline::{
    AttachmentTimeline, ColorTimeline, DeformTimeline, DrawOrderTimeline, EventTimeline,
    apply_alpha, apply_attachment, apply_deform, apply_draw_order, apply_events, apply_rgb,
    apply_rgb2, apply_rgba, apply_rgba2,
};
use crate::{Event, MixBlend, MixDirection, Skeleton};

/// Animatable properties; combined with an object index into a [`PropertyId`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Property {
    Rotate,
    X,
    Y,
    ScaleX,
    ScaleY,
    ShearX,
    ShearY,
    Rgb,
    Alpha,
    Rgb2,
    Attachment,
    Deform,
    Event,
    DrawOrder,
    IkConstraint,
    TransformConstraint,
    PathConstraintPosition,
    PathConstraintSpacing,
    PathConstraintMix,
}

pub type PropertyId = u64;

pub fn property_id(property: Property, index: u32) -> PropertyId {
    ((property as u64) << 32) | u64::from(index)
}

/// Timeline with one value channel keyed on a bone.
#[derive(Clone, Debug)]
pub struct BoneTimeline1 {
    pub bone_index: usize,
    pub curves: CurveFrames,
}

impl BoneTimeline1 {
    pub const ENTRIES: usize = 2;

    pub fn new(bone_index: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            bone_index,
            curves: CurveFrames::new(Self::ENTRIES, frame_count, bezier_count),
        }
    }

    pub fn set_frame(&mut self, frame: usize, time: f32, value: f32) {
        self.curves.set_frame(frame, time, &[value]);
    }
}

/// Timeline with an (x, y) channel pair keyed on a bone.
#[derive(Clone, Debug)]
pub struct BoneTimeline2 {
    pub bone_index: usize,
    pub curves: CurveFrames,
}

impl BoneTimeline2 {
    pub const ENTRIES: usize = 3;

    pub fn new(bone_index: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            bone_index,
            curves: CurveFrames::new(Self::ENTRIES, frame_count, bezier_count),
        }
    }

    pub fn set_frame(&mut self, frame: usize, time: f32, x: f32, y: f32) {
        self.curves.set_frame(frame, time, &[x, y]);
    }

    fn values(&self, time: f32) -> (f32, f32) {
        let i = self.curves.search(time);
        (
            self.curves.value_at(i, time, 0),
            self.curves.value_at(i, time, 1),
        )
    }
}

/// Rotation keys in degrees. Each span between keys takes the shorter arc.
#[derive(Clone, Debug)]
pub struct RotateTimeline {
    pub bone_index: usize,
    pub curves: CurveFrames,
}

impl RotateTimeline {
    pub const ENTRIES: usize = 2;

    pub fn new(bone_index: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            bone_index,
            curves: CurveFrames::new(Self::ENTRIES, frame_count, bezier_count),
        }
    }

    pub fn set_frame(&mut self, frame: usize, time: f32, degrees: f32) {
        self.curves.set_frame(frame, time, &[degrees]);
    }

    /// Bezier between `frame` and the next key; `value2` is moved onto the shorter arc.
    #[allow(clippy::too_many_arguments)]
    pub fn set_bezier(
        &mut self,
        bezier: usize,
        frame: usize,
        time1: f32,
        value1: f32,
        cx1: f32,
        cy1: f32,
        cx2: f32,
        cy2: f32,
        time2: f32,
        value2: f32,
    ) {
        let shift = value1 + wrap_degrees(value2 - value1) - value2;
        self.curves.set_bezier(
            bezier,
            frame,
            0,
            time1,
            value1,
            cx1,
            cy1,
            cx2,
            cy2 + shift,
            time2,
            value2 + shift,
        );
    }

    /// Keyed rotation at `time`, relative to the bone's setup rotation.
    pub fn curve_value(&self, time: f32) -> f32 {
        let frames = self.curves.frames();
        let i = self.curves.search(time);
        let value = frames[i + 1];
        match self.curves.curve_type(i / Self::ENTRIES) {
            CurveType::Stepped => value,
            CurveType::Linear => {
                let before = frames[i];
                let after = frames[i + Self::ENTRIES];
                let span = wrap_degrees(frames[i + Self::ENTRIES + 1] - value);
                value + (time - before) / (after - before) * span
            }
            CurveType::Bezier(start) => self.bezier_value(time, i, start),
        }
    }

    fn bezier_value(&self, time: f32, i: usize, start: usize) -> f32 {
        let frames = self.curves.frames();
        let value = frames[i + 1];
        let next_value = value + wrap_degrees(frames[i + Self::ENTRIES + 1] - value);
        self.curves.bezier_value_to(time, i, 1, start, next_value)
    }
}

/// A closed set of keyed channels applied to a skeleton.
#[derive(Clone, Debug)]
pub enum Timeline {
    Rotate(RotateTimeline),
    Translate(BoneTimeline2),
    TranslateX(BoneTimeline1),
    TranslateY(BoneTimeline1),
    Scale(BoneTimeline2),
    ScaleX(BoneTimeline1),
    ScaleY(BoneTimeline1),
    Shear(BoneTimeline2),
    ShearX(BoneTimeline1),
    ShearY(BoneTimeline1),
    Rgba(ColorTimeline),
    Rgb(ColorTimeline),
    Alpha(ColorTimeline),
    Rgba2(ColorTimeline),
    Rgb2(ColorTimeline),
    Attachment(AttachmentTimeline),
    Deform(DeformTimeline),
    Event(EventTimeline),
    DrawOrder(DrawOrderTimeline),
    IkConstraint(IkConstraintTimeline),
    TransformConstraint(TransformConstraintTimeline),
    PathConstraintPosition(PathConstraintTimeline1),
    PathConstraintSpacing(PathConstraintTimeline1),
    PathConstraintMix(PathConstraintMixTimeline),
}

impl Timeline {
    pub fn property_ids(&self) -> Vec<PropertyId> {
        let bone = |i: usize| i as u32;
        match self {
            Timeline::Rotate(t) => vec![property_id(Property::Rotate, bone(t.bone_index))],
            Timeline::Translate(t) => vec![
                property_id(Property::X, bone(t.bone_index)),
                property_id(Property::Y, bone(t.bone_index)),
            ],
            Timeline::TranslateX(t) => vec![property_id(Property::X, bone(t.bone_index))],
            Timeline::TranslateY(t) => vec![property_id(Property::Y, bone(t.bone_index))],
            Timeline::Scale(t) => vec![
                property_id(Property::ScaleX, bone(t.bone_index)),
                property_id(Property::ScaleY, bone(t.bone_index)),
            ],
            Timeline::ScaleX(t) => vec![property_id(Property::ScaleX, bone(t.bone_index))],
            Timeline::ScaleY(t) => vec![property_id(Property::ScaleY, bone(t.bone_index))],
            Timeline::Shear(t) => vec![
                property_id(Property::ShearX, bone(t.bone_index)),
                property_id(Property::ShearY, bone(t.bone_index)),
            ],
            Timeline::ShearX(t) => vec![property_id(Property::ShearX, bone(t.bone_index))],
            Timeline::ShearY(t) => vec![property_id(Property::ShearY, bone(t.bone_index))],
            Timeline::Rgba(t) => {
                let slot = t.slot_index as u32;
                vec![
                    property_id(Property::Rgb, slot),
                    property_id(Property::Alpha, slot),
                ]
            }
            Timeline::Rgb(t) => vec![property_id(Property::Rgb, t.slot_index as u32)],
            Timeline::Alpha(t) => vec![property_id(Property::Alpha, t.slot_index as u32)],
            Timeline::Rgba2(t) => {
                let slot = t.slot_index as u32;
                vec![
                    property_id(Property::Rgb, slot),
                    property_id(Property::Alpha, slot),
                    property_id(Property::Rgb2, slot),
                ]
            }
            Timeline::Rgb2(t) => {
                let slot = t.slot_index as u32;
                vec![
                    property_id(Property::Rgb, slot),
                    property_id(Property::Rgb2, slot),
                ]
            }
            Timeline::Attachment(t) => {
                vec![property_id(Property::Attachment, t.slot_index as u32)]
            }
            Timeline::Deform(t) => {
                let low = ((t.slot_index as u32) << 16) | (t.attachment_id() & 0xffff);
                vec![property_id(Property::Deform, low)]
            }
            Timeline::Event(_) => vec![property_id(Property::Event, 0)],
            Timeline::DrawOrder(_) => vec![property_id(Property::DrawOrder, 0)],
            Timeline::IkConstraint(t) => vec![property_id(
                Property::IkConstraint,
                t.constraint_index as u32,
            )],
            Timeline::TransformConstraint(t) => vec![property_id(
                Property::TransformConstraint,
                t.constraint_index as u32,
            )],
            Timeline::PathConstraintPosition(t) => vec![property_id(
                Property::PathConstraintPosition,
                t.constraint_index as u32,
            )],
            Timeline::PathConstraintSpacing(t) => vec![property_id(
                Property::PathConstraintSpacing,
                t.constraint_index as u32,
            )],
            Timeline::PathConstraintMix(t) => vec![property_id(
                Property::PathConstraintMix,
                t.constraint_index as u32,
            )],
        }
    }

    /// Time of the last key.
    pub fn duration(&self) -> f32 {
        match self {
            Timeline::Rotate(t) => t.curves.duration(),
            Timeline::Translate(t) | Timeline::Scale(t) | Timeline::Shear(t) => {
                t.curves.duration()
            }
            Timeline::TranslateX(t)
            | Timeline::TranslateY(t)
            | Timeline::ScaleX(t)
            | Timeline::ScaleY(t)
            | Timeline::ShearX(t)
            | Timeline::ShearY(t) => t.curves.duration(),
            Timeline::Rgba(t)
            | Timeline::Rgb(t)
            | Timeline::Alpha(t)
            | Timeline::Rgba2(t)
            | Timeline::Rgb2(t) => t.curves.duration(),
            Timeline::Attachment(t) => t.frames.last().copied().unwrap_or(0.0),
            Timeline::Deform(t) => t.curves.duration(),
            Timeline::Event(t) => t.frames.last().copied().unwrap_or(0.0),
            Timeline::DrawOrder(t) => t.frames.last().copied().unwrap_or(0.0),
            Timeline::IkConstraint(t) => t.curves.duration(),
            Timeline::TransformConstraint(t) => t.curves.duration(),
            Timeline::PathConstraintPosition(t) | Timeline::PathConstraintSpacing(t) => {
                t.curves.duration()
            }
            Timeline::PathConstraintMix(t) => t.curves.duration(),
        }
    }

    /// Applies the timeline's value at `time` to `skeleton`.
    ///
    /// `events` receives events keyed in `(last_time, time]`; pass `None` to skip firing.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        skeleton: &mut Skeleton,
        last_time: f32,
        time: f32,
        events: Option<&mut Vec<Event>>,
        alpha: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        match self {
            Timeline::Rotate(t) => apply_rotate(t, skeleton, time, alpha, blend),
            Timeline::Translate(t) => apply_translate(t, skeleton, time, alpha, blend),
            Timeline::TranslateX(t) => {
                apply_bone_value(t, skeleton, time, alpha, blend, BoneChannel::X)
            }
            Timeline::TranslateY(t) => {
                apply_bone_value(t, skeleton, time, alpha, blend, BoneChannel::Y)
            }
            Timeline::Scale(t) => apply_scale(t, skeleton, time, alpha, blend, direction),
            Timeline::ScaleX(t) => {
                apply_scale_value(t, skeleton, time, alpha, blend, direction, ScaleAxis::X)
            }
            Timeline::ScaleY(t) => {
                apply_scale_value(t, skeleton, time, alpha, blend, direction, ScaleAxis::Y)
            }
            Timeline::Shear(t) => apply_shear(t, skeleton, time, alpha, blend),
            Timeline::ShearX(t) => {
                apply_bone_value(t, skeleton, time, alpha, blend, BoneChannel::ShearX)
            }
            Timeline::ShearY(t) => {
                apply_bone_value(t, skeleton, time, alpha, blend, BoneChannel::ShearY)
            }
            Timeline::Rgba(t) => apply_rgba(t, skeleton, time, alpha, blend),
            Timeline::Rgb(t) => apply_rgb(t, skeleton, time, alpha, blend),
            Timeline::Alpha(t) => apply_alpha(t, skeleton, time, alpha, blend),
            Timeline::Rgba2(t) => apply_rgba2(t, skeleton, time, alpha, blend),
            Timeline::Rgb2(t) => apply_rgb2(t, skeleton, time, alpha, blend),
            Timeline::Attachment(t) => apply_attachment(t, skeleton, time, blend, direction),
            Timeline::Deform(t) => apply_deform(t, skeleton, time, alpha, blend),
            Timeline::Event(t) => {
                if let Some(events) = events {
                    apply_events(t, last_time, time, events);
                }
            }
            Timeline::DrawOrder(t) => apply_draw_order(t, skeleton, time, blend, direction),
            Timeline::IkConstraint(t) => {
                apply_ik_constraint_timeline(t, skeleton, time, alpha, blend, direction)
            }
            Timeline::TransformConstraint(t) => {
                apply_transform_constraint_timeline(t, skeleton, time, alpha, blend)
            }
            Timeline::PathConstraintPosition(t) => {
                apply_path_position_timeline(t, skeleton, time, alpha, blend)
            }
            Timeline::PathConstraintSpacing(t) => {
                apply_path_spacing_timeline(t, skeleton, time, alpha, blend)
            }
            Timeline::PathConstraintMix(t) => {
                apply_path_mix_timeline(t, skeleton, time, alpha, blend)
            }
        }
    }
}

/// Java-style sign: zero stays zero.
pub(crate) fn signum(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Blends a value relative to its setup value, the rule shared by additive-capable channels.
pub(crate) fn blend_relative(
    current: f32,
    setup: f32,
    value: f32,
    alpha: f32,
    blend: MixBlend,
) -> f32 {
    match blend {
        MixBlend::Setup => setup + value * alpha,
        MixBlend::First | MixBlend::Replace => current + (value + setup - current) * alpha,
        MixBlend::Add => current + value * alpha,
    }
}

/// Value before the first key: setup resets, first eases toward setup, otherwise unchanged.
pub(crate) fn blend_before_first(current: f32, setup: f32, alpha: f32, blend: MixBlend) -> f32 {
    match blend {
        MixBlend::Setup => setup,
        MixBlend::First => current + (setup - current) * alpha,
        MixBlend::Replace | MixBlend::Add => current,
    }
}

pub(crate) fn apply_rotate(
    timeline: &RotateTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    let Some(bone) = skeleton.bones.get_mut(timeline.bone_index) else {
        return;
    };
    if !bone.active {
        return;
    }
    let setup = skeleton.data.bones[timeline.bone_index].rotation;

    if time < timeline.curves.first_time() {
        bone.rotation = blend_before_first(bone.rotation, setup, alpha, blend);
        return;
    }

    let value = timeline.curve_value(time);
    bone.rotation = blend_relative(bone.rotation, setup, value, alpha, blend);
}

#[derive(Copy, Clone, Debug)]
enum BoneChannel {
    X,
    Y,
    ShearX,
    ShearY,
}

fn apply_bone_value(
    timeline: &BoneTimeline1,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    channel: BoneChannel,
) {
    let Some(bone) = skeleton.bones.get_mut(timeline.bone_index) else {
        return;
    };
    if !bone.active {
        return;
    }
    let data = &skeleton.data.bones[timeline.bone_index];
    let (current, setup) = match channel {
        BoneChannel::X => (&mut bone.x, data.x),
        BoneChannel::Y => (&mut bone.y, data.y),
        BoneChannel::ShearX => (&mut bone.shear_x, data.shear_x),
        BoneChannel::ShearY => (&mut bone.shear_y, data.shear_y),
    };

    if time < timeline.curves.first_time() {
        *current = blend_before_first(*current, setup, alpha, blend);
        return;
    }

    let value = timeline.curves.curve_value(time, 0);
    *current = blend_relative(*current, setup, value, alpha, blend);
}

fn apply_translate(
    timeline: &BoneTimeline2,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    let Some(bone) = skeleton.bones.get_mut(timeline.bone_index) else {
        return;
    };
    if !bone.active {
        return;
    }
    let data = &skeleton.data.bones[timeline.bone_index];

    if time < timeline.curves.first_time() {
        bone.x = blend_before_first(bone.x, data.x, alpha, blend);
        bone.y = blend_before_first(bone.y, data.y, alpha, blend);
        return;
    }

    let (x, y) = timeline.values(time);
    bone.x = blend_relative(bone.x, data.x, x, alpha, blend);
    bone.y = blend_relative(bone.y, data.y, y, alpha, blend);
}

fn apply_shear(
    timeline: &BoneTimeline2,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    let Some(bone) = skeleton.bones.get_mut(timeline.bone_index) else {
        return;
    };
    if !bone.active {
        return;
    }
    let data = &skeleton.data.bones[timeline.bone_index];

    if time < timeline.curves.first_time() {
        bone.shear_x = blend_before_first(bone.shear_x, data.shear_x, alpha, blend);
        bone.shear_y = blend_before_first(bone.shear_y, data.shear_y, alpha, blend);
        return;
    }

    let (x, y) = timeline.values(time);
    bone.shear_x = blend_relative(bone.shear_x, data.shear_x, x, alpha, blend);
    bone.shear_y = blend_relative(bone.shear_y, data.shear_y, y, alpha, blend);
}

/// Scale keys are multipliers of the setup scale. When mixing, the sign of the setup or current
/// scale is kept on mix-out and the key's sign is taken on mix-in, so flips do not pass through 0.
fn blend_scale(
    current: f32,
    setup: f32,
    value: f32,
    alpha: f32,
    blend: MixBlend,
    direction: MixDirection,
) -> f32 {
    let value = value * setup;
    if alpha == 1.0 {
        return if blend == MixBlend::Add {
            current + value - setup
        } else {
            value
        };
    }
    match (direction, blend) {
        (_, MixBlend::Add) => current + (value - setup) * alpha,
        (MixDirection::Out, MixBlend::Setup) => {
            setup + (value.abs() * signum(setup) - setup) * alpha
        }
        (MixDirection::Out, _) => current + (value.abs() * signum(current) - current) * alpha,
        (MixDirection::In, MixBlend::Setup) => {
            let base = setup.abs() * signum(value);
            base + (value - base) * alpha
        }
        (MixDirection::In, _) => {
            let base = current.abs() * signum(value);
            base + (value - base) * alpha
        }
    }
}

fn apply_scale(
    timeline: &BoneTimeline2,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    let Some(bone) = skeleton.bones.get_mut(timeline.bone_index) else {
        return;
    };
    if !bone.active {
        return;
    }
    let data = &skeleton.data.bones[timeline.bone_index];

    if time < timeline.curves.first_time() {
        bone.scale_x = blend_before_first(bone.scale_x, data.scale_x, alpha, blend);
        bone.scale_y = blend_before_first(bone.scale_y, data.scale_y, alpha, blend);
        return;
    }

    let (x, y) = timeline.values(time);
    bone.scale_x = blend_scale(bone.scale_x, data.scale_x, x, alpha, blend, direction);
    bone.scale_y = blend_scale(bone.scale_y, data.scale_y, y, alpha, blend, direction);
}

#[derive(Copy, Clone, Debug)]
enum ScaleAxis {
    X,
    Y,
}

fn apply_scale_value(
    timeline: &BoneTimeline1,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    direction: MixDirection,
    axis: ScaleAxis,
) {
    let Some(bone) = skeleton.bones.get_mut(timeline.bone_index) else {
        return;
    };
    if !bone.active {
        return;
    }
    let data = &skeleton.data.bones[timeline.bone_index];
    let (current, setup) = match axis {
        ScaleAxis::X => (&mut bone.scale_x, data.scale_x),
        ScaleAxis::Y => (&mut bone.scale_y, data.scale_y),
    };

    if time < timeline.curves.first_time() {
        *current = blend_before_first(*current, setup, alpha, blend);
        return;
    }

    let value = timeline.curves.curve_value(time, 0);
    *current = blend_scale(*current, setup, value, alpha, blend, direction);
}
