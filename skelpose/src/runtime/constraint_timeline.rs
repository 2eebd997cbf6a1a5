use super::curve::CurveFrames;
use crate::{MixBlend, MixDirection, Skeleton};

/// Keys mix, softness, bend direction, compress and stretch of an IK constraint.
#[derive(Clone, Debug)]
pub struct IkConstraintTimeline {
    pub constraint_index: usize,
    pub curves: CurveFrames,
}

impl IkConstraintTimeline {
    pub const ENTRIES: usize = 6;

    pub fn new(constraint_index: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            constraint_index,
            curves: CurveFrames::new(Self::ENTRIES, frame_count, bezier_count),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_frame(
        &mut self,
        frame: usize,
        time: f32,
        mix: f32,
        softness: f32,
        bend_direction: i32,
        compress: bool,
        stretch: bool,
    ) {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        self.curves.set_frame(
            frame,
            time,
            &[mix, softness, bend_direction as f32, flag(compress), flag(stretch)],
        );
    }
}

/// Keys the six mixes of a transform constraint.
#[derive(Clone, Debug)]
pub struct TransformConstraintTimeline {
    pub constraint_index: usize,
    pub curves: CurveFrames,
}

impl TransformConstraintTimeline {
    pub const ENTRIES: usize = 7;

    pub fn new(constraint_index: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            constraint_index,
            curves: CurveFrames::new(Self::ENTRIES, frame_count, bezier_count),
        }
    }

    /// `mixes` is rotate, x, y, scale x, scale y, shear y.
    pub fn set_frame(&mut self, frame: usize, time: f32, mixes: [f32; 6]) {
        self.curves.set_frame(frame, time, &mixes);
    }
}

/// Keys a single path constraint value: position or spacing, per the holding timeline variant.
#[derive(Clone, Debug)]
pub struct PathConstraintTimeline1 {
    pub constraint_index: usize,
    pub curves: CurveFrames,
}

impl PathConstraintTimeline1 {
    pub const ENTRIES: usize = 2;

    pub fn new(constraint_index: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            constraint_index,
            curves: CurveFrames::new(Self::ENTRIES, frame_count, bezier_count),
        }
    }

    pub fn set_frame(&mut self, frame: usize, time: f32, value: f32) {
        self.curves.set_frame(frame, time, &[value]);
    }
}

/// Keys the rotate, x and y mixes of a path constraint.
#[derive(Clone, Debug)]
pub struct PathConstraintMixTimeline {
    pub constraint_index: usize,
    pub curves: CurveFrames,
}

impl PathConstraintMixTimeline {
    pub const ENTRIES: usize = 4;

    pub fn new(constraint_index: usize, frame_count: usize, bezier_count: usize) -> Self {
        Self {
            constraint_index,
            curves: CurveFrames::new(Self::ENTRIES, frame_count, bezier_count),
        }
    }

    pub fn set_frame(&mut self, frame: usize, time: f32, rotate: f32, x: f32, y: f32) {
        self.curves.set_frame(frame, time, &[rotate, x, y]);
    }
}

/// Absolute blend: setup eases from the setup value, everything else from the current value.
fn mix_absolute(current: f32, setup: f32, value: f32, alpha: f32, blend: MixBlend) -> f32 {
    if blend == MixBlend::Setup {
        setup + (value - setup) * alpha
    } else {
        current + (value - current) * alpha
    }
}

fn before_first(current: &mut f32, setup: f32, alpha: f32, blend: MixBlend) {
    match blend {
        MixBlend::Setup => *current = setup,
        MixBlend::First => *current += (setup - *current) * alpha,
        MixBlend::Replace | MixBlend::Add => {}
    }
}

pub(crate) fn apply_ik_constraint_timeline(
    timeline: &IkConstraintTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    let Some(constraint) = skeleton.ik_constraints.get_mut(timeline.constraint_index) else {
        log::warn!("ik timeline targets missing constraint {}", timeline.constraint_index);
        return;
    };
    if !constraint.active {
        return;
    }
    let data = &skeleton.data.ik_constraints[timeline.constraint_index];
    let curves = &timeline.curves;

    if time < curves.first_time() {
        before_first(&mut constraint.mix, data.mix, alpha, blend);
        before_first(&mut constraint.softness, data.softness, alpha, blend);
        if matches!(blend, MixBlend::Setup | MixBlend::First) {
            constraint.bend_direction = data.bend_direction;
            constraint.compress = data.compress;
            constraint.stretch = data.stretch;
        }
        return;
    }

    let i = curves.search(time);
    let mix = curves.value_at(i, time, 0);
    let softness = curves.value_at(i, time, 1);
    constraint.mix = mix_absolute(constraint.mix, data.mix, mix, alpha, blend);
    constraint.softness = mix_absolute(constraint.softness, data.softness, softness, alpha, blend);

    let frames = curves.frames();
    if direction == MixDirection::In {
        constraint.bend_direction = frames[i + 3] as i32;
        constraint.compress = frames[i + 4] != 0.0;
        constraint.stretch = frames[i + 5] != 0.0;
    } else if blend == MixBlend::Setup {
        constraint.bend_direction = data.bend_direction;
        constraint.compress = data.compress;
        constraint.stretch = data.stretch;
    }
}

pub(crate) fn apply_transform_constraint_timeline(
    timeline: &TransformConstraintTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    let Some(constraint) = skeleton
        .transform_constraints
        .get_mut(timeline.constraint_index)
    else {
        log::warn!(
            "transform timeline targets missing constraint {}",
            timeline.constraint_index
        );
        return;
    };
    if !constraint.active {
        return;
    }
    let data = &skeleton.data.transform_constraints[timeline.constraint_index];
    let setup = [
        data.mix_rotate,
        data.mix_x,
        data.mix_y,
        data.mix_scale_x,
        data.mix_scale_y,
        data.mix_shear_y,
    ];
    let mut current = [
        constraint.mix_rotate,
        constraint.mix_x,
        constraint.mix_y,
        constraint.mix_scale_x,
        constraint.mix_scale_y,
        constraint.mix_shear_y,
    ];
    let curves = &timeline.curves;

    if time < curves.first_time() {
        for (c, s) in current.iter_mut().zip(setup) {
            before_first(c, s, alpha, blend);
        }
    } else {
        let i = curves.search(time);
        for (channel, (c, s)) in current.iter_mut().zip(setup).enumerate() {
            *c = mix_absolute(*c, s, curves.value_at(i, time, channel), alpha, blend);
        }
    }

    [
        constraint.mix_rotate,
        constraint.mix_x,
        constraint.mix_y,
        constraint.mix_scale_x,
        constraint.mix_scale_y,
        constraint.mix_shear_y,
    ] = current;
}

#[derive(Copy, Clone, Debug)]
enum PathValue {
    Position,
    Spacing,
}

fn apply_path_value(
    timeline: &PathConstraintTimeline1,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    which: PathValue,
) {
    let Some(constraint) = skeleton.path_constraints.get_mut(timeline.constraint_index) else {
        log::warn!("path timeline targets missing constraint {}", timeline.constraint_index);
        return;
    };
    if !constraint.active {
        return;
    }
    let data = &skeleton.data.path_constraints[timeline.constraint_index];
    let (current, setup) = match which {
        PathValue::Position => (&mut constraint.position, data.position),
        PathValue::Spacing => (&mut constraint.spacing, data.spacing),
    };

    if time < timeline.curves.first_time() {
        before_first(current, setup, alpha, blend);
        return;
    }
    let value = timeline.curves.curve_value(time, 0);
    *current = mix_absolute(*current, setup, value, alpha, blend);
}

pub(crate) fn apply_path_position_timeline(
    timeline: &PathConstraintTimeline1,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    apply_path_value(timeline, skeleton, time, alpha, blend, PathValue::Position);
}

pub(crate) fn apply_path_spacing_timeline(
    timeline: &PathConstraintTimeline1,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    apply_path_value(timeline, skeleton, time, alpha, blend, PathValue::Spacing);
}

pub(crate) fn apply_path_mix_timeline(
    timeline: &PathConstraintMixTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    let Some(constraint) = skeleton.path_constraints.get_mut(timeline.constraint_index) else {
        log::warn!("path mix timeline targets missing constraint {}", timeline.constraint_index);
        return;
    };
    if !constraint.active {
        return;
    }
    let data = &skeleton.data.path_constraints[timeline.constraint_index];
    let setup = [data.mix_rotate, data.mix_x, data.mix_y];
    let mut current = [constraint.mix_rotate, constraint.mix_x, constraint.mix_y];
    let curves = &timeline.curves;

    if time < curves.first_time() {
        for (c, s) in current.iter_mut().zip(setup) {
            before_first(c, s, alpha, blend);
        }
    } else {
        let i = curves.search(time);
        for (channel, (c, s)) in current.iter_mut().zip(setup).enumerate() {
            *c = mix_absolute(*c, s, curves.value_at(i, time, channel), alpha, blend);
        }
    }
    [constraint.mix_rotate, constraint.mix_x, constraint.mix_y] = current;
}
