use crate::{
    AttachmentData, PathAttachmentData, PathConstraintData, PositionMode, RotateMode, Skeleton,
    SpacingMode,
};
use std::f32::consts::{PI, TAU};
use std::sync::Arc;

const EPSILON: f32 = 0.00001;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum CurveCursor {
    None,
    Before,
    After,
    Curve(usize),
}

#[derive(Clone, Debug, Default)]
struct PathScratch {
    spaces: Vec<f32>,
    lengths: Vec<f32>,
    positions: Vec<f32>,
    world: Vec<f32>,
    curves: Vec<f32>,
    segments: [f32; 10],
}

#[derive(Clone, Debug)]
pub struct PathConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    /// Slot holding the path attachment.
    pub target: usize,
    pub position: f32,
    pub spacing: f32,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
    pub active: bool,
    scratch: PathScratch,
}

impl PathConstraint {
    pub(crate) fn new(data_index: usize, data: &PathConstraintData) -> Self {
        Self {
            data_index,
            bones: data.bones.clone(),
            target: data.target,
            position: data.position,
            spacing: data.spacing,
            mix_rotate: data.mix_rotate,
            mix_x: data.mix_x,
            mix_y: data.mix_y,
            active: false,
            scratch: PathScratch::default(),
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn set_to_setup_pose(&mut self, data: &PathConstraintData) {
        self.position = data.position;
        self.spacing = data.spacing;
        self.mix_rotate = data.mix_rotate;
        self.mix_x = data.mix_x;
        self.mix_y = data.mix_y;
    }
}

impl Skeleton {
    pub(crate) fn apply_path_constraint(&mut self, index: usize) {
        let c = &self.path_constraints[index];
        let Some(attachment) = self.slots[c.target].attachment.clone() else {
            return;
        };
        let AttachmentData::Path(path) = attachment.as_ref() else {
            return;
        };
        if c.mix_rotate == 0.0 && c.mix_x == 0.0 && c.mix_y == 0.0 {
            return;
        }

        let mut scratch = std::mem::take(&mut self.path_constraints[index].scratch);
        self.solve_path(index, path, &mut scratch);
        self.path_constraints[index].scratch = scratch;
    }

    fn solve_path(&mut self, index: usize, path: &PathAttachmentData, scratch: &mut PathScratch) {
        let data = Arc::clone(&self.data);
        let c = &self.path_constraints[index];
        let d = &data.path_constraints[c.data_index];
        let (mix_rotate, mix_x, mix_y, spacing) = (c.mix_rotate, c.mix_x, c.mix_y, c.spacing);
        let (target, position) = (c.target, c.position);
        let bones = c.bones.clone();

        let tangents = d.rotate_mode == RotateMode::Tangent;
        let scale = d.rotate_mode == RotateMode::ChainScale;
        let bone_count = bones.len();
        let spaces_count = if tangents { bone_count } else { bone_count + 1 };

        scratch.spaces.clear();
        scratch.spaces.resize(spaces_count, 0.0);
        scratch.lengths.clear();
        if scale {
            scratch.lengths.resize(bone_count, 0.0);
        }
        let spaces = &mut scratch.spaces;
        let lengths = &mut scratch.lengths;

        let world_length = |bone_index: usize| {
            let setup_length = data.bones[bone_index].length;
            let bone = &self.bones[bone_index];
            let x = setup_length * bone.a;
            let y = setup_length * bone.c;
            (setup_length, (x * x + y * y).sqrt())
        };

        match d.spacing_mode {
            SpacingMode::Percent => {
                if scale {
                    for i in 0..spaces_count - 1 {
                        let (setup_length, length) = world_length(bones[i]);
                        lengths[i] = if setup_length < EPSILON { 0.0 } else { length };
                    }
                }
                spaces[1..].fill(spacing);
            }
            SpacingMode::Proportional => {
                let mut sum = 0.0;
                for i in 0..spaces_count - 1 {
                    let (setup_length, length) = world_length(bones[i]);
                    if setup_length < EPSILON {
                        if scale {
                            lengths[i] = 0.0;
                        }
                        spaces[i + 1] = spacing;
                    } else {
                        if scale {
                            lengths[i] = length;
                        }
                        spaces[i + 1] = length;
                        sum += length;
                    }
                }
                if sum > 0.0 {
                    let factor = spaces_count as f32 / sum * spacing;
                    spaces[1..].iter_mut().for_each(|s| *s *= factor);
                }
            }
            SpacingMode::Length | SpacingMode::Fixed => {
                let length_spacing = d.spacing_mode == SpacingMode::Length;
                for i in 0..spaces_count - 1 {
                    let (setup_length, length) = world_length(bones[i]);
                    if setup_length < EPSILON {
                        if scale {
                            lengths[i] = 0.0;
                        }
                        spaces[i + 1] = spacing;
                    } else {
                        if scale {
                            lengths[i] = length;
                        }
                        let base = if length_spacing {
                            setup_length + spacing
                        } else {
                            spacing
                        };
                        spaces[i + 1] = base * length / setup_length;
                    }
                }
            }
        }

        self.compute_path_positions(target, path, d, position, spaces_count, tangents, scratch);
        let positions = &scratch.positions;

        let mut bone_x = positions[0];
        let mut bone_y = positions[1];
        let mut offset_rotation = d.offset_rotation;
        let tip = if offset_rotation == 0.0 {
            d.rotate_mode == RotateMode::Chain
        } else {
            let p = &self.bones[self.slots[target].bone];
            let sign = if p.a * p.d - p.b * p.c > 0.0 { 1.0 } else { -1.0 };
            offset_rotation = offset_rotation.to_radians() * sign;
            false
        };

        for (i, &bone_index) in bones.iter().enumerate() {
            let p = 3 + i * 3;
            let setup_length = data.bones[bone_index].length;
            let bone = &mut self.bones[bone_index];
            bone.world_x += (bone_x - bone.world_x) * mix_x;
            bone.world_y += (bone_y - bone.world_y) * mix_y;
            let x = positions[p];
            let y = positions[p + 1];
            let dx = x - bone_x;
            let dy = y - bone_y;
            if scale {
                let length = scratch.lengths[i];
                if length >= EPSILON {
                    let s = ((dx * dx + dy * dy).sqrt() / length - 1.0) * mix_rotate + 1.0;
                    bone.a *= s;
                    bone.c *= s;
                }
            }
            bone_x = x;
            bone_y = y;
            if mix_rotate > 0.0 {
                let (a, b, c, d) = (bone.a, bone.b, bone.c, bone.d);
                let mut r = if tangents {
                    positions[p - 1]
                } else if scratch.spaces[i + 1] < EPSILON {
                    positions[p + 2]
                } else {
                    dy.atan2(dx)
                };
                r -= c.atan2(a);
                if tip {
                    let (cos, sin) = (r.cos(), r.sin());
                    bone_x += (setup_length * (cos * a - sin * c) - dx) * mix_rotate;
                    bone_y += (setup_length * (sin * a + cos * c) - dy) * mix_rotate;
                } else {
                    r += offset_rotation;
                }
                if r > PI {
                    r -= TAU;
                } else if r < -PI {
                    r += TAU;
                }
                r *= mix_rotate;
                let (cos, sin) = (r.cos(), r.sin());
                bone.a = cos * a - sin * c;
                bone.b = cos * b - sin * d;
                bone.c = sin * a + cos * c;
                bone.d = sin * b + cos * d;
            }
            self.update_bone_applied(bone_index);
        }
    }

    /// Fills `scratch.positions` with `(x, y, tangent)` for each space along the path.
    #[allow(clippy::too_many_arguments)]
    fn compute_path_positions(
        &self,
        slot_index: usize,
        path: &PathAttachmentData,
        data: &PathConstraintData,
        mut position: f32,
        spaces_count: usize,
        tangents: bool,
        scratch: &mut PathScratch,
    ) {
        let closed = path.closed;
        let mut vertices_length = path.vertices.world_vertices_length();
        let mut curve_count = vertices_length / 6;
        let mut prev = CurveCursor::None;
        let out = &mut scratch.positions;
        out.clear();
        out.resize(spaces_count * 3 + 2, 0.0);
        let spaces = &scratch.spaces;
        let world = &mut scratch.world;
        let compute = |start: usize, count: usize, world: &mut [f32], offset: usize| {
            self.compute_world_vertices(slot_index, &path.vertices, start, count, world, offset);
        };

        if !path.constant_speed {
            let lengths = &path.lengths;
            curve_count -= if closed { 1 } else { 2 };
            let Some(&path_length) = lengths.get(curve_count) else {
                return;
            };
            if data.position_mode == PositionMode::Percent {
                position *= path_length;
            }
            let multiplier = spacing_multiplier(data.spacing_mode, path_length, spaces_count);
            world.clear();
            world.resize(8, 0.0);
            let mut curve = 0;
            for i in 0..spaces_count {
                let o = i * 3;
                let space = spaces[i] * multiplier;
                position += space;
                let mut p = position;
                if closed {
                    p %= path_length;
                    if p < 0.0 {
                        p += path_length;
                    }
                    curve = 0;
                } else if p < 0.0 {
                    if prev != CurveCursor::Before {
                        prev = CurveCursor::Before;
                        compute(2, 4, world.as_mut_slice(), 0);
                    }
                    add_before_position(p, world, 0, out, o);
                    continue;
                } else if p > path_length {
                    if prev != CurveCursor::After {
                        prev = CurveCursor::After;
                        compute(vertices_length - 6, 4, world.as_mut_slice(), 0);
                    }
                    add_after_position(p - path_length, world, 0, out, o);
                    continue;
                }

                while curve < curve_count && p > lengths[curve] {
                    curve += 1;
                }
                let length = lengths[curve];
                p = if curve == 0 {
                    p / length
                } else {
                    let before = lengths[curve - 1];
                    (p - before) / (length - before)
                };

                if prev != CurveCursor::Curve(curve) {
                    prev = CurveCursor::Curve(curve);
                    if closed && curve == curve_count {
                        compute(vertices_length - 4, 4, world.as_mut_slice(), 0);
                        compute(0, 4, world.as_mut_slice(), 4);
                    } else {
                        compute(curve * 6 + 2, 8, world.as_mut_slice(), 0);
                    }
                }
                let w = &world[..8];
                add_curve_position(
                    p,
                    [w[0], w[1], w[2], w[3], w[4], w[5], w[6], w[7]],
                    out,
                    o,
                    tangents || (i > 0 && space < EPSILON),
                );
            }
            return;
        }

        if closed {
            vertices_length += 2;
            world.clear();
            world.resize(vertices_length, 0.0);
            compute(2, vertices_length - 4, world.as_mut_slice(), 0);
            compute(0, 2, world.as_mut_slice(), vertices_length - 4);
            world[vertices_length - 2] = world[0];
            world[vertices_length - 1] = world[1];
        } else {
            curve_count -= 1;
            vertices_length -= 4;
            world.clear();
            world.resize(vertices_length, 0.0);
            compute(2, vertices_length, world.as_mut_slice(), 0);
        }

        let curves = &mut scratch.curves;
        curves.clear();
        curves.resize(curve_count, 0.0);
        let mut path_length = 0.0;
        let (mut x1, mut y1) = (world[0], world[1]);
        for (i, w) in (0..curve_count).map(|i| (i, 2 + i * 6)) {
            let (cx1, cy1, cx2, cy2) = (world[w], world[w + 1], world[w + 2], world[w + 3]);
            let (x2, y2) = (world[w + 4], world[w + 5]);
            path_length += curve_length_coarse([x1, y1, cx1, cy1, cx2, cy2, x2, y2]);
            curves[i] = path_length;
            x1 = x2;
            y1 = y2;
        }

        if data.position_mode == PositionMode::Percent {
            position *= path_length;
        }
        let multiplier = spacing_multiplier(data.spacing_mode, path_length, spaces_count);

        let segments = &mut scratch.segments;
        let mut curve_length = 0.0;
        let mut curve = 0;
        let mut segment = 0;
        let mut points = [0.0; 8];
        for i in 0..spaces_count {
            let o = i * 3;
            let space = spaces[i] * multiplier;
            position += space;
            let mut p = position;

            if closed {
                p %= path_length;
                if p < 0.0 {
                    p += path_length;
                }
                curve = 0;
            } else if p < 0.0 {
                add_before_position(p, world, 0, out, o);
                continue;
            } else if p > path_length {
                add_after_position(p - path_length, world, vertices_length - 4, out, o);
                continue;
            }

            while curve + 1 < curve_count && p > curves[curve] {
                curve += 1;
            }
            let length = curves[curve];
            p = if curve == 0 {
                p / length
            } else {
                let before = curves[curve - 1];
                (p - before) / (length - before)
            };

            if prev != CurveCursor::Curve(curve) {
                prev = CurveCursor::Curve(curve);
                let ii = curve * 6;
                points.copy_from_slice(&world[ii..ii + 8]);
                curve_length = segment_lengths(points, segments);
                segment = 0;
            }

            p *= curve_length;
            while segment < 9 && p > segments[segment] {
                segment += 1;
            }
            let length = segments[segment];
            p = if segment == 0 {
                p / length
            } else {
                let before = segments[segment - 1];
                segment as f32 + (p - before) / (length - before)
            };
            add_curve_position(
                p * 0.1,
                points,
                out,
                o,
                tangents || (i > 0 && space < EPSILON),
            );
        }
    }
}

fn spacing_multiplier(mode: SpacingMode, path_length: f32, spaces_count: usize) -> f32 {
    match mode {
        SpacingMode::Percent => path_length,
        SpacingMode::Proportional => path_length / spaces_count as f32,
        SpacingMode::Length | SpacingMode::Fixed => 1.0,
    }
}

/// Length of a cubic bezier from 4 forward-difference steps.
fn curve_length_coarse([x1, y1, cx1, cy1, cx2, cy2, x2, y2]: [f32; 8]) -> f32 {
    let tmpx = (x1 - cx1 * 2.0 + cx2) * 0.1875;
    let tmpy = (y1 - cy1 * 2.0 + cy2) * 0.1875;
    let dddfx = ((cx1 - cx2) * 3.0 - x1 + x2) * 0.09375;
    let dddfy = ((cy1 - cy2) * 3.0 - y1 + y2) * 0.09375;
    let mut ddfx = tmpx * 2.0 + dddfx;
    let mut ddfy = tmpy * 2.0 + dddfy;
    let mut dfx = (cx1 - x1) * 0.75 + tmpx + dddfx * 0.166_666_67;
    let mut dfy = (cy1 - y1) * 0.75 + tmpy + dddfy * 0.166_666_67;
    let mut length = (dfx * dfx + dfy * dfy).sqrt();
    dfx += ddfx;
    dfy += ddfy;
    ddfx += dddfx;
    ddfy += dddfy;
    length += (dfx * dfx + dfy * dfy).sqrt();
    dfx += ddfx;
    dfy += ddfy;
    length += (dfx * dfx + dfy * dfy).sqrt();
    dfx += ddfx + dddfx;
    dfy += ddfy + dddfy;
    length + (dfx * dfx + dfy * dfy).sqrt()
}

/// Cumulative lengths of 10 segments of a cubic bezier; returns the total.
fn segment_lengths([x1, y1, cx1, cy1, cx2, cy2, x2, y2]: [f32; 8], out: &mut [f32; 10]) -> f32 {
    let tmpx = (x1 - cx1 * 2.0 + cx2) * 0.03;
    let tmpy = (y1 - cy1 * 2.0 + cy2) * 0.03;
    let dddfx = ((cx1 - cx2) * 3.0 - x1 + x2) * 0.006;
    let dddfy = ((cy1 - cy2) * 3.0 - y1 + y2) * 0.006;
    let mut ddfx = tmpx * 2.0 + dddfx;
    let mut ddfy = tmpy * 2.0 + dddfy;
    let mut dfx = (cx1 - x1) * 0.3 + tmpx + dddfx * 0.166_666_67;
    let mut dfy = (cy1 - y1) * 0.3 + tmpy + dddfy * 0.166_666_67;
    let mut length = (dfx * dfx + dfy * dfy).sqrt();
    out[0] = length;
    for slot in out.iter_mut().take(8).skip(1) {
        dfx += ddfx;
        dfy += ddfy;
        ddfx += dddfx;
        ddfy += dddfy;
        length += (dfx * dfx + dfy * dfy).sqrt();
        *slot = length;
    }
    dfx += ddfx;
    dfy += ddfy;
    length += (dfx * dfx + dfy * dfy).sqrt();
    out[8] = length;
    dfx += ddfx + dddfx;
    dfy += ddfy + dddfy;
    length += (dfx * dfx + dfy * dfy).sqrt();
    out[9] = length;
    length
}

fn add_before_position(p: f32, temp: &[f32], i: usize, out: &mut [f32], o: usize) {
    let (x1, y1) = (temp[i], temp[i + 1]);
    let r = (temp[i + 3] - y1).atan2(temp[i + 2] - x1);
    out[o] = x1 + p * r.cos();
    out[o + 1] = y1 + p * r.sin();
    out[o + 2] = r;
}

fn add_after_position(p: f32, temp: &[f32], i: usize, out: &mut [f32], o: usize) {
    let (x1, y1) = (temp[i + 2], temp[i + 3]);
    let r = (y1 - temp[i + 1]).atan2(x1 - temp[i]);
    out[o] = x1 + p * r.cos();
    out[o + 1] = y1 + p * r.sin();
    out[o + 2] = r;
}

fn add_curve_position(
    p: f32,
    [x1, y1, cx1, cy1, cx2, cy2, x2, y2]: [f32; 8],
    out: &mut [f32],
    o: usize,
    tangents: bool,
) {
    if p < EPSILON || p.is_nan() {
        out[o] = x1;
        out[o + 1] = y1;
        out[o + 2] = (cy1 - y1).atan2(cx1 - x1);
        return;
    }
    let tt = p * p;
    let ttt = tt * p;
    let u = 1.0 - p;
    let uu = u * u;
    let uuu = uu * u;
    let ut = u * p;
    let ut3 = ut * 3.0;
    let uut3 = u * ut3;
    let utt3 = ut3 * p;
    let x = x1 * uuu + cx1 * uut3 + cx2 * utt3 + x2 * ttt;
    let y = y1 * uuu + cy1 * uut3 + cy2 * utt3 + y2 * ttt;
    out[o] = x;
    out[o + 1] = y;
    if tangents {
        out[o + 2] = if p < 0.001 {
            (cy1 - y1).atan2(cx1 - x1)
        } else {
            (y - (y1 * uu + cy1 * ut * 2.0 + cy2 * tt))
                .atan2(x - (x1 * uu + cx1 * ut * 2.0 + cx2 * tt))
        };
    }
}
