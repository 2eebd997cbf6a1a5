use super::bone::{LocalTransform, wrap_once};
use crate::{IkConstraintData, Inherit, Skeleton};
use std::f32::consts::PI;

#[derive(Clone, Debug)]
pub struct IkConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix: f32,
    pub softness: f32,
    pub bend_direction: i32,
    pub compress: bool,
    pub stretch: bool,
    pub active: bool,
}

impl IkConstraint {
    pub(crate) fn new(data_index: usize, data: &IkConstraintData) -> Self {
        Self {
            data_index,
            bones: data.bones.clone(),
            target: data.target,
            mix: data.mix,
            softness: data.softness,
            bend_direction: data.bend_direction,
            compress: data.compress,
            stretch: data.stretch,
            active: false,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn set_to_setup_pose(&mut self, data: &IkConstraintData) {
        self.mix = data.mix;
        self.softness = data.softness;
        self.bend_direction = data.bend_direction;
        self.compress = data.compress;
        self.stretch = data.stretch;
    }
}

impl Skeleton {
    pub(crate) fn apply_ik_constraint(&mut self, index: usize) {
        let c = &self.ik_constraints[index];
        if c.mix == 0.0 {
            return;
        }
        let uniform = self.data.ik_constraints[c.data_index].uniform;
        let target = &self.bones[c.target];
        let (target_x, target_y) = (target.world_x, target.world_y);
        let (mix, softness, bend, compress, stretch) =
            (c.mix, c.softness, c.bend_direction, c.compress, c.stretch);
        let bones = (c.bones.len(), c.bones.first().copied(), c.bones.last().copied());
        match bones {
            (1, Some(bone), _) => {
                self.apply_ik_one(bone, target_x, target_y, compress, stretch, uniform, mix)
            }
            (2, Some(parent), Some(child)) => self.apply_ik_two(
                parent, child, target_x, target_y, bend, stretch, uniform, softness, mix,
            ),
            _ => log::warn!("ik constraint {index} needs one or two bones"),
        }
    }

    /// Rotates `bone` so its local x axis points at the target.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn apply_ik_one(
        &mut self,
        bone_index: usize,
        target_x: f32,
        target_y: f32,
        compress: bool,
        stretch: bool,
        uniform: bool,
        alpha: f32,
    ) {
        let p = self.parent_world_or_root(bone_index);
        let (pa, mut pb, pc, mut pd) = (p.a, p.b, p.c, p.d);
        let bone = &self.bones[bone_index];
        let applied = bone.applied();
        let (sk_sx, sk_sy) = (self.scale_x, self.scale_y);

        let mut rotation_ik = -applied.shear_x - applied.rotation;
        let (mut tx, mut ty) = match bone.inherit {
            Inherit::OnlyTranslation => (target_x - bone.world_x, target_y - bone.world_y),
            inherit => {
                if inherit == Inherit::NoRotationOrReflection {
                    let s = (pa * pd - pb * pc).abs() / (pa * pa + pc * pc).max(1.0e-4);
                    let sa = pa / sk_sx;
                    let sc = pc / sk_sy;
                    pb = -sc * s * sk_sx;
                    pd = sa * s * sk_sy;
                    rotation_ik += sc.atan2(sa).to_degrees();
                }
                let x = target_x - p.world_x;
                let y = target_y - p.world_y;
                let d = pa * pd - pb * pc;
                if d.abs() <= 1.0e-4 {
                    (0.0, 0.0)
                } else {
                    ((x * pd - y * pb) / d - applied.x, (y * pa - x * pc) / d - applied.y)
                }
            }
        };
        rotation_ik += ty.atan2(tx).to_degrees();
        if applied.scale_x < 0.0 {
            rotation_ik += 180.0;
        }
        rotation_ik = wrap_once(rotation_ik);

        let (mut sx, mut sy) = (applied.scale_x, applied.scale_y);
        if compress || stretch {
            if matches!(bone.inherit, Inherit::NoScale | Inherit::NoScaleOrReflection) {
                tx = target_x - bone.world_x;
                ty = target_y - bone.world_y;
            }
            let b = self.data.bones[bone_index].length * sx;
            let dd = (tx * tx + ty * ty).sqrt();
            if b > 1.0e-4 && ((compress && dd < b) || (stretch && dd > b)) {
                let s = (dd / b - 1.0) * alpha + 1.0;
                sx *= s;
                if uniform {
                    sy *= s;
                }
            }
        }

        self.update_bone_world_with(
            bone_index,
            LocalTransform {
                rotation: applied.rotation + rotation_ik * alpha,
                scale_x: sx,
                scale_y: sy,
                ..applied
            },
        );
    }

    /// Bends `parent` and `child` so the child's tip reaches the target.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn apply_ik_two(
        &mut self,
        parent_index: usize,
        child_index: usize,
        target_x: f32,
        target_y: f32,
        bend_dir: i32,
        stretch: bool,
        uniform: bool,
        mut softness: f32,
        alpha: f32,
    ) {
        let parent = &self.bones[parent_index];
        let child = &self.bones[child_index];
        let pap = parent.applied();
        let cap = child.applied();
        let bend = bend_dir as f32;

        let (px, py) = (pap.x, pap.y);
        let (mut psx, mut psy) = (pap.scale_x, pap.scale_y);
        let (mut sx, mut sy) = (psx, psy);
        let mut csx = cap.scale_x;
        let (os1, mut s2) = if psx < 0.0 {
            psx = -psx;
            (180.0, -1.0)
        } else {
            (0.0, 1.0)
        };
        if psy < 0.0 {
            psy = -psy;
            s2 = -s2;
        }
        let os2 = if csx < 0.0 {
            csx = -csx;
            180.0
        } else {
            0.0
        };

        let cx = cap.x;
        let (a, b, c, d) = (parent.a, parent.b, parent.c, parent.d);
        let u = (psx - psy).abs() <= 1.0e-4;
        let (cy, cwx, cwy) = if !u || stretch {
            (0.0, a * cx + parent.world_x, c * cx + parent.world_y)
        } else {
            let cy = cap.y;
            (
                cy,
                a * cx + b * cy + parent.world_x,
                c * cx + d * cy + parent.world_y,
            )
        };

        let pp = self.parent_world_or_root(parent_index);
        let (a, b, c, d) = (pp.a, pp.b, pp.c, pp.d);
        let mut id = a * d - b * c;
        id = if id.abs() <= 1.0e-4 { 0.0 } else { 1.0 / id };
        let x = cwx - pp.world_x;
        let y = cwy - pp.world_y;
        let dx = (x * d - y * b) * id - px;
        let dy = (y * a - x * c) * id - py;
        let l1 = (dx * dx + dy * dy).sqrt();
        let mut l2 = self.data.bones[child_index].length * csx;

        if l1 < 1.0e-4 {
            self.apply_ik_one(parent_index, target_x, target_y, false, stretch, false, alpha);
            self.update_bone_world_with(
                child_index,
                LocalTransform {
                    x: cx,
                    y: cy,
                    rotation: 0.0,
                    ..cap
                },
            );
            return;
        }

        let x = target_x - pp.world_x;
        let y = target_y - pp.world_y;
        let mut tx = (x * d - y * b) * id - px;
        let mut ty = (y * a - x * c) * id - py;
        let mut dd = tx * tx + ty * ty;
        if softness != 0.0 {
            softness *= psx * (csx + 1.0) * 0.5;
            let td = dd.sqrt();
            let sd = td - l1 - l2 * psx + softness;
            if sd > 0.0 {
                let mut p = (sd / (softness * 2.0)).min(1.0) - 1.0;
                p = (sd - softness * (1.0 - p * p)) / td;
                tx -= p * tx;
                ty -= p * ty;
                dd = tx * tx + ty * ty;
            }
        }

        let (a1, a2) = if u {
            l2 *= psx;
            let mut cos = (dd - l1 * l1 - l2 * l2) / (2.0 * l1 * l2);
            let a2 = if cos < -1.0 {
                cos = -1.0;
                PI * bend
            } else if cos > 1.0 {
                cos = 1.0;
                if stretch {
                    let s = (dd.sqrt() / (l1 + l2) - 1.0) * alpha + 1.0;
                    sx *= s;
                    if uniform {
                        sy *= s;
                    }
                }
                0.0
            } else {
                cos.acos() * bend
            };
            let a = l1 + l2 * cos;
            let b = l2 * a2.sin();
            ((ty * a - tx * b).atan2(tx * a + ty * b), a2)
        } else {
            solve_non_uniform(psx, psy, l1, l2, tx, ty, dd, bend)
        };

        let os = cy.atan2(cx) * s2;
        let rotation = pap.rotation;
        let a1 = wrap_once((a1 - os).to_degrees() + os1 - rotation);
        self.update_bone_world_with(
            parent_index,
            LocalTransform {
                x: px,
                y: py,
                rotation: rotation + a1 * alpha,
                scale_x: sx,
                scale_y: sy,
                shear_x: 0.0,
                shear_y: 0.0,
            },
        );

        let rotation = cap.rotation;
        let a2 = wrap_once(((a2 + os).to_degrees() - cap.shear_x) * s2 + os2 - rotation);
        self.update_bone_world_with(
            child_index,
            LocalTransform {
                x: cx,
                y: cy,
                rotation: rotation + a2 * alpha,
                ..cap
            },
        );
    }
}

/// Two-bone angles when the parent is scaled non-uniformly: intersect the child's ellipse of
/// reach with the target circle, or fall back to the closest/farthest reachable point.
#[allow(clippy::too_many_arguments)]
fn solve_non_uniform(
    psx: f32,
    psy: f32,
    l1: f32,
    l2: f32,
    tx: f32,
    ty: f32,
    dd: f32,
    bend: f32,
) -> (f32, f32) {
    let a = psx * l2;
    let b = psy * l2;
    let aa = a * a;
    let bb = b * b;
    let ta = ty.atan2(tx);
    let c = bb * l1 * l1 + aa * dd - aa * bb;
    let c1 = -2.0 * bb * l1;
    let c2 = bb - aa;
    let d = c1 * c1 - 4.0 * c2 * c;
    if d >= 0.0 {
        let mut q = d.sqrt();
        if c1 < 0.0 {
            q = -q;
        }
        q = -(c1 + q) * 0.5;
        let r0 = q / c2;
        let r1 = c / q;
        let r = if r0.abs() < r1.abs() { r0 } else { r1 };
        if r * r <= dd {
            let y = (dd - r * r).sqrt() * bend;
            return (ta - y.atan2(r), (y / psy).atan2((r - l1) / psx));
        }
    }

    let mut min_angle = PI;
    let mut min_x = l1 - a;
    let mut min_dist = min_x * min_x;
    let mut min_y = 0.0;
    let mut max_angle = 0.0;
    let mut max_x = l1 + a;
    let mut max_dist = max_x * max_x;
    let mut max_y = 0.0;
    let c = -a * l1 / (aa - bb);
    if (-1.0..=1.0).contains(&c) {
        let c = c.acos();
        let x = a * c.cos() + l1;
        let y = b * c.sin();
        let d = x * x + y * y;
        if d < min_dist {
            min_angle = c;
            min_dist = d;
            min_x = x;
            min_y = y;
        }
        if d > max_dist {
            max_angle = c;
            max_dist = d;
            max_x = x;
            max_y = y;
        }
    }
    if dd <= (min_dist + max_dist) * 0.5 {
        (ta - (min_y * bend).atan2(min_x), min_angle * bend)
    } else {
        (ta - (max_y * bend).atan2(max_x), max_angle * bend)
    }
}
