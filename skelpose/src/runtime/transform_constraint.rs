use super::bone::{LocalTransform, wrap_degrees};
use crate::{Skeleton, TransformConstraintData};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

#[derive(Clone, Debug)]
pub struct TransformConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
    pub mix_scale_x: f32,
    pub mix_scale_y: f32,
    pub mix_shear_y: f32,
    pub active: bool,
}

impl TransformConstraint {
    pub(crate) fn new(data_index: usize, data: &TransformConstraintData) -> Self {
        let mut c = Self {
            data_index,
            bones: data.bones.clone(),
            target: data.target,
            mix_rotate: 0.0,
            mix_x: 0.0,
            mix_y: 0.0,
            mix_scale_x: 0.0,
            mix_scale_y: 0.0,
            mix_shear_y: 0.0,
            active: false,
        };
        c.set_to_setup_pose(data);
        c
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn set_to_setup_pose(&mut self, data: &TransformConstraintData) {
        self.mix_rotate = data.mix_rotate;
        self.mix_x = data.mix_x;
        self.mix_y = data.mix_y;
        self.mix_scale_x = data.mix_scale_x;
        self.mix_scale_y = data.mix_scale_y;
        self.mix_shear_y = data.mix_shear_y;
    }

    fn is_idle(&self) -> bool {
        self.mix_rotate == 0.0
            && self.mix_x == 0.0
            && self.mix_y == 0.0
            && self.mix_scale_x == 0.0
            && self.mix_scale_y == 0.0
            && self.mix_shear_y == 0.0
    }
}

fn wrap_pi(mut radians: f32) -> f32 {
    if radians > PI {
        radians -= TAU;
    } else if radians < -PI {
        radians += TAU;
    }
    radians
}

impl Skeleton {
    pub(crate) fn apply_transform_constraint(&mut self, index: usize) {
        let c = &self.transform_constraints[index];
        if c.is_idle() {
            return;
        }
        let data = &self.data.transform_constraints[c.data_index];
        match (data.local, data.relative) {
            (false, false) => self.apply_absolute_world(index),
            (false, true) => self.apply_relative_world(index),
            (true, false) => self.apply_absolute_local(index),
            (true, true) => self.apply_relative_local(index),
        }
    }

    fn apply_absolute_world(&mut self, index: usize) {
        let c = self.transform_constraints[index].clone();
        let data = &self.data.transform_constraints[c.data_index];
        let target = self.bones[c.target].world();
        let (ta, tb, tc, td) = (target.a, target.b, target.c, target.d);
        let reflect = if target.determinant() > 0.0 { 1.0 } else { -1.0 };
        let offset_rotation = data.offset_rotation.to_radians() * reflect;
        let offset_shear_y = data.offset_shear_y.to_radians() * reflect;
        let offset_world = target.local_to_world(data.offset_x, data.offset_y);
        let translate = c.mix_x != 0.0 || c.mix_y != 0.0;
        let (offset_scale_x, offset_scale_y) = (data.offset_scale_x, data.offset_scale_y);

        for &bone_index in &c.bones {
            let bone = &mut self.bones[bone_index];
            if c.mix_rotate != 0.0 {
                let r = wrap_pi(tc.atan2(ta) - bone.c.atan2(bone.a) + offset_rotation);
                bone.rotate_world((r * c.mix_rotate).to_degrees());
            }
            if translate {
                bone.world_x += (offset_world[0] - bone.world_x) * c.mix_x;
                bone.world_y += (offset_world[1] - bone.world_y) * c.mix_y;
            }
            if c.mix_scale_x != 0.0 {
                let mut s = (bone.a * bone.a + bone.c * bone.c).sqrt();
                if s != 0.0 {
                    s = (s + ((ta * ta + tc * tc).sqrt() - s + offset_scale_x) * c.mix_scale_x) / s;
                }
                bone.a *= s;
                bone.c *= s;
            }
            if c.mix_scale_y != 0.0 {
                let mut s = (bone.b * bone.b + bone.d * bone.d).sqrt();
                if s != 0.0 {
                    s = (s + ((tb * tb + td * td).sqrt() - s + offset_scale_y) * c.mix_scale_y) / s;
                }
                bone.b *= s;
                bone.d *= s;
            }
            if c.mix_shear_y > 0.0 {
                let (b, d) = (bone.b, bone.d);
                let by = d.atan2(b);
                let r = wrap_pi(td.atan2(tb) - tc.atan2(ta) - (by - bone.c.atan2(bone.a)));
                let r = by + (r + offset_shear_y) * c.mix_shear_y;
                let s = (b * b + d * d).sqrt();
                bone.b = r.cos() * s;
                bone.d = r.sin() * s;
            }
            self.update_bone_applied(bone_index);
        }
    }

    fn apply_relative_world(&mut self, index: usize) {
        let c = self.transform_constraints[index].clone();
        let data = &self.data.transform_constraints[c.data_index];
        let target = self.bones[c.target].world();
        let (ta, tb, tc, td) = (target.a, target.b, target.c, target.d);
        let reflect = if target.determinant() > 0.0 { 1.0 } else { -1.0 };
        let offset_rotation = data.offset_rotation.to_radians() * reflect;
        let offset_shear_y = data.offset_shear_y.to_radians() * reflect;
        let offset_world = target.local_to_world(data.offset_x, data.offset_y);
        let translate = c.mix_x != 0.0 || c.mix_y != 0.0;
        let target_scale_x = (ta * ta + tc * tc).sqrt();
        let target_scale_y = (tb * tb + td * td).sqrt();
        let scale_x = (target_scale_x - 1.0 + data.offset_scale_x) * c.mix_scale_x + 1.0;
        let scale_y = (target_scale_y - 1.0 + data.offset_scale_y) * c.mix_scale_y + 1.0;

        for &bone_index in &c.bones {
            let bone = &mut self.bones[bone_index];
            if c.mix_rotate != 0.0 {
                let r = wrap_pi(tc.atan2(ta) + offset_rotation);
                bone.rotate_world((r * c.mix_rotate).to_degrees());
            }
            if translate {
                bone.world_x += offset_world[0] * c.mix_x;
                bone.world_y += offset_world[1] * c.mix_y;
            }
            if c.mix_scale_x != 0.0 {
                bone.a *= scale_x;
                bone.c *= scale_x;
            }
            if c.mix_scale_y != 0.0 {
                bone.b *= scale_y;
                bone.d *= scale_y;
            }
            if c.mix_shear_y > 0.0 {
                let r = wrap_pi(td.atan2(tb) - tc.atan2(ta));
                let (b, d) = (bone.b, bone.d);
                let r = d.atan2(b) + (r - FRAC_PI_2 + offset_shear_y) * c.mix_shear_y;
                let s = (b * b + d * d).sqrt();
                bone.b = r.cos() * s;
                bone.d = r.sin() * s;
            }
            self.update_bone_applied(bone_index);
        }
    }

    fn apply_absolute_local(&mut self, index: usize) {
        let c = self.transform_constraints[index].clone();
        let data = &self.data.transform_constraints[c.data_index];
        let target = self.bones[c.target].applied();
        let offsets = LocalTransform {
            x: data.offset_x,
            y: data.offset_y,
            rotation: data.offset_rotation,
            scale_x: data.offset_scale_x,
            scale_y: data.offset_scale_y,
            shear_x: 0.0,
            shear_y: data.offset_shear_y,
        };

        for &bone_index in &c.bones {
            let mut pose = self.bones[bone_index].applied();
            if c.mix_rotate != 0.0 {
                let r = wrap_degrees(target.rotation - pose.rotation + offsets.rotation);
                pose.rotation += r * c.mix_rotate;
            }
            pose.x += (target.x - pose.x + offsets.x) * c.mix_x;
            pose.y += (target.y - pose.y + offsets.y) * c.mix_y;
            if c.mix_scale_x != 0.0 && pose.scale_x != 0.0 {
                pose.scale_x += (target.scale_x - pose.scale_x + offsets.scale_x) * c.mix_scale_x;
            }
            if c.mix_scale_y != 0.0 && pose.scale_y != 0.0 {
                pose.scale_y += (target.scale_y - pose.scale_y + offsets.scale_y) * c.mix_scale_y;
            }
            if c.mix_shear_y != 0.0 {
                let r = wrap_degrees(target.shear_y - pose.shear_y + offsets.shear_y);
                pose.shear_y += r * c.mix_shear_y;
            }
            self.update_bone_world_with(bone_index, pose);
        }
    }

    fn apply_relative_local(&mut self, index: usize) {
        let c = self.transform_constraints[index].clone();
        let data = &self.data.transform_constraints[c.data_index];
        let target = self.bones[c.target].applied();
        let rotation = (target.rotation + data.offset_rotation) * c.mix_rotate;
        let x = (target.x + data.offset_x) * c.mix_x;
        let y = (target.y + data.offset_y) * c.mix_y;
        let scale_x = (target.scale_x - 1.0 + data.offset_scale_x) * c.mix_scale_x + 1.0;
        let scale_y = (target.scale_y - 1.0 + data.offset_scale_y) * c.mix_scale_y + 1.0;
        let shear_y = (target.shear_y + data.offset_shear_y) * c.mix_shear_y;

        for &bone_index in &c.bones {
            let pose = self.bones[bone_index].applied();
            self.update_bone_world_with(
                bone_index,
                LocalTransform {
                    x: pose.x + x,
                    y: pose.y + y,
                    rotation: pose.rotation + rotation,
                    scale_x: pose.scale_x * scale_x,
                    scale_y: pose.scale_y * scale_y,
                    shear_x: pose.shear_x,
                    shear_y: pose.shear_y + shear_y,
                },
            );
        }
    }
}
