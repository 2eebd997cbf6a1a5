use crate::{BlendMode, Skeleton};

/// World transform of one bone: `[a, b, c, d]` maps local to world, then `world` is added.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BonePose {
    pub name: String,
    pub matrix: [f32; 4],
    pub world: [f32; 2],
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SlotPose {
    pub name: String,
    pub bone: usize,
    pub color: [f32; 4],
    pub dark_color: Option<[f32; 3]>,
    pub blend: BlendMode,
    pub attachment: Option<String>,
    /// World positions of the attachment's vertices, `[x0, y0, x1, y1, ...]`; empty when the
    /// attachment has no vertices.
    pub world_vertices: Vec<f32>,
}

/// Everything a renderer needs from one posed frame. Slots are listed in draw order.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SkeletonPose {
    pub bones: Vec<BonePose>,
    pub slots: Vec<SlotPose>,
    pub draw_order: Vec<usize>,
}

impl SkeletonPose {
    pub fn clear(&mut self) {
        self.bones.clear();
        self.slots.clear();
        self.draw_order.clear();
    }

    pub fn bone(&self, name: &str) -> Option<&BonePose> {
        self.bones.iter().find(|b| b.name == name)
    }

    pub fn slot(&self, name: &str) -> Option<&SlotPose> {
        self.slots.iter().find(|s| s.name == name)
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(feature = "glam")]
impl BonePose {
    pub fn world_matrix(&self) -> glam::Affine2 {
        let [a, b, c, d] = self.matrix;
        glam::Affine2::from_cols_array(&[a, c, b, d, self.world[0], self.world[1]])
    }
}

pub fn build_pose(skeleton: &Skeleton) -> SkeletonPose {
    let mut out = SkeletonPose::default();
    append_pose(&mut out, skeleton);
    out
}

/// Snapshots `skeleton` into `out`, reusing its buffers. Call after
/// [`Skeleton::update_world_transform`].
pub fn append_pose(out: &mut SkeletonPose, skeleton: &Skeleton) {
    out.clear();
    out.bones.extend(skeleton.bones.iter().map(|bone| {
        let data = &skeleton.data.bones[bone.data_index()];
        BonePose {
            name: data.name.clone(),
            matrix: [bone.a, bone.b, bone.c, bone.d],
            world: [bone.world_x, bone.world_y],
            active: bone.active,
        }
    }));

    out.draw_order.extend_from_slice(&skeleton.draw_order);
    for &slot_index in &skeleton.draw_order {
        let slot = &skeleton.slots[slot_index];
        let data = &skeleton.data.slots[slot.data_index()];
        out.slots.push(SlotPose {
            name: data.name.clone(),
            bone: slot.bone,
            color: slot.color,
            dark_color: slot.has_dark.then_some(slot.dark_color),
            blend: slot.blend,
            attachment: slot.attachment_name().map(str::to_string),
            world_vertices: skeleton.slot_world_vertices(slot_index).unwrap_or_default(),
        });
    }
}
