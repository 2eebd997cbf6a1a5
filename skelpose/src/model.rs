use crate::{Animation, Error};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct BoneData {
    pub name: String,
    pub parent: Option<usize>,
    pub length: f32,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,
    pub inherit: Inherit,
    pub skin_required: bool,
}

impl BoneData {
    pub fn new(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            length: 0.0,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            shear_x: 0.0,
            shear_y: 0.0,
            inherit: Inherit::Normal,
            skin_required: false,
        }
    }
}

/// How a bone composes its parent's world transform.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Inherit {
    #[default]
    Normal,
    OnlyTranslation,
    NoRotationOrReflection,
    NoScale,
    NoScaleOrReflection,
}

#[derive(Clone, Debug)]
pub struct SlotData {
    pub name: String,
    pub bone: usize,
    pub attachment: Option<String>,
    pub color: [f32; 4],
    pub has_dark: bool,
    pub dark_color: [f32; 3],
    pub blend: BlendMode,
}

impl SlotData {
    pub fn new(name: impl Into<String>, bone: usize) -> Self {
        Self {
            name: name.into(),
            bone,
            attachment: None,
            color: [1.0; 4],
            has_dark: false,
            dark_color: [0.0; 3],
            blend: BlendMode::Normal,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

#[derive(Clone, Debug)]
pub struct IkConstraintData {
    pub name: String,
    pub order: usize,
    pub skin_required: bool,
    /// One or two bones, parent first.
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix: f32,
    pub softness: f32,
    pub compress: bool,
    pub stretch: bool,
    pub uniform: bool,
    pub bend_direction: i32,
}

impl IkConstraintData {
    pub fn new(name: impl Into<String>, bones: Vec<usize>, target: usize) -> Self {
        Self {
            name: name.into(),
            order: 0,
            skin_required: false,
            bones,
            target,
            mix: 1.0,
            softness: 0.0,
            compress: false,
            stretch: false,
            uniform: false,
            bend_direction: 1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TransformConstraintData {
    pub name: String,
    pub order: usize,
    pub skin_required: bool,
    pub bones: Vec<usize>,
    pub target: usize,
    pub local: bool,
    pub relative: bool,

    pub offset_rotation: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub offset_scale_x: f32,
    pub offset_scale_y: f32,
    pub offset_shear_y: f32,

    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
    pub mix_scale_x: f32,
    pub mix_scale_y: f32,
    pub mix_shear_y: f32,
}

impl TransformConstraintData {
    pub fn new(name: impl Into<String>, bones: Vec<usize>, target: usize) -> Self {
        Self {
            name: name.into(),
            order: 0,
            skin_required: false,
            bones,
            target,
            local: false,
            relative: false,
            offset_rotation: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
            offset_scale_x: 0.0,
            offset_scale_y: 0.0,
            offset_shear_y: 0.0,
            mix_rotate: 1.0,
            mix_x: 1.0,
            mix_y: 1.0,
            mix_scale_x: 1.0,
            mix_scale_y: 1.0,
            mix_shear_y: 1.0,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PositionMode {
    Fixed,
    Percent,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SpacingMode {
    Length,
    Fixed,
    Percent,
    Proportional,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RotateMode {
    Tangent,
    Chain,
    ChainScale,
}

#[derive(Clone, Debug)]
pub struct PathConstraintData {
    pub name: String,
    pub order: usize,
    pub skin_required: bool,
    pub bones: Vec<usize>,
    /// Slot whose path attachment drives the constraint.
    pub target: usize,
    pub position_mode: PositionMode,
    pub spacing_mode: SpacingMode,
    pub rotate_mode: RotateMode,
    pub offset_rotation: f32,
    pub position: f32,
    pub spacing: f32,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
}

impl PathConstraintData {
    pub fn new(name: impl Into<String>, bones: Vec<usize>, target: usize) -> Self {
        Self {
            name: name.into(),
            order: 0,
            skin_required: false,
            bones,
            target,
            position_mode: PositionMode::Percent,
            spacing_mode: SpacingMode::Length,
            rotate_mode: RotateMode::Tangent,
            offset_rotation: 0.0,
            position: 0.0,
            spacing: 0.0,
            mix_rotate: 1.0,
            mix_x: 1.0,
            mix_y: 1.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RegionAttachmentData {
    pub name: String,
    pub path: String,
    pub color: [f32; 4],
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Debug)]
pub struct VertexWeight {
    pub bone: usize,
    pub x: f32,
    pub y: f32,
    pub weight: f32,
}

#[derive(Clone, Debug)]
pub enum MeshVertices {
    Unweighted(Vec<[f32; 2]>),
    Weighted(Vec<Vec<VertexWeight>>),
}

impl MeshVertices {
    pub fn vertex_count(&self) -> usize {
        match self {
            MeshVertices::Unweighted(v) => v.len(),
            MeshVertices::Weighted(v) => v.len(),
        }
    }

    pub fn world_vertices_length(&self) -> usize {
        self.vertex_count() * 2
    }

    /// Length of a deform buffer: one offset pair per vertex, or per bone influence when weighted.
    pub fn deform_length(&self) -> usize {
        match self {
            MeshVertices::Unweighted(v) => v.len() * 2,
            MeshVertices::Weighted(v) => v.iter().map(|w| w.len() * 2).sum(),
        }
    }

    pub fn is_weighted(&self) -> bool {
        matches!(self, MeshVertices::Weighted(_))
    }

    /// Setup value of the `i`th float of an unweighted vertex list (`x0, y0, x1, ...`).
    pub(crate) fn setup_value(&self, i: usize) -> f32 {
        match self {
            MeshVertices::Unweighted(v) => v[i / 2][i % 2],
            MeshVertices::Weighted(_) => 0.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MeshAttachmentData {
    /// Unique per vertex attachment.
    pub id: u32,
    /// Id deform timelines are keyed by; linked meshes share their parent's.
    pub timeline_id: u32,
    pub name: String,
    pub path: String,
    pub color: [f32; 4],
    pub vertices: MeshVertices,
    pub uvs: Vec<[f32; 2]>,
    pub triangles: Vec<u32>,
}

#[derive(Clone, Debug)]
pub struct PathAttachmentData {
    pub id: u32,
    pub name: String,
    pub vertices: MeshVertices,
    /// Cumulative length at the end of each curve.
    pub lengths: Vec<f32>,
    pub closed: bool,
    pub constant_speed: bool,
}

#[derive(Clone, Debug)]
pub struct PointAttachmentData {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
}

#[derive(Clone, Debug)]
pub enum AttachmentData {
    Region(RegionAttachmentData),
    Mesh(MeshAttachmentData),
    Path(PathAttachmentData),
    Point(PointAttachmentData),
}

impl AttachmentData {
    pub fn name(&self) -> &str {
        match self {
            AttachmentData::Region(a) => a.name.as_str(),
            AttachmentData::Mesh(a) => a.name.as_str(),
            AttachmentData::Path(a) => a.name.as_str(),
            AttachmentData::Point(a) => a.name.as_str(),
        }
    }

    pub fn vertices(&self) -> Option<&MeshVertices> {
        match self {
            AttachmentData::Mesh(a) => Some(&a.vertices),
            AttachmentData::Path(a) => Some(&a.vertices),
            AttachmentData::Region(_) | AttachmentData::Point(_) => None,
        }
    }

    /// Deform timeline key for vertex attachments.
    pub fn timeline_id(&self) -> Option<u32> {
        match self {
            AttachmentData::Mesh(a) => Some(a.timeline_id),
            AttachmentData::Path(a) => Some(a.id),
            AttachmentData::Region(_) | AttachmentData::Point(_) => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SkinData {
    pub name: String,
    /// Per slot, attachments keyed by name.
    pub attachments: Vec<HashMap<String, Arc<AttachmentData>>>,
    pub bones: Vec<usize>,
    pub ik_constraints: Vec<usize>,
    pub transform_constraints: Vec<usize>,
    pub path_constraints: Vec<usize>,
}

impl SkinData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn attachment(&self, slot_index: usize, name: &str) -> Option<&Arc<AttachmentData>> {
        self.attachments
            .get(slot_index)
            .and_then(|slot_map| slot_map.get(name))
    }

    pub fn set_attachment(
        &mut self,
        slot_index: usize,
        name: impl Into<String>,
        attachment: AttachmentData,
    ) {
        if self.attachments.len() <= slot_index {
            self.attachments.resize_with(slot_index + 1, HashMap::new);
        }
        self.attachments[slot_index].insert(name.into(), Arc::new(attachment));
    }

    /// Every attachment registered for `slot_index`.
    pub fn slot_attachments(
        &self,
        slot_index: usize,
    ) -> impl Iterator<Item = &Arc<AttachmentData>> {
        self.attachments
            .get(slot_index)
            .into_iter()
            .flat_map(|slot_map| slot_map.values())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EventData {
    pub name: String,
    pub int_value: i32,
    pub float_value: f32,
    pub string: String,
    pub audio_path: String,
    pub volume: f32,
    pub balance: f32,
}

impl EventData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            int_value: 0,
            float_value: 0.0,
            string: String::new(),
            audio_path: String::new(),
            volume: 1.0,
            balance: 0.0,
        }
    }
}

/// A keyed event fired by an event timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub time: f32,
    pub data: Arc<EventData>,
    pub int_value: i32,
    pub float_value: f32,
    pub string: String,
    pub volume: f32,
    pub balance: f32,
}

impl Event {
    pub fn new(time: f32, data: Arc<EventData>) -> Self {
        Self {
            time,
            int_value: data.int_value,
            float_value: data.float_value,
            string: data.string.clone(),
            volume: data.volume,
            balance: data.balance,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }
}

pub const DEFAULT_SKIN_NAME: &str = "default";

/// Immutable setup data shared by every [`crate::Skeleton`] built from it.
#[derive(Clone, Debug, Default)]
pub struct SkeletonData {
    pub name: String,
    pub bones: Vec<BoneData>,
    pub slots: Vec<SlotData>,
    pub skins: HashMap<String, SkinData>,
    pub events: Vec<Arc<EventData>>,
    pub animations: Vec<Arc<Animation>>,
    pub animation_index: HashMap<String, usize>,
    pub ik_constraints: Vec<IkConstraintData>,
    pub transform_constraints: Vec<TransformConstraintData>,
    pub path_constraints: Vec<PathConstraintData>,
}

impl SkeletonData {
    pub fn add_animation(&mut self, animation: Animation) -> usize {
        let index = self.animations.len();
        self.animation_index.insert(animation.name.clone(), index);
        self.animations.push(Arc::new(animation));
        index
    }

    pub fn animation(&self, name: &str) -> Option<(usize, &Arc<Animation>)> {
        let index = *self.animation_index.get(name)?;
        Some((index, &self.animations[index]))
    }

    pub fn find_animation(&self, name: &str) -> Result<(usize, &Arc<Animation>), Error> {
        self.animation(name).ok_or_else(|| Error::UnknownAnimation {
            name: name.to_string(),
        })
    }

    pub fn find_bone(&self, name: &str) -> Result<usize, Error> {
        self.bones
            .iter()
            .position(|b| b.name == name)
            .ok_or_else(|| Error::UnknownBone {
                name: name.to_string(),
            })
    }

    pub fn find_slot(&self, name: &str) -> Result<usize, Error> {
        self.slots
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| Error::UnknownSlot {
                name: name.to_string(),
            })
    }

    pub fn find_event(&self, name: &str) -> Result<&Arc<EventData>, Error> {
        self.events
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| Error::UnknownEvent {
                name: name.to_string(),
            })
    }

    pub fn find_ik_constraint(&self, name: &str) -> Result<usize, Error> {
        self.ik_constraints
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| Error::UnknownConstraint {
                name: name.to_string(),
            })
    }

    pub fn find_transform_constraint(&self, name: &str) -> Result<usize, Error> {
        self.transform_constraints
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| Error::UnknownConstraint {
                name: name.to_string(),
            })
    }

    pub fn find_path_constraint(&self, name: &str) -> Result<usize, Error> {
        self.path_constraints
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| Error::UnknownConstraint {
                name: name.to_string(),
            })
    }

    pub fn skin(&self, name: &str) -> Option<&SkinData> {
        self.skins.get(name)
    }

    pub fn default_skin(&self) -> Option<&SkinData> {
        self.skins.get(DEFAULT_SKIN_NAME)
    }
}
