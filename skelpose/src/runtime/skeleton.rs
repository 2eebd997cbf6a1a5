use super::bone::{Bone, LocalTransform, RootTransform, WorldTransform};
use super::ik::IkConstraint;
use super::path_constraint::PathConstraint;
use super::transform_constraint::TransformConstraint;
use crate::{AttachmentData, BlendMode, Error, MeshVertices, SkeletonData, SkinData, SlotData};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Slot {
    data_index: usize,
    pub bone: usize,
    pub attachment: Option<Arc<AttachmentData>>,
    pub(crate) attachment_state: i32,
    /// Deformed vertices of the current vertex attachment: absolute positions when unweighted,
    /// offsets per bone influence when weighted. Empty means the setup vertices.
    pub deform: Vec<f32>,
    pub color: [f32; 4],
    pub has_dark: bool,
    pub dark_color: [f32; 3],
    pub blend: BlendMode,
}

impl Slot {
    fn new(data_index: usize, data: &SlotData) -> Self {
        Self {
            data_index,
            bone: data.bone,
            attachment: None,
            attachment_state: 0,
            deform: Vec::new(),
            color: data.color,
            has_dark: data.has_dark,
            dark_color: data.dark_color,
            blend: data.blend,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn attachment_name(&self) -> Option<&str> {
        self.attachment.as_deref().map(AttachmentData::name)
    }

    /// Sets the attachment. Deform offsets survive only a switch between vertex attachments that
    /// share a deform timeline id.
    pub fn set_attachment(&mut self, attachment: Option<Arc<AttachmentData>>) {
        let same = match (&self.attachment, &attachment) {
            (Some(current), Some(new)) => Arc::ptr_eq(current, new),
            (None, None) => true,
            _ => false,
        };
        if same {
            return;
        }
        let current_id = self.attachment.as_ref().and_then(|a| a.timeline_id());
        let new_id = attachment.as_ref().and_then(|a| a.timeline_id());
        if new_id.is_none() || current_id.is_none() || new_id != current_id {
            self.deform.clear();
        }
        self.attachment = attachment;
    }
}

/// One step of the world transform pass.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UpdateCacheItem {
    Bone(usize),
    Ik(usize),
    Transform(usize),
    Path(usize),
}

/// A posable instance of [`SkeletonData`].
#[derive(Clone, Debug)]
pub struct Skeleton {
    pub data: Arc<SkeletonData>,
    pub bones: Vec<Bone>,
    bone_children: Vec<Vec<usize>>,
    pub slots: Vec<Slot>,
    /// Slot indices in draw order.
    pub draw_order: Vec<usize>,
    pub ik_constraints: Vec<IkConstraint>,
    pub transform_constraints: Vec<TransformConstraint>,
    pub path_constraints: Vec<PathConstraint>,
    skin: Option<String>,
    pub color: [f32; 4],
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    update_cache: Vec<UpdateCacheItem>,
}

fn build_bone_children_indices(bones: &[Bone]) -> Vec<Vec<usize>> {
    let mut children = vec![Vec::new(); bones.len()];
    for (i, bone) in bones.iter().enumerate() {
        if let Some(parent) = bone.parent_index() {
            if let Some(list) = children.get_mut(parent) {
                list.push(i);
            }
        }
    }
    children
}

impl Skeleton {
    pub fn new(data: Arc<SkeletonData>) -> Self {
        let bones: Vec<Bone> = data
            .bones
            .iter()
            .enumerate()
            .map(|(i, d)| Bone::new(i, d))
            .collect();
        let bone_children = build_bone_children_indices(&bones);
        let slots: Vec<Slot> = data
            .slots
            .iter()
            .enumerate()
            .map(|(i, d)| Slot::new(i, d))
            .collect();
        let ik_constraints = data
            .ik_constraints
            .iter()
            .enumerate()
            .map(|(i, d)| IkConstraint::new(i, d))
            .collect();
        let transform_constraints = data
            .transform_constraints
            .iter()
            .enumerate()
            .map(|(i, d)| TransformConstraint::new(i, d))
            .collect();
        let path_constraints = data
            .path_constraints
            .iter()
            .enumerate()
            .map(|(i, d)| PathConstraint::new(i, d))
            .collect();

        let mut skeleton = Self {
            draw_order: (0..slots.len()).collect(),
            data,
            bones,
            bone_children,
            slots,
            ik_constraints,
            transform_constraints,
            path_constraints,
            skin: None,
            color: [1.0; 4],
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            update_cache: Vec::new(),
        };
        skeleton.set_slots_to_setup_pose();
        skeleton.update_cache();
        skeleton
    }

    pub fn skin_name(&self) -> Option<&str> {
        self.skin.as_deref()
    }

    fn current_skin(&self) -> Option<&SkinData> {
        self.skin.as_deref().and_then(|name| self.data.skin(name))
    }

    pub fn bone_children(&self, bone_index: usize) -> &[usize] {
        self.bone_children
            .get(bone_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn find_bone(&self, name: &str) -> Result<usize, Error> {
        self.data.find_bone(name)
    }

    pub fn find_slot(&self, name: &str) -> Result<usize, Error> {
        self.data.find_slot(name)
    }

    pub fn update_cache_items(&self) -> &[UpdateCacheItem] {
        &self.update_cache
    }

    /// Rebuilds the ordered list of bones and constraints run by
    /// [`Skeleton::update_world_transform`]. Needed after changing the skin or constraint order.
    pub fn update_cache(&mut self) {
        for (bone, data) in self.bones.iter_mut().zip(&self.data.bones) {
            bone.sorted = data.skin_required;
            bone.active = !bone.sorted;
        }

        let data = Arc::clone(&self.data);
        let skin = self.skin.as_deref().and_then(|name| data.skin(name));
        if let Some(skin) = skin {
            for &bone_index in &skin.bones {
                let mut current = Some(bone_index);
                while let Some(i) = current {
                    let Some(bone) = self.bones.get_mut(i) else {
                        log::warn!("skin '{}' references missing bone {i}", skin.name);
                        break;
                    };
                    bone.sorted = false;
                    bone.active = true;
                    current = bone.parent_index();
                }
            }
        }

        let mut cache = Vec::with_capacity(self.bones.len());
        let constraint_count = self.ik_constraints.len()
            + self.transform_constraints.len()
            + self.path_constraints.len();
        for order in 0..constraint_count {
            if let Some(i) = data.ik_constraints.iter().position(|c| c.order == order) {
                self.sort_ik_constraint(i, skin, &mut cache);
            } else if let Some(i) = data
                .transform_constraints
                .iter()
                .position(|c| c.order == order)
            {
                self.sort_transform_constraint(i, skin, &mut cache);
            } else if let Some(i) = data.path_constraints.iter().position(|c| c.order == order) {
                self.sort_path_constraint(i, skin, &mut cache);
            }
        }

        for i in 0..self.bones.len() {
            self.sort_bone(i, &mut cache);
        }

        log::debug!("rebuilt update cache: {} items", cache.len());
        self.update_cache = cache;
    }

    fn constraint_active(
        skin_required: bool,
        skin: Option<&SkinData>,
        in_skin: impl Fn(&SkinData) -> bool,
    ) -> bool {
        !skin_required || skin.is_some_and(in_skin)
    }

    fn sort_ik_constraint(
        &mut self,
        index: usize,
        skin: Option<&SkinData>,
        cache: &mut Vec<UpdateCacheItem>,
    ) {
        let data = Arc::clone(&self.data);
        let c = &data.ik_constraints[index];
        let active = self.bones[c.target].active
            && Self::constraint_active(c.skin_required, skin, |s| {
                s.ik_constraints.contains(&index)
            });
        self.ik_constraints[index].active = active;
        if !active {
            return;
        }

        self.sort_bone(c.target, cache);
        let Some(&parent) = c.bones.first() else {
            return;
        };
        self.sort_bone(parent, cache);
        if c.bones.len() == 1 {
            cache.push(UpdateCacheItem::Ik(index));
            self.sort_reset_children(parent);
        } else {
            let child = c.bones[c.bones.len() - 1];
            self.sort_bone(child, cache);
            cache.push(UpdateCacheItem::Ik(index));
            self.sort_reset_children(parent);
            self.bones[child].sorted = true;
        }
    }

    fn sort_transform_constraint(
        &mut self,
        index: usize,
        skin: Option<&SkinData>,
        cache: &mut Vec<UpdateCacheItem>,
    ) {
        let data = Arc::clone(&self.data);
        let c = &data.transform_constraints[index];
        let active = self.bones[c.target].active
            && Self::constraint_active(c.skin_required, skin, |s| {
                s.transform_constraints.contains(&index)
            });
        self.transform_constraints[index].active = active;
        if !active {
            return;
        }

        self.sort_bone(c.target, cache);
        for &bone in &c.bones {
            if c.local {
                if let Some(parent) = self.bones[bone].parent_index() {
                    self.sort_bone(parent, cache);
                }
            }
            self.sort_bone(bone, cache);
        }
        cache.push(UpdateCacheItem::Transform(index));
        for &bone in &c.bones {
            self.sort_reset_children(bone);
        }
        for &bone in &c.bones {
            self.bones[bone].sorted = true;
        }
    }

    fn sort_path_constraint(
        &mut self,
        index: usize,
        skin: Option<&SkinData>,
        cache: &mut Vec<UpdateCacheItem>,
    ) {
        let data = Arc::clone(&self.data);
        let c = &data.path_constraints[index];
        let slot_bone = self.slots[c.target].bone;
        let active = self.bones[slot_bone].active
            && Self::constraint_active(c.skin_required, skin, |s| {
                s.path_constraints.contains(&index)
            });
        self.path_constraints[index].active = active;
        if !active {
            return;
        }

        if let Some(skin) = skin {
            self.sort_path_skin_attachments(skin, c.target, slot_bone, cache);
        }
        if let Some(default_skin) = data.default_skin() {
            if !skin.is_some_and(|s| std::ptr::eq(s, default_skin)) {
                self.sort_path_skin_attachments(default_skin, c.target, slot_bone, cache);
            }
        }
        if let Some(attachment) = self.slots[c.target].attachment.clone() {
            self.sort_path_attachment(&attachment, slot_bone, cache);
        }

        for &bone in &c.bones {
            self.sort_bone(bone, cache);
        }
        cache.push(UpdateCacheItem::Path(index));
        for &bone in &c.bones {
            self.sort_reset_children(bone);
        }
        for &bone in &c.bones {
            self.bones[bone].sorted = true;
        }
    }

    fn sort_path_skin_attachments(
        &mut self,
        skin: &SkinData,
        slot_index: usize,
        slot_bone: usize,
        cache: &mut Vec<UpdateCacheItem>,
    ) {
        let Some(slot_map) = skin.attachments.get(slot_index) else {
            return;
        };
        let mut names: Vec<&String> = slot_map.keys().collect();
        names.sort();
        for name in names {
            self.sort_path_attachment(&slot_map[name], slot_bone, cache);
        }
    }

    fn sort_path_attachment(
        &mut self,
        attachment: &AttachmentData,
        slot_bone: usize,
        cache: &mut Vec<UpdateCacheItem>,
    ) {
        let AttachmentData::Path(path) = attachment else {
            return;
        };
        match &path.vertices {
            MeshVertices::Unweighted(_) => self.sort_bone(slot_bone, cache),
            MeshVertices::Weighted(vertices) => {
                for weight in vertices.iter().flatten() {
                    self.sort_bone(weight.bone, cache);
                }
            }
        }
    }

    fn sort_bone(&mut self, bone_index: usize, cache: &mut Vec<UpdateCacheItem>) {
        let Some(bone) = self.bones.get(bone_index) else {
            return;
        };
        if bone.sorted {
            return;
        }
        if let Some(parent) = bone.parent_index() {
            self.sort_bone(parent, cache);
        }
        self.bones[bone_index].sorted = true;
        cache.push(UpdateCacheItem::Bone(bone_index));
    }

    fn sort_reset_children(&mut self, bone_index: usize) {
        for i in 0..self.bone_children(bone_index).len() {
            let child = self.bone_children[bone_index][i];
            self.sort_reset(child);
        }
    }

    fn sort_reset(&mut self, bone_index: usize) {
        if !self.bones[bone_index].active {
            return;
        }
        if self.bones[bone_index].sorted {
            self.sort_reset_children(bone_index);
        }
        self.bones[bone_index].sorted = false;
    }

    pub(crate) fn root_transform(&self) -> RootTransform {
        RootTransform {
            x: self.x,
            y: self.y,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
        }
    }

    /// World transform of the bone's parent; `None` for root bones.
    pub(crate) fn parent_world(&self, bone_index: usize) -> Option<WorldTransform> {
        let parent = self.bones[bone_index].parent_index()?;
        Some(self.bones[parent].world())
    }

    /// Parent world transform, with the skeleton placement standing in for a root's parent.
    pub(crate) fn parent_world_or_root(&self, bone_index: usize) -> WorldTransform {
        self.parent_world(bone_index)
            .unwrap_or_else(|| self.root_transform().as_parent())
    }

    pub(crate) fn update_bone_world_with(&mut self, bone_index: usize, local: LocalTransform) {
        let parent = self.parent_world(bone_index);
        let root = self.root_transform();
        self.bones[bone_index].update_world_transform_with(parent, root, local);
    }

    pub(crate) fn update_bone_applied(&mut self, bone_index: usize) {
        let parent = self.parent_world(bone_index);
        let root = self.root_transform();
        self.bones[bone_index].update_applied_transform(parent, root);
    }

    /// Resets every bone's applied pose to its local pose, then runs the update cache.
    pub fn update_world_transform(&mut self) {
        for bone in &mut self.bones {
            let local = bone.local();
            bone.set_applied(local);
        }

        for step in 0..self.update_cache.len() {
            match self.update_cache[step] {
                UpdateCacheItem::Bone(i) => {
                    let applied = self.bones[i].applied();
                    self.update_bone_world_with(i, applied);
                }
                UpdateCacheItem::Ik(i) => self.apply_ik_constraint(i),
                UpdateCacheItem::Transform(i) => self.apply_transform_constraint(i),
                UpdateCacheItem::Path(i) => self.apply_path_constraint(i),
            }
        }
    }

    pub fn set_to_setup_pose(&mut self) {
        self.set_bones_to_setup_pose();
        self.set_slots_to_setup_pose();
    }

    /// Restores bone local poses and constraint values.
    pub fn set_bones_to_setup_pose(&mut self) {
        let data = Arc::clone(&self.data);
        for (bone, bone_data) in self.bones.iter_mut().zip(&data.bones) {
            bone.set_to_setup_pose(bone_data);
        }
        for (c, c_data) in self.ik_constraints.iter_mut().zip(&data.ik_constraints) {
            c.set_to_setup_pose(c_data);
        }
        for (c, c_data) in self
            .transform_constraints
            .iter_mut()
            .zip(&data.transform_constraints)
        {
            c.set_to_setup_pose(c_data);
        }
        for (c, c_data) in self.path_constraints.iter_mut().zip(&data.path_constraints) {
            c.set_to_setup_pose(c_data);
        }
    }

    /// Restores draw order, slot colors and setup attachments.
    pub fn set_slots_to_setup_pose(&mut self) {
        for (i, slot) in self.draw_order.iter_mut().enumerate() {
            *slot = i;
        }
        let data = Arc::clone(&self.data);
        for (i, slot_data) in data.slots.iter().enumerate() {
            let slot = &mut self.slots[i];
            slot.color = slot_data.color;
            slot.has_dark = slot_data.has_dark;
            slot.dark_color = slot_data.dark_color;
            slot.blend = slot_data.blend;
            match slot_data.attachment.as_deref() {
                None => self.slots[i].set_attachment(None),
                Some(name) => {
                    let attachment = self.attachment(i, name).cloned();
                    let slot = &mut self.slots[i];
                    slot.attachment = None;
                    slot.set_attachment(attachment);
                }
            }
        }
    }

    /// Looks up an attachment in the active skin, then the default skin.
    pub fn attachment(&self, slot_index: usize, name: &str) -> Option<&Arc<AttachmentData>> {
        if let Some(found) = self
            .current_skin()
            .and_then(|skin| skin.attachment(slot_index, name))
        {
            return Some(found);
        }
        self.data
            .default_skin()
            .and_then(|skin| skin.attachment(slot_index, name))
    }

    /// Sets a slot's attachment by name; `None` clears it.
    pub fn set_attachment(
        &mut self,
        slot_name: &str,
        attachment_name: Option<&str>,
    ) -> Result<(), Error> {
        let slot_index = self.find_slot(slot_name)?;
        let attachment = match attachment_name {
            None => None,
            Some(name) => Some(Arc::clone(self.attachment(slot_index, name).ok_or_else(
                || Error::UnknownAttachment {
                    slot: slot_name.to_string(),
                    name: name.to_string(),
                },
            )?)),
        };
        self.slots[slot_index].set_attachment(attachment);
        Ok(())
    }

    /// Transforms `count` floats of `vertices`, starting at float `start`, into world space
    /// using the slot's bone (or the weighted bones) and the slot's deform.
    pub(crate) fn compute_world_vertices(
        &self,
        slot_index: usize,
        vertices: &MeshVertices,
        start: usize,
        count: usize,
        out: &mut [f32],
        offset: usize,
    ) {
        let slot = &self.slots[slot_index];
        let deform = &slot.deform;
        let end = offset + count;
        match vertices {
            MeshVertices::Unweighted(setup) => {
                let bone = &self.bones[slot.bone];
                for (v, w) in (start..).step_by(2).zip((offset..end).step_by(2)) {
                    let (vx, vy) = if deform.is_empty() {
                        let p = setup[v / 2];
                        (p[0], p[1])
                    } else {
                        (deform[v], deform[v + 1])
                    };
                    out[w] = vx * bone.a + vy * bone.b + bone.world_x;
                    out[w + 1] = vx * bone.c + vy * bone.d + bone.world_y;
                }
            }
            MeshVertices::Weighted(weighted) => {
                let first = start / 2;
                let mut f: usize = weighted[..first].iter().map(|w| w.len() * 2).sum();
                for (influences, w) in weighted[first..].iter().zip((offset..end).step_by(2)) {
                    let (mut wx, mut wy) = (0.0, 0.0);
                    for influence in influences {
                        let bone = &self.bones[influence.bone];
                        let (mut vx, mut vy) = (influence.x, influence.y);
                        if !deform.is_empty() {
                            vx += deform[f];
                            vy += deform[f + 1];
                        }
                        f += 2;
                        wx += (vx * bone.a + vy * bone.b + bone.world_x) * influence.weight;
                        wy += (vx * bone.c + vy * bone.d + bone.world_y) * influence.weight;
                    }
                    out[w] = wx;
                    out[w + 1] = wy;
                }
            }
        }
    }

    /// World positions (`x0, y0, x1, ...`) of the slot's mesh or path attachment.
    pub fn slot_world_vertices(&self, slot_index: usize) -> Option<Vec<f32>> {
        let vertices = self.slots.get(slot_index)?.attachment.as_deref()?.vertices()?;
        let length = vertices.world_vertices_length();
        let mut out = vec![0.0; length];
        self.compute_world_vertices(slot_index, vertices, 0, length, &mut out, 0);
        Some(out)
    }

    /// Timeline path: an unresolvable name clears the slot.
    pub(crate) fn set_attachment_by_name(&mut self, slot_index: usize, name: Option<&str>) {
        let attachment = name.and_then(|n| self.attachment(slot_index, n).cloned());
        if let Some(slot) = self.slots.get_mut(slot_index) {
            slot.set_attachment(attachment);
        }
    }

    /// Switches skins. Slots showing an attachment from the old skin get the new skin's
    /// attachment of the same name; with no old skin, setup attachments found in the new skin
    /// are attached.
    pub fn set_skin(&mut self, skin_name: Option<&str>) -> Result<(), Error> {
        if skin_name == self.skin.as_deref() {
            return Ok(());
        }
        let data = Arc::clone(&self.data);
        let new_skin = match skin_name {
            None => None,
            Some(name) => Some(data.skin(name).ok_or_else(|| Error::UnknownSkin {
                name: name.to_string(),
            })?),
        };

        if let Some(new_skin) = new_skin {
            match self.current_skin() {
                Some(old_skin) => {
                    let mut replacements = Vec::new();
                    for (slot_index, slot_map) in old_skin.attachments.iter().enumerate() {
                        let slot = self.slots.get(slot_index);
                        let Some(current) = slot.and_then(|s| s.attachment.as_ref()) else {
                            continue;
                        };
                        for (name, attachment) in slot_map {
                            if !Arc::ptr_eq(current, attachment) {
                                continue;
                            }
                            if let Some(new) = new_skin.attachment(slot_index, name) {
                                replacements.push((slot_index, Arc::clone(new)));
                            }
                        }
                    }
                    for (slot_index, attachment) in replacements {
                        self.slots[slot_index].set_attachment(Some(attachment));
                    }
                }
                None => {
                    for (slot_index, slot_data) in data.slots.iter().enumerate() {
                        let Some(name) = slot_data.attachment.as_deref() else {
                            continue;
                        };
                        if let Some(attachment) = new_skin.attachment(slot_index, name) {
                            self.slots[slot_index].set_attachment(Some(Arc::clone(attachment)));
                        }
                    }
                }
            }
        }

        self.skin = skin_name.map(str::to_string);
        self.update_cache();
        Ok(())
    }
}
