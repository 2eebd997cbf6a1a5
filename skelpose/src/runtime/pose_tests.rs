use crate::{
    AttachmentData, BlendMode, BoneData, DEFAULT_SKIN_NAME, MeshAttachmentData, MeshVertices,
    RegionAttachmentData, Skeleton, SkeletonData, SkeletonPose, SkinData, SlotData,
    VertexWeight, append_pose, build_pose,
};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-3,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn region(name: &str) -> AttachmentData {
    AttachmentData::Region(RegionAttachmentData {
        name: name.to_string(),
        path: name.to_string(),
        color: [1.0; 4],
        x: 0.0,
        y: 0.0,
        rotation: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
        width: 10.0,
        height: 10.0,
    })
}

fn mesh(id: u32, name: &str, vertices: MeshVertices) -> AttachmentData {
    let count = vertices.vertex_count();
    AttachmentData::Mesh(MeshAttachmentData {
        id,
        timeline_id: id,
        name: name.to_string(),
        path: name.to_string(),
        color: [1.0; 4],
        vertices,
        uvs: vec![[0.0, 0.0]; count],
        triangles: Vec::new(),
    })
}

fn weight(bone: usize, x: f32, y: f32, weight: f32) -> VertexWeight {
    VertexWeight { bone, x, y, weight }
}

/// `root` and `body` (at (5, 0), turned 90 degrees) with three slots: a region on the root, an
/// unweighted mesh on the body and a mesh weighted across both bones.
fn figure() -> Skeleton {
    let mut body = BoneData::new("body", Some(0));
    body.x = 5.0;
    body.rotation = 90.0;

    let mut back = SlotData::new("back", 0);
    back.attachment = Some("back".to_string());
    let mut front = SlotData::new("front", 1);
    front.attachment = Some("front".to_string());
    front.has_dark = true;
    front.dark_color = [0.1, 0.2, 0.3];
    front.blend = BlendMode::Additive;
    let mut cloth = SlotData::new("cloth", 0);
    cloth.attachment = Some("cloth".to_string());

    let mut skin = SkinData::new(DEFAULT_SKIN_NAME);
    skin.set_attachment(0, "back", region("back"));
    skin.set_attachment(
        1,
        "front",
        mesh(1, "front", MeshVertices::Unweighted(vec![[1.0, 0.0], [0.0, 1.0]])),
    );
    skin.set_attachment(
        2,
        "cloth",
        mesh(
            2,
            "cloth",
            MeshVertices::Weighted(vec![vec![
                weight(0, 2.0, 0.0, 0.5),
                weight(1, 2.0, 0.0, 0.5),
            ]]),
        ),
    );

    let mut data = SkeletonData {
        bones: vec![BoneData::new("root", None), body],
        slots: vec![back, front, cloth],
        ..SkeletonData::default()
    };
    data.skins.insert(DEFAULT_SKIN_NAME.to_string(), skin);
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform();
    skeleton
}

#[test]
fn bones_carry_their_world_transform() {
    let pose = build_pose(&figure());
    assert_eq!(pose.bones.len(), 2);

    let body = pose.bone("body").unwrap();
    assert_approx(body.world[0], 5.0);
    assert_approx(body.world[1], 0.0);
    let [a, b, c, d] = body.matrix;
    assert_approx(a, 0.0);
    assert_approx(b, -1.0);
    assert_approx(c, 1.0);
    assert_approx(d, 0.0);
    assert!(body.active);
    assert!(pose.bone("tail").is_none());
}

#[test]
fn slots_follow_the_draw_order() {
    let mut skeleton = figure();
    let pose = build_pose(&skeleton);
    let names: Vec<_> = pose.slots.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["back", "front", "cloth"]);

    skeleton.draw_order = vec![2, 0, 1];
    let pose = build_pose(&skeleton);
    let names: Vec<_> = pose.slots.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["cloth", "back", "front"]);
    assert_eq!(pose.draw_order, [2_usize, 0, 1]);
}

#[test]
fn slot_state_is_copied() {
    let pose = build_pose(&figure());
    let back = pose.slot("back").unwrap();
    assert_eq!(back.attachment.as_deref(), Some("back"));
    assert_eq!(back.bone, 0);
    assert_eq!(back.dark_color, None);
    assert_eq!(back.blend, BlendMode::Normal);

    let front = pose.slot("front").unwrap();
    assert_eq!(front.dark_color, Some([0.1, 0.2, 0.3]));
    assert_eq!(front.blend, BlendMode::Additive);
    assert_eq!(front.color, [1.0; 4]);
}

#[test]
fn mesh_vertices_are_placed_in_world_space() {
    let pose = build_pose(&figure());
    assert!(pose.slot("back").unwrap().world_vertices.is_empty());

    let front = &pose.slot("front").unwrap().world_vertices;
    assert_eq!(front.len(), 4);
    assert_approx(front[0], 5.0);
    assert_approx(front[1], 1.0);
    assert_approx(front[2], 4.0);
    assert_approx(front[3], 0.0);

    // Half from the root at (2, 0), half from the body at (5, 2).
    let cloth = &pose.slot("cloth").unwrap().world_vertices;
    assert_eq!(cloth.len(), 2);
    assert_approx(cloth[0], 3.5);
    assert_approx(cloth[1], 1.0);
}

#[test]
fn hidden_attachments_are_reported_as_none() {
    let mut skeleton = figure();
    skeleton.set_attachment("front", None).unwrap();
    let pose = build_pose(&skeleton);
    let front = pose.slot("front").unwrap();
    assert_eq!(front.attachment, None);
    assert!(front.world_vertices.is_empty());
}

#[test]
fn append_pose_replaces_the_previous_frame() {
    let mut skeleton = figure();
    let mut pose = SkeletonPose::default();
    append_pose(&mut pose, &skeleton);
    assert_eq!(pose.slots.len(), 3);

    skeleton.x = 1.0;
    skeleton.update_world_transform();
    append_pose(&mut pose, &skeleton);
    assert_eq!(pose.bones.len(), 2);
    assert_eq!(pose.slots.len(), 3);
    assert_approx(pose.bone("body").unwrap().world[0], 6.0);
    assert_eq!(pose, build_pose(&skeleton));
}

#[cfg(feature = "serde")]
#[test]
fn pose_serializes_to_json() {
    let json = build_pose(&figure()).to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["bones"][1]["name"], "body");
    assert_eq!(value["slots"][1]["attachment"], "front");
    assert!(value["slots"][0]["dark_color"].is_null());
}

#[cfg(feature = "glam")]
#[test]
fn bone_pose_converts_to_an_affine() {
    let pose = build_pose(&figure());
    let point = pose
        .bone("body")
        .unwrap()
        .world_matrix()
        .transform_point2(glam::Vec2::new(1.0, 0.0));
    assert_approx(point.x, 5.0);
    assert_approx(point.y, 1.0);
}
