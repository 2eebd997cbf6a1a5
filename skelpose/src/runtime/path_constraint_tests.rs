use crate::{
    AttachmentData, BoneData, DEFAULT_SKIN_NAME, MeshVertices, PathAttachmentData,
    PathConstraintData, PositionMode, RotateMode, Skeleton, SkeletonData, SkinData, SlotData,
    SpacingMode,
};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-3,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

const FIRST: usize = 1;
const SECOND: usize = 2;

/// A straight path from (0, 0) to (10, 0) with evenly spaced control points.
fn straight_path(constant_speed: bool) -> AttachmentData {
    AttachmentData::Path(PathAttachmentData {
        id: 1,
        name: "track".to_string(),
        vertices: MeshVertices::Unweighted(vec![
            [-1.0, 0.0],
            [0.0, 0.0],
            [10.0 / 3.0, 0.0],
            [20.0 / 3.0, 0.0],
            [10.0, 0.0],
            [11.0, 0.0],
        ]),
        lengths: vec![10.0],
        closed: false,
        constant_speed,
    })
}

/// Two chained bones of length 2, the first turned 45 degrees, following the straight path.
fn follow(
    constant_speed: bool,
    configure: impl FnOnce(&mut PathConstraintData),
) -> Skeleton {
    let mut first = BoneData::new("first", Some(0));
    first.length = 2.0;
    first.rotation = 45.0;
    let mut second = BoneData::new("second", Some(FIRST));
    second.x = 2.0;
    second.length = 2.0;

    let mut slot = SlotData::new("track", 0);
    slot.attachment = Some("track".to_string());
    let mut skin = SkinData::new(DEFAULT_SKIN_NAME);
    skin.set_attachment(0, "track", straight_path(constant_speed));

    let mut constraint = PathConstraintData::new("follow", vec![FIRST, SECOND], 0);
    constraint.position_mode = PositionMode::Fixed;
    constraint.position = 1.0;
    configure(&mut constraint);

    let mut data = SkeletonData {
        bones: vec![BoneData::new("root", None), first, second],
        slots: vec![slot],
        path_constraints: vec![constraint],
        ..SkeletonData::default()
    };
    data.skins.insert(DEFAULT_SKIN_NAME.to_string(), skin);
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform();
    skeleton
}

fn positions(skeleton: &Skeleton) -> [f32; 4] {
    let (a, b) = (&skeleton.bones[FIRST], &skeleton.bones[SECOND]);
    [a.world_x, a.world_y, b.world_x, b.world_y]
}

#[test]
fn length_spacing_places_bones_end_to_end() {
    for constant_speed in [false, true] {
        let skeleton = follow(constant_speed, |_| {});
        let [x1, y1, x2, y2] = positions(&skeleton);
        assert_approx(x1, 1.0);
        assert_approx(y1, 0.0);
        assert_approx(x2, 3.0);
        assert_approx(y2, 0.0);
    }
}

#[test]
fn tangent_mode_aligns_bones_with_the_path() {
    let skeleton = follow(false, |_| {});
    for bone in [FIRST, SECOND] {
        assert_approx(skeleton.bones[bone].world_rotation_x(), 0.0);
        assert_approx(skeleton.bones[bone].world_scale_x(), 1.0);
    }
    // The applied pose of the second bone is relative to the moved first bone.
    assert_approx(skeleton.bones[SECOND].ax, 2.0);
    assert_approx(skeleton.bones[SECOND].arotation, 0.0);
}

#[test]
fn spacing_modes() {
    let skeleton = follow(false, |c| {
        c.spacing_mode = SpacingMode::Fixed;
        c.spacing = 4.0;
    });
    assert_approx(positions(&skeleton)[2], 5.0);

    let skeleton = follow(false, |c| {
        c.spacing_mode = SpacingMode::Length;
        c.spacing = 1.0;
    });
    assert_approx(positions(&skeleton)[2], 4.0);

    let skeleton = follow(false, |c| {
        c.position_mode = PositionMode::Percent;
        c.position = 0.5;
        c.spacing_mode = SpacingMode::Percent;
        c.spacing = 0.1;
    });
    let [x1, _, x2, _] = positions(&skeleton);
    assert_approx(x1, 5.0);
    assert_approx(x2, 6.0);

    let skeleton = follow(false, |c| {
        c.spacing_mode = SpacingMode::Proportional;
        c.spacing = 0.5;
    });
    assert_approx(positions(&skeleton)[2], 6.0);
}

#[test]
fn positions_past_the_ends_extend_the_end_tangents() {
    let skeleton = follow(false, |c| c.position = -1.0);
    let [x1, y1, x2, _] = positions(&skeleton);
    assert_approx(x1, -1.0);
    assert_approx(y1, 0.0);
    assert_approx(x2, 1.0);

    let skeleton = follow(false, |c| c.position = 9.0);
    let [x1, _, x2, y2] = positions(&skeleton);
    assert_approx(x1, 9.0);
    assert_approx(x2, 11.0);
    assert_approx(y2, 0.0);
}

#[test]
fn chain_scale_stretches_bones_to_their_spacing() {
    let skeleton = follow(false, |c| {
        c.rotate_mode = RotateMode::ChainScale;
        c.spacing = 1.0;
    });
    let first = &skeleton.bones[FIRST];
    assert_approx(first.world_x, 1.0);
    assert_approx(first.world_rotation_x(), 0.0);
    assert_approx(first.world_scale_x(), 1.5);
}

#[test]
fn mixes_blend_toward_the_path() {
    let skeleton = follow(false, |c| {
        c.mix_x = 0.5;
        c.mix_y = 0.5;
        c.mix_rotate = 0.5;
    });
    let first = &skeleton.bones[FIRST];
    assert_approx(first.world_x, 0.5);
    assert_approx(first.world_y, 0.0);
    assert_approx(first.world_rotation_x(), 22.5);

    let skeleton = follow(false, |c| {
        c.mix_x = 0.0;
        c.mix_y = 0.0;
        c.mix_rotate = 0.0;
    });
    assert_approx(skeleton.bones[FIRST].world_rotation_x(), 45.0);
    assert_approx(skeleton.bones[SECOND].world_x, 2.0_f32.sqrt());
}

#[test]
fn slot_without_a_path_attachment_is_ignored() {
    let mut skeleton = follow(false, |_| {});
    skeleton.set_attachment("track", None).unwrap();
    skeleton.update_world_transform();
    assert_approx(skeleton.bones[FIRST].world_rotation_x(), 45.0);
    assert_approx(skeleton.bones[FIRST].world_x, 0.0);
}
