use crate::{BoneData, Skeleton, SkeletonData, TransformConstraintData};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-3,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

const CONSTRAINED: usize = 1;
const TARGET: usize = 2;

/// The constrained bone sits at (3, 0) turned 30 degrees; the target at (1, 2) turned 90
/// degrees and scaled 2 along x.
fn constrained(configure: impl FnOnce(&mut TransformConstraintData)) -> Skeleton {
    let mut bone = BoneData::new("bone", Some(0));
    bone.x = 3.0;
    bone.rotation = 30.0;
    let mut target = BoneData::new("target", Some(0));
    target.x = 1.0;
    target.y = 2.0;
    target.rotation = 90.0;
    target.scale_x = 2.0;

    let mut constraint = TransformConstraintData::new("follow", vec![CONSTRAINED], TARGET);
    configure(&mut constraint);
    let data = SkeletonData {
        bones: vec![BoneData::new("root", None), bone, target],
        transform_constraints: vec![constraint],
        ..SkeletonData::default()
    };
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform();
    skeleton
}

#[test]
fn absolute_world_copies_the_target_transform() {
    let skeleton = constrained(|_| {});
    let bone = &skeleton.bones[CONSTRAINED];
    assert_approx(bone.world_x, 1.0);
    assert_approx(bone.world_y, 2.0);
    assert_approx(bone.world_rotation_x(), 90.0);
    assert_approx(bone.world_scale_x(), 2.0);
    assert_approx(bone.world_scale_y(), 1.0);

    // The applied pose follows the constrained world transform.
    assert_approx(bone.ax, 1.0);
    assert_approx(bone.ay, 2.0);
    assert_approx(bone.arotation, 90.0);
    assert_approx(bone.ascale_x, 2.0);
    assert_eq!(bone.rotation, 30.0);
}

#[test]
fn absolute_world_mixes_and_offsets() {
    let skeleton = constrained(|c| {
        c.mix_rotate = 0.0;
        c.mix_scale_x = 0.0;
        c.mix_scale_y = 0.0;
        c.mix_shear_y = 0.0;
        c.mix_x = 0.5;
        c.mix_y = 0.5;
    });
    let bone = &skeleton.bones[CONSTRAINED];
    assert_approx(bone.world_x, 2.0);
    assert_approx(bone.world_y, 1.0);
    assert_approx(bone.world_rotation_x(), 30.0);

    // Offsets are in the target's local space.
    let skeleton = constrained(|c| {
        c.offset_x = 1.0;
        c.offset_rotation = 10.0;
    });
    let bone = &skeleton.bones[CONSTRAINED];
    assert_approx(bone.world_x, 1.0);
    assert_approx(bone.world_y, 4.0);
    assert_approx(bone.world_rotation_x(), 100.0);
}

#[test]
fn relative_world_adds_the_target_transform() {
    let skeleton = constrained(|c| c.relative = true);
    let bone = &skeleton.bones[CONSTRAINED];
    assert_approx(bone.world_x, 4.0);
    assert_approx(bone.world_y, 2.0);
    assert_approx(bone.world_rotation_x(), 120.0);
    assert_approx(bone.world_scale_x(), 2.0);
}

#[test]
fn absolute_local_mixes_the_local_pose() {
    let skeleton = constrained(|c| {
        c.local = true;
        c.mix_rotate = 0.5;
        c.mix_x = 0.5;
        c.mix_y = 0.5;
        c.mix_scale_x = 0.5;
    });
    let bone = &skeleton.bones[CONSTRAINED];
    assert_approx(bone.arotation, 60.0);
    assert_approx(bone.ax, 2.0);
    assert_approx(bone.ay, 1.0);
    assert_approx(bone.ascale_x, 1.5);
    assert_approx(bone.world_x, 2.0);
    assert_approx(bone.world_y, 1.0);
    assert_approx(bone.world_rotation_x(), 60.0);
}

#[test]
fn relative_local_adds_to_the_local_pose() {
    let skeleton = constrained(|c| {
        c.local = true;
        c.relative = true;
        c.offset_rotation = 10.0;
    });
    let bone = &skeleton.bones[CONSTRAINED];
    assert_approx(bone.arotation, 130.0);
    assert_approx(bone.ax, 4.0);
    assert_approx(bone.ay, 2.0);
    assert_approx(bone.ascale_x, 2.0);
    assert_approx(bone.ascale_y, 1.0);
}

#[test]
fn zero_mixes_leave_the_bone_alone() {
    let skeleton = constrained(|c| {
        c.mix_rotate = 0.0;
        c.mix_x = 0.0;
        c.mix_y = 0.0;
        c.mix_scale_x = 0.0;
        c.mix_scale_y = 0.0;
        c.mix_shear_y = 0.0;
    });
    let bone = &skeleton.bones[CONSTRAINED];
    assert_approx(bone.world_x, 3.0);
    assert_approx(bone.world_y, 0.0);
    assert_approx(bone.world_rotation_x(), 30.0);
}
