use crate::{BoneData, IkConstraintData, Inherit, Skeleton, SkeletonData};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-3,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn bone(name: &str, parent: Option<usize>, x: f32, y: f32, length: f32) -> BoneData {
    let mut bone = BoneData::new(name, parent);
    bone.x = x;
    bone.y = y;
    bone.length = length;
    bone
}

/// root, arm (length 2) and a target at `target`.
fn one_bone(target: [f32; 2], configure: impl FnOnce(&mut IkConstraintData)) -> Skeleton {
    let mut ik = IkConstraintData::new("aim", vec![1], 2);
    configure(&mut ik);
    let data = SkeletonData {
        bones: vec![
            bone("root", None, 0.0, 0.0, 0.0),
            bone("arm", Some(0), 0.0, 0.0, 2.0),
            bone("target", Some(0), target[0], target[1], 0.0),
        ],
        ik_constraints: vec![ik],
        ..SkeletonData::default()
    };
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform();
    skeleton
}

/// root, upper and lower (both length 1) and a target at `target`.
fn two_bones(target: [f32; 2], configure: impl FnOnce(&mut IkConstraintData)) -> Skeleton {
    let mut ik = IkConstraintData::new("leg", vec![1, 2], 3);
    configure(&mut ik);
    let data = SkeletonData {
        bones: vec![
            bone("root", None, 0.0, 0.0, 0.0),
            bone("upper", Some(0), 0.0, 0.0, 1.0),
            bone("lower", Some(1), 1.0, 0.0, 1.0),
            bone("target", Some(0), target[0], target[1], 0.0),
        ],
        ik_constraints: vec![ik],
        ..SkeletonData::default()
    };
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform();
    skeleton
}

fn tip(skeleton: &Skeleton, bone: usize) -> [f32; 2] {
    let length = skeleton.data.bones[bone].length;
    skeleton.bones[bone].local_to_world(length, 0.0)
}

#[test]
fn one_bone_points_at_the_target() {
    let skeleton = one_bone([0.0, 5.0], |_| {});
    let arm = &skeleton.bones[1];
    assert_approx(arm.world_rotation_x(), 90.0);
    assert_approx(arm.arotation, 90.0);
    assert_eq!(arm.rotation, 0.0, "local pose is not written");
    assert_approx(arm.world_scale_x(), 1.0);
}

#[test]
fn one_bone_mix_blends_the_rotation() {
    let skeleton = one_bone([0.0, 5.0], |ik| ik.mix = 0.5);
    assert_approx(skeleton.bones[1].world_rotation_x(), 45.0);

    let skeleton = one_bone([0.0, 5.0], |ik| ik.mix = 0.0);
    assert_approx(skeleton.bones[1].world_rotation_x(), 0.0);
}

#[test]
fn one_bone_stretch_and_compress() {
    let skeleton = one_bone([0.0, 5.0], |ik| ik.stretch = true);
    assert_approx(skeleton.bones[1].world_scale_x(), 2.5);
    assert_approx(skeleton.bones[1].world_scale_y(), 1.0);

    let skeleton = one_bone([0.0, 5.0], |ik| {
        ik.stretch = true;
        ik.uniform = true;
    });
    assert_approx(skeleton.bones[1].world_scale_y(), 2.5);

    // A far target only stretches; a near target only compresses.
    let skeleton = one_bone([1.0, 0.0], |ik| ik.stretch = true);
    assert_approx(skeleton.bones[1].world_scale_x(), 1.0);
    let skeleton = one_bone([1.0, 0.0], |ik| ik.compress = true);
    assert_approx(skeleton.bones[1].world_scale_x(), 0.5);
}

#[test]
fn root_bone_aims_relative_to_the_skeleton_placement() {
    let mut ik = IkConstraintData::new("aim", vec![0], 1);
    ik.mix = 1.0;
    let data = SkeletonData {
        bones: vec![
            bone("root", None, 0.0, 0.0, 1.0),
            bone("target", None, 0.0, 5.0, 0.0),
        ],
        ik_constraints: vec![ik],
        ..SkeletonData::default()
    };
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.x = 10.0;
    skeleton.update_world_transform();

    let root = &skeleton.bones[0];
    assert_approx(root.world_x, 10.0);
    assert_approx(root.world_rotation_x(), 90.0);
}

#[test]
fn one_bone_under_a_collapsed_parent_stays_finite() {
    let mut parent = bone("parent", Some(0), 0.0, 0.0, 0.0);
    parent.scale_x = 0.0;
    let mut arm = bone("arm", Some(1), 0.0, 0.0, 1.0);
    arm.inherit = Inherit::NoRotationOrReflection;
    let data = SkeletonData {
        bones: vec![
            bone("root", None, 0.0, 0.0, 0.0),
            parent,
            arm,
            bone("target", Some(0), 1.0, 1.0, 0.0),
        ],
        ik_constraints: vec![IkConstraintData::new("aim", vec![2], 3)],
        ..SkeletonData::default()
    };
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform();

    let arm = &skeleton.bones[2];
    for value in [arm.a, arm.b, arm.c, arm.d, arm.world_x, arm.world_y, arm.arotation] {
        assert!(value.is_finite(), "{value}");
    }
}

#[test]
fn two_bones_reach_with_either_bend() {
    for (bend, elbow) in [(1, [1.0, 0.0]), (-1, [0.0, 1.0])] {
        let skeleton = two_bones([1.0, 1.0], |ik| ik.bend_direction = bend);
        let lower = &skeleton.bones[2];
        assert_approx(lower.world_x, elbow[0]);
        assert_approx(lower.world_y, elbow[1]);
        let end = tip(&skeleton, 2);
        assert_approx(end[0], 1.0);
        assert_approx(end[1], 1.0);
    }
}

#[test]
fn two_bones_straighten_toward_an_unreachable_target() {
    let skeleton = two_bones([5.0, 0.0], |_| {});
    let end = tip(&skeleton, 2);
    assert_approx(end[0], 2.0);
    assert_approx(end[1], 0.0);
    assert_approx(skeleton.bones[1].world_scale_x(), 1.0);

    let skeleton = two_bones([5.0, 0.0], |ik| ik.stretch = true);
    assert_approx(skeleton.bones[1].world_scale_x(), 2.5);
    let end = tip(&skeleton, 2);
    assert_approx(end[0], 5.0);
    assert_approx(end[1], 0.0);
}

#[test]
fn softness_eases_the_last_stretch_of_reach() {
    let skeleton = two_bones([1.9, 0.0], |ik| ik.softness = 0.5);
    let end = tip(&skeleton, 2);
    assert_approx(end[0], 1.82);
    assert_approx(end[1], 0.0);

    let skeleton = two_bones([1.9, 0.0], |_| {});
    assert_approx(tip(&skeleton, 2)[0], 1.9);
}

#[test]
fn two_bones_with_zero_mix_keep_their_pose() {
    let skeleton = two_bones([1.0, 1.0], |ik| ik.mix = 0.0);
    let end = tip(&skeleton, 2);
    assert_approx(end[0], 2.0);
    assert_approx(end[1], 0.0);
}
