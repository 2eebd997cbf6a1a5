use super::bone::wrap_degrees;
use crate::{BoneData, Inherit, Skeleton, SkeletonData};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-3,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

/// `root` / `parent` / `child`, with the child one unit along the parent's x axis.
fn posed(parent: BoneData, inherit: Inherit) -> Skeleton {
    let mut child = BoneData::new("child", Some(1));
    child.x = 1.0;
    child.inherit = inherit;
    let data = SkeletonData {
        bones: vec![BoneData::new("root", None), parent, child],
        ..SkeletonData::default()
    };
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform();
    skeleton
}

fn turned_and_scaled() -> BoneData {
    let mut parent = BoneData::new("parent", Some(0));
    parent.rotation = 90.0;
    parent.scale_x = 2.0;
    parent.scale_y = 2.0;
    parent
}

fn mirrored() -> BoneData {
    let mut parent = BoneData::new("parent", Some(0));
    parent.scale_x = -1.0;
    parent
}

#[test]
fn normal_inherits_the_full_parent_matrix() {
    let skeleton = posed(turned_and_scaled(), Inherit::Normal);
    let child = &skeleton.bones[2];
    assert_approx(child.world_x, 0.0);
    assert_approx(child.world_y, 2.0);
    assert_approx(child.world_rotation_x(), 90.0);
    assert_approx(child.world_scale_x(), 2.0);
    assert_approx(child.world_scale_y(), 2.0);
}

#[test]
fn only_translation_keeps_its_own_matrix() {
    let skeleton = posed(turned_and_scaled(), Inherit::OnlyTranslation);
    let child = &skeleton.bones[2];
    assert_approx(child.world_x, 0.0);
    assert_approx(child.world_y, 2.0);
    assert_approx(child.a, 1.0);
    assert_approx(child.b, 0.0);
    assert_approx(child.c, 0.0);
    assert_approx(child.d, 1.0);
}

#[test]
fn no_rotation_keeps_parent_scale_only() {
    let skeleton = posed(turned_and_scaled(), Inherit::NoRotationOrReflection);
    let child = &skeleton.bones[2];
    assert_approx(child.world_y, 2.0);
    assert_approx(child.world_rotation_x(), 0.0);
    assert_approx(child.world_scale_x(), 2.0);
    assert_approx(child.world_scale_y(), 2.0);
}

#[test]
fn no_rotation_under_a_non_uniform_skeleton_scale() {
    let data = SkeletonData {
        bones: vec![
            BoneData::new("root", None),
            BoneData::new("parent", Some(0)),
            {
                let mut child = BoneData::new("child", Some(1));
                child.inherit = Inherit::NoRotationOrReflection;
                child
            },
        ],
        ..SkeletonData::default()
    };
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.scale_x = 2.0;
    skeleton.scale_y = 1.0;
    skeleton.update_world_transform();

    let child = &skeleton.bones[2];
    assert_approx(child.a, 2.0);
    assert_approx(child.b, 0.0);
    assert_approx(child.c, 0.0);
    assert_approx(child.d, 1.0);
}

#[test]
fn no_scale_keeps_parent_rotation_only() {
    for inherit in [Inherit::NoScale, Inherit::NoScaleOrReflection] {
        let skeleton = posed(turned_and_scaled(), inherit);
        let child = &skeleton.bones[2];
        assert_approx(child.world_y, 2.0);
        assert_approx(child.world_rotation_x(), 90.0);
        assert_approx(child.world_scale_x(), 1.0);
        assert_approx(child.world_scale_y(), 1.0);
    }
}

#[test]
fn reflection_is_inherited_only_by_no_scale() {
    let skeleton = posed(mirrored(), Inherit::NoScale);
    let reflected = skeleton.bones[2].world().determinant();
    assert!(reflected < 0.0, "determinant {reflected}");

    let skeleton = posed(mirrored(), Inherit::NoScaleOrReflection);
    let unreflected = skeleton.bones[2].world().determinant();
    assert!(unreflected > 0.0, "determinant {unreflected}");
    assert_approx(skeleton.bones[2].world_scale_x(), 1.0);
}

#[test]
fn shear_skews_the_y_axis() {
    let mut parent = BoneData::new("parent", Some(0));
    parent.shear_y = 30.0;
    let skeleton = posed(parent, Inherit::Normal);
    let bone = &skeleton.bones[1];
    assert_approx(bone.world_rotation_x(), 0.0);
    assert_approx(bone.world_rotation_y(), 120.0);
}

#[test]
fn skeleton_placement_transforms_root_bones() {
    let data = SkeletonData {
        bones: vec![BoneData::new("root", None), {
            let mut arm = BoneData::new("arm", Some(0));
            arm.x = 2.0;
            arm
        }],
        ..SkeletonData::default()
    };
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.x = 10.0;
    skeleton.y = 5.0;
    skeleton.scale_x = -1.0;
    skeleton.update_world_transform();

    let root = &skeleton.bones[0];
    assert_approx(root.world_x, 10.0);
    assert_approx(root.world_y, 5.0);
    assert_approx(root.a, -1.0);
    let arm = &skeleton.bones[1];
    assert_approx(arm.world_x, 8.0);
    assert_approx(arm.world_y, 5.0);
}

#[test]
fn world_and_local_points_round_trip() {
    let mut parent = turned_and_scaled();
    parent.x = 3.0;
    parent.y = 4.0;
    let skeleton = posed(parent, Inherit::Normal);
    let bone = &skeleton.bones[1];

    let world = bone.local_to_world(1.0, 0.0);
    assert_approx(world[0], 3.0);
    assert_approx(world[1], 6.0);
    let local = bone.world_to_local(world[0], world[1]);
    assert_approx(local[0], 1.0);
    assert_approx(local[1], 0.0);

    let child = &skeleton.bones[2];
    assert_approx(child.local_to_world_rotation(child.rotation), 90.0);
    assert_approx(child.world_to_local_rotation(90.0), 0.0);
}

#[test]
fn applied_pose_is_recovered_from_the_world_matrix() {
    let mut parent = turned_and_scaled();
    parent.x = 3.0;
    let mut skeleton = posed(parent, Inherit::Normal);

    skeleton.bones[2].rotate_world(45.0);
    skeleton.update_bone_applied(2);
    let child = &skeleton.bones[2];
    assert_approx(child.arotation, 45.0);
    assert_approx(child.ax, 1.0);
    assert_approx(child.ay, 0.0);
    assert_approx(child.ascale_x, 1.0);
    assert_approx(child.ascale_y, 1.0);
    assert_approx(child.ashear_y, 0.0);
    // The local pose is untouched.
    assert_eq!(child.rotation, 0.0);
}

#[test]
fn degrees_wrap_into_a_half_open_turn() {
    assert_approx(wrap_degrees(190.0), -170.0);
    assert_approx(wrap_degrees(-190.0), 170.0);
    assert_approx(wrap_degrees(540.0), 180.0);
    assert_approx(wrap_degrees(-180.0), 180.0);
    assert_approx(wrap_degrees(45.0), 45.0);
}
