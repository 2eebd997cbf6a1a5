use crate::{
    Animation, BoneData, BoneTimeline2, MixBlend, MixDirection, Property, RotateTimeline,
    Skeleton, SkeletonData, Timeline, property_id,
};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-3,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn skeleton() -> Skeleton {
    let data = SkeletonData {
        bones: vec![BoneData::new("root", None), BoneData::new("arm", Some(0))],
        ..SkeletonData::default()
    };
    Skeleton::new(Arc::new(data))
}

fn swing() -> Animation {
    let mut rotate = RotateTimeline::new(1, 3, 0);
    rotate.set_frame(0, 0.0, 0.0);
    rotate.set_frame(1, 0.5, 60.0);
    rotate.set_frame(2, 1.0, 0.0);
    let mut translate = BoneTimeline2::new(1, 2, 0);
    translate.set_frame(0, 0.0, 0.0, 0.0);
    translate.set_frame(1, 0.75, 30.0, -15.0);
    Animation::new(
        "swing",
        vec![Timeline::Rotate(rotate), Timeline::Translate(translate)],
    )
}

fn pose_at(animation: &Animation, time: f32, looped: bool) -> [f32; 3] {
    let mut skeleton = skeleton();
    animation.apply(
        &mut skeleton,
        -1.0,
        time,
        looped,
        None,
        1.0,
        MixBlend::Setup,
        MixDirection::In,
    );
    let arm = &skeleton.bones[1];
    [arm.rotation, arm.x, arm.y]
}

#[test]
fn duration_is_the_last_key_over_all_timelines() {
    assert_approx(swing().duration, 1.0);
    let empty = Animation::new("empty", Vec::new());
    assert_eq!(empty.duration, 0.0);
}

#[test]
fn looped_pose_at_duration_equals_pose_at_zero() {
    let animation = swing();
    let start = pose_at(&animation, 0.0, true);
    let end = pose_at(&animation, animation.duration, true);
    for (a, b) in start.iter().zip(end) {
        assert_approx(*a, b);
    }
    let wrapped = pose_at(&animation, 1.25, true);
    let direct = pose_at(&animation, 0.25, true);
    for (a, b) in wrapped.iter().zip(direct) {
        assert_approx(*a, b);
    }
}

#[test]
fn unlooped_time_past_the_end_holds_the_last_keys() {
    let animation = swing();
    let held = pose_at(&animation, 3.0, false);
    assert_approx(held[0], 0.0);
    assert_approx(held[1], 30.0);
    assert_approx(held[2], -15.0);
}

#[test]
fn alpha_zero_and_one_are_the_crossfade_endpoints() {
    let animation = swing();
    let mut skeleton = skeleton();
    skeleton.bones[1].rotation = 12.0;

    animation.apply(
        &mut skeleton,
        -1.0,
        0.5,
        false,
        None,
        0.0,
        MixBlend::Replace,
        MixDirection::In,
    );
    assert_approx(skeleton.bones[1].rotation, 12.0);

    animation.apply(
        &mut skeleton,
        -1.0,
        0.5,
        false,
        None,
        1.0,
        MixBlend::Replace,
        MixDirection::In,
    );
    assert_approx(skeleton.bones[1].rotation, 60.0);
}

#[test]
fn has_timeline_checks_property_ids() {
    let animation = swing();
    assert!(animation.has_timeline(&[property_id(Property::Rotate, 1)]));
    assert!(animation.has_timeline(&[
        property_id(Property::ScaleX, 1),
        property_id(Property::Y, 1)
    ]));
    assert!(!animation.has_timeline(&[property_id(Property::Rotate, 0)]));
    assert_eq!(animation.timelines().len(), 2);
}
