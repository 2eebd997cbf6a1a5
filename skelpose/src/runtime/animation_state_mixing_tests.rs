use crate::{
    Animation, AnimationState, AnimationStateData, AttachmentData, AttachmentTimeline, BoneData,
    BoneTimeline1, DEFAULT_SKIN_NAME, MixBlend, RegionAttachmentData, RotateTimeline, Skeleton,
    SkeletonData, SkinData, SlotData, Timeline,
};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-3,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

const ROOT: usize = 0;
const ARM: usize = 1;

fn rotate(name: &str, bone: usize, keys: &[(f32, f32)]) -> Animation {
    let mut t = RotateTimeline::new(bone, keys.len(), 0);
    for (frame, &(time, degrees)) in keys.iter().enumerate() {
        t.set_frame(frame, time, degrees);
    }
    Animation::with_duration(name, vec![Timeline::Rotate(t)], 1.0)
}

fn translate_x(name: &str, bone: usize, x: f32) -> Animation {
    let mut t = BoneTimeline1::new(bone, 1, 0);
    t.set_frame(0, 0.0, x);
    Animation::with_duration(name, vec![Timeline::TranslateX(t)], 1.0)
}

fn show(name: &str, attachment: &str) -> Animation {
    let mut t = AttachmentTimeline::new(0, 1);
    t.set_frame(0, 0.0, Some(attachment));
    Animation::with_duration(name, vec![Timeline::Attachment(t)], 1.0)
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

fn skeleton_data() -> Arc<SkeletonData> {
    let mut body = SlotData::new("body", ROOT);
    body.attachment = Some("body".to_string());
    let mut skin = SkinData::new(DEFAULT_SKIN_NAME);
    skin.set_attachment(0, "body", region("body"));
    skin.set_attachment(0, "alt", region("alt"));

    let mut data = SkeletonData {
        bones: vec![BoneData::new("root", None), BoneData::new("arm", Some(ROOT))],
        slots: vec![body],
        ..SkeletonData::default()
    };
    data.skins.insert(DEFAULT_SKIN_NAME.to_string(), skin);
    for animation in [
        rotate("a", ARM, &[(0.0, 0.0)]),
        rotate("b", ARM, &[(0.0, 90.0)]),
        rotate("turn", ARM, &[(0.0, 270.0)]),
        rotate("ramp", ARM, &[(0.0, 0.0), (1.0, 100.0)]),
        rotate("spin-root", ROOT, &[(0.0, 45.0)]),
        rotate("nudge", ARM, &[(0.0, 10.0)]),
        translate_x("reach", ARM, 10.0),
        translate_x("reach-far", ARM, 20.0),
        show("show-alt", "alt"),
    ] {
        data.add_animation(animation);
    }
    Arc::new(data)
}

fn state_with_default_mix(mix: f32) -> (AnimationState, Skeleton) {
    let data = skeleton_data();
    let mut state_data = AnimationStateData::new(Arc::clone(&data));
    state_data.default_mix = mix;
    (AnimationState::new(state_data), Skeleton::new(data))
}

fn step(state: &mut AnimationState, skeleton: &mut Skeleton, delta: f32) {
    state.update(delta);
    state.apply(skeleton);
}

#[test]
fn crossfade_is_half_way_at_half_the_mix() {
    let (mut state, mut skeleton) = state_with_default_mix(0.0);
    state.data_mut().set_mix("a", "b", 0.5).unwrap();

    state.set_animation(0, "a", true).unwrap();
    step(&mut state, &mut skeleton, 0.0);
    assert_approx(skeleton.bones[ARM].rotation, 0.0);

    state.set_animation(0, "b", true).unwrap();
    step(&mut state, &mut skeleton, 0.25);
    assert_approx(skeleton.bones[ARM].rotation, 45.0);

    step(&mut state, &mut skeleton, 0.25);
    assert_approx(skeleton.bones[ARM].rotation, 90.0);
}

#[test]
fn higher_track_fades_in_over_the_lower_track() {
    let (mut state, mut skeleton) = state_with_default_mix(0.5);

    state.set_animation(0, "a", true).unwrap();
    state.set_empty_animation(1, 0.0);
    step(&mut state, &mut skeleton, 0.0);

    state.set_animation(1, "b", true).unwrap();
    step(&mut state, &mut skeleton, 0.25);
    assert_approx(skeleton.bones[ARM].rotation, 45.0);
}

#[test]
fn empty_animation_mixes_back_to_setup_then_clears_the_track() {
    let (mut state, mut skeleton) = state_with_default_mix(0.0);

    state.set_animation(0, "b", true).unwrap();
    step(&mut state, &mut skeleton, 0.0);
    assert_approx(skeleton.bones[ARM].rotation, 90.0);

    let empty = state.set_empty_animation(0, 0.5);
    step(&mut state, &mut skeleton, 0.25);
    assert_approx(skeleton.bones[ARM].rotation, 45.0);
    step(&mut state, &mut skeleton, 0.25);
    assert_approx(skeleton.bones[ARM].rotation, 0.0);

    step(&mut state, &mut skeleton, 0.25);
    assert_eq!(state.current(0), Some(empty));
    assert!(state.entry(empty).unwrap().mixing_from().is_none());
    step(&mut state, &mut skeleton, 0.25);
    assert!(state.current(0).is_none());
    assert_eq!(state.pool().live_count(), 0);
}

#[test]
fn unkeyed_property_fades_out_unless_holding_the_previous_entry() {
    for (hold_previous, expected) in [(false, 5.0), (true, 10.0)] {
        let (mut state, mut skeleton) = state_with_default_mix(0.5);
        state.set_animation(0, "reach", true).unwrap();
        step(&mut state, &mut skeleton, 0.0);
        assert_approx(skeleton.bones[ARM].x, 10.0);

        let next = state.set_animation(0, "spin-root", true).unwrap();
        state.entry_mut(next).unwrap().hold_previous = hold_previous;
        step(&mut state, &mut skeleton, 0.25);
        assert_approx(skeleton.bones[ARM].x, expected);
        assert_approx(skeleton.bones[ROOT].rotation, 22.5);
    }
}

#[test]
fn interrupted_mix_holds_until_the_newest_entry_takes_over() {
    let (mut state, mut skeleton) = state_with_default_mix(0.5);

    state.set_animation(0, "reach", true).unwrap();
    step(&mut state, &mut skeleton, 0.0);
    state.set_animation(0, "reach-far", true).unwrap();
    step(&mut state, &mut skeleton, 0.1);
    assert_approx(skeleton.bones[ARM].x, 12.0);

    // Interrupted at 20% of its mix: the new entry only mixes out that share.
    let spin = state.set_animation(0, "spin-root", true).unwrap();
    assert_approx(state.entry(spin).unwrap().interrupt_alpha(), 0.2);
    step(&mut state, &mut skeleton, 0.1);

    // "reach" is held, fading as "spin-root" mixes in; "reach-far" mixes out on top.
    assert_approx(skeleton.bones[ARM].x, 9.92);
}

#[test]
fn crossfade_takes_the_short_way_round_and_keeps_it() {
    let (mut state, mut skeleton) = state_with_default_mix(0.5);

    state.set_animation(0, "a", true).unwrap();
    step(&mut state, &mut skeleton, 0.0);
    state.set_animation(0, "turn", true).unwrap();

    step(&mut state, &mut skeleton, 0.25);
    assert_approx(skeleton.bones[ARM].rotation, -45.0);
    step(&mut state, &mut skeleton, 0.1);
    assert_approx(skeleton.bones[ARM].rotation, -63.0);
}

#[test]
fn shortest_rotation_interpolates_the_keyed_values() {
    let (mut state, mut skeleton) = state_with_default_mix(0.5);

    state.set_animation(0, "a", true).unwrap();
    step(&mut state, &mut skeleton, 0.0);
    let turn = state.set_animation(0, "turn", true).unwrap();
    state.entry_mut(turn).unwrap().shortest_rotation = true;

    // 0 toward 270 directly, where the remembered direction goes through -90.
    step(&mut state, &mut skeleton, 0.25);
    assert_approx(skeleton.bones[ARM].rotation, 135.0);
    step(&mut state, &mut skeleton, 0.1);
    assert_approx(skeleton.bones[ARM].rotation, 189.0);
}

#[test]
fn additive_track_layers_on_the_lower_track() {
    for (alpha, expected) in [(1.0, 100.0), (0.5, 95.0)] {
        let (mut state, mut skeleton) = state_with_default_mix(0.0);
        state.set_animation(0, "b", true).unwrap();
        let layer = state.set_animation(1, "nudge", true).unwrap();
        let entry = state.entry_mut(layer).unwrap();
        entry.mix_blend = MixBlend::Add;
        entry.alpha = alpha;

        step(&mut state, &mut skeleton, 0.1);
        assert_approx(skeleton.bones[ARM].rotation, expected);
        // Additive layers do not accumulate across frames.
        step(&mut state, &mut skeleton, 0.1);
        assert_approx(skeleton.bones[ARM].rotation, expected);
    }
}

#[test]
fn reverse_plays_from_the_end_without_events() {
    let (mut state, mut skeleton) = state_with_default_mix(0.0);
    let ramp = state.set_animation(0, "ramp", false).unwrap();
    state.entry_mut(ramp).unwrap().reverse = true;

    step(&mut state, &mut skeleton, 0.25);
    assert_approx(skeleton.bones[ARM].rotation, 75.0);
    step(&mut state, &mut skeleton, 0.5);
    assert_approx(skeleton.bones[ARM].rotation, 25.0);
}

#[test]
fn attachment_threshold_decides_who_shows_during_a_mix() {
    for (threshold, expected) in [(0.0, "body"), (1.0, "alt")] {
        let (mut state, mut skeleton) = state_with_default_mix(0.5);
        let shown = state.set_animation(0, "show-alt", true).unwrap();
        state.entry_mut(shown).unwrap().mix_attachment_threshold = threshold;
        step(&mut state, &mut skeleton, 0.0);
        assert_eq!(skeleton.slots[0].attachment_name(), Some("alt"));

        state.set_animation(0, "spin-root", true).unwrap();
        step(&mut state, &mut skeleton, 0.25);
        assert_eq!(skeleton.slots[0].attachment_name(), Some(expected));
    }
}

#[test]
fn attachments_not_keyed_this_frame_return_to_setup() {
    let (mut state, mut skeleton) = state_with_default_mix(0.0);
    state.set_animation(0, "show-alt", true).unwrap();
    step(&mut state, &mut skeleton, 0.1);
    assert_eq!(skeleton.slots[0].attachment_name(), Some("alt"));

    state.set_animation(0, "a", true).unwrap();
    step(&mut state, &mut skeleton, 0.1);
    step(&mut state, &mut skeleton, 0.1);
    assert_eq!(skeleton.slots[0].attachment_name(), Some("body"));
}

#[test]
fn same_inputs_give_the_same_pose() {
    let run = || {
        let (mut state, mut skeleton) = state_with_default_mix(0.3);
        state.set_animation(0, "ramp", true).unwrap();
        state.add_animation(0, "turn", true, 0.0).unwrap();
        state.set_animation(1, "reach", false).unwrap();
        let mut trace = Vec::new();
        for _ in 0..40 {
            step(&mut state, &mut skeleton, 1.0 / 30.0);
            skeleton.update_world_transform();
            let arm = &skeleton.bones[ARM];
            trace.push((arm.rotation.to_bits(), arm.x.to_bits(), arm.world_x.to_bits()));
        }
        trace
    };
    assert_eq!(run(), run());
}
