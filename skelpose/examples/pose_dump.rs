//! Poses a small two-bone arm and prints the resulting frame as JSON.
//!
//! Usage: `pose_dump [animation] [time] [mix]`, where `animation` is `wave` or `reach`. With a
//! `mix` the other animation plays first and crossfades into `animation` over that duration.

use skelpose::{
    Animation, AnimationState, AnimationStateData, BoneData, BoneTimeline2, IkConstraintData,
    IkConstraintTimeline, RotateTimeline, Skeleton, SkeletonData, Timeline, build_pose,
};
use std::process::ExitCode;
use std::sync::Arc;

const UPPER: usize = 1;
const TARGET: usize = 3;

fn arm() -> SkeletonData {
    let mut upper = BoneData::new("upper", Some(0));
    upper.length = 40.0;
    let mut lower = BoneData::new("lower", Some(UPPER));
    lower.x = 40.0;
    lower.length = 40.0;
    let mut target = BoneData::new("target", Some(0));
    target.x = 80.0;

    let mut reach = IkConstraintData::new("reach", vec![UPPER, 2], TARGET);
    reach.mix = 0.0;

    let mut data = SkeletonData {
        bones: vec![BoneData::new("root", None), upper, lower, target],
        ik_constraints: vec![reach],
        ..SkeletonData::default()
    };

    let mut wave = RotateTimeline::new(UPPER, 3, 0);
    wave.set_frame(0, 0.0, -30.0);
    wave.set_frame(1, 0.5, 30.0);
    wave.set_frame(2, 1.0, -30.0);
    data.add_animation(Animation::new("wave", vec![Timeline::Rotate(wave)]));

    let mut target_path = BoneTimeline2::new(TARGET, 2, 0);
    target_path.set_frame(0, 0.0, 0.0, 0.0);
    target_path.set_frame(1, 1.0, -30.0, 50.0);
    let mut mix = IkConstraintTimeline::new(0, 1, 0);
    mix.set_frame(0, 0.0, 1.0, 0.0, 1, false, false);
    data.add_animation(Animation::new(
        "reach",
        vec![Timeline::Translate(target_path), Timeline::IkConstraint(mix)],
    ));
    data
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let animation = args.first().map(String::as_str).unwrap_or("wave");
    let time: f32 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(0.25);
    let mix: Option<f32> = args.get(2).and_then(|s| s.parse().ok());

    let data = Arc::new(arm());
    let mut skeleton = Skeleton::new(Arc::clone(&data));
    let mut state = AnimationState::new(AnimationStateData::new(data));

    let queued = match mix {
        Some(duration) => {
            let other = if animation == "wave" { "reach" } else { "wave" };
            state.data_mut().default_mix = duration;
            state
                .set_animation(0, other, true)
                .and_then(|_| state.add_animation(0, animation, true, 0.0))
        }
        None => state.set_animation(0, animation, true),
    };
    if let Err(err) = queued {
        eprintln!("pose_dump: {err}");
        return ExitCode::FAILURE;
    }

    state.update(time.max(0.0));
    state.apply(&mut skeleton);
    skeleton.update_world_transform();

    match build_pose(&skeleton).to_json() {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("pose_dump: {err}");
            ExitCode::FAILURE
        }
    }
}
