mod animation;
mod animation_state;
mod bone;
mod constraint_timeline;
mod curve;
mod event_queue;
mod ik;
mod path_constraint;
mod pose;
mod skeleton;
mod slot_timeline;
mod timeline;
mod transform_constraint;

pub use animation::*;
pub use animation_state::*;
pub use bone::*;
pub use constraint_timeline::*;
pub use curve::*;
pub use event_queue::*;
pub use ik::*;
pub use path_constraint::*;
pub use pose::*;
pub use skeleton::*;
pub use slot_timeline::*;
pub use timeline::*;
pub use transform_constraint::*;




#[cfg(test)]
mod animation_tests;


#[cfg(test)]
mod animation_state_mixing_tests;

#[cfg(test)]
mod bone_tests;


#[cfg(test)]
mod ik_tests;

#[cfg(test)]
mod transform_constraint_tests;

#[cfg(test)]
mod path_constraint_tests;

#[cfg(test)]
mod pose_tests;
