//! Pose core for 2D skeletal animation.
//!
//! Blends keyframed animations over independent tracks ([`AnimationState`]), then solves the
//! bone hierarchy with IK, transform and path constraints ([`Skeleton::update_world_transform`]).
//! Loading skeleton files and rendering are left to other crates; [`build_pose`] produces the
//! snapshot a renderer consumes.

#![forbid(unsafe_code)]

mod error;
mod model;
mod runtime;

pub use error::*;
pub use model::*;
pub use runtime::*;
