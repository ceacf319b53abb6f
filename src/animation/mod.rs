//! Skeletal animation: clips, per-clip playback actions and a blending mixer.
//!
//! - `clip` holds keyframe tracks and their sampling
//! - `action` is the clock, loop mode and fade of one clip
//! - `mixer` advances actions, raises finished/loop events and blends poses
//! - `skeleton` resolves a pose into the joint palette uploaded to the GPU

pub mod action;
pub mod clip;
pub mod mixer;
pub mod skeleton;

pub use action::{AnimationAction, LoopMode};
pub use clip::{AnimationClip, Interpolation, Keyframes, Track};
pub use mixer::{AnimationMixer, MixerEvent};
pub use skeleton::{MAX_JOINTS, Skeleton};
