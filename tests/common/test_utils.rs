use flow_melee::{
    Vector3,
    actor::{AnimState, Animator, ClipBinding, ClipRef},
    animation::{AnimationClip, Interpolation, Keyframes, LoopMode, Track},
    config::FadeSettings,
};

/// A clip moving joint 0 along X for `seconds`.
pub(crate) fn clip(name: &str, seconds: f32) -> AnimationClip {
    AnimationClip::new(
        name,
        vec![Track::new(
            0,
            vec![0.0, seconds],
            Keyframes::Translation(vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0)]),
            Interpolation::Linear,
        )],
    )
}

/// A single-key clip: a held pose with no length.
pub(crate) fn pose(name: &str) -> AnimationClip {
    AnimationClip::new(
        name,
        vec![Track::new(
            0,
            vec![0.0],
            Keyframes::Translation(vec![Vector3::new(0.0, -1.0, 0.0)]),
            Interpolation::Step,
        )],
    )
}

/// Binds clips by name, starting in IDLE.
pub(crate) fn bound(clips: Vec<AnimationClip>, bindings: &[(AnimState, &str, LoopMode)]) -> Animator {
    let bindings: Vec<_> = bindings
        .iter()
        .map(|(state, name, loop_mode)| {
            ClipBinding::new(*state, ClipRef::Name(name.to_string()), *loop_mode)
        })
        .collect();
    Animator::new(clips, &bindings, AnimState::Idle, FadeSettings::default())
}

/// One clip per `(state, seconds, loop)`, named after its state.
pub(crate) fn animator(states: &[(AnimState, f32, LoopMode)]) -> Animator {
    let clips = states
        .iter()
        .map(|(state, seconds, _)| clip(state.as_str(), *seconds))
        .collect();
    let bindings: Vec<_> = states
        .iter()
        .map(|(state, _, loop_mode)| (*state, state.as_str(), *loop_mode))
        .collect();
    bound(clips, &bindings)
}

pub(crate) fn hero() -> Animator {
    animator(&[
        (AnimState::Idle, 1.0, LoopMode::Repeat),
        (AnimState::Attack, 0.5, LoopMode::Once),
    ])
}

pub(crate) fn monster() -> Animator {
    animator(&[
        (AnimState::Idle, 1.0, LoopMode::Repeat),
        (AnimState::HitReaction, 0.3, LoopMode::Once),
        (AnimState::Finish, 0.4, LoopMode::Once),
    ])
}
