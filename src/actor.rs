//! Actors: a loaded model, its state→clip table and the crossfade switch.
//!
//! [`Animator`] is the GPU-free part: it maps [`AnimState`]s to mixer
//! actions, crossfades between them and reports finished/looped states.
//! [`Actor`] adds the skinned model, its skeleton and a world placement.

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    animation::{AnimationClip, AnimationMixer, LoopMode, MixerEvent, Skeleton},
    config::{ActorSpec, FadeSettings},
    context::InitContext,
    data_structures::{instance::Instance, model::SkinnedModel},
    error::UnknownState,
    render::Render,
    resources::{self, ModelData},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnimState {
    Idle,
    Walk,
    Attack,
    HitReaction,
    Finish,
}

impl AnimState {
    pub const ALL: [AnimState; 5] = [
        AnimState::Idle,
        AnimState::Walk,
        AnimState::Attack,
        AnimState::HitReaction,
        AnimState::Finish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnimState::Idle => "IDLE",
            AnimState::Walk => "WALK",
            AnimState::Attack => "ATTACK",
            AnimState::HitReaction => "HIT_REACTION",
            AnimState::Finish => "FINISH",
        }
    }
}

impl fmt::Display for AnimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnimState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnimState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

/// Points at a clip either by position in the asset or by its name.
///
/// In JSON an integer is an index and a string is a name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClipRef {
    Index(usize),
    Name(String),
}

impl ClipRef {
    /// Names match exactly first, then case-insensitively, then against the
    /// part after the last `|` (exporters write `Armature|Idle`).
    pub fn resolve(&self, clips: &[AnimationClip]) -> Option<usize> {
        match self {
            ClipRef::Index(index) => (*index < clips.len()).then_some(*index),
            ClipRef::Name(name) => clips
                .iter()
                .position(|c| &c.name == name)
                .or_else(|| clips.iter().position(|c| c.name.eq_ignore_ascii_case(name)))
                .or_else(|| {
                    clips.iter().position(|c| {
                        c.name
                            .rsplit('|')
                            .next()
                            .is_some_and(|short| short.eq_ignore_ascii_case(name))
                    })
                }),
        }
    }
}

impl fmt::Display for ClipRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipRef::Index(index) => write!(f, "#{index}"),
            ClipRef::Name(name) => write!(f, "`{name}`"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipBinding {
    pub state: AnimState,
    pub clip: ClipRef,
    #[serde(default)]
    pub loop_mode: LoopMode,
}

impl ClipBinding {
    pub fn new(state: AnimState, clip: ClipRef, loop_mode: LoopMode) -> Self {
        Self {
            state,
            clip,
            loop_mode,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorEvent {
    Finished(AnimState),
    Looped(AnimState),
}

/// Anything the encounter can drive: switch states and advance clocks.
pub trait Performer {
    /// Crossfades to `state`. Returns `false` when nothing changed.
    fn change_animation(&mut self, state: AnimState) -> bool;

    fn can_play(&self, state: AnimState) -> bool;

    fn update_animation(&mut self, dt: f32) -> Vec<ActorEvent>;
}

#[derive(Clone, Debug, Default)]
pub struct Animator {
    mixer: AnimationMixer,
    table: HashMap<AnimState, usize>,
    current: Option<AnimState>,
    fades: FadeSettings,
}

impl Animator {
    pub fn new(
        clips: Vec<AnimationClip>,
        bindings: &[ClipBinding],
        initial: AnimState,
        fades: FadeSettings,
    ) -> Self {
        let mut mixer = AnimationMixer::new(clips);
        let mut table = HashMap::new();
        for binding in bindings {
            let Some(index) = binding.clip.resolve(mixer.clips()) else {
                log::warn!(
                    "No clip matches {} for state {}; the state is disabled",
                    binding.clip,
                    binding.state
                );
                continue;
            };
            if let Some(action) = mixer.clip_action(index) {
                action.loop_mode = binding.loop_mode;
            }
            table.insert(binding.state, index);
        }

        let mut animator = Self {
            mixer,
            table,
            current: None,
            fades,
        };
        match animator.table.get(&initial).copied() {
            Some(index) => {
                if let Some(action) = animator.mixer.clip_action(index) {
                    action.reset().play();
                }
                animator.current = Some(initial);
            }
            None if !animator.mixer.clips().is_empty() => {
                log::warn!("Initial state {initial} has no clip; starting in the rest pose")
            }
            None => {}
        }
        animator
    }

    pub fn current(&self) -> Option<AnimState> {
        self.current
    }

    pub fn mixer(&self) -> &AnimationMixer {
        &self.mixer
    }

    pub fn action_for(&self, state: AnimState) -> Option<usize> {
        self.table.get(&state).copied()
    }

    pub fn has_state(&self, state: AnimState) -> bool {
        self.table.contains_key(&state)
    }

    /// Switches to `state` unless it is unknown or already playing.
    ///
    /// The previous action fades out, the new one is rewound, fades in and
    /// plays. A current state whose one-shot already ended is replayed.
    pub fn change_animation(&mut self, state: AnimState) -> bool {
        let Some(next) = self.action_for(state) else {
            log::warn!("No clip is bound to state {state}; ignoring the switch");
            return false;
        };
        let previous = self.current.and_then(|s| self.action_for(s));
        self.current = Some(state);
        if previous == Some(next) {
            return match self.mixer.clip_action(next) {
                Some(action) if !action.is_running() => {
                    action.reset().play();
                    true
                }
                _ => false,
            };
        }
        if let Some(previous) = previous.and_then(|p| self.mixer.clip_action(p)) {
            previous.fade_out(self.fades.fade_out);
        }
        if let Some(action) = self.mixer.clip_action(next) {
            action.reset().fade_in(self.fades.fade_in).play();
        }
        true
    }

    pub fn update_animation(&mut self, dt: f32) -> Vec<ActorEvent> {
        self.mixer
            .update(dt)
            .into_iter()
            .filter_map(|event| match event {
                MixerEvent::Finished { action } => self.state_of(action).map(ActorEvent::Finished),
                MixerEvent::Loop { action } => self.state_of(action).map(ActorEvent::Looped),
            })
            .collect()
    }

    pub fn pose(&self, skeleton: &Skeleton) -> Vec<Instance> {
        self.mixer.sample_pose(skeleton)
    }

    /// Prefers the current state when several states share one clip.
    fn state_of(&self, action: usize) -> Option<AnimState> {
        self.current
            .filter(|s| self.action_for(*s) == Some(action))
            .or_else(|| {
                AnimState::ALL
                    .into_iter()
                    .find(|s| self.action_for(*s) == Some(action))
            })
    }
}

impl Performer for Animator {
    fn change_animation(&mut self, state: AnimState) -> bool {
        Animator::change_animation(self, state)
    }

    fn can_play(&self, state: AnimState) -> bool {
        self.has_state(state)
    }

    fn update_animation(&mut self, dt: f32) -> Vec<ActorEvent> {
        Animator::update_animation(self, dt)
    }
}

/// A hero or monster in the arena.
///
/// An actor whose model failed to load is inert: it has no clips, renders
/// nothing and ignores every state change.
pub struct Actor {
    name: String,
    animator: Animator,
    skeleton: Skeleton,
    model: Option<SkinnedModel>,
    pub placement: Instance,
}

impl Actor {
    pub fn inert(spec: &ActorSpec) -> Self {
        Self {
            name: spec.name.clone(),
            animator: Animator::default(),
            skeleton: Skeleton::default(),
            model: None,
            placement: spec.placement(),
        }
    }

    /// Wires CPU model data into an actor; `model` is its GPU upload, if any.
    pub fn from_data(
        spec: &ActorSpec,
        data: ModelData,
        model: Option<SkinnedModel>,
        fades: FadeSettings,
    ) -> Self {
        let ModelData { skeleton, clips, .. } = data;
        Self {
            name: spec.name.clone(),
            animator: Animator::new(clips, &spec.clips, spec.initial, fades),
            skeleton,
            model,
            placement: spec.placement(),
        }
    }

    pub async fn load(ctx: &InitContext, spec: &ActorSpec, fades: FadeSettings) -> Self {
        let data = match resources::load_model_data(&spec.model).await {
            Ok(data) => data,
            Err(e) => {
                log::error!("Could not load `{}` for {}: {:#}", spec.model, spec.name, e);
                return Self::inert(spec);
            }
        };
        log::info!(
            "Loaded {} from `{}`: {} primitives, {} joints, {} clips",
            spec.name,
            spec.model,
            data.primitives.len(),
            data.skeleton.joints.len(),
            data.clips.len()
        );
        let model = match SkinnedModel::upload(ctx, &data, spec.shading, spec.color) {
            Ok(model) => Some(model),
            Err(e) => {
                log::error!("Could not upload {} to the GPU: {:#}", spec.name, e);
                None
            }
        };
        Self::from_data(spec, data, model, fades)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn animator(&self) -> &Animator {
        &self.animator
    }

    /// Uploads the current pose and placement.
    pub fn write_to_buffers(&self, queue: &wgpu::Queue) {
        if let Some(model) = &self.model {
            let pose = self.animator.pose(&self.skeleton);
            let palette = self.skeleton.palette(&pose);
            model.write(queue, self.placement.to_matrix(), &palette);
        }
    }

    pub fn render(&self) -> Render<'_> {
        match &self.model {
            Some(model) => model.render(),
            None => Render::None,
        }
    }
}

impl Performer for Actor {
    fn change_animation(&mut self, state: AnimState) -> bool {
        self.animator.change_animation(state)
    }

    fn can_play(&self, state: AnimState) -> bool {
        self.animator.has_state(state)
    }

    fn update_animation(&mut self, dt: f32) -> Vec<ActorEvent> {
        self.animator.update_animation(dt)
    }
}
