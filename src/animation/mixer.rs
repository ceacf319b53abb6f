//! Advances actions and blends their sampled tracks into one pose.

use cgmath::{InnerSpace, Quaternion, Vector3, Zero};

use crate::{
    animation::{
        action::{ActionEvent, AnimationAction},
        clip::{AnimationClip, Sample},
        skeleton::Skeleton,
    },
    data_structures::instance::Instance,
};

/// Emitted by [`AnimationMixer::update`]; `action` is the clip index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MixerEvent {
    Finished { action: usize },
    Loop { action: usize },
}

/// Owns the clips of one actor and exactly one action per clip.
#[derive(Clone, Debug, Default)]
pub struct AnimationMixer {
    clips: Vec<AnimationClip>,
    actions: Vec<AnimationAction>,
}

impl AnimationMixer {
    pub fn new(clips: Vec<AnimationClip>) -> Self {
        let actions = clips
            .iter()
            .enumerate()
            .map(|(index, clip)| AnimationAction::new(index, clip.duration))
            .collect();
        Self { clips, actions }
    }

    pub fn clips(&self) -> &[AnimationClip] {
        &self.clips
    }

    /// The action driving `clip`; repeated calls return the same action.
    pub fn clip_action(&mut self, clip: usize) -> Option<&mut AnimationAction> {
        self.actions.get_mut(clip)
    }

    pub fn action(&self, clip: usize) -> Option<&AnimationAction> {
        self.actions.get(clip)
    }

    pub fn update(&mut self, dt: f32) -> Vec<MixerEvent> {
        self.actions
            .iter_mut()
            .enumerate()
            .filter_map(|(action, a)| {
                a.advance(dt).map(|event| match event {
                    ActionEvent::Finished => MixerEvent::Finished { action },
                    ActionEvent::Loop => MixerEvent::Loop { action },
                })
            })
            .collect()
    }

    /// Blends every running action into a local pose for `skeleton`.
    ///
    /// Channels whose accumulated weight stays below one are topped up with
    /// the rest pose; channels above one are normalised.
    pub fn sample_pose(&self, skeleton: &Skeleton) -> Vec<Instance> {
        let rest = &skeleton.rest;
        let count = rest.len();
        let mut translations = vec![(Vector3::zero(), 0.0f32); count];
        let mut rotations = vec![(Quaternion::zero(), 0.0f32); count];
        let mut scales = vec![(Vector3::zero(), 0.0f32); count];

        for action in &self.actions {
            let weight = action.effective_weight();
            if weight <= 0.0 {
                continue;
            }
            let Some(clip) = self.clips.get(action.clip()) else {
                continue;
            };
            for track in clip.tracks.iter().filter(|t| t.node < count) {
                let node = track.node;
                match track.sample(action.time) {
                    Some(Sample::Translation(v)) => {
                        translations[node].0 += v * weight;
                        translations[node].1 += weight;
                    }
                    Some(Sample::Scale(v)) => {
                        scales[node].0 += v * weight;
                        scales[node].1 += weight;
                    }
                    Some(Sample::Rotation(q)) => {
                        let (acc, total) = &mut rotations[node];
                        let q = if *total > 0.0 && acc.dot(q) < 0.0 { -q } else { q };
                        *acc += q * weight;
                        *total += weight;
                    }
                    None => {}
                }
            }
        }

        rest.iter()
            .enumerate()
            .map(|(node, rest)| Instance {
                position: blend_vector(translations[node], rest.position),
                rotation: blend_rotation(rotations[node], rest.rotation),
                scale: blend_vector(scales[node], rest.scale),
            })
            .collect()
    }
}

fn blend_vector((acc, total): (Vector3<f32>, f32), rest: Vector3<f32>) -> Vector3<f32> {
    if total <= 0.0 {
        rest
    } else if total >= 1.0 {
        acc / total
    } else {
        acc + rest * (1.0 - total)
    }
}

fn blend_rotation((acc, total): (Quaternion<f32>, f32), rest: Quaternion<f32>) -> Quaternion<f32> {
    if total <= 0.0 {
        return rest;
    }
    let blended = if total >= 1.0 {
        acc
    } else {
        let rest = if acc.dot(rest) < 0.0 { -rest } else { rest };
        acc + rest * (1.0 - total)
    };
    if blended.magnitude2() > f32::EPSILON {
        blended.normalize()
    } else {
        rest
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Vector3;

    use super::*;
    use crate::animation::{
        action::LoopMode,
        clip::{Interpolation, Keyframes, Track},
    };

    fn slide(name: &str, to: f32) -> AnimationClip {
        AnimationClip::new(
            name,
            vec![Track::new(
                0,
                vec![0.0, 1.0],
                Keyframes::Translation(vec![Vector3::new(to, 0.0, 0.0); 2]),
                Interpolation::Linear,
            )],
        )
    }

    fn single_node() -> Skeleton {
        Skeleton {
            names: vec!["root".into()],
            parents: vec![None],
            rest: vec![Instance::new()],
            ..Default::default()
        }
    }

    #[test]
    fn clip_action_is_stable_per_clip() {
        let mut mixer = AnimationMixer::new(vec![slide("a", 1.0), slide("b", 2.0)]);
        if let Some(action) = mixer.clip_action(1) {
            action.time = 0.3;
        }
        assert_eq!(mixer.action(1).map(|a| a.time), Some(0.3));
        assert!(mixer.clip_action(2).is_none());
    }

    #[test]
    fn update_reports_finished_and_loop_events() {
        let mut mixer = AnimationMixer::new(vec![slide("idle", 1.0), slide("attack", 2.0)]);
        if let Some(idle) = mixer.clip_action(0) {
            idle.play();
        }
        if let Some(attack) = mixer.clip_action(1) {
            attack.loop_mode = LoopMode::Once;
            attack.play();
        }
        let events = mixer.update(1.5);
        assert!(events.contains(&MixerEvent::Loop { action: 0 }));
        assert!(events.contains(&MixerEvent::Finished { action: 1 }));
    }

    #[test]
    fn no_running_action_yields_rest_pose() {
        let mixer = AnimationMixer::new(vec![slide("idle", 4.0)]);
        let skeleton = single_node();
        assert_eq!(mixer.sample_pose(&skeleton), skeleton.rest);
    }

    #[test]
    fn partial_weight_is_topped_up_with_rest() {
        let mut mixer = AnimationMixer::new(vec![slide("idle", 1.0)]);
        if let Some(idle) = mixer.clip_action(0) {
            idle.weight = 0.25;
            idle.play();
        }
        let mut skeleton = single_node();
        skeleton.rest[0].position.x = 2.0;
        let pose = mixer.sample_pose(&skeleton);
        // 0.25 * 1.0 from the clip plus 0.75 * 2.0 from the rest pose
        assert!((pose[0].position.x - 1.75).abs() < 1e-5);
    }

    #[test]
    fn overlapping_actions_are_normalised() {
        let mut mixer = AnimationMixer::new(vec![slide("a", 2.0), slide("b", 4.0)]);
        for clip in 0..2 {
            if let Some(action) = mixer.clip_action(clip) {
                action.play();
            }
        }
        let pose = mixer.sample_pose(&single_node());
        assert!((pose[0].position.x - 3.0).abs() < 1e-5);
    }

    #[test]
    fn tracks_for_unknown_nodes_are_ignored() {
        let clip = AnimationClip::new(
            "stray",
            vec![Track::new(
                7,
                vec![0.0],
                Keyframes::Scale(vec![Vector3::new(3.0, 3.0, 3.0)]),
                Interpolation::Step,
            )],
        );
        let mut mixer = AnimationMixer::new(vec![clip]);
        if let Some(action) = mixer.clip_action(0) {
            action.play();
        }
        let skeleton = single_node();
        assert_eq!(mixer.sample_pose(&skeleton), skeleton.rest);
    }
}
