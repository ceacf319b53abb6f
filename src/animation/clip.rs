//! Keyframe tracks and clips.
//!
//! A clip is a set of tracks, each animating one property (translation,
//! rotation or scale) of one skeleton node. Sampling clamps to the first and
//! last keyframe, so a clip can be sampled at any time without wrapping.

use cgmath::{InnerSpace, Quaternion, Vector3, VectorSpace};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
}

#[derive(Clone, Debug)]
pub enum Keyframes {
    Translation(Vec<Vector3<f32>>),
    Rotation(Vec<Quaternion<f32>>),
    Scale(Vec<Vector3<f32>>),
}

impl Keyframes {
    pub fn len(&self) -> usize {
        match self {
            Keyframes::Translation(v) | Keyframes::Scale(v) => v.len(),
            Keyframes::Rotation(q) => q.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One sampled value of a track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    Translation(Vector3<f32>),
    Rotation(Quaternion<f32>),
    Scale(Vector3<f32>),
}

#[derive(Clone, Debug)]
pub struct Track {
    /// Index of the animated node in the owning skeleton.
    pub node: usize,
    pub timestamps: Vec<f32>,
    pub keyframes: Keyframes,
    pub interpolation: Interpolation,
}

impl Track {
    pub fn new(
        node: usize,
        timestamps: Vec<f32>,
        keyframes: Keyframes,
        interpolation: Interpolation,
    ) -> Self {
        Self {
            node,
            timestamps,
            keyframes,
            interpolation,
        }
    }

    pub fn end_time(&self) -> f32 {
        self.timestamps.last().copied().unwrap_or(0.0)
    }

    fn keyframe_count(&self) -> usize {
        self.timestamps.len().min(self.keyframes.len())
    }

    /// Finds the two keyframes around `time` and the blend factor between them.
    fn locate(&self, time: f32) -> Option<(usize, usize, f32)> {
        let count = self.keyframe_count();
        if count == 0 {
            return None;
        }
        let times = &self.timestamps[..count];
        let last = count - 1;
        if time <= times[0] {
            return Some((0, 0, 0.0));
        }
        if time >= times[last] {
            return Some((last, last, 0.0));
        }
        let next = times.partition_point(|&t| t <= time);
        let prev = next - 1;
        match self.interpolation {
            Interpolation::Step => Some((prev, prev, 0.0)),
            Interpolation::Linear => {
                let span = times[next] - times[prev];
                let factor = if span > f32::EPSILON {
                    (time - times[prev]) / span
                } else {
                    0.0
                };
                Some((prev, next, factor))
            }
        }
    }

    pub fn sample(&self, time: f32) -> Option<Sample> {
        let (a, b, t) = self.locate(time)?;
        let sample = match &self.keyframes {
            Keyframes::Translation(v) => Sample::Translation(v[a].lerp(v[b], t)),
            Keyframes::Scale(v) => Sample::Scale(v[a].lerp(v[b], t)),
            Keyframes::Rotation(q) => {
                if a == b {
                    Sample::Rotation(q[a])
                } else {
                    let to = if q[a].dot(q[b]) < 0.0 { -q[b] } else { q[b] };
                    Sample::Rotation(q[a].slerp(to, t))
                }
            }
        };
        Some(sample)
    }
}

/// A named set of tracks; the duration is the latest keyframe of any track.
#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub tracks: Vec<Track>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        let duration = tracks.iter().map(Track::end_time).fold(0.0, f32::max);
        Self {
            name: name.into(),
            duration,
            tracks,
        }
    }
}
