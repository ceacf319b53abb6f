//! Playback state of one clip inside a mixer.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    /// Play to the end, stop and report `Finished`.
    Once,
    /// Wrap around at the end and report `Loop`.
    #[default]
    Repeat,
}

/// What happened to an action during one [`AnimationAction::advance`] step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionEvent {
    Finished,
    Loop,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Fade {
    from: f32,
    to: f32,
    elapsed: f32,
    duration: f32,
    stop_when_done: bool,
}

/// A clip's local clock, loop behaviour and blend weight.
///
/// The weight contributed to the pose is `weight * fade`, where the fade
/// factor is driven by [`fade_in`](Self::fade_in) and [`fade_out`](Self::fade_out).
#[derive(Clone, Debug)]
pub struct AnimationAction {
    clip: usize,
    duration: f32,
    pub time: f32,
    pub time_scale: f32,
    pub weight: f32,
    pub loop_mode: LoopMode,
    running: bool,
    finished: bool,
    fade: Option<Fade>,
    fade_factor: f32,
}

impl AnimationAction {
    pub fn new(clip: usize, duration: f32) -> Self {
        Self {
            clip,
            duration,
            time: 0.0,
            time_scale: 1.0,
            weight: 1.0,
            loop_mode: LoopMode::default(),
            running: false,
            finished: false,
            fade: None,
            fade_factor: 1.0,
        }
    }

    pub fn clip(&self) -> usize {
        self.clip
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Weight this action currently contributes to the blended pose.
    pub fn effective_weight(&self) -> f32 {
        if self.running {
            (self.weight * self.fade_factor).max(0.0)
        } else {
            0.0
        }
    }

    pub fn play(&mut self) -> &mut Self {
        self.running = true;
        self
    }

    pub fn stop(&mut self) -> &mut Self {
        self.running = false;
        self.fade = None;
        self
    }

    /// Rewinds to the start and cancels any fade in progress.
    pub fn reset(&mut self) -> &mut Self {
        self.time = 0.0;
        self.finished = false;
        self.fade = None;
        self.fade_factor = 1.0;
        self
    }

    pub fn fade_in(&mut self, duration: f32) -> &mut Self {
        self.start_fade(0.0, 1.0, duration, false)
    }

    /// Fades to zero from the current factor, then stops.
    pub fn fade_out(&mut self, duration: f32) -> &mut Self {
        self.start_fade(self.fade_factor, 0.0, duration, true)
    }

    fn start_fade(&mut self, from: f32, to: f32, duration: f32, stop_when_done: bool) -> &mut Self {
        if duration <= 0.0 {
            self.fade = None;
            self.fade_factor = to;
            if stop_when_done {
                self.running = false;
            }
        } else {
            self.fade_factor = from;
            self.fade = Some(Fade {
                from,
                to,
                elapsed: 0.0,
                duration,
                stop_when_done,
            });
        }
        self
    }

    fn advance_fade(&mut self, dt: f32) {
        let Some(fade) = self.fade.as_mut() else {
            return;
        };
        fade.elapsed += dt;
        let progress = (fade.elapsed / fade.duration).clamp(0.0, 1.0);
        self.fade_factor = fade.from + (fade.to - fade.from) * progress;
        if progress >= 1.0 {
            let stop = fade.stop_when_done;
            self.fade = None;
            if stop {
                self.running = false;
            }
        }
    }

    /// Moves the clock by `dt` seconds (scaled by `time_scale`).
    pub fn advance(&mut self, dt: f32) -> Option<ActionEvent> {
        if !self.running {
            return None;
        }
        self.advance_fade(dt);
        if !self.running {
            return None;
        }
        // single-key and trackless clips: a one-shot ends on its first step
        if self.duration <= 0.0 {
            return match self.loop_mode {
                LoopMode::Once => {
                    self.time = 0.0;
                    self.running = false;
                    self.finished = true;
                    Some(ActionEvent::Finished)
                }
                LoopMode::Repeat => None,
            };
        }
        self.time += dt * self.time_scale;
        match self.loop_mode {
            LoopMode::Once => {
                if self.time >= self.duration || self.time < 0.0 {
                    self.time = self.time.clamp(0.0, self.duration);
                    self.running = false;
                    self.finished = true;
                    Some(ActionEvent::Finished)
                } else {
                    None
                }
            }
            LoopMode::Repeat => {
                if self.time >= self.duration || self.time < 0.0 {
                    self.time = self.time.rem_euclid(self.duration);
                    Some(ActionEvent::Loop)
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn once(duration: f32) -> AnimationAction {
        let mut action = AnimationAction::new(0, duration);
        action.loop_mode = LoopMode::Once;
        action
    }

    #[test]
    fn idle_action_does_not_advance() {
        let mut action = once(1.0);
        assert_eq!(action.advance(0.5), None);
        assert_eq!(action.time, 0.0);
        assert_eq!(action.effective_weight(), 0.0);
    }

    #[test]
    fn once_finishes_exactly_once_and_clamps() {
        let mut action = once(1.0);
        action.play();
        assert_eq!(action.advance(0.6), None);
        assert_eq!(action.advance(0.6), Some(ActionEvent::Finished));
        assert_eq!(action.time, 1.0);
        assert!(action.is_finished());
        assert!(!action.is_running());
        assert_eq!(action.advance(0.6), None);
    }

    #[test]
    fn zero_length_once_finishes_on_the_first_step() {
        let mut action = once(0.0);
        action.play();
        assert_eq!(action.advance(1.0 / 60.0), Some(ActionEvent::Finished));
        assert_eq!(action.time, 0.0);
        assert!(action.is_finished());
        assert_eq!(action.advance(1.0 / 60.0), None);

        let mut looping = AnimationAction::new(0, 0.0);
        looping.play();
        assert_eq!(looping.advance(1.0), None);
        assert!(looping.is_running());
    }

    #[test]
    fn repeat_wraps_and_reports_loops() {
        let mut action = AnimationAction::new(0, 1.0);
        action.play();
        assert_eq!(action.advance(1.25), Some(ActionEvent::Loop));
        assert!((action.time - 0.25).abs() < 1e-6);
        assert!(action.is_running());
    }

    #[test]
    fn reset_rewinds_a_finished_action() {
        let mut action = once(0.5);
        action.play();
        action.advance(1.0);
        action.reset().play();
        assert_eq!(action.time, 0.0);
        assert!(!action.is_finished());
        assert!(action.is_running());
    }

    #[test]
    fn fade_in_ramps_weight_up() {
        let mut action = AnimationAction::new(0, 10.0);
        action.fade_in(0.1).play();
        assert_eq!(action.effective_weight(), 0.0);
        action.advance(0.05);
        assert!((action.effective_weight() - 0.5).abs() < 1e-5);
        action.advance(0.05);
        assert!((action.effective_weight() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn fade_out_stops_the_action() {
        let mut action = AnimationAction::new(0, 10.0);
        action.play();
        action.fade_out(0.5);
        action.advance(0.25);
        assert!((action.effective_weight() - 0.5).abs() < 1e-5);
        action.advance(0.25);
        assert!(!action.is_running());
        assert_eq!(action.effective_weight(), 0.0);
    }

    #[test]
    fn time_scale_speeds_up_the_clock() {
        let mut action = AnimationAction::new(0, 10.0);
        action.time_scale = 2.0;
        action.play();
        action.advance(1.0);
        assert_eq!(action.time, 2.0);
    }
}
