//! Combat progression.
//!
//! [`Encounter`] holds the rules: clicks start attacks, a frame counter
//! decides when the monster flinches, finished attacks cost HP and a finished
//! FINISH clip brings in the next monster of the roster. It only returns
//! [`Command`]s. [`Bout`] applies those commands to a hero and a roster of
//! [`Performer`]s and feeds their animation events back.

use serde::{Deserialize, Serialize};

use crate::{
    actor::{ActorEvent, AnimState, Performer},
    error::ConfigError,
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatSettings {
    pub max_hp: i32,
    pub damage: i32,
    /// Frames after the click at which the monster plays its hit reaction.
    pub hit_frame: u32,
}

impl Default for CombatSettings {
    fn default() -> Self {
        Self {
            max_hp: 100,
            damage: 25,
            hit_frame: 20,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Hero(AnimState),
    Monster(AnimState),
    /// The roster moved on; the value is the new monster index.
    NextMonster(usize),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Encounter {
    roster_len: usize,
    current: usize,
    hp: i32,
    max_hp: i32,
    damage: i32,
    hit_frame: u32,
    /// `Some` while an attack is in flight.
    frames_since_attack: Option<u32>,
    hit_landed: bool,
    dying: bool,
}

impl Encounter {
    pub fn new(roster_len: usize, settings: CombatSettings) -> Result<Self, ConfigError> {
        if roster_len == 0 {
            return Err(ConfigError::EmptyRoster);
        }
        if settings.max_hp <= 0 {
            return Err(ConfigError::NonPositive {
                field: "combat.max_hp",
            });
        }
        Ok(Self {
            roster_len,
            current: 0,
            hp: settings.max_hp,
            max_hp: settings.max_hp,
            damage: settings.damage.max(0),
            hit_frame: settings.hit_frame,
            frames_since_attack: None,
            hit_landed: false,
            dying: false,
        })
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn hp(&self) -> i32 {
        self.hp
    }

    pub fn max_hp(&self) -> i32 {
        self.max_hp
    }

    pub fn is_attacking(&self) -> bool {
        self.frames_since_attack.is_some()
    }

    pub fn is_monster_dying(&self) -> bool {
        self.dying
    }

    /// A click starts an attack unless one is already in flight or the
    /// monster is dying.
    pub fn on_click(&mut self) -> Vec<Command> {
        if self.dying || self.is_attacking() {
            return Vec::new();
        }
        self.frames_since_attack = Some(0);
        self.hit_landed = false;
        vec![Command::Hero(AnimState::Attack)]
    }

    pub fn on_frame(&mut self) -> Vec<Command> {
        let Some(frames) = self.frames_since_attack.as_mut() else {
            return Vec::new();
        };
        *frames += 1;
        if self.hit_landed || self.dying || *frames < self.hit_frame {
            return Vec::new();
        }
        self.hit_landed = true;
        vec![Command::Monster(AnimState::HitReaction)]
    }

    pub fn on_hero_event(&mut self, event: ActorEvent) -> Vec<Command> {
        if event != ActorEvent::Finished(AnimState::Attack) {
            return Vec::new();
        }
        self.frames_since_attack = None;
        let mut commands = vec![Command::Hero(AnimState::Idle)];
        if self.dying {
            return commands;
        }
        self.hp = (self.hp - self.damage).max(0);
        log::info!(
            "Monster {} takes {} damage, {}/{} HP left",
            self.current,
            self.damage,
            self.hp,
            self.max_hp
        );
        if self.hp <= 0 {
            self.dying = true;
            commands.push(Command::Monster(AnimState::Finish));
        }
        commands
    }

    pub fn on_monster_event(&mut self, event: ActorEvent) -> Vec<Command> {
        match event {
            ActorEvent::Finished(AnimState::HitReaction) if !self.dying => {
                vec![Command::Monster(AnimState::Idle)]
            }
            ActorEvent::Finished(AnimState::Finish) if self.dying => {
                self.current = (self.current + 1) % self.roster_len;
                self.hp = self.max_hp;
                self.dying = false;
                log::info!("Monster defeated, monster {} steps in", self.current);
                vec![
                    Command::NextMonster(self.current),
                    Command::Monster(AnimState::Idle),
                ]
            }
            _ => Vec::new(),
        }
    }
}

/// A hero fighting a roster of monsters, one at a time.
///
/// A state that a performer has no clip for completes immediately, so a
/// model without a HIT_REACTION or FINISH clip cannot stall the roster.
pub struct Bout<P> {
    pub hero: P,
    pub monsters: Vec<P>,
    encounter: Encounter,
    hero_backlog: Vec<ActorEvent>,
    monster_backlog: Vec<ActorEvent>,
}

impl<P: Performer> Bout<P> {
    pub fn new(hero: P, monsters: Vec<P>, settings: CombatSettings) -> Result<Self, ConfigError> {
        let encounter = Encounter::new(monsters.len(), settings)?;
        Ok(Self {
            hero,
            monsters,
            encounter,
            hero_backlog: Vec::new(),
            monster_backlog: Vec::new(),
        })
    }

    pub fn encounter(&self) -> &Encounter {
        &self.encounter
    }

    pub fn monster(&self) -> &P {
        &self.monsters[self.encounter.current()]
    }

    pub fn click(&mut self) {
        let commands = self.encounter.on_click();
        self.apply(commands);
    }

    /// One display frame: counts the frame, advances the hero and the current
    /// monster by `dt` seconds and feeds their events to the encounter.
    pub fn advance(&mut self, dt: f32) {
        let commands = self.encounter.on_frame();
        self.apply(commands);

        let mut hero_events = std::mem::take(&mut self.hero_backlog);
        hero_events.extend(self.hero.update_animation(dt));
        let current = self.encounter.current();
        let mut monster_events = std::mem::take(&mut self.monster_backlog);
        monster_events.extend(self.monsters[current].update_animation(dt));

        for event in hero_events {
            let commands = self.encounter.on_hero_event(event);
            self.apply(commands);
        }
        for event in monster_events {
            let commands = self.encounter.on_monster_event(event);
            self.apply(commands);
        }
    }

    fn apply(&mut self, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::Hero(state) => {
                    if !self.hero.can_play(state) {
                        self.hero_backlog.push(ActorEvent::Finished(state));
                    }
                    self.hero.change_animation(state);
                }
                Command::Monster(state) => {
                    let monster = &mut self.monsters[self.encounter.current()];
                    if !monster.can_play(state) {
                        self.monster_backlog.push(ActorEvent::Finished(state));
                    }
                    monster.change_animation(state);
                }
                Command::NextMonster(index) => {
                    log::debug!("Switching to monster {index}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CombatSettings {
        CombatSettings {
            max_hp: 20,
            damage: 10,
            hit_frame: 3,
        }
    }

    fn attack(encounter: &mut Encounter) -> Vec<Command> {
        encounter.on_click();
        encounter.on_hero_event(ActorEvent::Finished(AnimState::Attack))
    }

    #[test]
    fn empty_roster_is_rejected() {
        assert!(matches!(
            Encounter::new(0, settings()),
            Err(ConfigError::EmptyRoster)
        ));
    }

    #[test]
    fn click_starts_an_attack_once() {
        let mut encounter = Encounter::new(2, settings()).unwrap();
        assert_eq!(encounter.on_click(), vec![Command::Hero(AnimState::Attack)]);
        assert!(encounter.on_click().is_empty());
        assert!(encounter.is_attacking());
    }

    #[test]
    fn hit_reaction_fires_once_at_the_hit_frame() {
        let mut encounter = Encounter::new(2, settings()).unwrap();
        assert!(encounter.on_frame().is_empty());
        encounter.on_click();
        let mut fired = Vec::new();
        for _ in 0..10 {
            fired.extend(encounter.on_frame());
        }
        assert_eq!(fired, vec![Command::Monster(AnimState::HitReaction)]);
    }

    #[test]
    fn finished_attack_costs_hp() {
        let mut encounter = Encounter::new(2, settings()).unwrap();
        assert_eq!(attack(&mut encounter), vec![Command::Hero(AnimState::Idle)]);
        assert_eq!(encounter.hp(), 10);
        assert!(!encounter.is_attacking());
    }

    #[test]
    fn other_hero_events_are_ignored() {
        let mut encounter = Encounter::new(2, settings()).unwrap();
        assert!(encounter.on_hero_event(ActorEvent::Looped(AnimState::Idle)).is_empty());
        assert!(encounter.on_hero_event(ActorEvent::Finished(AnimState::Walk)).is_empty());
        assert_eq!(encounter.hp(), 20);
    }

    #[test]
    fn hit_reaction_returns_the_monster_to_idle() {
        let mut encounter = Encounter::new(2, settings()).unwrap();
        assert_eq!(
            encounter.on_monster_event(ActorEvent::Finished(AnimState::HitReaction)),
            vec![Command::Monster(AnimState::Idle)]
        );
    }

    #[test]
    fn zero_hp_plays_finish_then_moves_on_modulo_roster() {
        let mut encounter = Encounter::new(2, settings()).unwrap();
        attack(&mut encounter);
        assert_eq!(
            attack(&mut encounter),
            vec![
                Command::Hero(AnimState::Idle),
                Command::Monster(AnimState::Finish)
            ]
        );
        assert_eq!(encounter.hp(), 0);
        assert!(encounter.is_monster_dying());
        assert!(encounter.on_click().is_empty());

        assert_eq!(
            encounter.on_monster_event(ActorEvent::Finished(AnimState::Finish)),
            vec![
                Command::NextMonster(1),
                Command::Monster(AnimState::Idle)
            ]
        );
        assert_eq!(encounter.hp(), 20);

        attack(&mut encounter);
        attack(&mut encounter);
        encounter.on_monster_event(ActorEvent::Finished(AnimState::Finish));
        assert_eq!(encounter.current(), 0);
    }

    #[test]
    fn hp_saturates_at_zero() {
        let mut encounter = Encounter::new(
            1,
            CombatSettings {
                max_hp: 5,
                damage: 50,
                hit_frame: 1,
            },
        )
        .unwrap();
        attack(&mut encounter);
        assert_eq!(encounter.hp(), 0);
    }

    #[test]
    fn finish_event_without_a_dying_monster_is_ignored() {
        let mut encounter = Encounter::new(3, settings()).unwrap();
        assert!(encounter
            .on_monster_event(ActorEvent::Finished(AnimState::Finish))
            .is_empty());
        assert_eq!(encounter.current(), 0);
    }
}
