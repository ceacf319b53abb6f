//! Arena configuration.
//!
//! Everything is optional: `assets/arena.json` only needs the fields that
//! differ from the defaults. A missing file means "all defaults"; a file that
//! fails to parse or validate is reported and the defaults are used instead.

use serde::{Deserialize, Serialize};

use crate::{
    actor::{AnimState, ClipBinding, ClipRef},
    animation::LoopMode,
    combat::CombatSettings,
    data_structures::{instance::Instance, model::Shading},
    error::ConfigError,
    resources::load_string,
};

/// Looked up under `assets/`.
pub const CONFIG_FILE: &str = "arena.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub stage: StageSettings,
    pub hero: ActorSpec,
    pub monsters: Vec<ActorSpec>,
    pub combat: CombatSettings,
    pub fade: FadeSettings,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            stage: StageSettings::default(),
            hero: ActorSpec::hero(),
            monsters: vec![
                ActorSpec::monster("orc", "model/orc.glb"),
                ActorSpec::monster("skeleton", "model/skeleton.glb"),
                ActorSpec::monster("golem", "model/golem.glb"),
            ],
            combat: CombatSettings::default(),
            fade: FadeSettings::default(),
        }
    }
}

impl ArenaConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monsters.is_empty() {
            return Err(ConfigError::EmptyRoster);
        }
        if self.combat.max_hp <= 0 {
            return Err(ConfigError::NonPositive {
                field: "combat.max_hp",
            });
        }
        let camera = &self.stage.camera;
        if camera.fov_deg <= 0.0 {
            return Err(ConfigError::NonPositive {
                field: "stage.camera.fov_deg",
            });
        }
        if camera.near <= 0.0 || camera.far <= camera.near {
            return Err(ConfigError::NonPositive {
                field: "stage.camera.near",
            });
        }
        if let Some(actor) = std::iter::once(&self.hero)
            .chain(&self.monsters)
            .find(|a| a.model.trim().is_empty())
        {
            return Err(ConfigError::MissingModel {
                actor: actor.name.clone(),
            });
        }
        Ok(())
    }

    /// Reads `file` from the asset directory, falling back to the defaults.
    pub async fn load(file: &str) -> Self {
        let text = match load_string(file).await {
            Ok(text) => text,
            Err(e) => {
                log::info!("No arena config at `{file}` ({e}); using defaults");
                return Self::default();
            }
        };
        match Self::from_json(&text) {
            Ok(config) => {
                log::info!(
                    "Arena config loaded from `{file}`: {} monsters",
                    config.monsters.len()
                );
                config
            }
            Err(e) => {
                log::error!("Ignoring `{file}`: {e}");
                Self::default()
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSettings {
    /// Linear RGB clear colour.
    pub background: [f32; 3],
    pub camera: CameraSettings,
    pub light: LightSettings,
    pub ground: GroundSettings,
    pub colliders: Vec<ColliderSettings>,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            background: [1.0, 1.0, 1.0],
            camera: CameraSettings::default(),
            light: LightSettings::default(),
            ground: GroundSettings::default(),
            colliders: vec![
                ColliderSettings::new([-600.0, 50.0, 200.0], [100.0, 100.0, 100.0]),
                ColliderSettings::new([600.0, 50.0, 200.0], [100.0, 100.0, 100.0]),
                ColliderSettings::new([-450.0, 100.0, 600.0], [120.0, 200.0, 120.0]),
                ColliderSettings::new([450.0, 100.0, 600.0], [120.0, 200.0, 120.0]),
            ],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
    /// Radians per pixel of right-drag.
    pub rotate_speed: f32,
    /// Fraction of the distance per wheel line.
    pub zoom_speed: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_deg: 40.0,
            near: 0.1,
            far: 2000.0,
            position: [0.0, 500.0, -1000.0],
            target: [0.0, 0.0, 0.0],
            rotate_speed: 0.005,
            zoom_speed: 0.1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSettings {
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: [f32; 3],
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            intensity: 5.0,
            position: [0.0, 500.0, -1000.0],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundSettings {
    pub size: f32,
    pub segments: u32,
    pub scale: f32,
    pub color: [f32; 3],
}

impl Default for GroundSettings {
    fn default() -> Self {
        Self {
            size: 60.0,
            segments: 9,
            scale: 30.0,
            // 0xAAAAAA
            color: [0.667, 0.667, 0.667],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColliderSettings {
    pub position: [f32; 3],
    pub size: [f32; 3],
    pub color: [f32; 3],
}

impl ColliderSettings {
    pub fn new(position: [f32; 3], size: [f32; 3]) -> Self {
        Self {
            position,
            size,
            ..Default::default()
        }
    }
}

impl Default for ColliderSettings {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            size: [100.0, 100.0, 100.0],
            color: [0.55, 0.45, 0.35],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FadeSettings {
    /// Seconds the outgoing clip takes to fade out.
    pub fade_out: f32,
    /// Seconds the incoming clip takes to fade in.
    pub fade_in: f32,
}

impl Default for FadeSettings {
    fn default() -> Self {
        Self {
            fade_out: 0.5,
            fade_in: 0.1,
        }
    }
}

/// How to load, place and animate one actor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorSpec {
    pub name: String,
    /// Path under `assets/`.
    pub model: String,
    pub position: [f32; 3],
    /// XYZ euler angles in degrees.
    pub rotation_deg: [f32; 3],
    pub scale: f32,
    /// Replaces the model's own materials when set.
    pub shading: Option<Shading>,
    pub color: Option<[f32; 4]>,
    pub clips: Vec<ClipBinding>,
    pub initial: AnimState,
}

impl Default for ActorSpec {
    fn default() -> Self {
        Self {
            name: "actor".to_string(),
            model: String::new(),
            position: [0.0, 0.0, 0.0],
            rotation_deg: [0.0, 0.0, 0.0],
            scale: 1.0,
            shading: None,
            color: None,
            clips: Vec::new(),
            initial: AnimState::Idle,
        }
    }
}

impl ActorSpec {
    pub fn hero() -> Self {
        Self {
            name: "hero".to_string(),
            model: "model/hero.glb".to_string(),
            position: [0.0, 0.0, -450.0],
            rotation_deg: [180.0, 180.0, 180.0],
            shading: Some(Shading::Normal),
            clips: vec![
                ClipBinding::new(AnimState::Idle, ClipRef::Index(0), LoopMode::Repeat),
                ClipBinding::new(AnimState::Attack, ClipRef::Index(1), LoopMode::Once),
            ],
            ..Default::default()
        }
    }

    pub fn monster(name: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            model: model.to_string(),
            clips: vec![
                ClipBinding::new(AnimState::Idle, ClipRef::Index(0), LoopMode::Repeat),
                ClipBinding::new(AnimState::HitReaction, ClipRef::Index(1), LoopMode::Once),
                ClipBinding::new(AnimState::Finish, ClipRef::Index(2), LoopMode::Once),
            ],
            ..Default::default()
        }
    }

    pub fn placement(&self) -> Instance {
        Instance::placed(self.position, self.rotation_deg, self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_stage_layout() {
        let config = ArenaConfig::default();
        assert_eq!(config.stage.camera.fov_deg, 40.0);
        assert_eq!(config.stage.camera.position, [0.0, 500.0, -1000.0]);
        assert_eq!(config.stage.light.intensity, 5.0);
        assert_eq!(config.stage.ground.segments, 9);
        assert_eq!(config.hero.position[2], -450.0);
        assert_eq!(config.fade, FadeSettings { fade_out: 0.5, fade_in: 0.1 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config = ArenaConfig::from_json(r#"{ "combat": { "damage": 40 } }"#).unwrap();
        assert_eq!(config.combat.damage, 40);
        assert_eq!(config.combat.max_hp, CombatSettings::default().max_hp);
        assert_eq!(config.monsters.len(), 3);
        assert_eq!(config.hero, ActorSpec::hero());
    }

    #[test]
    fn clip_bindings_accept_names_and_indices() {
        let config = ArenaConfig::from_json(
            r#"{
                "monsters": [{
                    "name": "slime",
                    "model": "model/slime.gltf",
                    "clips": [
                        { "state": "IDLE", "clip": 0 },
                        { "state": "HIT_REACTION", "clip": "Armature|Hit", "loop_mode": "once" }
                    ]
                }]
            }"#,
        )
        .unwrap();
        let slime = &config.monsters[0];
        assert_eq!(slime.scale, 1.0);
        assert_eq!(
            slime.clips,
            vec![
                ClipBinding::new(AnimState::Idle, ClipRef::Index(0), LoopMode::Repeat),
                ClipBinding::new(
                    AnimState::HitReaction,
                    ClipRef::Name("Armature|Hit".into()),
                    LoopMode::Once
                ),
            ]
        );
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        assert!(matches!(
            ArenaConfig::from_json("{ monsters: "),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ArenaConfig::from_json(r#"{ "hero": { "initial": "DANCE" } }"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn empty_roster_fails_validation() {
        assert!(matches!(
            ArenaConfig::from_json(r#"{ "monsters": [] }"#),
            Err(ConfigError::EmptyRoster)
        ));
    }

    #[test]
    fn actors_need_a_model() {
        assert!(matches!(
            ArenaConfig::from_json(r#"{ "hero": { "name": "ghost" } }"#),
            Err(ConfigError::MissingModel { actor }) if actor == "ghost"
        ));
    }
}
