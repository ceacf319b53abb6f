//! The melee demo: a hero facing a roster of monsters on the stage.
//!
//! Left click attacks, right drag orbits the camera, the wheel zooms and
//! Escape quits.

use futures::FutureExt;
use instant::Duration;
use winit::{
    event::{DeviceEvent, WindowEvent},
    keyboard::{Key, NamedKey},
};

use crate::{
    actor::Actor,
    combat::Bout,
    config::{ArenaConfig, CONFIG_FILE},
    context::{Context, InitContext},
    flow::{self, FlowConsturctor, GraphicsFlow, Out},
    render::Render,
    scene::Stage,
};

/// Shared between the stage and the arena flows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaState {
    pub defeated: usize,
    pub current_monster: usize,
    pub monster_hp: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaEvent {
    MonsterDefeated { name: String, next: usize },
}

pub struct Arena {
    /// `None` when the roster could not be set up; the arena then stays empty.
    bout: Option<Bout<Actor>>,
}

impl Arena {
    /// Loads the hero and every monster concurrently. Models are kept for the
    /// lifetime of the arena.
    pub async fn load(ctx: &InitContext, config: ArenaConfig) -> Self {
        let hero = Actor::load(ctx, &config.hero, config.fade);
        let monsters = futures::future::join_all(
            config
                .monsters
                .iter()
                .map(|spec| Actor::load(ctx, spec, config.fade)),
        );
        let (hero, monsters) = futures::join!(hero, monsters);

        let loaded = monsters.iter().filter(|m| m.is_loaded()).count();
        log::info!(
            "Arena ready: hero {} ({}), {loaded}/{} monsters loaded",
            hero.name(),
            if hero.is_loaded() { "loaded" } else { "inert" },
            monsters.len()
        );

        let bout = Bout::new(hero, monsters, config.combat)
            .inspect_err(|e| log::error!("The arena stays empty: {e}"))
            .ok();
        Self { bout }
    }

    pub fn bout(&self) -> Option<&Bout<Actor>> {
        self.bout.as_ref()
    }
}

impl GraphicsFlow<ArenaState, ArenaEvent> for Arena {
    fn on_init(&mut self, _ctx: &mut Context, state: &mut ArenaState) -> Out<ArenaState, ArenaEvent> {
        if let Some(bout) = &self.bout {
            state.current_monster = bout.encounter().current();
            state.monster_hp = bout.encounter().hp();
        }
        Out::Empty
    }

    fn on_click(&mut self, _ctx: &Context, _state: &mut ArenaState) -> Out<ArenaState, ArenaEvent> {
        if let Some(bout) = &mut self.bout {
            bout.click();
        }
        Out::Empty
    }

    fn on_update(
        &mut self,
        ctx: &Context,
        state: &mut ArenaState,
        dt: Duration,
    ) -> Out<ArenaState, ArenaEvent> {
        let Some(bout) = &mut self.bout else {
            return Out::Empty;
        };
        let before = bout.encounter().current();
        let defeated = bout.monster().name().to_string();

        bout.advance(dt.as_secs_f32());
        bout.hero.write_to_buffers(&ctx.queue);
        bout.monster().write_to_buffers(&ctx.queue);

        let encounter = bout.encounter();
        state.monster_hp = encounter.hp();
        state.current_monster = encounter.current();
        if encounter.current() == before {
            return Out::Empty;
        }
        let next = encounter.current();
        let event: Box<dyn Future<Output = ArenaEvent>> = Box::new(async move {
            ArenaEvent::MonsterDefeated {
                name: defeated,
                next,
            }
        });
        Out::FutEvent(vec![event])
    }

    fn on_tick(&mut self, _ctx: &Context, _state: &mut ArenaState) -> Out<ArenaState, ArenaEvent> {
        Out::Empty
    }

    fn on_device_events(
        &mut self,
        _ctx: &Context,
        _state: &mut ArenaState,
        _event: &DeviceEvent,
    ) -> Out<ArenaState, ArenaEvent> {
        Out::Empty
    }

    fn on_window_events(
        &mut self,
        _ctx: &Context,
        _state: &mut ArenaState,
        event: &WindowEvent,
    ) -> Out<ArenaState, ArenaEvent> {
        match event {
            WindowEvent::KeyboardInput { event, .. }
                if event.state.is_pressed() && event.logical_key == Key::Named(NamedKey::Escape) =>
            {
                Out::Exit
            }
            _ => Out::Empty,
        }
    }

    fn on_custom_events(
        &mut self,
        _ctx: &Context,
        state: &mut ArenaState,
        event: ArenaEvent,
    ) -> Option<ArenaEvent> {
        match event {
            ArenaEvent::MonsterDefeated { name, next } => {
                state.defeated += 1;
                log::info!(
                    "{name} is down ({} defeated so far); monster {next} is next",
                    state.defeated
                );
                None
            }
        }
    }

    fn on_render(&self) -> Render<'_> {
        match &self.bout {
            Some(bout) => Render::Composed(vec![bout.hero.render(), bout.monster().render()]),
            None => Render::None,
        }
    }
}

/// Opens the arena: the stage and the fight, both configured from
/// `assets/arena.json`.
pub fn run_arena() -> anyhow::Result<()> {
    let config = ArenaConfig::load(CONFIG_FILE).boxed_local().shared();

    let stage_config = config.clone();
    let stage: FlowConsturctor<ArenaState, ArenaEvent> = Box::new(move |ctx| {
        Box::pin(async move {
            let config = stage_config.await;
            Box::new(Stage::new(&ctx, config.stage)) as Box<dyn GraphicsFlow<_, _>>
        })
    });
    let arena: FlowConsturctor<ArenaState, ArenaEvent> = Box::new(move |ctx| {
        Box::pin(async move {
            let config = config.await;
            Box::new(Arena::load(&ctx, config).await) as Box<dyn GraphicsFlow<_, _>>
        })
    });

    flow::run(vec![stage, arena])
}
