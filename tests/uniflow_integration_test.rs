use flow_melee::{
    arena::{Arena, ArenaEvent, ArenaState},
    config::{ActorSpec, ArenaConfig, StageSettings},
    context::Context,
    flow::{FlowConsturctor, GraphicsFlow, Out},
    render::Render,
    scene::Stage,
};
use wgpu::Color;

/// Models that do not exist: both actors load inert.
fn missing_models() -> ArenaConfig {
    ArenaConfig {
        hero: ActorSpec {
            model: "missing/hero.glb".to_string(),
            ..ActorSpec::hero()
        },
        monsters: vec![ActorSpec::monster("ghost", "missing/ghost.glb")],
        ..ArenaConfig::default()
    }
}

/// Runs after the stage and the arena and checks what they left in the state.
#[derive(Default)]
struct Referee {
    frames: u32,
}

impl GraphicsFlow<ArenaState, ArenaEvent> for Referee {
    fn on_init(&mut self, ctx: &mut Context, state: &mut ArenaState) -> Out<ArenaState, ArenaEvent> {
        assert_eq!(ctx.clear_colour, Color::WHITE);
        assert_eq!(state.current_monster, 0);
        assert_eq!(state.monster_hp, 100);
        assert_eq!(state.defeated, 0);
        Out::Empty
    }

    fn on_click(&mut self, _: &Context, _: &mut ArenaState) -> Out<ArenaState, ArenaEvent> {
        Out::Empty
    }

    fn on_update(
        &mut self,
        _: &Context,
        state: &mut ArenaState,
        _: instant::Duration,
    ) -> Out<ArenaState, ArenaEvent> {
        self.frames += 1;
        // the arena rewrites these every frame
        assert_eq!(state.monster_hp, 100);
        assert_eq!(state.current_monster, 0);

        type Mutation = Box<dyn FnOnce(&mut ArenaState)>;
        match self.frames {
            3 => {
                let defeat: Box<dyn Future<Output = ArenaEvent>> = Box::new(async move {
                    ArenaEvent::MonsterDefeated {
                        name: "ghost".to_string(),
                        next: 0,
                    }
                });
                Out::FutEvent(vec![defeat])
            }
            5 => {
                let bonus: Mutation = Box::new(|state: &mut ArenaState| state.defeated += 10);
                let bonus: Box<dyn Future<Output = Mutation>> = Box::new(async move { bonus });
                Out::FutFn(vec![bonus])
            }
            x if x > 8 => {
                // one event consumed by the arena, one mutation applied
                assert_eq!(state.defeated, 11);
                Out::Exit
            }
            _ => Out::Empty,
        }
    }

    fn on_tick(&mut self, _: &Context, _: &mut ArenaState) -> Out<ArenaState, ArenaEvent> {
        Out::Empty
    }

    fn on_device_events(
        &mut self,
        _: &Context,
        _: &mut ArenaState,
        _: &flow_melee::DeviceEvent,
    ) -> Out<ArenaState, ArenaEvent> {
        Out::Empty
    }

    fn on_window_events(
        &mut self,
        _: &Context,
        _: &mut ArenaState,
        _: &flow_melee::WindowEvent,
    ) -> Out<ArenaState, ArenaEvent> {
        Out::Empty
    }

    fn on_custom_events(
        &mut self,
        _: &Context,
        _: &mut ArenaState,
        event: ArenaEvent,
    ) -> Option<ArenaEvent> {
        panic!("the arena should have consumed {event:?}");
    }

    fn on_render(&self) -> Render<'_> {
        Render::None
    }
}

#[test]
#[cfg(feature = "integration-tests")]
fn stage_and_arena_drive_the_shared_state() {
    let stage: FlowConsturctor<ArenaState, ArenaEvent> = Box::new(|ctx| {
        Box::pin(async move {
            Box::new(Stage::new(&ctx, StageSettings::default())) as Box<dyn GraphicsFlow<_, _>>
        })
    });
    let arena: FlowConsturctor<ArenaState, ArenaEvent> = Box::new(|ctx| {
        Box::pin(async move {
            let arena = Arena::load(&ctx, missing_models()).await;
            assert!(arena.bout().is_some_and(|bout| !bout.hero.is_loaded()));
            Box::new(arena) as Box<dyn GraphicsFlow<_, _>>
        })
    });
    let referee: FlowConsturctor<ArenaState, ArenaEvent> = Box::new(|_| {
        Box::pin(async move { Box::new(Referee::default()) as Box<dyn GraphicsFlow<_, _>> })
    });

    if let Err(e) = flow_melee::flow::run(vec![stage, arena, referee]) {
        panic!("{e}");
    }
}
