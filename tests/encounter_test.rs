use flow_melee::{
    actor::{AnimState, Animator},
    animation::LoopMode,
    combat::{Bout, CombatSettings},
};

use crate::common::test_utils::{bound, clip, hero, monster, pose};

mod common;

const DT: f32 = 1.0 / 60.0;

fn settings() -> CombatSettings {
    CombatSettings {
        max_hp: 50,
        damage: 25,
        hit_frame: 3,
    }
}

fn run(bout: &mut Bout<Animator>, frames: usize) {
    for _ in 0..frames {
        bout.advance(DT);
    }
}

/// Clicks and runs until the attack and the hit reaction are over. A FINISH
/// started by the blow is still playing afterwards.
fn strike(bout: &mut Bout<Animator>) {
    bout.click();
    run(bout, 40);
}

#[test]
fn a_strike_plays_the_hit_and_returns_to_idle() {
    let mut bout = Bout::new(hero(), vec![monster(), monster()], settings()).unwrap();

    bout.click();
    assert_eq!(bout.hero.current(), Some(AnimState::Attack));
    run(&mut bout, 3);
    assert_eq!(bout.monster().current(), Some(AnimState::HitReaction));
    assert_eq!(bout.encounter().hp(), 50);

    run(&mut bout, 60);
    assert_eq!(bout.encounter().hp(), 25);
    assert_eq!(bout.hero.current(), Some(AnimState::Idle));
    assert_eq!(bout.monster().current(), Some(AnimState::Idle));
    assert!(!bout.encounter().is_attacking());
}

#[test]
fn clicks_during_an_attack_are_ignored() {
    let mut bout = Bout::new(hero(), vec![monster()], settings()).unwrap();

    bout.click();
    run(&mut bout, 10);
    bout.click();
    bout.click();
    run(&mut bout, 80);

    assert_eq!(bout.encounter().hp(), 25);
}

#[test]
fn the_roster_cycles_through_every_monster() {
    let mut bout = Bout::new(hero(), vec![monster(), monster(), monster()], settings()).unwrap();

    for expected in [1, 2, 0] {
        strike(&mut bout);
        strike(&mut bout);
        assert!(bout.encounter().is_monster_dying());
        assert_eq!(bout.monster().current(), Some(AnimState::Finish));

        run(&mut bout, 60);
        assert_eq!(bout.encounter().current(), expected);
        assert_eq!(bout.encounter().hp(), 50);
        assert_eq!(bout.monster().current(), Some(AnimState::Idle));
    }
}

#[test]
fn monsters_without_clips_do_not_stall_the_roster() {
    let mut bout = Bout::new(hero(), vec![Animator::default(), monster()], settings()).unwrap();

    strike(&mut bout);
    assert_eq!(bout.encounter().hp(), 25);
    strike(&mut bout);
    run(&mut bout, 2);

    assert_eq!(bout.encounter().current(), 1);
    assert_eq!(bout.encounter().hp(), 50);
}

#[test]
fn the_next_monster_only_takes_new_hits() {
    let mut bout = Bout::new(hero(), vec![monster(), monster()], settings()).unwrap();

    strike(&mut bout);
    strike(&mut bout);
    run(&mut bout, 60);
    assert_eq!(bout.encounter().current(), 1);

    strike(&mut bout);
    assert_eq!(bout.encounter().hp(), 25);
    assert_eq!(bout.monsters[0].current(), Some(AnimState::Finish));
}

#[test]
fn a_single_key_finish_pose_still_brings_in_the_next_monster() {
    let fallen = bound(
        vec![clip("Idle", 1.0), clip("Hit", 0.3), pose("Death")],
        &[
            (AnimState::Idle, "Idle", LoopMode::Repeat),
            (AnimState::HitReaction, "Hit", LoopMode::Once),
            (AnimState::Finish, "Death", LoopMode::Once),
        ],
    );
    let mut bout = Bout::new(hero(), vec![fallen, monster()], settings()).unwrap();

    strike(&mut bout);
    strike(&mut bout);
    run(&mut bout, 2);

    assert_eq!(bout.encounter().current(), 1);
    assert_eq!(bout.encounter().hp(), 50);
    assert!(!bout.encounter().is_monster_dying());
}

#[test]
fn a_hero_without_an_idle_clip_keeps_attacking() {
    let hero = bound(
        vec![clip("Idle_Loop", 1.0), clip("Attack", 0.5)],
        &[
            (AnimState::Idle, "Idle", LoopMode::Repeat),
            (AnimState::Attack, "Attack", LoopMode::Once),
        ],
    );
    assert!(!hero.has_state(AnimState::Idle));
    let mut bout = Bout::new(hero, vec![monster(), monster()], settings()).unwrap();

    strike(&mut bout);
    assert_eq!(bout.encounter().hp(), 25);
    assert!(!bout.encounter().is_attacking());

    strike(&mut bout);
    assert_eq!(bout.encounter().hp(), 0);
    run(&mut bout, 60);
    assert_eq!(bout.encounter().current(), 1);
}

#[test]
fn a_monster_without_an_idle_clip_dies_again_on_the_next_round() {
    let stubborn = || {
        bound(
            vec![clip("Hit", 0.3), clip("Death", 0.4)],
            &[
                (AnimState::HitReaction, "Hit", LoopMode::Once),
                (AnimState::Finish, "Death", LoopMode::Once),
            ],
        )
    };
    let mut bout = Bout::new(hero(), vec![stubborn()], settings()).unwrap();

    for _ in 0..3 {
        strike(&mut bout);
        strike(&mut bout);
        run(&mut bout, 60);
        assert_eq!(bout.encounter().current(), 0);
        assert_eq!(bout.encounter().hp(), 50);
        assert!(!bout.encounter().is_monster_dying());
    }
}
