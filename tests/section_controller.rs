use std::time::{Duration, Instant};

use ghibli_showcase::config::{RevealConfig, TransitionConfig};
use ghibli_showcase::events::{SectionStatus, StepIntent};
use ghibli_showcase::tasks::sections::{ClipPolygon, SectionController, SectionEvent};

const TRANSITION: Duration = Duration::from_millis(1250);
const REVEAL: Duration = Duration::from_millis(1500);

fn controller(count: usize) -> SectionController {
    SectionController::new(count, TransitionConfig::default(), RevealConfig::default())
}

/// Controller that has finished its opening transition to section 0.
fn started(count: usize) -> (SectionController, Instant) {
    let mut sc = controller(count);
    let t0 = Instant::now();
    sc.start(t0);
    let settled = t0 + TRANSITION;
    assert!(matches!(
        sc.advance(settled),
        Some(SectionEvent::TransitionFinished { from: None, to: 0 })
    ));
    (sc, settled)
}

#[test]
fn startup_transitions_into_first_section() {
    let mut sc = controller(3);
    assert_eq!(sc.current_index(), None);
    let t0 = Instant::now();
    assert_eq!(
        sc.start(t0),
        Some(SectionEvent::TransitionStarted {
            from: None,
            to: 0,
            direction: 1
        })
    );
    assert_eq!(
        sc.status(),
        SectionStatus {
            index: Some(0),
            animating: true,
            sub_phase: 0
        }
    );
}

#[test]
fn transition_completes_exactly_at_duration() {
    let mut sc = controller(3);
    let t0 = Instant::now();
    sc.start(t0);
    assert_eq!(sc.advance(t0 + TRANSITION - Duration::from_millis(1)), None);
    assert!(sc.is_animating());
    assert!(sc.advance(t0 + TRANSITION).is_some());
    assert!(!sc.is_animating());
}

#[test]
fn intents_during_animation_are_dropped() {
    let (mut sc, t) = started(3);
    assert!(sc.on_intent(StepIntent::Backward, t).is_none());
    // sub-phase reveal starts, then everything is ignored until it ends
    assert_eq!(
        sc.on_intent(StepIntent::Forward, t),
        Some(SectionEvent::RevealStarted { expand: true })
    );
    let mid = t + REVEAL / 2;
    assert!(sc.on_intent(StepIntent::Forward, mid).is_none());
    assert!(sc.go_to(2, 1, mid).is_none());
    assert!(sc.navigate_to(2, mid).is_none());
    assert_eq!(sc.current_index(), Some(0));
    assert_eq!(sc.sub_phase(), 1);
}

#[test]
fn go_to_normalizes_negative_targets() {
    let (mut sc, t) = started(3);
    assert_eq!(
        sc.go_to(-1, -1, t),
        Some(SectionEvent::TransitionStarted {
            from: Some(0),
            to: 2,
            direction: -1
        })
    );
    assert_eq!(sc.current_index(), Some(2));
}

#[test]
fn go_to_current_section_is_noop() {
    let (mut sc, t) = started(3);
    assert!(sc.go_to(0, 1, t).is_none());
    assert!(sc.go_to(3, 1, t).is_none());
    assert!(!sc.is_animating());
}

#[test]
fn first_intent_without_current_section_goes_to_first() {
    let mut sc = controller(3);
    let t = Instant::now();
    assert_eq!(
        sc.on_intent(StepIntent::Backward, t),
        Some(SectionEvent::TransitionStarted {
            from: None,
            to: 0,
            direction: -1
        })
    );
}

#[test]
fn two_forward_intents_reveal_then_advance() {
    let (mut sc, t) = started(3);
    assert_eq!(
        sc.on_intent(StepIntent::Forward, t),
        Some(SectionEvent::RevealStarted { expand: true })
    );
    let t = t + REVEAL;
    assert_eq!(
        sc.advance(t),
        Some(SectionEvent::RevealFinished { expand: true })
    );
    assert_eq!(sc.layer(0).unwrap().overlay_clip, ClipPolygon::FULL);

    assert_eq!(
        sc.on_intent(StepIntent::Forward, t),
        Some(SectionEvent::TransitionStarted {
            from: Some(0),
            to: 1,
            direction: 1
        })
    );
    assert_eq!(sc.sub_phase(), 0);
}

#[test]
fn forward_then_backward_collapses_overlay() {
    let (mut sc, t) = started(3);
    sc.on_intent(StepIntent::Forward, t);
    let t = t + REVEAL;
    assert_eq!(
        sc.on_intent(StepIntent::Backward, t),
        Some(SectionEvent::RevealStarted { expand: false })
    );
    assert_eq!(sc.sub_phase(), 0);
    let t = t + REVEAL;
    sc.advance(t);
    assert_eq!(
        sc.layer(0).unwrap().overlay_clip,
        ClipPolygon::OVERLAY_COLLAPSED
    );
    // already collapsed on the first section: nothing further back
    assert!(sc.on_intent(StepIntent::Backward, t).is_none());
    assert_eq!(sc.current_index(), Some(0));
}

#[test]
fn backward_from_middle_and_forward_on_last() {
    let (mut sc, t) = started(3);
    sc.go_to(2, 1, t);
    let t = t + TRANSITION;
    assert!(sc.on_intent(StepIntent::Forward, t).is_none());
    assert_eq!(
        sc.on_intent(StepIntent::Backward, t),
        Some(SectionEvent::TransitionStarted {
            from: Some(2),
            to: 1,
            direction: -1
        })
    );
}

#[test]
fn outgoing_section_stays_visible_until_transition_ends() {
    let (mut sc, t) = started(3);
    sc.go_to(1, 1, t);
    let mid = t + TRANSITION / 2;

    let frames = sc.frame(mid);
    let order: Vec<usize> = frames.iter().map(|f| f.index).collect();
    assert_eq!(order, vec![0, 1], "incoming section draws on top");
    let incoming = frames[1];
    assert!(incoming.background_offset > 0.0 && incoming.background_offset < 15.0);
    assert!(incoming.clip.0[0][1] > 0.0 && incoming.clip.0[0][1] < 50.0);
    let outgoing = frames[0];
    assert!(outgoing.background_offset < 0.0 && outgoing.background_offset > -15.0);

    let end = t + TRANSITION;
    assert_eq!(
        sc.advance(end),
        Some(SectionEvent::TransitionFinished {
            from: Some(0),
            to: 1
        })
    );
    assert!(!sc.layer(0).unwrap().visible);
    let settled = sc.layer(1).unwrap();
    assert!(settled.visible);
    assert_eq!(settled.z_order, 1);
    assert_eq!(settled.clip, ClipPolygon::FULL);
    assert_eq!(settled.background_offset, 0.0);
    // outgoing parallax offset persists
    assert_eq!(sc.layer(0).unwrap().background_offset, -15.0);
}

#[test]
fn backward_transition_mirrors_parallax() {
    let (mut sc, t) = started(3);
    sc.go_to(2, 1, t);
    let t = t + TRANSITION;
    sc.go_to(1, -1, t);
    let frames = sc.frame(t);
    let incoming = frames.iter().find(|f| f.index == 1).unwrap();
    assert_eq!(incoming.background_offset, -15.0);
    assert_eq!(incoming.clip, ClipPolygon::SLIVER);
}

#[test]
fn navigate_uses_sign_of_move() {
    let (mut sc, t) = started(4);
    assert_eq!(
        sc.navigate_to(3, t),
        Some(SectionEvent::TransitionStarted {
            from: Some(0),
            to: 3,
            direction: 1
        })
    );
    let t = t + TRANSITION;
    assert!(sc.navigate_to(3, t).is_none());
    assert_eq!(
        sc.navigate_to(1, t),
        Some(SectionEvent::TransitionStarted {
            from: Some(3),
            to: 1,
            direction: -1
        })
    );
}

#[test]
fn single_section_never_transitions_after_start() {
    let (mut sc, t) = started(1);
    assert!(sc.go_to(1, 1, t).is_none());
    assert!(sc.go_to(-1, -1, t).is_none());
    assert_eq!(sc.current_index(), Some(0));
}
