use cadence_runtime::{
    flow, Color, Computed, Config, Easing, Routine, RuntimeError, Scheduler, Signal, TaskState,
};

use cadence_tween_core::interp::text::cached_tween;
use cadence_tween_core::TextGranularity;

fn scheduler() -> Scheduler {
    Scheduler::new(Config::default())
}

#[test]
fn animation_lands_exactly_on_target() {
    let mut sched = scheduler();
    let rt = sched.runtime();
    let x = rt.signal(0.0f32);
    sched.spawn(x.animate_to(7.3, 1.3, Easing::CubicInOut).unwrap());
    for _ in 0..14 {
        sched.tick(0.1);
    }
    assert_eq!(x.get(), 7.3);
    assert!(!x.is_animating());
}

#[test]
fn linear_slide_samples_halfway_and_end() {
    let mut sched = scheduler();
    let rt = sched.runtime();
    let x = rt.signal(0.0f32);
    let task = sched.spawn(x.animate_to(100.0, 2.0, Easing::Linear).unwrap());

    sched.tick(1.0);
    assert_eq!(x.get(), 50.0);
    sched.tick(1.0);
    assert_eq!(x.get(), 100.0);
    assert_eq!(sched.state(task), Some(TaskState::Completed));
    sched.tick(1.0);
    assert_eq!(x.get(), 100.0);
}

#[test]
fn reads_are_stable_between_ticks() {
    let mut sched = scheduler();
    let rt = sched.runtime();
    let x = rt.signal(0.0f32);
    sched.spawn(x.animate_to(1.0, 1.0, Easing::QuadInOut).unwrap());
    sched.tick(0.3);
    let first = x.get();
    assert_eq!(x.get(), first);
    assert_eq!(x.peek(), first);
}

#[test]
fn replacing_an_animation_starts_from_resolved_value() {
    let mut sched = scheduler();
    let rt = sched.runtime();
    let x = rt.signal(0.0f32);
    sched.spawn(x.animate_to(100.0, 2.0, Easing::Linear).unwrap());
    sched.tick(1.0);
    assert_eq!(x.get(), 50.0);

    sched.spawn(x.animate_to(0.0, 1.0, Easing::Linear).unwrap());
    assert_eq!(x.get(), 50.0);
    sched.tick(0.5);
    assert_eq!(x.get(), 25.0);
    sched.tick(0.5);
    assert_eq!(x.get(), 0.0);
    // The replaced task finishing later must not touch the value.
    sched.tick(1.0);
    assert_eq!(x.get(), 0.0);
}

#[test]
fn late_replacement_continues_from_its_own_start_time() {
    let mut sched = scheduler();
    let rt = sched.runtime();
    let x = rt.signal(0.0f32);
    sched.spawn(x.animate_to(100.0, 4.0, Easing::Linear).unwrap());
    sched.spawn(flow::chain([
        flow::wait_for(1.0).unwrap().boxed(),
        x.animate_to(0.0, 1.0, Easing::Linear).unwrap().boxed(),
    ]));

    // The frame lands at 1.5 but the replacement starts at 1.0, from the
    // value the first tween had reached by then (25).
    sched.tick(1.5);
    assert_eq!(x.get(), 12.5);
    sched.tick(0.5);
    assert_eq!(x.get(), 0.0);
    sched.tick(3.0);
    assert_eq!(x.get(), 0.0);
}

#[test]
fn chained_segments_continue_from_previous_target() {
    let mut sched = scheduler();
    let rt = sched.runtime();
    let x = rt.signal(0.0f32);
    let tween = x
        .animate_to(10.0, 1.0, Easing::Linear)
        .unwrap()
        .to(20.0, 1.0)
        .unwrap();
    assert_eq!(tween.duration(), 2.0);
    let task = sched.spawn(tween);

    sched.tick(0.5);
    assert_eq!(x.get(), 5.0);
    sched.tick(1.0);
    assert_eq!(x.get(), 15.0);
    sched.tick(0.5);
    assert_eq!(x.get(), 20.0);
    assert_eq!(sched.state(task), Some(TaskState::Completed));
}

#[test]
fn zero_duration_animation_sets_immediately() {
    let mut sched = scheduler();
    let rt = sched.runtime();
    let x = rt.signal(1.0f32);
    let task = sched.spawn(x.animate_to(4.0, 0.0, Easing::Linear).unwrap());
    assert_eq!(x.get(), 4.0);
    assert_eq!(sched.state(task), Some(TaskState::Completed));
}

#[test]
fn negative_durations_are_rejected_when_built() {
    let rt = cadence_runtime::Runtime::new();
    let x = rt.signal(0.0f32);
    let invalid = |r: Result<(), RuntimeError>| {
        matches!(r, Err(RuntimeError::InvalidDuration { .. }))
    };
    assert!(invalid(x.animate_to(1.0, -0.1, Easing::Linear).map(|_| ())));
    assert!(invalid(
        x.animate_to(1.0, 1.0, Easing::Linear)
            .unwrap()
            .to(2.0, -1.0)
            .map(|_| ())
    ));
    assert!(invalid(flow::wait_for(-2.0).map(|_| ())));
    assert!(invalid(flow::sequence(-0.5, Vec::new()).map(|_| ())));
    assert!(invalid(flow::timeout(-1.0, flow::wait_for(1.0).unwrap()).map(|_| ())));
    assert!(invalid(flow::delay(-1.0, flow::wait_for(1.0).unwrap()).map(|_| ())));
}

#[test]
fn cancelling_a_tween_freezes_the_signal() {
    let mut sched = scheduler();
    let rt = sched.runtime();
    let x = rt.signal(0.0f32);
    let task = sched.spawn(x.animate_to(100.0, 2.0, Easing::Linear).unwrap());
    sched.tick(1.0);
    sched.cancel(task).unwrap();
    assert!(!x.is_animating());
    sched.tick(1.0);
    assert_eq!(x.get(), 50.0);
}

#[test]
fn disposed_signal_rejects_writes_and_fails_tweens() {
    let mut sched = scheduler();
    let rt = sched.runtime();
    let x = Signal::named(&rt, "scale", 1.0f32);
    x.dispose();
    assert!(matches!(
        x.set(2.0),
        Err(RuntimeError::UnresolvedWrite { ref label, .. }) if label == "scale"
    ));

    let task = sched.spawn(x.animate_to(3.0, 1.0, Easing::Linear).unwrap());
    assert_eq!(sched.state(task), Some(TaskState::Cancelled));
    let failures = sched.take_failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].to_string().contains("disposed signal scale"));
    assert_eq!(x.get(), 1.0);
}

#[test]
fn computed_follows_animation_and_caches_between_ticks() {
    let mut sched = scheduler();
    let rt = sched.runtime();
    let x = rt.signal(0.0f32);
    let doubled = x.map(|v| v * 2.0);
    assert_eq!(doubled.get(), Ok(0.0));

    sched.spawn(x.animate_to(10.0, 1.0, Easing::Linear).unwrap());
    sched.tick(0.5);
    assert_eq!(doubled.get(), Ok(10.0));
    let evals = doubled.evaluations();
    assert_eq!(doubled.get(), Ok(10.0));
    assert_eq!(doubled.evaluations(), evals);

    sched.tick(0.5);
    assert_eq!(doubled.get(), Ok(20.0));
    sched.tick(0.5);
    let settled = doubled.evaluations();
    assert_eq!(doubled.get(), Ok(20.0));
    sched.tick(0.5);
    assert_eq!(doubled.get(), Ok(20.0));
    assert_eq!(doubled.evaluations(), settled);
}

#[test]
fn diamond_dependent_is_invalidated_once_per_write() {
    let rt = cadence_runtime::Runtime::new();
    let a = rt.signal(1.0f32);
    let (a1, a2) = (a.clone(), a.clone());
    let b = rt.computed(move || a1.get() * 2.0);
    let c = rt.computed(move || a2.get() + 1.0);
    let (b1, c1) = (b.clone(), c.clone());
    let d: Computed<f32> = Computed::try_named(&rt, "sum", move || Ok(b1.get()? + c1.get()?));

    assert_eq!(d.get(), Ok(4.0));
    assert_eq!(d.evaluations(), 1);

    a.set(2.0).unwrap();
    assert_eq!(d.invalidations(), 1);
    assert!(d.is_dirty());
    assert_eq!(d.get(), Ok(7.0));
    assert_eq!(d.evaluations(), 2);

    a.set(3.0).unwrap();
    assert_eq!(d.invalidations(), 2);
    assert_eq!(d.get(), Ok(10.0));
    assert_eq!(d.get(), Ok(10.0));
    assert_eq!(d.evaluations(), 3);
    assert_eq!(b.evaluations(), 3);
    assert_eq!(c.evaluations(), 3);
}

#[test]
fn mutual_recursion_is_reported_as_cycle() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let rt = cadence_runtime::Runtime::new();
    let slot: Rc<RefCell<Option<Computed<f32>>>> = Rc::new(RefCell::new(None));
    let s = slot.clone();
    let a = Computed::try_named(&rt, "a", move || {
        let b = s.borrow().clone();
        match b {
            Some(b) => b.get(),
            None => Ok(0.0),
        }
    });
    let a1 = a.clone();
    let b = Computed::try_named(&rt, "b", move || a1.get().map(|v| v + 1.0));
    *slot.borrow_mut() = Some(b.clone());

    let err = a.get().unwrap_err();
    assert_eq!(
        err,
        RuntimeError::CyclicDependency {
            node: a.id(),
            label: "a".into()
        }
    );
    assert!(b.get().is_err());

    // The tracker is left clean: unrelated values still evaluate.
    let x = rt.signal(2.0f32);
    let y = x.map(|v| v + 1.0);
    assert_eq!(y.get(), Ok(3.0));
}

#[test]
fn colors_blend_in_oklab_and_text_retypes() {
    let mut sched = scheduler();
    let rt = sched.runtime();
    let fill = rt.signal(Color::BLACK);
    let caption = rt.signal(String::from("let x = 1"));
    sched.spawn(flow::all([
        fill.animate_to(Color::WHITE, 1.0, Easing::Linear).unwrap().boxed(),
        caption
            .animate_to("let y = 2".to_string(), 1.0, Easing::Linear)
            .unwrap()
            .with_interpolator(cached_tween(TextGranularity::Word))
            .boxed(),
    ]));

    sched.tick(0.5);
    let mid = fill.get();
    assert!(mid.r > 0.3 && mid.r < 0.45, "perceptual midpoint, got {}", mid.r);
    assert_eq!(caption.get(), "let  = ");

    sched.tick(0.5);
    assert_eq!(fill.get(), Color::WHITE);
    assert_eq!(caption.get(), "let y = 2");
}

#[test]
fn reset_restores_initial_value() {
    let rt = cadence_runtime::Runtime::new();
    let x = rt.signal([1.0f32, 2.0]);
    x.set([5.0, 5.0]).unwrap();
    x.reset();
    assert_eq!(x.get(), [1.0, 2.0]);
}
