use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cadence_runtime::flow::{self, Repeat};
use cadence_runtime::{
    from_fn, Config, Easing, Routine, Scheduler, Step, TaskId, TaskState, Value,
};

fn scheduler() -> Scheduler {
    Scheduler::new(Config::default())
}

fn wait(seconds: f64) -> Box<dyn Routine> {
    flow::wait_for(seconds).unwrap().boxed()
}

#[test]
fn all_finishes_with_its_longest_child() {
    let mut sched = scheduler();
    let task = sched.spawn(flow::all([wait(1.0), wait(2.0)]));
    for _ in 0..7 {
        sched.tick(0.25);
    }
    assert!(sched.state(task).is_some_and(|s| s.is_suspended()));
    sched.tick(0.25);
    assert_eq!(sched.state(task), Some(TaskState::Completed));
    assert_eq!(sched.outcome(task).map(|o| o.finished_at), Some(2.0));
}

#[test]
fn completion_time_does_not_drift_with_uneven_ticks() {
    let mut sched = scheduler();
    let all = sched.spawn(flow::all([wait(1.0), wait(2.0)]));
    let chain = sched.spawn(flow::chain([wait(1.0), wait(1.0)]));
    while sched.tick(0.3) {}
    assert!(sched.now() < 2.0 + 0.3 + 1e-9);
    assert_eq!(sched.outcome(all).map(|o| o.finished_at), Some(2.0));
    assert_eq!(sched.outcome(chain).map(|o| o.finished_at), Some(2.0));
}

#[test]
fn sequence_with_gap_completes_after_exact_total() {
    let mut sched = scheduler();
    let task = sched.spawn(flow::sequence(0.5, [wait(1.0), wait(1.0)]).unwrap());
    for _ in 0..9 {
        sched.tick(0.25);
    }
    assert_ne!(sched.state(task), Some(TaskState::Completed));
    sched.tick(0.25);
    assert_eq!(sched.now(), 2.5);
    assert_eq!(sched.state(task), Some(TaskState::Completed));
    assert_eq!(sched.outcome(task).map(|o| o.finished_at), Some(2.5));
}

#[test]
fn sequence_returns_last_result() {
    let mut sched = scheduler();
    let task = sched.spawn(flow::chain([
        from_fn(|_cx| Ok(Step::Complete(Some(Value::f(1.0))))).boxed(),
        from_fn(|_cx| Ok(Step::Complete(Some(Value::f(2.0))))).boxed(),
    ]));
    sched.tick(0.0);
    assert_eq!(sched.take_result(task), Some(Value::f(2.0)));
}

#[test]
fn loop_runs_factory_with_each_index() {
    let mut sched = scheduler();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    let task = sched.spawn(flow::repeat(3usize, move |i| {
        s.borrow_mut().push(i);
        flow::wait_for(0.1).unwrap()
    }));
    while sched.tick(0.05) {}
    assert_eq!(*seen.borrow(), vec![0, 1, 2]);
    assert_eq!(sched.state(task), Some(TaskState::Completed));
}

#[test]
fn loop_with_zero_count_never_calls_factory() {
    let mut sched = scheduler();
    let calls = Rc::new(Cell::new(0));
    let c = calls.clone();
    let task = sched.spawn(flow::repeat(0usize, move |_| {
        c.set(c.get() + 1);
        flow::wait_for(1.0).unwrap()
    }));
    assert_eq!(calls.get(), 0);
    assert_eq!(sched.state(task), Some(TaskState::Completed));
}

#[test]
fn loop_predicate_is_checked_before_each_iteration() {
    let mut sched = scheduler();
    let rt = sched.runtime();
    let x = rt.signal(0.0f32);
    let x2 = x.clone();
    let target = x.clone();
    sched.spawn(flow::repeat(
        Repeat::predicate(move |_| x2.peek() < 3.0),
        move |_| {
            let next = target.peek() + 1.0;
            target.animate_to(next, 0.5, Easing::Linear).unwrap()
        },
    ));
    while sched.tick(0.25) {}
    assert_eq!(x.get(), 3.0);
    assert_eq!(sched.now(), 1.5);
}

#[test]
fn forever_loop_is_stopped_by_cancel() {
    let mut sched = scheduler();
    let count = Rc::new(Cell::new(0usize));
    let c = count.clone();
    let task = sched.spawn(flow::repeat(Repeat::Forever, move |_| {
        c.set(c.get() + 1);
        flow::wait_for(1.0).unwrap()
    }));
    sched.tick(2.5);
    sched.tick(1.0);
    let before = count.get();
    assert!(before >= 3);
    sched.cancel(task).unwrap();
    sched.tick(5.0);
    assert_eq!(count.get(), before);
    assert!(!sched.has_pending());
}

#[test]
fn unclaimed_outcomes_are_bounded() {
    let mut sched = Scheduler::new(Config {
        max_outcomes_retained: 16,
        ..Config::default()
    });
    let first: Rc<Cell<Option<TaskId>>> = Rc::new(Cell::new(None));
    let slot = first.clone();
    sched.spawn(flow::repeat(Repeat::Forever, move |_| {
        let slot = slot.clone();
        flow::chain([
            flow::call(move |cx| {
                let id = cx.spawn(flow::wait_for(0.0)?);
                if slot.get().is_none() {
                    slot.set(Some(id));
                }
                Ok(())
            })
            .boxed(),
            wait(0.01),
        ])
    }));
    for _ in 0..500 {
        sched.tick(0.01);
    }
    let first = first.get().unwrap();
    assert_eq!(sched.state(first), None);
    assert!(sched.retained_outcomes() <= 16);
    assert!(sched.has_pending());
}

#[test]
fn event_dispatched_by_a_task_resumes_waiter_in_same_tick() {
    let mut sched = scheduler();
    let waiter = sched.spawn(flow::wait_until("go"));
    sched.spawn(flow::chain([
        wait(1.0),
        flow::call(|cx| {
            cx.dispatch("go", Some(Value::text("now")));
            Ok(())
        })
        .boxed(),
    ]));
    sched.tick(0.5);
    assert_eq!(
        sched.state(waiter),
        Some(TaskState::SuspendedUntilEvent("go".into()))
    );
    sched.tick(0.5);
    assert_eq!(sched.state(waiter), Some(TaskState::Completed));
    assert_eq!(sched.take_result(waiter), Some(Value::text("now")));
}

#[test]
fn host_dispatch_wakes_waiters_and_drops_unheard_events() {
    let mut sched = scheduler();
    assert_eq!(sched.dispatch("go", None), 0);
    let waiter = sched.spawn(flow::wait_until("go"));
    sched.tick(1.0);
    assert!(sched.state(waiter).is_some_and(|s| s.is_suspended()));

    assert_eq!(sched.dispatch("go", Some(Value::Bool(true))), 1);
    assert_eq!(sched.state(waiter), Some(TaskState::Completed));
    assert_eq!(sched.take_result(waiter), Some(Value::Bool(true)));
}

#[test]
fn wait_until_absolute_time() {
    let mut sched = scheduler();
    sched.tick(1.0);
    let late = sched.spawn(flow::wait_until(0.5));
    assert_eq!(sched.state(late), Some(TaskState::Completed));
    let task = sched.spawn(flow::wait_until(3.0));
    sched.tick(1.0);
    assert!(sched.state(task).is_some_and(|s| s.is_suspended()));
    sched.tick(1.0);
    assert_eq!(sched.state(task), Some(TaskState::Completed));
}

#[test]
fn spawned_children_are_adopted_by_the_enclosing_scope() {
    let mut sched = scheduler();
    let child = Rc::new(Cell::new(None::<TaskId>));
    let c = child.clone();
    let root = sched.spawn(flow::chain([
        flow::call(move |cx| {
            c.set(Some(cx.spawn(flow::wait_for(10.0).unwrap())));
            Ok(())
        })
        .boxed(),
        wait(2.0),
    ]));
    let child = child.get().unwrap();
    sched.tick(0.5);
    assert!(sched.state(child).is_some_and(|s| s.is_suspended()));

    sched.cancel(root).unwrap();
    assert_eq!(sched.state(child), Some(TaskState::Cancelled));
}

#[test]
fn spawn_combinator_does_not_block_the_sequence() {
    let mut sched = scheduler();
    let rt = sched.runtime();
    let x = rt.signal(0.0f32);
    let root = sched.spawn(flow::chain([
        flow::spawn(x.animate_to(10.0, 4.0, Easing::Linear).unwrap()).boxed(),
        wait(1.0),
    ]));
    sched.tick(1.0);
    assert_eq!(sched.state(root), Some(TaskState::Completed));
    assert_eq!(x.get(), 2.5);
    assert_eq!(sched.pending(), 1);
    while sched.tick(1.0) {}
    assert_eq!(x.get(), 10.0);
}

#[test]
fn delay_waits_before_running() {
    let mut sched = scheduler();
    let rt = sched.runtime();
    let x = rt.signal(0.0f32);
    sched.spawn(flow::delay(1.0, x.animate_to(1.0, 0.0, Easing::Linear).unwrap()).unwrap());
    sched.tick(0.75);
    assert_eq!(x.get(), 0.0);
    sched.tick(0.25);
    assert_eq!(x.get(), 1.0);
}

fn run_scene(dts: &[f64]) -> Vec<(f64, f32, f32)> {
    let mut sched = scheduler();
    let rt = sched.runtime();
    let x = rt.signal(0.0f32);
    let y = rt.signal(0.0f32);
    sched.spawn(
        flow::sequence(
            0.25,
            [
                flow::all([
                    x.animate_to(5.0, 1.0, Easing::BackOut).unwrap().boxed(),
                    y.animate_to(-2.0, 0.7, Easing::ElasticOut).unwrap().boxed(),
                ])
                .boxed(),
                x.animate_to(0.0, 0.5, Easing::BounceOut).unwrap().boxed(),
            ],
        )
        .unwrap(),
    );
    let mut history = Vec::new();
    for dt in dts {
        sched.tick(*dt);
        history.push((sched.now(), x.get(), y.get()));
    }
    history
}

#[test]
fn identical_inputs_produce_identical_histories() {
    let dts = [0.016, 0.033, 0.1, 0.016, 0.5, 0.2, 0.016, 0.9, 0.3];
    let a = run_scene(&dts);
    let b = run_scene(&dts);
    assert_eq!(a.len(), b.len());
    for (left, right) in a.iter().zip(&b) {
        assert_eq!(left.0.to_bits(), right.0.to_bits());
        assert_eq!(left.1.to_bits(), right.1.to_bits());
        assert_eq!(left.2.to_bits(), right.2.to_bits());
    }
}

#[test]
fn tick_report_counts_activity() {
    let mut sched = scheduler();
    sched.spawn(flow::all([wait(0.5), wait(1.0)]));
    sched.tick(0.5);
    let report = sched.last_report().clone();
    assert_eq!(report.epoch, 1);
    assert_eq!(report.time, 0.5);
    assert_eq!(report.spawned, 3);
    assert_eq!(report.completed, 1);
    assert_eq!(report.pending, 2);
    assert!(report.passes >= 1);
    assert!(report.failures.is_empty());

    sched.tick(0.5);
    let report = sched.last_report();
    assert_eq!(report.spawned, 0);
    assert_eq!(report.completed, 2);
    assert_eq!(report.pending, 0);
}
