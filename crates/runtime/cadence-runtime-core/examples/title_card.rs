use serde_json::to_string_pretty;

use cadence_runtime::{flow, Color, Config, Easing, Routine, Scheduler, Value};

fn main() -> anyhow::Result<()> {
    let mut sched = Scheduler::new(Config::default());
    let rt = sched.runtime();

    let title = rt.signal(String::from("Hello"));
    let offset = rt.signal([0.0f32, -40.0]);
    let tint = rt.signal(Color::from_hex("#1e1e2e")?);
    let caption = {
        let (t, o) = (title.clone(), offset.clone());
        rt.computed(move || format!("{} @ ({:.1}, {:.1})", t.get(), o.get()[0], o.get()[1]))
    };

    // Slide in and tint together, hold, then retype the title once the host says so.
    let accent = Color::from_hex("#f5c2e7")?;
    let intro = flow::sequence(
        0.5,
        [
            flow::all([
                offset.animate_to([0.0, 0.0], 0.8, Easing::BackOut)?.boxed(),
                tint.animate_to(accent, 0.8, Easing::SineInOut)?.boxed(),
            ])
            .boxed(),
            flow::wait_until("advance").boxed(),
            title
                .animate_to("Hello, cadence".to_string(), 1.0, Easing::Linear)?
                .boxed(),
        ],
    )?;
    let intro = sched.spawn(intro);

    for frame in 0..240 {
        if frame == 90 {
            sched.dispatch("advance", Some(Value::Bool(true)));
        }
        if !sched.tick(1.0 / 60.0) {
            break;
        }
        if frame % 30 == 0 {
            println!("t={:.2} {} tint={}", sched.now(), caption.get()?, tint.get().to_hex());
        }
    }

    println!("intro: {:?}", sched.state(intro));
    println!("last tick:\n{}", to_string_pretty(sched.last_report())?);
    Ok(())
}
