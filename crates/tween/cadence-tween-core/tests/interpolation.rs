use cadence_api_core::{Color, Value};
use cadence_tween_core::{interpolate, interpolate_text, text_diff, TextEdit, TextGranularity, Tween};

/// it should return exact endpoints for every kind
#[test]
fn endpoints_are_exact_for_all_kinds() {
    let pairs: Vec<(Value, Value)> = vec![
        (Value::Float(-3.0), Value::Float(7.25)),
        (Value::Vec2([0.1, 0.2]), Value::Vec2([5.0, -1.0])),
        (Value::Vec3([0.1, 0.2, 0.3]), Value::Vec3([5.0, -1.0, 2.0])),
        (Value::Color(Color::rgb(0.9, 0.1, 0.3)), Value::Color(Color::rgb(0.1, 0.8, 0.2))),
        (Value::text("hello"), Value::text("world")),
        (Value::Bool(false), Value::Bool(true)),
    ];
    for (a, b) in pairs {
        assert_eq!(interpolate(&a, &b, 0.0), a);
        assert_eq!(interpolate(&a, &b, 1.0), b);
    }
}

/// it should blend colors in Oklab rather than raw sRGB
#[test]
fn color_blend_is_perceptual() {
    let black = Color::BLACK;
    let white = Color::WHITE;
    let mid = black.interpolate(&white, 0.5);
    // Oklab L = 0.5 maps to sRGB ~0.39 grey, raw sRGB averaging would give 0.5.
    assert!((mid.r - mid.g).abs() < 1e-3 && (mid.g - mid.b).abs() < 1e-3);
    assert!(mid.r < 0.45 && mid.r > 0.3, "mid grey {}", mid.r);

    let faded = Color::new(1.0, 0.0, 0.0, 0.0).interpolate(&Color::new(1.0, 0.0, 0.0, 1.0), 0.25);
    assert!((faded.a - 0.25).abs() < 1e-6);
}

/// it should animate text through deletions then insertions
#[test]
fn text_transitions_through_edit_script() {
    let from = "fn main() {}".to_string();
    let to = "fn start() {}".to_string();
    let quarter = interpolate_text(&from, &to, 0.25, TextGranularity::Word);
    let three_quarters = interpolate_text(&from, &to, 0.75, TextGranularity::Word);
    assert_eq!(interpolate(&from, &to, 0.0), from);
    assert_eq!(interpolate(&from, &to, 1.0), to);
    assert!(quarter.starts_with("fn "));
    assert!(three_quarters.starts_with("fn "));

    let edits = text_diff("a b", "a c", TextGranularity::Word);
    assert!(edits.contains(&TextEdit::Delete("b".into())));
    assert!(edits.contains(&TextEdit::Insert("c".into())));
}

/// it should serialize edit scripts for hosts that highlight diffs
#[test]
fn edit_script_json_layout() {
    let edits = text_diff("ab", "b", TextGranularity::Char);
    let json = serde_json::to_value(&edits).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            { "op": "delete", "text": "a" },
            { "op": "keep", "text": "b" }
        ])
    );
}
