//! Text interpolation through a token-level edit script.
//!
//! The two strings are tokenized (per character or per word/whitespace run)
//! and aligned with a longest-common-subsequence table. During the first half
//! of the transition deleted tokens disappear in reading order; during the
//! second half inserted tokens appear in reading order. Kept tokens never
//! move, so shared text stays stable on screen.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextGranularity {
    #[default]
    Char,
    /// Words and whitespace runs are separate tokens.
    Word,
}

/// One step of the edit script turning the start text into the end text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "text", rename_all = "snake_case")]
pub enum TextEdit {
    Keep(String),
    Delete(String),
    Insert(String),
}

fn tokenize(s: &str, granularity: TextGranularity) -> Vec<&str> {
    match granularity {
        TextGranularity::Char => s
            .char_indices()
            .map(|(i, c)| &s[i..i + c.len_utf8()])
            .collect(),
        TextGranularity::Word => {
            let mut tokens = Vec::new();
            let mut start = 0;
            let mut prev_ws: Option<bool> = None;
            for (i, c) in s.char_indices() {
                let ws = c.is_whitespace();
                if prev_ws.is_some_and(|p| p != ws) {
                    tokens.push(&s[start..i]);
                    start = i;
                }
                prev_ws = Some(ws);
            }
            if start < s.len() {
                tokens.push(&s[start..]);
            }
            tokens
        }
    }
}

/// Compute the edit script from `from` to `to`.
pub fn diff(from: &str, to: &str, granularity: TextGranularity) -> Vec<TextEdit> {
    let a = tokenize(from, granularity);
    let b = tokenize(to, granularity);
    let (n, m) = (a.len(), b.len());

    // lcs[i][j] = length of the LCS of a[i..] and b[j..]
    let width = m + 1;
    let mut lcs = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i * width + j] = if a[i] == b[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let mut edits = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            edits.push(TextEdit::Keep(a[i].to_string()));
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            edits.push(TextEdit::Delete(a[i].to_string()));
            i += 1;
        } else {
            edits.push(TextEdit::Insert(b[j].to_string()));
            j += 1;
        }
    }
    edits.extend(a[i..].iter().map(|t| TextEdit::Delete(t.to_string())));
    edits.extend(b[j..].iter().map(|t| TextEdit::Insert(t.to_string())));
    edits
}

/// An edit script between two fixed strings, computed once and sampled at
/// any progress.
#[derive(Clone, Debug, PartialEq)]
pub struct TextMorph {
    from: String,
    to: String,
    edits: Vec<TextEdit>,
    deletes: usize,
    inserts: usize,
}

impl TextMorph {
    pub fn new(from: &str, to: &str, granularity: TextGranularity) -> Self {
        let edits = diff(from, to, granularity);
        let deletes = edits
            .iter()
            .filter(|e| matches!(e, TextEdit::Delete(_)))
            .count();
        let inserts = edits
            .iter()
            .filter(|e| matches!(e, TextEdit::Insert(_)))
            .count();
        Self {
            from: from.to_string(),
            to: to.to_string(),
            edits,
            deletes,
            inserts,
        }
    }

    /// Whether this script was built for exactly these endpoints.
    pub fn connects(&self, from: &str, to: &str) -> bool {
        self.from == from && self.to == to
    }

    pub fn edits(&self) -> &[TextEdit] {
        &self.edits
    }

    /// Text at progress `t`. `t <= 0` yields the start text, `t >= 1` the end.
    pub fn sample(&self, t: f32) -> String {
        if t <= 0.0 {
            return self.from.clone();
        }
        if t >= 1.0 {
            return self.to.clone();
        }
        let (removed, added) = if t < 0.5 {
            (((t * 2.0) * self.deletes as f32).floor() as usize, 0)
        } else {
            (
                self.deletes,
                (((t - 0.5) * 2.0) * self.inserts as f32).floor() as usize,
            )
        };

        let mut out = String::with_capacity(self.from.len().max(self.to.len()));
        let (mut seen_del, mut seen_ins) = (0, 0);
        for edit in &self.edits {
            match edit {
                TextEdit::Keep(s) => out.push_str(s),
                TextEdit::Delete(s) => {
                    if seen_del >= removed {
                        out.push_str(s);
                    }
                    seen_del += 1;
                }
                TextEdit::Insert(s) => {
                    if seen_ins < added {
                        out.push_str(s);
                    }
                    seen_ins += 1;
                }
            }
        }
        out
    }
}

/// Interpolate between two strings. `t <= 0` yields `from`, `t >= 1` yields `to`.
///
/// Builds the edit script on every call; animations should use
/// [`cached_tween`] instead.
pub fn interpolate_text(from: &str, to: &str, t: f32, granularity: TextGranularity) -> String {
    if t <= 0.0 {
        return from.to_string();
    }
    if t >= 1.0 {
        return to.to_string();
    }
    TextMorph::new(from, to, granularity).sample(t)
}

/// Interpolator that keeps the edit script of the last endpoint pair it saw,
/// so a running animation diffs its strings once rather than every frame.
pub fn cached_tween(granularity: TextGranularity) -> impl Fn(&String, &String, f32) -> String {
    let cache: RefCell<Option<TextMorph>> = RefCell::new(None);
    move |from: &String, to: &String, t: f32| {
        if t <= 0.0 {
            return from.clone();
        }
        if t >= 1.0 {
            return to.clone();
        }
        let mut cache = cache.borrow_mut();
        let morph = match cache.take() {
            Some(morph) if morph.connects(from, to) => morph,
            _ => TextMorph::new(from, to, granularity),
        };
        let out = morph.sample(t);
        *cache = Some(morph);
        out
    }
}

/// Character-level strategy, usable as a signal interpolator.
#[allow(clippy::ptr_arg)]
pub fn tween_text_chars(from: &String, to: &String, t: f32) -> String {
    interpolate_text(from, to, t, TextGranularity::Char)
}

/// Word-level strategy, usable as a signal interpolator.
#[allow(clippy::ptr_arg)]
pub fn tween_text_words(from: &String, to: &String, t: f32) -> String {
    interpolate_text(from, to, t, TextGranularity::Word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_tokens_keep_whitespace_runs() {
        assert_eq!(
            tokenize("let  x = 1", TextGranularity::Word),
            vec!["let", "  ", "x", " ", "=", " ", "1"]
        );
    }

    #[test]
    fn diff_keeps_common_subsequence() {
        let edits = diff("abc", "axc", TextGranularity::Char);
        assert_eq!(
            edits,
            vec![
                TextEdit::Keep("a".into()),
                TextEdit::Delete("b".into()),
                TextEdit::Insert("x".into()),
                TextEdit::Keep("c".into()),
            ]
        );
    }

    #[test]
    fn deletions_then_insertions() {
        let from = "let x = 1";
        let to = "let y = 2";
        assert_eq!(interpolate_text(from, to, 0.0, TextGranularity::Word), from);
        assert_eq!(interpolate_text(from, to, 0.5, TextGranularity::Word), "let  = ");
        assert_eq!(interpolate_text(from, to, 1.0, TextGranularity::Word), to);
    }

    #[test]
    fn multibyte_characters_are_whole_tokens() {
        let out = interpolate_text("héllo", "hello", 0.5, TextGranularity::Char);
        assert_eq!(out, "hllo");
    }

    #[test]
    fn cached_tween_reuses_script_until_endpoints_change() {
        let tween = cached_tween(TextGranularity::Word);
        let (a, b) = ("let x = 1".to_string(), "let y = 2".to_string());
        for step in 1..10 {
            let t = step as f32 / 10.0;
            assert_eq!(tween(&a, &b, t), interpolate_text(&a, &b, t, TextGranularity::Word));
        }
        let c = "let z = 3".to_string();
        assert_eq!(tween(&a, &c, 0.5), interpolate_text(&a, &c, 0.5, TextGranularity::Word));
        assert_eq!(tween(&a, &c, 1.0), c);
    }

    #[test]
    fn morph_keeps_its_endpoints() {
        let morph = TextMorph::new("abc", "axc", TextGranularity::Char);
        assert!(morph.connects("abc", "axc"));
        assert!(!morph.connects("abc", "abc"));
        assert_eq!(morph.edits(), diff("abc", "axc", TextGranularity::Char).as_slice());
        assert_eq!(morph.sample(0.5), "ac");
    }
}
