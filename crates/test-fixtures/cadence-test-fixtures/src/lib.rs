//! Golden fixtures shared by the cadence test suites.
//!
//! Files live in the workspace-level `fixtures/` directory and are indexed by
//! `fixtures/manifest.json`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Result<Manifest, String>> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).map_err(|e| format!("fixtures manifest should parse: {e}"))
});

#[derive(Debug, Deserialize)]
struct Manifest {
    timelines: HashMap<String, String>,
    #[serde(default)]
    configs: HashMap<String, String>,
}

fn manifest() -> Result<&'static Manifest> {
    MANIFEST.as_ref().map_err(|e| anyhow!("{e}"))
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a>(map: &'a HashMap<String, String>, kind: &str, name: &str) -> Result<&'a str> {
    map.get(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

/// Expected signal values sampled after each tick of a scripted scene.
#[derive(Debug, Clone, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub description: String,
    /// Tick size used to produce the samples.
    pub dt: f64,
    /// Allowed absolute error per sampled value.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    pub samples: Vec<Sample>,
}

fn default_tolerance() -> f64 {
    1e-5
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sample {
    pub time: f64,
    pub values: BTreeMap<String, f64>,
    /// Whether the scene's root task has completed at this time.
    #[serde(default)]
    pub completed: bool,
}

impl Timeline {
    /// Compare observed values against the sample at `index`.
    pub fn check(&self, index: usize, observed: &BTreeMap<String, f64>) -> Result<()> {
        let sample = self
            .samples
            .get(index)
            .ok_or_else(|| anyhow!("no sample #{index}"))?;
        for (key, expected) in &sample.values {
            let actual = observed
                .get(key)
                .ok_or_else(|| anyhow!("t={}: missing value '{key}'", sample.time))?;
            if (actual - expected).abs() > self.tolerance {
                return Err(anyhow!(
                    "t={}: '{key}' expected {expected}, got {actual}",
                    sample.time
                ));
            }
        }
        Ok(())
    }
}

pub mod timelines {
    use super::*;

    pub fn keys() -> Result<Vec<String>> {
        let mut keys: Vec<String> = manifest()?.timelines.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    pub fn load(name: &str) -> Result<Timeline> {
        let rel = lookup(&manifest()?.timelines, "timeline", name)?;
        super::load_json(rel)
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let rel = lookup(&manifest()?.timelines, "timeline", name)?;
        Ok(resolve_path(rel))
    }
}

pub mod configs {
    use super::*;

    pub fn json(name: &str) -> Result<String> {
        let rel = lookup(&manifest()?.configs, "config", name)?;
        read_to_string(rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_timeline_in_manifest_parses() {
        for key in timelines::keys().unwrap() {
            let timeline = timelines::load(&key).unwrap();
            assert!(timeline.dt > 0.0, "{key}");
            assert!(!timeline.samples.is_empty(), "{key}");
        }
    }

    #[test]
    fn unknown_fixture_is_an_error() {
        assert!(timelines::load("does-not-exist").is_err());
    }

    #[test]
    fn check_reports_mismatches() {
        let timeline = timelines::load("fade-and-slide").unwrap();
        let mut observed = timeline.samples[0].values.clone();
        assert!(timeline.check(0, &observed).is_ok());
        if let Some(v) = observed.values_mut().next() {
            *v += 1.0;
        }
        assert!(timeline.check(0, &observed).is_err());
    }
}
