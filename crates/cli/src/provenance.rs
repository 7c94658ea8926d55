//! `<artifact>.provenance.json` sidecars for solver outputs.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Serialize)]
pub struct Callsite {
    pub file: &'static str,
    pub line: u32,
}

/// Sidecar document: who produced the artifact, from what, and what else
/// the same run wrote.
#[derive(Debug, Serialize)]
pub struct Provenance {
    pub code_rev: String,
    pub version: &'static str,
    pub callsite: Callsite,
    pub params: Value,
    /// The artifact first, then the other files of the run.
    pub outputs: Vec<String>,
}

impl Provenance {
    #[track_caller]
    pub fn new(params: Value) -> Self {
        let at = Location::caller();
        Self {
            code_rev: current_git_rev(),
            version: knitfield::VERSION,
            callsite: Callsite {
                file: at.file(),
                line: at.line(),
            },
            params,
            outputs: Vec::new(),
        }
    }

    /// Write the sidecar of `artifact` and return its path.
    pub fn write_for(mut self, artifact: &Path) -> Result<PathBuf> {
        let path = sidecar_path(artifact);
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        self.outputs.insert(0, artifact.to_string_lossy().into_owned());
        fs::write(&path, serde_json::to_vec_pretty(&self)?)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

/// `dir/name.ext` → `dir/name.provenance.json`.
fn sidecar_path(artifact: &Path) -> PathBuf {
    let stem = artifact
        .file_stem()
        .map_or_else(|| "artifact".into(), |s| s.to_string_lossy().into_owned());
    artifact.with_file_name(format!("{stem}.provenance.json"))
}

/// Build-time `GIT_COMMIT`, then the runtime variable, then `git rev-parse`.
pub fn current_git_rev() -> String {
    let from_env = option_env!("GIT_COMMIT")
        .map(str::to_string)
        .or_else(|| std::env::var("GIT_COMMIT").ok())
        .filter(|s| !s.is_empty());
    if let Some(rev) = from_env {
        return rev;
    }
    Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn sidecar_sits_next_to_the_layer_dump() {
        let base = Path::new("/tmp/run/layer-0.json");
        assert_eq!(sidecar_path(base), Path::new("/tmp/run/layer-0.provenance.json"));
    }

    #[test]
    fn sidecar_lists_all_outputs() {
        let dir = tempdir().unwrap();
        let artifact = dir.path().join("summary.json");
        fs::write(&artifact, "{}").unwrap();
        let mut prov = Provenance::new(json!({"scene": "annulus"}));
        prov.outputs = vec!["layer-0.json".into(), "layer-1.json".into()];
        let path = prov.write_for(&artifact).unwrap();
        let parsed: Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        assert_eq!(parsed["outputs"][0], artifact.to_string_lossy().as_ref());
        assert_eq!(parsed["outputs"][2], "layer-1.json");
        assert_eq!(parsed["params"]["scene"], "annulus");
        assert_eq!(parsed["version"], knitfield::VERSION);
        assert!(parsed["callsite"]["file"].as_str().unwrap().ends_with("provenance.rs"));
    }
}
