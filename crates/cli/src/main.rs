mod provenance;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use knitfield::api::{scene, SketchSet, SolveSummary, Solver, SolverParams, SCENES};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::SubscriberBuilder;

use provenance::{current_git_rev, Provenance};

#[derive(Parser)]
#[command(name = "cli")]
#[command(about = "Solve knitting flow/time fields over sketch scenes")]
struct Cmd {
    /// Optional run tag; propagated to outputs and logs
    #[arg(long)]
    tag: Option<String>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Solve a scene and write the finest layers plus a summary under `out`
    Solve {
        /// Built-in scene name or path to a scene JSON file
        #[arg(long)]
        scene: String,
        /// Optional solver parameters (JSON; missing keys use defaults)
        #[arg(long)]
        params: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
    },
    /// List the built-in scenes
    Scenes,
    /// Print a small provenance JSON block
    Report,
}

fn main() -> Result<()> {
    SubscriberBuilder::default().with_target(false).init();
    let cmd = Cmd::parse();
    match cmd.action {
        Action::Solve { scene, params, out } => {
            let params = load_params(params.as_deref())?;
            solve(&scene, params, &out, cmd.tag).map(|_| ())
        }
        Action::Scenes => {
            for name in SCENES {
                println!("{name}");
            }
            Ok(())
        }
        Action::Report => report(cmd.tag),
    }
}

/// A built-in scene by name, otherwise a `SketchSet` JSON file.
fn load_scene(source: &str) -> Result<SketchSet> {
    if let Some(set) = scene(source) {
        return Ok(set);
    }
    let path = Path::new(source);
    if !path.exists() {
        bail!("unknown scene {source:?} (built-ins: {})", SCENES.join(", "));
    }
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing scene {}", path.display()))
}

fn load_params(path: Option<&Path>) -> Result<SolverParams> {
    let Some(path) = path else {
        return Ok(SolverParams::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing params {}", path.display()))
}

fn solve(source: &str, params: SolverParams, out: &Path, tag: Option<String>) -> Result<SolveSummary> {
    tracing::info!(scene = source, out = %out.display(), tag = ?tag, "solve");
    let set = load_scene(source)?;
    let mut solver = Solver::new(set, params.clone()).context("setting up solver")?;
    let summary = solver.run();
    tracing::info!(
        converged = summary.converged(),
        iterations = summary.iterations(),
        warnings = summary.validation.warnings().count(),
        errors = summary.validation.errors().count(),
        "solved"
    );
    for issue in &summary.validation.issues {
        tracing::warn!("{issue}");
    }

    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    let mut outputs = Vec::new();
    for layer in solver.finest() {
        let path = out.join(format!("layer-{}.json", layer.index));
        let text = layer.to_json().context("serializing layer")?;
        fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
        outputs.push(path.to_string_lossy().into_owned());
    }
    let summary_path = out.join("summary.json");
    fs::write(&summary_path, serde_json::to_vec_pretty(&summary)?)
        .with_context(|| format!("writing {}", summary_path.display()))?;

    let mut prov = Provenance::new(json!({
        "scene": source,
        "tag": tag,
        "solver": params,
    }));
    prov.outputs = outputs;
    prov.write_for(&summary_path)?;
    Ok(summary)
}

fn report(tag: Option<String>) -> Result<()> {
    let obj = json!({
        "code_rev": current_git_rev(),
        "version": knitfield::VERSION,
        "tag": tag,
        "scenes": SCENES,
        "params": SolverParams::default(),
    });
    println!("{}", serde_json::to_string_pretty(&obj)?);
    Ok(())
}
