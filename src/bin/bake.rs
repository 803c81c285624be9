// src/bin/bake.rs
// CLI bake: unwraps the demo scene, traces it, and writes the atlas.
// Prints "X / N points" progress while workers run; exits nonzero on any
// fatal pipeline error.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use glam::Vec3;
use lightforge::{BakeConfig, BakePipeline, MeshData};

struct CliArgs {
    config: BakeConfig,
    out: PathBuf,
    preview_png: Option<PathBuf>,
}

const USAGE: &str = "\
usage: bake [options]

  --out PATH          output raw lightmap (default lightmap.raw)
  --preview-png PATH  also write a tonemapped preview
  --config PATH       JSON file with BakeConfig overrides
  --production        1000 spp / 15 bounces preset
  --size N            atlas side length (power of two, 64..=4096)
  --spp N             samples per bake point
  --bounces N         maximum path length
  --seed N            global RNG seed
  --workers N         worker threads (0 = all cores)
  --include-sky       add sky radiance when a path escapes
  --help              print this text
";

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut config: Option<BakeConfig> = None;
    let mut production = false;
    let mut out = PathBuf::from("lightmap.raw");
    let mut preview_png = None;
    let mut overrides: Vec<(String, String)> = Vec::new();
    let mut include_sky = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value_for = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("missing value for {flag}"))
        };
        match arg.as_str() {
            "--help" | "-h" => return Err(USAGE.to_string()),
            "--production" => production = true,
            "--include-sky" => include_sky = true,
            "--out" => out = PathBuf::from(value_for("--out")?),
            "--preview-png" => preview_png = Some(PathBuf::from(value_for("--preview-png")?)),
            "--config" => {
                let path = value_for("--config")?;
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| format!("cannot read {path}: {e}"))?;
                config = Some(
                    serde_json::from_str(&text).map_err(|e| format!("bad config {path}: {e}"))?,
                );
            }
            "--size" | "--spp" | "--bounces" | "--seed" | "--workers" => {
                overrides.push((arg.clone(), value_for(arg)?));
            }
            other => return Err(format!("unknown argument: {other}\n\n{USAGE}")),
        }
    }

    let mut config = config.unwrap_or_else(|| {
        if production {
            BakeConfig::production()
        } else {
            BakeConfig::preview()
        }
    });
    if production {
        let prod = BakeConfig::production();
        config.spp = prod.spp;
        config.bounces = prod.bounces;
    }
    config.include_sky_bounces |= include_sky;

    for (flag, value) in overrides {
        let parse_u32 =
            |v: &str| v.parse::<u32>().map_err(|e| format!("bad {flag} value: {e}"));
        match flag.as_str() {
            "--size" => config.lightmap_size = parse_u32(&value)?,
            "--spp" => config.spp = parse_u32(&value)?,
            "--bounces" => config.bounces = parse_u32(&value)?,
            "--seed" => {
                config.seed = value
                    .parse::<u64>()
                    .map_err(|e| format!("bad --seed value: {e}"))?
            }
            "--workers" => {
                config.workers = value
                    .parse::<usize>()
                    .map_err(|e| format!("bad --workers value: {e}"))?
            }
            _ => unreachable!(),
        }
    }

    Ok(CliArgs {
        config,
        out,
        preview_png,
    })
}

/// Cornell-style demo enclosure: white floor/ceiling/back, red left wall,
/// green right wall, open front facing +Z.
fn demo_scene() -> MeshData {
    let white = Vec3::splat(0.73);
    let red = Vec3::new(0.65, 0.05, 0.05);
    let green = Vec3::new(0.12, 0.45, 0.15);
    let s = 10.0;

    let mut mesh = MeshData::new();
    // Floor, normal up.
    mesh.add_quad(Vec3::ZERO, Vec3::new(0.0, 0.0, s), Vec3::new(s, 0.0, 0.0), white);
    // Ceiling, normal down.
    mesh.add_quad(
        Vec3::new(0.0, s, 0.0),
        Vec3::new(s, 0.0, 0.0),
        Vec3::new(0.0, 0.0, s),
        white,
    );
    // Back wall at z = 0, normal +Z.
    mesh.add_quad(Vec3::ZERO, Vec3::new(s, 0.0, 0.0), Vec3::new(0.0, s, 0.0), white);
    // Left wall at x = 0, normal +X.
    mesh.add_quad(Vec3::ZERO, Vec3::new(0.0, s, 0.0), Vec3::new(0.0, 0.0, s), red);
    // Right wall at x = s, normal -X.
    mesh.add_quad(
        Vec3::new(s, 0.0, 0.0),
        Vec3::new(0.0, 0.0, s),
        Vec3::new(0.0, s, 0.0),
        green,
    );
    mesh
}

fn run(args: CliArgs) -> anyhow::Result<()> {
    let pipeline = BakePipeline::new(args.config)?;
    let scene = demo_scene();

    let mut last_printed = usize::MAX;
    let framebuffer = pipeline
        .bake_with(&scene, Some(args.out.as_path()), |done, total| {
            if done != last_printed {
                print!("\r{done} / {total} points");
                std::io::stdout().flush().ok();
                last_printed = done;
            }
        })
        .with_context(|| format!("baking to {}", args.out.display()))?;
    println!();

    if let Some(path) = &args.preview_png {
        lightforge::store::save_preview_png(&framebuffer, path)
            .with_context(|| format!("writing preview {}", path.display()))?;
        println!("preview written to {}", path.display());
    }
    println!("lightmap written to {}", args.out.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&args) {
        Ok(args) => args,
        Err(message) => {
            if message.starts_with("usage:") {
                print!("{message}");
                return ExitCode::SUCCESS;
            }
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("bake failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}
