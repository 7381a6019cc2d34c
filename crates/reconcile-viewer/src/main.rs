/*
 * reconcile-viewer
 * Copyright (c) 2025 Posit, PBC
 *
 * Replays a sequence of option documents through the reconciler and prints,
 * for every step, which component instances were created, kept or destroyed.
 */

use anyhow::Result;
use clap::Parser;
use option_reconcile::{Reconciler, UpdateFlags, Viewport};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod replay;

use config::{DEFAULT_VIEWPORT, ViewerConfig};
use replay::{Replay, parse_viewport};

#[derive(Parser, Debug)]
#[command(name = "reconcile-viewer")]
#[command(about = "Replay option documents and print the reconciliation reports as JSON")]
struct Args {
    /// Option documents to apply in order (JSON, or YAML by extension)
    #[arg(required = true)]
    steps: Vec<PathBuf>,

    /// TOML file with the viewport, update flags and registered kinds
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Viewport width (overrides the config file)
    #[arg(long)]
    width: Option<f64>,

    /// Viewport height (overrides the config file)
    #[arg(long)]
    height: Option<f64>,

    /// Rebuild every instance on each step instead of merging
    #[arg(long)]
    not_merge: bool,

    /// Kinds matched by id only; may be given several times
    #[arg(long = "replace-merge", value_name = "KIND")]
    replace_merge: Vec<String>,

    /// Resize to WIDTHxHEIGHT after the last step
    #[arg(long, value_parser = parse_viewport, value_name = "WxH")]
    resize: Option<Viewport>,

    /// Move the timeline to this frame after the last step
    #[arg(long, allow_negative_numbers = true)]
    timeline_index: Option<i64>,
}

impl Args {
    fn viewport(&self, config: &ViewerConfig) -> Viewport {
        let base = config.viewport.unwrap_or(DEFAULT_VIEWPORT);
        Viewport::new(
            self.width.unwrap_or(base.width),
            self.height.unwrap_or(base.height),
        )
    }

    fn flags(&self, config: &ViewerConfig) -> UpdateFlags {
        let mut flags = config.flags.clone();
        flags.not_merge |= self.not_merge;
        flags.with_replace_merge(self.replace_merge.iter().cloned())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reconcile_viewer=info,option_reconcile=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };

    let viewport = args.viewport(&config);
    let mut reconciler =
        Reconciler::new(config.registry(), viewport).with_config(config.reconciler.clone());
    tracing::info!(
        width = viewport.width,
        height = viewport.height,
        kinds = reconciler.registry().len(),
        "Starting replay"
    );

    let replay = Replay {
        flags: args.flags(&config),
        timeline_index: args.timeline_index,
        resize: args.resize,
        files: args.steps,
    };
    let output = replay.run(&mut reconciler)?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::path::Path;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
    }

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_command_line_overrides_config() {
        let config = ViewerConfig::parse(
            r#"
            viewport = { width = 300.0, height = 200.0 }

            [flags]
            replaceMerge = ["series"]
            "#,
        )
        .unwrap();
        let args = Args::try_parse_from([
            "reconcile-viewer",
            "a.json",
            "--width",
            "640",
            "--not-merge",
            "--replace-merge",
            "legend",
            "--resize",
            "320x240",
            "--timeline-index",
            "-1",
        ])
        .unwrap();

        assert_eq!(args.viewport(&config), Viewport::new(640.0, 200.0));
        let flags = args.flags(&config);
        assert!(flags.not_merge);
        assert_eq!(flags.replace_merge, vec!["series".to_string(), "legend".to_string()]);
        assert_eq!(args.resize, Some(Viewport::new(320.0, 240.0)));
        assert_eq!(args.timeline_index, Some(-1));
    }

    #[test]
    fn test_default_viewport() {
        let args = Args::try_parse_from(["reconcile-viewer", "a.json"]).unwrap();
        assert_eq!(args.viewport(&ViewerConfig::default()), DEFAULT_VIEWPORT);
        assert_eq!(args.flags(&ViewerConfig::default()), UpdateFlags::merge());
    }

    #[test]
    fn test_steps_are_required() {
        assert!(Args::try_parse_from(["reconcile-viewer"]).is_err());
        assert!(Args::try_parse_from(["reconcile-viewer", "a.json", "--resize", "wide"]).is_err());
    }

    #[test]
    fn test_replay_with_config_file() {
        let config = ViewerConfig::load(&fixture("viewer.toml")).unwrap();
        let args = Args::try_parse_from([
            "reconcile-viewer".into(),
            fixture("step1.yaml").into_os_string(),
            "--width".into(),
            "400".into(),
        ])
        .unwrap();

        let mut reconciler = Reconciler::new(config.registry(), args.viewport(&config));
        let replay = Replay {
            flags: args.flags(&config),
            files: args.steps.clone(),
            ..Replay::default()
        };
        let output = replay.run(&mut reconciler).unwrap();

        assert_eq!(output.steps.len(), 1);
        assert_eq!(output.option["legend"][0]["orient"], "vertical");
        let legend = reconciler.instances("legend").next().unwrap();
        assert_eq!(legend.subtype, "plain");
    }
}
