use crate::config::{Config, OptimizerConfig, load_config};
use crate::convert::{convert, convert_to_tree};
use crate::dump::write_tree_dump;
use crate::naming::to_valid_drawable_name;
use crate::render::write_output;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "svg2vd",
    version,
    about = "Convert SVG files into Android vector drawables"
)]
pub struct Args {
    /// Input .svg files, directories of .svg files, or '-' for stdin
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output file, or output directory when converting several inputs.
    /// Defaults to stdout for a single input.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Rewrite output names into valid drawable resource names
    #[arg(long = "sanitize-names")]
    pub sanitize_names: bool,

    /// Command run on each written file, e.g. "avocado --quiet"
    #[arg(long = "optimizer")]
    pub optimizer: Option<String>,

    /// Keep converting the remaining inputs after a failure
    #[arg(long = "continue-on-error")]
    pub continue_on_error: bool,

    /// Config JSON file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Write a JSON dump of the converted tree (single input only)
    #[arg(long = "dump")]
    pub dump: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Source {
    Stdin,
    File(PathBuf),
}

impl Source {
    fn stem(&self) -> String {
        match self {
            Source::Stdin => "stdin".to_string(),
            Source::File(path) => path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("drawable")
                .to_string(),
        }
    }

    fn display_name(&self) -> String {
        match self {
            Source::Stdin => "<stdin>".to_string(),
            Source::File(path) => path.display().to_string(),
        }
    }

    fn read(&self) -> Result<String> {
        match self {
            Source::Stdin => {
                let mut buf = String::new();
                io::stdin().read_to_string(&mut buf).context("reading stdin")?;
                Ok(buf)
            }
            Source::File(path) => std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display())),
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);

    let sources = collect_inputs(&args.inputs)?;
    if sources.is_empty() {
        return Err(anyhow::anyhow!("No .svg files found in input"));
    }
    let to_directory = args.inputs.iter().any(|input| input.is_dir())
        || sources.len() > 1
        || args.output.as_deref().is_some_and(Path::is_dir);
    if to_directory && args.output.is_none() {
        return Err(anyhow::anyhow!("Multiple inputs require an output directory"));
    }
    if args.dump.is_some() && sources.len() != 1 {
        return Err(anyhow::anyhow!("--dump requires exactly one input"));
    }

    let mut failed = 0usize;
    for source in &sources {
        let target = match (&args.output, to_directory) {
            (Some(output), true) => Some(output.join(output_file_name(source, &config))),
            (Some(output), false) => Some(output.clone()),
            (None, _) => None,
        };
        let outcome = source.read().and_then(|text| {
            if let Some(dump) = args.dump.as_deref() {
                write_dump(&text, dump)?;
            }
            convert_one(&text, &source.display_name(), target.as_deref(), &config)
        });
        if let Err(err) = outcome {
            failed += 1;
            error!(file = %source.display_name(), "conversion failed");
            eprintln!("{}: {err:#}", source.display_name());
            if !config.output.continue_on_error {
                break;
            }
        }
    }

    if failed > 0 {
        return Err(anyhow::anyhow!(
            "{failed} of {} file(s) failed to convert",
            sources.len()
        ));
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init();
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if args.sanitize_names {
        config.output.sanitize_names = true;
    }
    if args.continue_on_error {
        config.output.continue_on_error = true;
    }
    if let Some(optimizer) = args.optimizer.as_deref() {
        let mut parts = optimizer.split_whitespace().map(str::to_string);
        if let Some(command) = parts.next() {
            config.optimizer = OptimizerConfig {
                command: Some(command),
                args: parts.collect(),
            };
        }
    }
}

fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<Source>> {
    let mut sources = Vec::new();
    for input in inputs {
        if input == Path::new("-") {
            sources.push(Source::Stdin);
            continue;
        }
        if input.is_dir() {
            let mut found = Vec::new();
            for entry in std::fs::read_dir(input)
                .with_context(|| format!("listing {}", input.display()))?
            {
                let path = entry?.path();
                if path.is_file() && is_svg(&path) {
                    found.push(path);
                }
            }
            found.sort();
            sources.extend(found.into_iter().map(Source::File));
            continue;
        }
        sources.push(Source::File(input.clone()));
    }
    Ok(sources)
}

fn is_svg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"))
}

fn output_file_name(source: &Source, config: &Config) -> String {
    let stem = source.stem();
    let stem = if config.output.sanitize_names {
        to_valid_drawable_name(&stem)
    } else {
        stem
    };
    format!("{stem}.{}", config.output.extension)
}

fn write_dump(text: &str, path: &Path) -> Result<()> {
    let tree = convert_to_tree(text)?;
    write_tree_dump(path, &tree).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "wrote tree dump");
    Ok(())
}

fn convert_one(text: &str, name: &str, target: Option<&Path>, config: &Config) -> Result<()> {
    let result = convert(text, name);
    if !result.success {
        let message = result.error.unwrap_or_default();
        return Err(anyhow::anyhow!(message));
    }
    let content = result.content.unwrap_or_default();
    write_output(&content, target)?;
    if let Some(path) = target {
        debug!(path = %path.display(), "wrote drawable");
        run_optimizer(&config.optimizer, path);
    }
    Ok(())
}

/// Runs the configured optimizer on `path`. Failures are logged only.
fn run_optimizer(optimizer: &OptimizerConfig, path: &Path) {
    let Some(command) = optimizer.command.as_deref() else {
        return;
    };
    match Command::new(command).args(&optimizer.args).arg(path).status() {
        Ok(status) if status.success() => {
            debug!(command, path = %path.display(), "optimizer finished");
        }
        Ok(status) => {
            warn!(command, path = %path.display(), %status, "optimizer failed");
        }
        Err(err) => {
            warn!(command, path = %path.display(), error = %err, "could not run optimizer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_svg_files_from_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.svg"), "").unwrap();
        std::fs::write(dir.path().join("a.SVG"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        let sources =
            collect_inputs(&[dir.path().to_path_buf(), PathBuf::from("-")]).unwrap();
        assert_eq!(
            sources,
            vec![
                Source::File(dir.path().join("a.SVG")),
                Source::File(dir.path().join("b.svg")),
                Source::Stdin,
            ]
        );
    }

    #[test]
    fn output_names_follow_config() {
        let source = Source::File(PathBuf::from("icons/Arrow Left.svg"));
        let mut config = Config::default();
        assert_eq!(output_file_name(&source, &config), "Arrow Left.xml");
        config.output.sanitize_names = true;
        assert_eq!(output_file_name(&source, &config), "arrow_left.xml");
    }

    #[test]
    fn dump_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");
        write_dump(r#"<svg viewBox="0 0 4 4"><rect width="1" height="1"/></svg>"#, &path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["root"]["kind"], "group");
    }

    #[test]
    fn optimizer_flag_splits_command() {
        let args = Args::parse_from(["svg2vd", "a.svg", "--optimizer", "avocado --quiet"]);
        let mut config = Config::default();
        apply_overrides(&mut config, &args);
        assert_eq!(config.optimizer.command.as_deref(), Some("avocado"));
        assert_eq!(config.optimizer.args, vec!["--quiet".to_string()]);
    }

    #[test]
    fn converts_file_to_target() {
        let dir = tempfile::tempdir().unwrap();
        let svg = r#"<svg viewBox="0 0 4 4"><rect width="4" height="4"/></svg>"#;
        let target = dir.path().join("out").join("square.xml");
        convert_one(svg, "square.svg", Some(&target), &Config::default()).unwrap();
        let written = std::fs::read_to_string(&target).unwrap();
        assert!(written.starts_with("<vector"));
    }

    #[test]
    fn failed_conversion_reports_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("bad.xml");
        let err = convert_one("<svg/>", "bad.svg", Some(&target), &Config::default()).unwrap_err();
        assert!(err.to_string().contains("viewBox"));
        assert!(!target.exists());
    }
}
