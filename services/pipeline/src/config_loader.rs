//! Configuration loader for the pipeline.
//!
//! Reads the YAML file, substitutes `${VAR}` and `${VAR:-default}`
//! environment references, parses, resolves relative paths against the
//! file's directory and validates.

use anyhow::{bail, ensure, Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::config::PipelineConfig;

/// Load, expand, resolve and validate a pipeline configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read pipeline config from {:?}", path))?;

    let mut config = parse_config(&content).with_context(|| format!("Failed to parse pipeline config {:?}", path))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    config.resolve_paths(base);
    config
        .validate()
        .with_context(|| format!("Invalid pipeline config {:?}", path))?;

    info!(
        path = %path.display(),
        baseline = %format!("{}-{}", config.baseline.start_year, config.baseline.end_year),
        event_year = config.event_year,
        rois = config.rois.len(),
        metrics = config.metrics.len(),
        "Loaded configuration"
    );
    Ok(config)
}

/// Expand environment references and parse YAML, without path resolution.
pub fn parse_config(content: &str) -> Result<PipelineConfig> {
    let expanded = expand_env_vars(content)?;
    let config: PipelineConfig = serde_yaml::from_str(&expanded).context("Failed to parse pipeline config YAML")?;
    Ok(config)
}

// ============================================================================
// Environment references
// ============================================================================

/// One `${NAME}` or `${NAME:-default}` reference. The default applies when
/// the variable is unset or empty.
#[derive(Debug, PartialEq, Eq)]
struct VarRef<'a> {
    name: &'a str,
    default: Option<&'a str>,
}

impl<'a> VarRef<'a> {
    fn parse(body: &'a str) -> Result<Self> {
        let (name, default) = match body.split_once(":-") {
            Some((name, default)) => (name.trim(), Some(default)),
            None => (body.trim(), None),
        };
        let valid = name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        ensure!(valid, "invalid variable name '{}'", name);
        Ok(Self { name, default })
    }

    fn resolve(&self, lookup: &impl Fn(&str) -> Option<String>) -> Result<String> {
        match (lookup(self.name), self.default) {
            (Some(value), Some(_)) if !value.is_empty() => Ok(value),
            (Some(value), None) => Ok(value),
            (_, Some(default)) => Ok(default.to_string()),
            (None, None) => bail!("environment variable {} is not set", self.name),
        }
    }
}

fn expand_env_vars(content: &str) -> Result<String> {
    expand_with(content, |name| std::env::var(name).ok())
}

/// Substitute references line by line. YAML comment lines are copied
/// untouched so documentation may mention the syntax.
fn expand_with<F>(content: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut expanded = String::with_capacity(content.len());
    for (index, line) in content.split_inclusive('\n').enumerate() {
        if line.trim_start().starts_with('#') {
            expanded.push_str(line);
            continue;
        }
        let mut rest = line;
        while let Some(start) = rest.find("${") {
            expanded.push_str(&rest[..start]);
            let body = &rest[start + 2..];
            let end = body
                .find('}')
                .with_context(|| format!("line {}: unclosed '${{'", index + 1))?;
            let value = VarRef::parse(&body[..end])
                .and_then(|var| var.resolve(&lookup))
                .with_context(|| format!("line {}", index + 1))?;
            expanded.push_str(&value);
            rest = &body[end + 1..];
        }
        expanded.push_str(rest);
    }
    Ok(expanded)
}
