//! Run scripts: a YAML description of one run (options, config and logged
//! steps) replayed through a session.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use runlink::{
    with_config, with_project, with_run_id, with_run_name, with_settings, KeyValueMap, RunOption,
    RunlinkError, Session, Settings, Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    Atomic,
    Partial,
}

impl std::str::FromStr for Discipline {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "atomic" => Ok(Discipline::Atomic),
            "partial" => Ok(Discipline::Partial),
            other => anyhow::bail!("Unknown discipline: {}", other),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    pub name: Option<String>,
    pub run_id: Option<String>,
    pub project: Option<String>,
    #[serde(default)]
    pub config: Option<serde_yaml::Mapping>,
    #[serde(default)]
    pub steps: Vec<serde_yaml::Mapping>,
    /// Leave the run unfinished at the end (it is then finished on drop).
    #[serde(default)]
    pub no_finish: bool,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("parsing script {}", path.display()))
    }

    fn options(&self, settings: Option<Settings>) -> Result<Vec<RunOption>> {
        let mut options = Vec::new();
        if let Some(settings) = settings {
            options.push(with_settings(settings));
        }
        if let Some(config) = &self.config {
            let config = KeyValueMap::try_from(config.clone()).context("invalid config")?;
            options.push(with_config(Arc::new(config)));
        }
        if let Some(name) = &self.name {
            options.push(with_run_name(name.clone()));
        }
        if let Some(run_id) = &self.run_id {
            options.push(with_run_id(run_id.clone()));
        }
        if let Some(project) = &self.project {
            options.push(with_project(project.clone()));
        }
        Ok(options)
    }

    /// Convert every step, rejecting values `discipline` cannot send.
    fn steps(&self, discipline: Discipline) -> Result<Vec<KeyValueMap>> {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| step_map(step, discipline).with_context(|| format!("invalid step {}", i)))
            .collect()
    }

    /// Replay the script on `session`. All values are validated before the
    /// run is created.
    pub fn replay(&self, session: &Session, discipline: Discipline, settings: Option<Settings>) -> Result<()> {
        let options = self.options(settings)?;
        let steps = self.steps(discipline)?;

        match discipline {
            Discipline::Atomic => {
                let mut run = session.init_run(options)?;
                for (i, step) in steps.iter().enumerate() {
                    run.log(step).with_context(|| format!("logging step {}", i))?;
                }
                if !self.no_finish {
                    run.finish()?;
                }
            }
            Discipline::Partial => {
                let mut run = session.init_partial_run(options)?;
                for (i, step) in steps.iter().enumerate() {
                    run.log(step).with_context(|| format!("logging step {}", i))?;
                }
                if !self.no_finish {
                    run.finish()?;
                }
            }
        }
        info!(steps = steps.len(), "Script replayed");
        Ok(())
    }
}

fn step_map(step: &serde_yaml::Mapping, discipline: Discipline) -> runlink::Result<KeyValueMap> {
    let map = KeyValueMap::try_from(step.clone())?;
    // Partial-commit records carry numbers only.
    if discipline == Discipline::Partial {
        if let Some((key, _)) = map.iter().find(|(_, v)| matches!(v, Value::Text(_))) {
            return Err(RunlinkError::InvalidValueType {
                key: key.clone(),
                found: "text",
            });
        }
    }
    Ok(map)
}
