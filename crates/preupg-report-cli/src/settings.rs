use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use preupg_report_core::GlobalValues;
use serde::Deserialize;

const ENV_PREFIX: &str = "PREUPG";

/// Run settings layered from defaults, an optional config file and `PREUPG_*` variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub result_dir: PathBuf,
    pub scenario: String,
    #[serde(default)]
    pub mode: Option<String>,
    pub devel_mode: bool,
    #[serde(default)]
    pub dist_native: Option<String>,
    pub verbose: bool,
}

impl Settings {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("result_dir", "/root/preupgrade")?
            .set_default("scenario", "RHEL6_7")?
            .set_default("devel_mode", false)?
            .set_default("verbose", false)?;
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("failed to assemble settings")?
            .try_deserialize::<Settings>()
            .context("invalid settings")?;
        Ok(settings)
    }

    pub fn global_values(&self) -> GlobalValues {
        GlobalValues {
            result_dir: self.result_dir.clone(),
            scenario: self.scenario.clone(),
            mode: self.mode.clone().filter(|mode| !mode.trim().is_empty()),
            devel_mode: self.devel_mode,
            dist_native: self.dist_native.clone().filter(|dist| !dist.trim().is_empty()),
        }
    }
}
