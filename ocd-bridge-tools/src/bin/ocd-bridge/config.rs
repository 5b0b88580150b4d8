use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use figment::providers::{Data, Env, Format as _, Json, Toml, Yaml};
use figment::Figment;
use ocd_bridge::driver::{MemorySettings, OpenOcdSettings, ResetSettings};
use serde::{Deserialize, Serialize};

use crate::util::logging::LevelFilter;

/// Name of the configuration files, without extension.
const CONFIG_FILE: &str = "ocd-bridge";

/// Prefix of configuration environment variables. Nested keys are separated by
/// `__`, e.g. `OCD_BRIDGE_OPENOCD__PORT=4444`.
const ENV_PREFIX: &str = "OCD_BRIDGE_";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    #[serde(default)]
    pub log_level: Option<LevelFilter>,
    #[serde(default)]
    pub openocd: Option<OpenOcdSettings>,
    #[serde(default)]
    pub memory: Vec<MemorySettings>,
    #[serde(default)]
    pub reset: Vec<ResetSettings>,
}

impl Config {
    pub fn has_drivers(&self) -> bool {
        self.openocd.is_some() || !self.memory.is_empty() || !self.reset.is_empty()
    }
}

pub(crate) fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    // Later sources override earlier ones.
    let mut paths = Vec::new();
    if let Some(home) = directories::UserDirs::new().map(|user| user.home_dir().to_path_buf()) {
        paths.push(home);
    }
    paths.push(PathBuf::from("."));

    let default_config = serde_json::to_string_pretty(&Config::default())?;
    let mut figment = Figment::from(Data::<Json>::string(&default_config));
    for path in paths {
        figment = figment
            .merge(Toml::file(path.join(format!("{CONFIG_FILE}.toml"))))
            .merge(Json::file(path.join(format!("{CONFIG_FILE}.json"))))
            .merge(Yaml::file(path.join(format!("{CONFIG_FILE}.yaml"))))
            .merge(Yaml::file(path.join(format!("{CONFIG_FILE}.yml"))));
    }

    if let Some(file) = explicit {
        anyhow::ensure!(
            file.is_file(),
            "Configuration file {} does not exist",
            file.display()
        );

        figment = match file.extension().and_then(OsStr::to_str) {
            Some("json") => figment.merge(Json::file(file)),
            Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
            _ => figment.merge(Toml::file(file)),
        };
    }

    let config = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract::<Config>()?;

    Ok(config)
}
