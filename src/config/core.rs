use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml, Yaml};
use serde::Serialize;
use std::path::Path;

use super::DispatchConfig;

/// Repository-level config files, checked in the working directory
const REPO_CONFIG_FILES: [&str; 3] = [
    "palin-dispatch.toml",
    "palin-dispatch.yaml",
    "palin-dispatch.yml",
];

impl DispatchConfig {
    /// Load the merged configuration.
    ///
    /// `cli_overrides` is any serializable value whose present fields take
    /// precedence over every other layer.
    pub fn load<T: Serialize>(custom_config: Option<&Path>, cli_overrides: Option<&T>) -> Result<Self> {
        let figment = Self::figment(custom_config, cli_overrides)?;
        let config: DispatchConfig = figment
            .extract()
            .context("Failed to parse configuration")?;
        config.validate()
    }

    /// Build the provider stack without extracting it
    pub fn figment<T: Serialize>(
        custom_config: Option<&Path>,
        cli_overrides: Option<&T>,
    ) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(DispatchConfig::default()));

        if let Some(path) = custom_config {
            // An explicit config replaces user and repository files
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            figment = merge_file(figment, path);
        } else {
            let user = Self::user_config_path();
            figment = merge_file(figment, &user.with_extension("toml"))
                .merge(Yaml::file(user.with_extension("yaml")))
                .merge(Yaml::file(user.with_extension("yml")));
            for name in REPO_CONFIG_FILES {
                figment = merge_file(figment, Path::new(name));
            }
        }

        figment = figment.merge(Env::prefixed("PALIN_").split("__"));

        if let Some(overrides) = cli_overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }

        Ok(figment)
    }

    fn user_config_path() -> std::path::PathBuf {
        match std::env::var("HOME") {
            Ok(home) => Path::new(&home).join(".config/palin-dispatch/config"),
            Err(_) => Path::new("~/.config/palin-dispatch/config").to_path_buf(),
        }
    }
}

/// Merge a file using the provider that matches its extension
fn merge_file(figment: Figment, path: &Path) -> Figment {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
        _ => figment.merge(Toml::file(path)),
    }
}
