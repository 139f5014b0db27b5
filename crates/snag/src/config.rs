// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client configuration.
//!
//! Layering, lowest precedence first:
//! - built-in defaults
//! - a TOML file or string
//! - `SNAG_*` environment variables

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default release stage when none is configured.
pub const DEFAULT_RELEASE_STAGE: &str = "production";
/// Default number of breadcrumbs kept by the client.
pub const DEFAULT_MAX_BREADCRUMBS: usize = 25;
/// Upper bound accepted for `max_breadcrumbs`.
pub const MAX_BREADCRUMBS_LIMIT: usize = 100;

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
	/// Project API key sent with every payload.
	pub api_key: String,
	pub app_version: Option<String>,
	pub app_type: Option<String>,
	pub release_stage: String,
	/// Release stages that report events. `None` reports from every stage.
	pub enabled_release_stages: Option<Vec<String>>,
	/// Start a session automatically when the client is built.
	pub auto_track_sessions: bool,
	pub send_threads: bool,
	/// Method prefixes that mark a stack frame as project code.
	pub project_packages: Option<Vec<String>>,
	/// Error classes that are never reported.
	pub ignore_classes: Vec<String>,
	/// Metadata keys whose values are replaced before sending.
	pub redacted_keys: Vec<String>,
	pub max_breadcrumbs: usize,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			api_key: String::new(),
			app_version: None,
			app_type: None,
			release_stage: DEFAULT_RELEASE_STAGE.to_string(),
			enabled_release_stages: None,
			auto_track_sessions: true,
			send_threads: true,
			project_packages: None,
			ignore_classes: Vec::new(),
			redacted_keys: vec!["password".to_string()],
			max_breadcrumbs: DEFAULT_MAX_BREADCRUMBS,
		}
	}
}

impl ClientConfig {
	pub fn new(api_key: impl Into<String>) -> Self {
		Self {
			api_key: api_key.into(),
			..Default::default()
		}
	}

	pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(text)?)
	}

	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let text = std::fs::read_to_string(path)?;
		toml::from_str(&text).map_err(|source| ConfigError::TomlParse {
			path: path.to_path_buf(),
			source,
		})
	}

	/// Loads the optional file, applies the environment and validates.
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		let config = match path {
			Some(path) => Self::from_file(path)?,
			None => Self::default(),
		};
		let config = config.apply_env()?;
		config.validate()?;
		Ok(config)
	}

	/// Overrides fields from `SNAG_*` environment variables.
	pub fn apply_env(self) -> Result<Self, ConfigError> {
		self.apply_env_from(|name| std::env::var(name).ok())
	}

	/// Overrides fields from variables resolved by `lookup`.
	pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(api_key) = lookup("SNAG_API_KEY") {
			self.api_key = api_key;
		}
		if let Some(version) = lookup("SNAG_APP_VERSION") {
			self.app_version = Some(version);
		}
		if let Some(app_type) = lookup("SNAG_APP_TYPE") {
			self.app_type = Some(app_type);
		}
		if let Some(stage) = lookup("SNAG_RELEASE_STAGE") {
			self.release_stage = stage;
		}
		if let Some(stages) = lookup("SNAG_ENABLED_RELEASE_STAGES") {
			self.enabled_release_stages = Some(split_list(&stages));
		}
		if let Some(value) = lookup("SNAG_AUTO_TRACK_SESSIONS") {
			self.auto_track_sessions = parse_flag(&value);
		}
		if let Some(value) = lookup("SNAG_SEND_THREADS") {
			self.send_threads = parse_flag(&value);
		}
		if let Some(value) = lookup("SNAG_MAX_BREADCRUMBS") {
			self.max_breadcrumbs = value.trim().parse().map_err(|e| {
				ConfigError::invalid_value("SNAG_MAX_BREADCRUMBS", format!("{e}"))
			})?;
		}
		Ok(self)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.api_key.trim().is_empty() {
			return Err(ConfigError::missing_field("api_key"));
		}
		if self.release_stage.trim().is_empty() {
			return Err(ConfigError::invalid_value(
				"release_stage",
				"must not be empty",
			));
		}
		if self.max_breadcrumbs > MAX_BREADCRUMBS_LIMIT {
			return Err(ConfigError::invalid_value(
				"max_breadcrumbs",
				format!("must be at most {MAX_BREADCRUMBS_LIMIT}"),
			));
		}
		Ok(())
	}

	/// Whether events from the configured release stage are reported.
	pub fn should_notify_for_release_stage(&self) -> bool {
		self.enabled_release_stages
			.as_ref()
			.map_or(true, |stages| stages.iter().any(|stage| *stage == self.release_stage))
	}

	pub fn should_ignore_class(&self, error_class: &str) -> bool {
		self.ignore_classes.iter().any(|class| class == error_class)
	}
}

fn parse_flag(value: &str) -> bool {
	value != "0" && !value.eq_ignore_ascii_case("false")
}

fn split_list(value: &str) -> Vec<String> {
	value
		.split(',')
		.map(str::trim)
		.filter(|item| !item.is_empty())
		.map(str::to_string)
		.collect()
}
