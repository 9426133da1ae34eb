use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// What the runtime does when a lifecycle hook fails or times out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookErrorPolicy {
	/// Log the failure and carry on with the lifecycle transition.
	#[default]
	BestEffort,
	/// Abort startup on `pre_start`/`post_start` failure and report
	/// stop-phase failures through the Stop reply.
	FailFast,
}

/// Fully resolved settings for one actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorSettings {
	/// Mailbox capacity used when the definition does not set one.
	pub queue_capacity: usize,
	pub pre_start_timeout: Duration,
	pub post_start_timeout: Duration,
	pub pre_stop_timeout: Duration,
	pub post_stop_timeout: Duration,
	/// Slack a stopping parent grants each child on top of the child's own
	/// stop hooks, async drain and descendants.
	pub stop_timeout: Duration,
	/// Bound on subscribe/unsubscribe round-trips to the pub/sub actor.
	pub subscription_timeout: Duration,
	/// In-flight dispatch limit for async actors. `None` means the queue capacity.
	pub async_concurrency: Option<usize>,
	pub hook_errors: HookErrorPolicy,
}

impl Default for ActorSettings {
	fn default() -> Self {
		Self {
			queue_capacity: 1000,
			pre_start_timeout: Duration::from_secs(5),
			post_start_timeout: Duration::from_secs(5),
			pre_stop_timeout: Duration::from_secs(5),
			post_stop_timeout: Duration::from_secs(5),
			stop_timeout: Duration::from_secs(5),
			subscription_timeout: Duration::from_secs(2),
			async_concurrency: None,
			hook_errors: HookErrorPolicy::BestEffort,
		}
	}
}

impl ActorSettings {
	/// Effective async dispatch limit.
	pub fn dispatch_limit(&self, queue_capacity: usize) -> usize {
		self.async_concurrency.unwrap_or(queue_capacity).max(1)
	}
}

/// Partial settings applied on top of the defaults for one path scope.
///
/// Field names mirror the TOML keys; durations are written in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ActorOverrides {
	pub queue_capacity: Option<usize>,
	pub pre_start_timeout_ms: Option<u64>,
	pub post_start_timeout_ms: Option<u64>,
	pub pre_stop_timeout_ms: Option<u64>,
	pub post_stop_timeout_ms: Option<u64>,
	pub stop_timeout_ms: Option<u64>,
	pub subscription_timeout_ms: Option<u64>,
	pub async_concurrency: Option<usize>,
	pub hook_errors: Option<HookErrorPolicy>,
}

impl ActorOverrides {
	fn validate(&self) -> Result<()> {
		if self.queue_capacity == Some(0) {
			return Err(ConfigError::InvalidValue {
				field: "queue-capacity",
				reason: "must be greater than zero".into(),
			});
		}
		if self.async_concurrency == Some(0) {
			return Err(ConfigError::InvalidValue {
				field: "async-concurrency",
				reason: "must be greater than zero".into(),
			});
		}
		Ok(())
	}

	fn apply(&self, settings: &mut ActorSettings) {
		let ms = Duration::from_millis;
		if let Some(capacity) = self.queue_capacity {
			settings.queue_capacity = capacity;
		}
		if let Some(v) = self.pre_start_timeout_ms {
			settings.pre_start_timeout = ms(v);
		}
		if let Some(v) = self.post_start_timeout_ms {
			settings.post_start_timeout = ms(v);
		}
		if let Some(v) = self.pre_stop_timeout_ms {
			settings.pre_stop_timeout = ms(v);
		}
		if let Some(v) = self.post_stop_timeout_ms {
			settings.post_stop_timeout = ms(v);
		}
		if let Some(v) = self.stop_timeout_ms {
			settings.stop_timeout = ms(v);
		}
		if let Some(v) = self.subscription_timeout_ms {
			settings.subscription_timeout = ms(v);
		}
		if let Some(limit) = self.async_concurrency {
			settings.async_concurrency = Some(limit);
		}
		if let Some(policy) = self.hook_errors {
			settings.hook_errors = policy;
		}
	}
}

/// Settings for a whole actor system.
///
/// Built once and handed to the system at startup. Per-actor values are
/// resolved with [`Settings::actor`], which layers path-scoped overrides from
/// the root down to the exact actor path.
#[derive(Debug, Clone)]
pub struct Settings {
	defaults: ActorSettings,
	overrides: BTreeMap<String, ActorOverrides>,
	termination_timeout: Duration,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			defaults: ActorSettings::default(),
			overrides: BTreeMap::new(),
			termination_timeout: Duration::from_secs(10),
		}
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct SettingsFile {
	termination_timeout_ms: Option<u64>,
	#[serde(default)]
	actor: ActorOverrides,
	#[serde(default)]
	actors: BTreeMap<String, ActorOverrides>,
}

impl Settings {
	/// Parses settings from a TOML document.
	///
	/// ```toml
	/// termination-timeout-ms = 10000
	///
	/// [actor]
	/// queue-capacity = 1000
	/// hook-errors = "best-effort"
	///
	/// [actors."/usr/ticker"]
	/// queue-capacity = 4
	/// ```
	pub fn from_toml_str(input: &str) -> Result<Self> {
		let file: SettingsFile = toml::from_str(input)?;
		file.actor.validate()?;

		let mut settings = Self::default();
		file.actor.apply(&mut settings.defaults);
		if let Some(ms) = file.termination_timeout_ms {
			settings.termination_timeout = Duration::from_millis(ms);
		}
		for (path, overrides) in file.actors {
			settings = settings.with_override(&path, overrides)?;
		}
		Ok(settings)
	}

	/// Reads and parses a TOML settings file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}

	/// Replaces the defaults every actor starts from.
	pub fn with_defaults(mut self, defaults: ActorSettings) -> Self {
		self.defaults = defaults;
		self
	}

	/// Registers overrides for `path` and everything below it.
	pub fn with_override(mut self, path: &str, overrides: ActorOverrides) -> Result<Self> {
		overrides.validate()?;
		let key = normalize_path(path)?;
		self.overrides.insert(key, overrides);
		Ok(self)
	}

	pub fn with_termination_timeout(mut self, timeout: Duration) -> Self {
		self.termination_timeout = timeout;
		self
	}

	pub fn defaults(&self) -> &ActorSettings {
		&self.defaults
	}

	/// Upper bound on a whole-system shutdown.
	pub fn termination_timeout(&self) -> Duration {
		self.termination_timeout
	}

	/// Resolves the settings for the actor at `path`.
	///
	/// Overrides apply from the least to the most specific scope: `/`, then
	/// each ancestor prefix, then the exact path.
	pub fn actor(&self, path: &str) -> ActorSettings {
		let mut resolved = self.defaults.clone();
		for scope in scopes(path) {
			if let Some(overrides) = self.overrides.get(scope) {
				overrides.apply(&mut resolved);
			}
		}
		resolved
	}
}

fn normalize_path(path: &str) -> Result<String> {
	if !path.starts_with('/') {
		return Err(ConfigError::InvalidPath(path.to_string()));
	}
	let trimmed = path.trim_end_matches('/');
	if trimmed.is_empty() {
		return Ok("/".to_string());
	}
	Ok(trimmed.to_string())
}

fn scopes(path: &str) -> Vec<&str> {
	let trimmed = path.trim_end_matches('/');
	let mut scopes = vec!["/"];
	scopes.extend(trimmed.match_indices('/').filter(|(idx, _)| *idx > 0).map(|(idx, _)| &trimmed[..idx]));
	if !trimmed.is_empty() {
		scopes.push(trimmed);
	}
	scopes
}
