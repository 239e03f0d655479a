mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, Index, Rebuild, Service, Source, Storage, SyncSchedule, Usage};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.dir.as_os_str().is_empty() {
		return Err(Error::Validation { message: "storage.dir must be non-empty.".to_string() });
	}

	validate_source(cfg)?;

	for (label, weight) in [
		("index.name_weight", cfg.index.name_weight),
		("index.type_weight", cfg.index.type_weight),
		("index.path_weight", cfg.index.path_weight),
		("index.recency_weight", cfg.index.recency_weight),
		("index.frequency_weight", cfg.index.frequency_weight),
		("index.fuzzy_ratio", cfg.index.fuzzy_ratio),
	] {
		if !weight.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if weight < 0.0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}

	if cfg.index.name_weight + cfg.index.type_weight + cfg.index.path_weight <= 0.0 {
		return Err(Error::Validation {
			message: "At least one index field weight must be greater than zero.".to_string(),
		});
	}
	if !cfg.index.recency_tau_days.is_finite() || cfg.index.recency_tau_days <= 0.0 {
		return Err(Error::Validation {
			message: "index.recency_tau_days must be a finite number greater than zero.".to_string(),
		});
	}
	if cfg.rebuild.batch_size == 0 {
		return Err(Error::Validation {
			message: "rebuild.batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.sync.interval_ms == 0 {
		return Err(Error::Validation {
			message: "sync.interval_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.usage.max_pending == 0 {
		return Err(Error::Validation {
			message: "usage.max_pending must be greater than zero.".to_string(),
		});
	}
	if cfg.usage.check_interval_ms == 0 {
		return Err(Error::Validation {
			message: "usage.check_interval_ms must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_source(cfg: &Config) -> Result<()> {
	let source = &cfg.source;

	if !(source.api_base.starts_with("http://") || source.api_base.starts_with("https://")) {
		return Err(Error::Validation {
			message: "source.api_base must be an http or https URL.".to_string(),
		});
	}
	if source.access_token.trim().is_empty() {
		return Err(Error::Validation {
			message: "source.access_token must be non-empty.".to_string(),
		});
	}

	for (label, path) in [
		("source.auth_check_path", &source.auth_check_path),
		("source.list_path", &source.list_path),
		("source.changes_path", &source.changes_path),
		("source.start_cursor_path", &source.start_cursor_path),
	] {
		if !path.starts_with('/') {
			return Err(Error::Validation { message: format!("{label} must start with '/'.") });
		}
	}

	if source.page_size == 0 {
		return Err(Error::Validation {
			message: "source.page_size must be greater than zero.".to_string(),
		});
	}
	if source.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "source.timeout_ms must be greater than zero.".to_string(),
		});
	}

	for value in source.default_headers.values() {
		if !value.is_string() {
			return Err(Error::Validation {
				message: "source.default_headers values must be strings.".to_string(),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let trimmed = cfg.source.api_base.trim().trim_end_matches('/').to_string();

	cfg.source.api_base = trimmed;
	cfg.service.log_level = cfg.service.log_level.trim().to_string();
}
