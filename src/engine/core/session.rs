// Starting settings for a new editing session

use tracing::{debug, warn};

use super::error::ParseError;
use super::preset::PresetCatalog;
use super::query;
use super::settings::EncodeConfig;
use crate::config::Config;

/// Pick the settings a session starts from.
///
/// Saved user defaults win when enabled, then the "Normal" preset, then the
/// built-in defaults. A query that fails to decode is logged and skipped.
pub fn initial_config(config: &Config, catalog: &PresetCatalog) -> EncodeConfig {
    let defaults = &config.defaults;
    if defaults.use_user_defaults && !defaults.user_query.trim().is_empty() {
        match query::decode(&defaults.user_query) {
            Ok(settings) => {
                debug!("starting from saved user defaults");
                return settings;
            }
            Err(e) => warn!("saved user defaults are unreadable: {}", e),
        }
    }

    if let Some(name) = catalog.default_preset_name() {
        match catalog.decode(name) {
            Some(Ok(settings)) => {
                debug!(preset = name, "starting from default preset");
                return settings;
            }
            Some(Err(e)) => warn!(preset = name, "default preset is unreadable: {}", e),
            None => {}
        }
    }

    EncodeConfig::default()
}

/// Store `query` as the user's defaults and switch them on.
///
/// The query must decode; it is stored re-encoded in canonical form.
pub fn save_user_defaults(config: &mut Config, query_text: &str) -> Result<(), ParseError> {
    let settings = query::decode(query_text)?;
    config.defaults.user_query = query::encode(&settings);
    config.defaults.use_user_defaults = true;
    Ok(())
}
