//! Environment variable source: CATALOG__* prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

/// Add environment variable overlay to builder.
/// `CATALOG__SOURCE__BASE_URL` maps to `source.base_url`.
pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("CATALOG")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    )
}
