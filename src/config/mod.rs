//! Configuration loading.
//!
//! A config document lists components per kind; every component entry names
//! its variant with `type`, its instance with `tag`, and the remaining
//! fields form the options payload handed to whatever constructor the
//! compiled profile resolves for that type.

mod types;

pub use types::{ComponentEntry, Config};

/// Load configuration files from the provided paths and merge them into one
/// document.
pub async fn load_configs(paths: &[String]) -> std::io::Result<Config> {
    let mut merged = Config::default();
    for path in paths {
        let config_bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("could not read config file {path}: {e}"),
                ));
            }
        };

        let config = match serde_yaml::from_slice::<Config>(&config_bytes) {
            Ok(c) => c,
            Err(e) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("could not parse config file {path}: {e}"),
                ));
            }
        };
        merged.merge(config);
    }

    Ok(merged)
}
