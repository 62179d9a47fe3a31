//! Configuration loading for Cascada binaries.

use crate::error::{CascadaError, Result};
use ::clap::Parser;
use ::serde::de::DeserializeOwned;
use ::serde_json::from_reader;
use ::std::{fs::File, io::BufReader};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
/// Command line arguments for Cascada binaries.
pub struct Args {
    /// path to the config file
    #[arg(long)]
    pub config_path: String,
}

impl Args {
    /// helper function for exporting the `clap::Parser::parse` function
    pub fn parse_args() -> Self {
        Args::parse()
    }
}

/// Read a JSON config file into any deserializable config type.
pub fn load_config<C>(path: &str) -> Result<C>
where
    C: DeserializeOwned,
{
    let file = File::open(path).map_err(|e| {
        CascadaError::fail_to_load_config(
            anyhow::Error::new(e).context(format!("cannot open {}", path)),
        )
    })?;
    let reader = BufReader::new(file);
    let config = from_reader(reader).map_err(CascadaError::fail_to_load_config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CascadaErrorType;
    use ::serde::Deserialize;
    use ::std::io::Write;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct Sample {
        url: String,
        count: usize,
    }

    #[test]
    fn missing_config_file() {
        let result = load_config::<Sample>("/this/path/does/not/exist.json");
        let err = result.unwrap_err();
        assert_eq!(err.get_error_type(), CascadaErrorType::FailToLoadConfig);
        assert!(err.to_string().contains("cannot open /this/path/does/not/exist.json"));
    }

    #[test]
    fn load_config_from_file() -> anyhow::Result<()> {
        let path = std::env::temp_dir().join(format!("cascada-config-{}.json", std::process::id()));
        {
            let mut file = File::create(&path)?;
            write!(file, r#"{{"url": "http://localhost:8088", "count": 3}}"#)?;
        }
        let config: Sample = load_config(path.to_str().unwrap())?;
        std::fs::remove_file(&path)?;
        assert_eq!(
            config,
            Sample {
                url: "http://localhost:8088".to_owned(),
                count: 3
            }
        );
        Ok(())
    }
}
