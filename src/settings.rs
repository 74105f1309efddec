use eyre::{eyre, Result};
use log::{debug, error};
use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::image_filter::ImageTagFilters;

pub const FILTERS_ENV: &str = "soci_repository_image_tag_filters";
pub const LAMBDA_ARN_ENV: &str = "soci_index_generator_lambda_arn";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable; expected a comma separated list")]
    MissingFilters,
    #[error("Invalid SOCI repository image tag filter \"{0}\"")]
    InvalidFilter(String),
    #[error("Invalid environment variable; expected the SOCI index generator Lambda function ARN")]
    MissingLambdaArn,
}

/// Split a comma separated filter list exactly as written; entries are not trimmed.
pub fn split_filter_list(list: &str) -> Vec<String> {
    list.split(',').map(str::to_string).collect()
}

fn deserialize_filters<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    struct FiltersVisitor;

    impl<'de> Visitor<'de> for FiltersVisitor {
        type Value = Option<Vec<String>>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a comma separated string of filters or a list of filters")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(split_filter_list(value)))
        }

        fn visit_seq<M>(self, mut seq: M) -> Result<Self::Value, M::Error>
        where
            M: SeqAccess<'de>,
        {
            let mut filters = Vec::new();
            while let Some(filter) = seq.next_element::<String>()? {
                filters.push(filter);
            }
            Ok(Some(filters))
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(FiltersVisitor)
}

/// Optional YAML configuration file.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default, deserialize_with = "deserialize_filters")]
    pub filters: Option<Vec<String>>,
    pub lambda_arn: Option<String>,
    pub endpoint_url: Option<String>,
}

pub fn load_config(path: &Path) -> Result<FileConfig> {
    debug!("Loading configuration from {:?}", path);

    let content = fs::read_to_string(path).map_err(|e| {
        error!("Failed to read config file {}: {}", path.display(), e);
        eyre!("Failed to read config file {}: {}", path.display(), e)
    })?;

    let config: FileConfig = serde_yaml::from_str(&content).map_err(|e| {
        error!("Failed to parse YAML: {}", e);
        eyre!("Failed to parse YAML: {}", e)
    })?;

    debug!("Parsed config: {:?}", config);
    Ok(config)
}

/// Resolved configuration; fixed for the life of the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    filters: Option<Vec<String>>,
    lambda_arn: Option<String>,
}

impl Settings {
    pub fn new(filters: Option<Vec<String>>, lambda_arn: Option<String>) -> Self {
        Self { filters, lambda_arn }
    }

    /// Command line and environment values win over the file.
    pub fn merge(
        cli_filters: Option<String>,
        cli_lambda_arn: Option<String>,
        file: FileConfig,
    ) -> Self {
        Self::new(
            cli_filters.map(|list| split_filter_list(&list)).or(file.filters),
            cli_lambda_arn.or(file.lambda_arn),
        )
    }

    pub fn image_tag_filters(&self) -> Result<ImageTagFilters, ConfigError> {
        let patterns = self.filters.as_ref().ok_or(ConfigError::MissingFilters)?;
        ImageTagFilters::new(patterns).map_err(|(pattern, e)| {
            debug!("Filter {:?} failed to compile: {}", pattern, e);
            ConfigError::InvalidFilter(pattern)
        })
    }

    pub fn lambda_arn(&self) -> Result<&str, ConfigError> {
        self.lambda_arn
            .as_deref()
            .filter(|arn| !arn.is_empty())
            .ok_or(ConfigError::MissingLambdaArn)
    }
}
