use serde::Deserialize;

use super::SettingsError;

/// How URLs handed to clients are protected.
#[derive(Debug, PartialEq)]
pub enum Signing {
    Hmac {
        key: String,
        /// Also demand a signature on the manifest entry point.
        require_manifest_signature: bool,
    },
    Disabled,
}

impl Signing {
    pub fn new(sources: Vec<PartialSigning>) -> Result<Self, SettingsError> {
        let merged: PartialSigning =
            sources
                .into_iter()
                .fold(Default::default(), |acc, x| PartialSigning {
                    enabled: acc.enabled.or(x.enabled),
                    key: acc.key.or(x.key),
                    require_manifest_signature: acc
                        .require_manifest_signature
                        .or(x.require_manifest_signature),
                });

        let enabled = merged
            .enabled
            .ok_or_else(|| SettingsError::MissingValue("signing.enabled".to_string()))?;

        if !enabled {
            return Ok(Signing::Disabled);
        }

        match merged.key {
            Some(key) if !key.is_empty() => Ok(Signing::Hmac {
                key,
                require_manifest_signature: merged.require_manifest_signature.unwrap_or(false),
            }),
            _ => Err(SettingsError::MissingValue("signing.key".to_string())),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialSigning {
    pub enabled: Option<bool>,
    pub key: Option<String>,
    pub require_manifest_signature: Option<bool>,
}
