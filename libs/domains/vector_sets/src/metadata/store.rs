use serde_json::Value;
use tracing::{debug, info, warn};

use super::model::VectorSetMetadata;
use super::validate::validate_and_correct;
use crate::commands::StoreCommand;
use crate::error::{GatewayError, GatewayResult};
use crate::parser;
use crate::store::StoreTransport;

pub const DEFAULT_CONFIG_KEY: &str = "vector-set-browser:config";

/// Where metadata records live.
///
/// Current layout: one hash at `config_key`, field `vset:{name}:metadata` per set.
/// Legacy layout: one string key `{name}_metadata` per set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataKeys {
    pub config_key: String,
}

impl MetadataKeys {
    pub fn new(config_key: impl Into<String>) -> Self {
        Self {
            config_key: config_key.into(),
        }
    }

    pub fn field(&self, set_key: &str) -> String {
        format!("vset:{}:metadata", set_key)
    }

    pub fn legacy_key(&self, set_key: &str) -> String {
        format!("{}_metadata", set_key)
    }

    pub(crate) fn read_command(&self, set_key: &str) -> StoreCommand {
        StoreCommand::new("HGET")
            .arg(&self.config_key)
            .arg(self.field(set_key))
    }
}

impl Default for MetadataKeys {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_KEY)
    }
}

/// Reads, migrates and writes per-set metadata records.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    keys: MetadataKeys,
}

impl MetadataStore {
    pub fn new(keys: MetadataKeys) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &MetadataKeys {
        &self.keys
    }

    async fn read_field(&self, transport: &dyn StoreTransport, set_key: &str) -> GatewayResult<Option<String>> {
        let reply = transport.query(&self.keys.read_command(set_key)).await?;
        parser::parse_optional_string(&reply, "metadata")
    }

    async fn write_field(&self, transport: &dyn StoreTransport, set_key: &str, json: &str) -> GatewayResult<()> {
        let command = StoreCommand::new("HSET")
            .arg(&self.keys.config_key)
            .arg(self.keys.field(set_key))
            .arg(json);
        transport.query(&command).await?;
        Ok(())
    }

    /// Copy a legacy record into the consolidated hash, then drop the legacy key.
    ///
    /// `HSETNX` makes the copy safe to repeat when an earlier delete failed. Returns the
    /// payload to use: the consolidated one if another writer got there first.
    async fn migrate_legacy(&self, transport: &dyn StoreTransport, set_key: &str, legacy: String) -> String {
        let legacy_key = self.keys.legacy_key(set_key);
        let copy = StoreCommand::new("HSETNX")
            .arg(&self.keys.config_key)
            .arg(self.keys.field(set_key))
            .arg(&legacy);

        let copied = match transport.query(&copy).await {
            Ok(reply) => parser::parse_flag(&reply, "metadata migration"),
            Err(e) => Err(e),
        };
        let payload = match copied {
            Ok(true) => legacy,
            Ok(false) => match self.read_field(transport, set_key).await {
                Ok(Some(current)) => current,
                _ => legacy,
            },
            Err(e) => {
                warn!(set = %set_key, error = %e, "Failed to copy legacy metadata, keeping legacy record");
                return legacy;
            }
        };

        match transport.query(&StoreCommand::new("DEL").arg(&legacy_key)).await {
            Ok(_) => info!(set = %set_key, legacy_key = %legacy_key, "Migrated legacy metadata"),
            Err(e) => warn!(set = %set_key, error = %e, "Failed to delete legacy metadata key"),
        }
        payload
    }

    /// Read the record for `set_key`, migrating the legacy layout and repairing it in place.
    ///
    /// A set with nothing recorded gets the default record, which is not written.
    pub async fn get(&self, transport: &dyn StoreTransport, set_key: &str) -> GatewayResult<VectorSetMetadata> {
        let stored = match self.read_field(transport, set_key).await? {
            Some(stored) => stored,
            None => {
                let legacy = transport
                    .query(&StoreCommand::new("GET").arg(self.keys.legacy_key(set_key)))
                    .await
                    .and_then(|reply| parser::parse_optional_string(&reply, "legacy metadata"));
                match legacy {
                    Ok(Some(legacy)) => self.migrate_legacy(transport, set_key, legacy).await,
                    Ok(None) => {
                        debug!(set = %set_key, "No metadata recorded, using defaults");
                        return Ok(VectorSetMetadata::default());
                    }
                    Err(e) => {
                        warn!(set = %set_key, error = %e, "Failed to read legacy metadata, using defaults");
                        return Ok(VectorSetMetadata::default());
                    }
                }
            }
        };

        let raw: Value = serde_json::from_str(&stored).unwrap_or_else(|e| {
            warn!(set = %set_key, error = %e, "Stored metadata is not valid JSON, resetting");
            Value::Null
        });
        let corrected = validate_and_correct(&raw);
        let canonical = serde_json::to_value(&corrected)?;

        if canonical != raw {
            match self.write_field(transport, set_key, &canonical.to_string()).await {
                Ok(()) => info!(set = %set_key, "Rewrote corrected metadata"),
                Err(e) => warn!(set = %set_key, error = %e, "Failed to write back corrected metadata"),
            }
        }
        Ok(corrected)
    }

    /// Validate `raw` and replace the whole record with the corrected result.
    pub async fn set(&self, transport: &dyn StoreTransport, set_key: &str, raw: &Value) -> GatewayResult<VectorSetMetadata> {
        if set_key.trim().is_empty() {
            return Err(GatewayError::validation("setKey is required"));
        }
        let corrected = validate_and_correct(raw);
        let json = serde_json::to_string(&corrected)?;
        self.write_field(transport, set_key, &json).await?;
        debug!(set = %set_key, "Stored metadata");
        Ok(corrected)
    }

    /// Remove the record; returns whether one existed.
    pub async fn delete(&self, transport: &dyn StoreTransport, set_key: &str) -> GatewayResult<bool> {
        let command = StoreCommand::new("HDEL")
            .arg(&self.keys.config_key)
            .arg(self.keys.field(set_key));
        let reply = transport.query(&command).await?;
        parser::parse_flag(&reply, "metadata delete")
    }
}
