//! Command construction
//!
//! Pure functions that render structured requests into the ordered token list the
//! store expects. Nothing here touches the network: invalid parameters are rejected
//! with [`GatewayError::Validation`] and no command is produced.
//!
//! Grammar (optional parts in brackets, order fixed):
//!
//! ```text
//! VADD     key [REDUCE n] VALUES dim v1..vn element [SETATTR json] [CAS] [Q8|BIN|NOQUANT] [EF n] [M n]
//! VSIM     key (VALUES dim v1..vn | ELE element) [FILTER expr] WITHSCORES COUNT n [EF n]
//! VLINKS   key element WITHSCORES
//! ```

use std::fmt;

use crate::error::{GatewayError, GatewayResult};
use crate::metadata::StoreParameters;
use crate::models::{AddRequest, SimRequest};

/// Value type name used to filter `SCAN`.
pub const VECTOR_SET_TYPE: &str = "vectorset";

/// Element inserted when a vector set is created, since the store has no empty sets.
pub const PLACEHOLDER_ELEMENT: &str = "Placeholder (Vector)";

/// An ordered list of protocol tokens, verb first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCommand {
    tokens: Vec<String>,
}

impl StoreCommand {
    pub fn new(verb: &str) -> Self {
        Self {
            tokens: vec![verb.to_string()],
        }
    }

    pub fn arg(mut self, token: impl ToString) -> Self {
        self.tokens.push(token.to_string());
        self
    }

    fn push(&mut self, token: impl ToString) {
        self.tokens.push(token.to_string());
    }

    fn push_values(&mut self, vector: &[f32]) {
        self.push("VALUES");
        self.push(vector.len());
        for component in vector {
            self.push(component);
        }
    }

    pub fn verb(&self) -> &str {
        &self.tokens[0]
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<String> {
        self.tokens
    }

    /// Convert into a `redis::Cmd` ready to be sent or pipelined.
    pub fn to_redis(&self) -> redis::Cmd {
        let mut cmd = redis::cmd(self.verb());
        for token in &self.tokens[1..] {
            cmd.arg(token);
        }
        cmd
    }
}

impl fmt::Display for StoreCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

fn require(field: &str, value: &str) -> GatewayResult<()> {
    if value.trim().is_empty() {
        return Err(GatewayError::validation(format!("{} is required", field)));
    }
    Ok(())
}

fn require_positive(field: &str, value: Option<u32>) -> GatewayResult<()> {
    if value == Some(0) {
        return Err(GatewayError::validation(format!(
            "{} must be greater than zero",
            field
        )));
    }
    Ok(())
}

pub fn validate_set_key(set_key: &str) -> GatewayResult<()> {
    require("setKey", set_key)
}

/// Reject empty vectors and components that are not finite numbers.
pub fn validate_vector(vector: &[f32]) -> GatewayResult<()> {
    if vector.is_empty() {
        return Err(GatewayError::validation("vector must not be empty"));
    }
    if let Some(index) = vector.iter().position(|v| !v.is_finite()) {
        return Err(GatewayError::validation(format!(
            "vector component {} is not a finite number",
            index
        )));
    }
    Ok(())
}

/// Check a vector against the dimensionality its embedding configuration implies.
pub fn validate_dimension(vector: &[f32], expected: Option<usize>) -> GatewayResult<()> {
    match expected {
        Some(expected) if expected != vector.len() => Err(GatewayError::DimensionMismatch {
            expected,
            actual: vector.len(),
        }),
        _ => Ok(()),
    }
}

/// Attributes must be valid JSON; an empty string clears them.
pub fn validate_attributes(attributes: &str) -> GatewayResult<()> {
    if attributes.is_empty() {
        return Ok(());
    }
    serde_json::from_str::<serde_json::Value>(attributes)
        .map(|_| ())
        .map_err(|e| GatewayError::validation(format!("attributes are not valid JSON: {}", e)))
}

pub fn build_add(request: &AddRequest) -> GatewayResult<StoreCommand> {
    require("setKey", &request.set_key)?;
    require("element", &request.element)?;
    validate_vector(&request.vector)?;
    require_positive("reduceDimensions", request.reduce_dimensions)?;
    require_positive("buildExplorationFactor", request.build_exploration_factor)?;
    require_positive("maxConnections", request.max_connections)?;
    if let Some(attributes) = &request.attributes {
        validate_attributes(attributes)?;
    }

    let mut command = StoreCommand::new("VADD").arg(&request.set_key);
    if let Some(reduce) = request.reduce_dimensions {
        command.push("REDUCE");
        command.push(reduce);
    }
    command.push_values(&request.vector);
    command.push(&request.element);
    if let Some(attributes) = request.attributes.as_deref().filter(|a| !a.is_empty()) {
        command.push("SETATTR");
        command.push(attributes);
    }
    if request.use_cas {
        command.push("CAS");
    }
    if let Some(quantization) = request.quantization {
        command.push(quantization.token());
    }
    if let Some(ef) = request.build_exploration_factor {
        command.push("EF");
        command.push(ef);
    }
    if let Some(m) = request.max_connections {
        command.push("M");
        command.push(m);
    }
    Ok(command)
}

pub fn build_sim(request: &SimRequest) -> GatewayResult<StoreCommand> {
    require("setKey", &request.set_key)?;
    if request.count == 0 {
        return Err(GatewayError::validation("count must be greater than zero"));
    }
    require_positive("searchExplorationFactor", request.search_exploration_factor)?;

    let mut command = StoreCommand::new("VSIM").arg(&request.set_key);
    match (&request.search_vector, &request.search_element) {
        (Some(vector), None) => {
            validate_vector(vector)?;
            command.push_values(vector);
        }
        (None, Some(element)) => {
            require("searchElement", element)?;
            command.push("ELE");
            command.push(element);
        }
        (Some(_), Some(_)) => {
            return Err(GatewayError::validation(
                "provide either searchVector or searchElement, not both",
            ));
        }
        (None, None) => {
            return Err(GatewayError::validation(
                "either searchVector or searchElement is required",
            ));
        }
    }
    if let Some(filter) = request.filter.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        command.push("FILTER");
        command.push(filter);
    }
    command.push("WITHSCORES");
    command.push("COUNT");
    command.push(request.count);
    if let Some(ef) = request.search_exploration_factor {
        command.push("EF");
        command.push(ef);
    }
    Ok(command)
}

pub fn build_links(set_key: &str, element: &str) -> GatewayResult<StoreCommand> {
    require("setKey", set_key)?;
    require("element", element)?;
    Ok(StoreCommand::new("VLINKS")
        .arg(set_key)
        .arg(element)
        .arg("WITHSCORES"))
}

pub fn build_remove(set_key: &str, element: &str) -> GatewayResult<StoreCommand> {
    require("setKey", set_key)?;
    require("element", element)?;
    Ok(StoreCommand::new("VREM").arg(set_key).arg(element))
}

pub fn build_emb(set_key: &str, element: &str) -> GatewayResult<StoreCommand> {
    require("setKey", set_key)?;
    require("element", element)?;
    Ok(StoreCommand::new("VEMB").arg(set_key).arg(element))
}

pub fn build_get_attr(set_key: &str, element: &str) -> GatewayResult<StoreCommand> {
    require("setKey", set_key)?;
    require("element", element)?;
    Ok(StoreCommand::new("VGETATTR").arg(set_key).arg(element))
}

pub fn build_set_attr(set_key: &str, element: &str, attributes: &str) -> GatewayResult<StoreCommand> {
    require("setKey", set_key)?;
    require("element", element)?;
    validate_attributes(attributes)?;
    Ok(StoreCommand::new("VSETATTR")
        .arg(set_key)
        .arg(element)
        .arg(attributes))
}

pub fn build_info(set_key: &str) -> GatewayResult<StoreCommand> {
    require("setKey", set_key)?;
    Ok(StoreCommand::new("VINFO").arg(set_key))
}

pub fn build_dim(set_key: &str) -> GatewayResult<StoreCommand> {
    require("setKey", set_key)?;
    Ok(StoreCommand::new("VDIM").arg(set_key))
}

pub fn build_card(set_key: &str) -> GatewayResult<StoreCommand> {
    require("setKey", set_key)?;
    Ok(StoreCommand::new("VCARD").arg(set_key))
}

pub fn build_memory_usage(set_key: &str) -> GatewayResult<StoreCommand> {
    require("setKey", set_key)?;
    Ok(StoreCommand::new("MEMORY").arg("USAGE").arg(set_key))
}

pub fn build_exists(key: &str) -> GatewayResult<StoreCommand> {
    require("setKey", key)?;
    Ok(StoreCommand::new("EXISTS").arg(key))
}

pub fn build_delete(key: &str) -> GatewayResult<StoreCommand> {
    require("setKey", key)?;
    Ok(StoreCommand::new("DEL").arg(key))
}

/// One page of a key scan restricted to vector sets; start with cursor `"0"`.
pub fn build_scan(cursor: &str) -> StoreCommand {
    StoreCommand::new("SCAN")
        .arg(cursor)
        .arg("TYPE")
        .arg(VECTOR_SET_TYPE)
}

/// Vector inserted as the placeholder element: a unit vector along the first axis.
pub fn placeholder_vector(dimensions: u32) -> Vec<f32> {
    let mut vector = vec![0.0; dimensions as usize];
    if let Some(first) = vector.first_mut() {
        *first = 1.0;
    }
    vector
}

/// Creating a vector set is an add of the placeholder element with the set's build parameters.
pub fn build_create(
    set_key: &str,
    dimensions: u32,
    parameters: Option<&StoreParameters>,
) -> GatewayResult<StoreCommand> {
    if dimensions == 0 {
        return Err(GatewayError::validation("dimensions must be greater than zero"));
    }

    let mut request = AddRequest::new(set_key, PLACEHOLDER_ELEMENT, placeholder_vector(dimensions));
    if let Some(parameters) = parameters {
        request.reduce_dimensions = parameters.reduce_dimensions;
        request.use_cas = parameters.default_cas.unwrap_or(false);
        request.quantization = parameters.quantization;
        request.build_exploration_factor = parameters.build_exploration_factor;
        request.max_connections = parameters.max_connections;
    }
    build_add(&request)
}
