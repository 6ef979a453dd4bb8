//! Pipelined multi-element fetches
//!
//! One command per element goes out in a single round trip on one transport. Results keep
//! the caller's element order; an element whose reply is nil or malformed is omitted rather
//! than replaced with a placeholder, so callers must match results by element name.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::commands::{self, StoreCommand};
use crate::error::{GatewayError, GatewayResult};
use crate::metrics;
use crate::models::ElementVector;
use crate::parser;
use crate::store::StoreTransport;

/// Commands joined the way they are reported in `executedCommand`.
pub fn describe(commands: &[StoreCommand]) -> String {
    commands
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

async fn run_pipeline(
    transport: &dyn StoreTransport,
    commands: &[StoreCommand],
) -> GatewayResult<Vec<GatewayResult<redis::Value>>> {
    let replies = transport.query_pipeline(commands).await?;
    if replies.len() != commands.len() {
        return Err(GatewayError::protocol(format!(
            "pipeline of {} commands returned {} replies",
            commands.len(),
            replies.len()
        )));
    }
    Ok(replies)
}

pub fn vector_commands(set_key: &str, elements: &[String]) -> GatewayResult<Vec<StoreCommand>> {
    elements
        .iter()
        .map(|element| commands::build_emb(set_key, element))
        .collect()
}

/// Fetch the vectors of `elements` in one round trip.
pub async fn fetch_vectors(
    transport: &dyn StoreTransport,
    set_key: &str,
    elements: &[String],
) -> GatewayResult<Vec<ElementVector>> {
    if elements.is_empty() {
        return Ok(Vec::new());
    }
    let commands = vector_commands(set_key, elements)?;
    let replies = run_pipeline(transport, &commands).await?;

    let mut vectors = Vec::with_capacity(elements.len());
    for (element, reply) in elements.iter().zip(replies) {
        match reply.and_then(|reply| parser::parse_vector(&reply)) {
            Ok(Some(vector)) => vectors.push(ElementVector {
                element: element.clone(),
                vector,
            }),
            Ok(None) => debug!(set = %set_key, element = %element, "Element has no vector"),
            Err(e) => {
                warn!(set = %set_key, element = %element, error = %e, "Omitting element with failed or malformed vector reply");
                metrics::lenient_skip("emb_batch");
            }
        }
    }
    Ok(vectors)
}

/// Fetch the attributes of `elements` in one round trip; elements without attributes are absent.
pub async fn fetch_attributes(
    transport: &dyn StoreTransport,
    set_key: &str,
    elements: &[String],
) -> GatewayResult<HashMap<String, String>> {
    if elements.is_empty() {
        return Ok(HashMap::new());
    }
    let commands = elements
        .iter()
        .map(|element| commands::build_get_attr(set_key, element))
        .collect::<GatewayResult<Vec<_>>>()?;
    let replies = run_pipeline(transport, &commands).await?;

    let mut attributes = HashMap::with_capacity(elements.len());
    for (element, reply) in elements.iter().zip(replies) {
        match reply.and_then(|reply| parser::parse_optional_string(&reply, "getattr")) {
            Ok(Some(json)) => {
                attributes.insert(element.clone(), json);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(set = %set_key, element = %element, error = %e, "Omitting failed or malformed attribute reply");
                metrics::lenient_skip("getattr_batch");
            }
        }
    }
    Ok(attributes)
}
