//! In-memory stand-ins for the store, used by unit tests across the crate.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use redis::Value;

use crate::commands::StoreCommand;
use crate::error::{GatewayError, GatewayResult};
use crate::store::{StoreConnector, StoreTransport};

#[derive(Debug, Clone)]
struct FakeElement {
    vector: Vec<f32>,
    attributes: Option<String>,
}

#[derive(Default)]
struct FakeState {
    strings: HashMap<String, String>,
    hashes: HashMap<String, HashMap<String, String>>,
    sets: BTreeMap<String, BTreeMap<String, FakeElement>>,
    scripted: HashMap<String, Result<Value, String>>,
    log: Vec<String>,
}

/// A tiny interpreter for the subset of commands the gateway sends.
#[derive(Default)]
pub(crate) struct FakeStore {
    state: Mutex<FakeState>,
}

fn bulk(s: impl AsRef<str>) -> Value {
    Value::BulkString(s.as_ref().as_bytes().to_vec())
}

fn store_err(message: &str) -> GatewayError {
    GatewayError::Store(message.to_string())
}

fn parse_arg<T: std::str::FromStr>(token: Option<&String>) -> GatewayResult<T> {
    token
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| store_err("ERR syntax error"))
}

fn similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (1.0 + dot / (norm_a * norm_b)) / 2.0
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reply with `reply` whenever the command renders exactly as `command`.
    pub fn script(&self, command: &str, reply: Value) {
        self.state
            .lock()
            .unwrap()
            .scripted
            .insert(command.to_string(), Ok(reply));
    }

    /// Fail with a store error whenever the command renders exactly as `command`.
    pub fn script_error(&self, command: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .scripted
            .insert(command.to_string(), Err(message.to_string()));
    }

    /// Every command executed so far, rendered with single spaces.
    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn put_string(&self, key: &str, value: &str) {
        self.state
            .lock()
            .unwrap()
            .strings
            .insert(key.to_string(), value.to_string());
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.state.lock().unwrap().strings.get(key).cloned()
    }

    pub fn hash_field(&self, key: &str, field: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .hashes
            .get(key)
            .and_then(|h| h.get(field))
            .cloned()
    }

    pub fn add_element(&self, set: &str, element: &str, vector: Vec<f32>) {
        self.state
            .lock()
            .unwrap()
            .sets
            .entry(set.to_string())
            .or_default()
            .insert(
                element.to_string(),
                FakeElement {
                    vector,
                    attributes: None,
                },
            );
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.sets.contains_key(key) || state.strings.contains_key(key) || state.hashes.contains_key(key)
    }

    pub fn execute(&self, command: &StoreCommand) -> GatewayResult<Value> {
        let mut state = self.state.lock().unwrap();
        let rendered = command.to_string();
        state.log.push(rendered.clone());
        if let Some(scripted) = state.scripted.get(&rendered) {
            return scripted.clone().map_err(GatewayError::Store);
        }

        let tokens = command.tokens();
        let key = tokens.get(1).cloned().unwrap_or_default();
        match command.verb() {
            "VADD" => {
                let mut i = 2;
                if tokens.get(i).map(String::as_str) == Some("REDUCE") {
                    i += 2;
                }
                if tokens.get(i).map(String::as_str) != Some("VALUES") {
                    return Err(store_err("ERR syntax error"));
                }
                let dim: usize = parse_arg(tokens.get(i + 1))?;
                let vector = tokens[i + 2..i + 2 + dim]
                    .iter()
                    .map(|t| t.parse::<f32>().map_err(|_| store_err("ERR invalid vector")))
                    .collect::<GatewayResult<Vec<_>>>()?;
                let element = tokens
                    .get(i + 2 + dim)
                    .cloned()
                    .ok_or_else(|| store_err("ERR syntax error"))?;
                let attributes = tokens
                    .iter()
                    .position(|t| t == "SETATTR")
                    .and_then(|p| tokens.get(p + 1).cloned());

                let set = state.sets.entry(key).or_default();
                if let Some(existing) = set.values().next() {
                    if existing.vector.len() != vector.len() {
                        return Err(store_err("ERR Vector dimension mismatch"));
                    }
                }
                let inserted = !set.contains_key(&element);
                let previous = set.get(&element).and_then(|e| e.attributes.clone());
                set.insert(
                    element,
                    FakeElement {
                        vector,
                        attributes: attributes.or(previous),
                    },
                );
                Ok(Value::Int(i64::from(inserted)))
            }
            "VREM" => {
                let element = &tokens[2];
                let removed = match state.sets.get_mut(&key) {
                    Some(set) => set.remove(element).is_some(),
                    None => false,
                };
                if state.sets.get(&key).is_some_and(|s| s.is_empty()) {
                    state.sets.remove(&key);
                }
                Ok(Value::Int(i64::from(removed)))
            }
            "VSIM" => {
                let Some(set) = state.sets.get(&key) else {
                    return Ok(Value::Array(vec![]));
                };
                let query = match tokens[2].as_str() {
                    "ELE" => match set.get(&tokens[3]) {
                        Some(e) => e.vector.clone(),
                        None => return Err(store_err("ERR element not found in set")),
                    },
                    _ => {
                        let dim: usize = parse_arg(tokens.get(3))?;
                        tokens[4..4 + dim]
                            .iter()
                            .map(|t| t.parse::<f32>().unwrap_or(0.0))
                            .collect()
                    }
                };
                let count: usize = tokens
                    .iter()
                    .position(|t| t == "COUNT")
                    .map(|p| parse_arg(tokens.get(p + 1)))
                    .transpose()?
                    .unwrap_or(10);
                let mut scored: Vec<(String, f64)> = set
                    .iter()
                    .map(|(name, e)| (name.clone(), similarity(&query, &e.vector)))
                    .collect();
                scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                Ok(Value::Array(
                    scored
                        .into_iter()
                        .take(count)
                        .flat_map(|(name, score)| [bulk(name), bulk(score.to_string())])
                        .collect(),
                ))
            }
            "VLINKS" => {
                let Some(set) = state.sets.get(&key) else {
                    return Ok(Value::Nil);
                };
                let Some(target) = set.get(&tokens[2]) else {
                    return Ok(Value::Nil);
                };
                let level: Vec<Value> = set
                    .iter()
                    .filter(|(name, _)| *name != &tokens[2])
                    .flat_map(|(name, e)| {
                        [bulk(name), bulk(similarity(&target.vector, &e.vector).to_string())]
                    })
                    .collect();
                Ok(Value::Array(vec![Value::Array(level)]))
            }
            "VEMB" => Ok(state
                .sets
                .get(&key)
                .and_then(|s| s.get(&tokens[2]))
                .map(|e| Value::Array(e.vector.iter().map(|v| Value::Double(*v as f64)).collect()))
                .unwrap_or(Value::Nil)),
            "VGETATTR" => Ok(state
                .sets
                .get(&key)
                .and_then(|s| s.get(&tokens[2]))
                .and_then(|e| e.attributes.clone())
                .map(bulk)
                .unwrap_or(Value::Nil)),
            "VSETATTR" => match state.sets.get_mut(&key).and_then(|s| s.get_mut(&tokens[2])) {
                Some(element) => {
                    element.attributes = Some(tokens[3].clone()).filter(|a| !a.is_empty());
                    Ok(Value::Int(1))
                }
                None => Ok(Value::Int(0)),
            },
            "VCARD" => Ok(Value::Int(
                state.sets.get(&key).map(|s| s.len() as i64).unwrap_or(0),
            )),
            "VDIM" => state
                .sets
                .get(&key)
                .and_then(|s| s.values().next())
                .map(|e| Value::Int(e.vector.len() as i64))
                .ok_or_else(|| store_err("ERR key does not exist")),
            "VINFO" => Ok(match state.sets.get(&key) {
                Some(set) => {
                    let dim = set.values().next().map(|e| e.vector.len()).unwrap_or(0);
                    Value::Array(vec![
                        bulk("quant-type"),
                        bulk("int8"),
                        bulk("vector-dim"),
                        Value::Int(dim as i64),
                        bulk("size"),
                        Value::Int(set.len() as i64),
                        bulk("max-level"),
                        Value::Int(0),
                    ])
                }
                None => Value::Nil,
            }),
            "MEMORY" => {
                let key = &tokens[2];
                Ok(match state.sets.get(key) {
                    Some(set) => Value::Int(64 + set.values().map(|e| e.vector.len() as i64 * 4).sum::<i64>()),
                    None => Value::Nil,
                })
            }
            "EXISTS" => Ok(Value::Int(i64::from(
                state.sets.contains_key(&key)
                    || state.strings.contains_key(&key)
                    || state.hashes.contains_key(&key),
            ))),
            "DEL" => {
                let removed = state.sets.remove(&key).is_some()
                    | state.strings.remove(&key).is_some()
                    | state.hashes.remove(&key).is_some();
                Ok(Value::Int(i64::from(removed)))
            }
            "SCAN" => {
                let offset: usize = parse_arg(tokens.get(1))?;
                let keys: Vec<&String> = state.sets.keys().collect();
                let page: Vec<Value> = keys.iter().skip(offset).take(2).map(|k| bulk(k)).collect();
                let next = if offset + 2 >= keys.len() { 0 } else { offset + 2 };
                Ok(Value::Array(vec![bulk(next.to_string()), Value::Array(page)]))
            }
            "GET" => Ok(state.strings.get(&key).map(bulk).unwrap_or(Value::Nil)),
            "SET" => {
                state.strings.insert(key, tokens[2].clone());
                Ok(Value::Okay)
            }
            "HGET" => Ok(state
                .hashes
                .get(&key)
                .and_then(|h| h.get(&tokens[2]))
                .map(bulk)
                .unwrap_or(Value::Nil)),
            "HSET" => {
                let inserted = state
                    .hashes
                    .entry(key)
                    .or_default()
                    .insert(tokens[2].clone(), tokens[3].clone())
                    .is_none();
                Ok(Value::Int(i64::from(inserted)))
            }
            "HSETNX" => {
                let hash = state.hashes.entry(key).or_default();
                if hash.contains_key(&tokens[2]) {
                    return Ok(Value::Int(0));
                }
                hash.insert(tokens[2].clone(), tokens[3].clone());
                Ok(Value::Int(1))
            }
            "HDEL" => {
                let removed = state
                    .hashes
                    .get_mut(&key)
                    .map(|h| h.remove(&tokens[2]).is_some())
                    .unwrap_or(false);
                Ok(Value::Int(i64::from(removed)))
            }
            other => Err(store_err(&format!("ERR unknown command '{}'", other))),
        }
    }
}

/// A transport executing against a shared [`FakeStore`].
pub(crate) struct FakeTransport {
    store: Arc<FakeStore>,
    open: AtomicBool,
}

impl FakeTransport {
    pub fn new(store: Arc<FakeStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            open: AtomicBool::new(true),
        })
    }

    /// Simulate the server dropping the connection.
    pub fn drop_connection(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreTransport for FakeTransport {
    async fn query(&self, command: &StoreCommand) -> GatewayResult<Value> {
        if !self.is_open() {
            return Err(GatewayError::Connection("connection closed".to_string()));
        }
        self.store.execute(command)
    }

    async fn query_pipeline(&self, commands: &[StoreCommand]) -> GatewayResult<Vec<GatewayResult<Value>>> {
        if !self.is_open() {
            return Err(GatewayError::Connection("connection closed".to_string()));
        }
        Ok(commands.iter().map(|c| self.store.execute(c)).collect())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Counts connects and hands out [`FakeTransport`]s after an optional delay.
pub(crate) struct FakeConnector {
    store: Arc<FakeStore>,
    delay: Duration,
    fail: AtomicBool,
    connects: AtomicUsize,
    opened: Mutex<Vec<Arc<FakeTransport>>>,
}

impl FakeConnector {
    pub fn new(store: Arc<FakeStore>) -> Arc<Self> {
        Self::with_delay(store, Duration::ZERO)
    }

    pub fn with_delay(store: Arc<FakeStore>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            store,
            delay,
            fail: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            opened: Mutex::new(Vec::new()),
        })
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> Vec<Arc<FakeTransport>> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl StoreConnector for FakeConnector {
    async fn connect(&self, url: &str, _timeout: Duration) -> GatewayResult<Arc<dyn StoreTransport>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Connection(format!("refused: {}", url)));
        }
        let transport = FakeTransport::new(self.store.clone());
        self.opened.lock().unwrap().push(transport.clone());
        Ok(transport)
    }
}
