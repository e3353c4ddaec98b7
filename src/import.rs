use crate::config;
use crate::document::Document;
use crate::models::Collection;
use crate::sink::DocumentSink;
use anyhow::{bail, Context, Result};
use neo4rs::{query, BoltList, BoltMap, BoltString, BoltType, Graph};
use serde_json::Value;
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// `{label}` is replaced with the collection's node label at runtime.
const CYPHER_CREATE_BATCH: &str = "UNWIND $docs AS doc CREATE (n:{label}) SET n = doc";

const CYPHER_CREATE_ID_INDEX: &str =
    "CREATE INDEX {index} IF NOT EXISTS FOR (n:{label}) ON (n._id)";

const CYPHER_DELETE_LABEL: &str = "MATCH (n:{label}) CALL { WITH n DETACH DELETE n } IN TRANSACTIONS OF 10000 ROWS";

pub struct ImportConfig {
    pub bolt_uri: String,
    pub user: String,
    pub password: String,
    /// Delete existing nodes of every collection label before loading
    pub clean: bool,
}

/// Loads documents into Neo4j, one node label per collection.
///
/// Map-valued fields (postal admin names) cannot be node properties and are
/// stored as JSON strings.
pub struct Neo4jSink {
    runtime: Runtime,
    graph: Graph,
}

impl Neo4jSink {
    pub fn connect(config: &ImportConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("geodump-import-worker")
            .enable_io()
            .enable_time()
            .build()
            .context("Failed to start tokio runtime")?;

        info!(uri = %config.bolt_uri, "Connecting to Neo4j");
        let graph = runtime.block_on(connect_with_retry(config))?;
        let sink = Self { runtime, graph };

        if config.clean {
            for collection in crate::pipeline::stage_order() {
                let cypher = CYPHER_DELETE_LABEL.replace("{label}", collection.label());
                sink.run_cypher(&cypher)?;
                info!(label = collection.label(), "Cleared existing nodes");
            }
        }
        Ok(sink)
    }

    fn run_cypher(&self, cypher: &str) -> Result<()> {
        self.runtime.block_on(run_cypher(&self.graph, cypher))
    }
}

impl DocumentSink for Neo4jSink {
    fn insert_batch(&mut self, collection: Collection, docs: &[Document]) -> Result<()> {
        let mut list = BoltList::new();
        for doc in docs {
            let value = serde_json::to_value(doc)
                .with_context(|| format!("Failed to serialize {collection} document"))?;
            list.push(to_bolt(&value));
        }

        let cypher = CYPHER_CREATE_BATCH.replace("{label}", collection.label());
        let q = query(&cypher).param("docs", BoltType::List(list));
        self.runtime
            .block_on(self.graph.run(q))
            .with_context(|| format!("Failed to load {} {collection} documents", docs.len()))?;
        debug!(collection = %collection, size = docs.len(), "Batch loaded");
        Ok(())
    }

    fn finish_collection(&mut self, collection: Collection) -> Result<()> {
        let cypher = CYPHER_CREATE_ID_INDEX
            .replace("{index}", &format!("{}_id", collection.name()))
            .replace("{label}", collection.label());
        self.run_cypher(&cypher)?;
        info!(label = collection.label(), "Id index created");
        Ok(())
    }
}

/// Converts a serialized document into a Bolt value.
fn to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Bool(b) => BoltType::from(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::from(i),
            None => BoltType::from(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => BoltType::from(s.as_str()),
        Value::Array(items) => {
            let mut list = BoltList::new();
            for item in items.iter().filter(|v| !v.is_null()) {
                list.push(to_bolt(item));
            }
            BoltType::List(list)
        }
        Value::Object(fields) => {
            let mut map = BoltMap::new();
            for (key, field) in fields {
                match field {
                    Value::Null => {}
                    Value::Object(_) => map.put(BoltString::from(key.as_str()), BoltType::from(field.to_string())),
                    _ => map.put(BoltString::from(key.as_str()), to_bolt(field)),
                }
            }
            BoltType::Map(map)
        }
        Value::Null => BoltType::from(String::new()),
    }
}

async fn connect_with_retry(config: &ImportConfig) -> Result<Graph> {
    let max_retries = config::IMPORT_MAX_RETRIES;
    let delay = tokio::time::Duration::from_secs(config::IMPORT_RETRY_DELAY_SECS);

    for attempt in 1..=max_retries {
        match Graph::new(&config.bolt_uri, &config.user, &config.password) {
            Ok(graph) => match graph.run(query("RETURN 1;")).await {
                Ok(_) => return Ok(graph),
                Err(e) if attempt < max_retries => {
                    info!(attempt, "Connection test failed, retrying: {e}");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(e).context(format!(
                        "Cannot connect to Neo4j at {} after {max_retries} attempts",
                        config.bolt_uri
                    ));
                }
            },
            Err(e) if attempt < max_retries => {
                info!(
                    attempt,
                    "Cannot connect to Neo4j at {}, retrying: {e}", config.bolt_uri
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(e).context(format!(
                    "Cannot connect to Neo4j at {} after {max_retries} attempts",
                    config.bolt_uri
                ));
            }
        }
    }

    bail!(
        "Cannot connect to Neo4j at {} after {max_retries} attempts",
        config.bolt_uri
    );
}

async fn run_cypher(graph: &Graph, cypher: &str) -> Result<()> {
    graph
        .run(query(cypher))
        .await
        .with_context(|| format!("Failed to execute: {cypher}"))?;
    Ok(())
}
