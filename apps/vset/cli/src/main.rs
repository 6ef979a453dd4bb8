//! Vector-set CLI
//!
//! Runs one gateway operation against a Redis store and prints the response envelope
//! as JSON. Exits non-zero when the envelope reports a failure.

use std::time::Duration;

use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv};
use database::redis::RedisConfig;
use domain_vector_sets::{
    AddRequest, CreateRequest, LinksRequest, OperationResult, Quantization, SimRequest,
    VectorSetGateway,
};
use eyre::Result;
use serde::Serialize;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "vset")]
#[command(about = "Inspect and edit Redis vector sets")]
struct Cli {
    /// Store URL. Defaults to REDIS_URL
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// Upper bound for a whole operation, in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Pretty-print the JSON output
    #[arg(short, long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List all vector sets
    List,

    /// Show VINFO for a set
    Info { set: String },

    /// Show the dimension of a set
    Dim { set: String },

    /// Show the number of elements in a set
    Card { set: String },

    /// Show the memory used by a set, in bytes
    Memory { set: String },

    /// Similarity search by vector or by element
    Sim {
        set: String,

        /// Query vector, comma separated
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true, conflicts_with = "element")]
        vector: Option<Vec<f32>>,

        /// Use this element's vector as the query
        #[arg(short, long)]
        element: Option<String>,

        #[arg(short, long, default_value_t = 10)]
        count: usize,

        /// Attribute filter expression
        #[arg(short, long)]
        filter: Option<String>,

        /// Search exploration factor
        #[arg(long)]
        ef: Option<u32>,

        /// Include each match's vector
        #[arg(long)]
        with_embeddings: bool,

        /// Include each match's attributes
        #[arg(long)]
        with_attributes: bool,
    },

    /// Show the neighbor graph of an element
    Links {
        set: String,
        element: String,

        /// Keep at most this many neighbors per level
        #[arg(short, long)]
        count: Option<usize>,

        #[arg(long)]
        with_embeddings: bool,
    },

    /// Fetch element vectors
    Emb {
        set: String,

        #[arg(required = true, num_args = 1..)]
        elements: Vec<String>,
    },

    /// Add or update an element
    Add {
        set: String,
        element: String,

        /// Vector, comma separated
        #[arg(value_delimiter = ',', allow_hyphen_values = true)]
        vector: Vec<f32>,

        /// JSON attributes
        #[arg(short, long)]
        attributes: Option<String>,

        /// Random projection to this many dimensions
        #[arg(long)]
        reduce: Option<u32>,

        /// Q8, BIN or NOQUANT
        #[arg(short, long)]
        quantization: Option<Quantization>,

        /// Check-and-set insertion
        #[arg(long)]
        cas: bool,

        /// Build exploration factor
        #[arg(long)]
        ef: Option<u32>,

        /// Max connections per node
        #[arg(short, long)]
        m: Option<u32>,
    },

    /// Remove an element
    Rem { set: String, element: String },

    /// Read or replace element attributes
    Attrs {
        #[command(subcommand)]
        action: AttrsAction,
    },

    /// Create a set holding a placeholder element
    Create {
        set: String,

        #[arg(short, long)]
        dimensions: Option<u32>,

        /// Metadata JSON
        #[arg(short, long)]
        metadata: Option<String>,
    },

    /// Delete a set and its metadata
    Delete { set: String },

    /// Read or replace set metadata
    Metadata {
        #[command(subcommand)]
        action: MetadataAction,
    },
}

#[derive(Subcommand, Debug)]
enum AttrsAction {
    Get { set: String, element: String },
    /// An empty JSON argument clears the attributes
    Set { set: String, element: String, json: String },
}

#[derive(Subcommand, Debug)]
enum MetadataAction {
    Get { set: String },
    Set { set: String, json: String },
}

/// Print the envelope and report whether it succeeded.
fn print<T: Serialize>(result: &OperationResult<T>, pretty: bool) -> Result<bool> {
    let json = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{}", json);
    Ok(result.is_success())
}

async fn run(gateway: &VectorSetGateway, url: &str, command: Commands, pretty: bool) -> Result<bool> {
    match command {
        Commands::List => print(&gateway.list_vector_sets(url).await, pretty),
        Commands::Info { set } => print(&gateway.info(url, &set).await, pretty),
        Commands::Dim { set } => print(&gateway.dimension(url, &set).await, pretty),
        Commands::Card { set } => print(&gateway.cardinality(url, &set).await, pretty),
        Commands::Memory { set } => print(&gateway.memory_usage(url, &set).await, pretty),

        Commands::Sim {
            set,
            vector,
            element,
            count,
            filter,
            ef,
            with_embeddings,
            with_attributes,
        } => {
            let mut request = match (vector, element) {
                (Some(vector), _) => SimRequest::by_vector(set, vector, count),
                (None, Some(element)) => SimRequest::by_element(set, element, count),
                (None, None) => eyre::bail!("either --vector or --element is required"),
            };
            if let Some(filter) = filter {
                request = request.with_filter(filter);
            }
            if let Some(ef) = ef {
                request = request.with_ef(ef);
            }
            if with_embeddings {
                request = request.with_embeddings();
            }
            if with_attributes {
                request = request.with_attributes();
            }
            print(&gateway.similarity_search(url, request).await, pretty)
        }

        Commands::Links {
            set,
            element,
            count,
            with_embeddings,
        } => {
            let mut request = LinksRequest::new(set, element);
            if let Some(count) = count {
                request = request.with_count(count);
            }
            if with_embeddings {
                request = request.with_embeddings();
            }
            print(&gateway.neighbors(url, request).await, pretty)
        }

        Commands::Emb { set, elements } => {
            print(&gateway.fetch_vectors_batch(url, &set, &elements).await, pretty)
        }

        Commands::Add {
            set,
            element,
            vector,
            attributes,
            reduce,
            quantization,
            cas,
            ef,
            m,
        } => {
            let mut request = AddRequest::new(set, element, vector).with_cas(cas);
            if let Some(attributes) = attributes {
                request = request.with_attributes(attributes);
            }
            if let Some(reduce) = reduce {
                request = request.with_reduce(reduce);
            }
            if let Some(quantization) = quantization {
                request = request.with_quantization(quantization);
            }
            if let Some(ef) = ef {
                request = request.with_build_ef(ef);
            }
            if let Some(m) = m {
                request = request.with_max_connections(m);
            }
            print(&gateway.add(url, request).await, pretty)
        }

        Commands::Rem { set, element } => print(&gateway.remove(url, &set, &element).await, pretty),

        Commands::Attrs { action } => match action {
            AttrsAction::Get { set, element } => {
                print(&gateway.get_attributes(url, &set, &element).await, pretty)
            }
            AttrsAction::Set { set, element, json } => {
                print(&gateway.set_attributes(url, &set, &element, &json).await, pretty)
            }
        },

        Commands::Create {
            set,
            dimensions,
            metadata,
        } => {
            let mut request = CreateRequest::new(set);
            if let Some(dimensions) = dimensions {
                request = request.with_dimensions(dimensions);
            }
            if let Some(metadata) = metadata {
                request = request.with_metadata(serde_json::from_str(&metadata)?);
            }
            print(&gateway.create_vector_set(url, request).await, pretty)
        }

        Commands::Delete { set } => print(&gateway.delete_vector_set(url, &set).await, pretty),

        Commands::Metadata { action } => match action {
            MetadataAction::Get { set } => print(&gateway.get_metadata(url, &set).await, pretty),
            MetadataAction::Set { set, json } => {
                let raw: serde_json::Value = serde_json::from_str(&json)?;
                print(&gateway.set_metadata(url, &set, raw).await, pretty)
            }
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);

    let cli = Cli::parse();

    let url = match cli.url {
        Some(url) => url,
        None => RedisConfig::from_env()?.url,
    };
    debug!(url = %url, command = ?cli.command, "Running command");

    let mut gateway = VectorSetGateway::shared();
    if let Some(timeout_ms) = cli.timeout_ms {
        gateway = gateway.with_operation_timeout(Duration::from_millis(timeout_ms));
    }

    let outcome = run(&gateway, &url, cli.command, cli.pretty).await;
    gateway.shutdown().await;

    if !outcome? {
        std::process::exit(1);
    }
    Ok(())
}
