//! Zentinel SOAP model command-line tool.
//!
//! Run with: `zentinel-soap-model inspect envelope.xml` or
//! `zentinel-soap-model fault --protocol 1.2 --code Sender --reason "Bad input"`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use zentinel_soap_model::{fault_envelope, FaultCode, Protocol, SoapDocument, SoapModelConfig, WriterConfig};

/// Inspect SOAP envelopes and generate SOAP faults.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse an envelope, report its header blocks and fault, print it back
    Inspect {
        /// SOAP envelope file
        file: PathBuf,

        /// Path to configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Report mustUnderstand header blocks targeted at this actor/role
        #[arg(short, long)]
        role: Option<String>,
    },

    /// Print a fault envelope
    Fault {
        /// SOAP version ("1.1" or "1.2")
        #[arg(short, long, default_value = "1.1")]
        protocol: Protocol,

        /// Fault code (VersionMismatch, MustUnderstand, DataEncodingUnknown, Sender, Receiver)
        #[arg(short, long, default_value = "Receiver")]
        code: FaultCode,

        /// Human-readable reason
        #[arg(short, long)]
        reason: String,

        /// Indent output by this many spaces
        #[arg(long)]
        indent: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout carries only XML
    let log_level = args.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match args.command {
        Command::Inspect { file, config, role } => inspect(file, config, role).await,
        Command::Fault {
            protocol,
            code,
            reason,
            indent,
        } => {
            let writer = WriterConfig {
                indent,
                ..WriterConfig::default()
            };
            let xml = fault_envelope(protocol, code, &reason, &writer)
                .context("Failed to build fault envelope")?;
            println!("{}", xml);
            Ok(())
        }
    }
}

async fn inspect(file: PathBuf, config_path: Option<PathBuf>, role: Option<String>) -> Result<()> {
    let config = match config_path {
        Some(path) => {
            info!("Config file: {}", path.display());
            let content = tokio::fs::read_to_string(&path)
                .await
                .context("Failed to read config file")?;
            SoapModelConfig::from_yaml_str(&content).context("Failed to parse config file")?
        }
        None => {
            let mut config = SoapModelConfig::default();
            config.protocol.version = Protocol::Dynamic;
            config
        }
    };

    let data = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let mut doc = SoapDocument::from_xml(&data, &config)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    let protocol = doc.bound_protocol()?;
    info!(
        %protocol,
        content_type = protocol.content_type().unwrap_or_default(),
        nodes = doc.node_count(),
        "Envelope loaded"
    );

    let envelope = doc.envelope()?;
    if let Some(header) = doc.header(envelope)? {
        for block in doc.examine_all_header_elements(header)? {
            info!(
                name = %doc.element_qname(block)?,
                actor = %doc.actor(block)?,
                must_understand = doc.must_understand(block)?,
                "Header block"
            );
        }
        if let Some(role) = role {
            let targeted = doc.examine_must_understand_header_elements(header, &role)?;
            info!(role = %role, count = targeted.len(), "mustUnderstand blocks for role");
        }
    }

    if let Some(body) = doc.body(envelope)? {
        if let Some(fault) = doc.fault(body)? {
            warn!(
                code = %doc.fault_code(fault)?,
                reason = %doc.fault_reason(fault)?.unwrap_or_default(),
                "Envelope carries a fault"
            );
        }
    }

    let xml = doc
        .to_xml_string(&config.serialization)
        .context("Failed to serialize envelope")?;
    println!("{}", xml);
    Ok(())
}
