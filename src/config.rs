//! Configuration types for the SOAP object model.

use crate::constants::{Protocol, SOAP_ENV_PREFIX};
use crate::error::{Result, SoapError};
use crate::name::is_ncname;
use serde::{Deserialize, Serialize};

/// Main configuration for building, reading and writing SOAP documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoapModelConfig {
    /// Config version
    pub version: String,

    /// Protocol binding
    pub protocol: ProtocolConfig,

    /// Reader settings
    pub parsing: ParsingConfig,

    /// Writer settings
    pub serialization: WriterConfig,
}

impl Default for SoapModelConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            protocol: ProtocolConfig::default(),
            parsing: ParsingConfig::default(),
            serialization: WriterConfig::default(),
        }
    }
}

impl SoapModelConfig {
    /// Parse and validate a YAML configuration.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| SoapError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the model cannot honor.
    pub fn validate(&self) -> Result<()> {
        if !is_ncname(&self.protocol.envelope_prefix) {
            return Err(SoapError::Config(format!(
                "envelope_prefix '{}' is not a valid XML prefix",
                self.protocol.envelope_prefix
            )));
        }
        if self.parsing.max_depth == 0 {
            return Err(SoapError::Config("max_depth must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Protocol binding for new documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// SOAP version ("1.1", "1.2" or "dynamic")
    pub version: Protocol,

    /// Prefix bound to the envelope namespace on new envelopes
    pub envelope_prefix: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            version: Protocol::default(),
            envelope_prefix: SOAP_ENV_PREFIX.to_string(),
        }
    }
}

/// Reader configuration, including XXE prevention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// Drop whitespace-only text between elements
    pub trim_whitespace: bool,

    /// Maximum element nesting depth
    pub max_depth: u32,

    /// Block DOCTYPE declarations
    pub block_doctype: bool,

    /// Block entity declarations and external entity references
    pub block_external_entities: bool,

    /// Block processing instructions (the XML declaration is always allowed)
    pub block_processing_instructions: bool,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            trim_whitespace: true,
            max_depth: 64,
            block_doctype: true,
            block_external_entities: true,
            block_processing_instructions: true,
        }
    }
}

/// Writer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Emit `<?xml version="1.0" encoding="UTF-8"?>`
    pub xml_declaration: bool,

    /// Indent nested elements by this many spaces (none when unset)
    pub indent: Option<usize>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            xml_declaration: true,
            indent: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SoapModelConfig::default();
        assert_eq!(config.protocol.version, Protocol::Soap11);
        assert_eq!(config.protocol.envelope_prefix, "env");
        assert!(config.parsing.block_doctype);
        assert!(config.serialization.xml_declaration);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = SoapModelConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: SoapModelConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.parsing.max_depth, config.parsing.max_depth);
        assert_eq!(parsed.protocol.version, config.protocol.version);
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
version: "1"
protocol:
  version: "1.2"
  envelope_prefix: soap12
parsing:
  max_depth: 16
  block_processing_instructions: false
serialization:
  indent: 2
"#;
        let config = SoapModelConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.protocol.version, Protocol::Soap12);
        assert_eq!(config.protocol.envelope_prefix, "soap12");
        assert_eq!(config.parsing.max_depth, 16);
        assert!(!config.parsing.block_processing_instructions);
        assert!(config.parsing.block_doctype);
        assert_eq!(config.serialization.indent, Some(2));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = SoapModelConfig::from_yaml_str("protocol:\n  envelope_prefix: \"1bad\"\n")
            .unwrap_err();
        assert!(matches!(err, SoapError::Config(_)));

        let err = SoapModelConfig::from_yaml_str("parsing:\n  max_depth: 0\n").unwrap_err();
        assert!(matches!(err, SoapError::Config(_)));

        let err = SoapModelConfig::from_yaml_str("protocol:\n  version: \"2.0\"\n").unwrap_err();
        assert!(matches!(err, SoapError::Config(_)));
    }
}
