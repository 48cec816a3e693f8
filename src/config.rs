use crate::error::{DreError, Result};
use crate::store::DateField;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionBasis {
    #[default]
    #[schemars(
        description = "Window on the expected/due date; only Collected receivables and Paid payables count."
    )]
    ExpectedDate,

    #[schemars(
        description = "Window on the date money actually moved (received/payment date)."
    )]
    SettlementDate,
}

impl RecognitionBasis {
    pub fn date_field(&self) -> DateField {
        match self {
            Self::ExpectedDate => DateField::Scheduled,
            Self::SettlementDate => DateField::Settled,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComparativeStrategy {
    #[schemars(description = "Twelve independent monthly aggregations.")]
    PerMonth,

    #[default]
    #[schemars(description = "One year-wide fetch per ledger, bucketed by month.")]
    SingleRangeQuery,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(default)]
pub struct ExportOptions {
    #[schemars(description = "Heading written at the top of exported documents")]
    pub title: String,

    #[schemars(description = "Filename stem; files are named '<prefix>-YYYY-MM.<ext>'")]
    pub filename_prefix: String,

    #[schemars(description = "Prefix shown before monetary values in the PDF, e.g. 'R$'")]
    pub currency_symbol: String,

    #[schemars(description = "Append the twelve-month comparative table to exports")]
    pub include_comparative: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            title: "Income Statement (DRE)".to_string(),
            filename_prefix: "dre".to_string(),
            currency_symbol: String::new(),
            include_comparative: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    pub recognition_basis: RecognitionBasis,
    pub comparative_strategy: ComparativeStrategy,
    pub export: ExportOptions,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading engine configuration from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        let prefix = self.export.filename_prefix.trim();
        if prefix.is_empty() {
            return Err(DreError::InvalidInput(
                "export.filename_prefix must not be empty".to_string(),
            ));
        }
        if prefix.contains(['/', '\\']) {
            return Err(DreError::InvalidInput(format!(
                "export.filename_prefix '{}' must not contain path separators",
                prefix
            )));
        }
        Ok(())
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(EngineConfig);
        serde_json::to_string_pretty(&schema)
    }
}
