//! Classification rule tables
//!
//! Rules are data loaded from TOML. The built-in table ships inside the
//! binary; a deployment may replace it with its own file. Order within each
//! tier is significant and preserved exactly as written.

use gplan_common::{Error, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

const BUILTIN_RULES: &str = include_str!("../../rules/default_rules.toml");

/// Variety attribute an attribute rule inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeField {
    FruitShape,
    FruitSize,
    FruitColor,
    GrowthHabit,
}

/// Tier 1: structured code prefix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefixRule {
    pub prefix: String,
    pub subcat_code: String,
}

/// Tier 2: generic code prefix refined by an attribute keyword
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeRule {
    pub prefix: String,
    pub field: AttributeField,
    pub contains: Vec<String>,
    pub subcat_code: String,
}

#[derive(Debug, Clone, Deserialize)]
struct NameRuleDef {
    #[serde(default)]
    plant_type: Option<String>,
    pattern: String,
    subcat_code: String,
}

/// Tier 3: free-text name pattern, optionally limited to one plant type
#[derive(Debug, Clone)]
pub struct NameRule {
    pub plant_type: Option<String>,
    pub pattern: Regex,
    pub subcat_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalSubcategory {
    pub code: String,
    pub name: String,
}

/// The subcategories one plant type is expected to carry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalSet {
    pub plant_type: String,
    pub subcategories: Vec<CanonicalSubcategory>,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    prefix: Vec<PrefixRule>,
    #[serde(default)]
    attribute: Vec<AttributeRule>,
    #[serde(default)]
    name: Vec<NameRuleDef>,
    #[serde(default)]
    canonical_set: Vec<CanonicalSet>,
}

/// Ordered classification rules
#[derive(Debug, Clone)]
pub struct RuleTable {
    prefix_rules: Vec<PrefixRule>,
    attribute_rules: Vec<AttributeRule>,
    name_rules: Vec<NameRule>,
    canonical_sets: Vec<CanonicalSet>,
}

impl RuleTable {
    /// Parse a rule table, compiling name patterns case-insensitively
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: RuleFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse rule table: {}", e)))?;

        let mut name_rules = Vec::with_capacity(file.name.len());
        for def in file.name {
            let pattern = RegexBuilder::new(&def.pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| Error::Config(format!("Invalid name pattern '{}': {}", def.pattern, e)))?;
            name_rules.push(NameRule {
                plant_type: def.plant_type,
                pattern,
                subcat_code: def.subcat_code,
            });
        }

        let table = Self {
            prefix_rules: file.prefix,
            attribute_rules: file.attribute,
            name_rules,
            canonical_sets: file.canonical_set,
        };
        table.validate()?;
        Ok(table)
    }

    /// The rule table compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_RULES)
    }

    /// Load from `path`, or the built-in table when no path is configured
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let table = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                let table = Self::from_toml_str(&content)?;
                info!("Loaded rule table from {}", path.display());
                table
            }
            None => Self::builtin()?,
        };

        info!(
            prefix_rules = table.prefix_rules.len(),
            attribute_rules = table.attribute_rules.len(),
            name_rules = table.name_rules.len(),
            canonical_sets = table.canonical_sets.len(),
            "Rule table ready"
        );
        Ok(table)
    }

    fn validate(&self) -> Result<()> {
        let blank_prefix = self
            .prefix_rules
            .iter()
            .map(|r| &r.prefix)
            .chain(self.attribute_rules.iter().map(|r| &r.prefix))
            .any(|p| p.trim().is_empty());
        if blank_prefix {
            return Err(Error::Config("Rule prefix must not be empty".to_string()));
        }

        let blank_target = self
            .prefix_rules
            .iter()
            .map(|r| &r.subcat_code)
            .chain(self.attribute_rules.iter().map(|r| &r.subcat_code))
            .chain(self.name_rules.iter().map(|r| &r.subcat_code))
            .any(|c| c.trim().is_empty());
        if blank_target {
            return Err(Error::Config("Rule subcat_code must not be empty".to_string()));
        }

        Ok(())
    }

    pub fn prefix_rules(&self) -> &[PrefixRule] {
        &self.prefix_rules
    }

    pub fn attribute_rules(&self) -> &[AttributeRule] {
        &self.attribute_rules
    }

    pub fn name_rules(&self) -> &[NameRule] {
        &self.name_rules
    }

    /// First prefix rule the code starts with
    pub fn match_prefix(&self, variety_code: &str) -> Option<&PrefixRule> {
        let code = variety_code.trim().to_uppercase();
        self.prefix_rules
            .iter()
            .find(|rule| code.starts_with(&rule.prefix.trim().to_uppercase()))
    }

    /// First attribute rule whose prefix matches and whose field holds a keyword
    pub fn match_attribute<'a, F>(&self, variety_code: &str, attribute: F) -> Option<&AttributeRule>
    where
        F: Fn(AttributeField) -> Option<&'a str>,
    {
        let code = variety_code.trim().to_uppercase();
        self.attribute_rules.iter().find(|rule| {
            if !code.starts_with(&rule.prefix.trim().to_uppercase()) {
                return false;
            }
            let Some(value) = attribute(rule.field) else {
                return false;
            };
            let value = value.to_lowercase();
            rule.contains
                .iter()
                .any(|keyword| !keyword.trim().is_empty() && value.contains(&keyword.trim().to_lowercase()))
        })
    }

    /// First name rule for this plant type whose pattern matches
    ///
    /// Rules without a plant type apply to every type.
    pub fn match_name(&self, variety_name: &str, plant_type_name: Option<&str>) -> Option<&NameRule> {
        self.name_rules.iter().find(|rule| {
            let type_ok = match (&rule.plant_type, plant_type_name) {
                (None, _) => true,
                (Some(wanted), Some(actual)) => wanted.trim().eq_ignore_ascii_case(actual.trim()),
                (Some(_), None) => false,
            };
            type_ok && rule.pattern.is_match(variety_name)
        })
    }

    /// Canonical subcategory set for a plant type, by common name
    pub fn canonical_set(&self, plant_type_name: &str) -> Option<&CanonicalSet> {
        self.canonical_sets
            .iter()
            .find(|set| set.plant_type.trim().eq_ignore_ascii_case(plant_type_name.trim()))
    }
}
