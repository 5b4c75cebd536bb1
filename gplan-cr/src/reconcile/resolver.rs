//! Classification resolver
//!
//! Maps a variety's code, attributes and name to a subcategory using the
//! ordered tiers of a [`RuleTable`]. The first matching rule decides the
//! candidate code; the candidate is then checked against the live
//! subcategories of the variety's plant type. A candidate that does not
//! exist there, belongs to another type, or is inactive is rejected rather
//! than assigned. The resolver never guesses past that.

use super::index::SubcategoryIndex;
use super::non_blank;
use super::rules::{AttributeField, RuleTable};
use gplan_common::db::{SubcategoryRef, Variety};
use serde::{Deserialize, Serialize};

/// Rule tier that produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTier {
    Prefix,
    Attribute,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No subcategory with the candidate code exists
    UnknownCode,
    /// The code exists, but only under another plant type
    TypeMismatch,
    /// The code exists under this type but the subcategory is inactive
    Inactive,
    /// Variety has no plant type and the code is not unique
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    Matched {
        subcategory: SubcategoryRef,
        tier: RuleTier,
    },
    Rejected {
        candidate_code: String,
        tier: RuleTier,
        reason: RejectReason,
    },
    NoMatch,
}

impl Resolution {
    pub fn matched(&self) -> Option<&SubcategoryRef> {
        match self {
            Resolution::Matched { subcategory, .. } => Some(subcategory),
            _ => None,
        }
    }
}

/// Everything the resolver looks at
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveInput {
    #[serde(default)]
    pub variety_code: Option<String>,
    #[serde(default)]
    pub variety_name: Option<String>,
    #[serde(default)]
    pub plant_type_id: Option<String>,
    #[serde(default)]
    pub plant_type_name: Option<String>,
    #[serde(default)]
    pub fruit_shape: Option<String>,
    #[serde(default)]
    pub fruit_size: Option<String>,
    #[serde(default)]
    pub fruit_color: Option<String>,
    #[serde(default)]
    pub growth_habit: Option<String>,
}

impl ResolveInput {
    pub fn from_variety(variety: &Variety, plant_type_name: Option<&str>) -> Self {
        Self {
            variety_code: variety.variety_code.clone(),
            variety_name: Some(variety.variety_name.clone()),
            plant_type_id: variety.plant_type_id.clone(),
            plant_type_name: plant_type_name.map(str::to_string),
            fruit_shape: variety.details.fruit_shape.clone(),
            fruit_size: variety.details.fruit_size.clone(),
            fruit_color: variety.details.fruit_color.clone(),
            growth_habit: variety.details.growth_habit.clone(),
        }
    }

    fn attribute(&self, field: AttributeField) -> Option<&str> {
        let value = match field {
            AttributeField::FruitShape => &self.fruit_shape,
            AttributeField::FruitSize => &self.fruit_size,
            AttributeField::FruitColor => &self.fruit_color,
            AttributeField::GrowthHabit => &self.growth_habit,
        };
        non_blank(value.as_deref())
    }
}

pub struct Resolver<'a> {
    rules: &'a RuleTable,
    index: &'a SubcategoryIndex,
}

impl<'a> Resolver<'a> {
    pub fn new(rules: &'a RuleTable, index: &'a SubcategoryIndex) -> Self {
        Self { rules, index }
    }

    /// Candidate code and tier from the rule table alone
    pub fn candidate(&self, input: &ResolveInput) -> Option<(String, RuleTier)> {
        match non_blank(input.variety_code.as_deref()) {
            Some(code) => {
                if let Some(rule) = self.rules.match_prefix(code) {
                    return Some((rule.subcat_code.clone(), RuleTier::Prefix));
                }
                self.rules
                    .match_attribute(code, |field| input.attribute(field))
                    .map(|rule| (rule.subcat_code.clone(), RuleTier::Attribute))
            }
            None => {
                let name = non_blank(input.variety_name.as_deref())?;
                self.rules
                    .match_name(name, input.plant_type_name.as_deref())
                    .map(|rule| (rule.subcat_code.clone(), RuleTier::Name))
            }
        }
    }

    pub fn resolve(&self, input: &ResolveInput) -> Resolution {
        let Some((code, tier)) = self.candidate(input) else {
            return Resolution::NoMatch;
        };

        let reject = |reason| Resolution::Rejected {
            candidate_code: code.clone(),
            tier,
            reason,
        };

        let known = self.index.with_code(&code);
        if known.is_empty() {
            return reject(RejectReason::UnknownCode);
        }

        let target = match non_blank(input.plant_type_id.as_deref()) {
            Some(type_id) => match self.index.find_code_in_type(&code, type_id) {
                Some(subcat) => subcat,
                None => return reject(RejectReason::TypeMismatch),
            },
            None if known.len() == 1 => known[0],
            None => return reject(RejectReason::Ambiguous),
        };

        if !target.is_active {
            return reject(RejectReason::Inactive);
        }

        Resolution::Matched {
            subcategory: SubcategoryRef::from(target),
            tier,
        }
    }
}
