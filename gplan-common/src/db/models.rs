//! Catalog record models
//!
//! Stored rows are loaded as-is, including the corruption the reconciliation
//! service exists to repair. Two fields get typed views on top of the raw
//! columns:
//!
//! - [`RawClassification`] holds the four classification columns exactly as
//!   stored. New values are always written through [`Classification`], whose
//!   primary/array views are derived and therefore cannot disagree.
//! - [`VarietyStatus`] replaces the `status` text plus the free-form
//!   `merged_into_variety_id` pointer with an explicit variant.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key mirrored into `extended_data` for consumers of the legacy tombstone shape
pub const MERGED_INTO_KEY: &str = "merged_into_variety_id";

/// Key holding the subcategory code an import assigned before ids existed
pub const IMPORT_SUBCAT_CODE_KEY: &str = "import_subcat_code";

/// Key holding subcategory codes a merge could not tie to any subcategory
pub const UNRESOLVED_SUBCAT_CODES_KEY: &str = "unresolved_subcat_codes";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantType {
    pub id: String,
    pub common_name: String,
    pub type_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantSubCategory {
    pub id: String,
    pub plant_type_id: String,
    pub subcat_code: String,
    pub name: String,
    pub is_active: bool,
}

/// Reference to one subcategory as stored on a variety
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubcategoryRef {
    pub id: String,
    pub code: Option<String>,
}

impl SubcategoryRef {
    pub fn new(id: impl Into<String>, code: Option<String>) -> Self {
        Self {
            id: id.into(),
            code,
        }
    }
}

impl From<&PlantSubCategory> for SubcategoryRef {
    fn from(subcat: &PlantSubCategory) -> Self {
        Self {
            id: subcat.id.clone(),
            code: Some(subcat.subcat_code.clone()),
        }
    }
}

/// The classification columns of a variety, exactly as stored
///
/// `ids` and `codes` are independent sets, not parallel arrays: an id whose
/// code is unknown has no counterpart in `codes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawClassification {
    pub primary_id: Option<String>,
    pub primary_code: Option<String>,
    pub ids: Vec<String>,
    pub codes: Vec<String>,
}

impl RawClassification {
    /// True when neither the primary pair nor the arrays hold anything
    pub fn is_empty(&self) -> bool {
        blank(&self.primary_id) && blank(&self.primary_code) && self.ids.is_empty() && self.codes.is_empty()
    }

    /// True when the shadow arrays carry any content
    pub fn has_array_content(&self) -> bool {
        self.ids.iter().any(|s| !s.trim().is_empty()) || self.codes.iter().any(|s| !s.trim().is_empty())
    }

    /// Every distinct non-blank id mentioned anywhere, primary first
    pub fn mentioned_ids(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let candidates = self.primary_id.iter().chain(self.ids.iter());
        for id in candidates {
            let id = id.trim();
            if !id.is_empty() && !out.iter().any(|seen| seen == id) {
                out.push(id.to_string());
            }
        }
        out
    }

    /// Every distinct non-blank code mentioned anywhere, primary first
    pub fn mentioned_codes(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let candidates = self.primary_code.iter().chain(self.codes.iter());
        for code in candidates {
            let code = code.trim();
            if !code.is_empty() && !out.iter().any(|seen| seen == code) {
                out.push(code.to_string());
            }
        }
        out
    }
}

/// A variety's classification as a single owned value
///
/// The first entry is the primary subcategory; the rest are secondary.
/// Ids are unique. Column views are derived by [`Classification::to_raw`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    entries: Vec<SubcategoryRef>,
}

impl Classification {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn single(primary: SubcategoryRef) -> Self {
        Self {
            entries: vec![primary],
        }
    }

    /// Build from refs in precedence order; later duplicates of an id are dropped
    pub fn from_refs(refs: impl IntoIterator<Item = SubcategoryRef>) -> Self {
        let mut classification = Self::none();
        for r in refs {
            classification.push(r);
        }
        classification
    }

    /// Append a ref unless its id is already present (or blank)
    ///
    /// A later ref may still supply a code the earlier one lacked.
    pub fn push(&mut self, r: SubcategoryRef) {
        if r.id.trim().is_empty() {
            return;
        }
        match self.entries.iter_mut().find(|e| e.id == r.id) {
            Some(existing) => {
                if existing.code.is_none() {
                    existing.code = r.code;
                }
            }
            None => self.entries.push(r),
        }
    }

    pub fn primary(&self) -> Option<&SubcategoryRef> {
        self.entries.first()
    }

    pub fn entries(&self) -> &[SubcategoryRef] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only the primary entry
    pub fn primary_only(&self) -> Self {
        match self.primary() {
            Some(p) => Self::single(p.clone()),
            None => Self::none(),
        }
    }

    /// Derive the stored column values
    ///
    /// Entries without a code contribute to `ids` only, so the two arrays may
    /// differ in length and are never read positionally.
    pub fn to_raw(&self) -> RawClassification {
        let primary = self.primary();
        RawClassification {
            primary_id: primary.map(|p| p.id.clone()),
            primary_code: primary.and_then(|p| p.code.clone()),
            ids: self.entries.iter().map(|e| e.id.clone()).collect(),
            codes: self.entries.iter().filter_map(|e| e.code.clone()).collect(),
        }
    }
}

/// Lifecycle of a variety record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarietyStatus {
    Active,
    /// Removed without a surviving record to follow
    Removed,
    /// Tombstone left by a duplicate merge
    MergedInto(String),
    /// Any status text this service does not interpret; preserved on write
    Other(String),
}

impl VarietyStatus {
    /// Interpret stored columns
    ///
    /// The pointer may live in the dedicated column or only in
    /// `extended_data` (records tombstoned by older tooling).
    pub fn from_columns(status: &str, merged_into: Option<&str>, extended_data: &Map<String, Value>) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "active" | "" => VarietyStatus::Active,
            "removed" => {
                let pointer = merged_into
                    .map(str::to_string)
                    .or_else(|| {
                        extended_data
                            .get(MERGED_INTO_KEY)
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    })
                    .filter(|id| !id.trim().is_empty());
                match pointer {
                    Some(id) => VarietyStatus::MergedInto(id),
                    None => VarietyStatus::Removed,
                }
            }
            _ => VarietyStatus::Other(status.to_string()),
        }
    }

    /// Text for the `status` column
    pub fn status_text(&self) -> &str {
        match self {
            VarietyStatus::Active => "active",
            VarietyStatus::Removed | VarietyStatus::MergedInto(_) => "removed",
            VarietyStatus::Other(text) => text,
        }
    }

    pub fn merged_into(&self) -> Option<&str> {
        match self {
            VarietyStatus::MergedInto(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, VarietyStatus::Active)
    }
}

/// Free-form descriptive scalars
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarietyDetails {
    pub description: Option<String>,
    pub days_to_maturity: Option<i64>,
    pub spacing: Option<String>,
    pub flavor: Option<String>,
    pub fruit_shape: Option<String>,
    pub fruit_size: Option<String>,
    pub fruit_color: Option<String>,
    pub growth_habit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variety {
    pub id: String,
    pub plant_type_id: Option<String>,
    pub variety_name: String,
    pub variety_code: Option<String>,
    pub classification: RawClassification,
    pub status: VarietyStatus,
    pub details: VarietyDetails,
    pub images: Vec<String>,
    pub synonyms: Vec<String>,
    pub sources: Vec<String>,
    pub traits: Map<String, Value>,
    pub extended_data: Map<String, Value>,
    pub created_date: Option<String>,
    pub updated_date: Option<String>,
}

impl Variety {
    /// New active variety with every optional field empty
    pub fn new(id: impl Into<String>, plant_type_id: Option<String>, variety_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            plant_type_id,
            variety_name: variety_name.into(),
            variety_code: None,
            classification: RawClassification::default(),
            status: VarietyStatus::Active,
            details: VarietyDetails::default(),
            images: Vec::new(),
            synonyms: Vec::new(),
            sources: Vec::new(),
            traits: Map::new(),
            extended_data: Map::new(),
            created_date: None,
            updated_date: None,
        }
    }

    /// Replace the classification columns with a derived, self-consistent set
    pub fn set_classification(&mut self, classification: &Classification) {
        self.classification = classification.to_raw();
    }

    /// Non-blank `variety_code`
    pub fn code(&self) -> Option<&str> {
        self.variety_code.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    /// `extended_data.import_subcat_code`, when it is a non-blank string
    pub fn import_subcat_code(&self) -> Option<&str> {
        self.extended_data
            .get(IMPORT_SUBCAT_CODE_KEY)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// `extended_data.unresolved_subcat_codes`, non-blank strings only
    pub fn unresolved_subcat_codes(&self) -> Vec<&str> {
        self.extended_data
            .get(UNRESOLVED_SUBCAT_CODES_KEY)
            .and_then(Value::as_array)
            .map(|codes| {
                codes
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replace the unresolved code list; an empty list removes the key
    pub fn set_unresolved_subcat_codes(&mut self, codes: Vec<String>) {
        if codes.is_empty() {
            self.extended_data.remove(UNRESOLVED_SUBCAT_CODES_KEY);
        } else {
            let codes = codes.into_iter().map(Value::String).collect();
            self.extended_data
                .insert(UNRESOLVED_SUBCAT_CODES_KEY.to_string(), Value::Array(codes));
        }
    }

    /// Turn this record into a tombstone pointing at `canonical_id`
    pub fn tombstone(&mut self, canonical_id: &str) {
        self.status = VarietyStatus::MergedInto(canonical_id.to_string());
        self.extended_data
            .insert(MERGED_INTO_KEY.to_string(), Value::String(canonical_id.to_string()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantProfile {
    pub id: String,
    pub owner_id: Option<String>,
    pub variety_id: Option<String>,
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantInstance {
    pub id: String,
    pub garden_id: Option<String>,
    pub variety_id: Option<String>,
    pub planted_date: Option<String>,
}

/// One entry of a grow list, kept in the shape it was stored in
///
/// Only the variety reference is ever rewritten. Entries that carry no string
/// variety id are held as raw JSON and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GrowListItem {
    /// Bare variety id
    Id(String),
    /// Object with a string `variety_id`; other fields ride along
    Entry(GrowListEntry),
    Opaque(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowListEntry {
    pub variety_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GrowListItem {
    pub fn entry(variety_id: impl Into<String>, extra: Map<String, Value>) -> Self {
        GrowListItem::Entry(GrowListEntry {
            variety_id: variety_id.into(),
            extra,
        })
    }

    pub fn variety_id(&self) -> Option<&str> {
        match self {
            GrowListItem::Id(id) => Some(id),
            GrowListItem::Entry(entry) => Some(&entry.variety_id),
            GrowListItem::Opaque(_) => None,
        }
    }

    /// Point the entry at another variety, keeping its shape
    pub fn set_variety_id(&mut self, variety_id: String) {
        match self {
            GrowListItem::Id(id) => *id = variety_id,
            GrowListItem::Entry(entry) => entry.variety_id = variety_id,
            GrowListItem::Opaque(_) => {}
        }
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        match self {
            GrowListItem::Entry(entry) => entry.extra.get(key),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowList {
    pub id: String,
    pub owner_id: Option<String>,
    pub name: String,
    pub items: Vec<GrowListItem>,
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true)
}
