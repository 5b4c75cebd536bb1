//! Live subcategory lookup

use gplan_common::db::PlantSubCategory;
use std::collections::HashMap;

/// Subcategories by id and by (case-insensitive) code
///
/// Codes are unique per plant type, so a code may map to several records.
#[derive(Debug, Clone, Default)]
pub struct SubcategoryIndex {
    by_id: HashMap<String, PlantSubCategory>,
    by_code: HashMap<String, Vec<String>>,
}

impl SubcategoryIndex {
    pub fn new(subcats: &[PlantSubCategory]) -> Self {
        let mut index = Self::default();
        for subcat in subcats {
            index
                .by_code
                .entry(code_key(&subcat.subcat_code))
                .or_default()
                .push(subcat.id.clone());
            index.by_id.insert(subcat.id.clone(), subcat.clone());
        }
        index
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PlantSubCategory> {
        self.by_id.get(id.trim())
    }

    /// Every subcategory carrying this code, in any plant type
    pub fn with_code(&self, code: &str) -> Vec<&PlantSubCategory> {
        self.by_code
            .get(&code_key(code))
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).collect())
            .unwrap_or_default()
    }

    /// Subcategory with this code under one plant type; active records win
    pub fn find_code_in_type(&self, code: &str, plant_type_id: &str) -> Option<&PlantSubCategory> {
        let mut candidates: Vec<&PlantSubCategory> = self
            .with_code(code)
            .into_iter()
            .filter(|s| s.plant_type_id == plant_type_id)
            .collect();
        candidates.sort_by_key(|s| !s.is_active);
        candidates.first().copied()
    }

    /// Id lookup restricted to one plant type
    pub fn get_in_type(&self, id: &str, plant_type_id: &str) -> Option<&PlantSubCategory> {
        self.get(id).filter(|s| s.plant_type_id == plant_type_id)
    }
}

fn code_key(code: &str) -> String {
    code.trim().to_uppercase()
}
