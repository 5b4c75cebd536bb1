//! Duplicate grouping
//!
//! Groups are emitted in order of their first member's position in the input
//! and members keep input order, so the same input always yields the same
//! groups. Singletons are dropped.

use super::normalize;
use gplan_common::db::Variety;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How merge candidates are keyed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingMode {
    /// Raw `variety_code` when present, otherwise the name key
    CodeFirst,
    /// Always `plant_type_id:light(variety_name)`
    #[default]
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Code,
    Name,
    StrictName,
}

#[derive(Debug, Clone)]
pub struct DuplicateGroup<'a> {
    pub kind: GroupKind,
    pub key: String,
    pub members: Vec<&'a Variety>,
}

impl DuplicateGroup<'_> {
    pub fn ids(&self) -> Vec<String> {
        self.members.iter().map(|v| v.id.clone()).collect()
    }
}

/// Name-based identity key; `None` for a blank name
pub fn name_key(variety: &Variety) -> Option<String> {
    let name = normalize::light(&variety.variety_name);
    if name.is_empty() {
        return None;
    }
    Some(format!("{}:{}", variety.plant_type_id.as_deref().unwrap_or(""), name))
}

fn strict_key(variety: &Variety) -> Option<String> {
    let name = normalize::strict(&variety.variety_name);
    if name.is_empty() {
        return None;
    }
    Some(format!("{}:{}", variety.plant_type_id.as_deref().unwrap_or(""), name))
}

/// Partition for merging under the chosen mode
pub fn group_for_merge(varieties: &[Variety], mode: MatchingMode) -> Vec<DuplicateGroup<'_>> {
    collect_groups(varieties.iter(), |v| match (mode, v.code()) {
        (MatchingMode::CodeFirst, Some(code)) => Some((GroupKind::Code, code.to_string())),
        _ => name_key(v).map(|k| (GroupKind::Name, k)),
    })
}

/// Groups sharing an exact `variety_code`
pub fn code_groups(varieties: &[Variety]) -> Vec<DuplicateGroup<'_>> {
    collect_groups(varieties.iter(), |v| v.code().map(|c| (GroupKind::Code, c.to_string())))
}

/// Groups sharing a light-normalized name within a plant type
pub fn name_groups(varieties: &[Variety]) -> Vec<DuplicateGroup<'_>> {
    collect_groups(varieties.iter(), |v| name_key(v).map(|k| (GroupKind::Name, k)))
}

/// Groups sharing a strict-normalized name, excluding records already in a code group
pub fn strict_name_groups<'a>(varieties: &'a [Variety], code_grouped: &HashSet<&str>) -> Vec<DuplicateGroup<'a>> {
    collect_groups(
        varieties.iter().filter(|v| !code_grouped.contains(v.id.as_str())),
        |v| strict_key(v).map(|k| (GroupKind::StrictName, k)),
    )
}

/// Ids of every record inside any of the groups
pub fn grouped_ids<'a>(groups: &[DuplicateGroup<'a>]) -> HashSet<&'a str> {
    groups
        .iter()
        .flat_map(|g| g.members.iter().map(|v| v.id.as_str()))
        .collect()
}

fn collect_groups<'a, I, F>(varieties: I, key_of: F) -> Vec<DuplicateGroup<'a>>
where
    I: Iterator<Item = &'a Variety>,
    F: Fn(&Variety) -> Option<(GroupKind, String)>,
{
    let mut groups: Vec<DuplicateGroup<'a>> = Vec::new();
    let mut slot: HashMap<(GroupKind, String), usize> = HashMap::new();

    for variety in varieties {
        let Some(key) = key_of(variety) else {
            continue;
        };
        match slot.get(&key) {
            Some(&i) => groups[i].members.push(variety),
            None => {
                slot.insert(key.clone(), groups.len());
                groups.push(DuplicateGroup {
                    kind: key.0,
                    key: key.1,
                    members: vec![variety],
                });
            }
        }
    }

    groups.retain(|g| g.members.len() >= 2);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variety(id: &str, name: &str, code: Option<&str>) -> Variety {
        let mut v = Variety::new(id, Some("tomato".to_string()), name);
        v.variety_code = code.map(str::to_string);
        v
    }

    #[test]
    fn test_brandywine_light_grouping() {
        let records = vec![variety("a", "Brandywine", None), variety("b", "brandywine.", None)];
        let groups = name_groups(&records);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, "tomato:brandywine");
        assert_eq!(groups[0].ids(), vec!["a", "b"]);
    }

    #[test]
    fn test_code_first_falls_back_to_name() {
        let records = vec![
            variety("a", "Sungold", Some("TOM_CHERRY_SUNGOLD")),
            variety("b", "Sun Gold F1", Some("TOM_CHERRY_SUNGOLD")),
            variety("c", "Juliet", None),
            variety("d", "juliet", None),
            variety("e", "Juliet", Some("TOM_GRAPE_JULIET")),
        ];
        let groups = group_for_merge(&records, MatchingMode::CodeFirst);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].kind, GroupKind::Code);
        assert_eq!(groups[0].ids(), vec!["a", "b"]);
        assert_eq!(groups[1].kind, GroupKind::Name);
        assert_eq!(groups[1].ids(), vec!["c", "d"]);
    }

    #[test]
    fn test_name_mode_ignores_codes() {
        let records = vec![
            variety("a", "Juliet", Some("TOM_GRAPE_JULIET")),
            variety("b", "Juliet", Some("TOM_GRAPE_JULIET_2")),
        ];
        let groups = group_for_merge(&records, MatchingMode::Name);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_types_never_mix_in_name_keys() {
        let mut pepper = variety("b", "Sunrise", None);
        pepper.plant_type_id = Some("pepper".to_string());
        let records = vec![variety("a", "Sunrise", None), pepper];
        assert!(name_groups(&records).is_empty());
    }

    #[test]
    fn test_strict_view_excludes_code_grouped_records() {
        let records = vec![
            variety("a", "Sungold (organic)", Some("TOM_CHERRY_SUNGOLD")),
            variety("b", "Sungold", Some("TOM_CHERRY_SUNGOLD")),
            variety("c", "Sungold!", None),
            variety("d", "Mr. Stripey", None),
            variety("e", "Mr Stripey (heirloom)", None),
        ];
        let codes = code_groups(&records);
        let excluded = grouped_ids(&codes);
        let strict = strict_name_groups(&records, &excluded);

        assert_eq!(codes.len(), 1);
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].ids(), vec!["d", "e"]);
    }

    #[test]
    fn test_blank_names_do_not_group() {
        let records = vec![variety("a", "  ", None), variety("b", "", None)];
        assert!(name_groups(&records).is_empty());
    }

    #[test]
    fn test_matching_mode_serde() {
        let mode: MatchingMode = serde_json::from_str("\"code_first\"").unwrap();
        assert_eq!(mode, MatchingMode::CodeFirst);
        assert_eq!(MatchingMode::default(), MatchingMode::Name);
    }
}
