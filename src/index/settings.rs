use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{GriddleError, Result};

static CUSTOM_RANKING_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^:\s]+):(asc|desc)$").expect("static regex"));

fn default_searchable() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_displayed() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_ranking_rules() -> Vec<String> {
    RankingRule::DEFAULTS.iter().map(|r| r.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexSettings {
    pub searchable_attributes: Vec<String>,
    pub filterable_attributes: Vec<String>,
    pub sortable_attributes: Vec<String>,
    pub displayed_attributes: Vec<String>,
    pub ranking_rules: Vec<String>,
    pub stop_words: BTreeSet<String>,
    pub synonyms: BTreeMap<String, Vec<String>>,
    pub typo_tolerance: TypoTolerance,
    pub faceting: FacetingSettings,
    pub pagination: PaginationSettings,
}

impl Default for IndexSettings {
    fn default() -> Self {
        IndexSettings {
            searchable_attributes: default_searchable(),
            filterable_attributes: Vec::new(),
            sortable_attributes: Vec::new(),
            displayed_attributes: default_displayed(),
            ranking_rules: default_ranking_rules(),
            stop_words: BTreeSet::new(),
            synonyms: BTreeMap::new(),
            typo_tolerance: TypoTolerance::default(),
            faceting: FacetingSettings::default(),
            pagination: PaginationSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypoTolerance {
    pub enabled: bool,
    pub min_word_size_for_typos: MinWordSizeForTypos,
    pub disable_on_words: BTreeSet<String>,
    pub disable_on_attributes: BTreeSet<String>,
}

impl Default for TypoTolerance {
    fn default() -> Self {
        TypoTolerance {
            enabled: true,
            min_word_size_for_typos: MinWordSizeForTypos::default(),
            disable_on_words: BTreeSet::new(),
            disable_on_attributes: BTreeSet::new(),
        }
    }
}

impl TypoTolerance {
    /// Number of typos tolerated for a query word, by character length.
    pub fn allowed_typos(&self, word: &str) -> u8 {
        if !self.enabled {
            return 0;
        }
        if self
            .disable_on_words
            .iter()
            .any(|w| w.to_lowercase() == word)
        {
            return 0;
        }
        let len = word.chars().count();
        if len >= self.min_word_size_for_typos.two_typos as usize {
            2
        } else if len >= self.min_word_size_for_typos.one_typo as usize {
            1
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MinWordSizeForTypos {
    pub one_typo: u8,
    pub two_typos: u8,
}

impl Default for MinWordSizeForTypos {
    fn default() -> Self {
        MinWordSizeForTypos {
            one_typo: 5,
            two_typos: 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacetValuesOrder {
    Alpha,
    Count,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FacetingSettings {
    pub max_values_per_facet: usize,
    pub sort_facet_values_by: BTreeMap<String, FacetValuesOrder>,
}

impl Default for FacetingSettings {
    fn default() -> Self {
        let mut sort_facet_values_by = BTreeMap::new();
        sort_facet_values_by.insert("*".to_string(), FacetValuesOrder::Alpha);
        FacetingSettings {
            max_values_per_facet: 100,
            sort_facet_values_by,
        }
    }
}

impl FacetingSettings {
    pub fn order_for(&self, facet: &str) -> FacetValuesOrder {
        self.sort_facet_values_by
            .get(facet)
            .or_else(|| self.sort_facet_values_by.get("*"))
            .copied()
            .unwrap_or(FacetValuesOrder::Alpha)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaginationSettings {
    pub max_total_hits: usize,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        PaginationSettings {
            max_total_hits: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RankingRule {
    Words,
    Typo,
    Proximity,
    Attribute,
    Sort,
    Exactness,
    Asc(String),
    Desc(String),
}

impl RankingRule {
    pub const DEFAULTS: [RankingRule; 6] = [
        RankingRule::Words,
        RankingRule::Typo,
        RankingRule::Proximity,
        RankingRule::Attribute,
        RankingRule::Sort,
        RankingRule::Exactness,
    ];
}

impl FromStr for RankingRule {
    type Err = GriddleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "words" => Ok(RankingRule::Words),
            "typo" => Ok(RankingRule::Typo),
            "proximity" => Ok(RankingRule::Proximity),
            "attribute" => Ok(RankingRule::Attribute),
            "sort" => Ok(RankingRule::Sort),
            "exactness" => Ok(RankingRule::Exactness),
            other => match CUSTOM_RANKING_RULE.captures(other) {
                Some(caps) if &caps[2] == "asc" => Ok(RankingRule::Asc(caps[1].to_string())),
                Some(caps) => Ok(RankingRule::Desc(caps[1].to_string())),
                None => Err(GriddleError::InvalidSettings(format!(
                    "`{}` ranking rule is invalid. Valid ranking rules are words, typo, sort, proximity, attribute, exactness and custom ranking rules (`attribute:asc` or `attribute:desc`).",
                    other
                ))),
            },
        }
    }
}

impl fmt::Display for RankingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankingRule::Words => write!(f, "words"),
            RankingRule::Typo => write!(f, "typo"),
            RankingRule::Proximity => write!(f, "proximity"),
            RankingRule::Attribute => write!(f, "attribute"),
            RankingRule::Sort => write!(f, "sort"),
            RankingRule::Exactness => write!(f, "exactness"),
            RankingRule::Asc(attr) => write!(f, "{}:asc", attr),
            RankingRule::Desc(attr) => write!(f, "{}:desc", attr),
        }
    }
}

fn attribute_covered(list: &[String], attribute: &str) -> bool {
    list.iter().any(|a| {
        a == "*"
            || a == attribute
            || attribute
                .strip_prefix(a.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

impl IndexSettings {
    pub fn is_filterable(&self, attribute: &str) -> bool {
        attribute_covered(&self.filterable_attributes, attribute)
    }

    pub fn is_sortable(&self, attribute: &str) -> bool {
        attribute_covered(&self.sortable_attributes, attribute)
    }

    pub fn is_displayed(&self, attribute: &str) -> bool {
        attribute_covered(&self.displayed_attributes, attribute)
    }

    pub fn searches_all_attributes(&self) -> bool {
        self.searchable_attributes.iter().any(|a| a == "*")
    }

    pub fn filterable_list(&self) -> String {
        self.filterable_attributes.join(", ")
    }

    pub fn sortable_list(&self) -> String {
        self.sortable_attributes.join(", ")
    }

    pub fn parsed_ranking_rules(&self) -> Vec<RankingRule> {
        self.ranking_rules
            .iter()
            .filter_map(|r| r.parse().ok())
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        for rule in &self.ranking_rules {
            rule.parse::<RankingRule>()?;
        }
        let sizes = self.typo_tolerance.min_word_size_for_typos;
        if sizes.one_typo > sizes.two_typos {
            return Err(GriddleError::InvalidSettings(format!(
                "`minWordSizeForTypos` setting is invalid. `oneTypo` ({}) must be less than or equal to `twoTypos` ({}).",
                sizes.one_typo, sizes.two_typos
            )));
        }
        if self.faceting.max_values_per_facet == 0 {
            return Err(GriddleError::InvalidSettings(
                "`faceting.maxValuesPerFacet` must be greater than 0.".to_string(),
            ));
        }
        if self.pagination.max_total_hits == 0 {
            return Err(GriddleError::InvalidSettings(
                "`pagination.maxTotalHits` must be greater than 0.".to_string(),
            ));
        }
        Ok(())
    }

    /// Merge a partial update into a copy of these settings and validate the result.
    pub fn apply(&self, update: &SettingsUpdate) -> Result<IndexSettings> {
        let mut next = self.clone();
        update
            .searchable_attributes
            .apply_to(&mut next.searchable_attributes, default_searchable);
        update
            .filterable_attributes
            .apply_to(&mut next.filterable_attributes, Vec::new);
        update
            .sortable_attributes
            .apply_to(&mut next.sortable_attributes, Vec::new);
        update
            .displayed_attributes
            .apply_to(&mut next.displayed_attributes, default_displayed);
        update
            .ranking_rules
            .apply_to(&mut next.ranking_rules, default_ranking_rules);
        update.stop_words.apply_to(&mut next.stop_words, BTreeSet::new);
        update.synonyms.apply_to(&mut next.synonyms, BTreeMap::new);

        match &update.typo_tolerance {
            Setting::Set(typo) => typo.apply_to(&mut next.typo_tolerance),
            Setting::Reset => next.typo_tolerance = TypoTolerance::default(),
            Setting::NotSet => {}
        }
        match &update.faceting {
            Setting::Set(faceting) => {
                faceting
                    .max_values_per_facet
                    .apply_to(&mut next.faceting.max_values_per_facet, || 100);
                faceting.sort_facet_values_by.apply_to(
                    &mut next.faceting.sort_facet_values_by,
                    || FacetingSettings::default().sort_facet_values_by,
                );
            }
            Setting::Reset => next.faceting = FacetingSettings::default(),
            Setting::NotSet => {}
        }
        match &update.pagination {
            Setting::Set(pagination) => pagination
                .max_total_hits
                .apply_to(&mut next.pagination.max_total_hits, || 1000),
            Setting::Reset => next.pagination = PaginationSettings::default(),
            Setting::NotSet => {}
        }

        dedup_preserving_order(&mut next.filterable_attributes);
        dedup_preserving_order(&mut next.sortable_attributes);
        dedup_preserving_order(&mut next.searchable_attributes);
        dedup_preserving_order(&mut next.displayed_attributes);
        next.validate()?;
        Ok(next)
    }
}

fn dedup_preserving_order(values: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    values.retain(|v| seen.insert(v.clone()));
}

/// Tri-state field of a partial settings update: absent, explicit `null`, or a value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Setting<T> {
    Set(T),
    Reset,
    #[default]
    NotSet,
}

impl<T> Setting<T> {
    pub fn is_not_set(&self) -> bool {
        matches!(self, Setting::NotSet)
    }

    pub fn set(&self) -> Option<&T> {
        match self {
            Setting::Set(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: Clone> Setting<T> {
    fn apply_to(&self, target: &mut T, default: impl FnOnce() -> T) {
        match self {
            Setting::Set(v) => *target = v.clone(),
            Setting::Reset => *target = default(),
            Setting::NotSet => {}
        }
    }
}

impl<T: Serialize> Serialize for Setting<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Setting::Set(v) => v.serialize(serializer),
            Setting::Reset | Setting::NotSet => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Setting<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(|opt| match opt {
            Some(v) => Setting::Set(v),
            None => Setting::Reset,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub searchable_attributes: Setting<Vec<String>>,
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub filterable_attributes: Setting<Vec<String>>,
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub sortable_attributes: Setting<Vec<String>>,
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub displayed_attributes: Setting<Vec<String>>,
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub ranking_rules: Setting<Vec<String>>,
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub stop_words: Setting<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub synonyms: Setting<BTreeMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub typo_tolerance: Setting<TypoToleranceUpdate>,
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub faceting: Setting<FacetingUpdate>,
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub pagination: Setting<PaginationUpdate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypoToleranceUpdate {
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub enabled: Setting<bool>,
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub min_word_size_for_typos: Setting<MinWordSizeUpdate>,
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub disable_on_words: Setting<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub disable_on_attributes: Setting<BTreeSet<String>>,
}

impl TypoToleranceUpdate {
    fn apply_to(&self, target: &mut TypoTolerance) {
        self.enabled.apply_to(&mut target.enabled, || true);
        match &self.min_word_size_for_typos {
            Setting::Set(sizes) => {
                let defaults = MinWordSizeForTypos::default();
                sizes
                    .one_typo
                    .apply_to(&mut target.min_word_size_for_typos.one_typo, || defaults.one_typo);
                sizes
                    .two_typos
                    .apply_to(&mut target.min_word_size_for_typos.two_typos, || defaults.two_typos);
            }
            Setting::Reset => target.min_word_size_for_typos = MinWordSizeForTypos::default(),
            Setting::NotSet => {}
        }
        self.disable_on_words
            .apply_to(&mut target.disable_on_words, BTreeSet::new);
        self.disable_on_attributes
            .apply_to(&mut target.disable_on_attributes, BTreeSet::new);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinWordSizeUpdate {
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub one_typo: Setting<u8>,
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub two_typos: Setting<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetingUpdate {
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub max_values_per_facet: Setting<usize>,
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub sort_facet_values_by: Setting<BTreeMap<String, FacetValuesOrder>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationUpdate {
    #[serde(default, skip_serializing_if = "Setting::is_not_set")]
    pub max_total_hits: Setting<usize>,
}

impl SettingsUpdate {
    /// An update resetting every field to its default.
    pub fn reset_all() -> Self {
        SettingsUpdate {
            searchable_attributes: Setting::Reset,
            filterable_attributes: Setting::Reset,
            sortable_attributes: Setting::Reset,
            displayed_attributes: Setting::Reset,
            ranking_rules: Setting::Reset,
            stop_words: Setting::Reset,
            synonyms: Setting::Reset,
            typo_tolerance: Setting::Reset,
            faceting: Setting::Reset,
            pagination: Setting::Reset,
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &SettingsUpdate::default()
    }

    /// Checks that can run before the update is enqueued.
    pub fn validate(&self) -> Result<()> {
        if let Setting::Set(rules) = &self.ranking_rules {
            for rule in rules {
                rule.parse::<RankingRule>()?;
            }
        }
        if let Setting::Set(TypoToleranceUpdate {
            min_word_size_for_typos: Setting::Set(sizes),
            ..
        }) = &self.typo_tolerance
        {
            if let (Setting::Set(one), Setting::Set(two)) = (&sizes.one_typo, &sizes.two_typos) {
                if one > two {
                    return Err(GriddleError::InvalidSettings(format!(
                        "`minWordSizeForTypos` setting is invalid. `oneTypo` ({}) must be less than or equal to `twoTypos` ({}).",
                        one, two
                    )));
                }
            }
        }
        if let Setting::Set(FacetingUpdate {
            max_values_per_facet: Setting::Set(0),
            ..
        }) = &self.faceting
        {
            return Err(GriddleError::InvalidSettings(
                "`faceting.maxValuesPerFacet` must be greater than 0.".to_string(),
            ));
        }
        if let Setting::Set(PaginationUpdate {
            max_total_hits: Setting::Set(0),
        }) = &self.pagination
        {
            return Err(GriddleError::InvalidSettings(
                "`pagination.maxTotalHits` must be greater than 0.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Individually addressable settings fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingField {
    SearchableAttributes,
    FilterableAttributes,
    SortableAttributes,
    DisplayedAttributes,
    RankingRules,
    StopWords,
    Synonyms,
    TypoTolerance,
    Faceting,
    Pagination,
}

impl SettingField {
    pub const ALL: [SettingField; 10] = [
        SettingField::SearchableAttributes,
        SettingField::FilterableAttributes,
        SettingField::SortableAttributes,
        SettingField::DisplayedAttributes,
        SettingField::RankingRules,
        SettingField::StopWords,
        SettingField::Synonyms,
        SettingField::TypoTolerance,
        SettingField::Faceting,
        SettingField::Pagination,
    ];

    /// camelCase key in the settings record.
    pub fn key(&self) -> &'static str {
        match self {
            SettingField::SearchableAttributes => "searchableAttributes",
            SettingField::FilterableAttributes => "filterableAttributes",
            SettingField::SortableAttributes => "sortableAttributes",
            SettingField::DisplayedAttributes => "displayedAttributes",
            SettingField::RankingRules => "rankingRules",
            SettingField::StopWords => "stopWords",
            SettingField::Synonyms => "synonyms",
            SettingField::TypoTolerance => "typoTolerance",
            SettingField::Faceting => "faceting",
            SettingField::Pagination => "pagination",
        }
    }

    /// kebab-case route segment.
    pub fn route_name(&self) -> &'static str {
        match self {
            SettingField::SearchableAttributes => "searchable-attributes",
            SettingField::FilterableAttributes => "filterable-attributes",
            SettingField::SortableAttributes => "sortable-attributes",
            SettingField::DisplayedAttributes => "displayed-attributes",
            SettingField::RankingRules => "ranking-rules",
            SettingField::StopWords => "stop-words",
            SettingField::Synonyms => "synonyms",
            SettingField::TypoTolerance => "typo-tolerance",
            SettingField::Faceting => "faceting",
            SettingField::Pagination => "pagination",
        }
    }

    pub fn from_route_name(name: &str) -> Option<SettingField> {
        SettingField::ALL
            .into_iter()
            .find(|f| f.route_name() == name || f.key() == name)
    }

    pub fn get(&self, settings: &IndexSettings) -> Result<serde_json::Value> {
        let mut record = serde_json::to_value(settings)?;
        Ok(record
            .get_mut(self.key())
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null))
    }

    /// Build a single-field update from a raw JSON value (`null` resets).
    pub fn update(&self, value: serde_json::Value) -> Result<SettingsUpdate> {
        let mut body = serde_json::Map::new();
        body.insert(self.key().to_string(), value);
        serde_json::from_value(serde_json::Value::Object(body)).map_err(|e| {
            GriddleError::InvalidSettings(format!("invalid value for `{}`: {}", self.key(), e))
        })
    }

    pub fn reset(&self) -> SettingsUpdate {
        let mut update = SettingsUpdate::default();
        match self {
            SettingField::SearchableAttributes => update.searchable_attributes = Setting::Reset,
            SettingField::FilterableAttributes => update.filterable_attributes = Setting::Reset,
            SettingField::SortableAttributes => update.sortable_attributes = Setting::Reset,
            SettingField::DisplayedAttributes => update.displayed_attributes = Setting::Reset,
            SettingField::RankingRules => update.ranking_rules = Setting::Reset,
            SettingField::StopWords => update.stop_words = Setting::Reset,
            SettingField::Synonyms => update.synonyms = Setting::Reset,
            SettingField::TypoTolerance => update.typo_tolerance = Setting::Reset,
            SettingField::Faceting => update.faceting = Setting::Reset,
            SettingField::Pagination => update.pagination = Setting::Reset,
        }
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let settings = IndexSettings::default();
        assert_eq!(settings.searchable_attributes, vec!["*"]);
        assert_eq!(
            settings.ranking_rules,
            vec!["words", "typo", "proximity", "attribute", "sort", "exactness"]
        );
        assert_eq!(settings.typo_tolerance.min_word_size_for_typos.one_typo, 5);
        assert_eq!(settings.typo_tolerance.min_word_size_for_typos.two_typos, 9);
        assert_eq!(settings.faceting.max_values_per_facet, 100);
        assert_eq!(settings.pagination.max_total_hits, 1000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: IndexSettings =
            serde_json::from_value(json!({"filterableAttributes": ["genre"]})).unwrap();
        assert_eq!(settings.filterable_attributes, vec!["genre"]);
        assert_eq!(settings.displayed_attributes, vec!["*"]);
        assert!(settings.typo_tolerance.enabled);
    }

    #[test]
    fn test_update_null_resets_field() {
        let base = IndexSettings::default()
            .apply(&SettingsUpdate {
                stop_words: Setting::Set(["the".to_string()].into()),
                ..Default::default()
            })
            .unwrap();
        assert!(base.stop_words.contains("the"));

        let update: SettingsUpdate =
            serde_json::from_value(json!({"stopWords": null})).unwrap();
        assert_eq!(update.stop_words, Setting::Reset);
        assert!(update.filterable_attributes.is_not_set());
        let next = base.apply(&update).unwrap();
        assert!(next.stop_words.is_empty());
    }

    #[test]
    fn test_partial_typo_tolerance_merges() {
        let update: SettingsUpdate = serde_json::from_value(json!({
            "typoTolerance": {"minWordSizeForTypos": {"oneTypo": 4}}
        }))
        .unwrap();
        let next = IndexSettings::default().apply(&update).unwrap();
        assert_eq!(next.typo_tolerance.min_word_size_for_typos.one_typo, 4);
        assert_eq!(next.typo_tolerance.min_word_size_for_typos.two_typos, 9);
        assert!(next.typo_tolerance.enabled);
    }

    #[test]
    fn test_invalid_ranking_rule_rejected() {
        let update = SettingsUpdate {
            ranking_rules: Setting::Set(vec!["words".into(), "price:up".into()]),
            ..Default::default()
        };
        assert!(matches!(
            update.validate(),
            Err(GriddleError::InvalidSettings(_))
        ));
        assert_eq!(
            "release_date:desc".parse::<RankingRule>().unwrap(),
            RankingRule::Desc("release_date".into())
        );
    }

    #[test]
    fn test_typo_thresholds_must_be_ordered() {
        let update: SettingsUpdate = serde_json::from_value(json!({
            "typoTolerance": {"minWordSizeForTypos": {"oneTypo": 10}}
        }))
        .unwrap();
        // passes the standalone check, fails against the merged record
        assert!(update.validate().is_ok());
        assert!(IndexSettings::default().apply(&update).is_err());
    }

    #[test]
    fn test_allowed_typos_by_length() {
        let typo = TypoTolerance::default();
        assert_eq!(typo.allowed_typos("cat"), 0);
        assert_eq!(typo.allowed_typos("chair"), 1);
        assert_eq!(typo.allowed_typos("ergonomic"), 2);
        let disabled = TypoTolerance {
            disable_on_words: ["ergonomic".to_string()].into(),
            ..Default::default()
        };
        assert_eq!(disabled.allowed_typos("ergonomic"), 0);
    }

    #[test]
    fn test_nested_attribute_filterable() {
        let settings = IndexSettings {
            filterable_attributes: vec!["author".into()],
            ..Default::default()
        };
        assert!(settings.is_filterable("author"));
        assert!(settings.is_filterable("author.name"));
        assert!(!settings.is_filterable("authors"));
    }

    #[test]
    fn test_setting_field_roundtrip() {
        let field = SettingField::from_route_name("filterable-attributes").unwrap();
        let update = field.update(json!(["genre", "year"])).unwrap();
        let next = IndexSettings::default().apply(&update).unwrap();
        assert_eq!(field.get(&next).unwrap(), json!(["genre", "year"]));

        let reset = field.reset();
        assert_eq!(reset.filterable_attributes, Setting::Reset);
        assert!(IndexSettings::default()
            .apply(&reset)
            .unwrap()
            .filterable_attributes
            .is_empty());
    }

    #[test]
    fn test_reset_all_is_idempotent() {
        let once = IndexSettings::default()
            .apply(&SettingsUpdate::reset_all())
            .unwrap();
        let twice = once.apply(&SettingsUpdate::reset_all()).unwrap();
        assert_eq!(once, IndexSettings::default());
        assert_eq!(once, twice);
    }
}
