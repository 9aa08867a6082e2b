//! Granule query parameters.
//!
//! A [`GranuleQuery`] is built once per run and never mutated. It knows how to
//! render itself as the CMR query string (`concept_id`, `temporal`, `page_size`).

use std::fmt;
use std::num::NonZeroU32;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::error::{SearchError, SearchResult};

/// Timestamp layout required by the CMR `temporal` parameter (UTC, second precision).
pub const CMR_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Non-empty list of collection (concept) identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collections(Vec<String>);

impl Collections {
    /// Build from any list of identifiers. Blank identifiers are rejected, as is an empty list.
    pub fn new<I, S>(ids: I) -> SearchResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids
            .into_iter()
            .map(|s| s.into().trim().to_string())
            .collect();

        if ids.is_empty() {
            return Err(SearchError::InvalidQuery(
                "at least one collection identifier is required".to_string(),
            ));
        }
        if ids.iter().any(|id| id.is_empty()) {
            return Err(SearchError::InvalidQuery(
                "collection identifiers must not be blank".to_string(),
            ));
        }

        Ok(Self(ids))
    }

    /// A single identifier, normalized to a one-element list.
    pub fn single(id: impl Into<String>) -> SearchResult<Self> {
        Self::new([id.into()])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<&str> for Collections {
    type Error = SearchError;

    fn try_from(id: &str) -> SearchResult<Self> {
        Self::single(id)
    }
}

impl TryFrom<String> for Collections {
    type Error = SearchError;

    fn try_from(id: String) -> SearchResult<Self> {
        Self::single(id)
    }
}

impl TryFrom<Vec<String>> for Collections {
    type Error = SearchError;

    fn try_from(ids: Vec<String>) -> SearchResult<Self> {
        Self::new(ids)
    }
}

impl TryFrom<&[&str]> for Collections {
    type Error = SearchError;

    fn try_from(ids: &[&str]) -> SearchResult<Self> {
        Self::new(ids.iter().copied())
    }
}

/// Collection identifiers as they appear in configuration: one string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CollectionSpec {
    One(String),
    Many(Vec<String>),
}

impl TryFrom<CollectionSpec> for Collections {
    type Error = SearchError;

    fn try_from(spec: CollectionSpec) -> SearchResult<Self> {
        match spec {
            CollectionSpec::One(id) => Collections::single(id),
            CollectionSpec::Many(ids) => Collections::new(ids),
        }
    }
}

/// Half-open acquisition time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TemporalRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> SearchResult<Self> {
        if start > end {
            return Err(SearchError::InvalidQuery(format!(
                "temporal range start {} is after end {}",
                start.format(CMR_TIMESTAMP_FORMAT),
                end.format(CMR_TIMESTAMP_FORMAT)
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// `start,end` in CMR timestamp format.
    pub fn to_cmr_param(&self) -> String {
        format!(
            "{},{}",
            self.start.format(CMR_TIMESTAMP_FORMAT),
            self.end.format(CMR_TIMESTAMP_FORMAT)
        )
    }
}

impl fmt::Display for TemporalRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cmr_param())
    }
}

/// Parse a user-supplied timestamp.
///
/// Accepts RFC 3339 (`2021-10-17T00:00:00Z`), a naive datetime taken as UTC
/// (`2021-10-17T00:00:00`), or a bare date (`2021-10-17`, midnight UTC).
pub fn parse_timestamp(s: &str) -> SearchResult<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    if let Some(ndt) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(SearchError::InvalidQuery(format!("unrecognized timestamp: {s}")))
}

/// Immutable search request for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GranuleQuery {
    collections: Collections,
    temporal: TemporalRange,
    page_size: NonZeroU32,
}

impl GranuleQuery {
    pub fn new(
        collections: Collections,
        temporal: TemporalRange,
        page_size: u32,
    ) -> SearchResult<Self> {
        let page_size = NonZeroU32::new(page_size).ok_or_else(|| {
            SearchError::InvalidQuery("page size must be greater than zero".to_string())
        })?;

        Ok(Self {
            collections,
            temporal,
            page_size,
        })
    }

    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    pub fn temporal(&self) -> &TemporalRange {
        &self.temporal
    }

    pub fn page_size(&self) -> NonZeroU32 {
        self.page_size
    }

    /// Query pairs in CMR form. `concept_id` repeats once per collection.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs: Vec<(&'static str, String)> = self
            .collections
            .as_slice()
            .iter()
            .map(|id| ("concept_id", id.clone()))
            .collect();
        pairs.push(("temporal", self.temporal.to_cmr_param()));
        pairs.push(("page_size", self.page_size.to_string()));
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_single_string_matches_one_element_list() {
        let single = Collections::try_from("C1373412034-LPDAAC_ECS").unwrap();
        let list = Collections::try_from(vec!["C1373412034-LPDAAC_ECS".to_string()]).unwrap();
        assert_eq!(single, list);
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_collection_spec_normalizes() {
        let one: CollectionSpec = serde_json::from_str(r#""C1""#).unwrap();
        let many: CollectionSpec = serde_json::from_str(r#"["C1"]"#).unwrap();
        assert_eq!(
            Collections::try_from(one).unwrap(),
            Collections::try_from(many).unwrap()
        );
    }

    #[test]
    fn test_empty_collections_rejected() {
        assert!(Collections::new(Vec::<String>::new()).is_err());
        assert!(Collections::single("  ").is_err());
    }

    #[test]
    fn test_temporal_param_format() {
        let range = TemporalRange::new(ts("2021-10-17"), ts("2021-10-19T06:30:00Z")).unwrap();
        assert_eq!(range.to_cmr_param(), "2021-10-17T00:00:00Z,2021-10-19T06:30:00Z");
    }

    #[test]
    fn test_temporal_rejects_reversed_range() {
        let err = TemporalRange::new(ts("2021-10-19"), ts("2021-10-17")).unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery(_)));
    }

    #[test]
    fn test_temporal_allows_empty_range() {
        let t = ts("2021-10-17T12:00:00");
        assert!(TemporalRange::new(t, t).is_ok());
    }

    #[test]
    fn test_parse_timestamp_offsets_to_utc() {
        assert_eq!(ts("2021-10-17T02:00:00+02:00"), ts("2021-10-17T00:00:00Z"));
        assert!(parse_timestamp("17/10/2021").is_err());
    }

    #[test]
    fn test_query_pairs_repeat_concept_id() {
        let collections = Collections::new(["C1", "C2"]).unwrap();
        let temporal = TemporalRange::new(ts("2021-10-17"), ts("2021-10-19")).unwrap();
        let query = GranuleQuery::new(collections, temporal, 10).unwrap();

        let pairs = query.query_pairs();
        assert_eq!(
            pairs,
            vec![
                ("concept_id", "C1".to_string()),
                ("concept_id", "C2".to_string()),
                ("temporal", "2021-10-17T00:00:00Z,2021-10-19T00:00:00Z".to_string()),
                ("page_size", "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let collections = Collections::single("C1").unwrap();
        let temporal = TemporalRange::new(ts("2021-10-17"), ts("2021-10-19")).unwrap();
        assert!(GranuleQuery::new(collections, temporal, 0).is_err());
    }
}
