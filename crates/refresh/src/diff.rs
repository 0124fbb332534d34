//! Snapshot differ: carries forward coordinates whose geocoding input is
//! unchanged and collects the minimal key set that needs re-geocoding.

use std::collections::{BTreeSet, HashMap};

use common::{EnrichedRecord, RawRecord};

/// Result of diffing a fetch against the previous snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiffOutcome {
    /// The fetched records, with previous coordinates attached where the
    /// geocoding input is unchanged. Fetch order preserved.
    pub merged: Vec<EnrichedRecord>,
    /// Distinct geocoding inputs that must be recomputed. Deduplicated —
    /// one key may serve several records.
    pub keys_to_enrich: BTreeSet<String>,
}

/// Diff the freshly fetched record set against the previous snapshot data.
///
/// A record whose key matches its previous version keeps its previous
/// coordinates and is never re-geocoded, even if that earlier geocoding
/// found no location. New records and records with a new or changed key
/// contribute their key to `keys_to_enrich`; records without a key are
/// passed through ungeocodable, keeping whatever coordinates their
/// previous version had.
pub fn diff(previous: &[EnrichedRecord], fetched: Vec<RawRecord>) -> DiffOutcome {
    let prior: HashMap<&str, &EnrichedRecord> =
        previous.iter().map(|r| (r.id(), r)).collect();

    let mut merged = Vec::with_capacity(fetched.len());
    let mut keys_to_enrich = BTreeSet::new();

    for record in fetched {
        let cached = prior.get(record.id.as_str()).copied();
        let key_unchanged = match (cached, record.enrichment_key.as_deref()) {
            (Some(prev), Some(key)) => prev.enrichment_key() == Some(key),
            _ => false,
        };

        let coordinates = if key_unchanged {
            cached.and_then(|prev| prev.coordinates)
        } else {
            match &record.enrichment_key {
                Some(key) => {
                    keys_to_enrich.insert(key.clone());
                    None
                }
                // No key means nothing to re-geocode; the record keeps
                // the pin its previous version had.
                None => cached.and_then(|prev| prev.coordinates),
            }
        };

        merged.push(EnrichedRecord {
            record,
            coordinates,
        });
    }

    DiffOutcome {
        merged,
        keys_to_enrich,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Coordinates;

    fn raw(id: &str, key: Option<&str>) -> RawRecord {
        RawRecord {
            id: id.into(),
            created_time: None,
            fields: serde_json::Map::new(),
            enrichment_key: key.map(Into::into),
        }
    }

    fn enriched(id: &str, key: Option<&str>, coords: Option<Coordinates>) -> EnrichedRecord {
        EnrichedRecord {
            record: raw(id, key),
            coordinates: coords,
        }
    }

    #[test]
    fn test_unchanged_key_carries_coordinates_forward() {
        let previous = vec![enriched("r1", Some("H0H0H0"), Some(Coordinates(45.0, -73.0)))];
        let outcome = diff(&previous, vec![raw("r1", Some("H0H0H0"))]);

        assert_eq!(outcome.merged.len(), 1);
        assert_eq!(outcome.merged[0].coordinates, Some(Coordinates(45.0, -73.0)));
        assert!(outcome.keys_to_enrich.is_empty());
    }

    #[test]
    fn test_changed_key_drops_coordinates_and_marks() {
        let previous = vec![enriched("r1", Some("H0H0H0"), Some(Coordinates(45.0, -73.0)))];
        let outcome = diff(&previous, vec![raw("r1", Some("H1H1H1"))]);

        assert_eq!(outcome.merged[0].coordinates, None);
        assert_eq!(
            outcome.keys_to_enrich.iter().collect::<Vec<_>>(),
            vec!["H1H1H1"]
        );
    }

    #[test]
    fn test_new_record_marks_its_key() {
        let outcome = diff(&[], vec![raw("r1", Some("G2G2G2")), raw("r2", None)]);

        assert_eq!(outcome.merged.len(), 2);
        assert!(outcome.keys_to_enrich.contains("G2G2G2"));
        assert_eq!(outcome.keys_to_enrich.len(), 1);
    }

    #[test]
    fn test_shared_keys_are_deduplicated() {
        let fetched = vec![
            raw("r1", Some("H1H1H1")),
            raw("r2", Some("H1H1H1")),
            raw("r3", Some("H2H2H2")),
        ];
        let outcome = diff(&[], fetched);

        assert_eq!(outcome.keys_to_enrich.len(), 2);
        assert!(outcome.keys_to_enrich.contains("H1H1H1"));
        assert!(outcome.keys_to_enrich.contains("H2H2H2"));
    }

    #[test]
    fn test_unchanged_key_with_no_previous_match_is_not_retried() {
        // Earlier geocoding found nothing for this key; as long as the key
        // does not change the record is not re-submitted.
        let previous = vec![enriched("r1", Some("X0X0X0"), None)];
        let outcome = diff(&previous, vec![raw("r1", Some("X0X0X0"))]);

        assert_eq!(outcome.merged[0].coordinates, None);
        assert!(outcome.keys_to_enrich.is_empty());
    }

    #[test]
    fn test_record_losing_its_key_keeps_its_coordinates() {
        let previous = vec![enriched("r1", Some("H0H0H0"), Some(Coordinates(45.0, -73.0)))];
        let outcome = diff(&previous, vec![raw("r1", None)]);

        assert_eq!(outcome.merged[0].coordinates, Some(Coordinates(45.0, -73.0)));
        assert!(outcome.keys_to_enrich.is_empty());
    }

    #[test]
    fn test_record_gaining_a_key_is_marked() {
        let previous = vec![enriched("r1", None, None)];
        let outcome = diff(&previous, vec![raw("r1", Some("J3J3J3"))]);

        assert!(outcome.keys_to_enrich.contains("J3J3J3"));
    }

    #[test]
    fn test_second_pass_after_enrichment_is_a_fixpoint() {
        let fetched = || vec![raw("r1", Some("H1H1H1")), raw("r2", Some("H2H2H2"))];

        let first = diff(&[], fetched());
        assert_eq!(first.keys_to_enrich.len(), 2);

        // Apply enrichment back into the merged set to form the new
        // "previous"; the same fetch must then be a no-op.
        let mut applied = first.merged.clone();
        applied[0].coordinates = Some(Coordinates(46.0, -72.0));
        applied[1].coordinates = Some(Coordinates(47.0, -71.0));

        let second = diff(&applied, fetched());
        assert!(second.keys_to_enrich.is_empty());
        assert_eq!(second.merged, applied);
    }

    #[test]
    fn test_removed_record_is_dropped_from_merge() {
        let previous = vec![
            enriched("r1", Some("H0H0H0"), Some(Coordinates(45.0, -73.0))),
            enriched("r2", Some("H5H5H5"), Some(Coordinates(48.0, -68.0))),
        ];
        let outcome = diff(&previous, vec![raw("r2", Some("H5H5H5"))]);

        assert_eq!(outcome.merged.len(), 1);
        assert_eq!(outcome.merged[0].id(), "r2");
        assert!(outcome.keys_to_enrich.is_empty());
    }
}
