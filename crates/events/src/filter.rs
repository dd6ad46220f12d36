//! Projection-query filter rewriting.
//!
//! Callers author filters against a projection's logical schema
//! (`{saltAdded: {$gt: 0}}`), but storage places projection state under
//! `projections.<name>`. [`rewrite_filter`] rewrites bare field keys so the
//! filter can be evaluated directly against stream documents.
//!
//! Not idempotent: re-applying with the same nested path doubly-nests the
//! path (see the test at the bottom of this module) — callers must not
//! double-apply.

use bson::{Bson, Document};
use tracing::debug;

const LOGICAL_OPERATORS: [&str; 3] = ["$and", "$or", "$nor"];
const FIELD_SCOPE_OPERATORS: [&str; 4] = ["$not", "$expr", "$jsonSchema", "$where"];

/// Operators whose operand is itself relative to a matched element or
/// geometry, not to the stream document — their operand passes through
/// unrewritten.
const OPAQUE_OPERAND_OPERATORS: [&str; 5] =
    ["$elemMatch", "$geoWithin", "$geoIntersects", "$near", "$nearSphere"];

fn is_operator_document(doc: &Document) -> bool {
    !doc.is_empty() && doc.keys().all(|k| k.starts_with('$'))
}

/// Rewrite `filter` so every bare field key is prefixed with `nested_path`.
pub fn rewrite_filter(filter: &Document, nested_path: &str) -> Document {
    let mut result = Document::new();

    for (key, value) in filter {
        if LOGICAL_OPERATORS.contains(&key.as_str()) {
            result.insert(key.clone(), rewrite_logical_operand(value, nested_path));
        } else if FIELD_SCOPE_OPERATORS.contains(&key.as_str()) {
            result.insert(key.clone(), rewrite_field_scope_operand(value, nested_path));
        } else if key.starts_with('$') {
            // Unrecognized top-level operator: leave untouched rather than
            // guess at its operand shape.
            debug!(operator = %key, "passing unrecognized top-level filter operator through unrewritten");
            result.insert(key.clone(), value.clone());
        } else {
            let nested_key = format!("{nested_path}.{key}");
            result.insert(nested_key, rewrite_field_value(value));
        }
    }

    result
}

/// Rewrite the keys of `sort` the same way, for `findMultipleProjections`'s
/// `sort` option (spec.md §4.7).
pub fn rewrite_sort(sort: &Document, nested_path: &str) -> Document {
    let mut result = Document::new();
    for (key, value) in sort {
        result.insert(format!("{nested_path}.{key}"), value.clone());
    }
    result
}

/// `$and`/`$or`/`$nor` carry an array of sub-filters; each element is
/// rewritten recursively if it is a plain document, otherwise passed
/// through unchanged.
fn rewrite_logical_operand(value: &Bson, nested_path: &str) -> Bson {
    match value {
        Bson::Array(items) => Bson::Array(
            items
                .iter()
                .map(|item| match item {
                    Bson::Document(doc) => Bson::Document(rewrite_filter(doc, nested_path)),
                    other => other.clone(),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

/// `$not`/`$expr`/`$jsonSchema`/`$where` carry a single sub-filter.
fn rewrite_field_scope_operand(value: &Bson, nested_path: &str) -> Bson {
    match value {
        Bson::Document(doc) => Bson::Document(rewrite_filter(doc, nested_path)),
        other => other.clone(),
    }
}

/// A bare field key's value: if it is operator-shaped, its operators pass
/// through (value operators untouched, opaque-operand operators untouched);
/// primitives, dates and regexes pass through unchanged; a plain embedded
/// document is a literal equality value and also passes through unchanged.
fn rewrite_field_value(value: &Bson) -> Bson {
    match value {
        Bson::Document(doc) if is_operator_document(doc) => {
            Bson::Document(rewrite_operator_document(doc))
        }
        other => other.clone(),
    }
}

fn rewrite_operator_document(doc: &Document) -> Document {
    let mut result = Document::new();
    for (op, operand) in doc {
        if OPAQUE_OPERAND_OPERATORS.contains(&op.as_str()) {
            result.insert(op.clone(), operand.clone());
        } else {
            // $eq/$ne/$gt/$gte/$lt/$lte/$in/$nin/$exists/$type/$size/$regex/
            // $options/$mod/$all/$bitsAll*/$bitsAny* and any other value
            // operator: the operand is a literal value or value list, not a
            // filter document, so it passes through untouched.
            result.insert(op.clone(), operand.clone());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn rewrites_bare_field_keys() {
        let filter = doc! { "saltAdded": { "$gt": 0 } };
        let rewritten = rewrite_filter(&filter, "projections.test");
        assert_eq!(rewritten, doc! { "projections.test.saltAdded": { "$gt": 0 } });
    }

    #[test]
    fn rewrites_nested_logical_operators() {
        let filter = doc! {
            "$or": [
                { "status": "active" },
                { "$and": [
                    { "status": "pending" },
                    { "priority": { "$in": ["high", "critical"] } },
                ] },
            ],
            "createdAt": { "$gte": 100 },
        };

        let rewritten = rewrite_filter(&filter, "projections.test");

        let expected = doc! {
            "$or": [
                { "projections.test.status": "active" },
                { "$and": [
                    { "projections.test.status": "pending" },
                    { "projections.test.priority": { "$in": ["high", "critical"] } },
                ] },
            ],
            "projections.test.createdAt": { "$gte": 100 },
        };

        assert_eq!(rewritten, expected);
    }

    #[test]
    fn elem_match_operand_is_untouched() {
        let filter = doc! {
            "items": { "$elemMatch": { "qty": { "$gt": 1 }, "sku": "abc" } },
        };
        let rewritten = rewrite_filter(&filter, "projections.test");
        assert_eq!(
            rewritten,
            doc! {
                "projections.test.items": { "$elemMatch": { "qty": { "$gt": 1 }, "sku": "abc" } },
            }
        );
    }

    #[test]
    fn geo_operand_with_geometry_is_untouched() {
        let filter = doc! {
            "location": { "$geoWithin": { "$geometry": { "type": "Polygon", "coordinates": [] } } },
        };
        let rewritten = rewrite_filter(&filter, "projections.test");
        assert_eq!(
            rewritten,
            doc! {
                "projections.test.location": {
                    "$geoWithin": { "$geometry": { "type": "Polygon", "coordinates": [] } },
                },
            }
        );
    }

    #[test]
    fn not_field_scope_operator_recurses() {
        let filter = doc! { "$not": { "status": "active" } };
        let rewritten = rewrite_filter(&filter, "projections.test");
        assert_eq!(rewritten, doc! { "$not": { "projections.test.status": "active" } });
    }

    #[test]
    fn primitives_and_value_operators_pass_through() {
        let filter = doc! { "count": 5, "name": { "$ne": "foo" } };
        let rewritten = rewrite_filter(&filter, "projections.test");
        assert_eq!(
            rewritten,
            doc! { "projections.test.count": 5, "projections.test.name": { "$ne": "foo" } }
        );
    }

    #[test]
    fn double_application_is_not_idempotent() {
        let filter = doc! { "status": "active" };
        let once = rewrite_filter(&filter, "projections.test");
        let twice = rewrite_filter(&once, "projections.test");
        assert_eq!(twice, doc! { "projections.test.projections.test.status": "active" });
        assert_ne!(once, twice);
    }

    #[test]
    fn sort_keys_are_rewritten() {
        let sort = doc! { "saltAdded": -1 };
        let rewritten = rewrite_sort(&sort, "projections.test");
        assert_eq!(rewritten, doc! { "projections.test.saltAdded": -1 });
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 128,
                ..ProptestConfig::default()
            })]

            /// Property (spec.md §4.3): every bare top-level field key comes
            /// back prefixed with `nested_path`, and rewriting neither drops
            /// nor introduces keys.
            #[test]
            fn bare_keys_are_always_prefixed_and_key_count_is_preserved(
                keys in prop::collection::hash_set("[a-zA-Z]{1,8}", 1..6),
                nested_path in "[a-zA-Z]{1,8}(\\.[a-zA-Z]{1,8}){0,2}",
            ) {
                let mut filter = Document::new();
                for (i, key) in keys.iter().enumerate() {
                    filter.insert(key.clone(), i as i64);
                }

                let rewritten = rewrite_filter(&filter, &nested_path);

                prop_assert_eq!(rewritten.len(), filter.len());
                let prefix = format!("{nested_path}.");
                for key in rewritten.keys() {
                    prop_assert!(key.starts_with(&prefix));
                }
            }
        }
    }
}
