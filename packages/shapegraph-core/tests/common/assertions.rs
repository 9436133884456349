//! Custom assertions for memory-state verification

use shapegraph_core::features::smg::HasValueEdge;
use shapegraph_core::{ObjectId, Property, SmgState};

/// Assert that the state carries no diagnostics
pub fn assert_no_errors(state: &SmgState) {
    assert!(
        !state.has_errors(),
        "Expected no errors, got: {:?}",
        state.errors().collect::<Vec<_>>()
    );
}

/// Assert the number of diagnostics of one property
pub fn assert_errors_of(state: &SmgState, property: Property, expected: usize) {
    assert_eq!(
        state.errors_of(property),
        expected,
        "Expected {expected} {} errors, got: {:?}",
        property.as_str(),
        state.errors().collect::<Vec<_>>()
    );
}

/// Edges of a region, sorted by offset
pub fn edges(state: &SmgState, object: ObjectId) -> Vec<HasValueEdge> {
    let mut edges: Vec<HasValueEdge> = state.spc().smg().edges_of(object).cloned().collect();
    edges.sort_by(|a, b| a.offset.cmp(&b.offset));
    edges
}

/// Assert that no two has-value edges of a region overlap
pub fn assert_no_overlapping_edges(state: &SmgState, object: ObjectId) {
    let edges = edges(state, object);
    for pair in edges.windows(2) {
        assert!(
            pair[0].end() <= pair[1].offset,
            "Overlapping edges in {object}: {:?}",
            pair
        );
    }
}
