//! Persistent Symbolic Memory Graph store
//!
//! ```text
//! Smg ::= Objects × HasValue × PointsTo
//!
//! HasValue = ObjectId → (offset → (size, SmgValueId))   ordered by offset
//! PointsTo = SmgValueId → (ObjectId, offset)
//! Address  = (ObjectId, offset) → SmgValueId             reverse index
//! ```
//!
//! Every operation takes `&self` and returns a new graph. The `rpds`
//! containers share structure, so a copy costs O(log n) per touched entry
//! and old snapshots stay valid for other branches.
//!
//! Within one object, has-value edges never overlap. A write first removes
//! every intersecting edge; zero edges are cut down to the parts outside the
//! written range, other edges disappear completely.

use super::domain::{HasValueEdge, ObjectId, ObjectKind, PointsToEdge, SmgObject, SmgValueId};
use crate::errors::{SmgError, SmgResult};
use crate::features::program_state::value::Value;
use num_bigint::BigInt;
use rpds::{HashTrieMapSync, HashTrieSetSync, RedBlackTreeMapSync};
use rustc_hash::FxHashSet;

type EdgeTree = RedBlackTreeMapSync<BigInt, HasValueEdge>;

#[derive(Debug, Clone)]
pub struct Smg {
    objects: HashTrieMapSync<ObjectId, SmgObject>,
    invalid: HashTrieSetSync<ObjectId>,
    has_value_edges: HashTrieMapSync<ObjectId, EdgeTree>,
    points_to: HashTrieMapSync<SmgValueId, PointsToEdge>,
    addresses: HashTrieMapSync<(ObjectId, BigInt), SmgValueId>,
    next_object: u64,
    next_value: u64,
}

impl Default for Smg {
    fn default() -> Self {
        Self::new()
    }
}

impl Smg {
    /// Graph holding only the null region and the zero value pointing to it
    pub fn new() -> Self {
        let zero_offset = BigInt::from(0);
        Self {
            objects: HashTrieMapSync::new_sync().insert(ObjectId::NULL, SmgObject::null()),
            invalid: HashTrieSetSync::new_sync().insert(ObjectId::NULL),
            has_value_edges: HashTrieMapSync::new_sync(),
            points_to: HashTrieMapSync::new_sync().insert(
                SmgValueId::ZERO,
                PointsToEdge {
                    target: ObjectId::NULL,
                    offset: zero_offset.clone(),
                },
            ),
            addresses: HashTrieMapSync::new_sync()
                .insert((ObjectId::NULL, zero_offset), SmgValueId::ZERO),
            next_object: 1,
            next_value: 1,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Objects
    // ═══════════════════════════════════════════════════════════════════════

    pub fn copy_and_create_object(
        &self,
        size: Value,
        kind: ObjectKind,
        label: impl Into<String>,
    ) -> (Smg, SmgObject) {
        let object = SmgObject {
            id: ObjectId(self.next_object),
            size,
            offset: BigInt::from(0),
            kind,
            label: label.into(),
        };
        (self.copy_and_add_object(object.clone()), object)
    }

    pub fn copy_and_add_object(&self, object: SmgObject) -> Smg {
        let mut smg = self.clone();
        smg.next_object = smg.next_object.max(object.id.0 + 1);
        smg.invalid.remove_mut(&object.id);
        smg.objects.insert_mut(object.id, object);
        smg
    }

    pub fn object(&self, id: ObjectId) -> Option<&SmgObject> {
        self.objects.get(&id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &SmgObject> + '_ {
        self.objects.values()
    }

    /// Present and not invalidated; the null region is never valid
    pub fn is_valid(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id) && !self.invalid.contains(&id)
    }

    /// Mark invalid and drop the object's has-value edges
    pub fn copy_and_invalidate_object(&self, id: ObjectId) -> Smg {
        let mut smg = self.clone();
        smg.invalid.insert_mut(id);
        smg.has_value_edges.remove_mut(&id);
        smg
    }

    /// Forget the object; pointers into it are left dangling
    pub fn copy_and_remove_object(&self, id: ObjectId) -> Smg {
        if id.is_null() {
            return self.clone();
        }
        let mut smg = self.clone();
        smg.objects.remove_mut(&id);
        smg.invalid.remove_mut(&id);
        smg.has_value_edges.remove_mut(&id);
        smg
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Values
    // ═══════════════════════════════════════════════════════════════════════

    pub fn copy_and_create_fresh_value(&self) -> (Smg, SmgValueId) {
        let id = SmgValueId(self.next_value);
        (self.copy_and_add_value(id), id)
    }

    /// Reserve `id` so fresh values never collide with it
    pub fn copy_and_add_value(&self, id: SmgValueId) -> Smg {
        let mut smg = self.clone();
        smg.next_value = smg.next_value.max(id.0 + 1);
        smg
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Has-value edges
    // ═══════════════════════════════════════════════════════════════════════

    /// Edges of `object`, ordered by offset
    pub fn edges_of(&self, object: ObjectId) -> impl Iterator<Item = &HasValueEdge> + '_ {
        self.has_value_edges
            .get(&object)
            .into_iter()
            .flat_map(|tree| tree.values())
    }

    pub fn edge_count(&self, object: ObjectId) -> usize {
        self.has_value_edges
            .get(&object)
            .map(|tree| tree.size())
            .unwrap_or(0)
    }

    /// Edges intersecting `[offset, offset + size)`, ordered by offset
    pub fn edges_in_range(
        &self,
        object: ObjectId,
        offset: &BigInt,
        size: &BigInt,
    ) -> Vec<HasValueEdge> {
        let Some(tree) = self.has_value_edges.get(&object) else {
            return Vec::new();
        };
        let end = offset + size;
        let mut edges = Vec::new();
        // edges are disjoint, so only the closest predecessor can reach into the range
        if let Some((_, before)) = tree.range(..offset.clone()).last() {
            if before.overlaps(offset, size) {
                edges.push(before.clone());
            }
        }
        edges.extend(tree.range(offset.clone()..end).map(|(_, edge)| edge.clone()));
        edges
    }

    pub fn remove_edges_overlapping(&self, object: ObjectId, offset: &BigInt, size: &BigInt) -> Smg {
        let overlapping = self.edges_in_range(object, offset, size);
        if overlapping.is_empty() {
            return self.clone();
        }

        let end = offset + size;
        let mut tree = self.edge_tree(object);
        for edge in overlapping {
            tree.remove_mut(&edge.offset);
            if !edge.value.is_zero() {
                continue;
            }
            if &edge.offset < offset {
                let left = HasValueEdge::new(edge.offset.clone(), offset - &edge.offset, SmgValueId::ZERO);
                tree.insert_mut(left.offset.clone(), left);
            }
            let edge_end = edge.end();
            if edge_end > end {
                let right = HasValueEdge::new(end.clone(), edge_end - &end, SmgValueId::ZERO);
                tree.insert_mut(right.offset.clone(), right);
            }
        }

        let mut smg = self.clone();
        smg.has_value_edges.insert_mut(object, tree);
        smg
    }

    /// Store `value` at `[offset, offset + size)` replacing what was there
    pub fn write_value(
        &self,
        object: ObjectId,
        offset: &BigInt,
        size: &BigInt,
        value: SmgValueId,
    ) -> Smg {
        if size <= &BigInt::from(0) {
            return self.clone();
        }
        let mut smg = self.remove_edges_overlapping(object, offset, size);
        let mut tree = smg.edge_tree(object);
        tree.insert_mut(offset.clone(), HasValueEdge::new(offset.clone(), size.clone(), value));
        smg.has_value_edges.insert_mut(object, tree);
        smg
    }

    /// Value of the edge exactly at `[offset, offset + size)`
    pub fn read_exact(&self, object: ObjectId, offset: &BigInt, size: &BigInt) -> Option<SmgValueId> {
        self.has_value_edges
            .get(&object)
            .and_then(|tree| tree.get(offset))
            .filter(|edge| &edge.size == size)
            .map(|edge| edge.value)
    }

    pub fn is_covered_by_zero_edges(&self, object: ObjectId, offset: &BigInt, size: &BigInt) -> bool {
        let end = offset + size;
        let mut cursor = offset.clone();
        for edge in self.edges_in_range(object, offset, size) {
            if edge.offset > cursor || !edge.value.is_zero() {
                return false;
            }
            cursor = cursor.max(edge.end());
        }
        cursor >= end
    }

    /// Copy the edges of `src` in `[src_offset, src_offset + size)` to `dst`
    /// at `dst_offset`. Zero edges are clipped to the window; other edges are
    /// copied only when they lie completely inside it.
    pub fn copy_edges(
        &self,
        src: ObjectId,
        src_offset: &BigInt,
        dst: ObjectId,
        dst_offset: &BigInt,
        size: &BigInt,
    ) -> Smg {
        let edges = self.edges_in_range(src, src_offset, size);
        let mut smg = self.remove_edges_overlapping(dst, dst_offset, size);
        let src_end = src_offset + size;
        let shift = dst_offset - src_offset;

        let mut tree = smg.edge_tree(dst);
        for edge in edges {
            let (start, end) = if edge.value.is_zero() {
                (edge.offset.clone().max(src_offset.clone()), edge.end().min(src_end.clone()))
            } else if edge.is_within(src_offset, size) {
                (edge.offset.clone(), edge.end())
            } else {
                continue;
            };
            let copied = HasValueEdge::new(&start + &shift, end - start, edge.value);
            tree.insert_mut(copied.offset.clone(), copied);
        }
        smg.has_value_edges.insert_mut(dst, tree);
        smg
    }

    fn edge_tree(&self, object: ObjectId) -> EdgeTree {
        self.has_value_edges
            .get(&object)
            .cloned()
            .unwrap_or_else(RedBlackTreeMapSync::new_sync)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Points-to edges
    // ═══════════════════════════════════════════════════════════════════════

    pub fn points_to(&self, value: SmgValueId) -> Option<&PointsToEdge> {
        self.points_to.get(&value)
    }

    pub fn is_pointer(&self, value: SmgValueId) -> bool {
        self.points_to.contains_key(&value)
    }

    /// Add `value -> (target, offset)`; a different existing target is an error
    pub fn add_pointer(&self, value: SmgValueId, target: ObjectId, offset: BigInt) -> SmgResult<Smg> {
        let edge = PointsToEdge { target, offset };
        if let Some(existing) = self.points_to.get(&value) {
            if existing == &edge {
                return Ok(self.clone());
            }
            return Err(SmgError::PointerRedefinition {
                value: value.to_string(),
            });
        }

        let mut smg = self.copy_and_add_value(value);
        let key = (edge.target, edge.offset.clone());
        if !smg.addresses.contains_key(&key) {
            smg.addresses.insert_mut(key, value);
        }
        smg.points_to.insert_mut(value, edge);
        Ok(smg)
    }

    /// Existing pointer value for `(target, offset)`
    pub fn find_address(&self, target: ObjectId, offset: &BigInt) -> Option<SmgValueId> {
        self.addresses.get(&(target, offset.clone())).copied()
    }

    /// Objects reachable from `roots` through has-value and points-to edges
    pub fn reachable_objects(&self, roots: impl IntoIterator<Item = ObjectId>) -> FxHashSet<ObjectId> {
        let mut visited = FxHashSet::default();
        let mut worklist: Vec<ObjectId> = roots.into_iter().collect();
        while let Some(object) = worklist.pop() {
            if !visited.insert(object) {
                continue;
            }
            for edge in self.edges_of(object) {
                if let Some(target) = self.points_to.get(&edge.value) {
                    if !visited.contains(&target.target) {
                        worklist.push(target.target);
                    }
                }
            }
        }
        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: i64) -> BigInt {
        BigInt::from(n)
    }

    fn region(smg: &Smg, bits: i64) -> (Smg, ObjectId) {
        let (smg, object) = smg.copy_and_create_object(Value::from(bits), ObjectKind::Heap, "r");
        (smg, object.id)
    }

    fn layout(smg: &Smg, object: ObjectId) -> Vec<(i64, i64, u64)> {
        smg.edges_of(object)
            .map(|e| {
                (
                    i64::try_from(&e.offset).unwrap(),
                    i64::try_from(&e.size).unwrap(),
                    e.value.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_null_region() {
        let smg = Smg::new();
        assert!(!smg.is_valid(ObjectId::NULL));
        let target = smg.points_to(SmgValueId::ZERO).unwrap();
        assert_eq!(target.target, ObjectId::NULL);
        assert_eq!(smg.find_address(ObjectId::NULL, &big(0)), Some(SmgValueId::ZERO));
    }

    #[test]
    fn test_write_replaces_overlapping() {
        let (smg, r) = region(&Smg::new(), 64);
        let smg = smg.write_value(r, &big(0), &big(32), SmgValueId(5));
        let smg = smg.write_value(r, &big(32), &big(32), SmgValueId(6));
        let smg = smg.write_value(r, &big(16), &big(32), SmgValueId(7));
        assert_eq!(layout(&smg, r), vec![(16, 32, 7)]);
    }

    #[test]
    fn test_zero_edge_is_cut() {
        let (smg, r) = region(&Smg::new(), 128);
        let smg = smg.write_value(r, &big(0), &big(128), SmgValueId::ZERO);
        let smg = smg.write_value(r, &big(32), &big(32), SmgValueId(9));
        assert_eq!(layout(&smg, r), vec![(0, 32, 0), (32, 32, 9), (64, 64, 0)]);
        assert!(smg.is_covered_by_zero_edges(r, &big(64), &big(64)));
        assert!(!smg.is_covered_by_zero_edges(r, &big(0), &big(64)));
    }

    #[test]
    fn test_snapshots_are_independent() {
        let (before, r) = region(&Smg::new(), 32);
        let after = before.write_value(r, &big(0), &big(32), SmgValueId(3));
        assert_eq!(before.edge_count(r), 0);
        assert_eq!(after.read_exact(r, &big(0), &big(32)), Some(SmgValueId(3)));
        assert_eq!(after.read_exact(r, &big(0), &big(16)), None);
    }

    #[test]
    fn test_invalidate_drops_edges() {
        let (smg, r) = region(&Smg::new(), 32);
        let smg = smg.write_value(r, &big(0), &big(32), SmgValueId(3));
        let smg = smg.copy_and_invalidate_object(r);
        assert!(!smg.is_valid(r));
        assert!(smg.object(r).is_some());
        assert_eq!(smg.edge_count(r), 0);
    }

    #[test]
    fn test_pointer_redefinition_is_rejected() {
        let (smg, r) = region(&Smg::new(), 32);
        let (smg, v) = smg.copy_and_create_fresh_value();
        let smg = smg.add_pointer(v, r, big(0)).unwrap();
        assert!(smg.add_pointer(v, r, big(0)).is_ok());
        assert!(matches!(
            smg.add_pointer(v, r, big(8)),
            Err(SmgError::PointerRedefinition { .. })
        ));
        assert_eq!(smg.find_address(r, &big(0)), Some(v));
    }

    #[test]
    fn test_copy_edges_window() {
        let (smg, src) = region(&Smg::new(), 128);
        let (smg, dst) = region(&smg, 128);
        let smg = smg.write_value(src, &big(0), &big(64), SmgValueId::ZERO);
        let smg = smg.write_value(src, &big(64), &big(32), SmgValueId(4));
        let smg = smg.write_value(src, &big(96), &big(32), SmgValueId(5));
        // window [32, 112): zero clipped, v4 inside, v5 sticks out
        let smg = smg.copy_edges(src, &big(32), dst, &big(0), &big(80));
        assert_eq!(layout(&smg, dst), vec![(0, 32, 0), (32, 32, 4)]);
    }

    #[test]
    fn test_reachability() {
        let (smg, a) = region(&Smg::new(), 64);
        let (smg, b) = region(&smg, 64);
        let (smg, c) = region(&smg, 64);
        let (smg, v) = smg.copy_and_create_fresh_value();
        let smg = smg.add_pointer(v, b, big(0)).unwrap();
        let smg = smg.write_value(a, &big(0), &big(64), v);
        let reachable = smg.reachable_objects([a]);
        assert!(reachable.contains(&a));
        assert!(reachable.contains(&b));
        assert!(!reachable.contains(&c));
    }
}
