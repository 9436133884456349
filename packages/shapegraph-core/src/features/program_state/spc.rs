//! Symbolic Program Configuration
//!
//! One immutable snapshot of the analysed program's memory:
//!
//! - the graph store ([`Smg`])
//! - the bidirectional `Value <-> SmgValueId` mapping
//! - stack frames, globals and function designators
//! - heap and external region bookkeeping for leak detection
//! - the `atexit` handler stack
//!
//! Fresh symbolic identifiers are allocated from a counter held in the
//! snapshot itself, so branches never share mutable state.

use super::stack_frame::{StackFrame, ValueAndType};
use super::value::{SymbolicId, Value};
use crate::errors::SmgResult;
use crate::features::smg::{ObjectId, ObjectKind, Smg, SmgObject, SmgValueId};
use crate::shared::models::FunctionDeclaration;
use num_bigint::BigInt;
use num_traits::Zero;
use rpds::{HashTrieMapSync, HashTrieSetSync, StackSync, VectorSync};

#[derive(Debug, Clone)]
pub struct SymbolicProgramConfiguration {
    smg: Smg,
    value_to_smg_value: HashTrieMapSync<Value, SmgValueId>,
    smg_value_to_value: HashTrieMapSync<SmgValueId, Value>,
    stack: VectorSync<StackFrame>,
    globals: HashTrieMapSync<String, ObjectId>,
    functions: HashTrieMapSync<String, ObjectId>,
    heap_objects: HashTrieSetSync<ObjectId>,
    external_objects: HashTrieSetSync<ObjectId>,
    atexit_handlers: StackSync<Value>,
    next_symbolic_id: u64,
    next_generated_name: u64,
}

pub type Spc = SymbolicProgramConfiguration;

impl Default for SymbolicProgramConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolicProgramConfiguration {
    pub fn new() -> Self {
        Self {
            smg: Smg::new(),
            value_to_smg_value: HashTrieMapSync::new_sync().insert(Value::zero(), SmgValueId::ZERO),
            smg_value_to_value: HashTrieMapSync::new_sync().insert(SmgValueId::ZERO, Value::zero()),
            stack: VectorSync::new_sync(),
            globals: HashTrieMapSync::new_sync(),
            functions: HashTrieMapSync::new_sync(),
            heap_objects: HashTrieSetSync::new_sync(),
            external_objects: HashTrieSetSync::new_sync(),
            atexit_handlers: StackSync::new_sync(),
            next_symbolic_id: 0,
            next_generated_name: 0,
        }
    }

    pub fn smg(&self) -> &Smg {
        &self.smg
    }

    pub fn with_smg(&self, smg: Smg) -> Self {
        let mut spc = self.clone();
        spc.smg = smg;
        spc
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Value mapping
    // ═══════════════════════════════════════════════════════════════════════

    pub fn value_for(&self, smg_value: SmgValueId) -> Option<&Value> {
        self.smg_value_to_value.get(&smg_value)
    }

    pub fn smg_value_for(&self, value: &Value) -> Option<SmgValueId> {
        self.value_to_smg_value.get(value).copied()
    }

    /// Map `value` to a graph value, creating one on first use.
    /// `value` must be storable (no `Unknown`, no `Address`).
    pub fn copy_and_create_value(&self, value: &Value) -> (Self, SmgValueId) {
        if let Some(existing) = self.smg_value_for(value) {
            return (self.clone(), existing);
        }
        let (smg, smg_value) = self.smg.copy_and_create_fresh_value();
        let mut spc = self.with_smg(smg);
        spc.value_to_smg_value.insert_mut(value.clone(), smg_value);
        spc.smg_value_to_value.insert_mut(smg_value, value.clone());
        (spc, smg_value)
    }

    pub fn fresh_symbolic_id(&self) -> (Self, SymbolicId) {
        let mut spc = self.clone();
        let id = SymbolicId(spc.next_symbolic_id);
        spc.next_symbolic_id += 1;
        (spc, id)
    }

    pub fn fresh_symbolic_value(&self) -> (Self, Value) {
        let (spc, id) = self.fresh_symbolic_id();
        (spc, Value::ident(id))
    }

    /// Unique name for generated bindings (`alloca` areas, string literals)
    pub fn fresh_generated_name(&self, prefix: &str) -> (Self, String) {
        let mut spc = self.clone();
        let name = format!("__{}_{}", prefix, spc.next_generated_name);
        spc.next_generated_name += 1;
        (spc, name)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Pointers
    // ═══════════════════════════════════════════════════════════════════════

    /// Pointer value for `(object, offset)`, reusing an existing one
    pub fn search_or_create_address(&self, object: ObjectId, offset: &BigInt) -> SmgResult<(Self, Value)> {
        if let Some(existing) = self.smg.find_address(object, offset) {
            if let Some(value) = self.value_for(existing) {
                return Ok((self.clone(), value.clone()));
            }
        }
        let (spc, value) = self.fresh_symbolic_value();
        let (spc, smg_value) = spc.copy_and_create_value(&value);
        let smg = spc.smg.add_pointer(smg_value, object, offset.clone())?;
        Ok((spc.with_smg(smg), value))
    }

    /// `(object, offset)` a pointer value denotes, if concretely known
    pub fn pointer_target(&self, value: &Value) -> Option<(ObjectId, BigInt)> {
        match value {
            Value::Address(address) => {
                let (object, base_offset) = self.pointer_target(&Value::ident(address.base))?;
                let extra = address.offset.as_numeric()?;
                Some((object, base_offset + extra))
            }
            Value::Unknown => None,
            _ => {
                let smg_value = self.smg_value_for(value)?;
                let edge = self.smg.points_to(smg_value)?;
                Some((edge.target, edge.offset.clone()))
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Objects
    // ═══════════════════════════════════════════════════════════════════════

    pub fn object(&self, id: ObjectId) -> Option<&SmgObject> {
        self.smg.object(id)
    }

    pub fn is_object_valid(&self, id: ObjectId) -> bool {
        self.smg.is_valid(id)
    }

    /// Heap regions stay registered after being freed or pruned
    pub fn is_heap_object(&self, id: ObjectId) -> bool {
        self.heap_objects.contains(&id)
    }

    pub fn is_external_object(&self, id: ObjectId) -> bool {
        self.external_objects.contains(&id)
    }

    pub fn copy_and_create_object(
        &self,
        size: Value,
        kind: ObjectKind,
        label: impl Into<String>,
    ) -> (Self, SmgObject) {
        let (smg, object) = self.smg.copy_and_create_object(size, kind, label);
        (self.with_smg(smg), object)
    }

    pub fn copy_and_add_heap_object(&self, object: SmgObject) -> Self {
        let mut spc = self.with_smg(self.smg.copy_and_add_object(object.clone()));
        spc.heap_objects.insert_mut(object.id);
        spc
    }

    pub fn copy_and_add_external_object(&self, object: SmgObject) -> Self {
        let mut spc = self.with_smg(self.smg.copy_and_add_object(object.clone()));
        spc.external_objects.insert_mut(object.id);
        spc
    }

    pub fn copy_and_invalidate_object(&self, id: ObjectId) -> Self {
        self.with_smg(self.smg.copy_and_invalidate_object(id))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Variables
    // ═══════════════════════════════════════════════════════════════════════

    /// Lookup in the top frame first, then in the globals
    pub fn get_object_for_visible_variable(&self, name: &str) -> Option<ObjectId> {
        self.stack
            .last()
            .and_then(|frame| frame.variable(name))
            .or_else(|| self.globals.get(name).copied())
    }

    pub fn copy_and_add_global_variable(&self, name: impl Into<String>, object: SmgObject) -> Self {
        let mut spc = self.with_smg(self.smg.copy_and_add_object(object.clone()));
        spc.globals.insert_mut(name.into(), object.id);
        spc
    }

    /// Bind in the top frame; without a frame the binding becomes global
    pub fn copy_and_add_stack_variable(&self, name: impl Into<String>, object: SmgObject) -> Self {
        let Some(frame) = self.stack.last() else {
            return self.copy_and_add_global_variable(name, object);
        };
        let frame = frame.with_variable(name, object.id);
        let mut spc = self.with_smg(self.smg.copy_and_add_object(object));
        spc.replace_top_frame(frame);
        spc
    }

    pub fn copy_and_remove_stack_variable(&self, name: &str) -> Self {
        let Some(frame) = self.stack.last() else {
            return self.clone();
        };
        let frame = frame.without_variable(name);
        let mut spc = self.clone();
        spc.replace_top_frame(frame);
        spc
    }

    fn replace_top_frame(&mut self, frame: StackFrame) {
        if let Some(top) = self.stack.len().checked_sub(1) {
            self.stack.set_mut(top, frame);
        }
    }

    pub fn function_object(&self, name: &str) -> Option<ObjectId> {
        self.functions.get(name).copied()
    }

    /// Zero-size region standing for a function designator
    pub fn search_or_create_function_object(&self, name: &str) -> (Self, ObjectId) {
        if let Some(existing) = self.functions.get(name) {
            return (self.clone(), *existing);
        }
        let (mut spc, object) = self.copy_and_create_object(Value::zero(), ObjectKind::Function, name);
        spc.functions.insert_mut(name.to_string(), object.id);
        (spc, object.id)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Stack frames
    // ═══════════════════════════════════════════════════════════════════════

    pub fn top_frame(&self) -> Option<&StackFrame> {
        self.stack.last()
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Push a frame; `return_size` (bits) is `None` for `void` functions
    pub fn copy_and_add_stack_frame(
        &self,
        function: FunctionDeclaration,
        return_size: Option<BigInt>,
        variadic_arguments: Option<Vec<ValueAndType>>,
    ) -> Self {
        let (mut spc, return_object) = match return_size {
            Some(size) => {
                let label = format!("{}::__retval__", function.name);
                let (spc, object) = self.copy_and_create_object(Value::Numeric(size), ObjectKind::Stack, label);
                (spc, Some(object.id))
            }
            None => (self.clone(), None),
        };
        spc.stack
            .push_back_mut(StackFrame::new(function, return_object, variadic_arguments));
        spc
    }

    /// Pop the top frame and invalidate its regions
    pub fn drop_stack_frame(&self) -> Self {
        let Some(frame) = self.stack.last() else {
            return self.clone();
        };
        let mut smg = self.smg.clone();
        for object in frame.objects() {
            smg = smg.copy_and_invalidate_object(object);
        }
        let mut spc = self.with_smg(smg);
        spc.stack.drop_last_mut();
        spc
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Garbage collection
    // ═══════════════════════════════════════════════════════════════════════

    /// Remove every region unreachable from variables, return objects,
    /// variadic arguments, function designators and `extra_roots`.
    /// Returns the valid non-external heap regions that were dropped.
    pub fn copy_and_prune_unreachable<'v>(
        &self,
        extra_roots: impl IntoIterator<Item = &'v Value>,
    ) -> (Self, Vec<SmgObject>) {
        let mut roots: Vec<ObjectId> = Vec::new();
        for frame in self.stack.iter() {
            roots.extend(frame.objects());
            for argument in frame.variadic_arguments().unwrap_or_default() {
                roots.extend(self.pointer_target(&argument.value).map(|(object, _)| object));
            }
        }
        roots.extend(self.globals.values().copied());
        roots.extend(self.functions.values().copied());
        for handler in self.atexit_handlers.iter() {
            roots.extend(self.pointer_target(handler).map(|(object, _)| object));
        }
        for value in extra_roots {
            roots.extend(self.pointer_target(value).map(|(object, _)| object));
        }

        let reachable = self.smg.reachable_objects(roots);
        let unreachable: Vec<SmgObject> = self
            .smg
            .objects()
            .filter(|object| !object.id.is_null() && !reachable.contains(&object.id))
            .cloned()
            .collect();

        let mut leaked = Vec::new();
        let mut smg = self.smg.clone();
        for object in unreachable {
            if self.smg.is_valid(object.id) && self.is_heap_object(object.id) {
                leaked.push(object.clone());
            }
            smg = smg.copy_and_remove_object(object.id);
        }
        leaked.sort_by_key(|object| object.id);
        (self.with_smg(smg), leaked)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // atexit
    // ═══════════════════════════════════════════════════════════════════════

    pub fn push_atexit(&self, handler: Value) -> Self {
        let mut spc = self.clone();
        spc.atexit_handlers.push_mut(handler);
        spc
    }

    /// Pop the most recently registered handler
    pub fn pop_atexit(&self) -> (Self, Option<Value>) {
        let mut spc = self.clone();
        let handler = spc.atexit_handlers.peek().cloned();
        spc.atexit_handlers.pop_mut();
        (spc, handler)
    }

    pub fn atexit_count(&self) -> usize {
        self.atexit_handlers.size()
    }
}

/// Whether an object's size is a concrete zero
pub fn has_zero_size(object: &SmgObject) -> bool {
    object.concrete_size().is_some_and(|size| size.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::CType;

    fn spc_with_frame() -> Spc {
        let main = FunctionDeclaration::new("main", CType::int(), vec![], false);
        Spc::new().copy_and_add_stack_frame(main, Some(BigInt::from(32)), None)
    }

    #[test]
    fn test_zero_maps_to_null() {
        let spc = Spc::new();
        assert_eq!(spc.smg_value_for(&Value::zero()), Some(SmgValueId::ZERO));
        assert_eq!(spc.pointer_target(&Value::zero()), Some((ObjectId::NULL, BigInt::from(0))));
    }

    #[test]
    fn test_value_mapping_is_bidirectional() {
        let (spc, id) = Spc::new().copy_and_create_value(&Value::from(42));
        let (spc, again) = spc.copy_and_create_value(&Value::from(42));
        assert_eq!(id, again);
        assert_eq!(spc.value_for(id), Some(&Value::from(42)));
    }

    #[test]
    fn test_search_or_create_address_reuses() {
        let (spc, object) = Spc::new().copy_and_create_object(Value::from(64), ObjectKind::Heap, "h");
        let (spc, p) = spc.search_or_create_address(object.id, &BigInt::from(32)).unwrap();
        let (spc, q) = spc.search_or_create_address(object.id, &BigInt::from(32)).unwrap();
        assert_eq!(p, q);
        assert_eq!(spc.pointer_target(&p), Some((object.id, BigInt::from(32))));

        let shifted = p.plus(&Value::from(8));
        assert_eq!(spc.pointer_target(&shifted), Some((object.id, BigInt::from(40))));
    }

    #[test]
    fn test_visible_variable_prefers_frame() {
        let spc = spc_with_frame();
        let (spc, global) = spc.copy_and_create_object(Value::from(32), ObjectKind::Global, "x");
        let spc = spc.copy_and_add_global_variable("x", global.clone());
        let (spc, local) = spc.copy_and_create_object(Value::from(32), ObjectKind::Stack, "x");
        let spc = spc.copy_and_add_stack_variable("x", local.clone());
        assert_eq!(spc.get_object_for_visible_variable("x"), Some(local.id));

        let spc = spc.drop_stack_frame();
        assert_eq!(spc.get_object_for_visible_variable("x"), Some(global.id));
        assert!(!spc.is_object_valid(local.id));
    }

    #[test]
    fn test_prune_reports_only_valid_heap() {
        let spc = spc_with_frame();
        let (spc, heap) = spc.copy_and_create_object(Value::from(64), ObjectKind::Heap, "malloc");
        let spc = spc.copy_and_add_heap_object(heap.clone());
        let (spc, freed) = spc.copy_and_create_object(Value::from(64), ObjectKind::Heap, "malloc");
        let spc = spc.copy_and_add_heap_object(freed.clone());
        let spc = spc.copy_and_invalidate_object(freed.id);

        let (pruned, leaked) = spc.copy_and_prune_unreachable([]);
        assert_eq!(leaked, vec![heap.clone()]);
        assert!(pruned.object(heap.id).is_none());
        assert!(pruned.object(freed.id).is_none());
    }

    #[test]
    fn test_prune_keeps_extra_roots() {
        let spc = spc_with_frame();
        let (spc, heap) = spc.copy_and_create_object(Value::from(64), ObjectKind::Heap, "malloc");
        let spc = spc.copy_and_add_heap_object(heap.clone());
        let (spc, pointer) = spc.search_or_create_address(heap.id, &BigInt::from(0)).unwrap();
        let (pruned, leaked) = spc.copy_and_prune_unreachable([&pointer]);
        assert!(leaked.is_empty());
        assert!(pruned.is_object_valid(heap.id));
    }

    #[test]
    fn test_atexit_is_lifo() {
        let spc = Spc::new().push_atexit(Value::from(1)).push_atexit(Value::from(2));
        let (spc, first) = spc.pop_atexit();
        let (spc, second) = spc.pop_atexit();
        let (_, none) = spc.pop_atexit();
        assert_eq!(first, Some(Value::from(2)));
        assert_eq!(second, Some(Value::from(1)));
        assert_eq!(none, None);
    }
}
