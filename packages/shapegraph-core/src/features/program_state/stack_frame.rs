//! Stack frame of one function activation

use super::value::Value;
use crate::features::smg::ObjectId;
use crate::shared::models::{CType, FunctionDeclaration};
use rpds::RedBlackTreeMapSync;

/// Argument captured for the variadic tail of a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueAndType {
    pub value: Value,
    pub ty: CType,
}

impl ValueAndType {
    pub fn new(value: Value, ty: CType) -> Self {
        Self { value, ty }
    }
}

#[derive(Debug, Clone)]
pub struct StackFrame {
    function: FunctionDeclaration,
    variables: RedBlackTreeMapSync<String, ObjectId>,
    return_object: Option<ObjectId>,
    variadic_arguments: Option<Vec<ValueAndType>>,
}

impl StackFrame {
    pub fn new(
        function: FunctionDeclaration,
        return_object: Option<ObjectId>,
        variadic_arguments: Option<Vec<ValueAndType>>,
    ) -> Self {
        Self {
            function,
            variables: RedBlackTreeMapSync::new_sync(),
            return_object,
            variadic_arguments,
        }
    }

    pub fn function(&self) -> &FunctionDeclaration {
        &self.function
    }

    pub fn with_variable(&self, name: impl Into<String>, object: ObjectId) -> Self {
        let mut frame = self.clone();
        frame.variables.insert_mut(name.into(), object);
        frame
    }

    pub fn without_variable(&self, name: &str) -> Self {
        let mut frame = self.clone();
        frame.variables.remove_mut(name);
        frame
    }

    pub fn variable(&self, name: &str) -> Option<ObjectId> {
        self.variables.get(name).copied()
    }

    pub fn return_object(&self) -> Option<ObjectId> {
        self.return_object
    }

    pub fn variadic_arguments(&self) -> Option<&[ValueAndType]> {
        self.variadic_arguments.as_deref()
    }

    /// Every region owned by the frame, return object included
    pub fn objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.variables.values().copied().chain(self.return_object)
    }
}
