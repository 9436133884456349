use crate::errors::SmgResult;
use crate::features::diagnostics::ErrorInfo;
use crate::features::program_state::{SmgState, Value};
use crate::features::smg::ObjectId;
use num_traits::Zero;

/// What a `free` argument designates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeTarget {
    /// `free(NULL)`, a no-op
    Null,
    /// Start of a valid heap (or external) region
    Region(ObjectId),
}

impl SmgState {
    /// Classify a pointer passed to a deallocator
    pub fn validate_free(&self, pointer: &Value) -> Result<FreeTarget, ErrorInfo> {
        if pointer.is_zero() {
            return Ok(FreeTarget::Null);
        }
        let Some((object, offset)) = self.pointer_target(pointer) else {
            return Err(ErrorInfo::invalid_free(format!(
                "Free of a value that is not a known pointer: {}",
                pointer
            )));
        };
        if object.is_null() {
            return Err(ErrorInfo::invalid_free(format!(
                "Free of an address {} bits into the null region",
                offset
            )));
        }
        let freeable = self.spc().is_heap_object(object) || self.spc().is_external_object(object);
        let region = self.object(object);
        let label = region.map(|r| r.label.clone()).unwrap_or_else(|| object.to_string());
        // chain: the freed pointer, then the region it designates
        let invalid_free = |description: String| {
            let error = ErrorInfo::invalid_free(description);
            let error = match self.spc().smg_value_for(pointer) {
                Some(value) => error.with_value(value),
                None => error,
            };
            match region {
                Some(region) => error.with_object(region),
                None => error.with_object_id(object),
            }
        };

        if !freeable {
            return Err(invalid_free(format!("Free of non-heap memory {}", label)));
        }
        if !self.is_object_valid(object) {
            return Err(invalid_free(format!("Double free of {}", label)));
        }
        if !offset.is_zero() {
            return Err(invalid_free(format!(
                "Free of a pointer {} bits past the start of {}",
                offset, label
            )));
        }
        Ok(FreeTarget::Region(object))
    }

    /// `free(pointer)`: validate, invalidate, then prune newly unreachable
    /// memory (reporting leaks)
    pub fn free_object(&self, pointer: &Value) -> SmgResult<SmgState> {
        self.free_object_retaining(pointer, [])
    }

    /// [`free_object`](Self::free_object) keeping whatever `retained` points
    /// to alive (a result not yet stored anywhere, e.g. the new block of
    /// `realloc`)
    pub fn free_object_retaining<'v>(
        &self,
        pointer: &Value,
        retained: impl IntoIterator<Item = &'v Value>,
    ) -> SmgResult<SmgState> {
        match self.validate_free(pointer) {
            Ok(FreeTarget::Null) => {
                tracing::trace!("free(NULL) is a no-op");
                Ok(self.clone())
            }
            Ok(FreeTarget::Region(object)) => {
                tracing::debug!(%object, "Freed heap region");
                let freed = self.with_spc(self.spc().copy_and_invalidate_object(object));
                Ok(freed.prune_unreachable(retained))
            }
            Err(error) => Ok(self.with_error(error)),
        }
    }
}
