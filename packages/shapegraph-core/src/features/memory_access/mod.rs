//! Read/Write/Dereference engine
//!
//! Byte-precise access algebra over [`SmgState`]. Every access first goes
//! through the same validity and bounds check:
//!
//! | Condition                      | Read              | Write             |
//! |--------------------------------|-------------------|-------------------|
//! | null / freed / removed region  | `InvalidRead`     | `InvalidWrite`    |
//! | `offset < 0`                   | `InvalidRead`     | `InvalidWrite`    |
//! | `offset + size > object size`  | `InvalidRead`     | `InvalidWrite`    |
//!
//! A failing check yields exactly one `ErrorInfo` and leaves every edge
//! untouched. Reads then return `Value::Unknown`, writes are discarded.

pub mod copy;
pub mod dereference;
pub mod free;
pub mod read;
pub mod write;

pub use free::FreeTarget;

use crate::features::diagnostics::ErrorInfo;
use crate::features::program_state::{SmgState, Value};
use crate::features::smg::{ObjectId, ObjectKind};
use crate::features::solver::Constraint;
use num_bigint::BigInt;
use num_traits::Signed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    Read,
    Write,
}

impl Access {
    fn error(self, description: String) -> ErrorInfo {
        match self {
            Access::Read => ErrorInfo::invalid_read(description),
            Access::Write => ErrorInfo::invalid_write(description),
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Access::Read => "read",
            Access::Write => "write",
        }
    }
}

impl SmgState {
    /// Validity and bounds check shared by all accesses
    pub(crate) fn check_access(
        &self,
        object: ObjectId,
        offset: &BigInt,
        size: &BigInt,
        access: Access,
    ) -> Option<ErrorInfo> {
        let verb = access.verb();
        if object.is_null() {
            return Some(access.error(format!("Null pointer dereference ({})", verb)));
        }
        let Some(region) = self.object(object) else {
            return Some(
                access
                    .error(format!("Invalid {} of a released region", verb))
                    .with_object_id(object),
            );
        };
        if !self.is_object_valid(object) {
            let description = match region.kind {
                ObjectKind::Stack => format!("Invalid {} of out-of-scope variable {}", verb, region.label),
                _ => format!("Use after free: {} of {}", verb, region.label),
            };
            return Some(access.error(description).with_object(region));
        }

        let end = offset + size;
        let out_of_bounds = offset.is_negative()
            || match &region.size {
                Value::Numeric(limit) => &end > limit,
                Value::Unknown => false,
                symbolic => {
                    // in bounds only if `end > size` is refuted
                    let overflow = Constraint::gt(Value::Numeric(end.clone()), symbolic.clone());
                    self.is_feasible_with(&overflow)
                }
            };
        if out_of_bounds {
            return Some(
                access
                    .error(format!(
                        "Out-of-bounds {} of {} bits at offset {} in {} ({} bits)",
                        verb, size, offset, region.label, region.size
                    ))
                    .with_object(region),
            );
        }
        None
    }
}
