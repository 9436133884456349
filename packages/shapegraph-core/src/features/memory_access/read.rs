use super::Access;
use crate::errors::SmgResult;
use crate::features::program_state::value::to_unsigned_bits;
use crate::features::program_state::{SmgState, Value, ValueAndState};
use crate::features::smg::{HasValueEdge, ObjectId};
use num_bigint::BigInt;
use num_traits::{One, Zero};

impl SmgState {
    /// Read `size` bits at `offset` of `object`.
    ///
    /// Exact edge -> its value; zero-covered range -> `0`; with `precise_read`,
    /// numeric edges that contain or tile the range are combined (little
    /// endian). Anything else reads as `Unknown` without an error.
    pub fn read_value(&self, object: ObjectId, offset: &BigInt, size: &BigInt) -> SmgResult<ValueAndState> {
        if let Some(error) = self.check_access(object, offset, size, Access::Read) {
            return Ok(ValueAndState::unknown(self.with_error(error)));
        }

        let smg = self.spc().smg();
        if let Some(value) = smg
            .read_exact(object, offset, size)
            .and_then(|smg_value| self.spc().value_for(smg_value))
        {
            return Ok(ValueAndState::new(value.clone(), self.clone()));
        }
        if smg.is_covered_by_zero_edges(object, offset, size) {
            return Ok(ValueAndState::new(Value::zero(), self.clone()));
        }
        if self.options().precise_read {
            if let Some(value) = self.precise_read(object, offset, size) {
                return Ok(ValueAndState::new(Value::Numeric(value), self.clone()));
            }
        }
        tracing::trace!(%object, %offset, %size, "Read of uncovered memory");
        Ok(ValueAndState::unknown(self.clone()))
    }

    fn precise_read(&self, object: ObjectId, offset: &BigInt, size: &BigInt) -> Option<BigInt> {
        let edges = self.spc().smg().edges_in_range(object, offset, size);
        let end = offset + size;

        if let [edge] = edges.as_slice() {
            if &edge.offset <= offset && edge.end() >= end {
                let bits = self.numeric_bits(edge)?;
                let shift = u64::try_from(offset - &edge.offset).ok()?;
                let width = u64::try_from(size).ok()?;
                let mask = (BigInt::one() << width) - 1;
                return Some((bits >> shift) & mask);
            }
        }

        let mut cursor = offset.clone();
        let mut combined = BigInt::zero();
        for edge in &edges {
            if edge.offset != cursor || edge.end() > end {
                return None;
            }
            let shift = u64::try_from(&edge.offset - offset).ok()?;
            combined |= self.numeric_bits(edge)? << shift;
            cursor = edge.end();
        }
        (cursor == end).then_some(combined)
    }

    /// Unsigned bit pattern of a numeric edge
    fn numeric_bits(&self, edge: &HasValueEdge) -> Option<BigInt> {
        let value = self.spc().value_for(edge.value)?.as_numeric()?;
        let width = u64::try_from(&edge.size).ok()?;
        Some(to_unsigned_bits(value, width))
    }
}
