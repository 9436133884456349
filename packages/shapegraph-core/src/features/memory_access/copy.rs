use super::Access;
use crate::errors::SmgResult;
use crate::features::program_state::SmgState;
use crate::features::smg::ObjectId;
use num_bigint::BigInt;

impl SmgState {
    /// Bulk-copy `size` bits of `src` content into `dst` (memcpy, struct
    /// assignment, realloc). The source is checked like a read, the
    /// destination like a write; a failing check copies nothing.
    pub fn copy_object_content(
        &self,
        src: ObjectId,
        src_offset: &BigInt,
        dst: ObjectId,
        dst_offset: &BigInt,
        size: &BigInt,
    ) -> SmgResult<SmgState> {
        if let Some(error) = self.check_access(src, src_offset, size, Access::Read) {
            return Ok(self.with_error(error));
        }
        if let Some(error) = self.check_access(dst, dst_offset, size, Access::Write) {
            return Ok(self.with_error(error));
        }
        let smg = self
            .spc()
            .smg()
            .copy_edges(src, src_offset, dst, dst_offset, size);
        Ok(self.with_spc(self.spc().with_smg(smg)))
    }
}
