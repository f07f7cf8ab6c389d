use crate::ModuleError;

/// Read-only, bounds-checked views onto the module's linear memory.
///
/// Every accessor copies: the underlying memory belongs to the module and
/// may change on its next internal step, so no returned value aliases it.
pub trait ModuleMemory {
    /// Copy `len` bytes starting at `ptr`.
    fn read_bytes(&self, ptr: u32, len: usize) -> Result<Vec<u8>, ModuleError>;

    /// Copy `count` little-endian f32 samples starting at `ptr`.
    ///
    /// The default implementation reads through the byte view; module
    /// implementations with a native float view may override it.
    fn read_f32(&self, ptr: u32, count: usize) -> Result<Vec<f32>, ModuleError> {
        let bytes = self.read_bytes(ptr, count * 4)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    /// Decode the NUL-terminated UTF-8 string starting at `ptr`.
    fn read_cstr(&self, ptr: u32) -> Result<String, ModuleError>;
}
