use bytes::Bytes;

/// One stored value plus the client-supplied flags returned on GET.
pub struct Entry {
    pub flags: u32,
    pub value: Bytes,
    /// Position in the insertion order; key of the ordering index.
    pub seq: u64,
}
