use crate::api::error::Result;

/// Identifier of a page that never addresses a real page (e.g. end of a page chain).
pub const INVALID_PAGE: u32 = 0;

/// Tombstone marker stored in a slot's length field.
pub const SENTINEL_EMPTY: i16 = -1;

// Compile-time fixed page size, selected via Cargo features.
// Exactly one of `page-4k`, `page-8k`, or `page-16k` should be enabled.
#[cfg(all(feature = "page-4k", not(any(feature = "page-8k", feature = "page-16k"))))]
pub const PAGE_SIZE: usize = 4096;
#[cfg(all(feature = "page-8k", not(feature = "page-16k")))]
pub const PAGE_SIZE: usize = 8192;
#[cfg(feature = "page-16k")]
pub const PAGE_SIZE: usize = 16384;

#[cfg(any(
    all(feature = "page-4k", feature = "page-8k"),
    all(feature = "page-4k", feature = "page-16k"),
    all(feature = "page-8k", feature = "page-16k"),
))]
compile_error!(
    "Enable only one page size feature; use `default-features = false` to pick `page-8k` or `page-16k`."
);

#[cfg(not(any(feature = "page-4k", feature = "page-8k", feature = "page-16k")))]
compile_error!(
    "One of `page-4k`, `page-8k`, or `page-16k` features must be enabled to select a page size."
);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub page: u32,
    pub slot: u16,
}

impl RecordId {
    pub fn new(page: u32, slot: u16) -> Self {
        Self { page, slot }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct Slot {
    pub(crate) offset: i16,
    pub(crate) length: i16,
}

impl Slot {
    pub(crate) fn new(offset: i16, length: i16) -> Self {
        Self { offset, length }
    }

    pub(crate) fn empty() -> Self {
        Self {
            offset: 0,
            length: SENTINEL_EMPTY,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.length == SENTINEL_EMPTY
    }
}

/// Slotted page holding variable-length records in a single fixed-size block.
///
/// Slot directory grows from the start of the data area, record bytes are packed
/// from its end towards the directory.
pub trait Page: AsRef<[u8]> + AsMut<[u8]> + Sized {
    /// Zero-filled block, meant to be overwritten with bytes read from disk.
    fn reserve() -> Self;

    /// Fresh empty page with the given identifier.
    fn create(id: u32) -> Self;

    /// Reset the page to the empty state, keeping nothing but the new identifier.
    fn init(&mut self, id: u32);

    fn id(&self) -> u32;

    fn next(&self) -> u32;
    fn set_next(&mut self, id: u32);

    fn prev(&self) -> u32;
    fn set_prev(&mut self, id: u32);

    /// Put a record into the page, reusing a deleted slot if there is one.
    /// The page may be compacted to make room; record ids of other records stay valid.
    fn insert(&mut self, rec: &[u8]) -> Result<RecordId>;

    /// Remove the record. Other records' bytes never move.
    fn delete(&mut self, rid: RecordId) -> Result<()>;

    /// Lowest live slot, if any.
    fn first(&self) -> Option<RecordId>;

    /// Next live slot after the given one, if any.
    fn next_record(&self, rid: RecordId) -> Result<Option<RecordId>>;

    /// Copy the record into `buf`, returning the record length.
    fn get(&self, rid: RecordId, buf: &mut [u8]) -> Result<usize>;

    /// Borrow the record bytes straight from the page buffer.
    fn view(&self, rid: RecordId) -> Result<&[u8]>;

    /// Largest record that can be inserted without getting `NotEnoughSpace`.
    fn available(&self) -> usize;

    fn is_empty(&self) -> bool;

    /// Number of live records (not necessarily equal to the number of slots).
    fn count(&self) -> usize;

    /// Validate the page layout, e.g. after loading raw bytes.
    fn check(&self) -> Result<()>;
}
