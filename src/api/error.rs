use std::fmt::Formatter;
use std::result;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Error {
    /// Zero-length record or a record id that does not fit the page's directory.
    InvalidArgument(u32, String),
    /// Record id does not address a live record on the page.
    NotFound(u32, u16),
    /// Page is full: the caller is expected to try another page.
    NotEnoughSpace(u32, usize),
    /// Output buffer is shorter than the record (needed, provided).
    BufferTooSmall(usize, usize),
    /// Page state is broken, the page instance must not be trusted anymore.
    Corruption(u32, String),
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    /// Any error except `Corruption` leaves the page usable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Corruption(_, _))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidArgument(id, msg) => {
                write!(f, "Invalid argument (page: {}): '{}'.", id, msg)
            }
            Error::NotFound(id, slot) => write!(f, "Record not found (page: {}, slot: {}).", id, slot),
            Error::NotEnoughSpace(id, len) => {
                write!(f, "Not enough space (page: {}) for {} bytes.", id, len)
            }
            Error::BufferTooSmall(need, have) => {
                write!(f, "Buffer too small: need {} bytes, got {}.", need, have)
            }
            Error::Corruption(id, msg) => write!(f, "Corruption detected (page: {}): '{}'.", id, msg),
        }
    }
}

impl std::error::Error for Error {}
