pub mod error;
pub mod page;

use crate::disk::block::Block;

pub type HeapPage = Block;
