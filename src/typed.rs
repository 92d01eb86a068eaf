use crate::api::page::{Page, RecordId};
use crate::disk::block::Block;

pub struct Store(Block);

pub trait Records<V>
where
    V: AsRef<[u8]> + for<'a> From<&'a [u8]>,
{
    fn new(id: u32) -> Self;

    fn contains(&self, rid: &RecordId) -> bool;
    fn lookup(&self, rid: &RecordId) -> anyhow::Result<V>;
    fn remove(&mut self, rid: &RecordId) -> anyhow::Result<V>;
    fn insert(&mut self, val: V) -> anyhow::Result<RecordId>;

    /// All stored values in record id order.
    fn values(&self) -> anyhow::Result<Vec<(RecordId, V)>>;
}

impl Store {
    pub fn page(&self) -> &Block {
        &self.0
    }
}

impl From<Block> for Store {
    fn from(page: Block) -> Self {
        Self(page)
    }
}

impl<V> Records<V> for Store
where
    V: AsRef<[u8]> + for<'a> From<&'a [u8]>,
{
    fn new(id: u32) -> Self {
        Self(Block::create(id))
    }

    fn contains(&self, rid: &RecordId) -> bool {
        self.0.view(*rid).is_ok()
    }

    fn lookup(&self, rid: &RecordId) -> anyhow::Result<V> {
        Ok(V::from(self.0.view(*rid)?))
    }

    fn remove(&mut self, rid: &RecordId) -> anyhow::Result<V> {
        let val = self.lookup(rid)?;
        self.0.delete(*rid)?;
        Ok(val)
    }

    fn insert(&mut self, val: V) -> anyhow::Result<RecordId> {
        Ok(self.0.insert(val.as_ref())?)
    }

    fn values(&self) -> anyhow::Result<Vec<(RecordId, V)>> {
        self.0.check()?;
        Ok(self
            .0
            .records()
            .map(|(rid, rec)| (rid, V::from(rec)))
            .collect())
    }
}
