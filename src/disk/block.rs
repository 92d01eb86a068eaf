use crate::api::error::{Error, Result};
use crate::api::page::{Page, RecordId, Slot, INVALID_PAGE, PAGE_SIZE, SENTINEL_EMPTY};
use bytes::{BufMut, BytesMut};
use log::{debug, error, trace};
use std::cmp::Reverse;
use std::mem::size_of;
use std::ops::Range;

pub struct Block {
    buf: BytesMut,
}

impl AsMut<[u8]> for Block {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..]
    }
}

impl AsRef<[u8]> for Block {
    fn as_ref(&self) -> &[u8] {
        &self.buf[..]
    }
}

const ID_OFFSET: usize = 0;
const NEXT_OFFSET: usize = 4;
const PREV_OFFSET: usize = 8;
const SLOTS_OFFSET: usize = 12;
const FREE_PTR_OFFSET: usize = 14;
const FREE_SPACE_OFFSET: usize = 16;
const TYPE_OFFSET: usize = 18;
const HEAP_PAGE: i16 = 0x4850;

impl Block {
    /// Iterate over live records in slot order.
    /// A live slot pointing outside the data area is skipped; `check()` reports it.
    pub fn records(&self) -> impl Iterator<Item = (RecordId, &[u8])> + '_ {
        std::iter::successors(self.first(), move |rid| self.next_record(*rid).ok().flatten())
            .filter_map(move |rid| self.view(rid).ok().map(|rec| (rid, rec)))
    }

    fn slot_count(&self) -> u16 {
        get_i16(&self.buf, SLOTS_OFFSET).max(0) as u16
    }

    fn free_ptr(&self) -> usize {
        get_i16(&self.buf, FREE_PTR_OFFSET).max(0) as usize
    }

    fn free_space(&self) -> usize {
        get_i16(&self.buf, FREE_SPACE_OFFSET).max(0) as usize
    }

    fn set_slot_count(&mut self, n: u16) {
        put_i16(&mut self.buf, SLOTS_OFFSET, n as i16);
    }

    fn set_free_ptr(&mut self, ptr: usize) {
        put_i16(&mut self.buf, FREE_PTR_OFFSET, ptr as i16);
    }

    fn set_free_space(&mut self, len: usize) {
        put_i16(&mut self.buf, FREE_SPACE_OFFSET, len as i16);
    }

    fn slot(&self, idx: u16) -> Option<Slot> {
        let pos = HEAD + idx as usize * SLOT;
        if idx >= self.slot_count() || pos + SLOT > PAGE_SIZE {
            return None;
        }
        let offset = get_i16(&self.buf, pos);
        let length = get_i16(&self.buf, pos + I16);
        Some(Slot::new(offset, length))
    }

    /// Size of the gap between the end of slot directory and the first record byte.
    fn contiguous(&self) -> usize {
        self.free_ptr()
            .saturating_sub(self.slot_count() as usize * SLOT)
    }

    fn empty_slot(&self) -> Option<u16> {
        (0..self.slot_count()).find(|idx| self.slot(*idx).map(|s| s.is_empty()).unwrap_or(false))
    }

    fn smallest_offset(&self) -> Option<i16> {
        (0..self.slot_count())
            .filter_map(|idx| self.slot(idx))
            .filter(|slot| !slot.is_empty())
            .map(|slot| slot.offset)
            .min()
    }

    /// Every live record must start at or after the free space pointer.
    fn bordered(&self) -> Result<()> {
        match self.smallest_offset() {
            Some(offset) if (offset as isize) < self.free_ptr() as isize => {
                error!(
                    "page={} free_ptr={} is past record at offset={}",
                    self.id(),
                    self.free_ptr(),
                    offset
                );
                Err(Error::Corruption(
                    self.id(),
                    format!("free pointer {} is past record at {}", self.free_ptr(), offset),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Slot of a live record addressed by the given id.
    fn live(&self, rid: RecordId) -> Result<Slot> {
        if rid.page != self.id() {
            return Err(Error::NotFound(self.id(), rid.slot));
        }
        let slot = self
            .slot(rid.slot)
            .filter(|slot| !slot.is_empty())
            .ok_or_else(|| Error::NotFound(self.id(), rid.slot))?;
        self.range(rid.slot, &slot)?;
        Ok(slot)
    }

    /// Bounds-checked position of record bytes inside the page buffer.
    fn range(&self, idx: u16, slot: &Slot) -> Result<Range<usize>> {
        let dir = self.slot_count() as usize * SLOT;
        let lo = slot.offset as isize;
        let len = slot.length as isize;
        if len <= 0 || lo < dir as isize || lo + len > DATA as isize {
            error!(
                "page={} slot={} offset={} length={}: record out of bounds",
                self.id(),
                idx,
                slot.offset,
                slot.length
            );
            return Err(Error::Corruption(
                self.id(),
                format!("slot {} is out of bounds", idx),
            ));
        }
        let at = HEAD + lo as usize;
        Ok(at..(at + len as usize))
    }

    /// Live slots ordered by descending offset, validated against each other
    /// and against the free space tally.
    fn packed(&self) -> Result<Vec<(u16, Slot)>> {
        let mut slots = (0..self.slot_count())
            .filter_map(|idx| self.slot(idx).map(|slot| (idx, slot)))
            .filter(|(_, slot)| !slot.is_empty())
            .collect::<Vec<_>>();
        for (idx, slot) in slots.iter() {
            self.range(*idx, slot)?;
        }
        slots.sort_by_key(|(_, slot)| Reverse(slot.offset));

        for pair in slots.windows(2) {
            let (hi_idx, hi) = pair[0];
            let (lo_idx, lo) = pair[1];
            if lo.offset as isize + lo.length as isize > hi.offset as isize {
                error!(
                    "page={} slots {} and {} overlap",
                    self.id(),
                    lo_idx,
                    hi_idx
                );
                return Err(Error::Corruption(
                    self.id(),
                    format!("slots {} and {} overlap", lo_idx, hi_idx),
                ));
            }
        }

        let total: usize = slots.iter().map(|(_, slot)| slot.length as usize).sum();
        let dir = self.slot_count() as usize * SLOT;
        if dir + total + self.free_space() != DATA {
            error!(
                "page={} free space mismatch: directory={} records={} free={}",
                self.id(),
                dir,
                total,
                self.free_space()
            );
            return Err(Error::Corruption(
                self.id(),
                "free space does not add up".to_string(),
            ));
        }
        Ok(slots)
    }

    /// Move all live records against the end of the data area, closing the holes.
    /// Slot indices and free space tally stay the same.
    pub(crate) fn compact(&mut self) -> Result<()> {
        let slots = self.packed()?;

        let mut ptr = DATA;
        for (idx, slot) in slots.iter() {
            let len = slot.length as usize;
            let at = HEAD + slot.offset as usize;
            ptr -= len;
            self.buf[..].copy_within(at..(at + len), HEAD + ptr);
            put_slot(&mut self.buf, *idx, &Slot::new(ptr as i16, slot.length));
        }
        debug!(
            "compact: page={} records={} free_ptr: {} -> {}",
            self.id(),
            slots.len(),
            self.free_ptr(),
            ptr
        );
        self.set_free_ptr(ptr);
        Ok(())
    }
}

impl Page for Block {
    fn reserve() -> Self {
        let mut buf = BytesMut::with_capacity(PAGE_SIZE);
        buf.extend_from_slice(&vec![0u8; PAGE_SIZE]);
        Self { buf }
    }

    fn create(id: u32) -> Self {
        let mut buf = head(id);
        buf.extend_from_slice(&vec![0u8; DATA]);
        Self { buf }
    }

    fn init(&mut self, id: u32) {
        let head = head(id);
        self.buf[..HEAD].copy_from_slice(head.as_ref());
    }

    fn id(&self) -> u32 {
        get_u32(&self.buf, ID_OFFSET)
    }

    fn next(&self) -> u32 {
        get_u32(&self.buf, NEXT_OFFSET)
    }

    fn set_next(&mut self, id: u32) {
        put_u32(&mut self.buf, NEXT_OFFSET, id);
    }

    fn prev(&self) -> u32 {
        get_u32(&self.buf, PREV_OFFSET)
    }

    fn set_prev(&mut self, id: u32) {
        put_u32(&mut self.buf, PREV_OFFSET, id);
    }

    fn insert(&mut self, rec: &[u8]) -> Result<RecordId> {
        let len = rec.len();
        if len == 0 {
            return Err(Error::InvalidArgument(
                self.id(),
                "empty record".to_string(),
            ));
        }
        if self.available() < len {
            return Err(Error::NotEnoughSpace(self.id(), len));
        }
        self.bordered()?;

        let idx = match self.empty_slot() {
            Some(idx) => {
                if self.contiguous() < len {
                    self.compact()?;
                }
                idx
            }
            None => {
                if self.contiguous() < SLOT + len {
                    self.compact()?;
                }
                let idx = self.slot_count();
                self.set_slot_count(idx + 1);
                self.set_free_space(self.free_space() - SLOT);
                idx
            }
        };

        let ptr = self.free_ptr() - len;
        put_slice(&mut self.buf, HEAD + ptr, rec);
        put_slot(&mut self.buf, idx, &Slot::new(ptr as i16, len as i16));
        self.set_free_ptr(ptr);
        self.set_free_space(self.free_space() - len);

        trace!(
            "insert: page={} slot={} offset={} len={}",
            self.id(),
            idx,
            ptr,
            len
        );
        Ok(RecordId::new(self.id(), idx))
    }

    fn delete(&mut self, rid: RecordId) -> Result<()> {
        let slot = self.live(rid)?;
        let n = self.slot_count();
        let len = slot.length as usize;

        let sole = (0..n)
            .filter(|idx| *idx != rid.slot)
            .filter_map(|idx| self.slot(idx))
            .all(|slot| slot.is_empty());
        if sole {
            self.set_slot_count(0);
            self.set_free_ptr(DATA);
            self.set_free_space(DATA);
            trace!("delete: page={} slot={} (page reset)", rid.page, rid.slot);
            return Ok(());
        }

        let innermost = self.smallest_offset() == Some(slot.offset);
        if rid.slot == n - 1 {
            self.set_slot_count(n - 1);
            self.set_free_space(self.free_space() + SLOT + len);
        } else {
            put_slot(&mut self.buf, rid.slot, &Slot::empty());
            self.set_free_space(self.free_space() + len);
        }
        if innermost {
            self.set_free_ptr(slot.offset as usize + len);
        }

        trace!(
            "delete: page={} slot={} len={} innermost={}",
            rid.page,
            rid.slot,
            len,
            innermost
        );
        Ok(())
    }

    fn first(&self) -> Option<RecordId> {
        (0..self.slot_count())
            .find(|idx| self.slot(*idx).map(|s| !s.is_empty()).unwrap_or(false))
            .map(|idx| RecordId::new(self.id(), idx))
    }

    fn next_record(&self, rid: RecordId) -> Result<Option<RecordId>> {
        let n = self.slot_count();
        if rid.page != self.id() || rid.slot >= n {
            return Err(Error::InvalidArgument(
                self.id(),
                format!("record {:?} does not belong to the page", rid),
            ));
        }
        Ok(((rid.slot + 1)..n)
            .find(|idx| self.slot(*idx).map(|s| !s.is_empty()).unwrap_or(false))
            .map(|idx| RecordId::new(self.id(), idx)))
    }

    fn get(&self, rid: RecordId, buf: &mut [u8]) -> Result<usize> {
        let rec = self.view(rid)?;
        if buf.len() < rec.len() {
            return Err(Error::BufferTooSmall(rec.len(), buf.len()));
        }
        buf[..rec.len()].copy_from_slice(rec);
        Ok(rec.len())
    }

    fn view(&self, rid: RecordId) -> Result<&[u8]> {
        let slot = self.live(rid)?;
        let range = self.range(rid.slot, &slot)?;
        Ok(&self.buf[range])
    }

    fn available(&self) -> usize {
        let free = self.free_space();
        if self.empty_slot().is_some() {
            free
        } else {
            free.saturating_sub(SLOT)
        }
    }

    fn is_empty(&self) -> bool {
        self.first().is_none()
    }

    fn count(&self) -> usize {
        (0..self.slot_count())
            .filter_map(|idx| self.slot(idx))
            .filter(|slot| !slot.is_empty())
            .count()
    }

    fn check(&self) -> Result<()> {
        let id = self.id();
        let tag = get_i16(&self.buf, TYPE_OFFSET);
        if tag != HEAP_PAGE {
            return Err(Error::Corruption(id, format!("unexpected page type {:#x}", tag)));
        }

        let slots = get_i16(&self.buf, SLOTS_OFFSET);
        let ptr = get_i16(&self.buf, FREE_PTR_OFFSET);
        let free = get_i16(&self.buf, FREE_SPACE_OFFSET);
        if slots < 0 || ptr < 0 || ptr as usize > DATA || free < 0 || free as usize > DATA {
            return Err(Error::Corruption(
                id,
                format!("bad header: slots={} free_ptr={} free={}", slots, ptr, free),
            ));
        }
        if slots as usize * SLOT > ptr as usize {
            return Err(Error::Corruption(
                id,
                "slot directory overlaps records".to_string(),
            ));
        }

        let bad = (0..self.slot_count())
            .filter_map(|idx| self.slot(idx).map(|slot| (idx, slot)))
            .find(|(_, slot)| slot.length < SENTINEL_EMPTY || slot.length == 0);
        if let Some((idx, slot)) = bad {
            return Err(Error::Corruption(
                id,
                format!("slot {} has length {}", idx, slot.length),
            ));
        }

        self.bordered()?;
        self.packed().map(|_| ())
    }
}

const U32: usize = size_of::<u32>();
const I16: usize = size_of::<i16>();
pub const SLOT: usize = 2 * I16; // slot: offset, length
pub const HEAD: usize = 3 * U32 + 4 * I16; // page header: id, next, prev, slots, free ptr, free space, type
pub const DATA: usize = PAGE_SIZE - HEAD;

const _: () = assert!(DATA <= i16::MAX as usize);

fn head(id: u32) -> BytesMut {
    let mut buf = BytesMut::with_capacity(PAGE_SIZE);
    buf.put_u32(id);
    buf.put_u32(INVALID_PAGE);
    buf.put_u32(INVALID_PAGE);
    buf.put_i16(0);
    buf.put_i16(DATA as i16);
    buf.put_i16(DATA as i16);
    buf.put_i16(HEAP_PAGE);
    debug_assert_eq!(buf.len(), HEAD);
    buf
}

fn get_u32(buf: &BytesMut, pos: usize) -> u32 {
    let mut src = [0u8; U32];
    src.copy_from_slice(&buf[pos..(pos + U32)]);
    u32::from_be_bytes(src)
}

fn get_i16(buf: &BytesMut, pos: usize) -> i16 {
    let mut src = [0u8; I16];
    src.copy_from_slice(&buf[pos..(pos + I16)]);
    i16::from_be_bytes(src)
}

fn put_u32(buf: &mut BytesMut, pos: usize, val: u32) {
    let dst = &mut buf[pos..(pos + U32)];
    dst.copy_from_slice(&val.to_be_bytes());
}

fn put_i16(buf: &mut BytesMut, pos: usize, val: i16) {
    let dst = &mut buf[pos..(pos + I16)];
    dst.copy_from_slice(&val.to_be_bytes());
}

fn put_slice(buf: &mut BytesMut, pos: usize, src: &[u8]) {
    let dst = &mut buf[pos..(pos + src.len())];
    dst.copy_from_slice(src);
}

fn put_slot(buf: &mut BytesMut, idx: u16, slot: &Slot) {
    let pos = HEAD + idx as usize * SLOT;
    put_i16(buf, pos, slot.offset);
    put_i16(buf, pos + I16, slot.length);
}
