//! Slotted heap page.
//!
//! Layout of a page of `page_size` bytes for a schema of tuple width `w`:
//!
//! ```text
//! +----------------------+-----------+-----------+-----+-----------+---------+
//! | occupancy bitmap     | slot 0    | slot 1    | ... | slot n-1  | padding |
//! | ceil(n / 8) bytes    | w bytes   | w bytes   |     | w bytes   |         |
//! +----------------------+-----------+-----------+-----+-----------+---------+
//! ```
//!
//! with `n = floor(page_size * 8 / (w * 8 + 1))`: every slot costs its tuple
//! bytes plus one bitmap bit. Bit `i % 8` of bitmap byte `i / 8` is set when
//! slot `i` holds a live tuple. Bytes of free slots and of the padding are
//! carried through unchanged, so a page image round-trips byte for byte.

use crate::access::schema::Schema;
use crate::access::tuple::Tuple;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{PageId, RecordId};
use crate::transaction::TransactionId;
use parking_lot::RwLock;
use std::sync::Arc;

/// A cached page, shared by identity between the buffer pool and its callers.
pub type PageRef = Arc<RwLock<HeapPage>>;

#[derive(Debug, Clone)]
pub struct HeapPage {
    page_id: PageId,
    schema: Arc<Schema>,
    data: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirtied_by: Option<TransactionId>,
}

impl HeapPage {
    /// Number of tuple slots a page can hold.
    pub fn slot_capacity(page_size: usize, tuple_size: usize) -> usize {
        (page_size * 8) / (tuple_size * 8 + 1)
    }

    /// Bitmap bytes needed to track `capacity` slots.
    pub fn bitmap_len(capacity: usize) -> usize {
        capacity.div_ceil(8)
    }

    /// Image of a page with no occupied slots.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    pub fn new_empty(
        page_id: PageId,
        schema: Arc<Schema>,
        page_size: usize,
    ) -> StorageResult<Self> {
        Self::from_bytes(page_id, schema, &Self::empty_page_data(page_size))
    }

    /// Materializes a page from its on-disk image. The page size is the
    /// length of `data`.
    pub fn from_bytes(page_id: PageId, schema: Arc<Schema>, data: &[u8]) -> StorageResult<Self> {
        let invalid = |reason: String| StorageError::InvalidPageImage { page_id, reason };

        let tuple_size = schema.tuple_size();
        let capacity = Self::slot_capacity(data.len(), tuple_size);
        if capacity == 0 {
            return Err(invalid(format!(
                "tuple of {} bytes does not fit in a {} byte page",
                tuple_size,
                data.len()
            )));
        }
        if capacity > u16::MAX as usize + 1 {
            return Err(invalid(format!("{} slots exceed the slot id range", capacity)));
        }

        let bitmap_len = Self::bitmap_len(capacity);
        let mut tuples = Vec::with_capacity(capacity);
        for slot in 0..capacity {
            if data[slot / 8] & (1 << (slot % 8)) == 0 {
                tuples.push(None);
                continue;
            }
            let offset = bitmap_len + slot * tuple_size;
            let mut bytes = &data[offset..offset + tuple_size];
            let mut tuple = Tuple::deserialize_from(schema.clone(), &mut bytes)
                .map_err(|e| invalid(format!("slot {}: {}", slot, e)))?;
            tuple.set_record_id(Some(RecordId::new(page_id, slot as u16)));
            tuples.push(Some(tuple));
        }

        Ok(Self {
            page_id,
            schema,
            data: data.to_vec(),
            tuples,
            dirtied_by: None,
        })
    }

    /// The page image as written to disk.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn page_size(&self) -> usize {
        self.data.len()
    }

    pub fn capacity(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.capacity() && self.data[slot / 8] & (1 << (slot % 8)) != 0
    }

    fn set_slot_used(&mut self, slot: usize, used: bool) {
        if used {
            self.data[slot / 8] |= 1 << (slot % 8);
        } else {
            self.data[slot / 8] &= !(1 << (slot % 8));
        }
    }

    fn slot_offset(&self, slot: usize) -> usize {
        Self::bitmap_len(self.capacity()) + slot * self.schema.tuple_size()
    }

    pub fn num_empty_slots(&self) -> usize {
        self.tuples.iter().filter(|t| t.is_none()).count()
    }

    pub fn num_tuples(&self) -> usize {
        self.capacity() - self.num_empty_slots()
    }

    /// Stores `tuple` in the lowest free slot and stamps its record id.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> StorageResult<RecordId> {
        if tuple.schema().as_ref() != self.schema.as_ref() {
            return Err(StorageError::SchemaMismatch(format!(
                "tuple schema [{}] does not match page schema [{}]",
                tuple.schema(),
                self.schema
            )));
        }
        let slot = self
            .tuples
            .iter()
            .position(Option::is_none)
            .ok_or(StorageError::PageFull {
                page_id: self.page_id,
                capacity: self.capacity(),
            })?;

        let mut bytes = Vec::with_capacity(self.schema.tuple_size());
        tuple.serialize_into(&mut bytes)?;
        let offset = self.slot_offset(slot);
        self.data[offset..offset + bytes.len()].copy_from_slice(&bytes);
        self.set_slot_used(slot, true);

        let record_id = RecordId::new(self.page_id, slot as u16);
        tuple.set_record_id(Some(record_id));
        self.tuples[slot] = Some(tuple.clone());
        Ok(record_id)
    }

    /// Frees the slot named by `record_id`. The slot bytes stay in place.
    pub fn delete_record(&mut self, record_id: RecordId) -> StorageResult<Tuple> {
        if record_id.page_id != self.page_id {
            return Err(StorageError::TupleNotFound(format!(
                "{} does not belong to page {}",
                record_id, self.page_id
            )));
        }
        let slot = record_id.slot_id as usize;
        if !self.is_slot_used(slot) {
            return Err(StorageError::stale_record(record_id));
        }
        self.set_slot_used(slot, false);
        let mut removed = self.tuples[slot]
            .take()
            .ok_or_else(|| StorageError::stale_record(record_id))?;
        removed.set_record_id(None);
        Ok(removed)
    }

    /// Deletes the slot `tuple` occupies and clears the tuple's record id.
    pub fn delete_tuple(&mut self, tuple: &mut Tuple) -> StorageResult<()> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| StorageError::TupleNotFound("tuple has no record id".into()))?;
        self.delete_record(record_id)?;
        tuple.set_record_id(None);
        Ok(())
    }

    pub fn tuple(&self, slot: usize) -> Option<&Tuple> {
        self.tuples.get(slot).and_then(Option::as_ref)
    }

    /// Live tuples in increasing slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> + '_ {
        self.tuples.iter().filter_map(Option::as_ref)
    }

    /// Marks the page dirty on behalf of `tid`, or clean when `dirty` is false.
    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionId) {
        self.dirtied_by = if dirty { Some(tid) } else { None };
    }

    /// The transaction that last dirtied this page, if it is dirty.
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtied_by.is_some()
    }
}
