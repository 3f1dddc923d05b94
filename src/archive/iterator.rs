//! Archive Iterators
//!
//! Forward iteration over the record index, optionally reading each raw
//! payload as it goes.

use crate::error::Result;

use super::{Archive, Record};

/// Iterator over records in file order
pub struct RecordIter<'a> {
    records: &'a [Record],
    position: usize,
}

impl<'a> RecordIter<'a> {
    pub(super) fn new(records: &'a [Record]) -> Self {
        Self {
            records,
            position: 0,
        }
    }

    /// Start over from the first record
    pub fn rewind(&mut self) {
        self.position = 0;
    }
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = &'a Record;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.get(self.position)?;
        self.position += 1;
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.records.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RecordIter<'_> {}

/// Iterator over (record, raw payload) pairs
pub struct PayloadIter<'a> {
    archive: &'a Archive,
    records: RecordIter<'a>,
}

impl<'a> PayloadIter<'a> {
    pub(super) fn new(archive: &'a Archive) -> Self {
        Self {
            archive,
            records: archive.iter(),
        }
    }

    /// Start over from the first record
    pub fn rewind(&mut self) {
        self.records.rewind();
    }
}

impl<'a> Iterator for PayloadIter<'a> {
    type Item = Result<(&'a Record, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(
            self.archive
                .materialize_payload(record)
                .map(|payload| (record, payload)),
        )
    }
}
