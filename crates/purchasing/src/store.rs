//! Flat-file purchase order store.
//!
//! Headers and lines share one file. A header plus its lines is appended
//! as a single write so an order is persisted as one unit or not at all;
//! a status update rewrites only the matching header's status field.

use std::sync::{Mutex, PoisonError};

use stockdesk_core::PoId;
use stockdesk_store::{RecordFile, StoreError};

use crate::order::{PoStatus, PurchaseOrder, PurchaseOrderLine};

#[derive(Debug)]
pub struct OrderStore {
    file: RecordFile,
    write_lock: Mutex<()>,
}

impl OrderStore {
    pub fn new(file: RecordFile) -> Self {
        Self {
            file,
            write_lock: Mutex::new(()),
        }
    }

    /// Persist a header and its lines as one unit.
    pub fn save(
        &self,
        order: &PurchaseOrder,
        lines: &[PurchaseOrderLine],
    ) -> Result<(), StoreError> {
        let mut records = Vec::with_capacity(lines.len() + 1);
        records.push(order.to_header_record());
        for line in lines {
            records.push(line.to_record());
        }

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.file.append_lines(&records)
    }

    pub fn status_of(&self, po_id: &PoId) -> Result<Option<PoStatus>, StoreError> {
        Ok(self
            .orders()?
            .into_iter()
            .find(|o| &o.id == po_id)
            .map(|o| o.status))
    }

    /// Rewrite the matching header's status field in place.
    ///
    /// Returns whether a header was updated; all other lines (including
    /// line records and anything unparseable) are preserved verbatim.
    pub fn update_status(&self, po_id: &PoId, status: PoStatus) -> Result<bool, StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let lines = self.file.read_lines()?;
        let mut updated = false;
        let mut new_lines = Vec::with_capacity(lines.len());

        for line in lines {
            match PurchaseOrder::parse_header_record(&line) {
                Some(mut order) if &order.id == po_id => {
                    order.status = status;
                    new_lines.push(order.to_header_record());
                    updated = true;
                }
                _ => new_lines.push(line),
            }
        }

        if updated {
            self.file.rewrite(&new_lines)?;
        }
        Ok(updated)
    }

    /// All order headers, in file order. Malformed headers are skipped.
    pub fn orders(&self) -> Result<Vec<PurchaseOrder>, StoreError> {
        Ok(self
            .file
            .read_lines()?
            .iter()
            .filter_map(|line| PurchaseOrder::parse_header_record(line))
            .collect())
    }

    /// The lines belonging to one order, in file order.
    pub fn lines_for(&self, po_id: &PoId) -> Result<Vec<PurchaseOrderLine>, StoreError> {
        Ok(self
            .file
            .read_lines()?
            .iter()
            .filter_map(|line| PurchaseOrderLine::parse_record(line))
            .filter(|l| &l.po_id == po_id)
            .collect())
    }
}
