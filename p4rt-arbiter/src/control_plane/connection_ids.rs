//! Process-wide connection-id allocation.

use crate::status::{ErrorCode, Status};
use std::collections::BTreeSet;

/// Live connection ids. New ids are the lowest free value starting at 1.
#[derive(Debug)]
pub(crate) struct ConnectionIds {
    allocated: BTreeSet<u64>,
    max_connections: usize,
}

impl ConnectionIds {
    pub(crate) fn new(max_connections: usize) -> Self {
        Self {
            allocated: BTreeSet::new(),
            max_connections,
        }
    }

    pub(crate) fn allocate(&mut self) -> Result<u64, Status> {
        if self.allocated.len() >= self.max_connections {
            return Err(Status::fail_with_code(
                ErrorCode::NoResource,
                format!(
                    "Can have max {} active/inactive streams for all the node.",
                    self.max_connections
                ),
            ));
        }
        // The set holds fewer ids than the range below, so a gap exists.
        let upper = self.allocated.len() as u64 + 1;
        let Some(id) = (1..=upper).find(|id| !self.allocated.contains(id)) else {
            return Err(Status::fail_with_code(
                ErrorCode::TableFull,
                "Connection list id full.",
            ));
        };
        self.allocated.insert(id);
        Ok(id)
    }

    pub(crate) fn release(&mut self, connection_id: u64) -> bool {
        self.allocated.remove(&connection_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.allocated.len()
    }
}
