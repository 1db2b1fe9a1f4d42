use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::controller::ExecutionReport;

/// Recently applied reports, looked up by execution id.
///
/// Bounded: once `capacity` reports are held, recording a new one evicts
/// the oldest.
#[derive(Debug)]
pub struct ExecutionHistory {
    capacity: usize,
    reports: Mutex<VecDeque<ExecutionReport>>,
}

impl ExecutionHistory {
    pub fn new(capacity: usize) -> Self {
        ExecutionHistory {
            capacity,
            reports: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&self, report: ExecutionReport) {
        if self.capacity == 0 {
            return;
        }
        let mut reports = self.reports.lock().unwrap_or_else(PoisonError::into_inner);
        while reports.len() >= self.capacity {
            reports.pop_front();
        }
        reports.push_back(report);
    }

    pub fn get(&self, execution_id: &str) -> Option<ExecutionReport> {
        let reports = self.reports.lock().unwrap_or_else(PoisonError::into_inner);
        reports
            .iter()
            .rev()
            .find(|r| r.execution_id == execution_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Execution ids, newest first.
    pub fn ids(&self) -> Vec<String> {
        let reports = self.reports.lock().unwrap_or_else(PoisonError::into_inner);
        reports.iter().rev().map(|r| r.execution_id.clone()).collect()
    }
}
