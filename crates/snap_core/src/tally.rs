use crate::ItemId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// `None` when the failure could not be attributed to one item,
    /// e.g. a worker that died before reporting.
    pub item_id: Option<ItemId>,
    pub reason: String,
}

/// Results of one processing pass, accumulated in completion order.
///
/// Completion order carries no meaning: the checkpoint candidate is the
/// numeric maximum over confirmed successes.
#[derive(Debug, Clone)]
pub struct RunTally<T> {
    successes: Vec<(ItemId, T)>,
    failures: Vec<ItemFailure>,
}

impl<T> Default for RunTally<T> {
    fn default() -> Self {
        Self {
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> RunTally<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, item_id: ItemId, payload: T) {
        self.successes.push((item_id, payload));
    }

    pub fn record_failure(&mut self, item_id: Option<ItemId>, reason: impl Into<String>) {
        self.failures.push(ItemFailure {
            item_id,
            reason: reason.into(),
        });
    }

    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn completed(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn failures(&self) -> &[ItemFailure] {
        &self.failures
    }

    pub fn succeeded_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.successes.iter().map(|(id, _)| id)
    }

    pub fn checkpoint_candidate(&self) -> Option<ItemId> {
        self.succeeded_ids().max().cloned()
    }

    /// Short human-readable summary of processing failures, if any.
    pub fn error_summary(&self) -> Option<String> {
        let first = self.failures.first()?;
        let subject = match &first.item_id {
            Some(id) => format!("item {id}"),
            None => "worker".to_string(),
        };
        Some(format!(
            "{} of {} item(s) failed; first: {}: {}",
            self.failures.len(),
            self.completed(),
            subject,
            first.reason
        ))
    }

    pub fn into_payloads(self) -> Vec<T> {
        self.successes.into_iter().map(|(_, payload)| payload).collect()
    }
}
