use serde::Serialize;

/// A group that failed, with enough context to surface to an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupError {
    pub title: String,
    pub message: String,
}

/// Aggregated accounting for one reconciliation run.
///
/// Shared across the run's concurrent group tasks behind a mutex; a clone of
/// the final state rides on the completion event. A run always ends with one
/// of these; never a bare error without accounting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncStats {
    pub total_groups: usize,
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errored: usize,
    pub deleted: usize,
    pub variants_created: usize,
    pub variants_updated: usize,
    pub errors: Vec<GroupError>,
}

impl SyncStats {
    pub fn record_error(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.errored += 1;
        self.errors.push(GroupError {
            title: title.into(),
            message: message.into(),
        });
    }
}
