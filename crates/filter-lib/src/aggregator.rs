//! Resource demand aggregation over a work item's containers

use crate::models::{ResourceSummary, WorkItem};

/// Sum every container's declared limits, resource by resource.
///
/// Containers without limits contribute nothing. The result owns its data
/// and shares nothing with `work`.
pub fn summarize(work: &WorkItem) -> ResourceSummary {
    let mut summary = ResourceSummary::default();
    for container in &work.containers {
        summary.add(&container.limits);
    }
    summary
}
