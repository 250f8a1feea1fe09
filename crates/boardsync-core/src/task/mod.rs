//! Task domain logic.

pub mod model;

pub use model::{BoardSyncTask, TaskChanges, TaskStatus};

/// Count tasks per status, in board order.
pub fn count_by_status(tasks: &[BoardSyncTask]) -> [(TaskStatus, usize); 4] {
    TaskStatus::ALL.map(|status| {
        let count = tasks.iter().filter(|t| t.status == status).count();
        (status, count)
    })
}

/// Group tasks into board columns, preserving collection order inside each.
pub fn columns(tasks: &[BoardSyncTask]) -> Vec<(TaskStatus, Vec<&BoardSyncTask>)> {
    TaskStatus::ALL
        .iter()
        .map(|status| {
            let column = tasks.iter().filter(|t| t.status == *status).collect();
            (*status, column)
        })
        .collect()
}
