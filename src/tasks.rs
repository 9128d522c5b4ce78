//! In-memory crawl task registry.
//!
//! [`TaskRegistry`] is the single source of truth for crawl progress. The
//! orchestrator inserts records, the runner applies [`TaskTransition`]s,
//! and the status/list endpoints read cloned snapshots. Nothing is
//! persisted; records live until the process exits and are never deleted.
//!
//! Every transition is checked against the task state machine under the
//! write lock, so a record can never leave `completed` or `failed`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use uuid::Uuid;

use crate::error::{HarnessError, HarnessResult};
use crate::models::{CrawlRequest, TaskRecord, TaskStatus, TaskTransition};

#[derive(Default)]
struct Inner {
    /// Records in insertion order.
    records: Vec<TaskRecord>,
    /// task_id → position in `records`.
    index: HashMap<String, usize>,
}

/// Process-wide registry of crawl tasks.
#[derive(Default)]
pub struct TaskRegistry {
    inner: RwLock<Inner>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new `pending` task for `request` and returns its id.
    pub fn create(&self, request: &CrawlRequest) -> String {
        let task_id = Uuid::new_v4().to_string();
        let record = TaskRecord {
            task_id: task_id.clone(),
            url: request.url.clone(),
            pattern: request.pattern.clone(),
            max_depth: request.max_depth,
            collection_name: request.collection_name.clone(),
            status: TaskStatus::Pending,
            start_time: Utc::now(),
            finish_time: None,
            pages_crawled: None,
            error: None,
        };

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let pos = inner.records.len();
        inner.records.push(record);
        inner.index.insert(task_id.clone(), pos);
        task_id
    }

    /// Snapshot of one task.
    pub fn get(&self, task_id: &str) -> HarnessResult<TaskRecord> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .index
            .get(task_id)
            .map(|&pos| inner.records[pos].clone())
            .ok_or_else(|| HarnessError::TaskNotFound(task_id.to_string()))
    }

    /// Snapshot of every task, oldest first.
    pub fn list(&self) -> Vec<TaskRecord> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.records.clone()
    }

    /// Applies one lifecycle transition and returns the updated record.
    pub fn update(&self, task_id: &str, transition: TaskTransition) -> HarnessResult<TaskRecord> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let pos = *inner
            .index
            .get(task_id)
            .ok_or_else(|| HarnessError::TaskNotFound(task_id.to_string()))?;
        let record = &mut inner.records[pos];

        let target = transition.target();
        if !record.status.can_transition_to(target) {
            return Err(HarnessError::InvalidTransition {
                task_id: task_id.to_string(),
                from: record.status,
                to: target,
            });
        }

        record.status = target;
        match transition {
            TaskTransition::Started => {}
            TaskTransition::Completed { pages_crawled } => {
                record.finish_time = Some(Utc::now());
                record.pages_crawled = pages_crawled;
            }
            TaskTransition::Failed { error } => {
                record.finish_time = Some(Utc::now());
                record.error = Some(error);
            }
        }

        Ok(record.clone())
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn request() -> CrawlRequest {
        CrawlRequest::new("https://example.com/docs").with_collection("docs")
    }

    #[test]
    fn create_registers_pending_record() {
        let registry = TaskRegistry::new();
        let id = registry.create(&request());

        let record = registry.get(&id).unwrap();
        assert_eq!(record.task_id, id);
        assert_eq!(record.status, TaskStatus::Pending);
        assert_eq!(record.url, "https://example.com/docs");
        assert_eq!(record.collection_name, "docs");
        assert!(record.finish_time.is_none());
        assert!(record.pages_crawled.is_none());
        assert!(record.error.is_none());
    }

    #[test]
    fn get_unknown_is_not_found() {
        let registry = TaskRegistry::new();
        let err = registry.get("missing").unwrap_err();
        assert!(matches!(err, HarnessError::TaskNotFound(id) if id == "missing"));
    }

    #[test]
    fn list_returns_every_record_with_unique_ids() {
        let registry = TaskRegistry::new();
        for _ in 0..5 {
            registry.create(&request());
        }
        let records = registry.list();
        assert_eq!(records.len(), 5);
        let ids: HashSet<_> = records.iter().map(|r| r.task_id.clone()).collect();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn list_preserves_insertion_order() {
        let registry = TaskRegistry::new();
        let a = registry.create(&request());
        let b = registry.create(&request());
        let ids: Vec<_> = registry.list().into_iter().map(|r| r.task_id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn completed_transition_stamps_finish_and_pages() {
        let registry = TaskRegistry::new();
        let id = registry.create(&request());
        registry.update(&id, TaskTransition::Started).unwrap();
        let record = registry
            .update(
                &id,
                TaskTransition::Completed {
                    pages_crawled: Some(12),
                },
            )
            .unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.pages_crawled, Some(12));
        assert!(record.finish_time.is_some());
        assert!(record.error.is_none());
    }

    #[test]
    fn failed_transition_records_error() {
        let registry = TaskRegistry::new();
        let id = registry.create(&request());
        registry.update(&id, TaskTransition::Started).unwrap();
        let record = registry
            .update(
                &id,
                TaskTransition::Failed {
                    error: "connection refused".into(),
                },
            )
            .unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("connection refused"));
        assert!(record.pages_crawled.is_none());
    }

    #[test]
    fn terminal_states_are_final() {
        let registry = TaskRegistry::new();
        let id = registry.create(&request());
        registry.update(&id, TaskTransition::Started).unwrap();
        registry
            .update(
                &id,
                TaskTransition::Completed {
                    pages_crawled: None,
                },
            )
            .unwrap();

        for transition in [
            TaskTransition::Started,
            TaskTransition::Failed {
                error: "late".into(),
            },
            TaskTransition::Completed {
                pages_crawled: Some(1),
            },
        ] {
            let err = registry.update(&id, transition).unwrap_err();
            assert!(matches!(err, HarnessError::InvalidTransition { .. }));
        }
        let record = registry.get(&id).unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert!(record.pages_crawled.is_none());
        assert!(record.error.is_none());
    }

    #[test]
    fn cannot_skip_in_progress() {
        let registry = TaskRegistry::new();
        let id = registry.create(&request());
        let err = registry
            .update(
                &id,
                TaskTransition::Completed {
                    pages_crawled: Some(3),
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            HarnessError::InvalidTransition {
                from: TaskStatus::Pending,
                to: TaskStatus::Completed,
                ..
            }
        ));
    }

    #[test]
    fn update_unknown_is_not_found() {
        let registry = TaskRegistry::new();
        assert!(matches!(
            registry.update("nope", TaskTransition::Started),
            Err(HarnessError::TaskNotFound(_))
        ));
        assert!(registry.is_empty());
    }
}
