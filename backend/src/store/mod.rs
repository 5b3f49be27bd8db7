//! Task persistence keyed by owning user.

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use crate::error::StoreError;
use chrono::NaiveDate;
use std::future::Future;
use tempo_shared::{Task, User};
use uuid::Uuid;

/// Storage backend for users and their tasks.
///
/// Lookups are always scoped to a user: a task owned by someone else behaves
/// as if it did not exist.
pub trait TaskStore: Send + Sync + 'static {
    fn find_or_create_user(
        &self,
        email: &str,
        name: &str,
    ) -> impl Future<Output = Result<User, StoreError>> + Send;

    /// Removes the user together with all of their tasks.
    fn delete_user(&self, user_id: Uuid) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn create_task(&self, task: Task) -> impl Future<Output = Result<Task, StoreError>> + Send;

    /// Tasks on `date`, unscheduled first, then by time slot and creation time.
    fn list_tasks(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<Task>, StoreError>> + Send;

    fn get_task(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Task>, StoreError>> + Send;

    fn save_task(&self, task: &Task) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_task(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

pub(crate) fn sort_by_slot(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        a.time_slot
            .cmp(&b.time_slot)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}
