use super::{sort_by_slot, TaskStore};
use crate::error::StoreError;
use chrono::NaiveDate;
use std::collections::HashMap;
use tempo_shared::{Task, User};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local store, used when no Redis URL is configured.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskStore for MemoryStore {
    async fn find_or_create_user(&self, email: &str, name: &str) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if let Some(user) = users.values().find(|u| u.email == email) {
            return Ok(user.clone());
        }
        let user = User::new(email.to_string(), name.to_string());
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool, StoreError> {
        let removed = self.users.write().await.remove(&user_id).is_some();
        self.tasks.write().await.retain(|_, t| t.user_id != user_id);
        Ok(removed)
    }

    async fn create_task(&self, task: Task) -> Result<Task, StoreError> {
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(task)
    }

    async fn list_tasks(&self, user_id: Uuid, date: NaiveDate) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.user_id == user_id && t.date == date)
            .cloned()
            .collect();
        sort_by_slot(&mut tasks);
        Ok(tasks)
    }

    async fn get_task(&self, user_id: Uuid, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self
            .tasks
            .read()
            .await
            .get(&id)
            .filter(|t| t.user_id == user_id)
            .cloned())
    }

    async fn save_task(&self, task: &Task) -> Result<(), StoreError> {
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(())
    }

    async fn delete_task(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.write().await;
        match tasks.get(&id) {
            Some(task) if task.user_id == user_id => {
                tasks.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
