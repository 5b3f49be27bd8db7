use super::{sort_by_slot, TaskStore};
use crate::error::StoreError;
use chrono::NaiveDate;
use redis::{aio::Connection, AsyncCommands, Client};
use std::sync::Arc;
use tempo_shared::{Task, User};
use tracing::{debug, warn};
use uuid::Uuid;

/// Redis-backed store.
///
/// Tasks and users are JSON strings under `task:{id}` and `user:{id}`. Each
/// user has a `user:{id}:tasks` set of task ids, and `user:email:{email}`
/// maps an email to its user id.
#[derive(Clone)]
pub struct RedisStore {
    client: Arc<Client>,
}

fn task_key(id: impl std::fmt::Display) -> String {
    format!("task:{}", id)
}

fn user_key(id: Uuid) -> String {
    format!("user:{}", id)
}

fn user_tasks_key(id: Uuid) -> String {
    format!("user:{}:tasks", id)
}

fn email_key(email: &str) -> String {
    format!("user:email:{}", email)
}

impl RedisStore {
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        Ok(Self {
            client: Arc::new(client),
        })
    }

    async fn connection(&self) -> Result<Connection, StoreError> {
        Ok(self.client.get_async_connection().await?)
    }
}

const CLAIM_ATTEMPTS: usize = 3;

/// Loads the user indexed under `email`. An index entry whose user record is
/// gone is removed so the email can be claimed again.
async fn user_by_email(conn: &mut Connection, email: &str) -> Result<Option<User>, StoreError> {
    let id: Option<String> = conn.get(email_key(email)).await?;
    let Some(id) = id else {
        return Ok(None);
    };
    let user_json: Option<String> = conn.get(format!("user:{}", id)).await?;
    match user_json {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => {
            warn!("Email index for {} points at missing user {}", email, id);
            let _: () = conn.del(email_key(email)).await?;
            Ok(None)
        }
    }
}

impl TaskStore for RedisStore {
    async fn find_or_create_user(&self, email: &str, name: &str) -> Result<User, StoreError> {
        let mut conn = self.connection().await?;

        for _ in 0..CLAIM_ATTEMPTS {
            if let Some(user) = user_by_email(&mut conn, email).await? {
                return Ok(user);
            }

            // The record goes in first so a claimed email always points at a user.
            let user = User::new(email.to_string(), name.to_string());
            let _: () = conn.set(user_key(user.id), serde_json::to_string(&user)?).await?;
            let claimed: bool = conn.set_nx(email_key(email), user.id.to_string()).await?;
            if claimed {
                return Ok(user);
            }
            debug!("Lost race for {}, using the existing user", email);
            let _: () = conn.del(user_key(user.id)).await?;
        }
        Err(StoreError::Conflict(format!("could not claim user for {}", email)))
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;

        let user_json: Option<String> = conn.get(user_key(user_id)).await?;
        let Some(json) = user_json else {
            return Ok(false);
        };
        let user: User = serde_json::from_str(&json)?;
        let task_ids: Vec<String> = conn.smembers(user_tasks_key(user_id)).await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for id in &task_ids {
            pipe.del(task_key(id)).ignore();
        }
        pipe.del(user_tasks_key(user_id))
            .ignore()
            .del(user_key(user_id))
            .ignore()
            .del(email_key(&user.email))
            .ignore();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(true)
    }

    async fn create_task(&self, task: Task) -> Result<Task, StoreError> {
        let task_json = serde_json::to_string(&task)?;
        let mut conn = self.connection().await?;

        let _: () = redis::pipe()
            .atomic()
            .set(task_key(task.id), &task_json)
            .ignore()
            .sadd(user_tasks_key(task.user_id), task.id.to_string())
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(task)
    }

    async fn list_tasks(&self, user_id: Uuid, date: NaiveDate) -> Result<Vec<Task>, StoreError> {
        let mut conn = self.connection().await?;

        let ids: Vec<String> = conn.smembers(user_tasks_key(user_id)).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = ids.iter().map(task_key).collect();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        let mut tasks = Vec::new();
        for task_json in values.into_iter().flatten() {
            if let Ok(task) = serde_json::from_str::<Task>(&task_json) {
                if task.date == date {
                    tasks.push(task);
                }
            }
        }
        sort_by_slot(&mut tasks);
        Ok(tasks)
    }

    async fn get_task(&self, user_id: Uuid, id: Uuid) -> Result<Option<Task>, StoreError> {
        let mut conn = self.connection().await?;

        let task_json: Option<String> = conn.get(task_key(id)).await?;
        match task_json {
            Some(json) => {
                let task: Task = serde_json::from_str(&json)?;
                Ok(Some(task).filter(|t| t.user_id == user_id))
            }
            None => Ok(None),
        }
    }

    async fn save_task(&self, task: &Task) -> Result<(), StoreError> {
        let task_json = serde_json::to_string(task)?;
        let mut conn = self.connection().await?;

        let _: () = conn.set(task_key(task.id), task_json).await?;
        Ok(())
    }

    async fn delete_task(&self, user_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        if self.get_task(user_id, id).await?.is_none() {
            return Ok(false);
        }
        let mut conn = self.connection().await?;

        let _: () = redis::pipe()
            .atomic()
            .del(task_key(id))
            .ignore()
            .srem(user_tasks_key(user_id), id.to_string())
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_shared::CreateTaskRequest;

    /// Store against the server named by `REDIS_URL`; these tests are skipped
    /// when it is unset.
    fn live_store() -> Option<RedisStore> {
        let url = std::env::var("REDIS_URL").ok().filter(|url| !url.is_empty())?;
        Some(RedisStore::open(&url).unwrap())
    }

    fn unique_email() -> String {
        format!("{}@test.tempo.app", Uuid::new_v4())
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn task(user_id: Uuid, title: &str, date: NaiveDate, slot: Option<&str>) -> Task {
        let request = CreateTaskRequest {
            title: title.to_string(),
            description: None,
            date: None,
            time_slot: slot.map(str::to_string),
            duration: None,
            priority: None,
            category: None,
            original_input: None,
        };
        Task::new(user_id, request, date)
    }

    #[test]
    fn key_layout() {
        let id = Uuid::nil();
        assert_eq!(task_key(id), "task:00000000-0000-0000-0000-000000000000");
        assert_eq!(
            user_tasks_key(id),
            "user:00000000-0000-0000-0000-000000000000:tasks"
        );
        assert_eq!(email_key("demo@tempo.app"), "user:email:demo@tempo.app");
    }

    #[test]
    fn open_rejects_malformed_url() {
        assert!(RedisStore::open("not a url").is_err());
        assert!(RedisStore::open("redis://127.0.0.1:6379").is_ok());
    }

    #[tokio::test]
    async fn users_are_found_by_email() {
        let Some(store) = live_store() else { return };
        let email = unique_email();
        let first = store.find_or_create_user(&email, "A").await.unwrap();
        let again = store.find_or_create_user(&email, "Other").await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(again.name, "A");
        assert!(store.delete_user(first.id).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_logins_share_one_user() {
        let Some(store) = live_store() else { return };
        let email = unique_email();
        let (a, b, c) = tokio::join!(
            store.find_or_create_user(&email, "A"),
            store.find_or_create_user(&email, "B"),
            store.find_or_create_user(&email, "C"),
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert_eq!(a.id, b.id);
        assert_eq!(b.id, c.id);

        let later = store.find_or_create_user(&email, "D").await.unwrap();
        assert_eq!(later.id, a.id);
        assert!(store.delete_user(a.id).await.unwrap());
    }

    #[tokio::test]
    async fn dangling_email_index_is_reclaimed() {
        let Some(store) = live_store() else { return };
        let email = unique_email();
        let mut conn = store.connection().await.unwrap();
        let _: () = conn.set(email_key(&email), Uuid::new_v4().to_string()).await.unwrap();

        let user = store.find_or_create_user(&email, "E").await.unwrap();
        let indexed: String = conn.get(email_key(&email)).await.unwrap();
        assert_eq!(indexed, user.id.to_string());
        assert!(store.delete_user(user.id).await.unwrap());
    }

    #[tokio::test]
    async fn list_filters_by_date_and_orders_by_slot() {
        let Some(store) = live_store() else { return };
        let user = store.find_or_create_user(&unique_email(), "L").await.unwrap();
        store.create_task(task(user.id, "late", day(1), Some("18:00"))).await.unwrap();
        store.create_task(task(user.id, "early", day(1), Some("08:30"))).await.unwrap();
        store.create_task(task(user.id, "anytime", day(1), None)).await.unwrap();
        store.create_task(task(user.id, "tomorrow", day(2), None)).await.unwrap();

        let titles: Vec<String> = store
            .list_tasks(user.id, day(1))
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, ["anytime", "early", "late"]);
        assert!(store.list_tasks(user.id, day(3)).await.unwrap().is_empty());
        assert!(store.delete_user(user.id).await.unwrap());
    }

    #[tokio::test]
    async fn foreign_tasks_are_invisible() {
        let Some(store) = live_store() else { return };
        let owner = store.find_or_create_user(&unique_email(), "O").await.unwrap();
        let intruder = store.find_or_create_user(&unique_email(), "I").await.unwrap();
        let created = store
            .create_task(task(owner.id, "mine", day(1), None))
            .await
            .unwrap();

        assert!(store.get_task(intruder.id, created.id).await.unwrap().is_none());
        assert!(!store.delete_task(intruder.id, created.id).await.unwrap());
        assert!(store.get_task(owner.id, created.id).await.unwrap().is_some());

        assert!(store.delete_task(owner.id, created.id).await.unwrap());
        assert!(store.get_task(owner.id, created.id).await.unwrap().is_none());
        let mut conn = store.connection().await.unwrap();
        let indexed: bool = conn
            .sismember(user_tasks_key(owner.id), created.id.to_string())
            .await
            .unwrap();
        assert!(!indexed);

        store.delete_user(owner.id).await.unwrap();
        store.delete_user(intruder.id).await.unwrap();
    }

    #[tokio::test]
    async fn saved_changes_are_read_back() {
        let Some(store) = live_store() else { return };
        let user = store.find_or_create_user(&unique_email(), "S").await.unwrap();
        let mut created = store
            .create_task(task(user.id, "draft", day(1), None))
            .await
            .unwrap();

        created.toggle();
        store.save_task(&created).await.unwrap();
        let loaded = store.get_task(user.id, created.id).await.unwrap().unwrap();
        assert_eq!(loaded, created);
        assert!(store.delete_user(user.id).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_user_cascades_to_tasks() {
        let Some(store) = live_store() else { return };
        let email = unique_email();
        let user = store.find_or_create_user(&email, "B").await.unwrap();
        let created = store
            .create_task(task(user.id, "gone", day(1), None))
            .await
            .unwrap();

        assert!(store.delete_user(user.id).await.unwrap());
        let mut conn = store.connection().await.unwrap();
        let task_json: Option<String> = conn.get(task_key(created.id)).await.unwrap();
        assert!(task_json.is_none());
        let index: Option<String> = conn.get(email_key(&email)).await.unwrap();
        assert!(index.is_none());
        let ids: Vec<String> = conn.smembers(user_tasks_key(user.id)).await.unwrap();
        assert!(ids.is_empty());
        assert!(!store.delete_user(user.id).await.unwrap());
    }
}
