use crate::category::{self, Category};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_DURATION: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// Structured fields extracted from free text, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTask {
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub time_slot: Option<String>,
    pub duration: u32,
    pub priority: Priority,
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            name,
            created_at: Utc::now(),
        }
    }
}

/// A persisted task as kept by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub time_slot: Option<String>,
    pub duration: u32,
    pub completed: bool,
    pub priority: Priority,
    pub color: String,
    pub category: String,
    pub original_input: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time_slot: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub original_input: Option<String>,
}

/// Partial update. `time_slot` distinguishes "absent" (keep) from `null` (clear).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub time_slot: Option<Option<String>>,
    pub duration: Option<u32>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ParseRequest {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub reference_date: Option<String>,
}

/// Wire representation of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub time_slot: Option<String>,
    pub duration: u32,
    pub completed: bool,
    pub priority: Priority,
    pub color: String,
    pub category: String,
    pub category_label: String,
    pub category_icon: String,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Parses a `YYYY-MM-DD` date, `None` when malformed.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Accepts `H:MM` or `HH:MM` within a day and returns it zero-padded.
pub fn normalize_time_slot(s: &str) -> Option<String> {
    let (hour, minute) = s.trim().split_once(':')?;
    let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !(1..=2).contains(&hour.len()) || minute.len() != 2 || !digits(hour) || !digits(minute) {
        return None;
    }
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    (hour < 24 && minute < 60).then(|| format!("{:02}:{:02}", hour, minute))
}

fn color_for(category: &str) -> String {
    category::resolve(category).color.to_string()
}

impl Task {
    /// Builds a task from request fields. A missing or malformed date falls back
    /// to `today`, and a slot that is not a valid time of day is dropped.
    pub fn new(user_id: Uuid, request: CreateTaskRequest, today: NaiveDate) -> Self {
        let category = request
            .category
            .unwrap_or_else(|| Category::Other.as_str().to_string());
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: request.title,
            description: request.description.unwrap_or_default(),
            date: request.date.as_deref().and_then(parse_date).unwrap_or(today),
            time_slot: request.time_slot.as_deref().and_then(normalize_time_slot),
            duration: request.duration.unwrap_or(DEFAULT_DURATION),
            completed: false,
            priority: request.priority.unwrap_or_default(),
            color: color_for(&category),
            category,
            original_input: request.original_input.unwrap_or_default(),
            created_at: Utc::now(),
        }
    }

    /// Applies a partial update. A malformed date is replaced with `today`.
    pub fn apply(&mut self, update: UpdateTaskRequest, today: NaiveDate) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(date) = update.date {
            self.date = parse_date(&date).unwrap_or(today);
        }
        if let Some(time_slot) = update.time_slot {
            self.time_slot = time_slot.as_deref().and_then(normalize_time_slot);
        }
        if let Some(duration) = update.duration {
            self.duration = duration;
        }
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        self.color = color_for(&self.category);
    }

    pub fn toggle(&mut self) {
        self.completed = !self.completed;
    }
}

impl From<&Task> for TaskResponse {
    fn from(task: &Task) -> Self {
        let info = category::resolve(&task.category);
        Self {
            id: task.id,
            title: task.title.clone(),
            description: task.description.clone(),
            date: task.date,
            time_slot: task.time_slot.clone(),
            duration: task.duration,
            completed: task.completed,
            priority: task.priority,
            color: task.color.clone(),
            category: task.category.clone(),
            category_label: info.label.to_string(),
            category_icon: info.icon.to_string(),
        }
    }
}
