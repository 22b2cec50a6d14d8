use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents a task entity as stored in the database.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Task {
    /// Unique identifier for the task (UUID v4).
    pub id: Uuid,
    /// Identifier of the profile that owns the task.
    pub profile_id: i32,
    /// The title of the task.
    pub title: String,
    /// Whether the task has been completed.
    pub complete: bool,
    /// Timestamp of when the task was created.
    pub creation_date: DateTime<Utc>,
    /// Timestamp of the last update to the task. Tracked internally,
    /// never part of a response body.
    pub updated_date: DateTime<Utc>,
}

/// Input structure for creating or fully replacing a task.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TaskInput {
    /// The title of the task. Must be between 1 and 200 characters.
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    /// Whether the task is completed. Defaults to false when omitted,
    /// which on a full update also resets the flag.
    #[serde(default)]
    pub complete: bool,
}

/// Input structure for a partial update. Omitted fields keep their value.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TaskPatch {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub complete: Option<bool>,
}

/// Query parameters accepted when listing tasks.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskQuery {
    /// Exact title match.
    pub title: Option<String>,
    /// Keep tasks created on or after this date.
    pub from_date: Option<NaiveDate>,
    /// Keep tasks created on or before this date.
    pub to_date: Option<NaiveDate>,
    /// Case-insensitive substring match on the title.
    pub search: Option<String>,
    /// `creation_date` for oldest first, `-creation_date` for newest first.
    pub ordering: Option<String>,
    /// 1-based page number. Kept as text so an unusable value can be
    /// answered as a missing page instead of a malformed request.
    pub page: Option<String>,
}

impl Task {
    /// The list representation: includes both a relative and an absolute
    /// link to the task detail.
    pub fn to_list_json(&self, base_url: &str) -> Value {
        json!({
            "id": self.id,
            "user": self.profile_id,
            "title": self.title,
            "complete": self.complete,
            "relative_url": self.relative_url(),
            "absolute_url": format!("{}{}", base_url, self.relative_url()),
            "creation_date": self.creation_date,
        })
    }

    /// The detail representation: same fields minus the links, since the
    /// caller already knows where the task lives.
    pub fn to_detail_json(&self) -> Value {
        json!({
            "id": self.id,
            "user": self.profile_id,
            "title": self.title,
            "complete": self.complete,
            "creation_date": self.creation_date,
        })
    }

    fn relative_url(&self) -> String {
        format!("/task/{}/", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task {
            id: Uuid::new_v4(),
            profile_id: 7,
            title: "Water the plants".to_string(),
            complete: false,
            creation_date: Utc::now(),
            updated_date: Utc::now(),
        }
    }

    #[test]
    fn test_task_input_validation() {
        let valid_input = TaskInput {
            title: "Valid Task".to_string(),
            complete: false,
        };
        assert!(valid_input.validate().is_ok());

        let invalid_input = TaskInput {
            title: "".to_string(), // Empty title
            complete: false,
        };
        assert!(invalid_input.validate().is_err());

        let invalid_input = TaskInput {
            title: "x".repeat(201),
            complete: true,
        };
        assert!(invalid_input.validate().is_err());
    }

    #[test]
    fn test_task_patch_validation() {
        let patch = TaskPatch {
            title: None,
            complete: Some(true),
        };
        assert!(patch.validate().is_ok());

        let patch = TaskPatch {
            title: Some("".to_string()),
            complete: None,
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_complete_defaults_to_false() {
        let input: TaskInput = serde_json::from_str(r#"{"title": "No flag"}"#).unwrap();
        assert!(!input.complete);
    }

    #[test]
    fn test_list_representation_includes_links() {
        let task = sample_task();
        let value = task.to_list_json("http://localhost:8080");

        assert_eq!(value["user"], 7);
        assert_eq!(
            value["relative_url"],
            format!("/task/{}/", task.id).as_str()
        );
        assert_eq!(
            value["absolute_url"],
            format!("http://localhost:8080/task/{}/", task.id).as_str()
        );
        assert!(value.get("updated_date").is_none());
    }

    #[test]
    fn test_detail_representation_drops_links() {
        let task = sample_task();
        let value = task.to_detail_json();

        assert!(value.get("relative_url").is_none());
        assert!(value.get("absolute_url").is_none());
        assert_eq!(value["title"], "Water the plants");
    }
}
