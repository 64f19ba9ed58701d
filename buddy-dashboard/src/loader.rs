//! Profile and task/reminder loading.
//!
//! Two independent reads per load. A failed read leaves its part of the
//! dashboard empty and is only logged.

use crate::backend_client::BackendApi;
use buddy_types::{LegacyTask, MemoryKind, MemoryRecord, User};

/// Which backend endpoints feed the dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderSource {
    /// Per-user profile and events
    Handle(String),
    /// First user in the directory plus the global memory table
    Directory,
    /// Legacy task list, no profile
    Legacy,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardData {
    pub user: Option<User>,
    pub tasks: Vec<String>,
    pub reminders: Vec<String>,
}

/// Split records into (tasks, reminders) display strings, keeping order.
/// Records of any other kind are dropped.
pub fn partition_records(records: &[MemoryRecord]) -> (Vec<String>, Vec<String>) {
    let mut tasks = Vec::new();
    let mut reminders = Vec::new();
    for record in records {
        match record.kind() {
            Some(MemoryKind::Task) => tasks.push(record.display_text()),
            Some(MemoryKind::Reminder) => reminders.push(record.display_text()),
            None => {}
        }
    }
    (tasks, reminders)
}

fn legacy_task_text(task: &LegacyTask) -> String {
    match task.time.as_deref().filter(|t| !t.is_empty()) {
        Some(time) => format!("{} ({})", task.title, time),
        None => task.title.clone(),
    }
}

pub async fn load_dashboard(api: &dyn BackendApi, source: &LoaderSource) -> DashboardData {
    match source {
        LoaderSource::Handle(username) => {
            let (user, events) = tokio::join!(api.get_user(username), api.get_events(username));

            let user = match user {
                Ok(u) => Some(u),
                Err(e) => {
                    log::warn!("[LOADER] Failed to load profile for {}: {}", username, e);
                    None
                }
            };
            let (tasks, reminders) = match events {
                Ok(records) => partition_records(&records),
                Err(e) => {
                    log::warn!("[LOADER] Failed to load events for {}: {}", username, e);
                    (Vec::new(), Vec::new())
                }
            };
            DashboardData {
                user,
                tasks,
                reminders,
            }
        }
        LoaderSource::Directory => {
            let (users, memory) = tokio::join!(api.list_users(), api.list_memory());

            let user = match users {
                Ok(users) => users.into_iter().next(),
                Err(e) => {
                    log::warn!("[LOADER] Failed to list users: {}", e);
                    None
                }
            };
            let (tasks, reminders) = match memory {
                Ok(records) => partition_records(&records),
                Err(e) => {
                    log::warn!("[LOADER] Failed to list memory: {}", e);
                    (Vec::new(), Vec::new())
                }
            };
            DashboardData {
                user,
                tasks,
                reminders,
            }
        }
        LoaderSource::Legacy => {
            let tasks = match api.list_tasks().await {
                Ok(tasks) => tasks.iter().map(legacy_task_text).collect(),
                Err(e) => {
                    log::warn!("[LOADER] Failed to list tasks: {}", e);
                    Vec::new()
                }
            };
            DashboardData {
                user: None,
                tasks,
                reminders: Vec::new(),
            }
        }
    }
}
