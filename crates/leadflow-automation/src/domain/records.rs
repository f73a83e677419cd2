//! Collaborator records
//!
//! Snapshots of the lead and user entities owned by the surrounding
//! application. The automation core reads them, serializes leads into
//! condition subjects, and writes back only whole-field updates through
//! the outbound ports.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::value_objects::EntityId;

/// Lead snapshot as seen by the automation core
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lead {
    pub id: EntityId,
    pub name: String,
    pub company: Option<String>,
    pub status: LeadStatus,
    pub score: u8,
    pub source: Option<String>,
    pub territory: Option<String>,
    pub estimated_value: Option<Decimal>,
    pub assigned_to: Option<EntityId>,
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub custom_fields: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            name: name.into(),
            company: None,
            status: LeadStatus::New,
            score: 0,
            source: None,
            territory: None,
            estimated_value: None,
            assigned_to: None,
            assigned_at: None,
            custom_fields: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Serialize into a condition-evaluation subject
    pub fn as_subject(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Unqualified,
    Converted,
}

/// User snapshot from the user directory
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub department: Option<String>,
    pub active: bool,
    pub working_hours: Option<WorkingHours>,
}

impl UserAccount {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            email: email.into(),
            role,
            department: None,
            active: true,
            working_hours: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Manager,
    Sales,
    Support,
}

impl UserRole {
    /// Roles allowed to reassign leads
    pub fn can_reassign(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Manager)
    }
}

/// Daily availability window, UTC hours `[start, end)`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl WorkingHours {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour: start_hour.min(23),
            end_hour: end_hour.min(24),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        use chrono::Timelike;
        self.contains_hour(at.hour())
    }

    pub fn contains_hour(&self, hour: u32) -> bool {
        hour >= self.start_hour && hour < self.end_hour
    }
}
