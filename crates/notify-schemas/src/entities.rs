use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub hours_required: i64,
    pub deadline_date: NaiveDate,
    pub source_tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Learner {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub certificate_expires_at: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub learner_id: Uuid,
    pub course_id: Uuid,
    pub progress_hours: f64,
    pub status: Option<String>,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub attributes: BTreeMap<String, Json>,
}
