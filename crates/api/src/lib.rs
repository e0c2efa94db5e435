//! Wire types for the eduadmin console API.
//!
//! Every response from the backend is wrapped in an [`Envelope`]; list
//! endpoints return a [`Paginated`] payload inside it. Entity types mirror the
//! JSON the backend emits (`_id` keys, camelCase fields).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub mod validate;

/// The only `code` value that marks an envelope as successful.
pub const SUCCESS_CODE: i64 = 0;

// ─── Envelope ────────────────────────────────────────────────────────────────

/// Uniform wrapper around every API payload.
///
/// `code == 0` is success regardless of the HTTP status; any other code is an
/// application-level failure carrying a human readable `message`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: String,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Replace the payload while keeping code/message/timestamp.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            code: self.code,
            message: self.message,
            timestamp: self.timestamp,
            data: f(self.data),
        }
    }
}

/// Lenient view of an error body. Non-2xx responses may or may not carry an
/// envelope, so every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

// ─── Pagination ──────────────────────────────────────────────────────────────

/// Paginated list payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paginated<T> {
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
}

impl<T> Default for Paginated<T> {
    fn default() -> Self {
        Self {
            list: Vec::new(),
            total: 0,
            page: 0,
            limit: 0,
        }
    }
}

/// Query parameters accepted by every list endpoint.
///
/// Unset fields are omitted from the query string; the backend applies its
/// own defaults for page and limit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ListQuery {
    pub fn limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Set the keyword filter. Empty keywords mean "unfiltered".
    pub fn search(mut self, keyword: &str) -> Self {
        let keyword = keyword.trim();
        self.search = (!keyword.is_empty()).then(|| keyword.to_string());
        self
    }

    pub fn course_id(mut self, course_id: Option<&str>) -> Self {
        self.course_id = course_id.filter(|id| !id.is_empty()).map(str::to_string);
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }
}

// ─── Accounts ────────────────────────────────────────────────────────────────

/// Profile of the signed-in console user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub status: String,
}

// ─── Selectable entities ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Enrollment project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Question bank. Banks belong to a course, recorded in `course_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionBank {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

// ─── Uploads ─────────────────────────────────────────────────────────────────

/// Query for `GET /admin/course/upload-url`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlQuery {
    /// File extension without the dot, e.g. `jpg`.
    pub file_type: String,
}

/// Pre-signed upload target handed out by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    pub upload_url: String,
    pub file_url: String,
    #[serde(default)]
    pub object_key: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}
