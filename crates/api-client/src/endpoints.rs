//! Typed wrappers for the list endpoints the console reads from.

use eduadmin_api::{Course, ListQuery, Paginated, Project, QuestionBank, Student, UserInfo};
use serde::de::DeserializeOwned;

use crate::client::{ApiClient, NO_QUERY};
use crate::error::Result;

pub const COURSES_PATH: &str = "/admin/course/list";
pub const PROJECTS_PATH: &str = "/admin/enroll/project/list";
pub const QUESTION_BANKS_PATH: &str = "/admin/question-bank/list";
pub const STUDENTS_PATH: &str = "/admin/user/student/list";
pub const PROFILE_PATH: &str = "/admin/auth/profile";

impl ApiClient {
    /// One page of any list endpoint.
    pub async fn list<E: DeserializeOwned>(&self, path: &str, query: &ListQuery) -> Result<Paginated<E>> {
        self.get(path, query).await
    }

    pub async fn list_courses(&self, query: &ListQuery) -> Result<Paginated<Course>> {
        self.list(COURSES_PATH, query).await
    }

    pub async fn list_projects(&self, query: &ListQuery) -> Result<Paginated<Project>> {
        self.list(PROJECTS_PATH, query).await
    }

    pub async fn list_question_banks(&self, query: &ListQuery) -> Result<Paginated<QuestionBank>> {
        self.list(QUESTION_BANKS_PATH, query).await
    }

    pub async fn list_students(&self, query: &ListQuery) -> Result<Paginated<Student>> {
        self.list(STUDENTS_PATH, query).await
    }

    /// Profile of the account behind the current token.
    pub async fn current_user(&self) -> Result<UserInfo> {
        self.get(PROFILE_PATH, NO_QUERY).await
    }
}
