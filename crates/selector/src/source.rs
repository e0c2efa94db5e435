use std::future::Future;
use std::marker::PhantomData;

use eduadmin_api::{Course, ListQuery, Project, QuestionBank, Student};
use eduadmin_api_client::endpoints::{COURSES_PATH, PROJECTS_PATH, QUESTION_BANKS_PATH, STUDENTS_PATH};
use eduadmin_api_client::{ApiClient, Result};
use eduadmin_runtime_config::SelectorSettings;
use serde::de::DeserializeOwned;

use crate::candidate::{Candidate, matches_keyword};

/// What a resolver asks its source for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub keyword: String,
    /// Owning entity to restrict the search to, when the picker depends on one.
    pub parent_scope: Option<String>,
}

/// Supplies candidate entities to a [`Resolver`](crate::Resolver).
pub trait EntitySource: Send + Sync {
    type Entity: Candidate;

    /// Filtered top-N list for the current search text.
    fn search(&self, query: &SearchQuery) -> impl Future<Output = Result<Vec<Self::Entity>>> + Send;

    /// Larger unfiltered page used to resolve identifiers that the last
    /// search did not return.
    fn fallback(&self) -> impl Future<Output = Result<Vec<Self::Entity>>> + Send;

    /// Whether `search` ignores the keyword server-side. The resolver then
    /// fetches once per scope and narrows by name itself.
    fn filters_locally(&self) -> bool {
        false
    }
}

/// [`EntitySource`] over one paginated list endpoint.
pub struct RemoteListSource<E> {
    client: ApiClient,
    path: &'static str,
    search_limit: u32,
    fallback_limit: u32,
    status: Option<&'static str>,
    /// Send the parent scope as `courseId`.
    scoped: bool,
    /// Filter by name on the client instead of sending `search`.
    local_filter: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E> RemoteListSource<E> {
    fn keyword_search(client: ApiClient, path: &'static str, settings: &SelectorSettings) -> Self {
        Self {
            client,
            path,
            search_limit: settings.search_limit,
            fallback_limit: settings.fallback_limit,
            status: None,
            scoped: false,
            local_filter: false,
            _entity: PhantomData,
        }
    }

    pub fn path(&self) -> &str {
        self.path
    }
}

impl RemoteListSource<Course> {
    pub fn courses(client: ApiClient, settings: &SelectorSettings) -> Self {
        Self::keyword_search(client, COURSES_PATH, settings)
    }
}

impl RemoteListSource<Project> {
    pub fn projects(client: ApiClient, settings: &SelectorSettings) -> Self {
        Self::keyword_search(client, PROJECTS_PATH, settings)
    }
}

impl RemoteListSource<Student> {
    pub fn students(client: ApiClient, settings: &SelectorSettings) -> Self {
        Self::keyword_search(client, STUDENTS_PATH, settings)
    }
}

impl RemoteListSource<QuestionBank> {
    /// Active banks of the selected course, filtered by name locally.
    pub fn question_banks(client: ApiClient, settings: &SelectorSettings) -> Self {
        Self {
            search_limit: settings.question_bank_limit,
            status: Some("active"),
            scoped: true,
            local_filter: true,
            ..Self::keyword_search(client, QUESTION_BANKS_PATH, settings)
        }
    }
}

impl<E> EntitySource for RemoteListSource<E>
where
    E: Candidate + DeserializeOwned,
{
    type Entity = E;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<E>> {
        let mut list_query = ListQuery::limit(self.search_limit);
        if !self.local_filter {
            list_query = list_query.search(&query.keyword);
        }
        if let Some(status) = self.status {
            list_query = list_query.status(status);
        }
        if self.scoped {
            list_query = list_query.course_id(query.parent_scope.as_deref());
        }

        let mut list = self.client.list::<E>(self.path, &list_query).await?.list;
        if self.local_filter {
            list.retain(|e| matches_keyword(e, &query.keyword));
        }
        Ok(list)
    }

    async fn fallback(&self) -> Result<Vec<E>> {
        let page = self
            .client
            .list::<E>(self.path, &ListQuery::limit(self.fallback_limit))
            .await?;
        Ok(page.list)
    }

    fn filters_locally(&self) -> bool {
        self.local_filter
    }
}
