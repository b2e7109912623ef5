use std::future::Future;

use async_trait::async_trait;
use taskdesk_shared::{Identified, Page, Task, User};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::filter::TaskFilters;

/// Where a list controller gets its pages from.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Identified + Clone + Send;
    type Filter: Clone + Default + Send + Sync + std::fmt::Debug;

    /// `None` asks for the unfiltered listing.
    async fn fetch(
        &self,
        filters: Option<&Self::Filter>,
        page: u32,
        size: u32,
    ) -> Result<Page<Self::Item>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct TaskSource {
    api: ApiClient,
}

impl TaskSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PageSource for TaskSource {
    type Item = Task;
    type Filter = TaskFilters;

    async fn fetch(
        &self,
        filters: Option<&TaskFilters>,
        page: u32,
        size: u32,
    ) -> Result<Page<Task>, ApiError> {
        match filters {
            Some(filters) => self.api.filter_tasks(filters, page, size).await,
            None => self.api.list_tasks(page, size).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserSource {
    api: ApiClient,
}

impl UserSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PageSource for UserSource {
    type Item = User;
    type Filter = ();

    async fn fetch(&self, _filters: Option<&()>, page: u32, size: u32) -> Result<Page<User>, ApiError> {
        self.api.list_users(page, size).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub total_pages: u32,
}

/// Paged list state for one screen.
///
/// The visible items are always the last page fetched successfully; a failed
/// fetch only sets the error message.
pub struct ListController<S: PageSource> {
    source: S,
    page_size: u32,
    current_page: u32,
    filters: S::Filter,
    page: Option<Page<S::Item>>,
    loading: bool,
    error: Option<String>,
    cancel: CancellationToken,
}

impl<S: PageSource> ListController<S> {
    pub fn new(source: S, page_size: u32) -> Self {
        Self {
            source,
            page_size,
            current_page: 0,
            filters: S::Filter::default(),
            page: None,
            loading: false,
            error: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Ties every fetch to `token`; cancelling it abandons the in-flight
    /// request without touching the list.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn filters(&self) -> &S::Filter {
        &self.filters
    }

    /// Replaces the criteria without fetching. Callers follow up with
    /// `apply_filters(0)`.
    pub fn set_filters(&mut self, filters: S::Filter) {
        self.filters = filters;
    }

    pub fn items(&self) -> &[S::Item] {
        self.page.as_ref().map(|p| p.content.as_slice()).unwrap_or_default()
    }

    pub fn page(&self) -> Option<&Page<S::Item>> {
        self.page.as_ref()
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total_pages(&self) -> u32 {
        self.page.as_ref().map(|p| p.total_pages).unwrap_or(0)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn can_previous(&self) -> bool {
        self.current_page > 0
    }

    pub fn can_next(&self) -> bool {
        self.page.as_ref().is_some_and(|p| !p.last)
    }

    #[instrument(skip(self))]
    pub async fn load(&mut self, page: u32) -> Result<(), ApiError> {
        self.fetch(None, page).await
    }

    #[instrument(skip(self))]
    pub async fn apply_filters(&mut self, page: u32) -> Result<(), ApiError> {
        let filters = self.filters.clone();
        debug!(?filters, "applying filters");
        self.fetch(Some(filters), page).await
    }

    /// Returns `false` without fetching when already on the first page.
    pub async fn previous_page(&mut self) -> Result<bool, ApiError> {
        if !self.can_previous() {
            return Ok(false);
        }
        self.apply_filters(self.current_page - 1).await?;
        Ok(true)
    }

    /// Returns `false` without fetching when the last page is shown.
    pub async fn next_page(&mut self) -> Result<bool, ApiError> {
        if !self.can_next() {
            return Ok(false);
        }
        self.apply_filters(self.current_page + 1).await?;
        Ok(true)
    }

    /// Swaps in `updated` for the item with the same id. Returns whether a
    /// match was found; nothing is fetched.
    pub fn patch_item_in_place(&mut self, updated: S::Item) -> bool {
        let Some(page) = self.page.as_mut() else {
            return false;
        };
        match page.content.iter_mut().find(|item| item.id() == updated.id()) {
            Some(slot) => {
                *slot = updated;
                true
            }
            None => false,
        }
    }

    /// Runs `remove`, then refetches the current page with the active filters.
    /// On failure the list is left as it was and the error is recorded.
    #[instrument(skip(self, remove))]
    pub async fn remove_and_refresh<F>(&mut self, id: i64, remove: F) -> Result<(), ApiError>
    where
        F: Future<Output = Result<String, ApiError>>,
    {
        if let Err(err) = remove.await {
            warn!(id, error = %err, "remove failed; keeping list");
            self.error = Some(err.to_string());
            return Err(err);
        }
        info!(id, "item removed; refreshing");
        self.apply_filters(self.current_page).await
    }

    async fn fetch(&mut self, filters: Option<S::Filter>, page: u32) -> Result<(), ApiError> {
        self.loading = true;
        let cancel = self.cancel.clone();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            res = self.source.fetch(filters.as_ref(), page, self.page_size) => res,
        };
        self.loading = false;

        match result {
            Ok(fetched) => {
                debug!(page, items = fetched.content.len(), total_pages = fetched.total_pages, "page loaded");
                self.current_page = page;
                self.page = Some(fetched);
                self.error = None;
                Ok(())
            }
            Err(ApiError::Cancelled) => {
                debug!(page, "fetch cancelled");
                Err(ApiError::Cancelled)
            }
            Err(err) => {
                warn!(page, error = %err, "fetch failed");
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }
}

impl<S: PageSource<Item = Task>> ListController<S> {
    /// Counts over the visible page only.
    pub fn stats(&self) -> ListStats {
        let items = self.items();
        let completed = items.iter().filter(|t| t.completed).count();
        ListStats {
            total: items.len(),
            completed,
            pending: items.len() - completed,
            total_pages: self.total_pages(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use taskdesk_shared::{Page, Task, TaskOwner};

    use super::{ListController, ListStats, PageSource};
    use crate::error::ApiError;
    use crate::filter::TaskFilters;

    pub(crate) fn task(id: i64, completed: bool) -> Task {
        Task {
            id,
            title: format!("task {id}"),
            description: String::new(),
            completed,
            due_date: "2026-11-01".to_string(),
            created_at: "2026-10-01T08:00:00".to_string(),
            user: TaskOwner {
                id: 1,
                name: "Ana".to_string(),
                mail: "ana@example.com".to_string(),
            },
        }
    }

    pub(crate) fn page(items: Vec<Task>, number: u32, total_pages: u32) -> Page<Task> {
        Page {
            total_elements: items.len() as u64,
            content: items,
            number,
            size: 10,
            total_pages,
            first: number == 0,
            last: number + 1 >= total_pages,
        }
    }

    #[derive(Default)]
    pub(crate) struct ScriptedSource {
        pub responses: Mutex<VecDeque<Result<Page<Task>, ApiError>>>,
        pub calls: Mutex<Vec<(Option<TaskFilters>, u32)>>,
    }

    impl ScriptedSource {
        pub(crate) fn with(responses: Vec<Result<Page<Task>, ApiError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::default(),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().expect("calls").len()
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        type Item = Task;
        type Filter = TaskFilters;

        async fn fetch(
            &self,
            filters: Option<&TaskFilters>,
            page: u32,
            _size: u32,
        ) -> Result<Page<Task>, ApiError> {
            self.calls.lock().expect("calls").push((filters.cloned(), page));
            self.responses
                .lock()
                .expect("responses")
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::message("no scripted response")))
        }
    }

    #[tokio::test]
    async fn load_replaces_items_and_metadata() {
        let source = ScriptedSource::with(vec![Ok(page(vec![task(1, true), task(2, false)], 0, 3))]);
        let mut list = ListController::new(source, 10);

        list.load(0).await.expect("load");
        assert_eq!(list.items().len(), 2);
        assert_eq!(list.total_pages(), 3);
        assert!(!list.is_loading());
        assert!(list.can_next());
        assert!(!list.can_previous());
        assert_eq!(
            list.stats(),
            ListStats {
                total: 2,
                completed: 1,
                pending: 1,
                total_pages: 3
            }
        );
        assert_eq!(list.source().calls.lock().expect("calls")[0], (None, 0));
    }

    #[tokio::test]
    async fn failed_fetch_keeps_last_page() {
        let source = ScriptedSource::with(vec![
            Ok(page(vec![task(1, false)], 0, 2)),
            Err(ApiError::message("Error 500: Internal Server Error")),
        ]);
        let mut list = ListController::new(source, 10);
        list.load(0).await.expect("load");

        assert!(list.next_page().await.is_err());
        assert_eq!(list.items()[0].id, 1);
        assert_eq!(list.current_page(), 0);
        assert_eq!(list.error(), Some("Error 500: Internal Server Error"));
    }

    #[tokio::test]
    async fn bounds_block_navigation_without_fetching() {
        let source = ScriptedSource::with(vec![Ok(page(vec![task(1, false)], 0, 1))]);
        let mut list = ListController::new(source, 10);
        list.set_filters(TaskFilters {
            completed: Some(true),
            ..TaskFilters::default()
        });
        list.apply_filters(0).await.expect("filter");

        assert!(!list.can_next());
        assert!(!list.next_page().await.expect("next"));
        assert!(!list.previous_page().await.expect("previous"));
        assert_eq!(list.source().call_count(), 1);
        let (filters, page) = list.source().calls.lock().expect("calls")[0].clone();
        assert_eq!(filters.and_then(|f| f.completed), Some(true));
        assert_eq!(page, 0);
    }

    #[tokio::test]
    async fn next_and_previous_move_one_page() {
        let source = ScriptedSource::with(vec![
            Ok(page(vec![task(1, false)], 0, 2)),
            Ok(page(vec![task(11, false)], 1, 2)),
            Ok(page(vec![task(1, false)], 0, 2)),
        ]);
        let mut list = ListController::new(source, 10);
        list.apply_filters(0).await.expect("filter");

        assert!(list.next_page().await.expect("next"));
        assert_eq!(list.current_page(), 1);
        assert!(!list.can_next());
        assert!(list.previous_page().await.expect("previous"));
        assert_eq!(list.current_page(), 0);
    }

    #[tokio::test]
    async fn patch_in_place_is_idempotent() {
        let source = ScriptedSource::with(vec![Ok(page(vec![task(1, false), task(2, false)], 0, 1))]);
        let mut list = ListController::new(source, 10);
        list.load(0).await.expect("load");

        let mut done = task(2, false);
        done.completed = true;
        assert!(list.patch_item_in_place(done.clone()));
        let once = list.items().to_vec();
        assert!(list.patch_item_in_place(done));
        assert_eq!(list.items(), once.as_slice());
        assert_eq!(list.stats().completed, 1);

        assert!(!list.patch_item_in_place(task(99, true)));
        assert_eq!(list.source().call_count(), 1);
    }

    #[tokio::test]
    async fn failed_remove_keeps_item() {
        let source = ScriptedSource::with(vec![Ok(page(vec![task(5, false)], 0, 1))]);
        let mut list = ListController::new(source, 10);
        list.load(0).await.expect("load");

        let result = list
            .remove_and_refresh(5, async { Err(ApiError::message("Error 500: Internal Server Error")) })
            .await;
        assert!(result.is_err());
        assert_eq!(list.items()[0].id, 5);
        assert!(list.error().is_some());
        assert_eq!(list.source().call_count(), 1);
    }

    #[tokio::test]
    async fn cancelled_fetch_leaves_state_alone() {
        let source = ScriptedSource::with(vec![Ok(page(vec![task(1, false)], 0, 1))]);
        let mut list = ListController::new(source, 10);
        list.cancellation_token().cancel();

        let err = list.load(0).await.expect_err("cancelled");
        assert!(matches!(err, ApiError::Cancelled));
        assert!(list.page().is_none());
        assert!(list.error().is_none());
        assert!(!list.is_loading());
    }
}
