use std::sync::Arc;
use std::time::Duration;

use crate::debounce::Debouncer;

/// Filter choice meaning "no filter".
pub const ALL: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOption {
    pub label: String,
    pub value: String,
}

impl FilterOption {
    pub fn new(label: &str, value: &str) -> Self {
        Self {
            label: label.to_string(),
            value: value.to_string(),
        }
    }
}

type FilterFn = Arc<dyn Fn(&str, Option<&str>) + Send + Sync>;

/// Single-value filter bound to one table column.
pub struct ToolbarFilter {
    pub column: String,
    pub title: String,
    pub options: Vec<FilterOption>,
    selected: Option<String>,
    on_change: Option<FilterFn>,
}

impl ToolbarFilter {
    pub fn new(column: &str, title: &str, options: Vec<FilterOption>) -> Self {
        Self {
            column: column.to_string(),
            title: title.to_string(),
            options,
            selected: None,
            on_change: None,
        }
    }

    /// Called with `(column, value)`; `None` means the filter was lifted.
    pub fn on_change(mut self, f: impl Fn(&str, Option<&str>) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Arc::new(f));
        self
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Pick a value; [`ALL`] lifts the filter.
    pub fn choose(&mut self, value: &str) {
        self.selected = (value != ALL).then(|| value.to_string());
        if let Some(on_change) = &self.on_change {
            on_change(&self.column, self.selected.as_deref());
        }
    }

    fn lift(&mut self) {
        self.selected = None;
    }
}

/// Search box plus column filters above a list view.
///
/// Keystrokes are staged in `input` and reach `on_search` only after the
/// debounce window. The external search value can be pushed back in with
/// [`sync_search_value`](Self::sync_search_value).
#[derive(Default)]
pub struct Toolbar {
    input: String,
    search: Option<Debouncer<String>>,
    on_reset: Option<Box<dyn Fn() + Send + Sync>>,
    filters: Vec<ToolbarFilter>,
}

impl Toolbar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_search(mut self, debounce: Duration, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.search = Some(Debouncer::new(debounce, f));
        self
    }

    pub fn on_reset(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_reset = Some(Box::new(f));
        self
    }

    pub fn filter(mut self, filter: ToolbarFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn filters(&self) -> &[ToolbarFilter] {
        &self.filters
    }

    pub fn filter_mut(&mut self, column: &str) -> Option<&mut ToolbarFilter> {
        self.filters.iter_mut().find(|f| f.column == column)
    }

    pub fn input_changed(&mut self, text: &str) {
        self.input = text.to_string();
        if let Some(search) = &self.search {
            search.call(self.input.clone());
        }
    }

    /// Adopt a search value set elsewhere (URL, saved view) without
    /// dispatching it again.
    pub fn sync_search_value(&mut self, external: Option<&str>) {
        self.input = external.unwrap_or_default().to_string();
    }

    pub fn reset(&mut self) {
        if let Some(search) = &self.search {
            search.cancel();
        }
        self.input.clear();
        for filter in &mut self.filters {
            filter.lift();
        }
        if let Some(on_reset) = &self.on_reset {
            on_reset();
        }
    }

    pub fn is_filtered(&self) -> bool {
        !self.input.trim().is_empty() || self.filters.iter().any(|f| f.selected.is_some())
    }

    /// Nothing to show without a search box or any filter.
    pub fn is_visible(&self) -> bool {
        self.search.is_some() || !self.filters.is_empty()
    }
}
