use anyhow::anyhow;
use tracing::trace;

use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

/// Ephemeral view state. Never persisted; rebuilt from the command line (or
/// whatever front end is driving) on every invocation.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    pub status: StatusFilter,
    pub category: CategoryFilter,
    pub search: String,
}

impl FilterState {
    /// Parse filter terms: `status:active`, `category:work`, and any leftover
    /// free terms joined into the search query.
    pub fn parse(terms: &[String]) -> anyhow::Result<Self> {
        let mut state = Self::default();
        let mut search_terms: Vec<&str> = Vec::new();

        for term in terms {
            if let Some(value) = term.strip_prefix("status:") {
                state.status = match value.to_ascii_lowercase().as_str() {
                    "all" => StatusFilter::All,
                    "active" => StatusFilter::Active,
                    "done" => StatusFilter::Done,
                    other => {
                        return Err(anyhow!(
                            "unknown status filter '{other}' (expected all, active or done)"
                        ));
                    }
                };
            } else if let Some(value) = term.strip_prefix("category:") {
                state.category = if value.eq_ignore_ascii_case("all") {
                    CategoryFilter::All
                } else {
                    CategoryFilter::Only(value.to_string())
                };
            } else {
                search_terms.push(term);
            }
        }

        state.search = search_terms.join(" ");
        Ok(state)
    }

    /// The derived view: status filter, then category, then substring search.
    /// Pure over (collection, filter state); survivors keep collection order.
    pub fn visible<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        let query = self.search.trim().to_lowercase();

        let out: Vec<&Task> = tasks
            .iter()
            .filter(|task| match self.status {
                StatusFilter::All => true,
                StatusFilter::Active => !task.done,
                StatusFilter::Done => task.done,
            })
            .filter(|task| match &self.category {
                CategoryFilter::All => true,
                CategoryFilter::Only(category) => task.category == *category,
            })
            .filter(|task| query.is_empty() || task.text.to_lowercase().contains(&query))
            .collect();

        trace!(
            total = tasks.len(),
            visible = out.len(),
            "derived view built"
        );
        out
    }
}
