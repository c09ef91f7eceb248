use crate::errors::AppError;
use serde::Deserialize;

const DEFAULT_PAGE_SIZE: usize = 100;
const MIN_PAGE_SIZE: usize = 5;
const MAX_PAGE_SIZE: usize = 1000;

/// AWS-shaped pagination parameters carried by every Describe action.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PageParams {
    pub max_results: Option<usize>,
    pub next_token: Option<String>,
}

/// Backend paging vocabulary: `size` items per page, zero-based `page`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub size: usize,
    pub page: usize,
}

impl PageParams {
    /// MaxResults/NextToken → size/page. NextToken is the opaque decimal
    /// page index handed out by a previous response.
    pub fn resolve(&self) -> Result<Page, AppError> {
        let size = match self.max_results {
            Some(n) if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&n) => {
                return Err(AppError::bad_request(format!(
                    "MaxResults must be between {} and {}",
                    MIN_PAGE_SIZE, MAX_PAGE_SIZE
                )))
            }
            Some(n) => n,
            None => DEFAULT_PAGE_SIZE,
        };

        let page = match &self.next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| AppError::bad_request(format!("Invalid NextToken '{}'", token)))?,
            None => 0,
        };

        Ok(Page { size, page })
    }
}

impl Page {
    /// Slices one page out of a full listing and returns it with the token
    /// for the following page, when one exists.
    pub fn apply<T: Clone>(&self, items: &[T]) -> (Vec<T>, Option<String>) {
        let start = self.page * self.size;
        if start >= items.len() {
            return (Vec::new(), None);
        }
        let end = (start + self.size).min(items.len());
        let next = (end < items.len()).then(|| (self.page + 1).to_string());
        (items[start..end].to_vec(), next)
    }
}

#[cfg(test)]
#[path = "pagination_tests.rs"]
mod tests;
