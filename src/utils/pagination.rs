use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// Page-number pagination parameters (`?page=2&limit=6`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: i64,
    pub limit: i64,
}

impl PageParams {
    pub fn from_query_string(query: &str, config: &Config) -> AppResult<Self> {
        let mut page = 1;
        let mut limit = config.page_size;

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "page" => {
                    page = value
                        .parse::<i64>()
                        .ok()
                        .filter(|p| *p >= 1)
                        .ok_or_else(|| AppError::NotFound("Invalid page".to_string()))?;
                }
                "limit" => {
                    // An unusable limit falls back to the default page size
                    if let Ok(requested) = value.parse::<i64>() {
                        if requested >= 1 {
                            limit = requested.min(config.max_page_size);
                        }
                    }
                }
                _ => {}
            }
        }

        // The offset has to fit in an i64 for the query and the page links
        if (page - 1).checked_mul(limit).is_none() {
            return Err(AppError::NotFound("Invalid page".to_string()));
        }

        Ok(PageParams { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Wraps one page of results. `path` and `query` are the request's own, so the
    /// next/previous links keep every filter the client sent.
    pub fn new(
        results: Vec<T>,
        count: i64,
        params: PageParams,
        path: &str,
        query: &str,
    ) -> AppResult<Self> {
        if params.page > 1 && params.offset() >= count {
            return Err(AppError::NotFound("Invalid page".to_string()));
        }

        let next = if params.offset().saturating_add(params.limit) < count {
            Some(page_link(path, query, params.page.saturating_add(1)))
        } else {
            None
        };
        let previous = if params.page > 1 {
            Some(page_link(path, query, params.page - 1))
        } else {
            None
        };

        Ok(Page {
            count,
            next,
            previous,
            results,
        })
    }
}

fn page_link(path: &str, query: &str, page: i64) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if key != "page" {
            serializer.append_pair(&key, &value);
        }
    }
    if page > 1 {
        serializer.append_pair("page", &page.to_string());
    }

    let query = serializer.finish();
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query)
    }
}
