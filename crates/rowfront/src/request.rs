// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Write as _;

use crate::filter::Filter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Ascending,
    Descending,
}

/// Sort instruction for a select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: OrderDirection,
}

/// A read request: which rows of which table, in what shape.
///
/// Built with chained methods:
///
/// ```
/// use rowfront::{Filter, SelectRequest};
///
/// let request = SelectRequest::table("goals")
///     .filter(Filter::new().eq("user_id", "u1"))
///     .order_desc("created_at")
///     .limit(20);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SelectRequest {
    pub table: String,
    /// Columns to return; `None` means all.
    pub columns: Option<Vec<String>>,
    pub filter: Filter,
    pub order: Option<Order>,
    pub limit: Option<usize>,
    /// Expect exactly one row; unmatched single reads are an error.
    pub single: bool,
}

impl SelectRequest {
    #[must_use]
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: None,
            filter: Filter::new(),
            order: None,
            limit: None,
            single: false,
        }
    }

    #[must_use]
    pub fn columns<I>(mut self, columns: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn order_asc(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order {
            column: column.into(),
            direction: OrderDirection::Ascending,
        });
        self
    }

    #[must_use]
    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order {
            column: column.into(),
            direction: OrderDirection::Descending,
        });
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    /// Canonical identity of this request.
    ///
    /// Two requests for the same rows in the same shape produce equal
    /// keys, however their filters were built. The key doubles as the
    /// deduplication key, so equal concurrent reads collapse into one
    /// backend call.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let mut key = self.table.clone();
        key.push('|');
        match &self.columns {
            None => key.push('*'),
            Some(columns) => {
                let mut sorted: Vec<&str> = columns.iter().map(String::as_str).collect();
                sorted.sort_unstable();
                key.push_str(&sorted.join(","));
            }
        }
        let _ = write!(key, "|{}", self.filter);
        key.push('|');
        if let Some(order) = &self.order {
            let dir = match order.direction {
                OrderDirection::Ascending => "asc",
                OrderDirection::Descending => "desc",
            };
            let _ = write!(key, "{}.{dir}", order.column);
        }
        key.push('|');
        if let Some(limit) = self.limit {
            let _ = write!(key, "{limit}");
        }
        if self.single {
            key.push_str("|single");
        }
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_requests_share_a_key() {
        let a = SelectRequest::table("goals")
            .columns(["id", "title"])
            .filter(Filter::new().eq("user_id", "u1"))
            .order_asc("created_at")
            .limit(10);
        let b = SelectRequest::table("goals")
            .columns(["title", "id"])
            .filter(Filter::new().eq("user_id", "u1"))
            .order_asc("created_at")
            .limit(10);
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn every_request_part_contributes_to_the_key() {
        let base = SelectRequest::table("goals");
        let keys = [
            base.clone().cache_key(),
            base.clone().columns(["id"]).cache_key(),
            base.clone().filter(Filter::new().eq("user_id", "u1")).cache_key(),
            base.clone().order_desc("created_at").cache_key(),
            base.clone().limit(5).cache_key(),
            base.clone().single().cache_key(),
            SelectRequest::table("entries").cache_key(),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
