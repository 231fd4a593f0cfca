// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Lazy pagination over multi-page listings.

use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Boxed future returned by the fetch closure of [`Pager::from_fn`].
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'static>>;

/// PagingHandler knows how to fetch the pages of one listing.
#[async_trait::async_trait]
pub trait PagingHandler<T>: Send + Sync {
    /// Check if another page follows `page`, usually by inspecting its
    /// continuation token.
    fn more(&self, page: &T) -> bool;

    /// Fetch the page after `page`, or the first page when `page` is `None`.
    async fn fetch(&self, page: Option<&T>) -> Result<T>;
}

enum PagerState<T> {
    Initial,
    Fetched(T),
    Exhausted,
}

/// Pager walks a listing one page at a time.
///
/// Nothing is fetched until the first [`Pager::next_page`]. Once the
/// handler reports no more pages the pager is exhausted for good, build a
/// new one to list again.
pub struct Pager<T> {
    handler: Box<dyn PagingHandler<T>>,
    state: PagerState<T>,
}

impl<T> Debug for Pager<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            PagerState::Initial => "initial",
            PagerState::Fetched(_) => "fetched",
            PagerState::Exhausted => "exhausted",
        };
        f.debug_struct("Pager").field("state", &state).finish()
    }
}

impl<T> Pager<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(handler: impl PagingHandler<T> + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            state: PagerState::Initial,
        }
    }

    /// Build a pager from a `more` predicate and a `fetch` closure.
    ///
    /// `fetch` gets the previous page and returns a future that must own
    /// what it needs, clone the continuation token out of the page.
    pub fn from_fn<M, F>(more: M, fetch: F) -> Self
    where
        M: Fn(&T) -> bool + Send + Sync + 'static,
        F: Fn(Option<&T>) -> BoxFuture<T> + Send + Sync + 'static,
    {
        Self::new(FnPagingHandler { more, fetch })
    }

    /// Check if calling [`Pager::next_page`] may yield another page.
    pub fn more(&self) -> bool {
        !matches!(self.state, PagerState::Exhausted)
    }

    /// Fetch the next page.
    ///
    /// Returns `Ok(None)` once the pager is exhausted. On error or
    /// cancellation the pager is left as it was, so the same page can be
    /// requested again.
    pub async fn next_page(&mut self, cancel: &CancellationToken) -> Result<Option<T>> {
        let prev = match &self.state {
            PagerState::Initial => None,
            PagerState::Fetched(page) => Some(page),
            PagerState::Exhausted => return Ok(None),
        };

        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::cancelled("page fetch cancelled")),
            page = self.handler.fetch(prev) => page?,
        };

        self.state = if self.handler.more(&page) {
            PagerState::Fetched(page.clone())
        } else {
            PagerState::Exhausted
        };
        Ok(Some(page))
    }
}

struct FnPagingHandler<M, F> {
    more: M,
    fetch: F,
}

#[async_trait::async_trait]
impl<T, M, F> PagingHandler<T> for FnPagingHandler<M, F>
where
    T: Send + Sync + 'static,
    M: Fn(&T) -> bool + Send + Sync + 'static,
    F: Fn(Option<&T>) -> BoxFuture<T> + Send + Sync + 'static,
{
    fn more(&self, page: &T) -> bool {
        (self.more)(page)
    }

    async fn fetch(&self, page: Option<&T>) -> Result<T> {
        (self.fetch)(page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    struct Page {
        items: Vec<u32>,
        next_link: Option<String>,
    }

    /// Three pages of sizes 2, 2 and 1.
    fn page_for(token: Option<&str>) -> Page {
        match token {
            None => Page {
                items: vec![1, 2],
                next_link: Some("p2".to_string()),
            },
            Some("p2") => Page {
                items: vec![3, 4],
                next_link: Some("p3".to_string()),
            },
            _ => Page {
                items: vec![5],
                next_link: None,
            },
        }
    }

    fn three_pages(calls: Arc<AtomicUsize>) -> Pager<Page> {
        Pager::from_fn(
            |page: &Page| page.next_link.is_some(),
            move |page: Option<&Page>| {
                calls.fetch_add(1, Ordering::SeqCst);
                let token = page.and_then(|p| p.next_link.clone());
                Box::pin(async move { Ok(page_for(token.as_deref())) })
            },
        )
    }

    #[tokio::test]
    async fn test_collects_all_pages() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pager = three_pages(calls.clone());
        let cancel = CancellationToken::new();

        assert!(pager.more());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let mut items = Vec::new();
        while pager.more() {
            if let Some(page) = pager.next_page(&cancel).await.unwrap() {
                items.extend(page.items);
            }
        }

        assert_eq!(items.len(), 5);
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        assert!(pager.next_page(&cancel).await.unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_page() {
        let mut pager: Pager<Vec<u32>> = Pager::from_fn(
            |_| false,
            |_| Box::pin(async { Ok(vec![7, 8]) }),
        );
        let cancel = CancellationToken::new();

        assert_eq!(pager.next_page(&cancel).await.unwrap(), Some(vec![7, 8]));
        assert!(!pager.more());
        assert_eq!(pager.next_page(&cancel).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_fetch() {
        let mut pager: Pager<Vec<u32>> = Pager::from_fn(
            |_| true,
            |_| {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(vec![1])
                })
            },
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = pager.next_page(&cancel).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(pager.more());
        assert_eq!(format!("{pager:?}"), "Pager { state: \"initial\" }");
    }

    #[tokio::test]
    async fn test_fetch_error_keeps_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut pager: Pager<Vec<u32>> = Pager::from_fn(
            |_| false,
            move |_| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move {
                    if n == 0 {
                        Err(Error::transport("connection reset"))
                    } else {
                        Ok(vec![1])
                    }
                })
            },
        );
        let cancel = CancellationToken::new();

        assert!(pager.next_page(&cancel).await.is_err());
        assert!(pager.more());
        assert_eq!(pager.next_page(&cancel).await.unwrap(), Some(vec![1]));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
