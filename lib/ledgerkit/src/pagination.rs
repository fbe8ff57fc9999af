//! Cursor pagination.
//!
//! List endpoints answer `{"data": [...], "next_cursor": "..." | null}`. The
//! next page is requested by replaying the same [`RequestConfig`] with the
//! `cursor` query parameter set. Some endpoints put the cursor in a response
//! header instead; see [`CursorSource`].
//!
//! [`Page`] holds one fetched page. [`AutoPager`] streams items across pages,
//! fetching lazily.
//!
//! # Example
//!
//! ```no_run
//! use futures_util::TryStreamExt;
//! use ledgerkit::{Client, Method, RequestConfig};
//!
//! # async fn run(client: Client) -> ledgerkit::Result<()> {
//! let page = client
//!     .list::<serde_json::Value>(RequestConfig::new(Method::Get, "/accounts"))
//!     .await?;
//! let accounts: Vec<_> = page.auto_paging().try_collect().await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures_core::Stream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use ledgerkit_core::Extensions;

use crate::pipeline::RequestConfig;
use crate::{Client, HttpClient, HyperClient, Result};

/// Where the next-page cursor is read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CursorSource {
    /// The `next_cursor` field of the body.
    #[default]
    Body,
    /// A response header, e.g. `X-Next-Cursor`.
    Header(String),
}

/// Wire shape of a list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorPage<T> {
    /// Items of this page, in server order.
    pub data: Vec<T>,
    /// Cursor of the next page; `None` on the last page.
    #[serde(default)]
    pub next_cursor: Option<String>,
    /// Keys without a typed field.
    #[serde(flatten)]
    pub extra: Extensions,
}

/// One page of results, bound to the request that produced it.
pub struct Page<T, C = HyperClient> {
    items: Vec<T>,
    next_cursor: Option<String>,
    extra: Extensions,
    config: RequestConfig,
    client: Client<C>,
}

impl<T: fmt::Debug, C> fmt::Debug for Page<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("items", &self.items)
            .field("next_cursor", &self.next_cursor)
            .field("extra", &self.extra)
            .finish_non_exhaustive()
    }
}

impl<T, C> Page<T, C> {
    /// Items of this page.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Take the items, dropping the cursor.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Cursor of the next page.
    #[must_use]
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    /// Returns `true` if another page can be fetched.
    #[must_use]
    pub const fn has_next_page(&self) -> bool {
        self.next_cursor.is_some()
    }

    /// Keys of the list response besides `data` and `next_cursor`.
    #[must_use]
    pub const fn extra(&self) -> &Extensions {
        &self.extra
    }

    /// The request this page was fetched with.
    #[must_use]
    pub const fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Client and request for the next page, if any.
    fn next_request(&self) -> Option<(Client<C>, RequestConfig)> {
        let cursor = self.next_cursor.as_deref()?;
        let mut config = self.config.clone();
        let param = config.cursor_param_name().to_string();
        config.set_query_param(&param, cursor);
        Some((self.client.clone(), config))
    }
}

impl<T, C> Page<T, C>
where
    T: DeserializeOwned + Send + 'static,
    C: HttpClient + 'static,
{
    /// Execute `config` once and decode a page.
    ///
    /// # Errors
    ///
    /// Any error of [`Client::execute`], including [`Error::Decode`](crate::Error::Decode)
    /// if the body is not a list response.
    pub async fn fetch(client: &Client<C>, config: RequestConfig) -> Result<Self> {
        let response = client.execute_raw(config.clone()).await?;
        let page: CursorPage<T> = response.json()?;

        let next_cursor = match config.cursor() {
            CursorSource::Body => page.next_cursor,
            CursorSource::Header(name) => response.header(name).map(str::to_string),
        }
        .filter(|cursor| !cursor.is_empty());

        tracing::debug!(
            items = page.data.len(),
            has_next = next_cursor.is_some(),
            "fetched page"
        );

        Ok(Self {
            items: page.data,
            next_cursor,
            extra: page.extra,
            config,
            client: client.clone(),
        })
    }

    async fn fetch_owned(client: Client<C>, config: RequestConfig) -> Result<Self> {
        Self::fetch(&client, config).await
    }

    /// Fetch the next page, or `None` on the last page.
    ///
    /// # Errors
    ///
    /// Any error of [`Page::fetch`].
    pub async fn next_page(&self) -> Result<Option<Self>> {
        match self.next_request() {
            Some((client, config)) => Self::fetch(&client, config).await.map(Some),
            None => Ok(None),
        }
    }

    /// Stream every item of this page and the following ones.
    #[must_use]
    pub fn auto_paging(self) -> AutoPager<T, C> {
        let next = self.next_request();
        AutoPager {
            buffer: self.items.into_iter(),
            next,
            pending: None,
        }
    }
}

impl<C> Client<C>
where
    C: HttpClient + 'static,
{
    /// Fetch the first page of a list endpoint.
    ///
    /// # Errors
    ///
    /// Any error of [`Page::fetch`].
    pub async fn list<T>(&self, config: RequestConfig) -> Result<Page<T, C>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        Page::fetch(self, config).await
    }
}

type PageFuture<T, C> = Pin<Box<dyn Future<Output = Result<Page<T, C>>> + Send>>;

/// Stream of items across pages, from [`Page::auto_paging`].
///
/// The next page is requested only once the buffered items are drained, and
/// never after the last page. A failed fetch is yielded once and ends the
/// stream; items already yielded stay valid.
pub struct AutoPager<T, C = HyperClient> {
    buffer: std::vec::IntoIter<T>,
    next: Option<(Client<C>, RequestConfig)>,
    pending: Option<PageFuture<T, C>>,
}

impl<T, C> fmt::Debug for AutoPager<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoPager")
            .field("buffered", &self.buffer.len())
            .field("has_next", &self.next.is_some())
            .field("fetching", &self.pending.is_some())
            .finish()
    }
}

// No field is structurally pinned; the page future is boxed.
impl<T, C> Unpin for AutoPager<T, C> {}

impl<T, C> Stream for AutoPager<T, C>
where
    T: DeserializeOwned + Send + 'static,
    C: HttpClient + 'static,
{
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(item) = this.buffer.next() {
                return Poll::Ready(Some(Ok(item)));
            }

            if let Some(pending) = this.pending.as_mut() {
                let result = ready!(pending.as_mut().poll(cx));
                this.pending = None;
                match result {
                    Ok(page) => {
                        this.next = page.next_request();
                        this.buffer = page.items.into_iter();
                        continue;
                    }
                    Err(err) => {
                        this.next = None;
                        return Poll::Ready(Some(Err(err)));
                    }
                }
            }

            match this.next.take() {
                Some((client, config)) => {
                    this.pending = Some(Box::pin(Page::fetch_owned(client, config)));
                }
                None => return Poll::Ready(None),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let buffered = self.buffer.len();
        if self.next.is_none() && self.pending.is_none() {
            (buffered, Some(buffered))
        } else {
            (buffered, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use assert2::{check, let_assert};
    use bytes::Bytes;
    use futures_util::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::{ClientOptions, Error, Method, Request, Response, RetryConfig};

    /// Serves canned responses keyed by the `cursor` query parameter.
    #[derive(Clone, Default)]
    struct Pages {
        bodies: Arc<HashMap<String, (u16, serde_json::Value)>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Pages {
        fn new(pages: &[(&str, u16, serde_json::Value)]) -> Self {
            let bodies = pages
                .iter()
                .map(|(cursor, status, body)| ((*cursor).to_string(), (*status, body.clone())))
                .collect();
            Self {
                bodies: Arc::new(bodies),
                calls: Arc::default(),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("lock").clone()
        }
    }

    impl HttpClient for Pages {
        fn execute(
            &self,
            request: Request<Bytes>,
        ) -> impl Future<Output = Result<Response<Bytes>>> + Send {
            let cursor = request
                .url()
                .query_pairs()
                .find(|(key, _)| key == "cursor")
                .map(|(_, value)| value.into_owned())
                .unwrap_or_default();
            self.calls.lock().expect("lock").push(cursor.clone());

            let (status, body) = self
                .bodies
                .get(&cursor)
                .cloned()
                .unwrap_or((404, json!({"type": "not_found"})));
            let body = Bytes::from(serde_json::to_vec(&body).expect("json"));
            async move { Ok(Response::new(status, HashMap::new(), body)) }
        }
    }

    fn client(pages: &Pages) -> Client<Pages> {
        let options = ClientOptions::new().retry(RetryConfig::no_retry());
        Client::with_http(pages.clone(), options).expect("client")
    }

    fn list() -> RequestConfig {
        RequestConfig::new(Method::Get, "/accounts")
    }

    #[tokio::test]
    async fn first_page_and_next() {
        let pages = Pages::new(&[
            ("", 200, json!({"data": [1, 2], "next_cursor": "c2", "total": 3})),
            ("c2", 200, json!({"data": [3], "next_cursor": null})),
        ]);
        let client = client(&pages);

        let first = client.list::<u32>(list()).await.expect("first");
        check!(first.items() == [1, 2]);
        check!(first.has_next_page());
        check!(first.extra().get("total") == Some(&json!(3)));

        let_assert!(Ok(Some(second)) = first.next_page().await);
        check!(second.items() == [3]);
        check!(!second.has_next_page());
        let_assert!(Ok(None) = second.next_page().await);

        check!(pages.calls() == ["", "c2"]);
    }

    #[tokio::test]
    async fn empty_cursor_means_last_page() {
        let pages = Pages::new(&[("", 200, json!({"data": [], "next_cursor": ""}))]);
        let first = client(&pages).list::<u32>(list()).await.expect("page");
        check!(!first.has_next_page());
        check!(first.into_items().is_empty());
    }

    #[tokio::test]
    async fn auto_paging_is_lazy() {
        let pages = Pages::new(&[
            ("", 200, json!({"data": [1, 2], "next_cursor": "c2"})),
            ("c2", 200, json!({"data": [3], "next_cursor": null})),
        ]);
        let first = client(&pages).list::<u32>(list()).await.expect("page");

        let mut stream = first.auto_paging();
        check!(stream.next().await.map(Result::ok) == Some(Some(1)));
        check!(stream.next().await.map(Result::ok) == Some(Some(2)));
        check!(pages.calls().len() == 1);

        check!(stream.next().await.map(Result::ok) == Some(Some(3)));
        check!(stream.next().await.is_none());
        check!(pages.calls().len() == 2);
    }

    #[tokio::test]
    async fn auto_paging_ends_after_error() {
        let pages = Pages::new(&[("", 200, json!({"data": [1], "next_cursor": "gone"}))]);
        let first = client(&pages).list::<u32>(list()).await.expect("page");

        let items = first.auto_paging().collect::<Vec<_>>().await;
        let_assert!([Ok(1), Err(Error::Api(err))] = items.as_slice());
        check!(err.status() == 404);
    }
}
