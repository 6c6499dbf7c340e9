use std::fmt;

use futures::{StreamExt, TryStreamExt, future, stream};

use crate::{RecordStream, ResultLedger};

/// A single-pass listing that knows whether it is empty.
///
/// The head record is split off when the result is built. [`into_stream`](Self::into_stream)
/// yields it first and then the rest, so every record is handed out once. Results built by
/// the repositories hold buffered rows, never an open cursor, so the session stays free for
/// other calls while a page is alive.
pub struct WrappedResult<'s, M> {
    head: Option<M>,
    tail: RecordStream<'s, M>,
}

impl<'s, M: Send + 's> WrappedResult<'s, M> {
    /// Wraps rows already fetched from the store.
    pub fn from_rows(rows: Vec<M>) -> Self {
        let mut rows = rows.into_iter();
        match rows.next() {
            Some(head) => Self {
                head: Some(head),
                tail: stream::iter(rows.map(Ok)).boxed(),
            },
            None => Self::empty(),
        }
    }

    /// Pulls the first record off `stream`. The rest of the stream stays pending until the
    /// result is consumed.
    pub async fn peek(mut stream: RecordStream<'s, M>) -> ResultLedger<Self> {
        match stream.try_next().await? {
            Some(head) => Ok(Self {
                head: Some(head),
                tail: stream,
            }),
            None => Ok(Self::empty()),
        }
    }

    pub fn empty() -> Self {
        Self {
            head: None,
            tail: stream::empty().boxed(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// The first record, if any.
    pub fn head(&self) -> Option<&M> {
        self.head.as_ref()
    }

    pub fn into_stream(self) -> RecordStream<'s, M> {
        match self.head {
            Some(head) => stream::once(future::ready(Ok(head)))
                .chain(self.tail)
                .boxed(),
            None => self.tail,
        }
    }

    pub async fn collect(self) -> ResultLedger<Vec<M>> {
        self.into_stream().try_collect().await
    }
}

impl<M: fmt::Debug> fmt::Debug for WrappedResult<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappedResult")
            .field("is_empty", &self.head.is_none())
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::LedgerError;

    fn counted(items: Vec<i64>, polled: Arc<AtomicUsize>) -> RecordStream<'static, i64> {
        stream::iter(items)
            .map(move |item| {
                polled.fetch_add(1, Ordering::SeqCst);
                Ok(item)
            })
            .boxed()
    }

    #[tokio::test]
    async fn empty_stream_is_empty() {
        let polled = Arc::new(AtomicUsize::new(0));
        let wrapped = WrappedResult::peek(counted(vec![], polled.clone()))
            .await
            .unwrap();
        assert!(wrapped.is_empty());
        assert!(wrapped.is_empty());
        assert_eq!(wrapped.head(), None);
        assert!(wrapped.collect().await.unwrap().is_empty());
        assert_eq!(polled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn head_is_yielded_first_and_rows_are_pulled_once() {
        let polled = Arc::new(AtomicUsize::new(0));
        let wrapped = WrappedResult::peek(counted(vec![3, 1, 2], polled.clone()))
            .await
            .unwrap();
        assert!(!wrapped.is_empty());
        assert!(!wrapped.is_empty());
        assert_eq!(wrapped.head(), Some(&3));
        assert_eq!(polled.load(Ordering::SeqCst), 1);

        assert_eq!(wrapped.collect().await.unwrap(), vec![3, 1, 2]);
        assert_eq!(polled.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn buffered_rows_keep_their_order() {
        let wrapped = WrappedResult::from_rows(vec![5, 6, 7]);
        assert!(!wrapped.is_empty());
        assert_eq!(wrapped.head(), Some(&5));
        assert_eq!(wrapped.collect().await.unwrap(), vec![5, 6, 7]);

        let empty = WrappedResult::<i64>::from_rows(vec![]);
        assert!(empty.is_empty());
        assert!(empty.collect().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn errors_on_the_first_row_are_returned() {
        let failing: RecordStream<'static, i64> =
            stream::iter(vec![Err(LedgerError::InvalidSession("gone".to_string()))]).boxed();
        let err = WrappedResult::peek(failing).await.unwrap_err();
        assert_eq!(err, LedgerError::InvalidSession("gone".to_string()));
    }
}
