use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, Params};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ProviderError;

/// Pooled MySQL client.
///
/// The pool may close a client while it still sits in a slot; the next call
/// on it opens a fresh connection with the original options.
pub struct MysqlClient {
    opts: Opts,
    conn: Mutex<Option<Conn>>,
}

impl MysqlClient {
    pub(crate) async fn open(opts: Opts) -> Result<Self, ProviderError> {
        let conn = Conn::new(opts.clone()).await?;
        Ok(Self {
            opts,
            conn: Mutex::new(Some(conn)),
        })
    }

    async fn ensure<'a>(&self, slot: &'a mut Option<Conn>) -> Result<&'a mut Conn, ProviderError> {
        if slot.is_none() {
            debug!("mysql client closed, reconnecting");
            *slot = Some(Conn::new(self.opts.clone()).await?);
        }
        slot.as_mut()
            .ok_or_else(|| ProviderError::Connect("mysql connection unavailable".into()))
    }

    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Round-trips to the server, reconnecting first if the client was closed.
    pub async fn ping(&self) -> Result<(), ProviderError> {
        let mut guard = self.conn.lock().await;
        let conn = self.ensure(&mut guard).await?;
        conn.ping().await?;
        Ok(())
    }

    pub async fn query_drop(&self, sql: &str) -> Result<(), ProviderError> {
        let mut guard = self.conn.lock().await;
        let conn = self.ensure(&mut guard).await?;
        conn.query_drop(sql).await?;
        Ok(())
    }

    /// Executes a prepared statement and returns the number of affected rows.
    pub async fn exec_drop<P>(&self, sql: &str, params: P) -> Result<u64, ProviderError>
    where
        P: Into<Params> + Send,
    {
        let mut guard = self.conn.lock().await;
        let conn = self.ensure(&mut guard).await?;
        conn.exec_drop(sql, params).await?;
        Ok(conn.affected_rows())
    }

    pub(crate) async fn disconnect(&self) -> Result<(), ProviderError> {
        let conn = self.conn.lock().await.take();
        if let Some(conn) = conn {
            conn.disconnect().await?;
        }
        Ok(())
    }
}
