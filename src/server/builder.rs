// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use anyhow::{Context, Result};
use futures::stream::{self, Stream, StreamExt};
use hyper::{server::conn::Http, Body, Request, Response};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tower::Service;

/// Pause after a failed `accept()` so a persistent error (EMFILE) does not
/// spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Builder pattern so `main.rs` can inject the API handler.
pub struct ServerBuilder<H> {
    addr: SocketAddr,
    handler: Option<H>,
}

/// A listener that is bound and ready to accept connections.
pub struct BoundServer<H> {
    listener: TcpListener,
    handler: H,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, handler: None }
    }

    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Bind the TCP socket without serving yet.
    pub async fn bind(self) -> Result<BoundServer<H>> {
        let handler = self
            .handler
            .context("handler must be set via with_handler()")?;
        let listener = TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;

        Ok(BoundServer { listener, handler })
    }
}

impl<H> BoundServer<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` resolves. Connections already
    /// accepted keep running on their own tasks.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!("HTTP server listening on {}", self.local_addr()?);

        let listener = self.listener;
        let incoming = stream::unfold(listener, |listener| async move {
            let accepted = listener.accept().await;
            Some((accepted, listener))
        });
        serve_incoming(incoming, self.handler, shutdown).await;
        Ok(())
    }
}

/// Serve every accepted connection until `shutdown` resolves or `incoming`
/// ends. A failed accept (fd exhaustion, aborted handshake) is logged and
/// retried after `ACCEPT_BACKOFF`; it never stops the server.
async fn serve_incoming<S, H, F>(incoming: S, handler: H, shutdown: F)
where
    S: Stream<Item = io::Result<(TcpStream, SocketAddr)>>,
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
    F: Future<Output = ()>,
{
    tokio::pin!(incoming);
    tokio::pin!(shutdown);

    loop {
        let accepted = tokio::select! {
            accepted = incoming.next() => accepted,
            _ = &mut shutdown => {
                tracing::info!("HTTP server stopped accepting connections");
                return;
            }
        };

        let (stream, peer) = match accepted {
            Some(Ok(connection)) => connection,
            Some(Err(err)) => {
                tracing::warn!(%err, "accept error, retrying in {:?}", ACCEPT_BACKOFF);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
            None => return,
        };
        let svc = handler.clone();

        // One Tokio task per connection.
        tokio::spawn(async move {
            if let Err(err) = Http::new().serve_connection(stream, svc).await {
                tracing::warn!(%peer, %err, "connection error");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn accept_errors_do_not_stop_the_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let failures = stream::iter([
            Err(io::Error::from_raw_os_error(24)),
            Err(io::Error::from(io::ErrorKind::ConnectionAborted)),
        ]);
        let accepts = stream::unfold(listener, |listener| async move {
            let accepted = listener.accept().await;
            Some((accepted, listener))
        });

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_incoming(
            failures.chain(accepts),
            tower::service_fn(|_req: Request<Body>| async {
                Ok::<_, Infallible>(Response::new(Body::from("ok")))
            }),
            async move {
                let _ = stop_rx.await;
            },
        ));

        let body = reqwest::get(format!("http://{}/", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");
        assert!(!server.is_finished());

        let _ = stop_tx.send(());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_ends_serving() {
        let server = ServerBuilder::new(([127, 0, 0, 1], 0).into())
            .with_handler(tower::service_fn(|_req: Request<Body>| async {
                Ok::<_, Infallible>(Response::new(Body::empty()))
            }))
            .bind()
            .await
            .unwrap();

        server.serve_with_shutdown(async {}).await.unwrap();
    }
}
