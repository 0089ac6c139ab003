//! HTTP bootstrap responder.
//!
//! Serves a small page that points a browser client at the protocol port.
//! Every request is reported to the admission loop, which stays waiting for
//! the real connection.

use crate::AdmissionError;
use axum::{Router, extract::State, http::Uri, response::Html};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::{mpsc, oneshot};

/// Default page. `{port}` is replaced with the protocol port.
pub const DEFAULT_PAGE: &str = "<!DOCTYPE html>\n<html><head><title>vncgate</title></head>\n\
<body><p>Connect your viewer to port {port}.</p></body></html>\n";

/// Bootstrap responder settings.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub addr: SocketAddr,
    /// Page template; `{port}` is replaced with the protocol port.
    pub page: String,
}

impl BootstrapConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            page: DEFAULT_PAGE.to_owned(),
        }
    }
}

/// A served bootstrap request.
#[derive(Debug, Clone)]
pub struct BootstrapRequest {
    pub path: String,
}

struct Page {
    body: String,
    events: mpsc::UnboundedSender<BootstrapRequest>,
}

/// A running responder. Shut it down with [`BootstrapHandle::shutdown`].
pub struct BootstrapHandle {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: Option<tokio::task::JoinHandle<()>>,
}

impl BootstrapHandle {
    /// Stop serving and wait for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

/// Bind and start the responder.
pub async fn start(
    config: &BootstrapConfig,
    rfb_port: u16,
    events: mpsc::UnboundedSender<BootstrapRequest>,
) -> Result<BootstrapHandle, AdmissionError> {
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .map_err(|source| AdmissionError::Bootstrap {
            addr: config.addr,
            source,
        })?;
    let addr = listener
        .local_addr()
        .map_err(|source| AdmissionError::Bootstrap {
            addr: config.addr,
            source,
        })?;

    let page = Arc::new(Page {
        body: config.page.replace("{port}", &rfb_port.to_string()),
        events,
    });
    let app = Router::new().fallback(serve_page).with_state(page);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let join = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        if let Err(e) = server.await {
            tracing::error!("bootstrap responder failed: {e}");
        }
    });
    tracing::info!("bootstrap responder listening on {addr}");

    Ok(BootstrapHandle {
        addr,
        shutdown_tx: Some(shutdown_tx),
        join: Some(join),
    })
}

async fn serve_page(State(page): State<Arc<Page>>, uri: Uri) -> Html<String> {
    let _ = page.events.send(BootstrapRequest {
        path: uri.path().to_owned(),
    });
    Html(page.body.clone())
}
