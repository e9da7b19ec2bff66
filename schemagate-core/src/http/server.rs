//! Async HTTP server using Hyper

use super::DynamicService;
use anyhow::{Context, Result};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Accept connections on `addr` and serve them with `service` until the listener fails
pub async fn serve(service: DynamicService, addr: &str) -> Result<()> {
    let addr: SocketAddr = addr.parse().with_context(|| format!("Invalid bind address: {}", addr))?;
    let listener =
        TcpListener::bind(addr).await.with_context(|| format!("Failed to bind {}", addr))?;

    log::info!("SchemaGate listening on http://{}", addr);

    loop {
        let (stream, peer) = listener.accept().await.context("Failed to accept connection")?;
        let io = TokioIo::new(stream);
        let service = service.clone();

        tokio::task::spawn(async move {
            if let Err(err) = http1::Builder::new()
                .serve_connection(
                    io,
                    service_fn(move |req| {
                        let service = service.clone();
                        async move { Ok::<_, Infallible>(service.handle(req).await) }
                    }),
                )
                .await
            {
                log::warn!("Error serving connection from {}: {:?}", peer, err);
            }
        });
    }
}
