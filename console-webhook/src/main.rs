use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use console_audit::{NullPublisher, Recorder};
use kube::Client;

mod admission;
mod args;
mod handlers;
mod util;

use args::Args;
use util::Error;

#[derive(Clone)]
pub struct AppState {
    pub client: Client,
    pub recorder: Arc<Recorder>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    console_common::init();

    let args = Args::parse();
    let client = Client::try_default().await?;

    console_common::metrics::maybe_spawn_metrics_server(args.metrics_port, args.component_name.clone());

    let state = AppState {
        client,
        recorder: Arc::new(Recorder::new(Arc::new(NullPublisher))),
    };

    let app = Router::new()
        .route("/consoletemplate-validate", post(handlers::template_validator::handle))
        .route("/console-authenticator", post(handlers::authenticator::handle))
        .route("/consoleauthorisation-validate", post(handlers::authorisation::handle))
        .route("/console-attach-observer", post(handlers::attach_observer::handle))
        .route("/priority-injector", post(handlers::priority_injector::handle))
        .with_state(state)
        .layer(axum::middleware::from_fn(console_common::access_log::request));

    let addr: SocketAddr = args
        .bind_addr
        .parse()
        .map_err(|e| Error::InvalidRequest(format!("invalid bind address: {e}")))?;
    let tls_config = RustlsConfig::from_pem_file(&args.tls_cert_path, &args.tls_key_path)
        .await
        .map_err(|e| Error::InvalidRequest(format!("failed to load TLS material: {e}")))?;

    let handle = axum_server::Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        async move {
            console_common::shutdown::shutdown_signal().await;
            handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
        }
    });

    axum_server::bind_rustls(addr, tls_config)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(|e| Error::InvalidRequest(format!("admission server exited: {e}")))?;

    Ok(())
}
