use std::sync::Arc;

use clap::Parser;
use console_audit::{NullPublisher, Recorder};
use console_directory::Registry;
use kube::Client;

mod args;
mod console;
mod directory_role_binding;
mod util;

use args::Args;
use util::Error;

#[tokio::main]
async fn main() -> Result<(), Error> {
    console_common::init();

    let args = Args::parse();
    let client = Client::try_default().await?;

    console_common::metrics::maybe_spawn_metrics_server(args.metrics_port, args.component_name.clone());

    let recorder = Arc::new(Recorder::new(Arc::new(NullPublisher)));
    let registry = Arc::new(Registry::new());

    let console_controller = tokio::spawn(console::run(client.clone(), recorder, args.namespace.clone()));
    let drb_controller = tokio::spawn(directory_role_binding::run(client, registry, args.namespace));

    let (console_result, drb_result) = tokio::join!(console_controller, drb_controller);
    console_result.expect("Console controller task panicked")?;
    drb_result.expect("DirectoryRoleBinding controller task panicked")?;
    Ok(())
}
