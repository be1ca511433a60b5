use std::sync::{Arc, PoisonError};

use clap::Parser;
use kube_registry::config::{Cli, Commands};
use kube_registry::metrics::{REGISTRY, StoreMetrics};
use kube_registry::{Result, controller, http};
use tokio::task::JoinError;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_subscriber();
    let cancel = tokio_util::sync::CancellationToken::new();
    match cli.command {
        Commands::Serve(args) => {
            let client = kube_registry_discovery::client(args.context.clone()).await?;
            let metrics = StoreMetrics::default()
                .register(&mut REGISTRY.write().unwrap_or_else(PoisonError::into_inner));
            let controller = controller::build(client, args.sync_config(), &metrics)?;
            let state = Arc::new(http::State::new(controller.discovery()));

            let mut http_handle =
                tokio::spawn(http::serve(args.address, state, cancel.child_token()));
            let mut controller_handle =
                tokio::spawn(controller::start(controller, cancel.child_token()));
            let mut shutdown_handle = tokio::spawn(async move { shutdown_signal().await });
            // watch for shutdown and errors
            tokio::select! {
                h = &mut http_handle => exit("http", h),
                h = &mut controller_handle => exit("controller", h),
                _ = &mut shutdown_handle => {
                        cancel.cancel();
                        let (http, controller) = tokio::join!(http_handle, controller_handle);
                        exit("http", http);
                        exit("controller", controller);
                    },
            };
            info!("Exiting...");
        }
    }
    Ok(())
}

fn setup_subscriber() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "kube_registry=info,kube_registry_sync=info,kube_registry_discovery=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl_c: {e}");
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    tokio::select! {
        _ = ctrl_c => {
          info!("captured ctrl_c signal");
        },
        _ = terminate => {},
    }
}

fn exit(task: &str, out: Result<Result<()>, JoinError>) {
    match out {
        Ok(Ok(_)) => {
            info!("{task} exited")
        }
        Ok(Err(e)) => {
            error!("{task} failed with error: {e}")
        }
        Err(e) => {
            error!("{task} task failed to complete: {e}")
        }
    }
}
