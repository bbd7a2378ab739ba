//! Cluster Storage Operator
//!
//! `start` runs the operator under Lease leader election until SIGINT or
//! SIGTERM. With `--guest-kubeconfig` it runs in hosted control plane mode:
//! `--kubeconfig` points at the management cluster, the guest kubeconfig at
//! the hosted cluster and `--namespace` names the control plane namespace.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use cluster_storage_operator::client::ClientSet;
use cluster_storage_operator::config::OPERATOR_NAMESPACE;
use cluster_storage_operator::leader::LeaderElector;
use cluster_storage_operator::{Error, Metrics, Operator, OperatorConfig};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Cluster Storage Operator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the operator
    Start(StartArgs),
    /// Print the operator version
    Version,
}

#[derive(Args, Debug)]
struct StartArgs {
    /// Kubeconfig of the cluster running the operator; in-cluster config when unset
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Operator namespace, or the control plane namespace in hosted mode
    #[arg(long, env = "NAMESPACE", default_value = OPERATOR_NAMESPACE)]
    namespace: String,

    /// Kubeconfig of the hosted (guest) cluster; switches to hosted control plane mode
    #[arg(long, env = "GUEST_KUBECONFIG")]
    guest_kubeconfig: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8443")]
    metrics_addr: String,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Version => {
            println!("{} {}", cluster_storage_operator::NAME, cluster_storage_operator::VERSION);
            Ok(())
        }
        Command::Start(args) => {
            init_logging(&args);
            start(args).await
        }
    }
}

async fn start(args: StartArgs) -> anyhow::Result<()> {
    info!("Starting Cluster Storage Operator");
    info!("  Version: {}", cluster_storage_operator::VERSION);
    info!("  Namespace: {}", args.namespace);
    info!("  Hosted mode: {}", args.guest_kubeconfig.is_some());

    let mut config = OperatorConfig::from_env();
    let hosted = args.guest_kubeconfig.is_some();
    if !hosted {
        config.operator_namespace = args.namespace.clone();
    }
    let client = create_client(args.kubeconfig.as_deref())
        .await
        .context("failed to create Kubernetes client")?;

    let metrics = Metrics::new()?;
    let ready = Arc::new(AtomicBool::new(false));
    let root = CancellationToken::new();

    let health_addr = args.health_addr.clone();
    let health_ready = ready.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr, health_ready).await {
            error!("Health server error: {}", e);
        }
    });

    let metrics_addr = args.metrics_addr.clone();
    let served = metrics.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr, served).await {
            error!("Metrics server error: {}", e);
        }
    });

    let signals = root.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal");
        signals.cancel();
    });

    let elector = Arc::new(LeaderElector::new(
        client.clone(),
        &args.namespace,
        &LeaderElector::default_identity(),
    ));
    let Some(guard) = elector.acquire(&root).await? else {
        info!("Shut down before acquiring leadership");
        return Ok(());
    };

    let operator = match &args.guest_kubeconfig {
        Some(guest_kubeconfig) => {
            let guest = create_client(Some(guest_kubeconfig))
                .await
                .context("failed to create guest cluster client")?;
            Operator::hosted(
                ClientSet::from_client(guest),
                ClientSet::from_client(client),
                config,
                &args.namespace,
                metrics,
                &root,
            )?
        }
        None => Operator::standalone(ClientSet::from_client(client), config, metrics, &root)?,
    };

    let leadership = tokio::spawn(guard.guard(root.clone()));
    ready.store(true, Ordering::SeqCst);
    let result = operator.run(root.clone()).await;
    root.cancel();
    let leadership = leadership
        .await
        .unwrap_or_else(|e| Err(Error::Internal(format!("leader election task failed: {e}"))));

    result?;
    leadership?;
    info!("Operator shutdown complete");
    Ok(())
}

async fn create_client(kubeconfig: Option<&Path>) -> anyhow::Result<Client> {
    let config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("failed to read kubeconfig {}", path.display()))?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .context("failed to load kubeconfig")?
        }
        None => kube::Config::infer()
            .await
            .context("failed to infer cluster config")?,
    };
    Ok(Client::try_from(config)?)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &StartArgs) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("kube=info".parse().unwrap())
        .add_directive("tower=warn".parse().unwrap());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Health Server
// =============================================================================

async fn run_health_server(addr: &str, ready: Arc<AtomicBool>) -> cluster_storage_operator::Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server, StatusCode};

    let make_svc = make_service_fn(move |_conn| {
        let ready = ready.clone();
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req: Request<Body>| {
                let ready = ready.load(Ordering::SeqCst);
                async move {
                    let response = match req.uri().path() {
                        "/healthz" | "/livez" => Response::builder()
                            .status(StatusCode::OK)
                            .body(Body::from("ok"))
                            .unwrap(),
                        "/readyz" if ready => Response::builder()
                            .status(StatusCode::OK)
                            .body(Body::from("ok"))
                            .unwrap(),
                        "/readyz" => Response::builder()
                            .status(StatusCode::SERVICE_UNAVAILABLE)
                            .body(Body::from("not leader"))
                            .unwrap(),
                        _ => Response::builder()
                            .status(StatusCode::NOT_FOUND)
                            .body(Body::from("not found"))
                            .unwrap(),
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            }))
        }
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Configuration(format!("Invalid health server address: {}", e))
    })?;

    info!("Health server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Health server error: {}", e)))?;

    Ok(())
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(addr: &str, metrics: Metrics) -> cluster_storage_operator::Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server, StatusCode};
    use prometheus::{Encoder, TextEncoder};

    let make_svc = make_service_fn(move |_conn| {
        let metrics = metrics.clone();
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req: Request<Body>| {
                let encoded = metrics.encode();
                async move {
                    let response = match (req.uri().path(), encoded) {
                        ("/metrics", Ok(buffer)) => Response::builder()
                            .status(StatusCode::OK)
                            .header("Content-Type", TextEncoder::new().format_type())
                            .body(Body::from(buffer))
                            .unwrap(),
                        ("/metrics", Err(e)) => Response::builder()
                            .status(StatusCode::INTERNAL_SERVER_ERROR)
                            .body(Body::from(e.to_string()))
                            .unwrap(),
                        _ => Response::builder()
                            .status(StatusCode::NOT_FOUND)
                            .body(Body::from("not found"))
                            .unwrap(),
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            }))
        }
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Configuration(format!("Invalid metrics server address: {}", e))
    })?;

    info!("Metrics server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Metrics server error: {}", e)))?;

    Ok(())
}
