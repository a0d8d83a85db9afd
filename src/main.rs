use std::sync::Arc;

use clap::{Parser, Subcommand};
use kube::CustomResourceExt;
use podsvc_operator::{
    controller::{self, ControllerState},
    crd::PodSvc,
    telemetry, Error,
};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the operator
    Run(RunArgs),
    /// Show version information
    Version,
    /// Print the PodSvc CustomResourceDefinition as YAML
    Crd,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Only watch this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    namespace: Option<String>,

    /// Port for the REST API and metrics endpoint
    #[arg(long, env = "API_PORT", default_value_t = 8080)]
    api_port: u16,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("PodSvc Operator v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Crd => {
            let yaml = serde_yaml::to_string(&PodSvc::crd())
                .map_err(|e| Error::ConfigError(format!("Failed to render CRD: {}", e)))?;
            print!("{}", yaml);
            Ok(())
        }
        Commands::Run(run_args) => run_operator(run_args).await,
    }
}

fn init_tracing(log_json: bool) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let (json_layer, text_layer) = if log_json {
        (Some(fmt::layer().json().with_target(true)), None)
    } else {
        (None, Some(fmt::layer().with_target(true)))
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer);

    // Only enable OTEL if an endpoint is provided
    if telemetry::otlp_enabled() {
        match telemetry::init_telemetry(&registry) {
            Ok(otel_layer) => {
                registry.with(otel_layer).init();
                info!("OpenTelemetry tracing initialized");
            }
            Err(e) => {
                registry.init();
                warn!("OpenTelemetry tracing disabled: {}", e);
            }
        }
    } else {
        registry.init();
        info!("OpenTelemetry tracing disabled (OTEL_EXPORTER_OTLP_ENDPOINT not set)");
    }
}

async fn run_operator(args: RunArgs) -> Result<(), Error> {
    init_tracing(args.log_json);

    info!("Starting PodSvc Operator v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Kubernetes client
    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;

    info!("Connected to Kubernetes cluster");

    let state = Arc::new(ControllerState {
        client,
        watch_namespace: args.namespace,
    });

    #[cfg(feature = "rest-api")]
    {
        let api_state = state.clone();
        let port = args.api_port;
        tokio::spawn(async move {
            if let Err(e) = podsvc_operator::rest_api::run_server(api_state, port).await {
                error!("REST API server error: {:?}", e);
            }
        });
    }
    #[cfg(not(feature = "rest-api"))]
    let _ = args.api_port;

    let result = controller::run_controller(state).await;
    if let Err(e) = &result {
        error!("Controller exited with error: {:?}", e);
    }

    telemetry::shutdown_telemetry();
    result
}
