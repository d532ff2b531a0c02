use clap::Parser;
use fonomar_checkout::config::Cli;
use fonomar_checkout::domain::ports::{SharedEventLog, SharedGateway};
use fonomar_checkout::infrastructure::in_memory::InMemoryEventLog;
use fonomar_checkout::infrastructure::mercado_pago::MercadoPagoClient;
use fonomar_checkout::interfaces::http::{AppState, router};
use miette::{IntoDiagnostic, Result};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    fonomar_checkout::init_tracing(cli.log_json);

    let gateway_config = cli.gateway();
    if gateway_config.access_token.is_none() {
        tracing::warn!("MERCADOPAGO_ACCESS_TOKEN is not set; gateway calls will fail");
    }
    let gateway: SharedGateway = Arc::new(MercadoPagoClient::new(gateway_config).into_diagnostic()?);
    let events = event_log(&cli);

    let state = AppState::new(gateway, events).with_statement_descriptor(&cli.statement_descriptor);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .into_diagnostic()?;
    tracing::info!(addr = %cli.bind, "Checkout service listening");
    axum::serve(listener, app).await.into_diagnostic()?;

    Ok(())
}

fn event_log(cli: &Cli) -> SharedEventLog {
    if cli.in_memory {
        tracing::info!("Using in-memory event log; contracts are lost on restart");
        return Arc::new(InMemoryEventLog::new());
    }
    persistent_event_log(cli)
}

#[cfg(feature = "storage-mysql")]
fn persistent_event_log(cli: &Cli) -> SharedEventLog {
    use fonomar_checkout::error::CheckoutError;
    use fonomar_checkout::infrastructure::mysql::MySqlEventLog;
    use fonomar_checkout::infrastructure::unavailable::UnavailableEventLog;

    match cli.database() {
        Ok(config) => {
            tracing::info!(host = %config.host, database = %config.database, "Using MySQL event log");
            Arc::new(MySqlEventLog::connect_lazy(&config))
        }
        Err(err) => {
            tracing::warn!(error = %err, "Event log unavailable; contract endpoints will fail");
            let reason = match err {
                CheckoutError::ConfigError(reason) => reason,
                other => other.to_string(),
            };
            Arc::new(UnavailableEventLog::new(reason))
        }
    }
}

#[cfg(not(feature = "storage-mysql"))]
fn persistent_event_log(_cli: &Cli) -> SharedEventLog {
    tracing::warn!("Built without the storage-mysql feature; falling back to the in-memory event log");
    Arc::new(InMemoryEventLog::new())
}
