use table_server::{Config, ServerState, init_logger_with_file};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment (.env is optional)
    dotenv::dotenv().ok();

    // 2. Configuration and logging
    let config = Config::from_env();
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());

    tracing::info!(
        work_dir = %config.work_dir,
        timezone = %config.timezone,
        fixed_tables = config.fixed_table_count,
        "Table server starting..."
    );

    // 3. Storage, services, fixed tables
    let state = ServerState::initialize(&config)?;
    let stats = state.storage.get_stats()?;
    tracing::info!(
        tables = stats.table_count,
        open_rounds = stats.open_round_count,
        tickets = stats.ticket_count,
        "Server state ready"
    );

    // 4. Log every realtime signal until Ctrl-C
    let mut signals = state.message_bus().subscribe();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            msg = signals.recv() => match msg {
                Ok(msg) => match msg.parse_signal() {
                    Ok(signal) => tracing::info!(
                        topic = %msg.topic,
                        table_number = signal.table_number,
                        kind = ?signal.event_kind,
                        request_id = %msg.request_id,
                        "Signal"
                    ),
                    Err(e) => tracing::warn!(topic = %msg.topic, error = %e, "Undecodable signal"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Signal log lagging behind");
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested");
                break;
            }
        }
    }

    tracing::info!("Table server stopped");
    Ok(())
}
