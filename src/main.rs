use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info, warn, Level};

use valet_parking::config::database::DatabaseConfig;
use valet_parking::config::environment::EnvironmentConfig;
use valet_parking::repositories::{PgStore, Stores};
use valet_parking::routes::create_app;
use valet_parking::state::AppState;
use valet_parking::utils::clock::SystemClock;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    let config = EnvironmentConfig::from_env()?;

    // Configurar logging
    tracing_subscriber::fmt()
        .with_max_level(config.log_level.parse::<Level>().unwrap_or(Level::INFO))
        .init();

    info!("🚗 Valet Parking - motor de asignación");
    info!("================================================");

    let stores = match DatabaseConfig::from_env() {
        Some(db_config) => {
            info!("🗄️ Conectando a {}", db_config.masked_url());
            let pool = match db_config.create_pool().await {
                Ok(pool) => pool,
                Err(e) => {
                    error!("❌ Error conectando a la base de datos: {}", e);
                    return Err(anyhow::anyhow!("Error de base de datos: {}", e));
                }
            };
            let store = PgStore::new(pool);
            store.run_migrations().await?;
            info!("✅ PostgreSQL conectado y migrado");
            Stores::from_store(Arc::new(store))
        }
        None => {
            warn!("⚠️ DATABASE_URL no definida: usando el store en memoria");
            Stores::in_memory()
        }
    };

    let state = AppState::build(&stores, config.clone(), Arc::new(SystemClock))?;
    spawn_scheduler(state.clone(), config.scheduler_tick_seconds);

    let app = create_app(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    info!("🌐 Servidor iniciando en {}", config.server_url());
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health");
    info!("🚗 Vehículos:");
    info!("   POST /api/vehicles - Registrar entrada");
    info!("   GET  /api/vehicles?state=PARKED - Listar por estado");
    info!("   GET  /api/vehicles/:id | /api/vehicles/token/:token");
    info!("   POST /api/vehicles/:id/{{parked,markout-options,markout,retrieval-valet,start-retrieval,delivered,close,reassign}}");
    info!("   GET  /api/vehicles/overdue - Recogidas retrasadas");
    info!("🧑‍✈️ Valets:");
    info!("   POST /api/valets | GET /api/valets | PUT /api/valets/:id/{{status,active}}");
    info!("   POST /api/valets/reset-daily | GET /api/valets/availability");
    info!("🅿️ Zonas:");
    info!("   POST /api/zones | GET /api/zones | GET /api/zones/capacity | PUT /api/zones/:code/active");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Error del servidor: {}", e);
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Tick periódico: despacha las recogidas vencidas y avisa de las retrasadas
fn spawn_scheduler(state: AppState, tick_seconds: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(tick_seconds));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            match state.lifecycle.dispatch_due_retrievals().await {
                Ok(report) => {
                    for outcome in &report.dispatched {
                        state.side_effects.execute(&outcome.intents).await;
                    }
                }
                Err(e) => error!("❌ Tick del scheduler fallido: {}", e),
            }

            match state.lifecycle.overdue_retrievals().await {
                Ok(overdue) if !overdue.is_empty() => {
                    let tokens: Vec<&str> = overdue.iter().map(|v| v.token.as_str()).collect();
                    warn!("⏰ {} recogidas retrasadas: {}", overdue.len(), tokens.join(", "));
                }
                Ok(_) => {}
                Err(e) => error!("❌ Consulta de retrasos fallida: {}", e),
            }
        }
    });
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
