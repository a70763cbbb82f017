use rust_decimal::Decimal;
use tracing::{error, info, Instrument};

use order_workflow::app_system::{setup_tracing, OrderSystem};
use order_workflow::config::AppConfig;
use order_workflow::domain::{Caller, NewOrderRequest, NewProduct, UserId};
use order_workflow::error::{AppError, AppResult};

#[tokio::main]
async fn main() -> AppResult<()> {
    dotenvy::dotenv().ok();

    // Setup tracing once for the entire application
    setup_tracing();

    let config = AppConfig::from_env()?;
    info!(backend = config.backend.as_str(), "Starting order system");

    let system = OrderSystem::start(&config).await?;

    let span = tracing::info_span!("catalog_seed");
    let (notebook, pen) = async {
        info!("Seeding catalog");
        let notebook = system
            .catalog
            .create_product(NewProduct::new("Notebook", Decimal::new(450, 2), 20))
            .await?;
        let pen = system
            .catalog
            .create_product(NewProduct::new("Pen", Decimal::new(125, 2), 50))
            .await?;
        Ok::<_, AppError>((notebook, pen))
    }
    .instrument(span)
    .await?;

    let buyer = Caller::customer(UserId::new());
    let request = NewOrderRequest::default().line(notebook.id, 2).line(pen.id, 3);

    let span = tracing::info_span!("order_processing", user_id = %buyer.user_id);
    let order_result = async {
        info!("Placing order");
        let order = system.workflow.create_order(&buyer, request).await?;
        info!(order_id = %order.id, total = %order.total_price, "Order processed successfully");

        let cancelled = system.workflow.cancel(&buyer, order.id).await?;
        info!(order_id = %cancelled.id, status = %cancelled.status, "Order cancelled");
        Ok::<_, AppError>(())
    }
    .instrument(span)
    .await;

    if let Err(e) = order_result {
        error!(error = %e, "Order processing failed");
    }

    // Shutdown system gracefully
    system.shutdown().await?;

    info!("Application completed successfully");
    Ok(())
}
