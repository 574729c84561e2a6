//! Plan a task, approve the quote and run it against a simulated marketplace.
//!
//! Run with: cargo run -p tollway-workflow --example approve_and_run -- "fetch prices and write a report"

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tollway_executor::{ChainConfig, ChainExecutor, FnInvoker, InvocationRequest, InvokeError};
use tollway_planner::Decomposer;
use tollway_workflow::{BroadcastEventSink, InMemoryWorkflowStore, WorkflowManager};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let description = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Fetch wallet balances, analyze the flows and write a report".to_string());

    let config = ChainConfig::load("tollway.toml")?;

    // Every service answers after a short delay; `compute` demands payment.
    let invoker = FnInvoker::new(|req: InvocationRequest| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if req.action == "compute" {
            return Err(InvokeError::from_response(
                402,
                &json!({
                    "amount": "30000",
                    "asset": "USDC",
                    "payTo": "0x0000000000000000000000000000000000000001",
                    "network": "base-sepolia",
                    "nonce": format!("{}-{}", req.step_id, req.attempt),
                }),
            ));
        }
        Ok(json!({
            "service": req.service_name,
            "action": req.action,
            "task": req.params.get("task"),
        }))
    });

    let events = Arc::new(BroadcastEventSink::default());
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            println!("event: {}", serde_json::to_string(&event).unwrap_or_default());
        }
    });

    let manager = WorkflowManager::new(
        Decomposer::new(),
        ChainExecutor::with_config(invoker, config),
        Arc::new(InMemoryWorkflowStore::new()),
        events,
    );

    let workflow = manager.create(&description).await?;
    println!("\nPlan: {}", workflow.plan.render_graph());
    println!("Critical path: {}", workflow.plan.critical_path.join(" → "));
    println!(
        "Quote: {:.4} over ~{}ms",
        workflow.quoted_cost(),
        workflow.plan.total_estimated_time
    );

    manager.approve(workflow.id).await?;
    let finished = manager.run(workflow.id).await?;

    println!("\nStatus: {}", finished.status);
    println!("Actual cost: {:.4} in {}ms", finished.actual_cost, finished.actual_time);
    if let Some(result) = &finished.result {
        println!("Output: {}", serde_json::to_string_pretty(&result.output)?);
        for error in &result.errors {
            println!("  {:?}: {}", error.kind, error.error);
        }
    }

    Ok(())
}
