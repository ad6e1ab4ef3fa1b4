// src/alert/run_loop.rs
use crate::alert::machine::AlertController;
use crate::alert::state::ControllerEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, trace};

const LOG_TARGET: &str = "carecall::alert::run_loop";

/// Capacity of the controller queue shared by request sources and the ticker.
pub const EVENT_QUEUE_CAPACITY: usize = 32;

/// Drains the controller queue, handling each event to completion in arrival order.
///
/// Exits on [`ControllerEvent::Shutdown`] or when every sender is gone, leaving
/// the controller idle with its channels off.
pub async fn run_controller_loop(controller: Arc<AlertController>, mut events: mpsc::Receiver<ControllerEvent>) {
    info!(target: LOG_TARGET, "Alert controller loop started.");

    while let Some(event) = events.recv().await {
        trace!(target: LOG_TARGET, "Received event: {:?}", event);
        match event {
            ControllerEvent::Request(request) => {
                controller.handle_request(request);
            }
            ControllerEvent::Tick(generation) => {
                controller.handle_tick(generation);
            }
            ControllerEvent::Shutdown => {
                info!(target: LOG_TARGET, "Shutdown event received. Exiting controller loop.");
                break;
            }
        }
    }

    controller.shutdown();
    info!(target: LOG_TARGET, "Alert controller loop finished.");
}
