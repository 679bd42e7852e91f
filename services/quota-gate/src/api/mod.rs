use std::sync::Arc;

pub mod handlers;
pub mod router;
pub mod types;

pub use router::create_router;
pub use types::*;

use crate::config::QuotaGateConfig;
use crate::gate::QuotaGate;

pub struct ApiState {
    pub gate: Arc<QuotaGate>,
    pub config: Arc<QuotaGateConfig>,
}

impl ApiState {
    pub fn new(gate: Arc<QuotaGate>, config: QuotaGateConfig) -> Self {
        Self {
            gate,
            config: Arc::new(config),
        }
    }
}
