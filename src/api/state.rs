use std::sync::Arc;

use crate::queue::DispatchQueue;
use crate::ranking::RankingCalculator;
use crate::storage::Pool;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub queue: DispatchQueue,
    pub calculator: Arc<RankingCalculator>,
}
