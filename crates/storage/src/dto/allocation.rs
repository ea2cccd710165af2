use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationInput {
    pub assessment_id: Uuid,
    pub flex: Option<Decimal>,
}

/// A student's full set of choices, submitted together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentAllocationRequest {
    pub allocations: Vec<AllocationInput>,
}
