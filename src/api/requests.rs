use serde::{Deserialize, Serialize};

/// Body of the charge and use endpoints.
///
/// The amount is passed through to the ledger untouched; range and unit rules
/// are enforced there so every caller gets the same errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointAmountRequest {
    pub amount: i64,
}
