use serde::Serialize;

use crate::traits::Mint;
use crate::types::{IssuanceRequest, LockId, PositionId};

#[derive(Debug, Clone, Serialize)]
pub struct IssuanceData {
    pub request: IssuanceRequest,
    pub collateral_lock: Option<LockId>,
    pub position: Option<PositionId>,
    pub mint: Option<Mint>,
    pub deposited: bool,
}

impl IssuanceData {
    #[must_use]
    pub fn new(request: IssuanceRequest) -> Self {
        Self {
            request,
            collateral_lock: None,
            position: None,
            mint: None,
            deposited: false,
        }
    }
}

impl From<IssuanceRequest> for IssuanceData {
    fn from(request: IssuanceRequest) -> Self {
        Self::new(request)
    }
}
