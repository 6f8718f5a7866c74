use crate::types::HealthRes;

/// Health service shared by every API front-end.
///
/// This service provides a standardised way to report that CareCard is up.
#[derive(Clone, Debug)]
pub struct HealthService;

impl HealthService {
    /// Check health without creating an instance.
    ///
    /// # Returns
    /// A `HealthRes` indicating the service is healthy.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "CareCard is alive".into(),
        }
    }
}
