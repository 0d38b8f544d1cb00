use crate::CoreError;
use forkstack_store::EnvStatus;

/// Allowed environment status changes.
///
/// `Provisioning` ends in `Ready` or `Failed`, or goes straight to teardown
/// when a cancelled create is cleaned up. Teardown may be retried.
pub fn validate_transition(from: EnvStatus, to: EnvStatus) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (
            EnvStatus::Provisioning,
            EnvStatus::Ready | EnvStatus::Failed | EnvStatus::TearingDown
        ) | (
            EnvStatus::Ready | EnvStatus::Failed | EnvStatus::TearingDown,
            EnvStatus::TearingDown
        )
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition { from, to })
    }
}
