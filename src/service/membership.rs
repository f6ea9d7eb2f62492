use crate::error::{AttendanceError, AttendanceResult};
use crate::model::membership::ClinicMembership;
use crate::store::AttendanceStore;
use crate::utils::retry::RetryPolicy;

/// Fails with `AuthorizationError` unless `user_id` is an active member of `clinic_id`.
pub async fn require_active_member(
    store: &dyn AttendanceStore,
    retry: &RetryPolicy,
    user_id: u64,
    clinic_id: u64,
) -> AttendanceResult<ClinicMembership> {
    let membership = retry
        .run("find_membership", move || store.find_membership(user_id, clinic_id))
        .await?;

    match membership {
        Some(m) if m.is_active => Ok(m),
        Some(_) => Err(AttendanceError::authorization("User is inactive in this clinic")),
        None => Err(AttendanceError::authorization("User does not belong to this clinic")),
    }
}
