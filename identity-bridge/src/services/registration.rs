use metrics::counter;
use std::sync::Arc;

use super::{normalize_email, IdentityStore, ProvisioningRequest, ServiceError, UserProvisioner};
use crate::dtos::auth::RegisterRequest;
use crate::models::User;
use crate::utils::{hash_password, Password};

/// Registers a user locally, then mirrors the account into the identity provider.
///
/// A provisioning failure leaves the local row in place and surfaces as
/// `PartiallyProvisioned`: provisioning can be retried later, whereas rolling
/// back would only make the user collide with a half-created IdP account.
#[derive(Clone)]
pub struct RegistrationService {
    store: Arc<dyn IdentityStore>,
    provisioner: Arc<dyn UserProvisioner>,
}

impl RegistrationService {
    pub fn new(store: Arc<dyn IdentityStore>, provisioner: Arc<dyn UserProvisioner>) -> Self {
        Self { store, provisioner }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<User, ServiceError> {
        let email = normalize_email(&req.email);

        if self.store.find_user_by_email(&email).await?.is_some() {
            tracing::info!(email = %email, "Registration rejected: email already in use");
            return Err(ServiceError::EmailTaken);
        }

        let password = Password::new(req.password);
        let password_hash = hash_password(&password)?;

        let user = User::new_local(
            req.first_name.trim().to_string(),
            req.last_name.trim().to_string(),
            email.clone(),
            password_hash.into_string(),
        );
        self.store.insert_user(&user).await?;
        tracing::info!(user_id = %user.user_id, "User persisted locally");

        let request = ProvisioningRequest {
            email,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            password,
        };

        match self.provisioner.create_user(&request).await {
            Ok(()) => {
                counter!("registrations_total", "outcome" => "provisioned").increment(1);
                Ok(user)
            }
            Err(e) => {
                counter!("registrations_total", "outcome" => "partial").increment(1);
                Err(ServiceError::PartiallyProvisioned {
                    user_id: user.user_id,
                    reason: e.to_string(),
                })
            }
        }
    }
}
