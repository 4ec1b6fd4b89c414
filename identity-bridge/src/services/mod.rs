pub mod admin_token;
pub mod claims;
pub mod credential_exchange;
pub mod database;
pub mod email;
pub mod error;
pub mod http;
pub mod memory;
pub mod password_reset;
pub mod provisioning;
pub mod registration;
pub mod store;
pub mod token_validator;

pub use admin_token::AdminTokenProvider;
pub use claims::{AuthorityMapper, ClaimSet, Principal, ADMIN_AUTHORITY};
pub use credential_exchange::{CredentialExchangeGateway, TokenRelay};
pub use database::Database;
pub use email::{ConsoleEmailService, EmailProvider, MockEmailService, SentEmail, SmtpEmailService};
pub use error::ServiceError;
pub use memory::MemoryStore;
pub use password_reset::{PasswordResetService, ResetOutcome};
pub use provisioning::{IdpProvisioningClient, ProvisioningRequest, UserProvisioner};
pub use registration::RegistrationService;
pub use store::IdentityStore;
pub use token_validator::{TokenRejection, TokenValidator};

/// Emails are compared case-insensitively and stored lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
