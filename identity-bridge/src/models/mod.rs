pub mod password_reset_token;
pub mod user;

pub use password_reset_token::PasswordResetToken;
pub use user::{User, UserResponse, LOCAL_PROVIDER};
