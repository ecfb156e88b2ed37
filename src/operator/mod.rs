pub use middleware::operator_auth;
pub use token::TokenConfig;
pub use types::OperatorClaims;

mod middleware;
mod token;
mod types;
