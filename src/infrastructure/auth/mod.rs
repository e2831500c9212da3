mod claims;
mod jwt;

pub use claims::{Claims, SERVICE_ROLE};
pub use jwt::JwtValidator;
