pub mod extract_user;
pub mod rate_limit;
