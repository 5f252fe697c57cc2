pub mod dns;
pub mod email;
pub mod ip;

pub use email::{base_email, domain_of, inbox_key, validate_recipient, validate_sender};
pub use ip::normalize_ip;
