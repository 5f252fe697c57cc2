pub mod headers;
pub mod links;
pub mod parser;
pub mod types;

pub use headers::{extract_bare_email, parse_headers};
pub use links::extract_urls;
pub use parser::parse_email;
pub use types::{AddressBlock, Attachment, EmailAddress, ParsedEmail};
