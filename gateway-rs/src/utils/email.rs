//! RFC 5321 address validation and inbox-key derivation.

use crate::error::AddressError;

/// RFC 5321 total address length limit.
const MAX_ADDRESS_LEN: usize = 320;
/// RFC 5321 local-part length limit.
const MAX_LOCAL_LEN: usize = 64;
/// RFC 5321 domain length limit.
const MAX_DOMAIN_LEN: usize = 255;

/// Validate a MAIL FROM address. The empty string and `<>` are accepted as
/// the null sender used by bounces.
pub fn validate_sender(address: &str) -> Result<(), AddressError> {
    if is_null_sender(address) {
        return Ok(());
    }
    validate(address)
}

/// Validate a RCPT TO address. The null sender is not a valid recipient.
pub fn validate_recipient(address: &str) -> Result<(), AddressError> {
    if is_null_sender(address) {
        return Err(AddressError::Empty);
    }
    validate(address)
}

/// Whether the address is the RFC 5321 null reverse-path.
pub fn is_null_sender(address: &str) -> bool {
    address.is_empty() || address == "<>"
}

fn validate(address: &str) -> Result<(), AddressError> {
    if address.len() > MAX_ADDRESS_LEN {
        return Err(AddressError::TooLong);
    }

    if address
        .bytes()
        .any(|b| b <= 0x1F || b == 0x7F)
    {
        return Err(AddressError::ControlChars);
    }

    let mut parts = address.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = match parts.next() {
        Some(d) => d,
        None => return Err(AddressError::InvalidFormat),
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(AddressError::InvalidFormat);
    }

    if local.len() > MAX_LOCAL_LEN || domain.len() > MAX_DOMAIN_LEN {
        return Err(AddressError::TooLong);
    }

    Ok(())
}

/// Extract the domain part of an address, lowercased.
pub fn domain_of(address: &str) -> Option<String> {
    let at = address.rfind('@')?;
    let domain = &address[at + 1..];
    if domain.is_empty() {
        return None;
    }
    Some(domain.to_lowercase())
}

/// Strip any `+tag` subaddress suffix from the local part. The domain bytes
/// are preserved exactly; case is left untouched.
pub fn base_email(address: &str) -> String {
    match address.find('@') {
        Some(at) => {
            let local = &address[..at];
            let domain = &address[at..];
            match local.find('+') {
                Some(plus) => format!("{}{}", &local[..plus], domain),
                None => address.to_string(),
            }
        }
        None => address.to_string(),
    }
}

/// The canonical inbox lookup key: alias-stripped and lowercased.
pub fn inbox_key(address: &str) -> String {
    base_email(address).to_lowercase()
}
