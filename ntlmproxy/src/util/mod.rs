pub mod bytes;
pub mod crypto;
pub mod headers;
pub mod ntlm;
