//! Response helpers - URL derivation for stored objects

pub mod url;

pub use self::url::ObjectUrlBuilder;
