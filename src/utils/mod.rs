//! Shared helpers: domain/URL handling, DNS resolution, SMTP probing.

pub mod dns;
pub mod domain;
pub mod smtp;
