//! Utility functions for handling domain names and URLs.

use crate::core::error::{AppError, Result};
use url::Url;

/// Extracts the base domain name (e.g., "acme.com") from a URL or domain
/// string. Adds a scheme if missing, strips a leading `www.`, lowercases.
///
/// Returns `Err(AppError::DomainExtraction)` if the input is empty or no
/// host can be parsed out of it.
pub fn get_domain_from_url(website_url_or_domain: &str) -> Result<String> {
    let trimmed_input = website_url_or_domain.trim();
    if trimmed_input.is_empty() {
        return Err(AppError::DomainExtraction(
            "Input string is empty".to_string(),
        ));
    }

    let url_str_with_scheme = if !trimmed_input.contains("://") {
        format!("https://{}", trimmed_input)
    } else {
        trimmed_input.to_string()
    };

    let url = match Url::parse(&url_str_with_scheme) {
        Ok(parsed_url) => parsed_url,
        Err(e) => {
            // Bare domains occasionally fail URL parsing; accept them
            // directly when they still look like a hostname.
            if !trimmed_input.contains('/')
                && trimmed_input.contains('.')
                && !trimmed_input.starts_with('.')
                && !trimmed_input.ends_with('.')
            {
                let host = trimmed_input.strip_prefix("www.").unwrap_or(trimmed_input);
                return Ok(host.to_lowercase());
            }
            return Err(AppError::UrlParse(e));
        }
    };

    let host = url.host_str().ok_or_else(|| {
        AppError::DomainExtraction(format!("Could not extract host from parsed URL: {}", url))
    })?;

    let domain = host.strip_prefix("www.").unwrap_or(host).to_lowercase();

    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(AppError::DomainExtraction(format!(
            "Extracted domain appears invalid: {}",
            domain
        )));
    }

    Ok(domain)
}

/// Parses the input website string into a valid `Url`, adding an `https`
/// scheme if missing. Used to give the fetcher a well-formed target.
pub fn normalize_url(website_url_str: &str) -> Result<Url> {
    let trimmed_input = website_url_str.trim();
    if trimmed_input.is_empty() {
        return Err(AppError::DomainExtraction(
            "Website URL input is empty".to_string(),
        ));
    }

    let url_str_with_scheme = if !trimmed_input.contains("://") {
        format!("https://{}", trimmed_input)
    } else {
        trimmed_input.to_string()
    };

    let url = Url::parse(&url_str_with_scheme)?;
    if url.host_str().map_or(true, |h| h.is_empty()) {
        return Err(AppError::UrlParse(url::ParseError::EmptyHost));
    }
    Ok(url)
}

/// Shape check for the domain part of an extracted address: contains a dot,
/// is at least four characters, and its top label is alphabetic with at
/// least two characters.
pub fn domain_shape_ok(domain: &str) -> bool {
    if domain.len() < 4 || !domain.contains('.') {
        return false;
    }
    if domain.starts_with('.') || domain.ends_with('.') {
        return false;
    }
    match domain.rsplit('.').next() {
        Some(tld) => tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()),
        None => false,
    }
}
