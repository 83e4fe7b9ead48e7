//! RCPT-level SMTP probing used for deliverability verification.
//!
//! A probe never sends a message: it connects to the domain's mail
//! exchanger, walks through EHLO / MAIL FROM / RCPT TO and reads how the
//! server answers for the recipient in question. The blocking `lettre`
//! connection runs on the blocking pool so slow servers cannot stall the
//! async workers sharing the round's concurrency budget.

use super::error::handle_smtp_error;
use super::result::SmtpVerificationResult;
use crate::core::config::{get_random_sleep_duration, Config};
use crate::core::error::{AppError, Result};

use lettre::transport::smtp::client::SmtpConnection;
use lettre::transport::smtp::commands::{Ehlo, Mail, Rcpt};
use lettre::transport::smtp::response::{Code, Severity};
use lettre::Address;
use rand::Rng;
use std::net::ToSocketAddrs;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Connection parameters for one SMTP probe attempt.
struct ConnectionParams {
    socket_addr: std::net::SocketAddr,
    helo_name: lettre::transport::smtp::extension::ClientId,
    timeout: Duration,
    use_tls: bool,
}

/// Client for probing recipient deliverability via SMTP.
#[derive(Clone)]
pub struct SmtpProbe {
    config: Arc<Config>,
}

impl SmtpProbe {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Probes a recipient with retries for inconclusive results.
    ///
    /// Returns the final status (`Some(true)`, `Some(false)` or `None`) and
    /// a descriptive message.
    pub async fn check_recipient_with_retries(
        &self,
        email: &str,
        mail_server: &str,
    ) -> (Option<bool>, String) {
        let mut last_result: Option<bool> = None;
        let mut last_message = "SMTP check did not run or complete".to_string();

        for attempt in 0..self.config.max_verification_attempts {
            tracing::debug!(target: "smtp_task",
                "Attempt {}/{} to verify <{}> via SMTP server {}",
                attempt + 1,
                self.config.max_verification_attempts,
                email,
                mail_server
            );

            match self.check_recipient(email, mail_server).await {
                Ok(result) => {
                    last_result = result.exists;
                    last_message = result.message.clone();

                    if result.exists.is_some() {
                        tracing::debug!(target: "smtp_task",
                            "SMTP check for <{}> conclusive (Result: {:?}) on attempt {}.",
                            email, result.exists, attempt + 1
                        );
                        break;
                    }
                    if !result.should_retry {
                        tracing::warn!(target: "smtp_task",
                            "SMTP check for <{}> failed with non-retriable status on attempt {}. Msg: {}",
                            email, attempt + 1, result.message
                        );
                        break;
                    }
                    tracing::warn!(target: "smtp_task",
                        "SMTP check for <{}> inconclusive on attempt {}: {}. Will retry if attempts remain.",
                        email, attempt + 1, result.message
                    );
                }
                Err(e) => {
                    tracing::error!(target: "smtp_task",
                        "Internal error during SMTP verification attempt {} for <{}>: {}",
                        attempt + 1, email, e
                    );
                    last_message = format!("Internal error during SMTP check: {}", e);
                    last_result = None;
                    break;
                }
            }

            if attempt < self.config.max_verification_attempts - 1 && last_result.is_none() {
                let sleep_duration = get_random_sleep_duration(&self.config);
                tracing::debug!(target: "smtp_task",
                    "Sleeping {:?} before next SMTP attempt for <{}>.", sleep_duration, email);
                tokio::time::sleep(sleep_duration).await;
            }
        }

        tracing::info!(target: "smtp_task",
            "Final SMTP verification result for <{}> via {}: Status={:?}, Msg='{}'",
            email, mail_server, last_result, last_message
        );

        (last_result, last_message)
    }

    /// Probes whether the domain accepts an address that cannot exist.
    ///
    /// An acceptance for the synthetic recipient means the domain is a
    /// catch-all and positive per-address answers are uninformative.
    /// Inconclusive probes are treated as "not catch-all".
    pub async fn probe_catch_all(&self, domain: &str, mail_server: &str) -> bool {
        let synthetic = format!(
            "no-reply-does-not-exist-{}-{:x}@{}",
            rand::thread_rng().gen_range(10000..99999),
            rand::thread_rng().gen::<u32>(),
            domain
        );
        tracing::debug!(target: "smtp_task",
            "Performing catch-all check with RCPT TO:<{}> on {}", synthetic, mail_server);

        match self.check_recipient(&synthetic, mail_server).await {
            Ok(result) => match result.exists {
                Some(true) => {
                    tracing::warn!(target: "smtp_task",
                        "Domain {} (MX: {}) appears to be a catch-all (accepted synthetic user)",
                        domain, mail_server
                    );
                    true
                }
                Some(false) => {
                    tracing::debug!(target: "smtp_task",
                        "Catch-all check negative for {} (MX: {}).", domain, mail_server);
                    false
                }
                None => {
                    tracing::debug!(target: "smtp_task",
                        "Catch-all check inconclusive for {} ({}); assuming not catch-all.",
                        domain, result.message);
                    false
                }
            },
            Err(e) => {
                tracing::warn!(target: "smtp_task",
                    "Error during catch-all check for {} on {} (ignoring): {}",
                    domain, mail_server, e);
                false
            }
        }
    }

    /// Performs one full RCPT TO probe for a recipient address.
    pub async fn check_recipient(
        &self,
        email: &str,
        mail_server: &str,
    ) -> Result<SmtpVerificationResult> {
        let config = Arc::clone(&self.config);
        let email = email.to_string();
        let mail_server = mail_server.to_string();

        tokio::task::spawn_blocking(move || probe_recipient_blocking(&config, &email, &mail_server))
            .await
            .map_err(|e| AppError::Initialization(format!("SMTP probe task panicked: {}", e)))?
    }
}

fn probe_recipient_blocking(
    config: &Config,
    email: &str,
    mail_server: &str,
) -> Result<SmtpVerificationResult> {
    tracing::debug!(target: "smtp_task",
        "Starting SMTP check for {} via {}", email, mail_server);

    let recipient_address = match Address::from_str(email) {
        Ok(addr) => addr,
        Err(e) => {
            return Ok(SmtpVerificationResult::conclusive(
                false,
                format!("Invalid email format: {}", e),
            ));
        }
    };

    let sender_address = Address::from_str(&config.smtp_sender_email)
        .map_err(|e| AppError::Config(format!("Invalid sender email in config: {}", e)))?;

    let socket_addr = match (mail_server, 25_u16).to_socket_addrs()?.next() {
        Some(addr) => addr,
        None => {
            return Ok(SmtpVerificationResult::inconclusive_no_retry(format!(
                "Could not resolve mail server address: {}",
                mail_server
            )));
        }
    };

    let helo_name = lettre::transport::smtp::extension::ClientId::Domain("localhost".to_string());

    let params = ConnectionParams {
        socket_addr,
        helo_name,
        timeout: config.smtp_timeout,
        use_tls: false,
    };

    let connect_result = try_connection(
        config,
        &params,
        &sender_address,
        &recipient_address,
        email,
        mail_server,
    );

    if let Ok(ref result) = connect_result {
        let msg = result.message.to_lowercase();
        if msg.contains("starttls")
            || msg.contains("tls required")
            || (msg.contains("530")
                && msg.contains("5.7.0")
                && !msg.contains("authentication required"))
        {
            tracing::info!(target: "smtp_task",
                "Server {} appears to require STARTTLS, retrying with TLS enabled", mail_server);

            let tls_params = ConnectionParams {
                socket_addr: params.socket_addr,
                helo_name: params.helo_name,
                timeout: params.timeout,
                use_tls: true,
            };

            return try_connection(
                config,
                &tls_params,
                &sender_address,
                &recipient_address,
                email,
                mail_server,
            );
        }
    }

    connect_result
}

fn try_connection(
    config: &Config,
    params: &ConnectionParams,
    sender_address: &Address,
    recipient_address: &Address,
    email: &str,
    mail_server: &str,
) -> Result<SmtpVerificationResult> {
    tracing::debug!(target: "smtp_task",
        "Attempting SMTP connection to {} at {} (TLS: {})",
        mail_server, params.socket_addr, params.use_tls
    );

    let tls_parameters = if params.use_tls {
        Some(
            lettre::transport::smtp::client::TlsParameters::new(mail_server.to_string()).map_err(
                |e| {
                    AppError::SmtpInconclusive(format!(
                        "Failed to create TLS parameters for {}: {}",
                        mail_server, e
                    ))
                },
            )?,
        )
    } else {
        None
    };

    let mut smtp_conn = match SmtpConnection::connect(
        params.socket_addr,
        Some(params.timeout),
        &params.helo_name,
        tls_parameters.as_ref(),
        None,
    ) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(target: "smtp_task",
                "SMTP connection failed for {} (TLS={}): {}", mail_server, params.use_tls, e);

            let err_string = e.to_string();
            if err_string.contains("timed out")
                || err_string.contains("connection refused")
                || err_string.contains("Network is unreachable")
            {
                return Ok(SmtpVerificationResult::inconclusive_no_retry(format!(
                    "Connection failed ({}): Port 25 access might be blocked.",
                    err_string
                )));
            }

            return Ok(handle_smtp_error(&e, mail_server));
        }
    };

    match smtp_conn.command(Ehlo::new(params.helo_name.clone())) {
        Ok(response) => {
            if !response.is_positive() {
                tracing::warn!(target: "smtp_task",
                    "EHLO command rejected by {}: {} {}",
                    mail_server,
                    response.code(),
                    response.message().collect::<Vec<&str>>().join(" "));
            }
        }
        Err(e) => {
            tracing::warn!(target: "smtp_task", "Error sending EHLO to {}: {}", mail_server, e);
            return Ok(handle_smtp_error(&e, mail_server));
        }
    }

    tracing::debug!(target: "smtp_task",
        "Sending MAIL FROM:<{}> to {}...", &config.smtp_sender_email, mail_server);
    match smtp_conn.command(Mail::new(Some(sender_address.clone()), vec![])) {
        Ok(response) => {
            if !response.is_positive() {
                let message = response.message().collect::<Vec<&str>>().join(" ");
                tracing::warn!(target: "smtp_task",
                    "SMTP sender '{}' rejected by {}: {} {:?}",
                    &config.smtp_sender_email, mail_server, response.code(), message
                );

                if !params.use_tls
                    && (message.to_lowercase().contains("starttls")
                        || (response.code().to_string().starts_with("530")
                            && message.contains("5.7.0")))
                {
                    smtp_conn.quit().ok();
                    return Ok(SmtpVerificationResult::inconclusive_retry(format!(
                        "Server requires STARTTLS: {} {}",
                        response.code(),
                        message
                    )));
                }

                smtp_conn.quit().ok();
                return Ok(SmtpVerificationResult::inconclusive_no_retry(format!(
                    "MAIL FROM rejected: {} {}",
                    response.code(),
                    message
                )));
            }
        }
        Err(e) => {
            tracing::warn!(target: "smtp_task", "Error during MAIL FROM on {}: {}", mail_server, e);
            smtp_conn.quit().ok();
            return Ok(handle_smtp_error(&e, mail_server));
        }
    }

    tracing::debug!(target: "smtp_task", "Sending RCPT TO:<{}> to {}...", email, mail_server);
    let rcpt_result = smtp_conn.command(Rcpt::new(recipient_address.clone(), vec![]));

    let (target_code, target_message): (Code, String) = match rcpt_result {
        Ok(response) => {
            tracing::info!(target: "smtp_task",
                "RCPT TO:<{}> response from {}: Code={}, Msg='{}'",
                email, mail_server, response.code(),
                response.message().collect::<Vec<&str>>().join(" ")
            );
            (
                response.code(),
                response.message().collect::<Vec<&str>>().join(" "),
            )
        }
        Err(e) => {
            smtp_conn.quit().ok();
            return Ok(handle_smtp_error(&e, mail_server));
        }
    };

    let final_result = evaluate_smtp_response(target_code, &target_message);
    smtp_conn.quit().ok();
    Ok(final_result)
}

/// Maps an RCPT TO response to a verification result by severity class.
pub(crate) fn evaluate_smtp_response(
    target_code: Code,
    target_message: &str,
) -> SmtpVerificationResult {
    match target_code.severity {
        Severity::PositiveCompletion => SmtpVerificationResult::conclusive(
            true,
            format!("SMTP Verification OK: {} {}", target_code, target_message),
        ),
        Severity::PositiveIntermediate => SmtpVerificationResult::inconclusive_retry(format!(
            "SMTP Unexpected Intermediate Code: {} {}",
            target_code, target_message
        )),
        Severity::TransientNegativeCompletion => SmtpVerificationResult::inconclusive_retry(
            format!("SMTP Temp Failure/Greylisted? (4xx): {} {}", target_code, target_message),
        ),
        Severity::PermanentNegativeCompletion => {
            let rejection_phrases = [
                "unknown",
                "no such",
                "unavailable",
                "rejected",
                "doesn't exist",
                "disabled",
                "invalid address",
                "recipient not found",
                "user unknown",
                "mailbox unavailable",
                "no mailbox",
                "address rejected",
                "invalid recipient",
                "policy violation",
            ];
            let message_lower = target_message.to_lowercase();
            let code_str = target_code.to_string();

            if ["550", "551", "553"].contains(&code_str.as_str())
                || rejection_phrases.iter().any(|p| message_lower.contains(p))
            {
                SmtpVerificationResult::conclusive(
                    false,
                    format!(
                        "SMTP Rejected (User Likely Unknown): {} {}",
                        target_code, target_message
                    ),
                )
            } else {
                SmtpVerificationResult::conclusive(
                    false,
                    format!(
                        "SMTP Rejected (Policy/Other 5xx): {} {}",
                        target_code, target_message
                    ),
                )
            }
        }
    }
}

/// Tests basic SMTP connectivity to a known reliable server (Google).
/// This helps diagnose if outbound port 25 is generally blocked.
pub async fn test_smtp_connectivity() -> Result<()> {
    tracing::info!("Testing outbound SMTP (port 25) connectivity to Google...");

    let test_server = "gmail-smtp-in.l.google.com";
    let test_port = 25u16;

    let socket_addr = match (test_server, test_port)
        .to_socket_addrs()
        .map_err(|e| AppError::Config(format!("DNS resolution failed for {}: {}", test_server, e)))?
        .next()
    {
        Some(addr) => addr,
        None => {
            return Err(AppError::Config(format!(
                "Could not resolve any IP address for {}",
                test_server
            )));
        }
    };

    let helo_name = lettre::transport::smtp::extension::ClientId::Domain("localhost".to_string());
    let timeout = Duration::from_secs(5);

    let connect_attempt = tokio::task::spawn_blocking(move || {
        SmtpConnection::connect(socket_addr, Some(timeout), &helo_name, None, None)
    });

    match tokio::time::timeout(timeout + Duration::from_secs(1), connect_attempt).await {
        Ok(Ok(Ok(mut conn))) => {
            tracing::info!("SMTP connectivity test successful (connected to {}).", test_server);
            conn.quit().ok();
            Ok(())
        }
        Ok(Ok(Err(e))) => {
            let err_str = e.to_string().to_lowercase();
            if err_str.contains("connection refused") || err_str.contains("network is unreachable")
            {
                Err(AppError::SmtpInconclusive(format!(
                    "Connection to {} refused or network unreachable. Check firewall or network settings.",
                    test_server
                )))
            } else {
                Err(AppError::Smtp(e))
            }
        }
        Ok(Err(join_err)) => Err(AppError::Initialization(format!(
            "SMTP connectivity task panicked: {}",
            join_err
        ))),
        Err(_) => Err(AppError::SmtpInconclusive(
            "SMTP connection timed out - port 25 is likely blocked.".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(first: u8, second: u8, third: u8) -> Code {
        use lettre::transport::smtp::response::{Category, Detail};
        let severity = match first {
            2 => Severity::PositiveCompletion,
            3 => Severity::PositiveIntermediate,
            4 => Severity::TransientNegativeCompletion,
            _ => Severity::PermanentNegativeCompletion,
        };
        let category = match second {
            0 => Category::Syntax,
            1 => Category::Information,
            2 => Category::Connections,
            3 => Category::Unspecified3,
            4 => Category::Unspecified4,
            _ => Category::MailSystem,
        };
        let detail = match third {
            0 => Detail::Zero,
            1 => Detail::One,
            2 => Detail::Two,
            3 => Detail::Three,
            4 => Detail::Four,
            5 => Detail::Five,
            6 => Detail::Six,
            7 => Detail::Seven,
            8 => Detail::Eight,
            _ => Detail::Nine,
        };
        Code {
            severity,
            category,
            detail,
        }
    }

    #[test]
    fn accepts_positive_completion() {
        let result = evaluate_smtp_response(code(2, 5, 0), "OK");
        assert_eq!(result.exists, Some(true));
        assert!(!result.should_retry);
    }

    #[test]
    fn rejects_mailbox_unknown_codes() {
        for third in [0u8, 1, 3] {
            let result = evaluate_smtp_response(code(5, 5, third), "mailbox unavailable");
            assert_eq!(result.exists, Some(false));
        }
    }

    #[test]
    fn transient_failures_are_retriable() {
        let result = evaluate_smtp_response(code(4, 5, 0), "greylisted, try later");
        assert_eq!(result.exists, None);
        assert!(result.should_retry);
    }

    #[test]
    fn policy_rejections_are_conclusive_negative() {
        let result = evaluate_smtp_response(code(5, 5, 4), "transaction failed");
        assert_eq!(result.exists, Some(false));
        assert!(!result.should_retry);
    }
}
