//! Certificate loading for TLS connections to the AMQP broker.

use std::io::BufReader;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{TlsError, TlsResult};

/// Load a PEM CA certificate chain.
///
/// The file is parsed to make sure it holds at least one certificate, and
/// its PEM text is returned unchanged for the AMQP client's TLS config.
///
/// # Errors
///
/// Returns an error if the file cannot be read or contains no certificates.
pub fn load_ca_chain(path: &Path) -> TlsResult<String> {
    let pem = std::fs::read_to_string(path).map_err(|e| TlsError::CertificateLoad {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut reader = BufReader::new(pem.as_bytes());
    let count = rustls_pemfile::certs(&mut reader)
        .filter(|result| match result {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "skipping invalid certificate");
                false
            }
        })
        .count();

    if count == 0 {
        return Err(TlsError::NoCertificates(path.display().to_string()));
    }

    debug!(count, path = %path.display(), "loaded CA certificates");
    Ok(pem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // Self-signed test certificate (for testing only)
    const TEST_CERT: &str = r#"-----BEGIN CERTIFICATE-----
MIIC/zCCAeegAwIBAgIUHZciHaWd7ShdIRd77iIRL+AQ+eswDQYJKoZIhvcNAQEL
BQAwDzENMAsGA1UEAwwEdGVzdDAeFw0yNTEyMDkyMTA0MTZaFw0yNjEyMDkyMTA0
MTZaMA8xDTALBgNVBAMMBHRlc3QwggEiMA0GCSqGSIb3DQEBAQUAA4IBDwAwggEK
AoIBAQC/P2tCibhR7rmIYqozEgCCWeKiMEw+TQNVQsjWIV/IV5eovbQ/+VwjUfXW
q7Hn51njAZ71NA0gJJ9dsThe6CbsqFuovjYkJhp62RQNbGq4Uw55cyqnKzYeW7e3
uLH7bgXvStsWoAvR+IZs0bKl6k48EyfILqhTNgcwoPGNpQi7wi5RKIC8nBsjLDKY
svcpUa2De0czrScLi+ihhiEY1HftxBbwBrjtVuYho8K5D+KshxHGxHcdwM2UnnlF
Gj219q0hLjkWT/xJA9QU5eOL5nZ+PQwmH4Scq1m3OX8tobeb1gyt+a2Y4D88kTLq
QSKfERIiWlTmWMsKeD5scLh+hwvTAgMBAAGjUzBRMB0GA1UdDgQWBBQeaF4xjsT0
o66q57PjKd6c7vQ6/zAfBgNVHSMEGDAWgBQeaF4xjsT0o66q57PjKd6c7vQ6/zAP
BgNVHRMBAf8EBTADAQH/MA0GCSqGSIb3DQEBCwUAA4IBAQC9Mb0xwAXX0Ypo4BaC
C024DEpXMBzJkFShm3bCShUqZXpubfFiRcwtal5mfMBzWRxZIWLcxgRXfNhJWM8v
6fqb7WaREipGF9gOc0QvTxLIfO0V5DjD6j2LJQVhPVBdcGZIE+e628qAHkzpiPcU
BFvXNWPXOabDR/sx+Q224RPlNEsBIohtkAdL3AmvNlf+M0/KR5wp59VQDj6Ubabl
I109v8uD6JRc+P+HyaOgY97XNgBnIb9R2RPCd3/dacXXveCs27y7u+YuKW2nYRc6
6i7Riip2hupqP7Lx6Z9jOlsWpIsabZGJAwFoHL9FUjhlZH/rdEzo84/h3jOtaSD4
b/te
-----END CERTIFICATE-----"#;

    fn temp_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_ca_chain() {
        let file = temp_file(TEST_CERT);
        let pem = load_ca_chain(file.path()).unwrap();
        assert_eq!(pem, TEST_CERT);
    }

    #[test]
    fn test_load_ca_chain_with_two_certs() {
        let chain = format!("{TEST_CERT}\n{TEST_CERT}\n");
        let file = temp_file(&chain);
        assert!(load_ca_chain(file.path()).is_ok());
    }

    #[test]
    fn test_load_ca_chain_file_not_found() {
        let result = load_ca_chain(Path::new("/nonexistent/path/ca.pem"));
        assert!(matches!(result, Err(TlsError::CertificateLoad { .. })));
    }

    #[test]
    fn test_load_ca_chain_without_certificates() {
        let file = temp_file("not a certificate");
        let result = load_ca_chain(file.path());
        assert!(matches!(result, Err(TlsError::NoCertificates(_))));
    }
}
