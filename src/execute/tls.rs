use std::path::Path;
use std::time::Duration;

use reqwest::{Certificate, Client, ClientBuilder, Identity};

use crate::config::TlsConfig;
use crate::error::ExecuteError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn read_pem(path: &str) -> Result<Vec<u8>, ExecuteError> {
    std::fs::read(path).map_err(|err| ExecuteError::CertificateRead {
        path: Path::new(path).to_path_buf(),
        source: err,
    })
}

fn apply_tls(mut builder: ClientBuilder, tls: &TlsConfig) -> Result<ClientBuilder, ExecuteError> {
    // Both cert and key absent means "use the default transport".
    if tls.cert_path.is_empty() && tls.key_path.is_empty() {
        return Ok(builder);
    }

    let cert_bytes = read_pem(&tls.cert_path)?;
    let key_bytes = read_pem(&tls.key_path)?;
    let identity = Identity::from_pkcs8_pem(&cert_bytes, &key_bytes)
        .map_err(|err| ExecuteError::CertificateInvalid { source: err })?;
    builder = builder.identity(identity);

    // A CA bundle scopes trust to a private pool; otherwise the system
    // roots apply.
    if !tls.ca_path.is_empty() {
        let ca_bytes = read_pem(&tls.ca_path)?;
        let ca = Certificate::from_pem(&ca_bytes)
            .map_err(|err| ExecuteError::CertificateInvalid { source: err })?;
        builder = builder.add_root_certificate(ca);
    }

    if tls.insecure_skip_verify {
        builder = builder.danger_accept_invalid_certs(true);
    }

    Ok(builder)
}

/// Builds an HTTP client honoring the scenario's TLS material.
///
/// # Errors
///
/// Returns `ExecuteError::CertificateRead`/`CertificateInvalid` when the
/// TLS material cannot be loaded, and `ExecuteError::Client` when the
/// client itself fails to build.
pub(crate) fn build_client(tls: &TlsConfig) -> Result<Client, ExecuteError> {
    let builder = Client::builder().connect_timeout(CONNECT_TIMEOUT);
    apply_tls(builder, tls)?
        .build()
        .map_err(|err| ExecuteError::Client { source: err })
}
