//! TLS configuration and certificate loading.

use std::fs;
use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;

/// Error type for TLS material loading.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no certificate found in {}", .0.display())]
    NoCertificate(PathBuf),
    #[error("no private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),
    #[error("invalid PEM in {}: {source}", .path.display())]
    Pem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("rejected TLS material: {0}")]
    Config(#[source] std::io::Error),
}

/// PEM-encoded key and certificate chain, read and checked up front.
#[derive(Clone)]
pub struct TlsMaterial {
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("cert_pem", &format_args!("{} bytes", self.cert_pem.len()))
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

impl TlsMaterial {
    /// Read key and certificate synchronously, failing on anything unusable.
    pub fn read(key_path: &Path, cert_path: &Path) -> Result<Self, TlsError> {
        let key_pem = read_file(key_path)?;
        let cert_pem = read_file(cert_path)?;

        let mut reader = cert_pem.as_slice();
        match rustls_pemfile::certs(&mut reader).next() {
            Some(Ok(_)) => {}
            Some(Err(source)) => {
                return Err(TlsError::Pem {
                    path: cert_path.to_path_buf(),
                    source,
                })
            }
            None => return Err(TlsError::NoCertificate(cert_path.to_path_buf())),
        }

        let mut reader = key_pem.as_slice();
        match rustls_pemfile::private_key(&mut reader) {
            Ok(Some(_)) => {}
            Ok(None) => return Err(TlsError::NoPrivateKey(key_path.to_path_buf())),
            Err(source) => {
                return Err(TlsError::Pem {
                    path: key_path.to_path_buf(),
                    source,
                })
            }
        }

        Ok(Self { cert_pem, key_pem })
    }

    /// Build the rustls server configuration.
    pub async fn into_config(self) -> Result<RustlsConfig, TlsError> {
        RustlsConfig::from_pem(self.cert_pem, self.key_pem)
            .await
            .map_err(TlsError::Config)
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, TlsError> {
    fs::read(path).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })
}
