/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use log::debug;
use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, ServerName};
use yaml_rust::Yaml;

use crate::yaml;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlsClientConfig {
    ca_certificate: Option<PathBuf>,
    no_default_ca_certificate: bool,
    tls_name: Option<String>,
}

impl TlsClientConfig {
    pub fn set_ca_certificate<P: AsRef<Path>>(&mut self, path: P) {
        self.ca_certificate = Some(path.as_ref().to_path_buf());
    }

    pub fn set_no_default_ca_certificate(&mut self) {
        self.no_default_ca_certificate = true;
    }

    pub fn set_tls_name(&mut self, name: String) {
        self.tls_name = Some(name);
    }

    pub fn check(&self) -> anyhow::Result<()> {
        if self.no_default_ca_certificate && self.ca_certificate.is_none() {
            return Err(anyhow!(
                "ca certificate should be set if default ca certificates are disabled"
            ));
        }
        if let Some(name) = &self.tls_name {
            ServerName::try_from(name.as_str())
                .map_err(|e| anyhow!("invalid tls name {name}: {e}"))?;
        }
        Ok(())
    }

    /// The name used for SNI and certificate verification, defaults to the
    /// host part of the endpoint.
    pub(crate) fn server_name(&self, host: &str) -> anyhow::Result<ServerName<'static>> {
        let name = self.tls_name.as_deref().unwrap_or(host);
        ServerName::try_from(name.to_string()).map_err(|e| anyhow!("invalid tls name {name}: {e}"))
    }

    pub(crate) fn build(&self) -> anyhow::Result<Arc<ClientConfig>> {
        let mut root_store = RootCertStore::empty();
        if !self.no_default_ca_certificate {
            let r = rustls_native_certs::load_native_certs();
            for e in &r.errors {
                debug!("error when loading native ca certs: {e}");
            }
            let (added, ignored) = root_store.add_parsable_certificates(r.certs);
            debug!("{added} native ca certs added, {ignored} ignored");
        }
        if let Some(path) = &self.ca_certificate {
            let certs = CertificateDer::pem_file_iter(path)
                .map_err(|e| anyhow!("failed to open ca certificate {}: {e}", path.display()))?;
            for (i, cert) in certs.enumerate() {
                let cert =
                    cert.map_err(|e| anyhow!("invalid ca certificate #{i} in file: {e}"))?;
                root_store
                    .add(cert)
                    .map_err(|e| anyhow!("failed to add ca certificate #{i}: {e}"))?;
            }
        }
        if root_store.is_empty() {
            return Err(anyhow!("no usable ca certificate found"));
        }

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| anyhow!("failed to set tls protocol versions: {e}"))?
            .with_root_certificates(root_store)
            .with_no_client_auth();
        Ok(Arc::new(config))
    }

    pub(super) fn parse_yaml(v: &Yaml) -> anyhow::Result<Self> {
        if let Yaml::Hash(map) = v {
            let mut config = TlsClientConfig::default();
            yaml::foreach_kv(map, |k, v| match yaml::normalize_key(k).as_str() {
                "ca_certificate" | "ca_cert" => {
                    let path = yaml::as_absolute_path(v)
                        .context(format!("invalid absolute path value for key {k}"))?;
                    config.set_ca_certificate(path);
                    Ok(())
                }
                "no_default_ca_certificate" | "no_default_ca_cert" => {
                    config.no_default_ca_certificate = yaml::as_bool(v)?;
                    Ok(())
                }
                "tls_name" => {
                    let name =
                        yaml::as_string(v).context(format!("invalid string value for key {k}"))?;
                    config.set_tls_name(name);
                    Ok(())
                }
                _ => Err(anyhow!("invalid key {k}")),
            })?;
            config.check()?;
            Ok(config)
        } else {
            Err(anyhow!(
                "yaml value type for 'tls client config' should be 'map'"
            ))
        }
    }
}
