// SPDX-License-Identifier: Apache-2.0

//! Connection URL building
//!
//! Turns a credential template plus an optional target database into a
//! driver connection URL. Credential fields are percent-encoded, so a
//! password such as `p@ss:w/rd` survives the round trip.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::types::{CredentialTemplate, EngineKind, Target};

/// Characters left untouched inside the userinfo and path segments.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// URL scheme used for each engine.
pub fn scheme(kind: EngineKind) -> &'static str {
    match kind {
        EngineKind::Postgres => "postgres",
        EngineKind::MySql => "mysql",
    }
}

/// Builds the connection URL for `target` (or the template's default database).
pub fn build_connection_url(
    kind: EngineKind,
    template: &CredentialTemplate,
    target: Option<&Target>,
) -> EngineResult<String> {
    let host = template.host.trim();
    if host.is_empty() {
        return Err(EngineError::config("Connection profile must specify a host"));
    }

    let database = template.database_for(target);
    let port = if template.port == 0 {
        kind.default_port()
    } else {
        template.port
    };

    let raw = format!(
        "{}://{}:{}@{}:{}/{}",
        scheme(kind),
        encode(&template.username),
        encode(template.password.expose()),
        host,
        port,
        encode(database),
    );

    // Reject hosts the drivers would choke on before any network I/O happens.
    Url::parse(&raw)
        .map_err(|e| EngineError::config(format!("Invalid connection URL for '{database}': {e}")))?;

    Ok(raw)
}

fn encode(component: &str) -> String {
    utf8_percent_encode(component, COMPONENT).to_string()
}
