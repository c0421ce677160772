//! Endpoint newtype
//!
//! A newtype around a Url marking the upstream GraphQL endpoint, defaulting to
//! the public PDC API.

use std::ops::Deref;

use serde::Deserialize;
use url::Url;

/// A GraphQL endpoint
#[derive(Debug)]
pub struct Endpoint(Url);

impl Endpoint {
    /// Unwrap the endpoint into its inner URL
    pub fn into_inner(self) -> Url {
        self.0
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self(defaults::endpoint())
    }
}

impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let url = Url::deserialize(deserializer)?;
        Ok(Self(url))
    }
}

impl Deref for Endpoint {
    type Target = Url;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

mod defaults {
    use pdc_mcp_server::graphql::DEFAULT_ENDPOINT;
    use url::Url;

    pub(super) fn endpoint() -> Url {
        // SAFETY: The default is a constant checked by [test::default_endpoint_parses_correctly]
        #[allow(clippy::unwrap_used)]
        Url::parse(DEFAULT_ENDPOINT).unwrap()
    }

}
