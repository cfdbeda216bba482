//! Protected-resource descriptors built from the resolved provider configuration.
//!
//! `descriptor` exposes [`ResourceDescriptor`], the per-exchange parameter set (client
//! credentials, endpoints, scopes, redirect URI, PKCE flag), the grant taxonomy, and
//! [`ResourceDescriptorBuilder`], which reads `openid.<providerId>.*` properties.

pub mod descriptor;

pub use descriptor::*;
