//! Ambient stack shared by `console-operator` and `console-webhook`:
//! process bootstrap, structured logging helpers, the metrics/health
//! server, and the generic status-patch helper.

pub mod access_log;
pub mod colors;
pub mod metrics;
pub mod patch;
pub mod shutdown;

/// Common annotations stamped onto objects this system manages.
pub mod annotations {
    pub const CREATED_BY: &str = "console.example.io/created-by";
    pub const SPEC_HASH: &str = "console.example.io/spec-hash";
}

/// Process-wide setup: honours `DISABLE_COLORS` and installs the rustls
/// crypto provider used by the `kube` client's TLS stack. Call once from
/// each binary's `main` before touching the Kubernetes client.
pub fn init() {
    let disable_colors = ["1", "true"].contains(
        &std::env::var("DISABLE_COLORS")
            .unwrap_or_default()
            .to_lowercase()
            .as_str(),
    );
    owo_colors::set_override(!disable_colors);

    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("install aws-lc-rs provider");
}

pub fn hash_spec<T: serde::Serialize>(spec: &T) -> String {
    use sha2::{Digest, Sha256};
    let bytes = serde_json::to_vec(spec).expect("serialize spec");
    let digest = Sha256::digest(&bytes);
    hex::encode(digest)
}
