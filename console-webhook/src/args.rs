use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address the admission server binds to.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8443")]
    pub bind_addr: String,

    /// PEM certificate used to terminate TLS for the admission server.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: String,

    /// PEM private key paired with `tls_cert_path`.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: String,

    /// Port the `/healthz`, `/readyz`, `/metrics` router listens on. Unset disables it.
    #[arg(long, env = "METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Label applied to `component` on every exported metric.
    #[arg(long, env = "COMPONENT_NAME", default_value = "console-webhook")]
    pub component_name: String,
}
