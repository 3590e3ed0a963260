use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Namespace both controllers run in and lease-elect within.
    #[arg(long, env = "NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Port the `/healthz`, `/readyz`, `/metrics` router listens on. Unset disables it.
    #[arg(long, env = "METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Label applied to `component` on every exported metric.
    #[arg(long, env = "COMPONENT_NAME", default_value = "console-operator")]
    pub component_name: String,

    /// TTL a resolved directory group membership is cached for before refetch.
    #[arg(long, env = "DIRECTORY_CACHE_TTL_SECONDS", default_value_t = 300)]
    pub directory_cache_ttl_seconds: u64,
}
