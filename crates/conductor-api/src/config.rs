// Server configuration from environment variables

/// Runtime configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Store file path (`DB_PATH`, default `conductor.db`)
    pub db_path: String,

    /// Bind host (`API_HOST`, default `0.0.0.0`)
    pub api_host: String,

    /// Bind port (`API_PORT`, default `9000`)
    pub api_port: u16,

    /// Default namespace for composed plugin service URLs (`KUBE_NAMESPACE`)
    pub kube_namespace: Option<String>,

    /// `CONDUCTOR_ENV`; `development` exposes internal error detail in
    /// 500 bodies
    pub development: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let db_path = std::env::var("DB_PATH").unwrap_or_else(|_| "conductor.db".to_string());
        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = std::env::var("API_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(9000);
        let kube_namespace = std::env::var("KUBE_NAMESPACE").ok();
        let development = std::env::var("CONDUCTOR_ENV")
            .map(|v| v.eq_ignore_ascii_case("development"))
            .unwrap_or(false);

        Self {
            db_path,
            api_host,
            api_port,
            kube_namespace,
            development,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}
