/// Runtime configuration for one server process.
#[derive(Clone, Debug)]
pub struct Config {
    /// Bind address; all interfaces by default.
    pub host: String,
    pub port: u16,
    /// Cache byte budget; 0 disables the limit.
    pub limit: u64,
    /// Debug-level logging.
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 11211,
            limit: 0,
            verbose: false,
        }
    }
}
