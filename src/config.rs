//! Server configuration (spec §4.3, §9): `PORT`/`ADDRESS` are required
//! environment variables, matching the original's own `os.LookupEnv`
//! fail-fast behaviour; `MaxClients`/`CommitRounding` keep the
//! original's hardcoded defaults since the spec gives no override
//! mechanism for them.

use std::env;

const PORT_ENV: &str = "PORT";
const ADDRESS_ENV: &str = "ADDRESS";

const DEFAULT_MAX_CLIENTS: i32 = 100;
const DEFAULT_COMMIT_ROUNDING: i32 = 5;

pub struct Config {
    pub address: String,
    pub port: u16,
    pub max_clients: i32,
    pub commit_rounding: i32,
}

impl Config {
    /// Reads `PORT`/`ADDRESS` from the environment, exiting the process
    /// with a descriptive message if either is missing or malformed
    /// (mirrors the original's `glog.Fatalf` calls in `main`).
    pub fn from_env() -> Self {
        let address = env::var(ADDRESS_ENV)
            .unwrap_or_else(|_| panic!("Missing {ADDRESS_ENV} environment variable"));

        let port_str = env::var(PORT_ENV)
            .unwrap_or_else(|_| panic!("Missing {PORT_ENV} environment variable"));
        let port: u16 = port_str
            .parse()
            .unwrap_or_else(|err| panic!("Invalid {PORT_ENV} variable provided, must be a port number, {err}"));

        Config {
            address,
            port,
            max_clients: DEFAULT_MAX_CLIENTS,
            commit_rounding: DEFAULT_COMMIT_ROUNDING,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
