//! Default tunables shared by the cluster engine and the configuration loader.

use std::time::Duration;

/// Time between two health-check rounds.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(5);

/// Deadline applied collectively to the probes of one round.
pub const DEFAULT_UPDATE_TIMEOUT: Duration = Duration::from_secs(1);

/// Role predicate for PostgreSQL: true on a writable primary, false on a hot standby.
pub const DEFAULT_ROLE_QUERY: &str = "SELECT NOT pg_is_in_recovery()";

/// Per-node pool size used when building connections from configuration.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// How long a pool waits for a free connection before giving up.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);

/// Prefix of environment variables overriding file configuration (`PGHA__UPDATE_INTERVAL_MS`).
pub const ENV_PREFIX: &str = "PGHA";
