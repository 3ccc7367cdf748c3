//! Handle construction and pool tuning for a single node.

use crate::db::dsn::Dsn;
use crate::db::handle::{Connector, NodeHandle, PoolControl};
use crate::db::policy::LogPolicy;
use crate::error::{DbError, DbResult};
use crate::models::NodeConfig;
use tracing::{debug, error};

/// Build the descriptor and logging policy for `config` and open a handle.
///
/// Failures are logged on the `error` channel with the node name and the
/// masked descriptor, then returned as [`DbError::Connection`].
pub async fn open_handle<C: Connector>(
    connector: &C,
    node: &str,
    config: &NodeConfig,
) -> DbResult<C::Handle> {
    let dsn = match Dsn::build(config) {
        Ok(dsn) => dsn,
        Err(e) => {
            error!(target: "error", node = %node, addr = %config.addr, error = %e, "mysql: invalid descriptor");
            return Err(DbError::connection(node, e.to_string()));
        }
    };
    let policy = LogPolicy::for_node(config);

    debug!(
        node = %node,
        dsn = %dsn,
        slow_logger = ?policy.channel(),
        slow_threshold = ?policy.slow_threshold,
        "Opening node"
    );

    connector.open(node, &dsn, &policy).await.map_err(|e| {
        error!(target: "error", node = %node, dsn = %dsn, error = %e, "mysql: open failed");
        DbError::connection(node, e.to_string())
    })
}

/// Apply the node's pool limits to an opened handle.
///
/// A handle whose pool cannot be retrieved is a configuration error, logged
/// like an open failure.
pub fn tune_handle<H: NodeHandle>(node: &str, handle: &H, config: &NodeConfig) -> DbResult<()> {
    let pool = handle.pool().map_err(|e| {
        let dsn = Dsn::build(config)
            .map(|d| d.to_string())
            .unwrap_or_else(|_| config.addr.clone());
        error!(target: "error", node = %node, dsn = %dsn, error = %e, "mysql: pool unavailable");
        DbError::configuration(node, e.to_string())
    })?;

    let limits = config.pool_limits();
    pool.apply_limits(&limits);

    debug!(
        node = %node,
        max_idle = limits.max_idle(),
        max_open = ?limits.max_open(),
        max_lifetime = ?limits.max_lifetime(),
        "Applied pool limits"
    );
    Ok(())
}
