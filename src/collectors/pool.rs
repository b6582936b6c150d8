use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{self, JoinSet};
use tracing::{debug, error, warn};

use super::{join_pools, CollectError, Collector, CycleContext, Excludes};
use crate::property::POOL_PROPERTIES;
use crate::sample::{MetricDesc, Sample};
use crate::zfs::Client;

/// Collects pool-level properties.
///
/// Exclude patterns only apply to dataset names, so every resolved pool is
/// reported.
#[derive(Clone)]
pub struct PoolCollector {
    client: Arc<dyn Client>,
    props: Arc<[String]>,
}

impl PoolCollector {
    pub fn new(client: Arc<dyn Client>, props: Vec<String>) -> Self {
        Self {
            client,
            props: props.into(),
        }
    }
}

impl Collector for PoolCollector {
    fn describe(&self) -> Vec<Arc<MetricDesc>> {
        self.props
            .iter()
            .filter_map(|key| match POOL_PROPERTIES.find(key) {
                (prop, None) => Some(prop.desc),
                (_, Some(err)) => {
                    warn!(property = %key, error = %err, "Skipping unsupported property");
                    None
                }
            })
            .collect()
    }

    async fn update(
        &self,
        out: mpsc::Sender<Sample>,
        pools: Arc<[String]>,
        _excludes: Excludes,
        ctx: CycleContext,
    ) -> Result<(), CollectError> {
        let mut tasks: JoinSet<Result<(), CollectError>> = JoinSet::new();

        for pool in pools.iter() {
            let client = self.client.clone();
            let pool = pool.clone();
            let keys = self.props.clone();
            let out = out.clone();
            let ctx = ctx.clone();

            tasks.spawn(async move {
                if ctx.deadline_exceeded() {
                    debug!(pool = %pool, "Deadline exceeded, skipping pool");
                    return Ok(());
                }

                let fetch_pool = pool.clone();
                let fetch_keys = keys.clone();
                let props = task::spawn_blocking(move || {
                    client.pool(&fetch_pool).properties(&fetch_keys)
                })
                .await??;

                for key in keys.iter() {
                    let Some(raw) = props.properties().get(key) else {
                        continue;
                    };
                    let (prop, err) = POOL_PROPERTIES.find(key);
                    if let Some(err) = err {
                        warn!(
                            pool = %pool,
                            property = %key,
                            error = %err,
                            "Unsupported pool property, results are likely to be undesirable"
                        );
                    }
                    match prop.sample(raw, vec![pool.clone()]) {
                        Ok(sample) => {
                            if out.send(sample).await.is_err() {
                                return Ok(());
                            }
                        }
                        Err(e) => error!(
                            pool = %pool,
                            property = %key,
                            error = %e,
                            "Failed to transform property value"
                        ),
                    }
                }
                Ok(())
            });
        }

        join_pools(tasks).await
    }
}
