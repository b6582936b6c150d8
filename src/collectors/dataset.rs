use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{self, JoinSet};
use tracing::{debug, error, warn};

use super::{join_pools, CollectError, Collector, CycleContext, Excludes};
use crate::property::{Property, DATASET_PROPERTIES};
use crate::sample::{MetricDesc, Sample};
use crate::zfs::{Client, DatasetKind};

/// Collects the properties of every dataset of one kind.
#[derive(Clone)]
pub struct DatasetCollector {
    kind: DatasetKind,
    client: Arc<dyn Client>,
    props: Arc<[String]>,
}

impl DatasetCollector {
    pub fn new(kind: DatasetKind, client: Arc<dyn Client>, props: Vec<String>) -> Self {
        Self {
            kind,
            client,
            props: props.into(),
        }
    }

    pub fn kind(&self) -> DatasetKind {
        self.kind
    }

    /// Resolves every requested key, degrading unknown ones.
    fn resolve(&self) -> Arc<[(String, Property)]> {
        self.props
            .iter()
            .map(|key| {
                let (prop, err) = DATASET_PROPERTIES.find(key);
                if let Some(err) = err {
                    warn!(
                        kind = %self.kind,
                        property = %key,
                        error = %err,
                        "Unsupported dataset property, results are likely to be undesirable"
                    );
                }
                (key.clone(), prop)
            })
            .collect()
    }
}

impl Collector for DatasetCollector {
    fn describe(&self) -> Vec<Arc<MetricDesc>> {
        self.props
            .iter()
            .filter_map(|key| match DATASET_PROPERTIES.find(key) {
                (prop, None) => Some(prop.desc),
                (_, Some(err)) => {
                    warn!(kind = %self.kind, property = %key, error = %err, "Skipping unsupported property");
                    None
                }
            })
            .collect()
    }

    async fn update(
        &self,
        out: mpsc::Sender<Sample>,
        pools: Arc<[String]>,
        excludes: Excludes,
        ctx: CycleContext,
    ) -> Result<(), CollectError> {
        let resolved = self.resolve();
        let mut tasks: JoinSet<Result<(), CollectError>> = JoinSet::new();

        for pool in pools.iter() {
            let client = self.client.clone();
            let pool = pool.clone();
            let kind = self.kind;
            let keys = self.props.clone();
            let resolved = resolved.clone();
            let excludes = excludes.clone();
            let out = out.clone();
            let ctx = ctx.clone();

            tasks.spawn(async move {
                if ctx.deadline_exceeded() {
                    debug!(pool = %pool, kind = %kind, "Deadline exceeded, skipping pool");
                    return Ok(());
                }

                let fetch_pool = pool.clone();
                let datasets = task::spawn_blocking(move || {
                    client.datasets(&fetch_pool, kind).properties(&keys)
                })
                .await??;

                for dataset in datasets {
                    let name = dataset.dataset_name();
                    if excludes.is_match(name) {
                        debug!(dataset = %name, "Dataset excluded");
                        continue;
                    }

                    for (key, prop) in resolved.iter() {
                        let Some(raw) = dataset.properties().get(key) else {
                            continue;
                        };
                        let labels = vec![name.to_string(), pool.clone(), kind.to_string()];
                        match prop.sample(raw, labels) {
                            Ok(sample) => {
                                if out.send(sample).await.is_err() {
                                    return Ok(());
                                }
                            }
                            Err(e) => error!(
                                dataset = %name,
                                property = %key,
                                error = %e,
                                "Failed to transform property value"
                            ),
                        }
                    }
                }
                Ok(())
            });
        }

        join_pools(tasks).await
    }
}
