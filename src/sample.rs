//! Metric descriptors, rendered samples and Prometheus text encoding.

use prometheus::core::Desc;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::{BTreeMap, HashMap as StdHashMap};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::warn;

/// Namespace prefixed to every exported metric.
pub const NAMESPACE: &str = "zfs";

/// Static metadata of one exported gauge family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDesc {
    pub fq_name: String,
    pub help: String,
    pub labels: Vec<String>,
}

impl MetricDesc {
    pub fn new(subsystem: &str, name: &str, help: impl Into<String>, labels: &[&str]) -> Self {
        Self {
            fq_name: format!("{NAMESPACE}_{subsystem}_{name}"),
            help: help.into(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Validated Prometheus descriptor for this family.
    pub fn to_prometheus(&self) -> prometheus::Result<Desc> {
        Desc::new(
            self.fq_name.clone(),
            self.help.clone(),
            self.labels.clone(),
            StdHashMap::new(),
        )
    }
}

/// One rendered gauge observation.
#[derive(Debug, Clone)]
pub struct Sample {
    pub desc: Arc<MetricDesc>,
    pub label_values: Vec<String>,
    pub value: f64,
}

impl Sample {
    pub fn new(desc: Arc<MetricDesc>, label_values: Vec<String>, value: f64) -> Self {
        Self {
            desc,
            label_values,
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.desc.fq_name
    }

    /// Cache identity: family name plus every label pair, e.g.
    /// `zfs_dataset_used_bytes{name="tank/home",pool="tank",type="filesystem"}`.
    pub fn identity(&self) -> String {
        let mut id = self.desc.fq_name.clone();
        id.push('{');
        for (i, (label, value)) in self
            .desc
            .labels
            .iter()
            .zip(self.label_values.iter())
            .enumerate()
        {
            if i > 0 {
                id.push(',');
            }
            let _ = write!(id, "{label}={value:?}");
        }
        id.push('}');
        id
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .labels
            .iter()
            .position(|l| l == name)
            .and_then(|i| self.label_values.get(i))
            .map(String::as_str)
    }
}

/// Encodes samples in the Prometheus text exposition format.
///
/// Families are built as `GaugeVec`s in a throwaway registry. Samples whose
/// family cannot be registered, or whose labels do not fit the family's
/// first-seen schema, are logged and skipped.
pub fn encode(samples: &[Sample]) -> prometheus::Result<String> {
    let registry = Registry::new();
    let mut families: BTreeMap<&str, Option<GaugeVec>> = BTreeMap::new();

    for sample in samples {
        let family = families.entry(sample.name()).or_insert_with(|| {
            match register_family(&registry, &sample.desc) {
                Ok(vec) => Some(vec),
                Err(e) => {
                    warn!(metric = %sample.name(), error = %e, "Skipping unencodable metric family");
                    None
                }
            }
        });
        let Some(family) = family else {
            continue;
        };

        let values: Vec<&str> = sample.label_values.iter().map(String::as_str).collect();
        match family.get_metric_with_label_values(values.as_slice()) {
            Ok(gauge) => gauge.set(sample.value),
            Err(e) => warn!(metric = %sample.name(), error = %e, "Skipping sample with mismatched labels"),
        }
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

fn register_family(registry: &Registry, desc: &MetricDesc) -> prometheus::Result<GaugeVec> {
    let labels: Vec<&str> = desc.labels.iter().map(String::as_str).collect();
    let vec = GaugeVec::new(Opts::new(desc.fq_name.clone(), desc.help.clone()), labels.as_slice())?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset_desc() -> Arc<MetricDesc> {
        Arc::new(MetricDesc::new(
            "dataset",
            "used_bytes",
            "The amount of space in bytes consumed by this dataset and all its descendents.",
            &["name", "pool", "type"],
        ))
    }

    #[test]
    fn test_identity_includes_labels() {
        let sample = Sample::new(
            dataset_desc(),
            vec!["tank/home".into(), "tank".into(), "filesystem".into()],
            1.0,
        );
        assert_eq!(
            sample.identity(),
            r#"zfs_dataset_used_bytes{name="tank/home",pool="tank",type="filesystem"}"#
        );
        assert_eq!(sample.label("pool"), Some("tank"));
        assert_eq!(sample.label("missing"), None);
    }

    #[test]
    fn test_encode_text_format() {
        let desc = dataset_desc();
        let samples = vec![
            Sample::new(
                desc.clone(),
                vec!["tank/a".into(), "tank".into(), "filesystem".into()],
                1024.0,
            ),
            Sample::new(
                desc,
                vec!["tank/b".into(), "tank".into(), "volume".into()],
                2.5,
            ),
        ];

        let text = encode(&samples).unwrap();
        assert!(text.contains("# TYPE zfs_dataset_used_bytes gauge"));
        assert!(text.contains(
            r#"zfs_dataset_used_bytes{name="tank/a",pool="tank",type="filesystem"} 1024"#
        ));
        assert!(text.contains(
            r#"zfs_dataset_used_bytes{name="tank/b",pool="tank",type="volume"} 2.5"#
        ));
    }

    #[test]
    fn test_encode_skips_invalid_family_names() {
        let bad = Arc::new(MetricDesc::new(
            "dataset",
            "com.sun:auto-snapshot",
            "unsupported",
            &["name", "pool", "type"],
        ));
        let samples = vec![
            Sample::new(
                bad,
                vec!["tank".into(), "tank".into(), "filesystem".into()],
                1.0,
            ),
            Sample::new(
                dataset_desc(),
                vec!["tank".into(), "tank".into(), "filesystem".into()],
                3.0,
            ),
        ];

        let text = encode(&samples).unwrap();
        assert!(!text.contains("auto-snapshot"));
        assert!(text.contains("zfs_dataset_used_bytes"));
    }

    #[test]
    fn test_to_prometheus_desc() {
        assert!(dataset_desc().to_prometheus().is_ok());
        let bad = MetricDesc::new("dataset", "bad name", "help", &["name"]);
        assert!(bad.to_prometheus().is_err());
    }
}
