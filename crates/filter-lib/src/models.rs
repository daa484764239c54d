//! Core data models for the utilization filter

use crate::error::QuantityError;
use k8s_openapi::api::core::v1::{Node, Pod};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource name whose quantities are stored in millicores
pub const CPU: &str = "cpu";

/// Resource limits of one container, keyed by resource name.
///
/// Values are canonical integers: millicores for `cpu`, base units
/// (bytes, counts) for everything else.
pub type ResourceList = BTreeMap<String, i64>;

/// A container as seen by the filter: only its declared limits matter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    #[serde(default)]
    pub limits: ResourceList,
}

/// The unit of work being placed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
}

impl WorkItem {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            containers: Vec::new(),
        }
    }

    /// Append a container with the given limits
    pub fn with_container(mut self, name: impl Into<String>, limits: ResourceList) -> Self {
        self.containers.push(ContainerSpec {
            name: name.into(),
            limits,
        });
        self
    }

    /// `namespace/name` identifier used in logs and reasons
    pub fn id(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl TryFrom<&Pod> for WorkItem {
    type Error = QuantityError;

    fn try_from(pod: &Pod) -> Result<Self, Self::Error> {
        let namespace = pod
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string());
        let name = pod.metadata.name.clone().unwrap_or_default();

        let mut containers = Vec::new();
        if let Some(spec) = &pod.spec {
            for container in &spec.containers {
                let mut limits = ResourceList::new();
                let declared = container
                    .resources
                    .as_ref()
                    .and_then(|r| r.limits.as_ref());
                if let Some(declared) = declared {
                    for (resource, quantity) in declared {
                        let value = parse_quantity(&quantity.0, resource == CPU)?;
                        limits.insert(resource.clone(), value);
                    }
                }
                containers.push(ContainerSpec {
                    name: container.name.clone(),
                    limits,
                });
            }
        }

        Ok(Self {
            namespace,
            name,
            containers,
        })
    }
}

/// A candidate placement target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
}

impl NodeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl From<&Node> for NodeInfo {
    fn from(node: &Node) -> Self {
        Self {
            name: node.metadata.name.clone().unwrap_or_default(),
        }
    }
}

/// Per-resource totals of a work item's container limits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub totals: ResourceList,
}

impl ResourceSummary {
    /// Total for a resource; absent resources count as zero
    pub fn get(&self, resource: &str) -> i64 {
        self.totals.get(resource).copied().unwrap_or(0)
    }

    /// Add one container's limits into the running totals
    pub fn add(&mut self, limits: &ResourceList) {
        for (resource, value) in limits {
            let total = self.totals.entry(resource.clone()).or_insert(0);
            *total = total.saturating_add(*value);
        }
    }

    pub fn is_zero(&self) -> bool {
        self.totals.values().all(|v| *v == 0)
    }
}

/// One point-in-time utilization reading for a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationSample {
    pub node: String,
    /// Busy ratio, `1 - idle`. Not clamped: noisy upstream data can push it outside [0, 1].
    pub utilization: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Parse a Kubernetes quantity string into canonical integer units.
///
/// With `milli` set the result is in thousandths (used for cpu).
/// Fractional results round up.
pub fn parse_quantity(input: &str, milli: bool) -> Result<i64, QuantityError> {
    let invalid = || QuantityError::Invalid(input.to_string());
    let s = input.trim();
    if s.is_empty() {
        return Err(invalid());
    }

    let (negative, rest) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let number_end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let (number, suffix) = rest.split_at(number_end);
    if number.is_empty() || number == "." || number.matches('.').count() > 1 {
        return Err(invalid());
    }

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    let digits: i128 = format!("{whole}{fraction}")
        .parse()
        .map_err(|_| invalid())?;
    let scale = fraction.len() as i32;

    let (exp10, binary_shift) = match suffix {
        "" => (0, 0),
        "n" => (-9, 0),
        "u" => (-6, 0),
        "m" => (-3, 0),
        "k" => (3, 0),
        "M" => (6, 0),
        "G" => (9, 0),
        "T" => (12, 0),
        "P" => (15, 0),
        "E" => (18, 0),
        "Ki" => (0, 10),
        "Mi" => (0, 20),
        "Gi" => (0, 30),
        "Ti" => (0, 40),
        "Pi" => (0, 50),
        "Ei" => (0, 60),
        other if other.starts_with(['e', 'E']) => {
            let exp: i32 = other[1..].parse().map_err(|_| invalid())?;
            (exp, 0)
        }
        _ => return Err(invalid()),
    };

    let exp10 = i64::from(exp10) - i64::from(scale) + if milli { 3 } else { 0 };
    let overflow = || QuantityError::OutOfRange(input.to_string());

    let mut value = digits
        .checked_mul(1i128.checked_shl(binary_shift).ok_or_else(overflow)?)
        .ok_or_else(overflow)?;
    if value != 0 {
        if exp10 >= 0 {
            let factor = u32::try_from(exp10)
                .ok()
                .and_then(|e| 10i128.checked_pow(e))
                .ok_or_else(overflow)?;
            value = value.checked_mul(factor).ok_or_else(overflow)?;
        } else {
            match u32::try_from(-exp10).ok().and_then(|e| 10i128.checked_pow(e)) {
                Some(divisor) => value = value / divisor + i128::from(value % divisor != 0),
                // Anything this small rounds up to one unit
                None => value = 1,
            }
        }
    }

    let value = if negative { -value } else { value };
    i64::try_from(value).map_err(|_| overflow())
}
