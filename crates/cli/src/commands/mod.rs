//! CLI command implementations

pub mod nodes;
pub mod summarize;

use anyhow::{Context, Result};
use filter_lib::WorkItem;
use k8s_openapi::api::core::v1::Pod;
use std::path::Path;

/// Read a pod manifest (JSON) and convert it to a work item
pub fn load_work_item(path: &Path) -> Result<WorkItem> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pod manifest {}", path.display()))?;
    let pod: Pod = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse pod manifest {}", path.display()))?;
    WorkItem::try_from(&pod).context("Invalid container limits in pod manifest")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_work_item() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "apiVersion": "v1",
                "kind": "Pod",
                "metadata": {{ "name": "web-0" }},
                "spec": {{ "containers": [
                    {{ "name": "app", "resources": {{ "limits": {{ "cpu": "1500m" }} }} }}
                ] }}
            }}"#
        )
        .unwrap();

        let work = load_work_item(file.path()).unwrap();
        assert_eq!(work.id(), "default/web-0");
        assert_eq!(work.containers[0].limits["cpu"], 1500);
    }

    #[test]
    fn test_load_work_item_rejects_bad_quantity() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "metadata": {{ "name": "x" }}, "spec": {{ "containers": [
                {{ "name": "app", "resources": {{ "limits": {{ "memory": "lots" }} }} }}
            ] }} }}"#
        )
        .unwrap();

        assert!(load_work_item(file.path()).is_err());
    }

    #[test]
    fn test_load_work_item_missing_file() {
        assert!(load_work_item(Path::new("/nonexistent/pod.json")).is_err());
    }
}
