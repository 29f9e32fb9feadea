use serde_json::json;

/// A named size report of one component, used for diagnostics
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContainerInfoEntry {
    Leaf {
        name: String,
        count: usize,
        element_size: usize,
    },
    Node {
        name: String,
        children: ContainerInfo,
    },
}

impl ContainerInfoEntry {
    pub fn name(&self) -> &str {
        match self {
            ContainerInfoEntry::Leaf { name, .. } => name,
            ContainerInfoEntry::Node { name, .. } => name,
        }
    }

    fn into_json(self) -> (String, serde_json::Value) {
        match self {
            ContainerInfoEntry::Leaf {
                name,
                count,
                element_size,
            } => (
                name,
                json!({
                    "count": count.to_string(),
                    "size": element_size.to_string()
                }),
            ),
            ContainerInfoEntry::Node { name, children } => (name, children.into_json()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ContainerInfo(Vec<ContainerInfoEntry>);

impl ContainerInfo {
    pub fn builder() -> ContainerInfosBuilder {
        ContainerInfosBuilder(Vec::new())
    }

    pub fn entries(&self) -> &[ContainerInfoEntry] {
        &self.0
    }

    /// Looks up the element count of a leaf by its path, e.g. `["active", "roots"]`
    pub fn count(&self, path: &[&str]) -> Option<usize> {
        let (first, rest) = path.split_first()?;
        let entry = self.0.iter().find(|e| e.name() == *first)?;
        match entry {
            ContainerInfoEntry::Leaf { count, .. } if rest.is_empty() => Some(*count),
            ContainerInfoEntry::Node { children, .. } => children.count(rest),
            _ => None,
        }
    }

    pub fn into_json(self) -> serde_json::Value {
        let mut data = serde_json::Map::new();
        for entry in self.0 {
            let (name, value) = entry.into_json();
            data.insert(name, value);
        }
        serde_json::Value::Object(data)
    }
}

pub struct ContainerInfosBuilder(Vec<ContainerInfoEntry>);

impl ContainerInfosBuilder {
    pub fn leaf(mut self, name: impl Into<String>, count: usize, element_size: usize) -> Self {
        self.0.push(ContainerInfoEntry::Leaf {
            name: name.into(),
            count,
            element_size,
        });
        self
    }

    pub fn node(mut self, name: impl Into<String>, infos: ContainerInfo) -> Self {
        self.0.push(ContainerInfoEntry::Node {
            name: name.into(),
            children: infos,
        });
        self
    }

    pub fn finish(self) -> ContainerInfo {
        ContainerInfo(self.0)
    }
}

impl<const N: usize> From<[(&'static str, usize, usize); N]> for ContainerInfo {
    fn from(value: [(&'static str, usize, usize); N]) -> Self {
        let mut builder = ContainerInfo::builder();
        for (name, count, element_size) in value {
            builder = builder.leaf(name, count, element_size);
        }
        builder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_json() {
        let info = ContainerInfo::builder()
            .leaf("votes", 3, 8)
            .node("cache", [("entries", 2, 16)].into())
            .finish();

        assert_eq!(
            info.into_json(),
            json!({
                "votes": {"count": "3", "size": "8"},
                "cache": {"entries": {"count": "2", "size": "16"}}
            })
        );
    }

    #[test]
    fn count_by_path() {
        let info = ContainerInfo::builder()
            .leaf("votes", 3, 8)
            .node("cache", [("entries", 2, 16)].into())
            .finish();

        assert_eq!(info.count(&["votes"]), Some(3));
        assert_eq!(info.count(&["cache", "entries"]), Some(2));
        assert_eq!(info.count(&["cache"]), None);
        assert_eq!(info.count(&["unknown"]), None);
    }
}
