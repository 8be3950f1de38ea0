use serde::Serialize;

/// Outcome of one batch item
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum ItemStatus<T> {
    Succeeded(T),
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome<T> {
    pub key: String,
    pub status: ItemStatus<T>,
}

/// Per-item results of a batch, ordered by item key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport<T> {
    pub items: Vec<ItemOutcome<T>>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> BatchReport<T> {
    pub fn push(&mut self, key: impl Into<String>, status: ItemStatus<T>) {
        self.items.push(ItemOutcome {
            key: key.into(),
            status,
        });
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &T)> {
        self.items.iter().filter_map(|i| match &i.status {
            ItemStatus::Succeeded(v) => Some((i.key.as_str(), v)),
            ItemStatus::Skipped { .. } => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().filter_map(|i| match &i.status {
            ItemStatus::Skipped { reason } => Some((i.key.as_str(), reason.as_str())),
            ItemStatus::Succeeded(_) => None,
        })
    }

    /// (succeeded, skipped)
    pub fn counts(&self) -> (usize, usize) {
        let ok = self.succeeded().count();
        (ok, self.items.len() - ok)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn sort_by_key(&mut self) {
        self.items.sort_by(|a, b| a.key.cmp(&b.key));
    }

    /// Transform succeeded values, keeping skips
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> BatchReport<U> {
        BatchReport {
            items: self
                .items
                .into_iter()
                .map(|i| ItemOutcome {
                    key: i.key,
                    status: match i.status {
                        ItemStatus::Succeeded(v) => ItemStatus::Succeeded(f(v)),
                        ItemStatus::Skipped { reason } => ItemStatus::Skipped { reason },
                    },
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_accessors() {
        let mut report = BatchReport::default();
        report.push("b", ItemStatus::Succeeded(2));
        report.push(
            "a",
            ItemStatus::Skipped {
                reason: "bad xml".into(),
            },
        );
        report.push("c", ItemStatus::Succeeded(3));
        report.sort_by_key();
        assert_eq!(report.counts(), (2, 1));
        assert_eq!(report.skipped().collect::<Vec<_>>(), vec![("a", "bad xml")]);
        let doubled = report.map(|v| v * 2);
        assert_eq!(
            doubled.succeeded().collect::<Vec<_>>(),
            vec![("b", &4), ("c", &6)]
        );
    }
}
