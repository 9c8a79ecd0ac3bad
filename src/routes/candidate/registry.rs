use std::collections::BTreeSet;

use parking_lot::RwLock;

/// 已知候选人集合
///
/// 只增不减。第一次成功计票时登记，用来生成读取时的键空间。
/// 这里只是"见过哪些候选人"的缓存，票数以存储为准。
#[derive(Debug, Default)]
pub struct CandidateRegistry {
    candidates: RwLock<BTreeSet<String>>,
}

impl CandidateRegistry {
    pub fn new<I, S>(seed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: RwLock::new(seed.into_iter().map(Into::into).collect()),
        }
    }

    /// 登记候选人，返回是否为新候选人
    pub fn register(&self, candidate: &str) -> bool {
        if self.candidates.read().contains(candidate) {
            return false;
        }
        let inserted = self.candidates.write().insert(candidate.to_string());
        if inserted {
            tracing::debug!("Registered new candidate: {}", candidate);
        }
        inserted
    }

    /// 按字典序返回当前快照
    pub fn list(&self) -> Vec<String> {
        self.candidates.read().iter().cloned().collect()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, candidate: &str) -> bool {
        self.candidates.read().contains(candidate)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.candidates.read().len()
    }
}
