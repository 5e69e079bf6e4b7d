use std::collections::HashMap;

/// Per-run record of which state hashes were visited and when.
#[derive(Debug, Default)]
pub(crate) struct VisitLog {
    first_seen: HashMap<String, usize>,
    counts: HashMap<String, usize>,
    first_repeat: Option<(usize, usize)>,
    repeats: usize,
}

impl VisitLog {
    pub(crate) fn new(initial: &str) -> Self {
        let mut log = Self::default();
        log.record(initial, 0);
        log
    }

    /// Count a visit at `step`. Returns true if the state was seen before.
    pub(crate) fn record(&mut self, hash: &str, step: usize) -> bool {
        *self.counts.entry(hash.to_string()).or_default() += 1;
        match self.first_seen.get(hash) {
            Some(&first) => {
                self.repeats += 1;
                if self.first_repeat.is_none() {
                    self.first_repeat = Some((step, step - first));
                }
                true
            }
            None => {
                self.first_seen.insert(hash.to_string(), step);
                false
            }
        }
    }

    pub(crate) fn unique(&self) -> usize {
        self.first_seen.len()
    }

    pub(crate) fn repeats(&self) -> usize {
        self.repeats
    }

    pub(crate) fn first_repeat_step(&self) -> Option<usize> {
        self.first_repeat.map(|(step, _)| step)
    }

    /// Distance back to the first occurrence of the first repeated state.
    pub(crate) fn cycle_length(&self) -> Option<usize> {
        self.first_repeat.map(|(_, len)| len)
    }

    pub(crate) fn entropy_bits(&self) -> f64 {
        visit_entropy(self.counts.values().copied())
    }
}

/// Shannon entropy, in bits, of a visit-count distribution.
pub fn visit_entropy(counts: impl IntoIterator<Item = usize>) -> f64 {
    let counts: Vec<usize> = counts.into_iter().filter(|&c| c > 0).collect();
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_record_and_repeat() {
        let mut log = VisitLog::new("a");
        assert!(!log.record("b", 1));
        assert!(!log.record("c", 2));
        assert!(log.record("a", 3));
        assert!(log.record("b", 4));
        assert_eq!(log.unique(), 3);
        assert_eq!(log.repeats(), 2);
        assert_eq!(log.first_repeat_step(), Some(3));
        assert_eq!(log.cycle_length(), Some(3));
    }

    #[test]
    fn test_entropy() {
        assert_eq!(visit_entropy([]), 0.0);
        assert_eq!(visit_entropy([5]), 0.0);
        assert_relative_eq!(visit_entropy([1, 1]), 1.0);
        assert_relative_eq!(visit_entropy([1, 1, 1, 1]), 2.0);
        assert_relative_eq!(visit_entropy([2, 0, 2]), 1.0);
    }
}
