use std::{collections::HashMap, fmt};

use crate::lexer::InstructionKind;

/// Counts how often each instruction shows up during translation.
/// Purely diagnostic, a disabled collector produces the same code.
#[derive(Debug, Clone)]
pub struct StatisticsCollector {
    counts: HashMap<char, usize>,
    enabled: bool,
}

impl Default for StatisticsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticsCollector {
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            counts: HashMap::new(),
            enabled: false,
        }
    }

    pub fn record(&mut self, instruction: char) {
        if self.enabled {
            *self.counts.entry(instruction).or_insert(0) += 1;
        }
    }

    pub fn snapshot(&self) -> Statistics {
        Statistics {
            counts: self.counts.clone(),
        }
    }
}

/// Immutable copy of the counts taken once translation is done
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Statistics {
    counts: HashMap<char, usize>,
}

impl Statistics {
    pub fn get(&self, instruction: char) -> usize {
        self.counts.get(&instruction).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Counts in canonical instruction order, skipping instructions that never appeared
    pub fn iter(&self) -> impl Iterator<Item = (InstructionKind, usize)> + '_ {
        InstructionKind::ALL
            .into_iter()
            .map(|kind| (kind, self.get(kind.as_char())))
            .filter(|(_, count)| *count > 0)
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Instruction usage:")?;
        for (kind, count) in self.iter() {
            writeln!(f, "  '{}' ({}): {}", kind, kind.describe(), count)?;
        }
        write!(f, "Total instructions: {}", self.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_each_instruction() {
        let mut collector = StatisticsCollector::new();
        for c in "++-[]".chars() {
            collector.record(c);
        }
        let stats = collector.snapshot();
        assert_eq!(stats.get('+'), 2);
        assert_eq!(stats.get('-'), 1);
        assert_eq!(stats.get('.'), 0);
        assert_eq!(stats.total(), 5);
    }

    #[test]
    fn snapshot_is_detached() {
        let mut collector = StatisticsCollector::new();
        collector.record('>');
        let before = collector.snapshot();
        collector.record('>');
        assert_eq!(before.get('>'), 1);
        assert_eq!(collector.snapshot().get('>'), 2);
    }

    #[test]
    fn disabled_collector_records_nothing() {
        let mut collector = StatisticsCollector::disabled();
        collector.record('+');
        assert_eq!(collector.snapshot().total(), 0);
    }

    #[test]
    fn report_lists_in_canonical_order() {
        let mut collector = StatisticsCollector::new();
        collector.record(']');
        collector.record('>');
        let report = collector.snapshot().to_string();
        assert_eq!(
            report,
            "Instruction usage:\n  '>' (move right): 1\n  ']' (loop end): 1\nTotal instructions: 2"
        );
    }
}
