use std::collections::{HashMap, HashSet};

/// Mapping from input revision numbers to output revision numbers.
///
/// Surviving revisions get fresh consecutive numbers (or their input number
/// verbatim when renumbering is off). A dropped revision maps to the last
/// surviving output revision before it, so copy sources pointing into the
/// gap still resolve; a drop before any survivor leaves the revision
/// unmapped.
pub struct RenumberMap {
    renumber: bool,
    map: HashMap<u32, u32>,
    dropped: HashSet<u32>,
    next_output: u32,
    last_output: Option<u32>,
}

impl RenumberMap {
    pub fn new(renumber: bool) -> Self {
        Self {
            renumber,
            map: HashMap::new(),
            dropped: HashSet::new(),
            next_output: 0,
            last_output: None,
        }
    }

    /// Assigns the output number for a surviving input revision.
    pub fn assign(&mut self, input_rev: u32) -> u32 {
        let output_rev = if self.renumber {
            self.next_output
        } else {
            input_rev
        };
        self.map.insert(input_rev, output_rev);
        self.next_output = output_rev + 1;
        self.last_output = Some(output_rev);
        output_rev
    }

    /// Records an elided empty revision.
    pub fn record_drop(&mut self, input_rev: u32) {
        self.dropped.insert(input_rev);
        if let Some(last_output) = self.last_output {
            self.map.insert(input_rev, last_output);
        }
    }

    pub fn is_dropped(&self, input_rev: u32) -> bool {
        self.dropped.contains(&input_rev)
    }

    /// Output revision a copyfrom header must reference instead of
    /// `input_rev`. `None` when the revision never appeared or was dropped
    /// with nothing surviving before it.
    pub fn translate_copyfrom(&self, input_rev: u32) -> Option<u32> {
        self.map.get(&input_rev).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::RenumberMap;

    #[test]
    fn test_renumber_with_drops() {
        let mut map = RenumberMap::new(true);

        assert_eq!(map.assign(0), 0);
        assert_eq!(map.assign(1), 1);
        map.record_drop(2);
        map.record_drop(3);
        assert_eq!(map.assign(4), 2);

        assert_eq!(map.translate_copyfrom(1), Some(1));
        assert_eq!(map.translate_copyfrom(2), Some(1));
        assert_eq!(map.translate_copyfrom(3), Some(1));
        assert_eq!(map.translate_copyfrom(4), Some(2));
        assert_eq!(map.translate_copyfrom(9), None);

        assert!(map.is_dropped(2));
        assert!(!map.is_dropped(4));
    }

    #[test]
    fn test_drop_before_any_survivor() {
        let mut map = RenumberMap::new(true);

        map.record_drop(0);
        assert_eq!(map.translate_copyfrom(0), None);

        assert_eq!(map.assign(1), 0);
        assert_eq!(map.translate_copyfrom(1), Some(0));
    }

    #[test]
    fn test_stop_renumbering_keeps_input_numbers() {
        let mut map = RenumberMap::new(false);

        assert_eq!(map.assign(0), 0);
        assert_eq!(map.assign(1), 1);
        assert_eq!(map.assign(5), 5);
        assert_eq!(map.translate_copyfrom(5), Some(5));
    }
}
