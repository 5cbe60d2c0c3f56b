use rand::Rng;

/// Source of fresh `id` attributes for inserted menus and pipe menus.
pub trait IdGenerator {
    fn next_id(&mut self, prefix: &str) -> String;
}

/// Random numeric suffixes. Collisions are unlikely enough for a single
/// hand-edited document and are not checked.
#[derive(Debug, Default)]
pub struct RandomIds;

impl RandomIds {
    const RANGE: std::ops::Range<u32> = 33_333..9_999_999;
}

impl IdGenerator for RandomIds {
    fn next_id(&mut self, prefix: &str) -> String {
        let value = rand::thread_rng().gen_range(Self::RANGE);
        format!("{prefix}{value}")
    }
}

/// Deterministic ids: `prefix1`, `prefix2`, ...
#[derive(Debug, Default)]
pub struct SequentialIds {
    counter: u32,
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{prefix}{}", self.counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_keep_prefix_and_range() {
        let mut ids = RandomIds;
        for _ in 0..64 {
            let id = ids.next_id("menu-");
            let suffix = id.strip_prefix("menu-").expect("prefix kept");
            let value: u32 = suffix.parse().expect("numeric suffix");
            assert!(RandomIds::RANGE.contains(&value));
        }
    }

    #[test]
    fn sequential_ids_count_up() {
        let mut ids = SequentialIds::default();
        assert_eq!(ids.next_id("pipe-"), "pipe-1");
        assert_eq!(ids.next_id("menu-"), "menu-2");
    }
}
