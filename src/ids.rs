/// Monotonic counter handing out cache-local ids for one collection.
///
/// Ids are only unique within a single cache lifetime, and only until the owning collection is
/// wholesale replaced (which calls [IdGenerator::reset]).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IdGenerator {
    counter: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        IdGenerator::default()
    }

    pub fn generate_id(&mut self) -> String {
        let id = self.counter.to_string();
        self.counter += 1;
        id
    }

    /// The id most recently returned by [IdGenerator::generate_id], if any since the last reset.
    pub fn last_assigned_id(&self) -> Option<String> {
        self.counter.checked_sub(1).map(|last| last.to_string())
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }
}
