/// Lifecycle of one arbitrated slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState<K> {
    Idle,
    Pending { key: K, ticket: u64 },
}

impl<K> SlotState<K> {
    pub fn is_pending(&self) -> bool {
        matches!(self, SlotState::Pending { .. })
    }

    /// Key of the request the slot is waiting on
    pub fn key(&self) -> Option<&K> {
        match self {
            SlotState::Idle => None,
            SlotState::Pending { key, .. } => Some(key),
        }
    }

    pub fn ticket(&self) -> Option<u64> {
        match self {
            SlotState::Idle => None,
            SlotState::Pending { ticket, .. } => Some(*ticket),
        }
    }

    /// Get human-readable state name
    pub fn name(&self) -> &str {
        match self {
            Self::Idle => "Idle",
            Self::Pending { .. } => "Pending",
        }
    }
}

impl<K> Default for SlotState<K> {
    fn default() -> Self {
        Self::Idle
    }
}
