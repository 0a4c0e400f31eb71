use crate::backend::{BackingStore, TransactItem};
use crate::core::{BackendError, ErrorKind, Result, TrellisError};

/// Semantic role of one transaction item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TxRole {
    ParentCheck,
    EntityPut,
    EntityUpdate,
    ConstraintReserve,
    ConstraintRelease,
    RelationshipEdge,
}

impl TxRole {
    /// Domain error reported when this item's own condition fails.
    fn failure_kind(self) -> Option<ErrorKind> {
        match self {
            TxRole::ParentCheck => Some(ErrorKind::ParentNotFound),
            TxRole::EntityPut => Some(ErrorKind::AlreadyExists),
            TxRole::EntityUpdate | TxRole::ConstraintRelease => {
                Some(ErrorKind::ConcurrentModification)
            }
            TxRole::ConstraintReserve => Some(ErrorKind::DuplicateValue),
            TxRole::RelationshipEdge => None,
        }
    }
}

/// Transaction items paired with their roles, in submission order.
#[derive(Debug, Default)]
pub(crate) struct TransactionPlan {
    entries: Vec<(TxRole, TransactItem)>,
}

impl TransactionPlan {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, role: TxRole, item: TransactItem) {
        self.entries.push((role, item));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn roles(&self) -> Vec<TxRole> {
        self.entries.iter().map(|(role, _)| *role).collect()
    }

    /// Submits the plan as one atomic transaction and classifies an abort.
    pub(crate) async fn submit(self, backend: &dyn BackingStore) -> Result<()> {
        let (roles, items): (Vec<TxRole>, Vec<TransactItem>) = self.entries.into_iter().unzip();
        backend
            .transact_write(items)
            .await
            .map_err(|err| classify(&roles, err))
    }
}

/// Maps a transaction failure to a domain error using the role at the index
/// of the first item whose condition failed. Anything else passes through.
pub(crate) fn classify(roles: &[TxRole], err: BackendError) -> TrellisError {
    err.first_failed_condition()
        .and_then(|index| roles.get(index))
        .and_then(|role| role.failure_kind())
        .map(TrellisError::from_kind)
        .unwrap_or(TrellisError::Backend(err))
}
