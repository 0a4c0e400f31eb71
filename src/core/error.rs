use thiserror::Error;

/// Why one item of an aborted transaction was rejected.
///
/// Reasons are reported positionally: entry `i` describes the `i`-th item
/// that was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancellationReason {
    /// The item itself was fine; the transaction aborted because of another item.
    None,
    /// The item's condition expression evaluated to false.
    ConditionalCheckFailed,
    /// The item was malformed (missing key attribute, unknown table, ...).
    ValidationError,
}

/// Failures reported by a backing store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("conditional check failed")]
    ConditionalCheckFailed,

    #[error("transaction canceled: {reasons:?}")]
    TransactionCanceled { reasons: Vec<CancellationReason> },

    #[error("transaction has {items} items, limit is {limit}")]
    TransactionTooLarge { items: usize, limit: usize },

    #[error("table '{0}' not found")]
    TableNotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("backing store unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Index and reason of the first item rejected by its own condition.
    pub fn first_failed_condition(&self) -> Option<usize> {
        match self {
            BackendError::TransactionCanceled { reasons } => reasons
                .iter()
                .position(|reason| *reason == CancellationReason::ConditionalCheckFailed),
            _ => None,
        }
    }
}

/// Stable discriminant for the domain errors of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    ParentNotFound,
    AlreadyExists,
    HasChildren,
    ConcurrentModification,
    DuplicateValue,
    AlreadyDeleted,
}

#[derive(Error, Debug)]
pub enum TrellisError {
    #[error("trellis: entity not found")]
    NotFound,

    #[error("trellis: parent entity not found")]
    ParentNotFound,

    #[error("trellis: entity already exists")]
    AlreadyExists,

    #[error("trellis: entity has active children")]
    HasChildren,

    #[error("trellis: entity was modified concurrently")]
    ConcurrentModification,

    #[error("trellis: duplicate value for unique field")]
    DuplicateValue,

    #[error("trellis: entity is already deleted")]
    AlreadyDeleted,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("trellis: invalid item: {0}")]
    InvalidItem(String),

    #[error("trellis: shard {shard:02x}: {source}")]
    Shard {
        shard: u32,
        #[source]
        source: Box<TrellisError>,
    },

    #[error("trellis: shard task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl TrellisError {
    /// Returns the domain kind of this error, or `None` for pass-through failures.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            TrellisError::NotFound => Some(ErrorKind::NotFound),
            TrellisError::ParentNotFound => Some(ErrorKind::ParentNotFound),
            TrellisError::AlreadyExists => Some(ErrorKind::AlreadyExists),
            TrellisError::HasChildren => Some(ErrorKind::HasChildren),
            TrellisError::ConcurrentModification => Some(ErrorKind::ConcurrentModification),
            TrellisError::DuplicateValue => Some(ErrorKind::DuplicateValue),
            TrellisError::AlreadyDeleted => Some(ErrorKind::AlreadyDeleted),
            TrellisError::Shard { source, .. } => source.kind(),
            TrellisError::Backend(_) | TrellisError::InvalidItem(_) | TrellisError::Task(_) => None,
        }
    }

    /// The backing-store failure behind this error, looking through shard
    /// wrappers.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            TrellisError::Backend(err) => Some(err),
            TrellisError::Shard { source, .. } => source.backend_error(),
            _ => None,
        }
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == Some(kind)
    }

    /// Builds the sentinel error for a kind.
    pub fn from_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => TrellisError::NotFound,
            ErrorKind::ParentNotFound => TrellisError::ParentNotFound,
            ErrorKind::AlreadyExists => TrellisError::AlreadyExists,
            ErrorKind::HasChildren => TrellisError::HasChildren,
            ErrorKind::ConcurrentModification => TrellisError::ConcurrentModification,
            ErrorKind::DuplicateValue => TrellisError::DuplicateValue,
            ErrorKind::AlreadyDeleted => TrellisError::AlreadyDeleted,
        }
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

pub type Result<T> = std::result::Result<T, TrellisError>;
