//! Batched store operations applied inside a single transaction.

use crate::storage::values::RowValues;
use crate::uri::ResourceUri;
use rusqlite::types::Value;

/// A SQL filter fragment with positional arguments.
///
/// The clause is appended verbatim to the statement's `WHERE`; each `?` in it
/// binds the next argument.
#[derive(Debug, Clone)]
pub struct Filter {
    pub clause: String,
    pub args: Vec<Value>,
}

impl Filter {
    pub fn new(clause: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            clause: clause.into(),
            args,
        }
    }
}

/// A column to be filled from the row id produced by an earlier insert in the
/// same batch, identified by its position in the operation list.
#[derive(Debug, Clone)]
pub struct BackRef {
    pub column: String,
    pub result_index: usize,
}

/// One operation of a transactional batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Insert {
        uri: ResourceUri,
        values: RowValues,
        back_refs: Vec<BackRef>,
    },
    Update {
        uri: ResourceUri,
        values: RowValues,
        filter: Option<Filter>,
    },
    Delete {
        uri: ResourceUri,
        filter: Option<Filter>,
    },
}

impl BatchOp {
    pub fn insert(uri: ResourceUri, values: RowValues) -> Self {
        BatchOp::Insert {
            uri,
            values,
            back_refs: Vec::new(),
        }
    }

    pub fn update(uri: ResourceUri, values: RowValues, filter: Option<Filter>) -> Self {
        BatchOp::Update { uri, values, filter }
    }

    /// Delete every row the URI addresses.
    pub fn delete(uri: ResourceUri) -> Self {
        BatchOp::Delete { uri, filter: None }
    }

    pub fn delete_where(uri: ResourceUri, filter: Filter) -> Self {
        BatchOp::Delete {
            uri,
            filter: Some(filter),
        }
    }

    /// Fill `column` from the id produced by the insert at `result_index`.
    ///
    /// Only meaningful on an insert; other operations are left unchanged.
    pub fn with_back_reference(mut self, column: &str, result_index: usize) -> Self {
        if let BatchOp::Insert { back_refs, .. } = &mut self {
            back_refs.push(BackRef {
                column: column.to_string(),
                result_index,
            });
        }
        self
    }

    /// The URI whose observers this operation affects.
    pub fn uri(&self) -> &ResourceUri {
        match self {
            BatchOp::Insert { uri, .. } | BatchOp::Update { uri, .. } | BatchOp::Delete { uri, .. } => uri,
        }
    }
}

/// Per-operation outcome of a committed batch.
#[derive(Debug, Clone, PartialEq)]
pub enum OpResult {
    /// An insert, with the URI of the new row.
    Inserted { uri: ResourceUri, id: i64 },
    /// An update or delete, with the number of rows touched.
    Affected { count: usize },
}

impl OpResult {
    pub fn inserted_id(&self) -> Option<i64> {
        match self {
            OpResult::Inserted { id, .. } => Some(*id),
            OpResult::Affected { .. } => None,
        }
    }
}
