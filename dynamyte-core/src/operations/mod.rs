pub mod get_value;
pub mod internal_value;
pub mod put_value;
pub mod read_tree;

pub use get_value::{GetValueOperation, GetValueOperationOutcome, GetValueOperationRequest};
pub use internal_value::{
    InternalGetValueOperationOutcome, InternalGetValueOperationRequest,
    InternalPutValueOperationOutcome, InternalPutValueOperationRequest, InternalValueOperation,
};
pub use put_value::{
    PutValueOperation, PutValueOperationOutcome, PutValueOperationRequest,
    PutValueOperationResult,
};
pub use read_tree::{
    ReadTreeOperation, ReadTreeOperationOutcome, ReadTreeOperationRequest, TreeSummary,
};
