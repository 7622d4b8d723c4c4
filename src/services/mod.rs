pub mod cash;
pub mod invoices;
pub mod receivables;
pub mod sequences;
pub mod stock;

use crate::errors::ServiceError;
use sea_orm::TransactionError;

/// Unwraps sea-orm's transaction error wrapper back into our error type.
pub(crate) fn txn_err(err: TransactionError<ServiceError>) -> ServiceError {
    match err {
        TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}
