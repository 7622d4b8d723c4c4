pub mod cash;
pub mod common;
pub mod invoices;
pub mod receivables;
pub mod sequences;
pub mod stock;
