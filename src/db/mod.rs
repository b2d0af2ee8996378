//! Database connection and repositories.

pub mod account;
pub mod card;
pub mod connection;
pub mod department;
pub mod diet;
pub mod liquidation;
pub mod requester;
pub mod user;

pub use connection::{
    TableCounts, connect, database_url, ensure_schema, get_table_counts, get_version, integrity_check, list_tables,
    test_connection,
};

#[cfg(test)]
pub(crate) mod test_support;
