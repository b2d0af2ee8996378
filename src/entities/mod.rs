//! SeaORM entity definitions for the SQLite schema.

pub mod prelude;

pub mod accounts;
pub mod card_recharges;
pub mod cards;
pub mod departments;
pub mod diets;
pub mod liquidations;
pub mod requesters;
pub mod users;
