pub use super::accounts::Entity as Accounts;
pub use super::card_recharges::Entity as CardRecharges;
pub use super::cards::Entity as Cards;
pub use super::departments::Entity as Departments;
pub use super::diets::Entity as Diets;
pub use super::liquidations::Entity as Liquidations;
pub use super::requesters::Entity as Requesters;
pub use super::users::Entity as Users;
