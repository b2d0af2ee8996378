//! Form state for the CRUD dialogs.
//!
//! Each form turns its text fields into a DTO and reports the first
//! validation problem as a message for the error dialog.

use chrono::{Local, NaiveDate};

use super::components::parse_amount;
use crate::entities::{accounts, cards, departments, diets, requesters, users};
use crate::models::account::{CreateAccount, UpdateAccount};
use crate::models::card::{CreateCard, CreateRecharge, UpdateCard};
use crate::models::department::{CreateDepartment, UpdateDepartment};
use crate::models::diet::{CreateDiet, MealCounts, PaymentMethod, UpdateDiet};
use crate::models::liquidation::CreateLiquidation;
use crate::models::requester::{CreateRequester, UpdateRequester};
use crate::models::user::{CreateUser, Role, UpdateUser};

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn required(value: &str, field: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        Err(format!("{field} is required"))
    } else {
        Ok(value.to_string())
    }
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Form state for department and account CRUD; both are code + name records.
#[derive(Default, Clone)]
pub struct CodeNameForm {
    pub id: Option<i32>,
    pub code: String,
    pub name: String,
    pub is_active: bool,
    pub is_open: bool,
    pub is_editing: bool,
}

impl CodeNameForm {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn open_new() -> Self {
        Self {
            is_active: true,
            is_open: true,
            ..Default::default()
        }
    }

    pub fn edit_department(dept: &departments::Model) -> Self {
        Self::edit(dept.id, &dept.code, &dept.name, dept.is_active)
    }

    pub fn edit_account(account: &accounts::Model) -> Self {
        Self::edit(account.id, &account.code, &account.name, account.is_active)
    }

    fn edit(id: i32, code: &str, name: &str, is_active: bool) -> Self {
        Self {
            id: Some(id),
            code: code.to_string(),
            name: name.to_string(),
            is_active,
            is_open: true,
            is_editing: true,
        }
    }

    fn fields(&self) -> Result<(String, String), String> {
        Ok((required(&self.code, "Code")?, required(&self.name, "Name")?))
    }

    pub fn to_create_department(&self) -> Result<CreateDepartment, String> {
        let (code, name) = self.fields()?;
        Ok(CreateDepartment { code, name })
    }

    pub fn to_update_department(&self) -> Result<UpdateDepartment, String> {
        let (code, name) = self.fields()?;
        Ok(UpdateDepartment {
            code: Some(code),
            name: Some(name),
            is_active: Some(self.is_active),
        })
    }

    pub fn to_create_account(&self) -> Result<CreateAccount, String> {
        let (code, name) = self.fields()?;
        Ok(CreateAccount { code, name })
    }

    pub fn to_update_account(&self) -> Result<UpdateAccount, String> {
        let (code, name) = self.fields()?;
        Ok(UpdateAccount {
            code: Some(code),
            name: Some(name),
            is_active: Some(self.is_active),
        })
    }
}

/// Form state for requester CRUD.
#[derive(Default, Clone)]
pub struct RequesterForm {
    pub id: Option<i32>,
    pub full_name: String,
    pub identity_number: String,
    pub position: String,
    pub department_id: Option<i32>,
    pub is_active: bool,
    pub is_open: bool,
    pub is_editing: bool,
}

impl RequesterForm {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn edit(requester: &requesters::Model) -> Self {
        Self {
            id: Some(requester.id),
            full_name: requester.full_name.clone(),
            identity_number: requester.identity_number.clone(),
            position: requester.position.clone().unwrap_or_default(),
            department_id: Some(requester.department_id),
            is_active: requester.is_active,
            is_open: true,
            is_editing: true,
        }
    }

    pub fn to_create(&self) -> Result<CreateRequester, String> {
        Ok(CreateRequester {
            full_name: required(&self.full_name, "Full name")?,
            identity_number: required(&self.identity_number, "Identity number")?,
            position: optional(&self.position),
            department_id: self.department_id.ok_or("Department is required")?,
        })
    }

    pub fn to_update(&self) -> Result<UpdateRequester, String> {
        let data = self.to_create()?;
        Ok(UpdateRequester {
            full_name: Some(data.full_name),
            identity_number: Some(data.identity_number),
            position: Some(data.position),
            department_id: Some(data.department_id),
            is_active: Some(self.is_active),
        })
    }
}

/// Form state for card CRUD.
#[derive(Default, Clone)]
pub struct CardForm {
    pub id: Option<i32>,
    pub card_number: String,
    pub description: String,
    pub account_id: Option<i32>,
    pub is_active: bool,
    pub is_open: bool,
    pub is_editing: bool,
}

impl CardForm {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn edit(card: &cards::Model) -> Self {
        Self {
            id: Some(card.id),
            card_number: card.card_number.clone(),
            description: card.description.clone().unwrap_or_default(),
            account_id: card.account_id,
            is_active: card.is_active,
            is_open: true,
            is_editing: true,
        }
    }

    pub fn to_create(&self) -> Result<CreateCard, String> {
        Ok(CreateCard {
            card_number: required(&self.card_number, "Card number")?,
            description: optional(&self.description),
            account_id: self.account_id,
        })
    }

    pub fn to_update(&self) -> Result<UpdateCard, String> {
        let data = self.to_create()?;
        Ok(UpdateCard {
            card_number: Some(data.card_number),
            description: Some(data.description),
            account_id: Some(data.account_id),
            is_active: Some(self.is_active),
        })
    }
}

/// Form state for a card recharge.
#[derive(Clone)]
pub struct RechargeForm {
    pub card_id: Option<i32>,
    pub card_number: String,
    pub amount: String,
    pub recharge_date: NaiveDate,
    pub notes: String,
    pub is_open: bool,
}

impl Default for RechargeForm {
    fn default() -> Self {
        Self {
            card_id: None,
            card_number: String::new(),
            amount: String::new(),
            recharge_date: today(),
            notes: String::new(),
            is_open: false,
        }
    }
}

impl RechargeForm {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn open_for(card: &cards::Model) -> Self {
        Self {
            card_id: Some(card.id),
            card_number: card.card_number.clone(),
            is_open: true,
            ..Default::default()
        }
    }

    pub fn to_create(&self) -> Result<CreateRecharge, String> {
        let amount = parse_amount(&self.amount).ok_or("Amount must be a number")?;
        if amount <= 0.0 {
            return Err("Amount must be greater than 0".to_string());
        }
        Ok(CreateRecharge {
            card_id: self.card_id.ok_or("Card is required")?,
            amount,
            recharge_date: self.recharge_date,
            notes: optional(&self.notes),
        })
    }
}

/// Form state for user CRUD.
#[derive(Clone)]
pub struct UserForm {
    pub id: Option<i32>,
    pub username: String,
    pub full_name: String,
    pub password: String,
    pub role: Role,
    pub is_active: bool,
    pub is_open: bool,
    pub is_editing: bool,
}

impl Default for UserForm {
    fn default() -> Self {
        Self {
            id: None,
            username: String::new(),
            full_name: String::new(),
            password: String::new(),
            role: Role::Operator,
            is_active: true,
            is_open: false,
            is_editing: false,
        }
    }
}

impl UserForm {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Blank form for a new user. The first user defaults to administrator.
    pub fn open_new(first_user: bool) -> Self {
        Self {
            role: if first_user { Role::Admin } else { Role::Operator },
            is_open: true,
            ..Default::default()
        }
    }

    pub fn edit(user: &users::Model) -> Self {
        Self {
            id: Some(user.id),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            password: String::new(),
            role: Role::parse(&user.role).unwrap_or(Role::Operator),
            is_active: user.is_active,
            is_open: true,
            is_editing: true,
        }
    }

    pub fn to_create(&self) -> Result<CreateUser, String> {
        Ok(CreateUser {
            username: required(&self.username, "Username")?,
            full_name: required(&self.full_name, "Full name")?,
            password: self.password.clone(),
            role: self.role,
        })
    }

    /// An empty password keeps the current one.
    pub fn to_update(&self) -> Result<UpdateUser, String> {
        Ok(UpdateUser {
            full_name: Some(required(&self.full_name, "Full name")?),
            password: (!self.password.is_empty()).then(|| self.password.clone()),
            role: Some(self.role),
            is_active: Some(self.is_active),
        })
    }
}

/// Form state for requesting or editing a diet.
#[derive(Clone)]
pub struct DietForm {
    pub id: Option<i32>,
    pub requester_id: Option<i32>,
    pub account_id: Option<i32>,
    pub card_id: Option<i32>,
    pub payment_method: PaymentMethod,
    pub destination: String,
    pub purpose: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub meals: MealCounts,
    pub is_open: bool,
    pub is_editing: bool,
}

impl Default for DietForm {
    fn default() -> Self {
        Self {
            id: None,
            requester_id: None,
            account_id: None,
            card_id: None,
            payment_method: PaymentMethod::Cash,
            destination: String::new(),
            purpose: String::new(),
            start_date: today(),
            end_date: today(),
            meals: MealCounts::default(),
            is_open: false,
            is_editing: false,
        }
    }
}

impl DietForm {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn open_new() -> Self {
        Self {
            is_open: true,
            ..Default::default()
        }
    }

    /// Only destination, purpose and account can change once a diet exists.
    pub fn edit(diet: &diets::Model) -> Self {
        Self {
            id: Some(diet.id),
            requester_id: Some(diet.requester_id),
            account_id: diet.account_id,
            card_id: diet.card_id,
            payment_method: PaymentMethod::parse(&diet.payment_method).unwrap_or(PaymentMethod::Cash),
            destination: diet.destination.clone(),
            purpose: diet.purpose.clone(),
            start_date: diet.start_date,
            end_date: diet.end_date,
            meals: MealCounts {
                breakfasts: diet.breakfasts,
                lunches: diet.lunches,
                dinners: diet.dinners,
                lodging_nights: diet.lodging_nights,
            },
            is_open: true,
            is_editing: true,
        }
    }

    pub fn to_create(&self) -> Result<CreateDiet, String> {
        let requester_id = self.requester_id.ok_or("Requester is required")?;
        let destination = required(&self.destination, "Destination")?;
        self.meals.validate(self.start_date, self.end_date)?;

        let card_id = match self.payment_method {
            PaymentMethod::Card => Some(self.card_id.ok_or("Select the card that pays this diet")?),
            PaymentMethod::Cash => None,
        };

        Ok(CreateDiet {
            requester_id,
            account_id: self.account_id,
            card_id,
            destination,
            purpose: self.purpose.trim().to_string(),
            start_date: self.start_date,
            end_date: self.end_date,
            meals: self.meals,
            payment_method: self.payment_method,
        })
    }

    pub fn to_update(&self) -> Result<UpdateDiet, String> {
        Ok(UpdateDiet {
            destination: Some(required(&self.destination, "Destination")?),
            purpose: Some(self.purpose.trim().to_string()),
            account_id: Some(self.account_id),
        })
    }
}

/// Form state for liquidating a diet.
#[derive(Clone)]
pub struct LiquidationForm {
    pub diet_id: Option<i32>,
    pub diet_number: String,
    pub advance: f64,
    pub liquidation_date: NaiveDate,
    pub amount_spent: String,
    pub notes: String,
    pub is_open: bool,
}

impl Default for LiquidationForm {
    fn default() -> Self {
        Self {
            diet_id: None,
            diet_number: String::new(),
            advance: 0.0,
            liquidation_date: today(),
            amount_spent: String::new(),
            notes: String::new(),
            is_open: false,
        }
    }
}

impl LiquidationForm {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn open_for(diet: &diets::Model) -> Self {
        Self {
            diet_id: Some(diet.id),
            diet_number: diet.number.clone(),
            advance: diet.amount,
            liquidation_date: today().max(diet.start_date),
            amount_spent: format!("{:.2}", diet.amount),
            is_open: true,
            ..Default::default()
        }
    }

    pub fn to_create(&self) -> Result<CreateLiquidation, String> {
        let amount_spent = parse_amount(&self.amount_spent).ok_or("Amount spent must be a number")?;
        if amount_spent < 0.0 {
            return Err("Amount spent cannot be negative".to_string());
        }
        Ok(CreateLiquidation {
            diet_id: self.diet_id.ok_or("Diet is required")?,
            liquidation_date: self.liquidation_date,
            amount_spent,
            notes: optional(&self.notes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_name_form_requires_fields() {
        let mut form = CodeNameForm::open_new();
        assert!(form.to_create_department().is_err());

        form.code = " ADM ".to_string();
        form.name = "Administration".to_string();
        let data = form.to_create_department().unwrap();
        assert_eq!(data.code, "ADM");

        let update = form.to_update_account().unwrap();
        assert_eq!(update.is_active, Some(true));
    }

    #[test]
    fn test_requester_form_needs_department() {
        let form = RequesterForm {
            full_name: "Ana".to_string(),
            identity_number: "85010112345".to_string(),
            ..Default::default()
        };
        assert_eq!(form.to_create().unwrap_err(), "Department is required");

        let form = RequesterForm {
            department_id: Some(1),
            position: "  ".to_string(),
            ..form
        };
        assert_eq!(form.to_create().unwrap().position, None);
    }

    #[test]
    fn test_recharge_form_amount() {
        let mut form = RechargeForm {
            card_id: Some(3),
            ..Default::default()
        };
        form.amount = "0".to_string();
        assert!(form.to_create().is_err());

        form.amount = "150,75".to_string();
        assert_eq!(form.to_create().unwrap().amount, 150.75);
    }

    #[test]
    fn test_diet_form_card_payment_needs_card() {
        let mut form = DietForm::open_new();
        form.requester_id = Some(1);
        form.destination = "Santiago".to_string();
        form.end_date = form.start_date + chrono::Duration::days(1);
        form.meals.lunches = 2;
        form.payment_method = PaymentMethod::Card;
        assert!(form.to_create().is_err());

        form.card_id = Some(9);
        let data = form.to_create().unwrap();
        assert_eq!(data.card_id, Some(9));

        form.payment_method = PaymentMethod::Cash;
        assert_eq!(form.to_create().unwrap().card_id, None);
    }

    #[test]
    fn test_diet_form_rejects_bad_meals() {
        let mut form = DietForm::open_new();
        form.requester_id = Some(1);
        form.destination = "Santiago".to_string();
        form.meals.lodging_nights = 1;
        assert!(form.to_create().is_err());
    }

    #[test]
    fn test_user_form_update_keeps_password() {
        let form = UserForm {
            full_name: "Admin".to_string(),
            ..Default::default()
        };
        assert_eq!(form.to_update().unwrap().password, None);
    }

    #[test]
    fn test_first_user_form_defaults_to_admin() {
        assert_eq!(UserForm::open_new(true).role, Role::Admin);
        let later = UserForm::open_new(false);
        assert_eq!(later.role, Role::Operator);
        assert!(later.is_open);
        assert!(!later.is_editing);
    }

    #[test]
    fn test_liquidation_form() {
        let mut form = LiquidationForm {
            diet_id: Some(4),
            ..Default::default()
        };
        form.amount_spent = "-1".to_string();
        assert!(form.to_create().is_err());
        form.amount_spent = "42.10".to_string();
        assert_eq!(form.to_create().unwrap().amount_spent, 42.1);
    }
}
