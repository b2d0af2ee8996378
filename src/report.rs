//! Report builders.
//!
//! Every report is a [`TableData`]: the reports panel renders it and the
//! export functions write it, so both always show the same rows.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use sea_orm::DatabaseConnection;

use crate::db;
use crate::entities::{accounts, cards, departments, diets, liquidations, requesters};
use crate::error::{AppError, Result};
use crate::models::diet::{DietStatus, PaymentMethod};
use crate::models::round_cents;

/// One table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    /// Money, written with two decimals.
    Number(f64),
    /// Counts and day spans.
    Integer(i64),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn empty() -> Self {
        Cell::Text(String::new())
    }

    /// Display form used on screen and in CSV files.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format!("{n:.2}"),
            Cell::Integer(n) => n.to_string(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Cell::Text(_))
    }
}

/// A titled table of report rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl TableData {
    pub fn new(title: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            title: title.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; short rows are padded and long rows truncated to the header width.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.headers.len(), Cell::empty());
        self.rows.push(row);
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Available reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportKind {
    #[default]
    DietRegister,
    PendingLiquidations,
    LiquidationSummary,
    ExpensesByAccount,
    ExpensesByDepartment,
    CardStatement,
}

impl ReportKind {
    pub const ALL: [ReportKind; 6] = [
        ReportKind::DietRegister,
        ReportKind::PendingLiquidations,
        ReportKind::LiquidationSummary,
        ReportKind::ExpensesByAccount,
        ReportKind::ExpensesByDepartment,
        ReportKind::CardStatement,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ReportKind::DietRegister => "Diet register",
            ReportKind::PendingLiquidations => "Pending liquidations",
            ReportKind::LiquidationSummary => "Liquidation summary",
            ReportKind::ExpensesByAccount => "Expenses by account",
            ReportKind::ExpensesByDepartment => "Expenses by department",
            ReportKind::CardStatement => "Card statement",
        }
    }

    /// Prefix for exported file names.
    pub fn file_prefix(&self) -> &'static str {
        match self {
            ReportKind::DietRegister => "diet_register",
            ReportKind::PendingLiquidations => "pending_liquidations",
            ReportKind::LiquidationSummary => "liquidation_summary",
            ReportKind::ExpensesByAccount => "expenses_by_account",
            ReportKind::ExpensesByDepartment => "expenses_by_department",
            ReportKind::CardStatement => "card_statement",
        }
    }
}

/// Report filters.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportParams {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub department_id: Option<i32>,
    /// Reference day for overdue calculations.
    pub as_of: NaiveDate,
}

impl ReportParams {
    fn validate(&self) -> Result<()> {
        if self.end_date < self.start_date {
            return Err(AppError::validation("End date cannot be before start date"));
        }
        Ok(())
    }

    fn range_label(&self) -> String {
        format!(
            "{} to {}",
            self.start_date.format("%Y-%m-%d"),
            self.end_date.format("%Y-%m-%d")
        )
    }
}

/// Build a report.
pub async fn generate(db: &DatabaseConnection, kind: ReportKind, params: &ReportParams) -> Result<TableData> {
    params.validate()?;
    let lookups = Lookups::load(db).await?;

    let table = match kind {
        ReportKind::DietRegister => diet_register(db, &lookups, params).await?,
        ReportKind::PendingLiquidations => pending_liquidations(db, &lookups, params).await?,
        ReportKind::LiquidationSummary => liquidation_summary(db, &lookups, params).await?,
        ReportKind::ExpensesByAccount => expenses_by_account(db, &lookups, params).await?,
        ReportKind::ExpensesByDepartment => expenses_by_department(db, &lookups, params).await?,
        ReportKind::CardStatement => card_statement(db, &lookups, params).await?,
    };

    tracing::debug!("Generated '{}' with {} rows", table.title, table.row_count());
    Ok(table)
}

/// Master data indexed by id.
struct Lookups {
    departments: HashMap<i32, departments::Model>,
    requesters: HashMap<i32, requesters::Model>,
    accounts: HashMap<i32, accounts::Model>,
    cards: HashMap<i32, cards::Model>,
}

impl Lookups {
    async fn load(db: &DatabaseConnection) -> Result<Self> {
        Ok(Self {
            departments: db::department::list_all(db).await?.into_iter().map(|d| (d.id, d)).collect(),
            requesters: db::requester::list_all(db).await?.into_iter().map(|r| (r.id, r)).collect(),
            accounts: db::account::list_all(db).await?.into_iter().map(|a| (a.id, a)).collect(),
            cards: db::card::list_all(db).await?.into_iter().map(|c| (c.id, c)).collect(),
        })
    }

    fn requester(&self, id: i32) -> String {
        self.requesters
            .get(&id)
            .map(|r| r.full_name.clone())
            .unwrap_or_else(|| format!("#{id}"))
    }

    fn department(&self, id: i32) -> String {
        self.departments
            .get(&id)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| format!("#{id}"))
    }

    fn card(&self, id: Option<i32>) -> String {
        id.and_then(|id| self.cards.get(&id))
            .map(|c| c.card_number.clone())
            .unwrap_or_default()
    }
}

async fn diet_register(db: &DatabaseConnection, lookups: &Lookups, params: &ReportParams) -> Result<TableData> {
    let mut table = TableData::new(
        format!("Diet register {}", params.range_label()),
        &[
            "Number",
            "Start",
            "End",
            "Requester",
            "Department",
            "Destination",
            "Purpose",
            "Payment",
            "Card",
            "Status",
            "Amount",
        ],
    );

    let diets = db::diet::list_in_range(db, params.start_date, params.end_date, params.department_id).await?;
    for diet in diets {
        table.push_row(vec![
            Cell::text(&diet.number),
            Cell::text(diet.start_date.format("%Y-%m-%d").to_string()),
            Cell::text(diet.end_date.format("%Y-%m-%d").to_string()),
            Cell::text(lookups.requester(diet.requester_id)),
            Cell::text(lookups.department(diet.department_id)),
            Cell::text(&diet.destination),
            Cell::text(&diet.purpose),
            Cell::text(payment_label(&diet)),
            Cell::text(lookups.card(diet.card_id)),
            Cell::text(status_label(&diet)),
            Cell::Number(diet.amount),
        ]);
    }

    Ok(table)
}

async fn pending_liquidations(db: &DatabaseConnection, lookups: &Lookups, params: &ReportParams) -> Result<TableData> {
    let mut table = TableData::new(
        format!("Pending liquidations {}", params.range_label()),
        &[
            "Number",
            "Requester",
            "Department",
            "Destination",
            "End",
            "Amount",
            "Days overdue",
        ],
    );

    let diets = db::diet::list_in_range(db, params.start_date, params.end_date, params.department_id).await?;
    for diet in diets.iter().filter(|d| d.status == DietStatus::Pending.as_str()) {
        let overdue = (params.as_of - diet.end_date).num_days().max(0);
        table.push_row(vec![
            Cell::text(&diet.number),
            Cell::text(lookups.requester(diet.requester_id)),
            Cell::text(lookups.department(diet.department_id)),
            Cell::text(&diet.destination),
            Cell::text(diet.end_date.format("%Y-%m-%d").to_string()),
            Cell::Number(diet.amount),
            Cell::Integer(overdue),
        ]);
    }

    Ok(table)
}

async fn liquidation_summary(db: &DatabaseConnection, lookups: &Lookups, params: &ReportParams) -> Result<TableData> {
    let mut table = TableData::new(
        format!("Liquidation summary {}", params.range_label()),
        &[
            "Diet",
            "Requester",
            "Department",
            "Date",
            "Advance",
            "Spent",
            "Returned",
            "Reimbursed",
        ],
    );

    let mut totals = [0.0_f64; 4];
    for (liquidation, diet) in liquidated_diets(db, params).await? {
        let amounts = [
            diet.amount,
            liquidation.amount_spent,
            liquidation.amount_returned,
            liquidation.amount_reimbursed,
        ];
        for (total, amount) in totals.iter_mut().zip(amounts) {
            *total += amount;
        }

        table.push_row(vec![
            Cell::text(&diet.number),
            Cell::text(lookups.requester(diet.requester_id)),
            Cell::text(lookups.department(diet.department_id)),
            Cell::text(liquidation.liquidation_date.format("%Y-%m-%d").to_string()),
            Cell::Number(amounts[0]),
            Cell::Number(amounts[1]),
            Cell::Number(amounts[2]),
            Cell::Number(amounts[3]),
        ]);
    }

    if !table.is_empty() {
        let mut row = vec![Cell::text("Total"), Cell::empty(), Cell::empty(), Cell::empty()];
        row.extend(totals.into_iter().map(|t| Cell::Number(round_cents(t))));
        table.push_row(row);
    }

    Ok(table)
}

/// Spend totals for one group of liquidated diets.
#[derive(Default)]
struct GroupTotals {
    diets: i64,
    advanced: f64,
    spent: f64,
}

async fn expenses_by_account(db: &DatabaseConnection, lookups: &Lookups, params: &ReportParams) -> Result<TableData> {
    let mut groups: BTreeMap<(String, String), GroupTotals> = BTreeMap::new();
    for (liquidation, diet) in liquidated_diets(db, params).await? {
        let key = match diet.account_id.and_then(|id| lookups.accounts.get(&id)) {
            Some(account) => (account.code.clone(), account.name.clone()),
            None => (String::new(), "(no account)".to_string()),
        };
        let group = groups.entry(key).or_default();
        group.diets += 1;
        group.advanced += diet.amount;
        group.spent += liquidation.amount_spent;
    }

    Ok(grouped_table(
        format!("Expenses by account {}", params.range_label()),
        "Account",
        groups,
    ))
}

async fn expenses_by_department(db: &DatabaseConnection, lookups: &Lookups, params: &ReportParams) -> Result<TableData> {
    let mut groups: BTreeMap<(String, String), GroupTotals> = BTreeMap::new();
    for (liquidation, diet) in liquidated_diets(db, params).await? {
        let key = match lookups.departments.get(&diet.department_id) {
            Some(dept) => (dept.code.clone(), dept.name.clone()),
            None => (String::new(), format!("#{}", diet.department_id)),
        };
        let group = groups.entry(key).or_default();
        group.diets += 1;
        group.advanced += diet.amount;
        group.spent += liquidation.amount_spent;
    }

    Ok(grouped_table(
        format!("Expenses by department {}", params.range_label()),
        "Department",
        groups,
    ))
}

fn grouped_table(title: String, group_header: &str, groups: BTreeMap<(String, String), GroupTotals>) -> TableData {
    let mut table = TableData::new(title, &["Code", group_header, "Diets", "Advanced", "Spent"]);

    let mut total = GroupTotals::default();
    for ((code, name), group) in groups {
        total.diets += group.diets;
        total.advanced += group.advanced;
        total.spent += group.spent;
        table.push_row(vec![
            Cell::Text(code),
            Cell::Text(name),
            Cell::Integer(group.diets),
            Cell::Number(round_cents(group.advanced)),
            Cell::Number(round_cents(group.spent)),
        ]);
    }

    if !table.is_empty() {
        table.push_row(vec![
            Cell::text("Total"),
            Cell::empty(),
            Cell::Integer(total.diets),
            Cell::Number(round_cents(total.advanced)),
            Cell::Number(round_cents(total.spent)),
        ]);
    }

    table
}

/// Card movements in the range, one block per card closed by its current balance.
///
/// The department filter does not apply: recharges belong to cards, not departments.
async fn card_statement(db: &DatabaseConnection, lookups: &Lookups, params: &ReportParams) -> Result<TableData> {
    let mut table = TableData::new(
        format!("Card statement {}", params.range_label()),
        &["Card", "Date", "Concept", "Credit", "Debit", "Balance"],
    );

    // (date, concept, credit, debit) per card
    let mut movements: BTreeMap<i32, Vec<(NaiveDate, String, f64, f64)>> = BTreeMap::new();

    for recharge in db::card::list_recharges_in_range(db, params.start_date, params.end_date).await? {
        let concept = match recharge.notes.as_deref() {
            Some(notes) => format!("Recharge: {notes}"),
            None => "Recharge".to_string(),
        };
        movements
            .entry(recharge.card_id)
            .or_default()
            .push((recharge.recharge_date, concept, recharge.amount, 0.0));
    }

    for diet in db::diet::list_in_range(db, params.start_date, params.end_date, None).await? {
        if let Some(card_id) = diet.card_id
            && diet.status != DietStatus::Cancelled.as_str()
        {
            movements.entry(card_id).or_default().push((
                diet.start_date,
                format!("Diet {} {}", diet.number, diet.destination),
                0.0,
                diet.amount,
            ));
        }
    }

    for (liquidation, diet) in liquidated_diets(db, params).await? {
        if let Some(card_id) = diet.card_id
            && liquidation.amount_returned > 0.0
        {
            movements.entry(card_id).or_default().push((
                liquidation.liquidation_date,
                format!("Return {}", diet.number),
                liquidation.amount_returned,
                0.0,
            ));
        }
    }

    let mut card_ids: Vec<i32> = movements.keys().copied().collect();
    card_ids.sort_by_key(|id| lookups.card(Some(*id)));

    for card_id in card_ids {
        let number = lookups.card(Some(card_id));
        let mut entries = movements.remove(&card_id).unwrap_or_default();
        entries.sort_by_key(|(date, ..)| *date);

        for (date, concept, credit, debit) in entries {
            table.push_row(vec![
                Cell::text(&number),
                Cell::text(date.format("%Y-%m-%d").to_string()),
                Cell::Text(concept),
                Cell::Number(credit),
                Cell::Number(debit),
                Cell::empty(),
            ]);
        }

        let balance = lookups.cards.get(&card_id).map(|c| c.balance).unwrap_or_default();
        table.push_row(vec![
            Cell::text(&number),
            Cell::empty(),
            Cell::text("Current balance"),
            Cell::empty(),
            Cell::empty(),
            Cell::Number(balance),
        ]);
    }

    Ok(table)
}

/// Liquidations dated in range joined with their diets, honouring the department filter.
async fn liquidated_diets(
    db: &DatabaseConnection,
    params: &ReportParams,
) -> Result<Vec<(liquidations::Model, diets::Model)>> {
    let liquidations = db::liquidation::list_in_range(db, params.start_date, params.end_date).await?;
    let diets: HashMap<i32, diets::Model> = db::diet::list_all(db).await?.into_iter().map(|d| (d.id, d)).collect();

    Ok(liquidations
        .into_iter()
        .filter_map(|l| {
            let diet = diets.get(&l.diet_id)?.clone();
            Some((l, diet))
        })
        .filter(|(_, d)| params.department_id.is_none_or(|id| d.department_id == id))
        .collect())
}

fn payment_label(diet: &diets::Model) -> &'static str {
    PaymentMethod::parse(&diet.payment_method)
        .map(|p| p.label())
        .unwrap_or("?")
}

fn status_label(diet: &diets::Model) -> &'static str {
    DietStatus::parse(&diet.status).map(|s| s.label()).unwrap_or("?")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{TestDb, date, diet_request};
    use crate::models::account::CreateAccount;
    use crate::models::liquidation::CreateLiquidation;

    fn params() -> ReportParams {
        ReportParams {
            start_date: date(2025, 3, 1),
            end_date: date(2025, 3, 31),
            department_id: None,
            as_of: date(2025, 3, 20),
        }
    }

    struct Fixture {
        test: TestDb,
        adm: i32,
        eco: i32,
        card: i32,
    }

    /// Three March diets: two in ADM (one liquidated, one pending), one cash diet in ECO (liquidated).
    async fn fixture() -> Fixture {
        let test = TestDb::new().await;
        let adm = test.department("ADM").await;
        let eco = test.department("ECO").await;
        let ana = test.requester(adm, "85010112345").await;
        let luis = test.requester(eco, "90020254321").await;
        let card = test.card_with_balance("4000-0001", 500.0).await;
        let account = db::account::create(
            &test.db,
            CreateAccount {
                code: "6200".to_string(),
                name: "Travel".to_string(),
            },
        )
        .await
        .unwrap();

        let mut first = diet_request(ana, Some(card));
        first.account_id = Some(account.id);
        let first = db::diet::create(&test.db, &test.rates, first).await.unwrap();

        let mut second = diet_request(ana, None);
        second.start_date = date(2025, 3, 14);
        second.end_date = date(2025, 3, 15);
        db::diet::create(&test.db, &test.rates, second).await.unwrap();

        let third = db::diet::create(&test.db, &test.rates, diet_request(luis, None))
            .await
            .unwrap();

        db::liquidation::create(
            &test.db,
            CreateLiquidation {
                diet_id: first.id,
                liquidation_date: date(2025, 3, 12),
                amount_spent: 45.5,
                notes: None,
            },
        )
        .await
        .unwrap();
        db::liquidation::create(
            &test.db,
            CreateLiquidation {
                diet_id: third.id,
                liquidation_date: date(2025, 3, 13),
                amount_spent: 70.0,
                notes: None,
            },
        )
        .await
        .unwrap();

        Fixture { test, adm, eco, card }
    }

    #[tokio::test]
    async fn test_diet_register_filters_department() {
        let f = fixture().await;

        let all = generate(&f.test.db, ReportKind::DietRegister, &params()).await.unwrap();
        assert_eq!(all.row_count(), 3);
        assert!(all.rows.iter().all(|r| r.len() == all.column_count()));

        let mut only_eco = params();
        only_eco.department_id = Some(f.eco);
        let eco = generate(&f.test.db, ReportKind::DietRegister, &only_eco).await.unwrap();
        assert_eq!(eco.row_count(), 1);
        assert_eq!(eco.rows[0][4], Cell::text("Department ECO"));
        assert_eq!(eco.rows[0][7], Cell::text("Cash"));
    }

    #[tokio::test]
    async fn test_pending_liquidations_overdue_days() {
        let f = fixture().await;

        let table = generate(&f.test.db, ReportKind::PendingLiquidations, &params())
            .await
            .unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.rows[0][6], Cell::Integer(5));

        let mut early = params();
        early.as_of = date(2025, 3, 1);
        let table = generate(&f.test.db, ReportKind::PendingLiquidations, &early).await.unwrap();
        assert_eq!(table.rows[0][6], Cell::Integer(0));
    }

    #[tokio::test]
    async fn test_liquidation_summary_totals() {
        let f = fixture().await;

        let table = generate(&f.test.db, ReportKind::LiquidationSummary, &params())
            .await
            .unwrap();
        assert_eq!(table.row_count(), 3);

        let total = table.rows.last().unwrap();
        assert_eq!(total[0], Cell::text("Total"));
        assert_eq!(total[4], Cell::Number(120.0));
        assert_eq!(total[5], Cell::Number(115.5));
        assert_eq!(total[6], Cell::Number(14.5));
        assert_eq!(total[7], Cell::Number(10.0));
    }

    #[tokio::test]
    async fn test_expense_groupings() {
        let f = fixture().await;

        let by_account = generate(&f.test.db, ReportKind::ExpensesByAccount, &params())
            .await
            .unwrap();
        // "(no account)" sorts before "6200" by its empty code
        assert_eq!(by_account.row_count(), 3);
        assert_eq!(by_account.rows[0][1], Cell::text("(no account)"));
        assert_eq!(by_account.rows[1][0], Cell::text("6200"));
        assert_eq!(by_account.rows[1][4], Cell::Number(45.5));

        let mut only_adm = params();
        only_adm.department_id = Some(f.adm);
        let by_dept = generate(&f.test.db, ReportKind::ExpensesByDepartment, &only_adm)
            .await
            .unwrap();
        assert_eq!(by_dept.row_count(), 2);
        assert_eq!(by_dept.rows[0][0], Cell::text("ADM"));
        assert_eq!(by_dept.rows[0][2], Cell::Integer(1));
    }

    #[tokio::test]
    async fn test_card_statement() {
        let f = fixture().await;

        let table = generate(&f.test.db, ReportKind::CardStatement, &params()).await.unwrap();
        // Diet debit, return credit, balance line (the recharge was in January)
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.rows[0][4], Cell::Number(60.0));
        assert_eq!(table.rows[1][3], Cell::Number(14.5));

        let card = db::card::get_by_id(&f.test.db, f.card).await.unwrap().unwrap();
        assert_eq!(table.rows[2][5], Cell::Number(card.balance));
        assert_eq!(card.balance, 454.5);
    }

    #[tokio::test]
    async fn test_invalid_range_and_empty_reports() {
        let test = TestDb::new().await;

        let mut reversed = params();
        reversed.end_date = date(2025, 2, 1);
        assert!(generate(&test.db, ReportKind::DietRegister, &reversed).await.is_err());

        for kind in ReportKind::ALL {
            let table = generate(&test.db, kind, &params()).await.unwrap();
            assert!(table.is_empty(), "{} should be empty", kind.label());
            assert!(!table.headers.is_empty());
        }
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(Cell::Number(12.5).as_text(), "12.50");
        assert_eq!(Cell::Integer(3).as_text(), "3");
        assert!(!Cell::text("a").is_numeric());
    }
}
