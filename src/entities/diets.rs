use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "diets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub number: String,
    pub requester_id: i32,
    pub department_id: i32,
    pub account_id: Option<i32>,
    pub card_id: Option<i32>,
    pub destination: String,
    pub purpose: String,
    pub start_date: Date,
    pub end_date: Date,
    pub breakfasts: i32,
    pub lunches: i32,
    pub dinners: i32,
    pub lodging_nights: i32,
    pub amount: f64,
    pub payment_method: String,
    pub status: String,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::requesters::Entity",
        from = "Column::RequesterId",
        to = "super::requesters::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Requesters,
    #[sea_orm(
        belongs_to = "super::departments::Entity",
        from = "Column::DepartmentId",
        to = "super::departments::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Departments,
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Accounts,
    #[sea_orm(
        belongs_to = "super::cards::Entity",
        from = "Column::CardId",
        to = "super::cards::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Cards,
}

impl Related<super::requesters::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Requesters.def()
    }
}

impl Related<super::departments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Departments.def()
    }
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl Related<super::cards::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cards.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
