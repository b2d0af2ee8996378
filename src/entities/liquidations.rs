use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "liquidations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub diet_id: i32,
    pub liquidation_date: Date,
    pub amount_spent: f64,
    pub amount_returned: f64,
    pub amount_reimbursed: f64,
    pub notes: Option<String>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::diets::Entity",
        from = "Column::DietId",
        to = "super::diets::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Diets,
}

impl Related<super::diets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Diets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
