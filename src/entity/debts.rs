use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "debts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_name: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub balance: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::debt_transactions::Entity")]
    DebtTransactions,
}

impl Related<super::debt_transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DebtTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
