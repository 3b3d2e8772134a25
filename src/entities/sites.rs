use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "site")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,

    /// Normalized slug, or an external `http(s)://` URL stored verbatim
    pub link: String,

    /// `navigation` or `footer`
    pub section: String,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    pub published: bool,

    pub published_on: Option<DateTimeUtc>,

    /// 1-based, contiguous across the table
    pub order_no: i32,

    pub last_modified: DateTimeUtc,

    pub author_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::AuthorId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
