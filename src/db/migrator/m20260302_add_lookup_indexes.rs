use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_article_published_on")
                    .table(Article::Table)
                    .col(Article::Published)
                    .col(Article::PublishedOn)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_site_order_no")
                    .table(Site::Table)
                    .col(Site::OrderNo)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_token_user_type")
                    .table(Token::Table)
                    .col(Token::UserId)
                    .col(Token::TokenType)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "idx_token_user_type",
            "idx_site_order_no",
            "idx_article_published_on",
        ] {
            manager
                .drop_index(Index::drop().name(name).to_owned())
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Article {
    Table,
    Published,
    PublishedOn,
}

#[derive(DeriveIden)]
enum Site {
    Table,
    OrderNo,
}

#[derive(DeriveIden)]
enum Token {
    Table,
    UserId,
    TokenType,
}
