use anyhow::{Context, Result};

pub async fn status() -> Result<()> {
    let pool = notify_db::connect_from_env().await.context("connect to postgres")?;
    let status = notify_db::status(&pool).await.context("query status")?;
    println!("ok={} has_courses_table={}", status.ok, status.has_courses_table);
    Ok(())
}

pub async fn migrate() -> Result<()> {
    let pool = notify_db::connect_from_env().await.context("connect to postgres")?;
    notify_db::migrate(&pool).await.context("run migrations")?;
    println!("migrations applied");
    Ok(())
}
