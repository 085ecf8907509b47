use sea_orm::Database;
use sea_orm_migration::prelude::*;

const USAGE: &str = "Usage: migration [up [N] | down [N] | fresh | status]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut args = std::env::args().skip(1);
    let cmd = args.next();
    let steps = match args.next() {
        Some(steps) => Some(steps.parse::<u32>().map_err(|_| USAGE)?),
        None => None,
    };

    let db_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:./coinshop.db?mode=rwc".to_string());
    let db = Database::connect(&db_url).await?;

    match cmd.as_deref() {
        None | Some("up") => migration::Migrator::up(&db, steps).await?,
        // Without a count, roll back the last migration only.
        Some("down") => migration::Migrator::down(&db, steps.or(Some(1))).await?,
        Some("fresh") => migration::Migrator::fresh(&db).await?,
        Some("status") => migration::Migrator::status(&db).await?,
        Some(_) => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}
