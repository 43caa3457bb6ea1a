//! Migrate command

use mdr_store::migrations::applied_migrations;

use super::GlobalArgs;

pub fn execute(global: &GlobalArgs) -> anyhow::Result<()> {
    // Opening the context applies pending migrations
    let ctx = global.open()?;
    let applied = ctx.database().with_conn(|conn| applied_migrations(conn))?;
    for migration in applied {
        println!("{}  {}", migration.migration_id, migration.checksum);
    }
    Ok(())
}
