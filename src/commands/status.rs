use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::store;

pub fn run(args: StatusArgs) -> Result<()> {
    info!(db = %args.db.display(), "status requested");

    if !args.db.exists() {
        warn!(path = %args.db.display(), "database file missing");
        return Ok(());
    }

    let connection = store::open_existing(&args.db)?;
    let (cards, images) = store::count_cards(&connection)?;
    let schema_version = store::get_metadata(&connection, "db_schema_version")?;
    let last_analysis_at = store::get_metadata(&connection, "last_analysis_at")?;

    info!(
        path = %args.db.display(),
        schema_version = %schema_version.unwrap_or_default(),
        last_analysis_at = %last_analysis_at.unwrap_or_default(),
        cards,
        images,
        "database status"
    );

    let index = store::load_cards(&connection)?;
    for (nationality, by_type) in &index {
        let total: usize = by_type.values().map(Vec::len).sum();
        info!(nationality = %nationality, cards = total, "nationality");
    }

    Ok(())
}
