use std::io::{self, Write};

use anyhow::Result;
use tracing::info;

use crate::cli::DumpArgs;
use crate::natinfo::NatInfo;
use crate::store::{self, CardIndex};

pub fn run(args: DumpArgs) -> Result<()> {
    let connection = store::open_existing(&args.db)?;
    let index = store::load_cards(&connection)?;
    let natinfo = match &args.natinfo_dir {
        Some(dir) => Some(NatInfo::load(dir)?),
        None => None,
    };

    info!(db = %args.db.display(), nationalities = index.len(), "dumping cards");

    let mut output = io::BufWriter::new(io::stdout().lock());
    write_index(&mut output, &index, natinfo.as_ref())?;
    output.flush()?;
    Ok(())
}

fn write_index(output: &mut impl Write, index: &CardIndex, natinfo: Option<&NatInfo>) -> Result<()> {
    for (nationality, by_type) in index {
        write!(output, "{nationality}")?;
        if let Some(flag) = natinfo.and_then(|natinfo| natinfo.flag_for(nationality)) {
            write!(output, " (flag: {})", flag.display())?;
        }
        writeln!(output)?;

        for (tag_type, cards) in by_type {
            writeln!(output, "  {} ({})", tag_type.as_str(), cards.len())?;
            for card in cards {
                writeln!(output, "    {card}")?;
            }
        }
    }
    Ok(())
}
